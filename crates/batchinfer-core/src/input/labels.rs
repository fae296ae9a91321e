//! Label files for text classification: a JSON object of label -> examples.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::SetupError;

/// Labels and their optional few-shot examples.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSet {
    labels: Vec<String>,
    examples: Vec<(String, String)>,
}

impl LabelSet {
    /// Build a label set from `label -> [examples]`.
    pub fn new(map: BTreeMap<String, Vec<String>>) -> Self {
        let labels = map.keys().cloned().collect();
        let examples = map
            .into_iter()
            .flat_map(|(label, examples)| {
                examples
                    .into_iter()
                    .map(move |example| (example, label.clone()))
            })
            .collect();
        Self { labels, examples }
    }

    /// Load a label file, failing the run if it is missing or malformed.
    pub fn load(path: &Path) -> Result<Self, SetupError> {
        if !path.exists() {
            return Err(SetupError::LabelFileMissing(path.to_path_buf()));
        }

        let invalid = |message: String| SetupError::InvalidLabelFile {
            path: path.to_path_buf(),
            message,
        };

        let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let map: BTreeMap<String, Vec<String>> =
            serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        if map.is_empty() {
            return Err(invalid("no labels defined".to_string()));
        }
        Ok(Self::new(map))
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// `(example text, label)` pairs, grouped by label.
    pub fn examples(&self) -> &[(String, String)] {
        &self.examples
    }

    /// Few-shot when at least one label carries examples.
    pub fn is_few_shot(&self) -> bool {
        !self.examples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, content: &str) -> std::path::PathBuf {
        let path = dir.join("labels.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_zero_shot_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), r#"{"positive": [], "negative": []}"#);
        let labels = LabelSet::load(&path).unwrap();
        assert_eq!(labels.labels(), &["negative", "positive"]);
        assert!(!labels.is_few_shot());
    }

    #[test]
    fn test_few_shot_examples_are_paired_with_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            r#"{"sports": ["the match ended 2-1"], "politics": ["the vote passed", "a new bill"]}"#,
        );
        let labels = LabelSet::load(&path).unwrap();
        assert!(labels.is_few_shot());
        assert_eq!(labels.examples().len(), 3);
        assert!(labels
            .examples()
            .contains(&("a new bill".to_string(), "politics".to_string())));
    }

    #[test]
    fn test_missing_file() {
        let err = LabelSet::load(Path::new("/nope/labels.json")).unwrap_err();
        assert!(matches!(err, SetupError::LabelFileMissing(_)));
    }

    #[test]
    fn test_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "{labels");
        let err = LabelSet::load(&path).unwrap_err();
        assert!(matches!(err, SetupError::InvalidLabelFile { .. }));
        assert!(err.to_string().contains("Make sure the file is valid JSON"));
    }

    #[test]
    fn test_empty_object_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "{}");
        assert!(LabelSet::load(&path).is_err());
    }
}
