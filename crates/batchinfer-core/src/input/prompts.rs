//! Prompt lists for image generation.

use serde::Deserialize;
use std::path::Path;

use crate::error::SetupError;

/// One image to generate.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptItem {
    pub id: String,
    pub prompt: String,
    pub negative: String,
}

#[derive(Deserialize)]
struct PromptEntry {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    negative: Option<String>,
}

/// Load a prompts file: a JSON object of `id -> {"prompt": .., "negative": ..}`.
///
/// Prompts come back in the order they appear in the file.
pub fn load_prompts_file(path: &Path) -> Result<Vec<PromptItem>, SetupError> {
    if !path.exists() {
        return Err(SetupError::InputMissing(path.to_path_buf()));
    }

    let invalid = |message: String| SetupError::InvalidPromptsFile {
        path: path.to_path_buf(),
        message,
    };

    let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let entries: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;

    entries
        .into_iter()
        .map(|(id, value)| {
            let entry: PromptEntry = serde_json::from_value(value)
                .map_err(|e| invalid(format!("prompt {id}: {e}")))?;
            Ok(PromptItem {
                id,
                prompt: entry.prompt.unwrap_or_default(),
                negative: entry.negative.unwrap_or_default(),
            })
        })
        .collect()
}

/// A single prompt given on the command line gets id `1`.
pub fn single_prompt(prompt: &str, negative: &str) -> Vec<PromptItem> {
    vec![PromptItem {
        id: "1".to_string(),
        prompt: prompt.to_string(),
        negative: negative.to_string(),
    }]
}
