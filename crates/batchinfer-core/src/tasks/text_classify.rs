//! Zero/few-shot text classification in bounded batches.
//!
//! Input is NDJSON (`{id: text}` per line). Results go to
//! `<output>/results.json` as one JSON object of `id -> label`, written
//! batch by batch so memory stays bounded on large inputs. The object is
//! always closed, so the file is valid JSON even when a run halts early.

use async_trait::async_trait;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::ensure_output_dir;
use crate::config::RetryConfig;
use crate::error::{BatchError, PipelineError, SetupError};
use crate::input::{LabelSet, TextItemReader};
use crate::llm::{LlmProvider, LlmRequest};
use crate::output::JsonObjectWriter;
use crate::retry::generate_with_retry;
use crate::status::StatusReporter;

/// Assigns one label per text.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    /// Classify a batch. On success, returns one label per input, in order.
    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<String>, PipelineError>;
}

/// Classifies by prompting an LLM with the label set and optional examples.
pub struct PromptClassifier {
    provider: Box<dyn LlmProvider>,
    labels: LabelSet,
    instruction: Option<String>,
    max_tokens: u32,
    retry: RetryConfig,
}

impl PromptClassifier {
    pub fn new(
        provider: Box<dyn LlmProvider>,
        labels: LabelSet,
        instruction: Option<String>,
        max_tokens: u32,
        retry: RetryConfig,
    ) -> Self {
        if labels.is_few_shot() {
            tracing::info!(
                "Few-shot classification with {} examples over {} labels",
                labels.examples().len(),
                labels.labels().len()
            );
        } else {
            tracing::info!(
                "Zero-shot classification over {} labels",
                labels.labels().len()
            );
        }
        Self {
            provider,
            labels,
            instruction: instruction.filter(|i| !i.trim().is_empty()),
            max_tokens,
            retry,
        }
    }

    fn build_prompt(&self, text: &str) -> String {
        let mut prompt = String::new();
        if let Some(instruction) = &self.instruction {
            prompt.push_str(instruction.trim());
            prompt.push_str("\n\n");
        }
        prompt.push_str("Classify the text into exactly one of these labels: ");
        prompt.push_str(&self.labels.labels().join(", "));
        prompt.push_str(".\nRespond with the label only.\n\n");

        if self.labels.is_few_shot() {
            prompt.push_str("Examples:\n");
            for (example, label) in self.labels.examples() {
                prompt.push_str(&format!("Text: {example}\nLabel: {label}\n\n"));
            }
        }

        prompt.push_str(&format!("Text: {text}\nLabel:"));
        prompt
    }
}

#[async_trait]
impl TextClassifier for PromptClassifier {
    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<String>, PipelineError> {
        let mut predictions = Vec::with_capacity(texts.len());
        for text in texts {
            let request = LlmRequest::text(self.build_prompt(text), self.max_tokens);
            let response = generate_with_retry(
                self.provider.as_ref(),
                &request,
                &self.retry,
                Path::new(self.provider.name()),
            )
            .await?;
            predictions.push(map_reply(&response.text, self.labels.labels()));
        }
        Ok(predictions)
    }
}

/// Map a free-form model reply onto the label set.
///
/// Tries an exact case-insensitive match, then the longest label contained in
/// the reply, and falls back to the trimmed reply itself.
pub fn map_reply(reply: &str, labels: &[String]) -> String {
    let cleaned = reply
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c.is_whitespace());
    let lower = cleaned.to_lowercase();

    if let Some(label) = labels.iter().find(|l| l.to_lowercase() == lower) {
        return label.clone();
    }

    labels
        .iter()
        .filter(|l| !l.is_empty() && lower.contains(&l.to_lowercase()))
        .max_by_key(|l| l.len())
        .cloned()
        .unwrap_or_else(|| reply.trim().to_string())
}

#[derive(Debug, Clone)]
pub struct ClassifyTextOptions {
    pub input_file: PathBuf,
    pub output_dir: PathBuf,
    pub batch_size: usize,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every input line was classified
    Finished,
    /// A line could not be parsed; earlier items were saved
    HaltedOnInput,
    /// A batch got no predictions; earlier batches were saved
    HaltedOnModel,
}

/// Summary of a classification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRunSummary {
    pub classified: usize,
    pub completion: Completion,
}

/// Items waiting to be classified. A repeated id replaces the earlier text.
#[derive(Default)]
struct Batch {
    ids: Vec<String>,
    texts: Vec<String>,
}

impl Batch {
    fn insert(&mut self, id: String, text: String) {
        match self.ids.iter().position(|existing| *existing == id) {
            Some(i) => self.texts[i] = text,
            None => {
                self.ids.push(id);
                self.texts.push(text);
            }
        }
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn clear(&mut self) {
        self.ids.clear();
        self.texts.clear();
    }
}

/// Classify a batch and append it to the output. Returns false when the
/// classifier produced no usable predictions.
async fn flush_batch<W: Write>(
    batch: &mut Batch,
    classifier: &dyn TextClassifier,
    writer: &mut JsonObjectWriter<W>,
) -> Result<bool, BatchError> {
    if batch.is_empty() {
        return Ok(true);
    }

    let predictions = match classifier.classify_batch(&batch.texts).await {
        Ok(p) if p.len() == batch.len() => p,
        Ok(p) => {
            tracing::error!(
                "Got {} predictions for {} items. Saving results so far and halting.",
                p.len(),
                batch.len()
            );
            return Ok(false);
        }
        Err(e) => {
            tracing::error!("Got no predictions for batch. Saving results so far and halting. ({e})");
            tracing::debug!("Batch was {:?}", batch.ids);
            return Ok(false);
        }
    };

    for (id, label) in batch.ids.iter().zip(&predictions) {
        writer.write_member(id, label)?;
    }
    batch.clear();
    Ok(true)
}

/// Classify every item in the input file.
pub async fn run(
    options: &ClassifyTextOptions,
    classifier: &dyn TextClassifier,
    status: &StatusReporter,
) -> Result<TextRunSummary, BatchError> {
    ensure_output_dir(&options.output_dir)?;
    if !options.input_file.is_file() {
        return Err(SetupError::InputMissing(options.input_file.clone()).into());
    }

    let input = File::open(&options.input_file)?;
    let output_path = options.output_dir.join("results.json");
    let mut writer = JsonObjectWriter::new(BufWriter::new(File::create(&output_path)?));

    let batch_size = options.batch_size.max(1);
    let mut batch = Batch::default();
    let mut completion = Completion::Finished;

    for item in TextItemReader::new(BufReader::new(input)) {
        match item {
            Ok(pairs) => {
                for (id, text) in pairs {
                    batch.insert(id, text);
                }
            }
            Err(e) => {
                tracing::error!(
                    "Error parsing line {} from {} as JSON. Saving results so far and halting.",
                    e.line,
                    options.input_file.display()
                );
                tracing::debug!("Line {}: {}", e.line, e.message);
                completion = Completion::HaltedOnInput;
                break;
            }
        }

        if batch.len() >= batch_size {
            if !flush_batch(&mut batch, classifier, &mut writer).await? {
                completion = Completion::HaltedOnModel;
                break;
            }
            let done = writer.members_written();
            status
                .report(&format!("Classified {done} items"), Some(done as u64))
                .await;
        }
    }

    if completion != Completion::HaltedOnModel && !batch.is_empty() {
        if flush_batch(&mut batch, classifier, &mut writer).await? {
            let done = writer.members_written();
            status
                .report(&format!("Classified {done} items"), Some(done as u64))
                .await;
        } else {
            completion = Completion::HaltedOnModel;
        }
    }

    let classified = writer.members_written();
    writer.finish()?;

    Ok(TextRunSummary {
        classified,
        completion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmResponse;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Labels texts "long" or "short"; can fail on a given batch number.
    struct LengthClassifier {
        batches: AtomicUsize,
        fail_on_batch: Option<usize>,
    }

    impl LengthClassifier {
        fn new(fail_on_batch: Option<usize>) -> Self {
            Self {
                batches: AtomicUsize::new(0),
                fail_on_batch,
            }
        }
    }

    #[async_trait]
    impl TextClassifier for LengthClassifier {
        async fn classify_batch(&self, texts: &[String]) -> Result<Vec<String>, PipelineError> {
            let n = self.batches.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_batch == Some(n) {
                return Err(PipelineError::Llm {
                    message: "down".to_string(),
                    status_code: Some(500),
                });
            }
            Ok(texts
                .iter()
                .map(|t| if t.len() > 5 { "long" } else { "short" }.to_string())
                .collect())
        }
    }

    fn setup(input: &str) -> (tempfile::TempDir, ClassifyTextOptions) {
        let dir = tempfile::tempdir().unwrap();
        let input_file = dir.path().join("input.ndjson");
        std::fs::write(&input_file, input).unwrap();
        let options = ClassifyTextOptions {
            input_file,
            output_dir: dir.path().to_path_buf(),
            batch_size: 2,
        };
        (dir, options)
    }

    fn results(dir: &Path) -> serde_json::Map<String, serde_json::Value> {
        let content = std::fs::read_to_string(dir.join("results.json")).unwrap();
        match serde_json::from_str(&content).unwrap() {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_classifies_all_items_in_batches() {
        let (dir, options) = setup(
            "{\"a\": \"hi\"}\n{\"b\": \"hello there\"}\n{\"c\": \"yo\", \"d\": \"greetings\"}\n{\"e\": \"ok\"}\n",
        );
        let classifier = LengthClassifier::new(None);
        let summary = run(&options, &classifier, &StatusReporter::local())
            .await
            .unwrap();

        assert_eq!(summary.classified, 5);
        assert_eq!(summary.completion, Completion::Finished);
        assert_eq!(classifier.batches.load(Ordering::SeqCst), 3);

        let map = results(dir.path());
        assert_eq!(map.len(), 5);
        assert_eq!(map["a"], "short");
        assert_eq!(map["b"], "long");
        assert_eq!(map["d"], "long");
    }

    #[tokio::test]
    async fn test_output_layout() {
        let (dir, options) = setup("{\"x\": \"hi\"}\n{\"y\": \"longer text\"}\n");
        run(&options, &LengthClassifier::new(None), &StatusReporter::local())
            .await
            .unwrap();
        let content = std::fs::read_to_string(dir.path().join("results.json")).unwrap();
        assert_eq!(content, "{\n  \"x\": \"short\",\n  \"y\": \"long\"\n}");
    }

    #[tokio::test]
    async fn test_malformed_line_halts_and_keeps_earlier_records() {
        let (dir, options) = setup("{\"a\": \"hi\"}\n{\"b\": \"hey\"}\n{\"c\": \"yo\"}\nnot json\n{\"d\": \"late\"}\n");
        let summary = run(&options, &LengthClassifier::new(None), &StatusReporter::local())
            .await
            .unwrap();

        assert_eq!(summary.completion, Completion::HaltedOnInput);
        assert_eq!(summary.classified, 3);
        let map = results(dir.path());
        assert!(map.contains_key("c"));
        assert!(!map.contains_key("d"));
    }

    #[tokio::test]
    async fn test_blank_line_halts_like_malformed_json() {
        let (dir, options) = setup("{\"a\": \"hi\"}\n\n{\"b\": \"later\"}\n");
        let summary = run(&options, &LengthClassifier::new(None), &StatusReporter::local())
            .await
            .unwrap();

        assert_eq!(summary.completion, Completion::HaltedOnInput);
        assert_eq!(summary.classified, 1);
        let map = results(dir.path());
        assert_eq!(map["a"], "short");
        assert!(!map.contains_key("b"));
    }

    #[tokio::test]
    async fn test_failed_batch_halts_with_valid_json() {
        let (dir, options) = setup("{\"a\": \"1\"}\n{\"b\": \"2\"}\n{\"c\": \"3\"}\n{\"d\": \"4\"}\n{\"e\": \"5\"}\n");
        let summary = run(
            &options,
            &LengthClassifier::new(Some(2)),
            &StatusReporter::local(),
        )
        .await
        .unwrap();

        assert_eq!(summary.completion, Completion::HaltedOnModel);
        assert_eq!(summary.classified, 2);
        let map = results(dir.path());
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("a") && map.contains_key("b"));
    }

    #[tokio::test]
    async fn test_first_batch_failure_writes_empty_object() {
        let (dir, options) = setup("{\"a\": \"1\"}\n");
        let summary = run(
            &options,
            &LengthClassifier::new(Some(1)),
            &StatusReporter::local(),
        )
        .await
        .unwrap();
        assert_eq!(summary.classified, 0);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("results.json")).unwrap(),
            "{}"
        );
    }

    #[tokio::test]
    async fn test_duplicate_id_keeps_latest_text() {
        let (dir, mut options) = setup("{\"a\": \"hi\"}\n{\"a\": \"much longer\"}\n");
        options.batch_size = 10;
        run(&options, &LengthClassifier::new(None), &StatusReporter::local())
            .await
            .unwrap();
        let map = results(dir.path());
        assert_eq!(map.len(), 1);
        assert_eq!(map["a"], "long");
    }

    #[tokio::test]
    async fn test_missing_input_is_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let options = ClassifyTextOptions {
            input_file: dir.path().join("missing.ndjson"),
            output_dir: dir.path().to_path_buf(),
            batch_size: 100,
        };
        let err = run(&options, &LengthClassifier::new(None), &StatusReporter::local())
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::Setup(SetupError::InputMissing(_))));
        assert!(!dir.path().join("results.json").exists());
    }

    #[test]
    fn test_map_reply() {
        let labels = vec!["Positive".to_string(), "Negative".to_string(), "Neutral".to_string()];
        assert_eq!(map_reply("positive", &labels), "Positive");
        assert_eq!(map_reply(" \"Negative.\" ", &labels), "Negative");
        assert_eq!(map_reply("I think it is neutral overall", &labels), "Neutral");
        assert_eq!(map_reply("  unsure  ", &labels), "unsure");
    }

    #[test]
    fn test_map_reply_prefers_longest_label() {
        let labels = vec!["cat".to_string(), "category".to_string()];
        assert_eq!(map_reply("the category one", &labels), "category");
    }

    /// Echoes back the last label named in the prompt's label list.
    struct EchoProvider;

    #[async_trait]
    impl LlmProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, PipelineError> {
            let text = if request.prompt.contains("Text: great") {
                "The label is: Positive."
            } else {
                "negative"
            };
            Ok(LlmResponse {
                text: text.to_string(),
                model: "echo".to_string(),
                tokens_used: None,
                latency_ms: 0,
            })
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
    }

    fn labels(few_shot: bool) -> LabelSet {
        let mut map = BTreeMap::new();
        let examples = |e: &str| if few_shot { vec![e.to_string()] } else { vec![] };
        map.insert("Positive".to_string(), examples("I love it"));
        map.insert("Negative".to_string(), examples("Awful"));
        LabelSet::new(map)
    }

    #[test]
    fn test_prompt_zero_and_few_shot() {
        let zero = PromptClassifier::new(
            Box::new(EchoProvider),
            labels(false),
            Some("Sentiment of tweets.".to_string()),
            8,
            RetryConfig::default(),
        );
        let prompt = zero.build_prompt("great day");
        assert!(prompt.starts_with("Sentiment of tweets.\n\n"));
        assert!(prompt.contains("Negative, Positive"));
        assert!(!prompt.contains("Examples:"));
        assert!(prompt.ends_with("Text: great day\nLabel:"));

        let few = PromptClassifier::new(
            Box::new(EchoProvider),
            labels(true),
            None,
            8,
            RetryConfig::default(),
        );
        let prompt = few.build_prompt("meh");
        assert!(prompt.contains("Examples:\nText: Awful\nLabel: Negative\n"));
        assert!(prompt.contains("Text: I love it\nLabel: Positive\n"));
    }

    #[tokio::test]
    async fn test_prompt_classifier_maps_replies() {
        let classifier = PromptClassifier::new(
            Box::new(EchoProvider),
            labels(false),
            None,
            8,
            RetryConfig::default(),
        );
        let labels = classifier
            .classify_batch(&["great stuff".to_string(), "bad".to_string()])
            .await
            .unwrap();
        assert_eq!(labels, vec!["Positive", "Negative"]);
    }
}
