//! Image captioning with a vision LLM.
//!
//! Writes `<output>/<dataset>.ndjson` with one `{"<file>": {"text": ..}}`
//! line per captioned image.

use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use super::{ensure_output_dir, RunContext};
use crate::error::BatchError;
use crate::input::{file_name, list_folder};
use crate::llm::{ImageInput, LlmProvider, LlmRequest};
use crate::output::NdjsonWriter;
use crate::retry::generate_with_retry;

/// What to caption and where to put the results.
#[derive(Debug, Clone)]
pub struct CaptionOptions {
    pub image_folder: PathBuf,
    pub output_dir: PathBuf,
    pub dataset_name: String,
    pub prompt: String,
    pub max_tokens: u32,
}

/// Per-image caption record.
#[derive(Debug, Clone, Serialize)]
pub struct Caption {
    pub text: String,
}

/// Caption every image in the folder. Returns the number of records written.
pub async fn run(
    options: &CaptionOptions,
    provider: &dyn LlmProvider,
    ctx: &RunContext,
) -> Result<usize, BatchError> {
    ensure_output_dir(&options.output_dir)?;
    let images = list_folder(&options.image_folder)?;

    let output_path = options
        .output_dir
        .join(format!("{}.ndjson", options.dataset_name));
    let mut writer = NdjsonWriter::new(BufWriter::new(File::create(&output_path)?));

    tracing::debug!(
        "Captioning {} files with {} into {:?}",
        images.len(),
        provider.name(),
        output_path
    );

    for path in &images {
        let name = file_name(path);

        let image = match ctx.loader.load(path) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!("Unable to open image {name}: {e}");
                continue;
            }
        };

        let jpeg = match image.to_jpeg() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Unable to encode image {name}: {e}");
                continue;
            }
        };

        let request = LlmRequest::caption(ImageInput::jpeg(&jpeg), &options.prompt, options.max_tokens);
        let response = match generate_with_retry(provider, &request, &ctx.retry, path).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Captioning failed for {name}: {e}");
                continue;
            }
        };

        tracing::debug!(
            "{name}: captioned by {} in {}ms ({} tokens)",
            response.model,
            response.latency_ms,
            response
                .tokens_used
                .map_or_else(|| "?".to_string(), |t| t.to_string())
        );
        writer.write_keyed(
            &name,
            &Caption {
                text: response.text.trim().to_string(),
            },
        )?;
        writer.flush()?;

        let done = writer.records_written();
        ctx.status
            .report(&format!("Processed {done} images"), Some(done as u64))
            .await;
    }

    let done = writer.records_written();
    writer.flush()?;
    ctx.status
        .report(&format!("Finished w/ {done} images"), Some(done as u64))
        .await;
    Ok(done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PipelineError, SetupError};
    use crate::input::decode::fixtures;
    use crate::llm::LlmResponse;
    use crate::tasks::testing::{context, read_ndjson};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Replies with a fixed caption; fails on every `fail_every`-th call.
    struct FakeCaptioner {
        calls: AtomicUsize,
        fail_every: Option<usize>,
    }

    impl FakeCaptioner {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_every: None,
            }
        }
    }

    #[async_trait]
    impl LlmProvider for FakeCaptioner {
        fn name(&self) -> &str {
            "fake"
        }

        async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, PipelineError> {
            assert!(request.image.is_some());
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_every.is_some_and(|k| n % k == 0) {
                return Err(PipelineError::Llm {
                    message: "HTTP 400".to_string(),
                    status_code: Some(400),
                });
            }
            Ok(LlmResponse {
                text: format!("  {}  ", request.prompt),
                model: "fake".to_string(),
                tokens_used: None,
                latency_ms: 0,
            })
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
    }

    fn options(images: &std::path::Path, out: &std::path::Path) -> CaptionOptions {
        CaptionOptions {
            image_folder: images.to_path_buf(),
            output_dir: out.to_path_buf(),
            dataset_name: "captions".to_string(),
            prompt: "a photo of".to_string(),
            max_tokens: 20,
        }
    }

    #[tokio::test]
    async fn test_skips_corrupt_images() {
        let images = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fixtures::write_png(images.path(), "a.png", 8, 8);
        fixtures::write_rgba_png(images.path(), "b.png");
        fixtures::write_corrupt(images.path(), "c.jpg");
        std::fs::write(images.path().join("notes.txt"), "hello").unwrap();

        let done = run(
            &options(images.path(), out.path()),
            &FakeCaptioner::new(),
            &context(),
        )
        .await
        .unwrap();
        assert_eq!(done, 2);

        let records = read_ndjson(&out.path().join("captions.ndjson"));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["a.png"]["text"], "a photo of");
        assert!(records[1].get("b.png").is_some());
    }

    #[tokio::test]
    async fn test_long_thin_image_is_captioned() {
        let images = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fixtures::write_png(images.path(), "a.png", 4, 4);
        fixtures::write_png(images.path(), "panorama.png", 10_001, 2);

        let done = run(
            &options(images.path(), out.path()),
            &FakeCaptioner::new(),
            &context(),
        )
        .await
        .unwrap();
        assert_eq!(done, 2);
        let records = read_ndjson(&out.path().join("captions.ndjson"));
        assert!(records[1].get("panorama.png").is_some());
    }

    #[tokio::test]
    async fn test_model_failure_skips_image() {
        let images = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        for name in ["1.png", "2.png", "3.png"] {
            fixtures::write_png(images.path(), name, 4, 4);
        }
        let provider = FakeCaptioner {
            calls: AtomicUsize::new(0),
            fail_every: Some(2),
        };

        let done = run(&options(images.path(), out.path()), &provider, &context())
            .await
            .unwrap();
        assert_eq!(done, 2);
        let records = read_ndjson(&out.path().join("captions.ndjson"));
        assert!(records[0].get("1.png").is_some());
        assert!(records[1].get("3.png").is_some());
    }

    #[tokio::test]
    async fn test_missing_output_dir_creates_nothing() {
        let images = tempfile::tempdir().unwrap();
        fixtures::write_png(images.path(), "a.png", 4, 4);
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("missing");

        let err = run(&options(images.path(), &missing), &FakeCaptioner::new(), &context())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BatchError::Setup(SetupError::OutputDirMissing(_))
        ));
        assert!(!missing.exists());
    }

    #[tokio::test]
    async fn test_missing_image_folder_creates_no_output() {
        let root = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();

        let err = run(
            &options(&root.path().join("nope"), out.path()),
            &FakeCaptioner::new(),
            &context(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            BatchError::Setup(SetupError::ImageFolderMissing(_))
        ));
        assert!(!out.path().join("captions.ndjson").exists());
    }
}
