//! The Extraction Adapter: PDF → image files + metadata store.
//!
//! Orchestrates the pipeline stages end to end: rasterise every page and
//! its embedded images ([`crate::pipeline::render`]), caption each one
//! through the VLM ([`crate::pipeline::caption`]), write the captioned
//! image to the output directory as PNG, and record the result in the
//! metadata store file the Indexing Engine will read. Only captioned images
//! reach the output directory; every file there has a store entry.
//!
//! Captioning is sequential, one image at a time — the whole pipeline is a
//! chain of blocking network calls by design, and extraction is the cheap
//! end of it.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, RecordError};
use crate::pipeline::{caption, encode, render};
use crate::store::{ImageRecord, ImageType, MetadataStore};
use edgequake_llm::{LLMProvider, ProviderFactory};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// File name of the metadata store inside the output directory.
pub const METADATA_FILE: &str = "metadata.json";

/// What one extraction run produced.
#[derive(Debug)]
pub struct ExtractReport {
    /// Pages in the source document.
    pub pages: usize,
    /// Records written to the metadata store (mains + subs).
    pub extracted: usize,
    /// Images dropped (encode or caption failure).
    pub skipped: usize,
    /// Location of the metadata store file.
    pub store_path: PathBuf,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
    /// One entry per skipped image, in page order.
    pub errors: Vec<RecordError>,
}

/// Extract page images, sub-images, and captions from a PDF.
///
/// Writes one PNG per image plus [`METADATA_FILE`] into `out_dir` and
/// returns the report. Per-image failures skip that image and continue;
/// only an unreadable PDF, a missing provider, or an unwritable output
/// directory is fatal.
pub async fn extract_images_and_metadata(
    pdf_path: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<ExtractReport, PipelineError> {
    let start = Instant::now();
    let pdf_path = pdf_path.as_ref();
    let out_dir = out_dir.as_ref();
    info!("Extracting '{}' into '{}'", pdf_path.display(), out_dir.display());

    let provider = resolve_provider(config)?;

    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| PipelineError::OutputWriteFailed {
            path: out_dir.to_path_buf(),
            source: e,
        })?;

    let rendered = render::render_document(pdf_path, config.max_rendered_pixels).await?;
    let pages = rendered.len();

    let mut store = MetadataStore::default();
    let mut skipped = 0usize;
    let mut errors = Vec::new();

    for page in &rendered {
        let mut page_images = vec![(
            image_file_name(page.page_number, None),
            &page.image,
            ImageType::Main,
        )];
        for (i, sub) in page.embedded.iter().enumerate() {
            page_images.push((
                image_file_name(page.page_number, Some(i)),
                sub,
                ImageType::Sub,
            ));
        }

        for (file_name, img, image_type) in page_images {
            let image_path = out_dir.join(&file_name);

            let text = match write_captioned_image(&provider, img, &image_path, config).await? {
                Ok(t) => t,
                Err(err) => {
                    error!("{err} — skipping");
                    errors.push(err);
                    skipped += 1;
                    continue;
                }
            };

            let image_path_str = image_path.to_string_lossy().into_owned();
            info!(
                "Extracted '{}' (page {}, {}): {:?}",
                image_path_str,
                page.page_number,
                image_type.as_str(),
                truncate_for_log(&text)
            );
            store.push(ImageRecord {
                page_number: page.page_number,
                image_path: image_path_str,
                text,
                image_type,
            });
        }
    }

    let store_path = out_dir.join(METADATA_FILE);
    store.save(&store_path).await?;

    let report = ExtractReport {
        pages,
        extracted: store.len(),
        skipped,
        store_path,
        duration_ms: start.elapsed().as_millis() as u64,
        errors,
    };
    info!(
        "Extraction complete: {} pages, {} records, {} skipped, {}ms",
        report.pages, report.extracted, report.skipped, report.duration_ms
    );
    Ok(report)
}

/// Encode, caption, then persist one image.
///
/// The PNG hits the output directory only after captioning succeeds, so a
/// skipped record never leaves an orphan file behind. The outer error is
/// fatal (the output directory is unwritable); the inner error skips just
/// this image (encode or caption failure).
async fn write_captioned_image(
    provider: &Arc<dyn LLMProvider>,
    img: &DynamicImage,
    image_path: &Path,
    config: &PipelineConfig,
) -> Result<Result<String, RecordError>, PipelineError> {
    let image_path_str = image_path.to_string_lossy();

    let png = match encode::png_bytes(img) {
        Ok(b) => b,
        Err(e) => {
            return Ok(Err(RecordError::ImageUnreadable {
                path: image_path_str.into_owned(),
                detail: format!("PNG encode: {e}"),
            }))
        }
    };

    let text = match caption::caption_image(
        provider,
        &image_path_str,
        encode::to_image_data(&png),
        config,
    )
    .await
    {
        Ok(t) => t,
        Err(err) => return Ok(Err(err)),
    };

    tokio::fs::write(image_path, &png)
        .await
        .map_err(|e| PipelineError::OutputWriteFailed {
            path: image_path.to_path_buf(),
            source: e,
        })?;

    Ok(Ok(text))
}

/// File name for a page render or one of its sub-images.
fn image_file_name(page_number: u32, sub_index: Option<usize>) -> String {
    match sub_index {
        None => format!("page_{page_number}.png"),
        Some(i) => format!("page_{page_number}_img_{i}.png"),
    }
}

fn truncate_for_log(text: &str) -> &str {
    match text.char_indices().nth(80) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Resolve the captioning provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — used as-is; this is how
///    tests inject a fake.
/// 2. **Named provider + model** (`config.provider_name`) — the factory
///    reads the matching API key from the environment.
/// 3. **Full auto-detection** (`ProviderFactory::from_env`) — scans known
///    API key variables and picks the first available provider.
fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            PipelineError::ProviderNotConfigured {
                provider: name.clone(),
                hint: format!("{e}"),
            }
        });
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PipelineError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No caption provider could be auto-detected from the environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {e}"
            ),
        })?;
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use edgequake_llm::{ChatMessage, CompletionOptions, LLMResponse, LlmError};
    use image::{Rgba, RgbaImage};
    use tempfile::tempdir;

    /// Answers every chat with the same caption, or always errors.
    struct ScriptedProvider {
        caption: Option<&'static str>,
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-vlm"
        }

        fn max_context_length(&self) -> usize {
            128_000
        }

        async fn complete(&self, prompt: &str) -> edgequake_llm::Result<LLMResponse> {
            self.complete_with_options(prompt, &CompletionOptions::default())
                .await
        }

        async fn complete_with_options(
            &self,
            _prompt: &str,
            _options: &CompletionOptions,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.chat(&[], None).await
        }

        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<LLMResponse> {
            match self.caption {
                Some(text) => Ok(LLMResponse::new(text, self.model())),
                None => Err(LlmError::ApiError("quota exhausted".to_string())),
            }
        }
    }

    fn provider(caption: Option<&'static str>) -> Arc<dyn LLMProvider> {
        Arc::new(ScriptedProvider { caption })
    }

    fn no_retry_config(provider: &Arc<dyn LLMProvider>) -> PipelineConfig {
        PipelineConfig::builder()
            .provider(Arc::clone(provider))
            .max_retries(0)
            .build()
            .unwrap()
    }

    fn test_image() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([32, 64, 128, 255])))
    }

    #[tokio::test]
    async fn captioned_image_is_written_with_its_caption() {
        let dir = tempdir().unwrap();
        let provider = provider(Some("a small blue square"));
        let config = no_retry_config(&provider);
        let path = dir.path().join("page_1.png");

        let text = write_captioned_image(&provider, &test_image(), &path, &config)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(text, "a small blue square");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn failed_caption_leaves_no_image_file() {
        let dir = tempdir().unwrap();
        let provider = provider(None);
        let config = no_retry_config(&provider);
        let path = dir.path().join("page_1.png");

        let outcome = write_captioned_image(&provider, &test_image(), &path, &config)
            .await
            .unwrap();

        assert!(matches!(outcome, Err(RecordError::CaptionFailed { .. })));
        // The skipped record must not leave an orphan PNG behind.
        assert!(!path.exists());
    }

    #[test]
    fn file_names_are_unique_per_page_and_object() {
        assert_eq!(image_file_name(3, None), "page_3.png");
        assert_eq!(image_file_name(3, Some(0)), "page_3_img_0.png");
        assert_eq!(image_file_name(12, Some(4)), "page_12_img_4.png");
    }

    #[test]
    fn resolve_provider_prefers_the_injected_one() {
        // No provider, no name, no env keys in CI → the auto path errors.
        // (The injected-provider path is exercised by the integration suite.)
        let config = PipelineConfig::default();
        if std::env::var("OPENAI_API_KEY").is_err()
            && std::env::var("ANTHROPIC_API_KEY").is_err()
            && std::env::var("GEMINI_API_KEY").is_err()
        {
            assert!(matches!(
                resolve_provider(&config),
                Err(PipelineError::ProviderNotConfigured { .. })
            ));
        }
    }
}
