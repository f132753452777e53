//! VLM captioning: one image in, one retrieval-oriented caption out.
//!
//! Intentionally thin — all prompt wording lives in [`crate::prompts`] so it
//! can change without touching retry or error-handling logic here.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from hosted VLM APIs are transient and frequent.
//! Exponential backoff (`retry_backoff_ms * 2^attempt`) avoids hammering a
//! recovering endpoint: with the 500 ms default and 3 retries the wait
//! sequence is 500 ms → 1 s → 2 s.

use crate::config::PipelineConfig;
use crate::error::RecordError;
use crate::prompts::CAPTION_SYSTEM_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Caption one image via the VLM.
///
/// The request is a system prompt plus a user turn carrying the image as a
/// base64 attachment with empty text — VLM APIs require at least one user
/// turn, and the image carries all the content.
///
/// Returns the trimmed caption, or [`RecordError::CaptionFailed`] once all
/// retries are exhausted. A caption failure is per-record: the caller skips
/// the image and keeps extracting.
pub async fn caption_image(
    provider: &Arc<dyn LLMProvider>,
    image_path: &str,
    image_data: ImageData,
    config: &PipelineConfig,
) -> Result<String, RecordError> {
    let messages = vec![
        ChatMessage::system(CAPTION_SYSTEM_PROMPT),
        ChatMessage::user_with_images("", vec![image_data]),
    ];

    let options = CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    };

    let mut last_err: Option<String> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Caption '{}': retry {}/{} after {}ms",
                image_path, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match provider.chat(&messages, Some(&options)).await {
            Ok(response) => {
                debug!(
                    "Caption '{}': {} input tokens, {} output tokens",
                    image_path, response.prompt_tokens, response.completion_tokens
                );
                return Ok(response.content.trim().to_string());
            }
            Err(e) => {
                let msg = format!("{e}");
                warn!(
                    "Caption '{}': attempt {} failed — {}",
                    image_path,
                    attempt + 1,
                    msg
                );
                last_err = Some(msg);
            }
        }
    }

    Err(RecordError::CaptionFailed {
        path: image_path.to_string(),
        retries: config.max_retries as u8,
        detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
    })
}
