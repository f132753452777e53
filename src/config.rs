//! Configuration types for the indexing and query pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share a config between the Indexing Engine and the Query
//! Engine, and to diff two runs to understand why their outputs differ.
//!
//! The search endpoint and index name are `Option`s on purpose: the Query
//! Engine's contract is to fail soft (log + empty hits) when they are unset,
//! while the Indexing Engine fails fast with
//! [`PipelineError::MissingConfig`](crate::error::PipelineError::MissingConfig).
//! Both behaviours need an "unset" state that is distinct from an empty
//! string a user exported by accident.

use crate::error::PipelineError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Default settling interval after creating a search index, in seconds.
///
/// Access-policy propagation on a freshly provisioned index is asynchronous;
/// 45 s is the reference delay the managed engines need in practice. A policy
/// knob, not a hard constant — override with
/// [`PipelineConfigBuilder::settle_secs`].
pub const DEFAULT_SETTLE_SECS: u64 = 45;

/// Default per-request timeout against the search engine, in seconds.
///
/// Generous on purpose: a just-provisioned or temporarily overloaded index
/// can hold a request for a long time before answering.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Configuration for the extraction → embedding → indexing → query pipeline.
///
/// Built via [`PipelineConfig::builder()`] or [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2search::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .endpoint("https://search.example.com")
///     .index_name("pdf-pages")
///     .settle_secs(45)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Search engine endpoint URL, e.g. `https://xyz.aoss.example.com`.
    /// `None` means unconfigured (see module docs for the two failure modes).
    pub endpoint: Option<String>,

    /// Name of the search index documents are written to and queried from.
    pub index_name: Option<String>,

    /// Region identifier forwarded to hosted-model sessions. Default: "ap-northeast-2".
    pub region: String,

    /// Basic-auth credentials for the search engine, if it uses them.
    /// Managed deployments that sign requests at a fronting proxy leave this `None`.
    pub basic_auth: Option<(String, String)>,

    /// Settling interval for a freshly created index, in seconds. Default: 45.
    ///
    /// Used two ways: as the total budget for readiness polling, and as the
    /// fixed fallback sleep when the engine exposes no readiness signal.
    pub settle_secs: u64,

    /// Initial interval between readiness probes while settling, in seconds
    /// (doubles per probe, capped by the remaining budget). Default: 5.
    pub readiness_poll_secs: u64,

    /// Per-request timeout against the search engine, in seconds. Default: 300.
    pub request_timeout_secs: u64,

    /// Maximum rendered page dimension (width or height) in pixels. Default: 2000.
    ///
    /// A safety cap: an A0 poster rendered unbounded could produce a
    /// 13 000 × 18 000 px image and exhaust memory. Either dimension is
    /// capped, the other scales proportionally.
    pub max_rendered_pixels: u32,

    /// Captioning model identifier, e.g. "gpt-4.1-nano". `None` uses the provider default.
    pub model: Option<String>,

    /// Captioning provider name (e.g. "openai", "anthropic").
    /// `None` along with `provider` means auto-detect from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed captioning provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Maximum retry attempts on a transient caption API failure. Default: 3.
    pub max_retries: u32,

    /// Initial caption retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Maximum tokens the captioning model may generate per image. Default: 1024.
    pub max_tokens: usize,

    /// Sampling temperature for captioning. Default: 0.1.
    ///
    /// Low temperature keeps the caption faithful to what is on the page,
    /// which is what the embedding should represent.
    pub temperature: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            index_name: None,
            region: "ap-northeast-2".to_string(),
            basic_auth: None,
            settle_secs: DEFAULT_SETTLE_SECS,
            readiness_poll_secs: 5,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_rendered_pixels: 2000,
            model: None,
            provider_name: None,
            provider: None,
            max_retries: 3,
            retry_backoff_ms: 500,
            max_tokens: 1024,
            temperature: 0.1,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("endpoint", &self.endpoint)
            .field("index_name", &self.index_name)
            .field("region", &self.region)
            .field("basic_auth", &self.basic_auth.as_ref().map(|(u, _)| u))
            .field("settle_secs", &self.settle_secs)
            .field("readiness_poll_secs", &self.readiness_poll_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Both index coordinates, or the first missing one as a fatal error.
    ///
    /// The Indexing Engine calls this before any work is attempted; the
    /// Query Engine calls it too but maps the error to empty hits.
    pub fn require_index(&self) -> Result<(&str, &str), PipelineError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(PipelineError::MissingConfig { field: "endpoint" })?;
        let index_name = self
            .index_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(PipelineError::MissingConfig { field: "index_name" })?;
        Ok((endpoint, index_name))
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = Some(url.into());
        self
    }

    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.config.index_name = Some(name.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = region.into();
        self
    }

    pub fn basic_auth(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.config.basic_auth = Some((user.into(), pass.into()));
        self
    }

    pub fn settle_secs(mut self, secs: u64) -> Self {
        self.config.settle_secs = secs;
        self
    }

    pub fn readiness_poll_secs(mut self, secs: u64) -> Self {
        self.config.readiness_poll_secs = secs.max(1);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.readiness_poll_secs > c.settle_secs && c.settle_secs > 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "readiness_poll_secs ({}) must not exceed settle_secs ({})",
                c.readiness_poll_secs, c.settle_secs
            )));
        }
        if let Some(ref e) = c.endpoint {
            if !e.starts_with("http://") && !e.starts_with("https://") {
                return Err(PipelineError::InvalidConfig(format!(
                    "endpoint must be an HTTP/HTTPS URL, got '{}'",
                    e
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Search mode ──────────────────────────────────────────────────────────

/// Which subset of the index a query runs against.
///
/// A closed two-variant enum rather than a free string: the original wire
/// protocol dispatched on `"imagesearch"` and treated *every* other string
/// as a content search, which silently swallowed typos. Unknown strings are
/// rejected as [`PipelineError::InvalidMode`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Search cropped sub-images (`image_type == "sub"`).
    Image,
    /// Search full-page renders (`image_type == "main"`).
    Content,
}

impl SearchMode {
    /// The `image_type` term value this mode filters on.
    pub fn filter_value(&self) -> &'static str {
        match self {
            SearchMode::Image => "sub",
            SearchMode::Content => "main",
        }
    }
}

impl FromStr for SearchMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "imagesearch" | "image" => Ok(SearchMode::Image),
            "contentsearch" | "content" => Ok(SearchMode::Content),
            other => Err(PipelineError::InvalidMode {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Image => write!(f, "imagesearch"),
            SearchMode::Content => write!(f, "contentsearch"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.settle_secs, 45);
        assert_eq!(config.request_timeout_secs, 300);
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn require_index_reports_first_missing_field() {
        let config = PipelineConfig::builder()
            .index_name("pdf-pages")
            .build()
            .unwrap();
        match config.require_index() {
            Err(PipelineError::MissingConfig { field }) => assert_eq!(field, "endpoint"),
            other => panic!("expected MissingConfig, got {other:?}"),
        }
    }

    #[test]
    fn require_index_rejects_empty_strings() {
        let config = PipelineConfig::builder()
            .endpoint("https://search.example.com")
            .build()
            .unwrap();
        let mut config = config;
        config.index_name = Some(String::new());
        assert!(matches!(
            config.require_index(),
            Err(PipelineError::MissingConfig { field: "index_name" })
        ));
    }

    #[test]
    fn build_rejects_non_http_endpoint() {
        let result = PipelineConfig::builder().endpoint("search.example.com").build();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn build_rejects_poll_longer_than_settle() {
        let result = PipelineConfig::builder()
            .settle_secs(2)
            .readiness_poll_secs(10)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("imagesearch".parse::<SearchMode>().unwrap(), SearchMode::Image);
        assert_eq!(
            "contentsearch".parse::<SearchMode>().unwrap(),
            SearchMode::Content
        );
        assert!(matches!(
            "hybridsearch".parse::<SearchMode>(),
            Err(PipelineError::InvalidMode { .. })
        ));
    }

    #[test]
    fn mode_filter_values() {
        assert_eq!(SearchMode::Image.filter_value(), "sub");
        assert_eq!(SearchMode::Content.filter_value(), "main");
    }
}
