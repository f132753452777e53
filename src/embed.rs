//! The Embedding Adapter: text → fixed-dimension vector, or nothing.
//!
//! ## Why `Option`, not `Result`?
//!
//! The adapter contract is `(text) -> vector | null`. A `None` means "no
//! vector available" and is a *degraded-but-valid* outcome: the document is
//! indexed without `content_vector`, unreachable by k-NN but still reachable
//! by exact-field queries. Modelling unavailability as an error would tempt
//! callers into aborting a run that the design says must continue, so
//! implementations log their own failures and return `None`.
//!
//! Two implementations:
//!
//! * [`TitanEmbedder`] — a remote Titan-style embedding endpoint over HTTP
//!   (`{"inputText": …}` in, `{"embedding": […]}` out).
//! * [`HashEmbedder`] — deterministic offline pseudo-vectors from token
//!   hashing. No network, no model weights; used in tests and air-gapped
//!   runs where relative similarity of overlapping texts is enough.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tracing::{debug, warn};

/// Produces a fixed-dimension embedding for a text, or signals unavailability.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text`. `None` means "no vector available", never an error
    /// to propagate.
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;
}

// ── Remote embedder ──────────────────────────────────────────────────────

/// A Titan-style remote embedding endpoint.
///
/// Sends `{"inputText": <text>}` and expects `{"embedding": [f32, …]}`.
/// Any transport or decode failure is logged and surfaces as `None`.
pub struct TitanEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl TitanEmbedder {
    /// Create an embedder for `endpoint`, with an optional bearer token.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl Embedder for TitanEmbedder {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let mut request = self.client.post(&self.endpoint).json(&json!({
            "inputText": text,
        }));
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Embedding request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("Embedding endpoint returned HTTP {}", response.status());
            return None;
        }

        match response.json::<EmbeddingResponse>().await {
            Ok(body) if body.embedding.is_empty() => {
                warn!("Embedding endpoint returned an empty vector");
                None
            }
            Ok(body) => {
                debug!("Embedded {} chars → {} dims", text.len(), body.embedding.len());
                Some(body.embedding)
            }
            Err(e) => {
                warn!("Embedding response decode failed: {}", e);
                None
            }
        }
    }
}

// ── Offline embedder ─────────────────────────────────────────────────────

/// Deterministic token-hash embedder.
///
/// Each lowercased whitespace token hashes into one of `dimension` buckets;
/// the bucket counts are L2-normalised. Texts sharing tokens land near each
/// other under cosine distance, and identical texts embed identically, which
/// is exactly what round-trip tests need. Whitespace-only text has no tokens
/// and embeds to `None`, same as a remote adapter with nothing to say.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Default dimension, matching common hosted text-embedding models.
    pub const DEFAULT_DIMENSION: usize = 1536;

    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        let mut tokens = 0usize;

        for token in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
            tokens += 1;
        }

        if tokens == 0 {
            return None;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        for v in &mut vector {
            *v /= norm;
        }
        Some(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("revenue by quarter").await.unwrap();
        let b = embedder.embed("revenue by quarter").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn hash_embedder_normalises() {
        let embedder = HashEmbedder::default();
        let v = embedder.embed("one two three four").await.unwrap();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {norm}");
    }

    #[tokio::test]
    async fn overlapping_texts_are_closer_than_disjoint_ones() {
        let embedder = HashEmbedder::new(256);
        let base = embedder.embed("solar panel installation diagram").await.unwrap();
        let near = embedder.embed("solar panel wiring diagram").await.unwrap();
        let far = embedder.embed("quarterly meeting agenda").await.unwrap();
        assert!(cosine(&base, &near) > cosine(&base, &far));
    }

    #[tokio::test]
    async fn empty_text_embeds_to_none() {
        let embedder = HashEmbedder::default();
        assert!(embedder.embed("").await.is_none());
        assert!(embedder.embed("   \n\t").await.is_none());
    }

    #[tokio::test]
    async fn case_is_folded() {
        let embedder = HashEmbedder::new(128);
        let lower = embedder.embed("annual report").await.unwrap();
        let mixed = embedder.embed("Annual REPORT").await.unwrap();
        assert_eq!(lower, mixed);
    }
}
