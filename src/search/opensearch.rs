//! Production [`SearchIndex`] client for an OpenSearch-compatible engine.
//!
//! Plain REST over `reqwest`: one `POST …/_doc` per document, one
//! `POST …/_search` per query, and a `GET` on the index URL as the readiness
//! probe. Request signing is deliberately out of scope — managed deployments
//! sign at a fronting proxy, self-hosted ones use basic auth, and both are
//! credential concerns that live outside the pipeline. The client carries an
//! optional basic-auth pair and nothing else.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::search::{Readiness, SearchIndex};
use crate::store::IndexedDocument;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

/// REST client for one index on one OpenSearch-compatible endpoint.
pub struct OpenSearchIndex {
    client: reqwest::Client,
    base_url: String,
    index_name: String,
    basic_auth: Option<(String, String)>,
}

impl OpenSearchIndex {
    /// Build a client from the pipeline configuration.
    ///
    /// Fails fast with [`PipelineError::MissingConfig`] when the endpoint or
    /// index name is unset — callers that must fail soft (the Query Engine)
    /// check the config themselves before constructing a client.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let (endpoint, index_name) = config.require_index()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PipelineError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            index_name: index_name.to_string(),
            basic_auth: config.basic_auth.clone(),
        })
    }

    /// The index this client writes to and queries.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/{}{}", self.base_url, self.index_name, suffix)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.basic_auth {
            Some((user, pass)) => request.basic_auth(user, Some(pass)),
            None => request,
        }
    }
}

#[async_trait]
impl SearchIndex for OpenSearchIndex {
    async fn readiness(&self) -> Readiness {
        let response = match self.authed(self.client.get(self.url(""))).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!("Readiness probe transport error: {}", e);
                return Readiness::Unknown;
            }
        };

        match response.status() {
            s if s.is_success() => Readiness::Ready,
            // Policy propagation on a fresh index surfaces as auth failures
            // or as the index not existing yet.
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                Readiness::Pending
            }
            s => {
                debug!("Readiness probe returned HTTP {}", s);
                Readiness::Unknown
            }
        }
    }

    async fn put_document(&self, doc: &IndexedDocument) -> Result<(), PipelineError> {
        let response = self
            .authed(self.client.post(self.url("/_doc")))
            .json(doc)
            .send()
            .await
            .map_err(|e| PipelineError::IndexRequest {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(
                "Indexed '{}' (page {}) → HTTP {}",
                doc.image_file_name, doc.page_number, status
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(
            "Index write rejected for '{}': HTTP {} {}",
            doc.image_file_name,
            status,
            truncate(&body, 200)
        );
        Err(PipelineError::IndexRequest {
            detail: format!("HTTP {status}: {}", truncate(&body, 200)),
        })
    }

    async fn query(&self, body: &serde_json::Value) -> Result<serde_json::Value, PipelineError> {
        let response = self
            .authed(self.client.post(self.url("/_search")))
            .json(body)
            .send()
            .await
            .map_err(|e| PipelineError::IndexRequest {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::IndexRequest {
                detail: format!("HTTP {status}: {}", truncate(&text, 200)),
            });
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| PipelineError::IndexRequest {
                detail: format!("response decode: {e}"),
            })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
