//! The Indexing Engine: metadata store → search index.
//!
//! One pass, sequential, one write per record. For each store entry the
//! engine loads the image bytes, asks the Embedding Adapter for a vector,
//! assembles an [`IndexedDocument`] and submits it. There is no batching and
//! no cross-record transactionality: a failure partway leaves a partial set
//! of documents indexed, and the [`IngestReport`] is how callers audit that.
//!
//! ## Failure policy (per record)
//!
//! * unreadable image → skip, log at `error`, count in `skipped`;
//! * missing embedding → index the document without `content_vector`
//!   (degraded, not an error), count in `missing_vector`;
//! * rejected write → skip, log the failing `image_path`, count in `skipped` —
//!   except the very first write, which gets one bounded re-wait + retry
//!   because an immediate post-creation rejection is usually policy
//!   propagation, not a bad document.

use crate::config::PipelineConfig;
use crate::embed::Embedder;
use crate::error::{PipelineError, RecordError};
use crate::search::{wait_until_writable, OpenSearchIndex, SearchIndex};
use crate::store::{IndexedDocument, MetadataStore};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What one ingest run did, record by record.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Records present in the metadata store.
    pub total_records: usize,
    /// Documents the index acknowledged.
    pub indexed: usize,
    /// Records dropped (unreadable image or rejected write).
    pub skipped: usize,
    /// Documents indexed without a `content_vector`.
    pub missing_vector: usize,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
    /// One entry per skipped record, in store order.
    pub errors: Vec<RecordError>,
}

/// Ingest a metadata store into the configured index.
///
/// Fails fast with [`PipelineError::MissingConfig`] before any work when the
/// endpoint or index name is unset, then delegates to [`index_all`] with a
/// production [`OpenSearchIndex`] client.
pub async fn ingest(
    config: &PipelineConfig,
    embedder: &dyn Embedder,
    store_path: impl AsRef<Path>,
) -> Result<IngestReport, PipelineError> {
    let index = OpenSearchIndex::from_config(config)?;
    index_all(store_path, embedder, &index, config).await
}

/// Core of the Indexing Engine, generic over the index handle.
///
/// Records are processed in the store's iteration order; the order is not
/// semantically significant (the index is a set), it just makes logs and
/// reports reproducible.
pub async fn index_all(
    store_path: impl AsRef<Path>,
    embedder: &dyn Embedder,
    index: &dyn SearchIndex,
    config: &PipelineConfig,
) -> Result<IngestReport, PipelineError> {
    let start = Instant::now();
    let store_path = store_path.as_ref();

    let store = MetadataStore::load(store_path).await?;
    info!(
        "Metadata store '{}' loaded: {} records",
        store_path.display(),
        store.len()
    );

    // Settle before the first write; see crate::search for why.
    wait_until_writable(index, config).await;

    let mut report = IngestReport {
        total_records: store.len(),
        ..IngestReport::default()
    };
    let mut propagation_retry_spent = false;

    for record in store.records() {
        let bytes = match tokio::fs::read(&record.image_path).await {
            Ok(b) => b,
            Err(e) => {
                let err = RecordError::ImageUnreadable {
                    path: record.image_path.clone(),
                    detail: e.to_string(),
                };
                error!("{err} — skipping");
                report.errors.push(err);
                report.skipped += 1;
                continue;
            }
        };

        let content_vector = embedder.embed(&record.text).await;
        if content_vector.is_none() {
            debug!(
                "No embedding for '{}'; indexing without content_vector",
                record.image_path
            );
            report.missing_vector += 1;
        }

        let doc = IndexedDocument {
            page_number: record.page_number,
            image_file_name: record.image_path.clone(),
            text: record.text.clone(),
            image_type: record.image_type,
            image: BASE64.encode(&bytes),
            content_vector,
        };

        match index.put_document(&doc).await {
            Ok(()) => {
                info!(
                    "Indexed '{}' (page {}, {})",
                    doc.image_file_name,
                    doc.page_number,
                    doc.image_type.as_str()
                );
                report.indexed += 1;
            }
            Err(e) if report.indexed == 0 && !propagation_retry_spent => {
                // Nothing has landed yet, so this rejection is most likely
                // the propagation window still closing. One re-wait, one
                // retry; a second rejection means the index is unusable.
                propagation_retry_spent = true;
                warn!(
                    "First write rejected ({e}); re-waiting for propagation and retrying once"
                );
                wait_until_writable(index, config).await;
                match index.put_document(&doc).await {
                    Ok(()) => {
                        info!(
                            "Indexed '{}' (page {}) after propagation retry",
                            doc.image_file_name, doc.page_number
                        );
                        report.indexed += 1;
                    }
                    Err(retry_err) => {
                        return Err(PipelineError::IndexUnavailable {
                            detail: retry_err.to_string(),
                        });
                    }
                }
            }
            Err(e) => {
                let err = RecordError::WriteRejected {
                    path: record.image_path.clone(),
                    detail: e.to_string(),
                };
                error!("{err} — skipping");
                report.errors.push(err);
                report.skipped += 1;
            }
        }
    }

    report.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Ingest complete: {}/{} indexed, {} skipped, {} without vector, {}ms",
        report.indexed,
        report.total_records,
        report.skipped,
        report.missing_vector,
        report.duration_ms
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;
    use crate::search::Readiness;
    use crate::store::{ImageRecord, ImageType};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Accepts everything and remembers it.
    #[derive(Default)]
    struct RecordingIndex {
        docs: Mutex<Vec<IndexedDocument>>,
    }

    #[async_trait]
    impl SearchIndex for RecordingIndex {
        async fn readiness(&self) -> Readiness {
            Readiness::Ready
        }

        async fn put_document(&self, doc: &IndexedDocument) -> Result<(), PipelineError> {
            self.docs.lock().unwrap().push(doc.clone());
            Ok(())
        }

        async fn query(
            &self,
            _body: &serde_json::Value,
        ) -> Result<serde_json::Value, PipelineError> {
            Ok(serde_json::json!({}))
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig::builder().settle_secs(0).build().unwrap()
    }

    async fn write_store(dir: &Path, records: Vec<ImageRecord>) -> std::path::PathBuf {
        let store: MetadataStore = records.into_iter().collect();
        let path = dir.join("metadata.json");
        store.save(&path).await.unwrap();
        path
    }

    #[tokio::test]
    async fn unreadable_image_is_skipped_and_reported() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("page_1.png");
        std::fs::write(&present, b"png-bytes").unwrap();

        let store_path = write_store(
            dir.path(),
            vec![
                ImageRecord {
                    page_number: 1,
                    image_path: present.to_string_lossy().into_owned(),
                    text: "a page".into(),
                    image_type: ImageType::Main,
                },
                ImageRecord {
                    page_number: 2,
                    image_path: dir.path().join("gone.png").to_string_lossy().into_owned(),
                    text: "a missing page".into(),
                    image_type: ImageType::Main,
                },
            ],
        )
        .await;

        let index = RecordingIndex::default();
        let report = index_all(&store_path, &HashEmbedder::new(32), &index, &config())
            .await
            .unwrap();

        assert_eq!(report.total_records, 2);
        assert_eq!(report.indexed, 1);
        assert_eq!(report.skipped, 1);
        assert!(matches!(
            report.errors[0],
            RecordError::ImageUnreadable { .. }
        ));
        assert_eq!(index.docs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_caption_indexes_without_vector() {
        let dir = tempdir().unwrap();
        let img = dir.path().join("page_1.png");
        std::fs::write(&img, b"png-bytes").unwrap();

        let store_path = write_store(
            dir.path(),
            vec![ImageRecord {
                page_number: 1,
                image_path: img.to_string_lossy().into_owned(),
                text: String::new(),
                image_type: ImageType::Sub,
            }],
        )
        .await;

        let index = RecordingIndex::default();
        let report = index_all(&store_path, &HashEmbedder::new(32), &index, &config())
            .await
            .unwrap();

        assert_eq!(report.indexed, 1);
        assert_eq!(report.missing_vector, 1);
        let docs = index.docs.lock().unwrap();
        assert!(docs[0].content_vector.is_none());
        // Payload is the base64 of the raw bytes.
        assert_eq!(docs[0].image, BASE64.encode(b"png-bytes"));
    }

    #[tokio::test]
    async fn missing_store_is_fatal() {
        let index = RecordingIndex::default();
        let err = index_all(
            "/nonexistent/metadata.json",
            &HashEmbedder::new(32),
            &index,
            &config(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::MetadataStore { .. }));
    }
}
