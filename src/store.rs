//! The data model and the metadata store file.
//!
//! The store is the hand-off point between extraction and indexing: a single
//! self-describing JSON document mapping each image path to the fields the
//! Indexing Engine needs (`page`, `image_text`, `type`). It is written once
//! by the Extraction Adapter, read exactly once by the Indexing Engine, and
//! may be discarded after the index holds the documents.
//!
//! Wire formats here are contracts, not conveniences:
//!
//! * the store file's field names (`page`, `image_text`, `type`) are what
//!   upstream extraction tools produce, so they are fixed;
//! * [`IndexedDocument`]'s field names (`page_number`, `image_file_name`,
//!   `text`, `image_type`, `image`, `content_vector`) are what downstream
//!   consumers of the search index query on, so they are fixed too.

use crate::error::PipelineError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ── Image type ───────────────────────────────────────────────────────────

/// Whether an image is a full-page render or a cropped sub-element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    /// A full page rasterised as one image.
    Main,
    /// A cropped region of a page (an embedded figure, chart, photo).
    Sub,
}

impl ImageType {
    /// The lowercase wire value (`"main"` / `"sub"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::Main => "main",
            ImageType::Sub => "sub",
        }
    }
}

// ── Image record ─────────────────────────────────────────────────────────

/// One extracted image plus its metadata, as stored in the metadata file.
///
/// `image_path` is unique across the store; it doubles as the document's
/// primary content key in the index (`image_file_name`).
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// 1-indexed page of origin.
    pub page_number: u32,
    /// Unique identifier and filesystem location of the image bytes.
    pub image_path: String,
    /// Extracted or generated caption text. May be empty.
    pub text: String,
    /// Full-page render vs cropped sub-element.
    pub image_type: ImageType,
}

/// The value side of a store entry (the key is the image path).
///
/// Extraction tools in the wild write `page` as either a number or a numeric
/// string; both are accepted on read, a number is always written.
#[derive(Debug, Serialize, Deserialize)]
struct StoredFields {
    #[serde(deserialize_with = "page_from_number_or_string")]
    page: u32,
    image_text: String,
    #[serde(rename = "type")]
    image_type: ImageType,
}

fn page_from_number_or_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u32),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.parse::<u32>().map_err(serde::de::Error::custom),
    }
}

// ── Metadata store ───────────────────────────────────────────────────────

/// An in-memory view of the metadata store file.
///
/// Iteration order is the store's key order (deterministic, not semantically
/// significant — the index is a set, not a sequence).
#[derive(Debug, Default)]
pub struct MetadataStore {
    records: Vec<ImageRecord>,
}

impl MetadataStore {
    /// Read and parse the store file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::MetadataStore {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        let map: BTreeMap<String, StoredFields> =
            serde_json::from_slice(&bytes).map_err(|e| PipelineError::MetadataStore {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        let records = map
            .into_iter()
            .map(|(image_path, fields)| ImageRecord {
                page_number: fields.page,
                image_path,
                text: fields.image_text,
                image_type: fields.image_type,
            })
            .collect();

        Ok(Self { records })
    }

    /// Serialise and write the store file (pretty-printed, keyed by image path).
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let path = path.as_ref();
        let map: BTreeMap<&str, StoredFields> = self
            .records
            .iter()
            .map(|r| {
                (
                    r.image_path.as_str(),
                    StoredFields {
                        page: r.page_number,
                        image_text: r.text.clone(),
                        image_type: r.image_type,
                    },
                )
            })
            .collect();

        let json = serde_json::to_vec_pretty(&map)
            .map_err(|e| PipelineError::Internal(format!("store serialisation: {e}")))?;

        tokio::fs::write(path, json)
            .await
            .map_err(|e| PipelineError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })
    }

    /// Append a record. The caller is responsible for `image_path` uniqueness.
    pub fn push(&mut self, record: ImageRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<ImageRecord> for MetadataStore {
    fn from_iter<T: IntoIterator<Item = ImageRecord>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

// ── Indexed document ─────────────────────────────────────────────────────

/// One document as persisted in the search index.
///
/// `content_vector` is omitted from the JSON body entirely when absent —
/// the engine treats a missing field and a null field differently for k-NN,
/// and a vectorless document must stay reachable by exact-field queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub page_number: u32,
    pub image_file_name: String,
    pub text: String,
    pub image_type: ImageType,
    /// Image bytes, base64-encoded for transport.
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_vector: Option<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(path: &str, page: u32, kind: ImageType) -> ImageRecord {
        ImageRecord {
            page_number: page,
            image_path: path.to_string(),
            text: format!("caption for {path}"),
            image_type: kind,
        }
    }

    #[tokio::test]
    async fn store_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");

        let store: MetadataStore = [
            record("images/page_1.png", 1, ImageType::Main),
            record("images/page_1_fig_0.png", 1, ImageType::Sub),
        ]
        .into_iter()
        .collect();
        store.save(&path).await.unwrap();

        let loaded = MetadataStore::load(&path).await.unwrap();
        assert_eq!(loaded.len(), 2);
        let sub = loaded
            .records()
            .iter()
            .find(|r| r.image_type == ImageType::Sub)
            .unwrap();
        assert_eq!(sub.image_path, "images/page_1_fig_0.png");
        assert_eq!(sub.page_number, 1);
    }

    #[tokio::test]
    async fn store_accepts_string_page_numbers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        std::fs::write(
            &path,
            r#"{"images/p7.png": {"page": "7", "image_text": "a chart", "type": "sub"}}"#,
        )
        .unwrap();

        let loaded = MetadataStore::load(&path).await.unwrap();
        assert_eq!(loaded.records()[0].page_number, 7);
        assert_eq!(loaded.records()[0].image_type, ImageType::Sub);
    }

    #[tokio::test]
    async fn load_missing_file_is_a_store_error() {
        let err = MetadataStore::load("/nonexistent/metadata.json")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MetadataStore { .. }));
    }

    #[test]
    fn document_wire_field_names() {
        let doc = IndexedDocument {
            page_number: 3,
            image_file_name: "images/page_3.png".into(),
            text: "quarterly revenue table".into(),
            image_type: ImageType::Main,
            image: "aGVsbG8=".into(),
            content_vector: Some(vec![0.1, 0.2]),
        };
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["page_number"], 3);
        assert_eq!(value["image_file_name"], "images/page_3.png");
        assert_eq!(value["image_type"], "main");
        assert!(value["content_vector"].is_array());
    }

    #[test]
    fn missing_vector_is_omitted_not_null() {
        let doc = IndexedDocument {
            page_number: 1,
            image_file_name: "p.png".into(),
            text: String::new(),
            image_type: ImageType::Sub,
            image: String::new(),
            content_vector: None,
        };
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("content_vector").is_none());
    }
}
