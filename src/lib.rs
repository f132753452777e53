//! # pdf2search
//!
//! Index PDF page images and captions into a vector search engine, then
//! retrieve them by free-text similarity.
//!
//! ## Why this crate?
//!
//! Keyword search over raw PDF text misses everything that lives in
//! figures, charts, and scanned pages. This crate rasterises each page,
//! lets a vision model caption every image the way a person would describe
//! it, embeds those captions, and stores image + caption + vector in an
//! OpenSearch-compatible index — so "the diagram with the blue pump loop"
//! actually finds the diagram.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Extract  rasterise pages + embedded images via pdfium,
//!  │              caption each via a VLM, write metadata.json
//!  ├─ 2. Ingest   read metadata.json, embed each caption, submit one
//!  │              document per image (waits out index propagation first)
//!  └─ 3. Search   embed the query, filtered k-NN against the index,
//!                 ranked (image, caption) pairs back
//! ```
//!
//! Extraction and ingestion are separate steps on purpose: the metadata
//! store file between them is a durable hand-off, so captioning (slow,
//! costs API tokens) never has to be repeated to rebuild an index.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2search::{ingest, search, HashEmbedder, PipelineConfig, SearchMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .endpoint("https://search.example.com")
//!         .index_name("pdf-pages")
//!         .build()?;
//!     let embedder = HashEmbedder::default();
//!
//!     let report = ingest(&config, &embedder, "images/metadata.json").await?;
//!     eprintln!("indexed {}/{}", report.indexed, report.total_records);
//!
//!     let hits = search(&config, &embedder, "pump loop diagram", SearchMode::Image, 5).await;
//!     for caption in &hits.contents {
//!         println!("{caption}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2search` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2search = { version = "0.2", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod embed;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod pipeline;
pub mod prompts;
pub mod query;
pub mod search;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder, SearchMode, DEFAULT_SETTLE_SECS};
pub use embed::{Embedder, HashEmbedder, TitanEmbedder};
pub use error::{PipelineError, RecordError};
pub use extract::{extract_images_and_metadata, ExtractReport, METADATA_FILE};
pub use ingest::{index_all, ingest, IngestReport};
pub use query::{search, search_with_index, SearchHits, KNN_K};
pub use search::{wait_until_writable, OpenSearchIndex, Readiness, SearchIndex};
pub use store::{ImageRecord, ImageType, IndexedDocument, MetadataStore};
