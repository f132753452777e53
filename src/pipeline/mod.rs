//! Extraction pipeline stages: PDF → page images → captions.
//!
//! Each submodule implements exactly one transformation step, which keeps
//! every stage independently testable and lets the captioning provider be
//! swapped without touching rendering.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ encode ──▶ caption
//! (pdfium)   (PNG/b64)  (VLM)
//! ```
//!
//! 1. [`render`]  — rasterise every page and pull out embedded raster
//!    images; runs in `spawn_blocking` because pdfium is not async-safe
//! 2. [`encode`]  — PNG-encode a `DynamicImage` and base64-wrap it for the
//!    multimodal API request body
//! 3. [`caption`] — drive the VLM caption call with retry/backoff; the only
//!    stage with network I/O

pub mod caption;
pub mod encode;
pub mod render;
