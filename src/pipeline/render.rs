//! PDF rasterisation: render pages and pull out embedded images via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto a dedicated
//! blocking thread so the Tokio workers never stall during rendering.
//!
//! ## Main vs sub images
//!
//! Every page yields one full-page render (`main`). Raster images embedded
//! on the page (figures, charts, photos) come out as separate crops (`sub`)
//! so they can be captioned and retrieved individually. Vector graphics are
//! not extracted — they only exist in the full-page render.

use crate::error::PipelineError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// Embedded images narrower or shorter than this are skipped: bullets,
/// rules, and logo tiles caption to noise and pollute image search.
const MIN_SUB_IMAGE_PX: u32 = 32;

/// One rasterised page plus the raster images embedded on it.
pub struct RenderedPage {
    /// 1-indexed page number.
    pub page_number: u32,
    /// Full-page render.
    pub image: DynamicImage,
    /// Embedded raster images, in page object order.
    pub embedded: Vec<DynamicImage>,
}

/// Rasterise every page of a PDF and extract its embedded raster images.
pub async fn render_document(
    pdf_path: &Path,
    max_pixels: u32,
) -> Result<Vec<RenderedPage>, PipelineError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || render_document_blocking(&path, max_pixels))
        .await
        .map_err(|e| PipelineError::Internal(format!("Render task panicked: {e}")))?
}

/// Blocking implementation of document rendering.
fn render_document_blocking(
    pdf_path: &Path,
    max_pixels: u32,
) -> Result<Vec<RenderedPage>, PipelineError> {
    let pdfium = Pdfium::default();

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| PipelineError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{e:?}"),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(total_pages);

    for idx in 0..total_pages {
        let page = pages
            .get(idx as u16)
            .map_err(|e| PipelineError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{e:?}"),
            })?;

        let bitmap =
            page.render_with_config(&render_config)
                .map_err(|e| PipelineError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                })?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        let embedded = extract_embedded_images(&page, idx + 1);

        results.push(RenderedPage {
            page_number: (idx + 1) as u32,
            image,
            embedded,
        });
    }

    Ok(results)
}

/// Pull raster image objects off a page.
///
/// A failed or undersized object is skipped with a log line, never fatal —
/// the full-page render already covers its content.
fn extract_embedded_images(page: &PdfPage, page_number: usize) -> Vec<DynamicImage> {
    let mut images = Vec::new();

    for object in page.objects().iter() {
        let Some(image_object) = object.as_image_object() else {
            continue;
        };

        match image_object.get_raw_image() {
            Ok(img) if img.width() >= MIN_SUB_IMAGE_PX && img.height() >= MIN_SUB_IMAGE_PX => {
                debug!(
                    "Page {}: embedded image {}x{} px",
                    page_number,
                    img.width(),
                    img.height()
                );
                images.push(img);
            }
            Ok(img) => {
                debug!(
                    "Page {}: skipping tiny embedded image {}x{} px",
                    page_number,
                    img.width(),
                    img.height()
                );
            }
            Err(e) => {
                warn!(
                    "Page {}: failed to decode an embedded image: {:?}",
                    page_number, e
                );
            }
        }
    }

    images
}
