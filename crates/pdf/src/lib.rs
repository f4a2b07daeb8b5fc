//! Page layout extraction for PDF files.
//!
//! Every page is reduced to a list of positioned items (text boxes with
//! their lines, images, figures and painted shapes) in reading order, with
//! coordinates in PDF user space relative to the page's MediaBox origin.

use thiserror::Error;

use parser::backend::{LopdfBackend, PdfBackend};

pub mod cleanup;
pub mod parser;
pub mod types;

pub use types::*;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Document is encrypted")]
    Encrypted,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// US Letter, used when a page has no readable MediaBox.
const FALLBACK_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Extract the layout of every page, in page order.
///
/// A page whose content cannot be decoded is kept as an empty page so page
/// numbering stays aligned with the file.
pub fn extract_layout(bytes: &[u8], params: &LayoutParams) -> Result<Vec<LayoutPage>, PdfError> {
    let backend = LopdfBackend::load_bytes(bytes)?;
    Ok(extract_from_backend(&backend, params))
}

/// Same as [`extract_layout`] over any backend.
pub fn extract_from_backend(backend: &dyn PdfBackend, params: &LayoutParams) -> Vec<LayoutPage> {
    backend
        .pages()
        .into_iter()
        .map(|(number, page_id)| {
            let number = number as usize;
            parser::layout::analyze_page(backend, number, page_id, params).unwrap_or_else(|e| {
                log::warn!("page {}: layout extraction failed: {}", number, e);
                let [x0, y0, x1, y1] = backend.page_box(page_id).unwrap_or(FALLBACK_MEDIA_BOX);
                LayoutPage {
                    number,
                    width: (x1 - x0).abs(),
                    height: (y1 - y0).abs(),
                    items: Vec::new(),
                }
            })
        })
        .collect()
}

/// Number of pages in a PDF without extracting anything.
pub fn page_count(bytes: &[u8]) -> Result<usize, PdfError> {
    Ok(LopdfBackend::load_bytes(bytes)?.page_count())
}
