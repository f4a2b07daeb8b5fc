//! Text assembly for display and export.
//!
//! Both functions emit one logical unit per line. Hidden and unsafe elements
//! never contribute.

use crate::chain::ChainIndex;
use crate::element::{Element, ElementKey};
use crate::store::Document;

/// Rendered in place of a body element whose chain started on an earlier
/// page.
pub const CONTINUATION_PLACEHOLDER: &str = "(omitted by continuation)";

/// Text of one page.
///
/// Body elements at the top of the page that continue a chain headed on an
/// earlier page are shown as [`CONTINUATION_PLACEHOLDER`]; the run ends at
/// the first body element that heads a chain or belongs to none.
pub fn page_text(document: &Document, chains: &ChainIndex, page_index: usize) -> String {
    let mut lines = Vec::new();
    let mut in_continuation = true;

    for (key, element) in document.iter_page(page_index).filter(|(_, e)| e.is_exposed()) {
        if in_continuation && element.is_body() {
            if chains.is_continuation(key) {
                lines.push(CONTINUATION_PLACEHOLDER.to_string());
                continue;
            }
            in_continuation = false;
        }

        if in_continuation {
            lines.push(element.display_text().to_string());
            continue;
        }

        if let Some(text) = unit_text(chains, key, element) {
            lines.push(text);
        }
    }

    lines.join("\n")
}

/// Text of the whole document with chains flattened into their heads.
pub fn document_text(document: &Document, chains: &ChainIndex) -> String {
    document
        .iter_all()
        .filter(|(_, e)| e.is_exposed())
        .filter_map(|(key, element)| unit_text(chains, key, element))
        .collect::<Vec<_>>()
        .join("\n")
}

/// What an element contributes outside of a continuation run: nothing for a
/// chain continuation, the chain text for a head, its own text otherwise.
/// Translations win over source text.
fn unit_text(chains: &ChainIndex, key: ElementKey, element: &Element) -> Option<String> {
    if chains.is_continuation(key) {
        return None;
    }

    if let Some(translated) = element.translated() {
        return Some(translated.to_string());
    }

    let text = chains
        .text_of(key)
        .unwrap_or(element.text.as_str())
        .to_string();
    Some(text)
}
