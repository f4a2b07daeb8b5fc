//! The page store: per-page ordered element sequences plus the key counter.
//!
//! The stored order of a page IS its reading order. Rendering, chaining and
//! export all read it; there is no separate display order.

use serde::{Deserialize, Serialize};

use crate::element::{Element, ElementKey, KeyAllocator};
use crate::primitive::RawPage;
use crate::safe_area::SafeMargin;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number.
    pub page_number: usize,
    pub width: f64,
    pub height: f64,
    pub(crate) elements: Vec<(ElementKey, Element)>,
}

impl Page {
    pub fn new(page_number: usize, width: f64, height: f64) -> Self {
        Page {
            page_number,
            width,
            height,
            elements: Vec::new(),
        }
    }

    pub fn elements(&self) -> &[(ElementKey, Element)] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn append(&mut self, key: ElementKey, element: Element) {
        self.elements.push((key, element));
    }

    /// Stored index of `key` on this page.
    pub fn position(&self, key: ElementKey) -> Option<usize> {
        self.elements.iter().position(|(k, _)| *k == key)
    }

    pub fn get(&self, key: ElementKey) -> Option<&Element> {
        self.elements
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, e)| e)
    }

    pub fn keys(&self) -> Vec<ElementKey> {
        self.elements.iter().map(|(k, _)| *k).collect()
    }
}

/// A curated document: margin, pages and the key allocator.
///
/// One instance is mutated from a single control thread; callers rebuild
/// chains (see [`crate::chain::ChainIndex`]) after mutating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub(crate) margin: SafeMargin,
    pub(crate) pages: Vec<Page>,
    pub(crate) keys: KeyAllocator,
}

impl Default for Document {
    fn default() -> Self {
        Self::new(SafeMargin::default())
    }
}

impl Document {
    pub fn new(margin: SafeMargin) -> Self {
        Document {
            margin,
            pages: Vec::new(),
            keys: KeyAllocator::new(),
        }
    }

    /// Ingest layout pages and compute safe-area membership.
    pub fn from_pages(raw_pages: &[RawPage], margin: SafeMargin) -> Self {
        let mut document = Document::new(margin);
        for raw in raw_pages {
            document.push_page(raw);
        }
        document.recalculate_safe_area();

        log::debug!(
            "ingested {} pages, {} elements",
            document.page_count(),
            document.iter_all().count()
        );

        document
    }

    /// Append one page built from its layout primitives. Safe flags are not
    /// recomputed; call [`Document::recalculate_safe_area`] afterwards.
    pub fn push_page(&mut self, raw: &RawPage) {
        let page_number = self.pages.len() + 1;
        let mut page = Page::new(page_number, raw.width, raw.height);

        for primitive in &raw.primitives {
            if let Some((key, element)) = Element::from_primitive(page_number, primitive, &mut self.keys)
            {
                page.append(key, element);
            }
        }

        self.pages.push(page);
    }

    pub fn margin(&self) -> SafeMargin {
        self.margin
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, page_index: usize) -> Option<&Page> {
        self.pages.get(page_index)
    }

    /// `(width, height)` of a page in points.
    pub fn page_extent(&self, page_index: usize) -> Option<(f64, f64)> {
        self.pages.get(page_index).map(|p| (p.width, p.height))
    }

    /// The key the next created element will receive.
    pub fn next_key(&self) -> ElementKey {
        self.keys.peek()
    }

    /// Look up an element anywhere in the document.
    pub fn get(&self, key: ElementKey) -> Option<&Element> {
        self.pages.iter().find_map(|page| page.get(key))
    }

    pub(crate) fn get_mut(&mut self, key: ElementKey) -> Option<&mut Element> {
        self.pages.iter_mut().find_map(|page| {
            page.elements
                .iter_mut()
                .find(|(k, _)| *k == key)
                .map(|(_, e)| e)
        })
    }

    /// Look up an element on one page (0-based page index).
    pub fn get_in_page(&self, page_index: usize, key: ElementKey) -> Option<&Element> {
        self.pages.get(page_index).and_then(|page| page.get(key))
    }

    /// `(page_index, position)` of `key`.
    pub fn locate(&self, key: ElementKey) -> Option<(usize, usize)> {
        self.pages
            .iter()
            .enumerate()
            .find_map(|(i, page)| page.position(key).map(|pos| (i, pos)))
    }

    /// Every `(key, element)` pair in page and stored order.
    pub fn iter_all(&self) -> impl Iterator<Item = (ElementKey, &Element)> + '_ {
        self.pages
            .iter()
            .flat_map(|page| page.elements.iter().map(|(k, e)| (*k, e)))
    }

    /// The `(key, element)` pairs of one page; empty when out of range.
    pub fn iter_page(&self, page_index: usize) -> impl Iterator<Item = (ElementKey, &Element)> + '_ {
        self.pages
            .get(page_index)
            .into_iter()
            .flat_map(|page| page.elements.iter().map(|(k, e)| (*k, e)))
    }

    pub fn last_element_in_page(&self, page_index: usize) -> Option<&Element> {
        self.pages
            .get(page_index)
            .and_then(|page| page.elements.last())
            .map(|(_, e)| e)
    }
}
