//! User-driven mutations of the page store.
//!
//! Every operation is synchronous and leaves the store consistent. Missing
//! keys and failed preconditions are silent no-ops; the returned values only
//! tell the caller whether something changed. Chains must be rebuilt after
//! any of these before assembled text is trusted.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::element::{Element, ElementKey, MergeMode};
use crate::store::Document;

/// Where `move_element` puts the moved element relative to the pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Before,
    After,
}

impl Document {
    /// Flip `visible` on the element with `key`.
    pub fn toggle_visibility(&mut self, key: ElementKey) -> bool {
        match self.get_mut(key) {
            Some(element) => {
                element.visible = !element.visible;
                log::debug!("element {} visible={}", key, element.visible);
                true
            }
            None => false,
        }
    }

    /// Flip `body`; image and figure elements are left untouched.
    pub fn toggle_body(&mut self, key: ElementKey) -> bool {
        let changed = self.get_mut(key).is_some_and(Element::toggle_body);
        if changed {
            log::debug!("element {} body toggled", key);
        }
        changed
    }

    /// Cycle the continuation marker `None -> Concat -> Join -> None`.
    pub fn toggle_continuation(&mut self, key: ElementKey) -> bool {
        match self.get_mut(key) {
            Some(element) => {
                element.toggle_continuation();
                log::debug!("element {} contd={:?}", key, element.contd);
                true
            }
            None => false,
        }
    }

    /// Replace a splittable element, in place, by its children.
    ///
    /// Only elements that are currently safe and visible can be split. The
    /// children keep the keys they had before being absorbed, and their
    /// safe flag is recomputed against the current margin.
    pub fn split(&mut self, key: ElementKey) -> bool {
        let Some((page_index, position)) = self.locate(key) else {
            return false;
        };

        let margin = self.margin;
        let page = &mut self.pages[page_index];
        let element = &page.elements[position].1;
        if !(element.is_exposed() && element.can_be_split()) {
            return false;
        }

        let safe_rect = margin.safe_rect(page.width, page.height);
        let (_, parent) = page.elements.remove(position);
        let children: Vec<(ElementKey, Element)> = parent
            .children
            .unwrap_or_default()
            .into_iter()
            .map(|(child_key, mut child)| {
                child.safe = child.bbox.normalized().overlaps(&safe_rect);
                (child_key, child)
            })
            .collect();

        log::debug!("split element {} into {} children", key, children.len());
        page.elements.splice(position..position, children);
        true
    }

    /// Merge the elements named by `keys` on one page into a single text
    /// element, returning its key.
    ///
    /// Keys that are absent, hidden, unsafe or not mergeable are dropped.
    /// Fewer than two survivors abort the merge. Survivors are combined in
    /// stored order, whatever the order of `keys`, and the product takes
    /// the position of the earliest one.
    pub fn merge(&mut self, page_index: usize, keys: &[ElementKey], mode: MergeMode) -> Option<ElementKey> {
        let margin = self.margin;
        let page = self.pages.get_mut(page_index)?;
        let requested: HashSet<ElementKey> = keys.iter().copied().collect();

        let survivors: Vec<usize> = page
            .elements
            .iter()
            .enumerate()
            .filter(|(_, (k, e))| requested.contains(k) && e.is_exposed() && e.can_be_merged())
            .map(|(i, _)| i)
            .collect();

        if survivors.len() < 2 {
            log::debug!(
                "merge on page {} aborted, {} eligible elements",
                page_index,
                survivors.len()
            );
            return None;
        }

        let insert_position = survivors[0];
        let chosen: HashSet<ElementKey> = survivors.iter().map(|&i| page.elements[i].0).collect();
        let (contributors, mut remaining): (Vec<_>, Vec<_>) = std::mem::take(&mut page.elements)
            .into_iter()
            .partition(|(k, _)| chosen.contains(k));

        let key = self.keys.allocate();
        let mut product = Element::from_merge(page.page_number, contributors, mode);
        product.safe = product
            .bbox
            .overlaps(&margin.safe_rect(page.width, page.height));

        log::debug!(
            "merged {} elements into {} on page {} ({})",
            chosen.len(),
            key,
            page_index,
            mode
        );

        remaining.insert(insert_position, (key, product));
        page.elements = remaining;
        Some(key)
    }

    /// Move `key_to_move` right before or after `pivot_key` on one page.
    ///
    /// Returns `false` without changing anything when the keys are equal,
    /// either is missing from the page, or either is not safe and visible.
    pub fn move_element(
        &mut self,
        pivot_key: ElementKey,
        key_to_move: ElementKey,
        page_index: usize,
        disposition: Disposition,
    ) -> bool {
        if pivot_key == key_to_move {
            return false;
        }

        let Some(page) = self.pages.get_mut(page_index) else {
            return false;
        };

        let exposed_position = |key: ElementKey| {
            page.elements
                .iter()
                .position(|(k, e)| *k == key && e.is_exposed())
        };

        let (Some(mut pivot_index), Some(move_index)) =
            (exposed_position(pivot_key), exposed_position(key_to_move))
        else {
            return false;
        };

        let moved = page.elements.remove(move_index);
        if move_index < pivot_index {
            pivot_index -= 1;
        }

        let offset = match disposition {
            Disposition::Before => 0,
            Disposition::After => 1,
        };
        page.elements.insert(pivot_index + offset, moved);

        log::debug!(
            "moved {} {:?} {} on page {}",
            key_to_move,
            disposition,
            pivot_key,
            page_index
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementKind;
    use crate::geometry::Rect;
    use crate::primitive::{Primitive, RawPage};
    use crate::safe_area::SafeMargin;

    const FULL: SafeMargin = SafeMargin::new(0.0, 0.0, 1.0, 1.0);

    fn k(v: u64) -> ElementKey {
        ElementKey::new(v)
    }

    fn line_at(y: f64, text: &str) -> Primitive {
        Primitive::text_line(Rect::new(10.0, y, 90.0, y + 8.0), text)
    }

    /// One page of lines, keys 0..n in order.
    fn lines_doc(texts: &[&str]) -> Document {
        let primitives = texts
            .iter()
            .enumerate()
            .map(|(i, t)| line_at(90.0 - 10.0 * i as f64, t))
            .collect();
        Document::from_pages(
            &[RawPage {
                width: 100.0,
                height: 100.0,
                primitives,
            }],
            FULL,
        )
    }

    fn page_keys(doc: &Document, page: usize) -> Vec<u64> {
        doc.iter_page(page).map(|(k, _)| k.as_u64()).collect()
    }

    fn page_texts(doc: &Document, page: usize) -> Vec<String> {
        doc.iter_page(page).map(|(_, e)| e.text.clone()).collect()
    }

    #[test]
    fn test_toggle_visibility() {
        let mut doc = lines_doc(&["a"]);
        assert!(doc.toggle_visibility(k(0)));
        assert!(!doc.get(k(0)).unwrap().is_visible());
        assert!(doc.toggle_visibility(k(0)));
        assert!(doc.get(k(0)).unwrap().is_visible());
        assert!(!doc.toggle_visibility(k(99)));
    }

    #[test]
    fn test_toggle_body_skips_images() {
        let layout = vec![RawPage {
            width: 100.0,
            height: 100.0,
            primitives: vec![
                line_at(50.0, "a"),
                Primitive::image(Rect::new(0.0, 0.0, 50.0, 50.0)),
            ],
        }];
        let mut doc = Document::from_pages(&layout, FULL);

        assert!(doc.toggle_body(k(0)));
        assert!(!doc.get(k(0)).unwrap().is_body());

        assert!(!doc.toggle_body(k(1)));
        assert!(!doc.get(k(1)).unwrap().is_body());
    }

    #[test]
    fn test_merge_respects_document_order() {
        let mut doc = lines_doc(&["Hello-", "world", "again"]);

        let merged = doc.merge(0, &[k(1), k(0)], MergeMode::Concat).unwrap();

        assert_eq!(merged, k(3));
        assert_eq!(page_keys(&doc, 0), vec![3, 2]);
        assert_eq!(doc.get(merged).unwrap().text, "Helloworld");
        assert_eq!(doc.get(merged).unwrap().kind, ElementKind::Text);
    }

    #[test]
    fn test_merge_takes_earliest_position() {
        let mut doc = lines_doc(&["a", "b", "c", "d"]);
        let merged = doc.merge(0, &[k(3), k(1)], MergeMode::Join).unwrap();

        assert_eq!(page_keys(&doc, 0), vec![0, merged.as_u64(), 2]);
        assert_eq!(doc.get(merged).unwrap().text, "b\nd");
    }

    #[test]
    fn test_merge_drops_ineligible_keys() {
        let mut doc = lines_doc(&["a", "b", "c"]);
        doc.toggle_visibility(k(1));

        // Only "a" survives alongside a hidden and a missing key.
        assert!(doc.merge(0, &[k(0), k(1), k(42)], MergeMode::Concat).is_none());
        assert_eq!(page_keys(&doc, 0), vec![0, 1, 2]);

        let merged = doc.merge(0, &[k(0), k(1), k(2)], MergeMode::Concat).unwrap();
        assert_eq!(doc.get(merged).unwrap().text, "a c");
        assert_eq!(page_keys(&doc, 0), vec![merged.as_u64(), 1]);
    }

    #[test]
    fn test_merge_rejects_images_and_bad_page() {
        let layout = vec![RawPage {
            width: 100.0,
            height: 100.0,
            primitives: vec![
                line_at(50.0, "a"),
                Primitive::image(Rect::new(0.0, 0.0, 50.0, 50.0)),
            ],
        }];
        let mut doc = Document::from_pages(&layout, FULL);

        assert!(doc.merge(0, &[k(0), k(1)], MergeMode::Concat).is_none());
        assert!(doc.merge(3, &[k(0), k(1)], MergeMode::Concat).is_none());
        assert_eq!(doc.next_key(), k(2));
    }

    #[test]
    fn test_split_restores_merged_elements() {
        let mut doc = lines_doc(&["one", "two", "three"]);
        let before = page_texts(&doc, 0);

        let merged = doc.merge(0, &[k(0), k(1), k(2)], MergeMode::Concat).unwrap();
        assert!(doc.split(merged));

        assert_eq!(page_texts(&doc, 0), before);
        assert_eq!(page_keys(&doc, 0), vec![0, 1, 2]);
        assert!(doc.get(merged).is_none());
    }

    #[test]
    fn test_split_text_block_into_lines() {
        let layout = vec![RawPage {
            width: 100.0,
            height: 100.0,
            primitives: vec![
                line_at(90.0, "title"),
                Primitive::text_box(
                    Rect::new(10.0, 40.0, 90.0, 60.0),
                    vec![line_at(50.0, "first"), line_at(40.0, "second")],
                ),
            ],
        }];
        let mut doc = Document::from_pages(&layout, FULL);

        assert!(doc.split(k(1)));
        assert_eq!(page_keys(&doc, 0), vec![0, 2, 3]);
        assert_eq!(page_texts(&doc, 0), vec!["title", "first", "second"]);
        assert!(doc.iter_page(0).all(|(_, e)| e.is_safe()));
    }

    #[test]
    fn test_split_recomputes_child_safety() {
        let layout = vec![RawPage {
            width: 100.0,
            height: 100.0,
            primitives: vec![Primitive::text_box(
                Rect::new(10.0, 2.0, 90.0, 60.0),
                vec![line_at(50.0, "inside"), line_at(2.0, "footer")],
            )],
        }];
        let mut doc = Document::from_pages(&layout, SafeMargin::new(0.0, 0.0, 1.0, 0.85));

        assert!(doc.split(k(0)));
        assert!(doc.get(k(1)).unwrap().is_safe());
        assert!(!doc.get(k(2)).unwrap().is_safe());
    }

    #[test]
    fn test_split_requires_exposed_splittable_element() {
        let mut doc = lines_doc(&["a", "b"]);
        assert!(!doc.split(k(0)));

        let merged = doc.merge(0, &[k(0), k(1)], MergeMode::Concat).unwrap();
        doc.toggle_visibility(merged);
        assert!(!doc.split(merged));
        assert_eq!(page_keys(&doc, 0), vec![merged.as_u64()]);
        assert!(!doc.split(k(77)));
    }

    #[test]
    fn test_move_after_and_before() {
        let mut doc = lines_doc(&["a", "b", "c", "d"]);

        assert!(doc.move_element(k(2), k(0), 0, Disposition::After));
        assert_eq!(page_keys(&doc, 0), vec![1, 2, 0, 3]);

        assert!(doc.move_element(k(1), k(3), 0, Disposition::Before));
        assert_eq!(page_keys(&doc, 0), vec![3, 1, 2, 0]);
    }

    #[test]
    fn test_move_reversed_roles_restores_adjacency() {
        let mut doc = lines_doc(&["a", "b", "c"]);

        assert!(doc.move_element(k(0), k(1), 0, Disposition::Before));
        assert_eq!(page_keys(&doc, 0), vec![1, 0, 2]);

        assert!(doc.move_element(k(1), k(0), 0, Disposition::Before));
        assert_eq!(page_keys(&doc, 0), vec![0, 1, 2]);
    }

    #[test]
    fn test_move_rejections() {
        let mut doc = lines_doc(&["a", "b", "c"]);
        doc.toggle_visibility(k(2));

        assert!(!doc.move_element(k(0), k(0), 0, Disposition::After));
        assert!(!doc.move_element(k(0), k(9), 0, Disposition::After));
        assert!(!doc.move_element(k(0), k(2), 0, Disposition::After));
        assert!(!doc.move_element(k(0), k(1), 4, Disposition::After));
        assert_eq!(page_keys(&doc, 0), vec![0, 1, 2]);
    }
}
