//! Chain reconstruction.
//!
//! A chain is a run of eligible (`safe && visible && body`) elements linked
//! by their continuation markers, possibly across page boundaries. The index
//! is rebuilt from scratch after every mutation; it is never patched.

use std::collections::HashMap;

use crate::element::{push_concat, Element, ElementKey, MergeMode};
use crate::store::Document;

/// Chain membership and assembled text for a whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainIndex {
    chain_of: HashMap<ElementKey, ElementKey>,
    chain_text: HashMap<ElementKey, String>,
    heads: Vec<ElementKey>,
}

/// The text an element stands for: its own, or its chain's when chained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainedText<'a> {
    pub key: ElementKey,
    pub element: &'a Element,
    pub text: &'a str,
}

struct OpenChain<'a> {
    head: ElementKey,
    text: String,
    prev: &'a Element,
}

impl ChainIndex {
    /// Single forward pass over every page in stored order.
    pub fn build(document: &Document) -> Self {
        let mut index = ChainIndex::default();
        let mut open: Option<OpenChain<'_>> = None;
        // Set while skipping the followers of a head that is no longer eligible.
        let mut orphaned = false;

        for (key, element) in document.iter_all() {
            if !element.is_eligible() {
                if open.is_none() && element.contd.is_some() {
                    orphaned = true;
                }
                continue;
            }

            if orphaned {
                if element.contd.is_none() {
                    orphaned = false;
                }
                continue;
            }

            match open.as_mut() {
                None => {
                    if element.contd.is_some() {
                        index.chain_of.insert(key, key);
                        open = Some(OpenChain {
                            head: key,
                            text: element.text.clone(),
                            prev: element,
                        });
                    }
                }
                Some(chain) => {
                    match chain.prev.contd {
                        Some(MergeMode::Concat) => push_concat(&mut chain.text, chain.prev, &element.text),
                        _ => {
                            chain.text.push('\n');
                            chain.text.push_str(&element.text);
                        }
                    }
                    chain.prev = element;
                    index.chain_of.insert(key, chain.head);

                    if element.contd.is_none() {
                        if let Some(chain) = open.take() {
                            index.commit(chain);
                        }
                    }
                }
            }
        }

        if let Some(chain) = open.take() {
            index.commit(chain);
        }

        log::debug!(
            "rebuilt {} chains covering {} elements",
            index.heads.len(),
            index.chain_of.len()
        );

        index
    }

    fn commit(&mut self, chain: OpenChain<'_>) {
        self.heads.push(chain.head);
        self.chain_text.insert(chain.head, chain.text);
    }

    /// Head of the chain `key` belongs to.
    pub fn head_of(&self, key: ElementKey) -> Option<ElementKey> {
        self.chain_of.get(&key).copied()
    }

    pub fn is_head(&self, key: ElementKey) -> bool {
        self.head_of(key) == Some(key)
    }

    /// A chain member that is not the head.
    pub fn is_continuation(&self, key: ElementKey) -> bool {
        self.head_of(key).is_some_and(|head| head != key)
    }

    /// Assembled text of the chain headed by `head`.
    pub fn text_of(&self, head: ElementKey) -> Option<&str> {
        self.chain_text.get(&head).map(String::as_str)
    }

    /// Chain heads in document order.
    pub fn heads(&self) -> &[ElementKey] {
        &self.heads
    }

    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    pub fn members(&self) -> impl Iterator<Item = (ElementKey, ElementKey)> + '_ {
        self.chain_of.iter().map(|(k, h)| (*k, *h))
    }

    /// The text `key` stands for, resolved through its chain head.
    pub fn chained_text<'a>(&'a self, document: &'a Document, key: ElementKey) -> Option<ChainedText<'a>> {
        match self.head_of(key) {
            Some(head) => {
                let element = document.get(head)?;
                let text = self.text_of(head)?;
                Some(ChainedText { key: head, element, text })
            }
            None => {
                let element = document.get(key)?;
                Some(ChainedText {
                    key,
                    element,
                    text: &element.text,
                })
            }
        }
    }

    /// Translation eligibility, checked on the chain head.
    pub fn can_be_translated(&self, document: &Document, key: ElementKey) -> bool {
        let target = self.head_of(key).unwrap_or(key);
        document
            .get(target)
            .is_some_and(Element::can_be_translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::primitive::{Primitive, RawPage};
    use crate::safe_area::SafeMargin;

    const FULL: SafeMargin = SafeMargin::new(0.0, 0.0, 1.0, 1.0);

    fn k(v: u64) -> ElementKey {
        ElementKey::new(v)
    }

    fn page(texts: &[&str]) -> RawPage {
        RawPage {
            width: 100.0,
            height: 100.0,
            primitives: texts
                .iter()
                .enumerate()
                .map(|(i, t)| {
                    let y = 90.0 - 10.0 * i as f64;
                    Primitive::text_line(Rect::new(10.0, y, 90.0, y + 8.0), *t)
                })
                .collect(),
        }
    }

    fn doc(pages: &[&[&str]]) -> Document {
        let layout: Vec<RawPage> = pages.iter().map(|p| page(p)).collect();
        Document::from_pages(&layout, FULL)
    }

    fn set_contd(doc: &mut Document, key: ElementKey, mode: MergeMode) {
        while doc.get(key).unwrap().contd() != Some(mode) {
            doc.toggle_continuation(key);
        }
    }

    #[test]
    fn test_no_markers_no_chains() {
        let doc = doc(&[&["a", "b"]]);
        let chains = ChainIndex::build(&doc);
        assert!(chains.is_empty());
        assert_eq!(chains.head_of(k(0)), None);
    }

    #[test]
    fn test_concat_chain_rebuilds_hyphenated_word() {
        let mut doc = doc(&[&["Hello-", "world", "Next"]]);
        set_contd(&mut doc, k(0), MergeMode::Concat);

        let chains = ChainIndex::build(&doc);

        assert_eq!(chains.text_of(k(0)), Some("Helloworld"));
        assert!(chains.is_head(k(0)));
        assert!(chains.is_continuation(k(1)));
        assert_eq!(chains.head_of(k(2)), None);
        assert_eq!(chains.heads(), &[k(0)]);
    }

    #[test]
    fn test_join_marker_uses_newline() {
        let mut doc = doc(&[&["one", "two", "three"]]);
        set_contd(&mut doc, k(0), MergeMode::Join);
        set_contd(&mut doc, k(1), MergeMode::Concat);

        let chains = ChainIndex::build(&doc);
        assert_eq!(chains.text_of(k(0)), Some("one\ntwo three"));
        assert_eq!(chains.head_of(k(2)), Some(k(0)));
    }

    #[test]
    fn test_chain_crosses_pages() {
        let mut doc = doc(&[&["a", "start"], &["end", "b"]]);
        set_contd(&mut doc, k(1), MergeMode::Concat);

        let chains = ChainIndex::build(&doc);
        assert_eq!(chains.text_of(k(1)), Some("start end"));
        assert_eq!(chains.head_of(k(2)), Some(k(1)));
        assert_eq!(chains.head_of(k(3)), None);
    }

    #[test]
    fn test_unterminated_chain_is_committed() {
        let mut doc = doc(&[&["x", "y"]]);
        set_contd(&mut doc, k(0), MergeMode::Concat);
        set_contd(&mut doc, k(1), MergeMode::Concat);

        let chains = ChainIndex::build(&doc);
        assert_eq!(chains.text_of(k(0)), Some("x y"));
        assert_eq!(chains.len(), 1);
    }

    #[test]
    fn test_ineligible_elements_are_skipped() {
        let mut doc = doc(&[&["a", "noise", "b"]]);
        set_contd(&mut doc, k(0), MergeMode::Concat);
        doc.toggle_body(k(1));

        let chains = ChainIndex::build(&doc);
        assert_eq!(chains.text_of(k(0)), Some("a b"));
        assert_eq!(chains.head_of(k(1)), None);
        assert_eq!(chains.head_of(k(2)), Some(k(0)));
    }

    #[test]
    fn test_hidden_head_orphans_its_followers() {
        let mut doc = doc(&[&["a", "b", "c", "d"]]);
        set_contd(&mut doc, k(0), MergeMode::Concat);
        set_contd(&mut doc, k(1), MergeMode::Concat);
        doc.toggle_visibility(k(0));

        let chains = ChainIndex::build(&doc);

        assert!(chains.is_empty());
        assert_eq!(chains.head_of(k(1)), None);
        assert_eq!(chains.head_of(k(2)), None);
        assert_eq!(chains.text_of(k(1)), None);
        assert_eq!(chains.head_of(k(3)), None);
    }

    #[test]
    fn test_chain_after_orphaned_run_still_forms() {
        let mut doc = doc(&[&["a", "b", "c", "d"]]);
        set_contd(&mut doc, k(0), MergeMode::Concat);
        set_contd(&mut doc, k(2), MergeMode::Join);
        doc.toggle_visibility(k(0));

        let chains = ChainIndex::build(&doc);

        assert_eq!(chains.head_of(k(1)), None);
        assert_eq!(chains.text_of(k(2)), Some("c\nd"));
        assert_eq!(chains.head_of(k(3)), Some(k(2)));
    }

    #[test]
    fn test_chained_text_falls_back_to_own_text() {
        let mut doc = doc(&[&["a", "b", "c"]]);
        set_contd(&mut doc, k(0), MergeMode::Join);
        let chains = ChainIndex::build(&doc);

        let chained = chains.chained_text(&doc, k(1)).unwrap();
        assert_eq!(chained.key, k(0));
        assert_eq!(chained.text, "a\nb");

        let own = chains.chained_text(&doc, k(2)).unwrap();
        assert_eq!(own.key, k(2));
        assert_eq!(own.text, "c");

        assert!(chains.chained_text(&doc, k(50)).is_none());
    }

    #[test]
    fn test_can_be_translated_checks_head() {
        let mut doc = doc(&[&["a", "b"]]);
        set_contd(&mut doc, k(0), MergeMode::Concat);
        let chains = ChainIndex::build(&doc);

        assert!(chains.can_be_translated(&doc, k(1)));
        doc.get_mut(k(0)).unwrap().translated = Some("A B".to_string());
        assert!(!chains.can_be_translated(&doc, k(1)));
        assert!(!chains.can_be_translated(&doc, k(9)));
    }
}
