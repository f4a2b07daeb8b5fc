//! The element model: one visual unit of a page.
//!
//! Elements are built at the ingestion boundary from layout [`Primitive`]s
//! or by merging existing elements. Decomposable elements (a text block
//! and its lines, a merge product and its inputs) own their parts in
//! `children` so a later split can restore them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::primitive::{Primitive, PrimitiveKind};

/// Placeholder text carried by image elements.
pub const IMAGE_PLACEHOLDER: &str = "<<<image>>>";

/// Placeholder text carried by figure elements.
pub const FIGURE_PLACEHOLDER: &str = "<<<figure>>>";

/// Globally unique, never reused element key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementKey(u64);

impl ElementKey {
    pub const fn new(value: u64) -> Self {
        ElementKey(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ElementKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(ElementKey)
    }
}

/// Monotonic key counter owned by a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAllocator {
    next: u64,
}

impl KeyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> ElementKey {
        let key = ElementKey(self.next);
        self.next += 1;
        key
    }

    /// The key the next call to [`KeyAllocator::allocate`] will return.
    pub fn peek(&self) -> ElementKey {
        ElementKey(self.next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Line,
    Text,
    Image,
    Figure,
}

impl ElementKind {
    /// Line and Text kinds carry real text; Image and Figure are opaque.
    pub fn is_textual(self) -> bool {
        matches!(self, ElementKind::Line | ElementKind::Text)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Line => write!(f, "line"),
            ElementKind::Text => write!(f, "text"),
            ElementKind::Image => write!(f, "image"),
            ElementKind::Figure => write!(f, "figure"),
        }
    }
}

/// How two pieces of text are stitched together.
///
/// Used both by merge and as the continuation marker of an element, where
/// it selects how the *next* chain element is appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Hyphen-aware joining with a single space.
    Concat,
    /// Joining with a newline.
    Join,
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeMode::Concat => write!(f, "concat"),
            MergeMode::Join => write!(f, "join"),
        }
    }
}

/// Next value of a continuation marker: `None -> Concat -> Join -> None`.
pub fn next_continuation(contd: Option<MergeMode>) -> Option<MergeMode> {
    match contd {
        None => Some(MergeMode::Concat),
        Some(MergeMode::Concat) => Some(MergeMode::Join),
        Some(MergeMode::Join) => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// 1-based page number.
    pub page_number: usize,
    pub kind: ElementKind,
    pub bbox: Rect,
    pub text: String,
    #[serde(default)]
    pub(crate) children: Option<Vec<(ElementKey, Element)>>,
    pub(crate) safe: bool,
    pub(crate) visible: bool,
    pub(crate) body: bool,
    #[serde(default)]
    pub(crate) contd: Option<MergeMode>,
    #[serde(default)]
    pub(crate) translated: Option<String>,
    /// Bumped whenever `translated` changes so stale results can be refused.
    #[serde(default)]
    pub(crate) generation: u64,
}

impl Element {
    pub fn new(page_number: usize, kind: ElementKind, bbox: Rect, text: impl Into<String>) -> Self {
        Element {
            page_number,
            kind,
            bbox,
            text: text.into(),
            children: None,
            safe: true,
            visible: true,
            body: kind.is_textual(),
            contd: None,
            translated: None,
            generation: 0,
        }
    }

    /// Build an element from a layout primitive, allocating keys for it and
    /// its children. Returns `None` for primitives the model does not ingest.
    pub fn from_primitive(
        page_number: usize,
        primitive: &Primitive,
        keys: &mut KeyAllocator,
    ) -> Option<(ElementKey, Element)> {
        match primitive.kind {
            PrimitiveKind::TextBox => {
                let key = keys.allocate();
                let mut element = Element::new(
                    page_number,
                    ElementKind::Text,
                    primitive.bbox,
                    normalize_block_text(&primitive.text),
                );

                let children = primitive
                    .lines
                    .iter()
                    .map(|line| {
                        let child = Element::new(
                            page_number,
                            ElementKind::Line,
                            line.bbox,
                            normalize_line_text(&line.text),
                        );
                        (keys.allocate(), child)
                    })
                    .collect();
                element.children = Some(children);

                Some((key, element))
            }
            PrimitiveKind::TextLine => Some((
                keys.allocate(),
                Element::new(
                    page_number,
                    ElementKind::Line,
                    primitive.bbox,
                    normalize_line_text(&primitive.text),
                ),
            )),
            PrimitiveKind::Image => Some((
                keys.allocate(),
                Element::new(page_number, ElementKind::Image, primitive.bbox, IMAGE_PLACEHOLDER),
            )),
            PrimitiveKind::Figure => Some((
                keys.allocate(),
                Element::new(page_number, ElementKind::Figure, primitive.bbox, FIGURE_PLACEHOLDER),
            )),
            PrimitiveKind::Other => None,
        }
    }

    /// Build the product of merging `parts`, which must already be in
    /// document order. The parts become the children of the product.
    pub fn from_merge(page_number: usize, parts: Vec<(ElementKey, Element)>, mode: MergeMode) -> Self {
        let bbox = Rect::bounding(parts.iter().map(|(_, e)| &e.bbox)).unwrap_or_default();
        let text = merged_text(&parts, mode);
        let contd = parts.last().and_then(|(_, e)| e.contd);

        let mut element = Element::new(page_number, ElementKind::Text, bbox, text);
        element.contd = contd;
        element.children = Some(parts);
        element
    }

    pub fn is_safe(&self) -> bool {
        self.safe
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_body(&self) -> bool {
        self.body
    }

    pub fn contd(&self) -> Option<MergeMode> {
        self.contd
    }

    pub fn translated(&self) -> Option<&str> {
        self.translated.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn children(&self) -> &[(ElementKey, Element)] {
        self.children.as_deref().unwrap_or_default()
    }

    /// `safe && visible`: the element is currently exposed to the user.
    pub fn is_exposed(&self) -> bool {
        self.safe && self.visible
    }

    /// `safe && visible && body`: the element takes part in chaining.
    pub fn is_eligible(&self) -> bool {
        self.is_exposed() && self.body
    }

    pub fn can_be_split(&self) -> bool {
        self.children.as_ref().is_some_and(|c| c.len() > 1)
    }

    pub fn can_be_merged(&self) -> bool {
        self.kind.is_textual()
    }

    pub fn can_be_translated(&self) -> bool {
        self.kind.is_textual() && self.translated.is_none()
    }

    /// The text to show for this element on its own.
    pub fn display_text(&self) -> &str {
        self.translated.as_deref().unwrap_or(&self.text)
    }

    /// Flip the body flag. Image and figure elements stay non-body.
    pub fn toggle_body(&mut self) -> bool {
        if !self.kind.is_textual() {
            return false;
        }
        self.body = !self.body;
        true
    }

    pub fn toggle_continuation(&mut self) {
        self.contd = next_continuation(self.contd);
    }

    /// Texts of the leaf elements under this one, in order.
    pub fn leaf_texts(&self) -> Vec<&str> {
        match &self.children {
            Some(children) if !children.is_empty() => {
                children.iter().flat_map(|(_, c)| c.leaf_texts()).collect()
            }
            _ => vec![self.text.as_str()],
        }
    }
}

/// Normalize the text of a text block: hyphenated line wraps are joined,
/// remaining line breaks become spaces.
pub fn normalize_block_text(raw: &str) -> String {
    raw.replace("-\n", "").replace('\n', " ").trim().to_string()
}

/// Normalize the text of a single line. Hyphens are kept since they belong
/// to the line as printed.
pub fn normalize_line_text(raw: &str) -> String {
    raw.replace('\n', " ").trim().to_string()
}

/// Append `next` to `acc` in concat mode, where `prev` is the element whose
/// text currently ends `acc`. A line ending in `-` is treated as a broken
/// word and glued to `next` without the hyphen.
pub(crate) fn push_concat(acc: &mut String, prev: &Element, next: &str) {
    if prev.kind == ElementKind::Line && prev.text.ends_with('-') && acc.ends_with('-') {
        acc.pop();
    } else {
        acc.push(' ');
    }
    acc.push_str(next);
}

fn merged_text(parts: &[(ElementKey, Element)], mode: MergeMode) -> String {
    let mut text = String::new();
    let mut prev: Option<&Element> = None;

    for (_, element) in parts {
        match (prev, mode) {
            (None, _) => text.push_str(&element.text),
            (Some(p), MergeMode::Concat) => push_concat(&mut text, p, &element.text),
            (Some(_), MergeMode::Join) => {
                text.push('\n');
                text.push_str(&element.text);
            }
        }
        prev = Some(element);
    }

    text
}
