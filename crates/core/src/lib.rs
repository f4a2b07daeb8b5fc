//! Core library for pdf2md
//!
//! This crate implements the **Functional Core** of the pdf2md application,
//! following the Functional Core - Imperative Shell architectural pattern.
//!
//! # Architecture Overview
//!
//! The pdf2md project splits into three crates:
//!
//! - **`pdf2md_core`** (this crate): the document model and every operation on it
//! - **`pdf`**: the layout parser that turns a PDF into positioned primitives
//! - **`pdf2md`**: I/O and orchestration (the Imperative Shell)
//!
//! The only I/O in this crate is the snapshot store, which reads and writes
//! plain files in a directory chosen by the shell.
//!
//! # Module Organization
//!
//! - [`geometry`]: rectangles and the overlap test
//! - [`primitive`]: layout primitives, the input contract for parsers
//! - [`element`]: elements, keys and merge modes
//! - [`store`]: the page store ([`Document`])
//! - [`safe_area`]: margins and safe-area membership
//! - [`mutation`]: visibility, body, continuation, split, merge and move
//! - [`chain`]: chain reconstruction across pages
//! - [`assembly`]: page and document text
//! - [`translate`]: translation tickets, completion status and prompts
//! - [`snapshot`]: persisted snapshots keyed by source digest
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use pdf2md_core::{ChainIndex, Document, ElementKey, MergeMode, SafeMargin};
//!
//! let mut doc = Document::from_pages(&raw_pages, SafeMargin::default());
//! doc.toggle_continuation(ElementKey::new(4));
//! doc.merge(0, &[ElementKey::new(1), ElementKey::new(2)], MergeMode::Concat);
//!
//! // Chains are rebuilt after every mutation before text is read.
//! let chains = ChainIndex::build(&doc);
//! let text = pdf2md_core::assembly::page_text(&doc, &chains, 0);
//! ```

pub mod assembly;
pub mod chain;
pub mod element;
pub mod geometry;
pub mod mutation;
pub mod primitive;
pub mod safe_area;
pub mod snapshot;
pub mod store;
pub mod translate;

pub use chain::ChainIndex;
pub use element::{Element, ElementKey, ElementKind, MergeMode};
pub use geometry::Rect;
pub use mutation::Disposition;
pub use primitive::{Primitive, PrimitiveKind, RawPage};
pub use safe_area::SafeMargin;
pub use store::{Document, Page};
