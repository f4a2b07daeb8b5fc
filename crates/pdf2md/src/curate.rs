//! Editing commands shared by the one-shot subcommands and `session`.

use colored::Colorize;
use pdf2md_core::{Disposition, Document, ElementKey, MergeMode, SafeMargin};

use crate::prelude::{println, *};

#[derive(Debug, Clone, clap::Args)]
pub struct KeyArg {
    /// Element key
    pub key: ElementKey,
}

#[derive(Debug, Clone, clap::Args)]
pub struct MarginArgs {
    /// Left inset as a fraction of the page width
    pub x1: f64,
    /// Top inset as a fraction of the page height
    pub y1: f64,
    /// Right edge as a fraction of the page width
    pub x2: f64,
    /// Bottom edge as a fraction of the page height
    pub y2: f64,
}

#[derive(Debug, Clone, clap::Args)]
pub struct MergeArgs {
    /// Page (1-based) holding the elements
    #[arg(long)]
    pub page: usize,
    /// Join with newlines instead of concatenating with spaces
    #[arg(long)]
    pub join: bool,
    /// Keys of the elements to merge
    #[arg(required = true, num_args = 1..)]
    pub keys: Vec<ElementKey>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct MoveArgs {
    /// Page (1-based) holding both elements
    #[arg(long)]
    pub page: usize,
    /// Element the moved one is placed next to
    pub pivot: ElementKey,
    /// Element to move
    pub moved: ElementKey,
    /// Place the moved element before the pivot instead of after it
    #[arg(long)]
    pub before: bool,
}

/// One document edit, with page numbers already resolved to indexes.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    Margin(SafeMargin),
    Visible(ElementKey),
    Body(ElementKey),
    Contd(ElementKey),
    Merge {
        page_index: usize,
        keys: Vec<ElementKey>,
        mode: MergeMode,
    },
    Split(ElementKey),
    Move {
        page_index: usize,
        pivot: ElementKey,
        moved: ElementKey,
        disposition: Disposition,
    },
    Clear(ElementKey),
}

impl Edit {
    pub fn margin(args: &MarginArgs) -> Result<Self> {
        let margin = SafeMargin::new(args.x1, args.y1, args.x2, args.y2);
        if !margin.is_valid() {
            return Err(eyre!(Error::InvalidMargin(f!(
                "({}, {}, {}, {}) must lie in [0, 1] with x1 <= x2 and y1 <= y2",
                args.x1,
                args.y1,
                args.x2,
                args.y2
            ))));
        }
        Ok(Edit::Margin(margin))
    }

    pub fn merge(args: &MergeArgs, page_index: usize) -> Self {
        Edit::Merge {
            page_index,
            keys: args.keys.clone(),
            mode: if args.join { MergeMode::Join } else { MergeMode::Concat },
        }
    }

    pub fn moving(args: &MoveArgs, page_index: usize) -> Self {
        Edit::Move {
            page_index,
            pivot: args.pivot,
            moved: args.moved,
            disposition: if args.before {
                Disposition::Before
            } else {
                Disposition::After
            },
        }
    }
}

/// What an edit did to the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Changed(String),
    Unchanged(String),
}

impl Outcome {
    pub fn changed(&self) -> bool {
        matches!(self, Outcome::Changed(_))
    }

    pub fn print(&self) {
        match self {
            Outcome::Changed(msg) => println!("{}", msg.green()),
            Outcome::Unchanged(msg) => println!("{} {}", "unchanged:".yellow(), msg),
        }
    }
}

fn outcome(changed: bool, done: String, why_not: String) -> Outcome {
    if changed {
        Outcome::Changed(done)
    } else {
        Outcome::Unchanged(why_not)
    }
}

fn flag(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

/// Apply `edit`. Edits that do not apply leave the document untouched and
/// report [`Outcome::Unchanged`].
pub fn apply(document: &mut Document, edit: &Edit) -> Outcome {
    log::debug!("applying {:?}", edit);

    match edit {
        Edit::Margin(margin) => {
            document.set_margin(*margin);
            Outcome::Changed(f!(
                "margin set to ({}, {}, {}, {})",
                margin.x1,
                margin.y1,
                margin.x2,
                margin.y2
            ))
        }
        Edit::Visible(key) => {
            let changed = document.toggle_visibility(*key);
            let state = document.get(*key).map(|e| flag(e.is_visible()));
            outcome(
                changed,
                f!("element {} visible: {}", key, state.unwrap_or("?")),
                f!("no element {}", key),
            )
        }
        Edit::Body(key) => {
            let changed = document.toggle_body(*key);
            let state = document.get(*key).map(|e| flag(e.is_body()));
            outcome(
                changed,
                f!("element {} body: {}", key, state.unwrap_or("?")),
                f!("element {} is missing or not text", key),
            )
        }
        Edit::Contd(key) => {
            let changed = document.toggle_continuation(*key);
            let state = document
                .get(*key)
                .and_then(|e| e.contd())
                .map(|m| m.to_string())
                .unwrap_or_else(|| "none".to_string());
            outcome(
                changed,
                f!("element {} continuation: {}", key, state),
                f!("element {} is missing or not text", key),
            )
        }
        Edit::Merge {
            page_index,
            keys,
            mode,
        } => match document.merge(*page_index, keys, *mode) {
            Some(merged) => {
                let parts = document.get(merged).map_or(0, |e| e.children().len());
                Outcome::Changed(f!("merged {} elements into {}", parts, merged))
            }
            None => Outcome::Unchanged(f!(
                "merge needs at least two mergeable elements of page {}",
                page_index + 1
            )),
        },
        Edit::Split(key) => {
            let changed = document.split(*key);
            outcome(
                changed,
                f!("element {} split", key),
                f!("element {} is missing or has no parts", key),
            )
        }
        Edit::Move {
            page_index,
            pivot,
            moved,
            disposition,
        } => {
            let changed = document.move_element(*pivot, *moved, *page_index, *disposition);
            let side = match disposition {
                Disposition::Before => "before",
                Disposition::After => "after",
            };
            outcome(
                changed,
                f!("element {} moved {} {}", moved, side, pivot),
                f!("elements {} and {} are not both on page {}", pivot, moved, page_index + 1),
            )
        }
        Edit::Clear(key) => {
            let had_translation = document.get(*key).and_then(|e| e.translated()).is_some();
            if !document.clear_translation(*key) {
                return Outcome::Unchanged(f!("no element {}", key));
            }
            outcome(
                had_translation,
                f!("translation of {} cleared", key),
                f!("element {} has no translation", key),
            )
        }
    }
}
