//! Read-only views: page summary, element listing and text export.

use std::path::{Path, PathBuf};

use colored::Colorize;
use pdf2md_core::assembly::{document_text, page_text};
use pdf2md_core::{ChainIndex, Document, Element, ElementKey};
use prettytable::row;
use serde::Serialize;

use crate::prelude::{eprintln, println, *};

const PREVIEW_CHARS: usize = 48;

#[derive(Debug, Clone, clap::Args)]
pub struct ElementsArgs {
    /// Only list elements of this page (1-based)
    #[arg(long)]
    pub page: Option<usize>,
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub struct TextArgs {
    /// Only export this page (1-based)
    #[arg(long)]
    pub page: Option<usize>,
    /// Write the text to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// One line of the element listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementRow {
    pub key: ElementKey,
    pub page: usize,
    pub kind: String,
    pub safe: bool,
    pub visible: bool,
    pub body: bool,
    pub contd: Option<String>,
    /// Head of the chain the element belongs to.
    pub chain: Option<ElementKey>,
    pub parts: usize,
    pub translated: bool,
    pub text: String,
}

impl ElementRow {
    fn new(key: ElementKey, element: &Element, chains: &ChainIndex) -> Self {
        ElementRow {
            key,
            page: element.page_number,
            kind: element.kind.to_string(),
            safe: element.is_safe(),
            visible: element.is_visible(),
            body: element.is_body(),
            contd: element.contd().map(|m| m.to_string()),
            chain: chains.head_of(key),
            parts: element.children().len(),
            translated: element.translated().is_some(),
            text: element.text.clone(),
        }
    }
}

/// Rows for every element of `page_index`, or of the whole document.
pub fn element_rows(document: &Document, chains: &ChainIndex, page_index: Option<usize>) -> Vec<ElementRow> {
    match page_index {
        Some(index) => document
            .iter_page(index)
            .map(|(key, e)| ElementRow::new(key, e, chains))
            .collect(),
        None => document
            .iter_all()
            .map(|(key, e)| ElementRow::new(key, e, chains))
            .collect(),
    }
}

/// Shorten `text` to one line of at most [`PREVIEW_CHARS`] characters.
pub fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS - 1).collect();
    f!("{}…", cut)
}

fn mark(on: bool, letter: &str) -> String {
    if on {
        letter.to_string()
    } else {
        "·".to_string()
    }
}

pub fn print_elements(rows: &[ElementRow]) {
    let mut table = new_table();
    table.add_row(row![b => "KEY", "PAGE", "KIND", "FLAGS", "CONTD", "CHAIN", "TEXT"]);

    for r in rows {
        let flags = f!(
            "{}{}{}{}",
            mark(r.safe, "S"),
            mark(r.visible, "V"),
            mark(r.body, "B"),
            mark(r.translated, "T")
        );
        let chain = match r.chain {
            Some(head) if head == r.key => "head".green().to_string(),
            Some(head) => head.to_string(),
            None => String::new(),
        };
        let text = if r.visible && r.safe {
            preview(&r.text)
        } else {
            preview(&r.text).dimmed().to_string()
        };

        table.add_row(row![
            r.key.to_string().cyan(),
            r.page,
            r.kind,
            flags,
            r.contd.clone().unwrap_or_default().yellow(),
            chain,
            text
        ]);
    }

    table.printstd();
}

/// One line per page: size and element counts.
pub fn print_summary(path: &Path, document: &Document, chains: &ChainIndex) {
    println!("{}: {}", "Source".green(), path.display().to_string().bright_white().bold());
    let margin = document.margin();
    println!(
        "{}: ({}, {}, {}, {})",
        "Margin".green(),
        margin.x1,
        margin.y1,
        margin.x2,
        margin.y2
    );
    println!("{}: {}", "Chains".green(), chains.len());

    let mut table = new_table();
    table.add_row(row![b => "PAGE", "SIZE", "ELEMENTS", "HIDDEN", "UNSAFE", "BODY", "TRANSLATED"]);

    for (index, page) in document.pages().iter().enumerate() {
        let elements: Vec<&Element> = document.iter_page(index).map(|(_, e)| e).collect();
        let count = |pred: fn(&Element) -> bool| elements.iter().filter(|e| pred(e)).count();

        table.add_row(row![
            page.page_number,
            f!("{:.0} x {:.0}", page.width, page.height),
            elements.len(),
            count(|e| !e.is_visible()),
            count(|e| !e.is_safe()),
            count(|e| e.is_body()),
            count(|e| e.translated().is_some())
        ]);
    }

    table.printstd();
}

/// Exported text of one page or the whole document.
pub fn export_text(document: &Document, chains: &ChainIndex, page_index: Option<usize>) -> String {
    match page_index {
        Some(index) => page_text(document, chains, index),
        None => document_text(document, chains),
    }
}

/// Write `text` to `output`, or print it.
pub fn write_text(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let mut contents = text.to_string();
            if !contents.ends_with('\n') {
                contents.push('\n');
            }
            std::fs::write(path, contents)
                .with_context(|| f!("Failed to write {}", path.display()))?;
            eprintln!("{} {}", "Written to:".green().bold(), path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}
