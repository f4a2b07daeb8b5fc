use std::fs;
use std::path::{Path, PathBuf};

use pdf::LayoutParams;
use pdf2md_core::snapshot::{
    load_snapshot, remove_snapshot, save_snapshot, Snapshot, SnapshotError, SourceId,
};
use pdf2md_core::{ChainIndex, Document, SafeMargin};

use crate::prelude::*;

/// Directory holding document snapshots.
///
/// `override_dir` comes from `--cache-dir` / `PDF2MD_CACHE_DIR`.
pub fn cache_dir(override_dir: Option<&Path>) -> Result<PathBuf> {
    let dir = match override_dir {
        Some(dir) => dir.to_path_buf(),
        None => dirs_next::cache_dir()
            .ok_or_else(|| eyre!("Unable to determine cache directory"))?
            .join("pdf2md"),
    };

    fs::create_dir_all(&dir).map_err(|e| eyre!("Failed to create cache directory: {}", e))?;

    Ok(dir)
}

/// How a session's document came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Snapshot,
    Layout,
}

/// A source file together with its curated document.
#[derive(Debug)]
pub struct Session {
    pub path: PathBuf,
    pub source: SourceId,
    pub document: Document,
    pub origin: Origin,
    cache_dir: PathBuf,
}

impl Session {
    /// Load the snapshot of `path`, or lay the source out again when there
    /// is none, it is unreadable, or `rebuild` is set.
    pub fn open(path: &Path, cache_dir: &Path, rebuild: bool, params: &LayoutParams) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| f!("Failed to read {}", path.display()))?;
        let source = SourceId::from_bytes(&bytes);

        let snapshot = if rebuild {
            if remove_snapshot(cache_dir, &source).map_err(|e| eyre!(e))? {
                log::debug!("discarded snapshot for {}", source);
            }
            None
        } else {
            match load_snapshot(cache_dir, &source) {
                Ok(snapshot) => snapshot,
                Err(SnapshotError::Corrupt { path, reason }) => {
                    log::warn!("ignoring snapshot {}: {}", path.display(), reason);
                    None
                }
                Err(e) => return Err(eyre!(e)),
            }
        };

        let (document, origin) = match snapshot {
            Some(snapshot) => (snapshot.document, Origin::Snapshot),
            None => {
                let pages = crate::ingest::load_pages(path, &bytes, params)?;
                (Document::from_pages(&pages, SafeMargin::default()), Origin::Layout)
            }
        };

        log::debug!(
            "opened {} ({} pages, from {:?})",
            path.display(),
            document.page_count(),
            origin
        );

        Ok(Session {
            path: path.to_path_buf(),
            source,
            document,
            origin,
            cache_dir: cache_dir.to_path_buf(),
        })
    }

    /// Rebuild the chain index for the current document state.
    pub fn chains(&self) -> ChainIndex {
        let chains = ChainIndex::build(&self.document);
        log::debug!("{} chains over {} members", chains.len(), chains.members().count());
        chains
    }

    /// Write the document snapshot. Returns the snapshot path.
    pub fn save(&self) -> Result<PathBuf> {
        let snapshot = Snapshot::new(self.source.clone(), self.document.clone());
        save_snapshot(&self.cache_dir, &snapshot).map_err(|e| eyre!(e))
    }

    /// Convert a 1-based page number from the command line into a page
    /// index, checking that the page exists.
    pub fn page_index(&self, page: usize) -> Result<usize> {
        match page.checked_sub(1) {
            Some(index) if index < self.document.page_count() => Ok(index),
            _ => Err(eyre!(Error::PageOutOfRange(page))),
        }
    }
}
