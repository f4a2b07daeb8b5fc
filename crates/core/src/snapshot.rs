//! Snapshot persistence for curated documents.
//!
//! A snapshot stores the whole document model as JSON, named after the md5
//! digest of the source file so that edits to the source invalidate it.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::Document;

/// Bumped whenever the serialized model changes shape.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot {path} is unreadable: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Identity of a source document: md5 hex digest of its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        SourceId(format!("{:x}", md5::compute(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub source: SourceId,
    pub document: Document,
}

impl Snapshot {
    pub fn new(source: SourceId, document: Document) -> Self {
        Snapshot {
            version: SNAPSHOT_VERSION,
            source,
            document,
        }
    }
}

pub fn snapshot_path(dir: &Path, source: &SourceId) -> PathBuf {
    dir.join(format!("{}.json", source))
}

/// Write `snapshot` into `dir`, creating the directory when needed.
///
/// The file is written next to its final name and renamed into place so a
/// crash never leaves a half-written snapshot behind.
pub fn save_snapshot(dir: &Path, snapshot: &Snapshot) -> Result<PathBuf, SnapshotError> {
    fs::create_dir_all(dir)?;

    let path = snapshot_path(dir, &snapshot.source);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(snapshot)?;

    fs::write(&tmp, json)?;
    fs::rename(&tmp, &path)?;

    log::debug!("saved snapshot {}", path.display());
    Ok(path)
}

/// Load the snapshot for `source` from `dir`.
///
/// A missing file is `Ok(None)`. A file that cannot be decoded, was written
/// by another version, or belongs to a different source is
/// [`SnapshotError::Corrupt`]; callers rebuild from the source in that case.
pub fn load_snapshot(dir: &Path, source: &SourceId) -> Result<Option<Snapshot>, SnapshotError> {
    let path = snapshot_path(dir, source);

    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let corrupt = |reason: String| SnapshotError::Corrupt {
        path: path.clone(),
        reason,
    };

    let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(corrupt(format!(
            "version {} (expected {})",
            snapshot.version, SNAPSHOT_VERSION
        )));
    }

    if snapshot.source != *source {
        return Err(corrupt(format!("belongs to source {}", snapshot.source)));
    }

    Ok(Some(snapshot))
}

/// Remove the snapshot for `source`. Returns whether a file was deleted.
pub fn remove_snapshot(dir: &Path, source: &SourceId) -> Result<bool, SnapshotError> {
    match fs::remove_file(snapshot_path(dir, source)) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementKey, MergeMode};
    use crate::geometry::Rect;
    use crate::primitive::{Primitive, RawPage};
    use crate::safe_area::SafeMargin;
    use tempfile::TempDir;

    fn sample_document() -> Document {
        let layout = vec![RawPage {
            width: 200.0,
            height: 200.0,
            primitives: vec![
                Primitive::text_line(Rect::new(40.0, 100.0, 160.0, 110.0), "one"),
                Primitive::text_line(Rect::new(40.0, 88.0, 160.0, 98.0), "two"),
                Primitive::image(Rect::new(40.0, 40.0, 160.0, 80.0)),
            ],
        }];
        let mut doc = Document::from_pages(&layout, SafeMargin::default());
        doc.merge(0, &[ElementKey::new(0), ElementKey::new(1)], MergeMode::Join);
        doc.toggle_continuation(ElementKey::new(3));
        doc
    }

    #[test]
    fn test_source_id_is_md5_hex() {
        let id = SourceId::from_bytes(b"hello");
        assert_eq!(id.as_str(), "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(id, SourceId::from_bytes(b"hello"));
        assert_ne!(id, SourceId::from_bytes(b"hello!"));
    }

    #[test]
    fn test_save_and_load_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let source = SourceId::from_bytes(b"%PDF-1.7 sample");
        let snapshot = Snapshot::new(source.clone(), sample_document());

        let path = save_snapshot(temp_dir.path(), &snapshot).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = load_snapshot(temp_dir.path(), &source).unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.document.next_key(), ElementKey::new(4));
        assert_eq!(loaded.document.get(ElementKey::new(3)).unwrap().contd(), Some(MergeMode::Concat));
    }

    #[test]
    fn test_load_missing_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_snapshot(temp_dir.path(), &SourceId::from_bytes(b"nothing"));
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_load_corrupt_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let source = SourceId::from_bytes(b"broken");
        fs::write(snapshot_path(temp_dir.path(), &source), "{ not json").unwrap();

        let result = load_snapshot(temp_dir.path(), &source);
        assert!(matches!(result, Err(SnapshotError::Corrupt { .. })));
    }

    #[test]
    fn test_load_binary_snapshot_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let source = SourceId::from_bytes(b"binary");
        fs::write(snapshot_path(temp_dir.path(), &source), [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let result = load_snapshot(temp_dir.path(), &source);
        assert!(matches!(result, Err(SnapshotError::Corrupt { .. })));
    }

    #[test]
    fn test_load_rejects_other_version() {
        let temp_dir = TempDir::new().unwrap();
        let source = SourceId::from_bytes(b"old");
        let mut snapshot = Snapshot::new(source.clone(), Document::default());
        snapshot.version = SNAPSHOT_VERSION + 1;
        save_snapshot(temp_dir.path(), &snapshot).unwrap();

        let result = load_snapshot(temp_dir.path(), &source);
        assert!(matches!(result, Err(SnapshotError::Corrupt { .. })));
    }

    #[test]
    fn test_remove_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let source = SourceId::from_bytes(b"gone");
        save_snapshot(temp_dir.path(), &Snapshot::new(source.clone(), Document::default())).unwrap();

        assert!(remove_snapshot(temp_dir.path(), &source).unwrap());
        assert!(!remove_snapshot(temp_dir.path(), &source).unwrap());
    }
}
