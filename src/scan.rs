use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::{BoardError, BoardResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Any,
    File,
    Dir,
}

impl EntryKind {
    fn accepts(self, path: &Path) -> bool {
        match self {
            EntryKind::Any => true,
            EntryKind::File => path.is_file(),
            EntryKind::Dir => path.is_dir(),
        }
    }
}

pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Direct children of `dir`, dot-entries excluded, sorted by name.
pub fn list_entries(dir: &Path, kind: EntryKind) -> BoardResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(BoardError::not_found(format!(
            "directory '{}'",
            dir.display()
        )));
    }

    let mut out = Vec::new();
    let rd = std::fs::read_dir(dir).with_context(|| format!("read dir '{}'", dir.display()))?;
    for entry in rd {
        let entry = entry.with_context(|| format!("read entry in '{}'", dir.display()))?;
        let name = entry.file_name();
        if is_hidden(&name.to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        if kind.accepts(&path) {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

pub fn list_files(dir: &Path) -> BoardResult<Vec<PathBuf>> {
    list_entries(dir, EntryKind::File)
}

pub fn list_dirs(dir: &Path) -> BoardResult<Vec<PathBuf>> {
    list_entries(dir, EntryKind::Dir)
}

/// File name of `path` as UTF-8, lossy.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
