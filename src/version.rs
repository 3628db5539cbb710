use std::{
    fmt,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::{
    foundation::error::{BoardError, BoardResult},
    scan,
};

/// Highest version index a batch may carry.
///
/// Batch names are not zero-padded, so lexicographic order (which [`latest_entry`] relies on)
/// only matches numeric order while the index stays a single digit.
pub const MAX_VERSION_INDEX: u32 = 9;

/// Name of one render batch directory: `<YYMMDD>v<index>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchName {
    pub date: String,
    pub index: u32,
}

impl BatchName {
    pub fn new(date: &str, index: u32) -> BoardResult<Self> {
        validate_date(date)?;
        Ok(Self {
            date: date.to_string(),
            index,
        })
    }

    pub fn parse(name: &str) -> Option<Self> {
        let (date, index) = name.split_once('v')?;
        if !is_date_stamp(date) || index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        Some(Self {
            date: date.to_string(),
            index: index.parse().ok()?,
        })
    }
}

impl fmt::Display for BatchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.date, self.index)
    }
}

fn is_date_stamp(s: &str) -> bool {
    s.len() == 6 && s.bytes().all(|b| b.is_ascii_digit())
}

pub fn validate_date(date: &str) -> BoardResult<()> {
    if is_date_stamp(date) {
        Ok(())
    } else {
        Err(BoardError::validation(format!(
            "batch date must be six digits (YYMMDD), got '{date}'"
        )))
    }
}

/// Local date as `YYMMDD`.
pub fn today_stamp() -> String {
    chrono::Local::now().format("%y%m%d").to_string()
}

/// Resolve the next batch directory for `today` under `renderings_root`.
///
/// Does not create anything; see [`create_batch_dir`].
#[tracing::instrument(skip(renderings_root), fields(root = %renderings_root.display()))]
pub fn allocate_batch_dir(renderings_root: &Path, today: &str) -> BoardResult<PathBuf> {
    let candidate = BatchName::new(today, 0)?;

    let dirs = match scan::list_dirs(renderings_root) {
        Ok(dirs) => dirs,
        Err(BoardError::NotFound(_)) => Vec::new(),
        Err(e) => return Err(e),
    };

    let same_day_max = dirs
        .iter()
        .map(|p| scan::file_name_of(p))
        .filter_map(|name| {
            let parsed = BatchName::parse(&name);
            if parsed.is_none() && name.starts_with(today) {
                tracing::debug!(%name, "ignoring malformed batch directory");
            }
            parsed
        })
        .filter(|b| b.date == today)
        .map(|b| b.index)
        .max();

    let next = match same_day_max {
        None => candidate,
        Some(max) if max >= MAX_VERSION_INDEX => {
            return Err(BoardError::VersionExhausted(today.to_string()));
        }
        Some(max) => BatchName::new(today, max + 1)?,
    };

    tracing::debug!(batch = %next, "allocated render batch");
    Ok(renderings_root.join(next.to_string()))
}

/// Create an allocated batch directory. Fails if it already exists.
pub fn create_batch_dir(path: &Path) -> BoardResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create renderings dir '{}'", parent.display()))?;
    }
    std::fs::create_dir(path)
        .with_context(|| format!("create batch dir '{}'", path.display()))?;
    Ok(())
}

/// Newest subdirectory of `dir` by reverse name order.
pub fn latest_entry(dir: &Path) -> BoardResult<PathBuf> {
    let mut dirs = scan::list_dirs(dir)?;
    dirs.sort_by(|a, b| b.cmp(a));
    dirs.into_iter()
        .next()
        .ok_or_else(|| BoardError::not_found(format!("no batch directory in '{}'", dir.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mkdirs(root: &Path, names: &[&str]) {
        for n in names {
            std::fs::create_dir_all(root.join(n)).unwrap();
        }
    }

    #[test]
    fn parse_accepts_only_well_formed_names() {
        assert_eq!(
            BatchName::parse("240517v3"),
            Some(BatchName {
                date: "240517".to_string(),
                index: 3
            })
        );
        assert_eq!(BatchName::parse("240517"), None);
        assert_eq!(BatchName::parse("24051v3"), None);
        assert_eq!(BatchName::parse("240517vx"), None);
        assert_eq!(BatchName::parse("240517v"), None);
    }

    #[test]
    fn empty_or_missing_root_yields_v0() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(
            allocate_batch_dir(tmp.path(), "240517").unwrap(),
            tmp.path().join("240517v0")
        );
        let missing = tmp.path().join("renderings");
        assert_eq!(
            allocate_batch_dir(&missing, "240517").unwrap(),
            missing.join("240517v0")
        );
    }

    #[test]
    fn next_index_is_max_plus_one_not_count() {
        let tmp = tempfile::tempdir().unwrap();
        mkdirs(tmp.path(), &["240517v0", "240517v4", "240516v7"]);
        assert_eq!(
            allocate_batch_dir(tmp.path(), "240517").unwrap(),
            tmp.path().join("240517v5")
        );
    }

    #[test]
    fn other_dates_do_not_influence_index() {
        let tmp = tempfile::tempdir().unwrap();
        mkdirs(tmp.path(), &["240516v7", "240601v2"]);
        assert_eq!(
            allocate_batch_dir(tmp.path(), "240517").unwrap(),
            tmp.path().join("240517v0")
        );
    }

    #[test]
    fn index_past_nine_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        mkdirs(tmp.path(), &["240517v9"]);
        assert!(matches!(
            allocate_batch_dir(tmp.path(), "240517"),
            Err(BoardError::VersionExhausted(_))
        ));
    }

    #[test]
    fn bad_date_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            allocate_batch_dir(tmp.path(), "2024-05-17"),
            Err(BoardError::Validation(_))
        ));
    }

    #[test]
    fn allocation_does_not_create_and_create_refuses_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let path = allocate_batch_dir(tmp.path(), "240517").unwrap();
        assert!(!path.exists());
        create_batch_dir(&path).unwrap();
        assert!(path.is_dir());
        assert!(create_batch_dir(&path).is_err());
    }

    #[test]
    fn latest_entry_prefers_later_date_then_higher_index() {
        let tmp = tempfile::tempdir().unwrap();
        mkdirs(tmp.path(), &["240516v7", "240517v0", "240517v2", ".hidden"]);
        assert_eq!(
            latest_entry(tmp.path()).unwrap(),
            tmp.path().join("240517v2")
        );
    }

    #[test]
    fn latest_entry_on_empty_dir_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            latest_entry(tmp.path()),
            Err(BoardError::NotFound(_))
        ));
    }
}
