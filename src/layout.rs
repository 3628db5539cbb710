//! Path contract of the shared store.
//!
//! ```text
//! <root>/<subject>/renderings/<YYMMDD>v<index>/<base>[.<role>].<ext>
//! <root>/<subject>/composites/<base>.<artifact_ext>
//! <root>/<subject>/composites/JPEG/<base>.jpg
//! <root>/<subject>/tour/panos/           (+ panos_backup/)
//! <root>/<combined>/tour/panos_<subject-lowercased>/
//! ```

use std::path::{Path, PathBuf};

use crate::foundation::config::{Config, Subject};

pub const RENDERINGS_DIR: &str = "renderings";
pub const COMPOSITES_DIR: &str = "composites";
pub const PREVIEW_DIR: &str = "JPEG";
pub const PREVIEW_EXTENSION: &str = "jpg";
pub const TOUR_DIR: &str = "tour";
pub const PANOS_DIR: &str = "panos";

/// Suffix appended to a directory name to form its backup sibling.
pub const BACKUP_SUFFIX: &str = "_backup";

#[derive(Clone, Copy, Debug)]
pub struct Layout<'a> {
    cfg: &'a Config,
}

impl<'a> Layout<'a> {
    pub fn new(cfg: &'a Config) -> Self {
        Self { cfg }
    }

    pub fn subject_root(&self, subject: &Subject) -> PathBuf {
        self.cfg.base_path.join(subject.as_str())
    }

    pub fn renderings_dir(&self, subject: &Subject) -> PathBuf {
        self.subject_root(subject).join(RENDERINGS_DIR)
    }

    pub fn composites_dir(&self, subject: &Subject) -> PathBuf {
        self.subject_root(subject).join(COMPOSITES_DIR)
    }

    pub fn preview_dir(&self, subject: &Subject) -> PathBuf {
        preview_dir_for(&self.composites_dir(subject))
    }

    pub fn artifact_path(&self, subject: &Subject, key: &str) -> PathBuf {
        artifact_path_in(
            &self.composites_dir(subject),
            key,
            &self.cfg.artifact_extension,
        )
    }

    pub fn tour_dir(&self, subject: &Subject) -> PathBuf {
        self.subject_root(subject).join(TOUR_DIR)
    }

    pub fn panos_dir(&self, subject: &Subject) -> PathBuf {
        self.tour_dir(subject).join(PANOS_DIR)
    }

    pub fn panos_backup_dir(&self, subject: &Subject) -> PathBuf {
        backup_dir_for(&self.panos_dir(subject))
    }

    pub fn combined_panos_dir(&self, subject: &Subject) -> PathBuf {
        self.cfg
            .base_path
            .join(&self.cfg.combined_subject)
            .join(TOUR_DIR)
            .join(format!("{PANOS_DIR}_{}", subject.as_str().to_lowercase()))
    }
}

pub fn artifact_path_in(dir: &Path, key: &str, extension: &str) -> PathBuf {
    dir.join(format!("{key}.{extension}"))
}

pub fn preview_dir_for(composites_dir: &Path) -> PathBuf {
    composites_dir.join(PREVIEW_DIR)
}

pub fn preview_path_for(composites_dir: &Path, key: &str) -> PathBuf {
    preview_dir_for(composites_dir).join(format!("{key}.{PREVIEW_EXTENSION}"))
}

/// `<dir>_backup` next to `dir`.
pub fn backup_dir_for(dir: &Path) -> PathBuf {
    let mut name = dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(BACKUP_SUFFIX);
    dir.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_store_contract() {
        let cfg = Config::new("/store", &["Alpha"]);
        let layout = Layout::new(&cfg);
        let s = cfg.subject("Alpha").unwrap();

        assert_eq!(
            layout.renderings_dir(&s),
            PathBuf::from("/store/Alpha/renderings")
        );
        assert_eq!(
            layout.artifact_path(&s, "door"),
            PathBuf::from("/store/Alpha/composites/door.board")
        );
        assert_eq!(
            preview_path_for(&layout.composites_dir(&s), "door"),
            PathBuf::from("/store/Alpha/composites/JPEG/door.jpg")
        );
        assert_eq!(
            layout.panos_backup_dir(&s),
            PathBuf::from("/store/Alpha/tour/panos_backup")
        );
        assert_eq!(
            layout.combined_panos_dir(&s),
            PathBuf::from("/store/COMBINED/tour/panos_alpha")
        );
    }
}
