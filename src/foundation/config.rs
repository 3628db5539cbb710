use std::{
    fmt,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::foundation::error::{BoardError, BoardResult};

/// Sentinel subject name selecting every concrete subject at once.
pub const ALL_SUBJECTS: &str = "ALL";

/// Process-wide settings, loaded once at start-up and passed by reference.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Config {
    /// Root of the shared store; every subject owns `<base_path>/<subject>`.
    pub base_path: PathBuf,
    /// Allow-list of subject names.
    pub subjects: Vec<String>,
    /// Subject holding the shared background renders.
    #[serde(default = "default_backgrounds_subject")]
    pub backgrounds_subject: String,
    /// Directory name of the aggregate tour bundle under `base_path`.
    #[serde(default = "default_combined_subject")]
    pub combined_subject: String,
    /// File extension of composite artifacts (without the dot).
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,
    /// Panorama tool executable.
    #[serde(default = "default_panorama_tool")]
    pub panorama_tool: PathBuf,
    /// Configuration template handed to the panorama tool.
    #[serde(default)]
    pub panorama_config: PathBuf,
    #[serde(default)]
    pub preview: PreviewConfig,
}

/// Options for flattened preview export.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PreviewConfig {
    /// JPEG quality, 1..=100.
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Colour transparent regions are flattened onto.
    #[serde(default = "default_matte")]
    pub matte: [u8; 3],
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            quality: default_quality(),
            matte: default_matte(),
        }
    }
}

fn default_backgrounds_subject() -> String {
    "BACKGROUNDS".to_string()
}

fn default_combined_subject() -> String {
    "COMBINED".to_string()
}

fn default_artifact_extension() -> String {
    "board".to_string()
}

fn default_panorama_tool() -> PathBuf {
    PathBuf::from("krpanotools")
}

fn default_quality() -> u8 {
    90
}

fn default_matte() -> [u8; 3] {
    [255, 255, 255]
}

/// A subject name that passed the allow-list check.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Subject(String);

impl Subject {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Config {
    /// Minimal configuration with defaults for everything but the store root and allow-list.
    pub fn new(base_path: impl Into<PathBuf>, subjects: &[&str]) -> Self {
        Self {
            base_path: base_path.into(),
            subjects: subjects.iter().map(|s| s.to_string()).collect(),
            backgrounds_subject: default_backgrounds_subject(),
            combined_subject: default_combined_subject(),
            artifact_extension: default_artifact_extension(),
            panorama_tool: default_panorama_tool(),
            panorama_config: PathBuf::new(),
            preview: PreviewConfig::default(),
        }
    }

    pub fn load(path: &Path) -> BoardResult<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let cfg: Config = serde_json::from_str(&raw).map_err(|e| {
            BoardError::serde(format!("parse config '{}': {e}", path.display()))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> BoardResult<()> {
        if self.base_path.as_os_str().is_empty() {
            return Err(BoardError::validation("base_path must not be empty"));
        }
        if self.subjects.is_empty() {
            return Err(BoardError::validation("subjects allow-list must not be empty"));
        }
        if self.subjects.iter().any(|s| s == ALL_SUBJECTS) {
            return Err(BoardError::validation(format!(
                "'{ALL_SUBJECTS}' is reserved and cannot be listed as a subject"
            )));
        }
        if self
            .subjects
            .iter()
            .any(|s| s.is_empty() || s.contains(['/', '\\']))
        {
            return Err(BoardError::validation(
                "subject names must be non-empty single path segments",
            ));
        }
        if self.artifact_extension.is_empty() || self.artifact_extension.contains('.') {
            return Err(BoardError::validation(
                "artifact_extension must be non-empty and must not contain '.'",
            ));
        }
        if !(1..=100).contains(&self.preview.quality) {
            return Err(BoardError::validation(
                "preview quality must be within 1..=100",
            ));
        }
        Ok(())
    }

    /// Check a single subject name against the allow-list.
    pub fn subject(&self, name: &str) -> BoardResult<Subject> {
        if self.subjects.iter().any(|s| s == name) {
            Ok(Subject(name.to_string()))
        } else {
            Err(BoardError::validation(format!(
                "unsupported subject '{name}'; supported: {}",
                self.subjects.join(", ")
            )))
        }
    }

    /// Resolve a name from the command line; `ALL` expands to every non-reserved subject.
    pub fn resolve_subjects(&self, name: &str) -> BoardResult<Vec<Subject>> {
        if name == ALL_SUBJECTS {
            let out: Vec<Subject> = self
                .subjects
                .iter()
                .filter(|s| !self.is_reserved(s))
                .map(|s| Subject(s.clone()))
                .collect();
            if out.is_empty() {
                return Err(BoardError::validation(
                    "allow-list contains only reserved subjects",
                ));
            }
            return Ok(out);
        }
        Ok(vec![self.subject(name)?])
    }

    /// The shared background pool. It need not be in the allow-list to be read from.
    pub fn backgrounds(&self) -> Subject {
        Subject(self.backgrounds_subject.clone())
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        name == self.backgrounds_subject || name == self.combined_subject
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Config {
        Config::new("/store", &["ALPHA", "BETA", "BACKGROUNDS"])
    }

    #[test]
    fn all_expands_to_non_reserved_subjects() {
        let subjects = cfg().resolve_subjects(ALL_SUBJECTS).unwrap();
        let names: Vec<&str> = subjects.iter().map(Subject::as_str).collect();
        assert_eq!(names, vec!["ALPHA", "BETA"]);
    }

    #[test]
    fn unknown_subject_is_rejected() {
        let err = cfg().resolve_subjects("GAMMA").unwrap_err();
        assert!(matches!(err, BoardError::Validation(_)));
        assert!(err.to_string().contains("GAMMA"));
    }

    #[test]
    fn reserved_subject_can_be_selected_explicitly() {
        let subjects = cfg().resolve_subjects("BACKGROUNDS").unwrap();
        assert_eq!(subjects[0].as_str(), "BACKGROUNDS");
    }

    #[test]
    fn validation_catches_bad_values() {
        assert!(Config::new("/store", &[]).validate().is_err());
        assert!(Config::new("/store", &["ALL"]).validate().is_err());
        assert!(Config::new("", &["A"]).validate().is_err());

        let mut c = cfg();
        c.preview.quality = 0;
        assert!(c.validate().is_err());

        let mut c = cfg();
        c.artifact_extension = "board.json".to_string();
        assert!(c.validate().is_err());

        assert!(cfg().validate().is_ok());
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let c: Config =
            serde_json::from_str(r#"{"base_path": "/store", "subjects": ["A"]}"#).unwrap();
        assert_eq!(c.backgrounds_subject, "BACKGROUNDS");
        assert_eq!(c.combined_subject, "COMBINED");
        assert_eq!(c.artifact_extension, "board");
        assert_eq!(c.preview, PreviewConfig::default());
    }
}
