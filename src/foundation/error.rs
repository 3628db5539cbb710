use std::path::PathBuf;

/// Convenience result type used across tourboard.
pub type BoardResult<T> = Result<T, BoardError>;

/// Top-level error taxonomy used by pipeline APIs.
#[derive(thiserror::Error, Debug)]
pub enum BoardError {
    /// A directory or entry the operation depends on does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The document editor could not be reached or refused to open a session/document.
    #[error("editor unavailable: {0}")]
    EditorUnavailable(String),

    /// An editor operation failed after a session was acquired.
    #[error("editor action failed: {0}")]
    EditorActionFailed(String),

    /// Refusal to overwrite an existing composite artifact.
    #[error("artifact already exists: '{}'", .0.display())]
    ArtifactExists(PathBuf),

    /// Refusal to copy into a directory that still has content.
    #[error("destination not empty: '{}'", .0.display())]
    DestinationNotEmpty(PathBuf),

    /// A rendered asset has no base pass.
    #[error("missing base asset for '{0}'")]
    MissingBaseAsset(String),

    /// No single-digit version index is left for the given date.
    #[error("version index exhausted for date {0}")]
    VersionExhausted(String),

    /// The panorama tool exited unsuccessfully or could not be spawned.
    #[error("panorama build failed: {0}")]
    PanoramaBuildFailed(String),

    /// Invalid user-provided or configuration data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors when serializing or deserializing documents or configuration.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BoardError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn editor_unavailable(msg: impl Into<String>) -> Self {
        Self::EditorUnavailable(msg.into())
    }

    pub fn editor_action(msg: impl Into<String>) -> Self {
        Self::EditorActionFailed(msg.into())
    }

    pub fn artifact_exists(path: impl Into<PathBuf>) -> Self {
        Self::ArtifactExists(path.into())
    }

    pub fn destination_not_empty(path: impl Into<PathBuf>) -> Self {
        Self::DestinationNotEmpty(path.into())
    }

    pub fn missing_base(key: impl Into<String>) -> Self {
        Self::MissingBaseAsset(key.into())
    }

    pub fn panorama(msg: impl Into<String>) -> Self {
        Self::PanoramaBuildFailed(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Editor failures stop a whole batch instead of skipping one artifact.
    pub fn halts_batch(&self) -> bool {
        matches!(
            self,
            Self::EditorUnavailable(_) | Self::EditorActionFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(BoardError::not_found("x").to_string().contains("not found:"));
        assert!(
            BoardError::editor_unavailable("x")
                .to_string()
                .contains("editor unavailable:")
        );
        assert!(
            BoardError::editor_action("x")
                .to_string()
                .contains("editor action failed:")
        );
        assert!(
            BoardError::artifact_exists("a/b.board")
                .to_string()
                .contains("artifact already exists: 'a/b.board'")
        );
        assert!(
            BoardError::destination_not_empty("tour/panos")
                .to_string()
                .contains("destination not empty:")
        );
        assert!(
            BoardError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            BoardError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
    }

    #[test]
    fn only_editor_errors_halt_a_batch() {
        assert!(BoardError::editor_unavailable("x").halts_batch());
        assert!(BoardError::editor_action("x").halts_batch());
        assert!(!BoardError::artifact_exists("x").halts_batch());
        assert!(!BoardError::missing_base("door").halts_batch());
        assert!(!BoardError::not_found("x").halts_batch());
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = BoardError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
