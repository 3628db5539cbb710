//! Capability contract of the document editor that assembles composite artifacts.
//!
//! Builders and updaters only talk to [`EditorSession`]. A session is acquired per operation
//! and released when dropped.

use std::path::Path;

use crate::{
    foundation::{
        config::PreviewConfig,
        error::{BoardError, BoardResult},
    },
    model::{BlendMode, GroupRef, LayerRef, Unit},
};

pub mod blend;
pub mod local;

/// Handle of a document opened or created within one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocId(pub u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupInfo {
    pub id: GroupRef,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerInfo {
    pub id: LayerRef,
    pub name: String,
}

/// Options for [`EditorSession::export_flattened`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportOptions {
    pub quality: u8,
    pub matte: [u8; 3],
}

impl From<PreviewConfig> for ExportOptions {
    fn from(p: PreviewConfig) -> Self {
        Self {
            quality: p.quality,
            matte: p.matte,
        }
    }
}

pub trait DocumentEditor {
    /// Attach to the editor; fails with [`crate::BoardError::EditorUnavailable`].
    fn acquire(&self) -> BoardResult<Box<dyn EditorSession + '_>>;
}

pub trait EditorSession {
    /// Switch the measurement unit and return the previous one.
    fn set_unit(&mut self, unit: Unit) -> BoardResult<Unit>;

    fn create_document(&mut self, width: u32, height: u32, name: &str) -> BoardResult<DocId>;

    fn open_document(&mut self, path: &Path) -> BoardResult<DocId>;

    fn document_size(&self, doc: DocId) -> BoardResult<(u32, u32)>;

    fn add_group(&mut self, doc: DocId, name: &str) -> BoardResult<GroupRef>;

    fn add_layer(&mut self, doc: DocId, group: GroupRef, name: &str) -> BoardResult<LayerRef>;

    /// Link the layer's content to an external image.
    fn bind_image(&mut self, doc: DocId, layer: LayerRef, image: &Path) -> BoardResult<()>;

    fn set_blend(
        &mut self,
        doc: DocId,
        layer: LayerRef,
        mode: BlendMode,
        opacity: f32,
    ) -> BoardResult<()>;

    fn set_active_layer(&mut self, doc: DocId, layer: LayerRef) -> BoardResult<()>;

    fn groups(&self, doc: DocId) -> BoardResult<Vec<GroupInfo>>;

    fn layers(&self, doc: DocId, group: GroupRef) -> BoardResult<Vec<LayerInfo>>;

    /// Persist to the path the document was opened from or last saved to.
    fn save(&mut self, doc: DocId) -> BoardResult<()>;

    fn save_as(&mut self, doc: DocId, path: &Path) -> BoardResult<()>;

    fn export_flattened(&mut self, doc: DocId, path: &Path, opts: &ExportOptions)
    -> BoardResult<()>;

    /// Close without saving.
    fn close(&mut self, doc: DocId) -> BoardResult<()>;
}

/// Close `doc`, logging instead of failing. Used on error paths.
pub fn close_quietly<'s>(session: &mut (dyn EditorSession + 's), doc: DocId) {
    if let Err(e) = session.close(doc) {
        tracing::warn!(error = %e, ?doc, "failed to close document");
    }
}

/// Normalize an error raised after a session was acquired.
pub(crate) fn into_action_error(e: BoardError) -> BoardError {
    match e {
        BoardError::EditorActionFailed(_) | BoardError::EditorUnavailable(_) => e,
        other => BoardError::editor_action(other.to_string()),
    }
}

/// Normalize an error raised while acquiring a session or opening its first document.
pub(crate) fn into_unavailable_error(e: BoardError) -> BoardError {
    match e {
        BoardError::EditorUnavailable(_) => e,
        other => BoardError::editor_unavailable(other.to_string()),
    }
}
