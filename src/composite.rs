use std::path::{Path, PathBuf};

use crate::{
    classify::{RenderedAsset, Role},
    editor::{
        DocId, DocumentEditor, EditorSession, ExportOptions, close_quietly, into_action_error,
        into_unavailable_error,
    },
    foundation::{
        config::Config,
        error::{BoardError, BoardResult},
    },
    layout,
    model::{BlendMode, LayerRef, Unit},
    scan,
};

/// Role-group holding the subject's own renders.
pub const CONTENT_GROUP: &str = "content";
/// Role-group holding renders from the shared background pool.
pub const BACKGROUND_GROUP: &str = "background";

/// Fixed blend settings for overlay passes. The base pass keeps normal blending at full
/// opacity.
pub fn blend_policy(role: Role) -> Option<(BlendMode, f32)> {
    match role {
        Role::Base => None,
        Role::Ambient => Some((BlendMode::Multiply, 0.7)),
        Role::Glare => Some((BlendMode::Screen, 0.4)),
    }
}

/// Artifact identity derived from a base pass file name (`door.png` -> `door`).
pub fn artifact_key(base: &Path) -> String {
    let name = scan::file_name_of(base);
    name.split('.').next().unwrap_or_default().to_string()
}

/// Creates new composite artifacts; never overwrites an existing one.
pub struct CompositeBuilder<'a> {
    editor: &'a dyn DocumentEditor,
    artifact_extension: String,
    export: ExportOptions,
}

impl<'a> CompositeBuilder<'a> {
    pub fn new(editor: &'a dyn DocumentEditor, cfg: &Config) -> Self {
        Self {
            editor,
            artifact_extension: cfg.artifact_extension.clone(),
            export: cfg.preview.into(),
        }
    }

    pub fn artifact_path(&self, output_dir: &Path, key: &str) -> PathBuf {
        layout::artifact_path_in(output_dir, key, &self.artifact_extension)
    }

    /// Build `<output_dir>/<key>.<ext>` from `asset` and export its preview to
    /// `<output_dir>/JPEG/<key>.jpg`.
    ///
    /// Fails with [`BoardError::ArtifactExists`] or [`BoardError::EditorUnavailable`] without
    /// touching the filesystem. The artifact is saved before the preview is exported, so a
    /// failed export leaves the artifact in place without its preview; later creation runs
    /// skip it and only [`crate::pipeline::save_as_preview`] writes the preview.
    #[tracing::instrument(skip_all, fields(key = %asset.key))]
    pub fn create_composite(
        &self,
        asset: &RenderedAsset,
        output_dir: &Path,
        background: Option<&RenderedAsset>,
    ) -> BoardResult<PathBuf> {
        let base = asset
            .base()
            .ok_or_else(|| BoardError::missing_base(&asset.key))?;
        let key = artifact_key(base);
        let artifact = self.artifact_path(output_dir, &key);
        if artifact.exists() {
            return Err(BoardError::artifact_exists(artifact));
        }

        let mut session = self.editor.acquire().map_err(into_unavailable_error)?;
        let previous_unit = session
            .set_unit(Unit::Pixels)
            .map_err(into_action_error)?;

        let result = self.build(
            session.as_mut(),
            base,
            &key,
            asset,
            background,
            &artifact,
            output_dir,
        );

        if let Err(e) = session.set_unit(previous_unit) {
            tracing::warn!(error = %e, "failed to restore editor unit");
        }

        match result {
            Ok(()) => {
                tracing::info!(artifact = %artifact.display(), "created composite");
                Ok(artifact)
            }
            Err(e) => {
                tracing::error!(error = %e, "composite creation failed");
                Err(into_action_error(e))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        &self,
        session: &mut dyn EditorSession,
        base: &Path,
        key: &str,
        asset: &RenderedAsset,
        background: Option<&RenderedAsset>,
        artifact: &Path,
        output_dir: &Path,
    ) -> BoardResult<()> {
        let probe = session.open_document(base)?;
        let size = session.document_size(probe);
        close_quietly(session, probe);
        let (width, height) = size?;

        let doc = session.create_document(width, height, key)?;
        match self.fill(session, doc, asset, background, artifact, output_dir, key) {
            Ok(()) => session.close(doc),
            Err(e) => {
                close_quietly(session, doc);
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fill(
        &self,
        session: &mut dyn EditorSession,
        doc: DocId,
        asset: &RenderedAsset,
        background: Option<&RenderedAsset>,
        artifact: &Path,
        output_dir: &Path,
        key: &str,
    ) -> BoardResult<()> {
        if let Some(bg) = background {
            add_role_group(session, doc, BACKGROUND_GROUP, bg)?;
        }
        if let Some(base_layer) = add_role_group(session, doc, CONTENT_GROUP, asset)? {
            session.set_active_layer(doc, base_layer)?;
        }

        session.save_as(doc, artifact)?;
        let preview = layout::preview_path_for(output_dir, key);
        session
            .export_flattened(doc, &preview, &self.export)
            .inspect_err(|_| {
                tracing::warn!(
                    artifact = %artifact.display(),
                    "artifact saved without preview; regenerate with --save-as-preview"
                );
            })
    }
}

/// Add `name` with one layer per present role; returns the base layer if there is one.
fn add_role_group(
    session: &mut dyn EditorSession,
    doc: DocId,
    name: &str,
    asset: &RenderedAsset,
) -> BoardResult<Option<LayerRef>> {
    let group = session.add_group(doc, name)?;
    let mut base_layer = None;
    for (role, path) in asset.roles() {
        let layer = session.add_layer(doc, group, role.layer_name())?;
        session.bind_image(doc, layer, path)?;
        match blend_policy(role) {
            Some((mode, opacity)) => session.set_blend(doc, layer, mode, opacity)?,
            None => base_layer = Some(layer),
        }
        tracing::debug!(group = name, %role, source = %path.display(), "added layer");
    }
    Ok(base_layer)
}
