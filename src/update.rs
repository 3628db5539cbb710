use std::path::Path;

use crate::{
    classify::{RenderedAsset, Role},
    editor::{
        DocId, DocumentEditor, EditorSession, ExportOptions, close_quietly, into_action_error,
        into_unavailable_error,
    },
    foundation::{config::Config, error::BoardResult},
    layout,
};

/// Rebinds the layers of one role-group of an existing artifact to newer renders.
pub struct CompositeUpdater<'a> {
    editor: &'a dyn DocumentEditor,
    export: ExportOptions,
}

impl<'a> CompositeUpdater<'a> {
    pub fn new(editor: &'a dyn DocumentEditor, cfg: &Config) -> Self {
        Self {
            editor,
            export: cfg.preview.into(),
        }
    }

    /// Returns `Ok(false)` when the artifact has no group called `group`; nothing is saved
    /// in that case. Layers whose role is absent from `asset` keep their current source.
    #[tracing::instrument(skip_all, fields(artifact = %artifact.display(), group = %group))]
    pub fn update_composite(
        &self,
        artifact: &Path,
        asset: &RenderedAsset,
        group: &str,
    ) -> BoardResult<bool> {
        let mut session = self.editor.acquire().map_err(into_unavailable_error)?;
        let doc = session
            .open_document(artifact)
            .map_err(into_unavailable_error)?;

        match self.rebind(session.as_mut(), doc, artifact, asset, group) {
            Ok(updated) => {
                session.close(doc).map_err(into_action_error)?;
                if updated {
                    tracing::info!("updated composite");
                }
                Ok(updated)
            }
            Err(e) => {
                close_quietly(session.as_mut(), doc);
                tracing::error!(error = %e, "composite update failed");
                Err(into_action_error(e))
            }
        }
    }

    fn rebind(
        &self,
        session: &mut dyn EditorSession,
        doc: DocId,
        artifact: &Path,
        asset: &RenderedAsset,
        group: &str,
    ) -> BoardResult<bool> {
        let Some(target) = session.groups(doc)?.into_iter().find(|g| g.name == group) else {
            tracing::info!(group, "artifact has no such role-group, skipping");
            return Ok(false);
        };

        for layer in session.layers(doc, target.id)? {
            match Role::from_layer_name(&layer.name).and_then(|role| asset.get(role)) {
                Some(source) => {
                    session.bind_image(doc, layer.id, source)?;
                    tracing::debug!(
                        layer = %layer.name,
                        source = %source.display(),
                        "rebound layer"
                    );
                }
                None => {
                    tracing::debug!(
                        layer = %layer.name,
                        "no matching render, keeping layer content"
                    );
                }
            }
        }

        session.save(doc)?;

        let composites_dir = artifact.parent().unwrap_or_else(|| Path::new("."));
        let key = artifact
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        session.export_flattened(
            doc,
            &layout::preview_path_for(composites_dir, &key),
            &self.export,
        )?;
        Ok(true)
    }
}
