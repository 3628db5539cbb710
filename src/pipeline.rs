//! Per-subject batch operations driven by the CLI.
//!
//! Creation and update loops stop at the first editor failure. Existing artifacts and assets
//! without a base pass are skipped.

use std::path::{Path, PathBuf};

use crate::{
    classify::{self, AssetMap, BatchSummary},
    composite::{BACKGROUND_GROUP, CONTENT_GROUP, CompositeBuilder},
    editor::{DocumentEditor, ExportOptions, close_quietly, into_action_error, into_unavailable_error},
    foundation::{
        config::{Config, Subject},
        error::{BoardError, BoardResult},
    },
    layout::{self, Layout},
    promote::{Confirm, PanoramaTool, PromotionFlow, PromotionReport, PromotionWorkflow},
    scan,
    update::CompositeUpdater,
    version,
};

/// Result of one creation/update loop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub processed: Vec<PathBuf>,
    pub skipped: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InfoReport {
    pub latest: Option<BatchSummary>,
    pub composites: Vec<PathBuf>,
}

/// Assets of the subject's latest render batch; a missing batch yields an empty map.
pub fn latest_assets(cfg: &Config, subject: &Subject) -> BoardResult<AssetMap> {
    let renderings = Layout::new(cfg).renderings_dir(subject);
    let latest = match version::latest_entry(&renderings) {
        Ok(dir) => dir,
        Err(BoardError::NotFound(msg)) => {
            tracing::warn!(%subject, "no render batch: {msg}");
            return Ok(AssetMap::new());
        }
        Err(e) => return Err(e),
    };
    tracing::info!(%subject, batch = %latest.display(), "using latest render batch");
    match classify::classify(&latest) {
        Ok(assets) => Ok(assets),
        Err(BoardError::NotFound(msg)) => {
            tracing::warn!(%subject, "render batch vanished: {msg}");
            Ok(AssetMap::new())
        }
        Err(e) => Err(e),
    }
}

/// Existing composite artifacts of a subject, sorted by name.
pub fn list_composites(cfg: &Config, subject: &Subject) -> BoardResult<Vec<PathBuf>> {
    let dir = Layout::new(cfg).composites_dir(subject);
    let files = match scan::list_files(&dir) {
        Ok(files) => files,
        Err(BoardError::NotFound(_)) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    Ok(files
        .into_iter()
        .filter(|p| {
            p.extension()
                .is_some_and(|e| e == cfg.artifact_extension.as_str())
        })
        .inspect(|p| tracing::debug!(file = %p.display(), "found composite"))
        .collect())
}

#[tracing::instrument(skip(cfg))]
pub fn info(cfg: &Config, subject: &Subject) -> BoardResult<InfoReport> {
    let renderings = Layout::new(cfg).renderings_dir(subject);
    let latest = match version::latest_entry(&renderings) {
        Ok(dir) => Some(classify::summarize(&dir)?),
        Err(BoardError::NotFound(msg)) => {
            tracing::warn!("no render batch: {msg}");
            None
        }
        Err(e) => return Err(e),
    };
    if let Some(s) = &latest {
        tracing::info!(
            batch = %s.batch.display(),
            "{} files: {:?}; extra passes: {:?}",
            s.base_count,
            s.keys,
            s.extra_passes
        );
    }
    let composites = list_composites(cfg, subject)?;
    tracing::info!(count = composites.len(), "existing composites");
    Ok(InfoReport { latest, composites })
}

/// Allocate and create the next render batch directory for `today` (`YYMMDD`).
pub fn allocate_batch(cfg: &Config, subject: &Subject, today: &str) -> BoardResult<PathBuf> {
    let renderings = Layout::new(cfg).renderings_dir(subject);
    let dir = version::allocate_batch_dir(&renderings, today)?;
    version::create_batch_dir(&dir)?;
    tracing::info!(dir = %dir.display(), "created render batch directory");
    Ok(dir)
}

/// Build composites for every asset of the latest batch, pairing each with the background
/// pool asset of the same key if there is one.
#[tracing::instrument(skip(cfg, editor))]
pub fn create_images(
    cfg: &Config,
    editor: &dyn DocumentEditor,
    subject: &Subject,
) -> BoardResult<BatchOutcome> {
    let assets = latest_assets(cfg, subject)?;
    let backgrounds = if cfg.is_reserved(subject.as_str()) {
        AssetMap::new()
    } else {
        latest_assets(cfg, &cfg.backgrounds())?
    };

    let out_dir = Layout::new(cfg).composites_dir(subject);
    let builder = CompositeBuilder::new(editor, cfg);
    let mut outcome = BatchOutcome::default();

    for (key, asset) in &assets {
        match builder.create_composite(asset, &out_dir, backgrounds.get(key)) {
            Ok(artifact) => outcome.processed.push(artifact),
            Err(BoardError::ArtifactExists(path)) => {
                tracing::info!(artifact = %path.display(), "composite exists, skipping");
                outcome.skipped.push(key.clone());
            }
            Err(BoardError::MissingBaseAsset(key)) => {
                tracing::warn!(%key, "render has overlays but no base pass, skipping");
                outcome.skipped.push(key);
            }
            Err(e) => {
                tracing::error!(%key, error = %e, "halting composite creation");
                return Err(e);
            }
        }
    }
    Ok(outcome)
}

/// Rebind the "content" group of every composite to the subject's latest renders.
pub fn update_images(
    cfg: &Config,
    editor: &dyn DocumentEditor,
    subject: &Subject,
) -> BoardResult<BatchOutcome> {
    update_group(cfg, editor, subject, subject, CONTENT_GROUP)
}

/// Rebind the "background" group of every composite to the background pool's latest renders.
pub fn update_backgrounds(
    cfg: &Config,
    editor: &dyn DocumentEditor,
    subject: &Subject,
) -> BoardResult<BatchOutcome> {
    update_group(cfg, editor, subject, &cfg.backgrounds(), BACKGROUND_GROUP)
}

#[tracing::instrument(skip(cfg, editor, source))]
fn update_group(
    cfg: &Config,
    editor: &dyn DocumentEditor,
    subject: &Subject,
    source: &Subject,
    group: &str,
) -> BoardResult<BatchOutcome> {
    let assets = latest_assets(cfg, source)?;
    let updater = CompositeUpdater::new(editor, cfg);
    let mut outcome = BatchOutcome::default();

    for artifact in list_composites(cfg, subject)? {
        let key = artifact_stem(&artifact);
        let Some(asset) = assets.get(&key) else {
            tracing::debug!(%key, "no render for composite, skipping");
            outcome.skipped.push(key);
            continue;
        };
        match updater.update_composite(&artifact, asset, group) {
            Ok(true) => outcome.processed.push(artifact),
            Ok(false) => outcome.skipped.push(key),
            Err(e) => {
                tracing::error!(%key, error = %e, "halting composite update");
                return Err(e);
            }
        }
    }
    Ok(outcome)
}

/// Re-export the flattened preview of every composite.
#[tracing::instrument(skip(cfg, editor))]
pub fn save_as_preview(
    cfg: &Config,
    editor: &dyn DocumentEditor,
    subject: &Subject,
) -> BoardResult<Vec<PathBuf>> {
    let composites_dir = Layout::new(cfg).composites_dir(subject);
    let opts = ExportOptions::from(cfg.preview);
    let mut written = Vec::new();
    for artifact in list_composites(cfg, subject)? {
        let preview = layout::preview_path_for(&composites_dir, &artifact_stem(&artifact));
        export_preview(editor, &artifact, &preview, &opts)?;
        tracing::info!(preview = %preview.display(), "exported preview");
        written.push(preview);
    }
    Ok(written)
}

fn export_preview(
    editor: &dyn DocumentEditor,
    artifact: &Path,
    preview: &Path,
    opts: &ExportOptions,
) -> BoardResult<()> {
    let mut session = editor.acquire().map_err(into_unavailable_error)?;
    let doc = session
        .open_document(artifact)
        .map_err(into_unavailable_error)?;
    match session.export_flattened(doc, preview, opts) {
        Ok(()) => session.close(doc).map_err(into_action_error),
        Err(e) => {
            close_quietly(session.as_mut(), doc);
            Err(into_action_error(e))
        }
    }
}

/// Promote a subject's previews into its tour (see [`PromotionWorkflow`]).
pub fn promote(
    cfg: &Config,
    tool: &dyn PanoramaTool,
    subject: &Subject,
    flow: PromotionFlow,
    confirm: &mut dyn Confirm,
) -> BoardResult<PromotionReport> {
    PromotionWorkflow::new(cfg, tool).run(subject, flow, confirm)
}

fn artifact_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
