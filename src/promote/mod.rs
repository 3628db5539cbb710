//! Promotion of flattened previews into a subject's panorama tour on the shared store.
//!
//! The remote swap is best-effort: a failure between backing up and copying can leave a
//! subject with only `panos_backup`. There is no automatic rollback.

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    foundation::{
        config::{Config, Subject},
        error::{BoardError, BoardResult},
    },
    layout::{self, Layout},
    scan,
};

pub mod panorama;

pub use panorama::{KrpanoTool, PanoramaTool};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromotionState {
    Collecting,
    Staging,
    Building,
    BackingUp,
    Copying,
    Confirming,
    Done,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromotionFlow {
    /// First promotion: the whole generated tour goes into `<subject>/tour/`.
    Create,
    /// Replace `<subject>/tour/panos/`, keeping the previous set as `panos_backup/`.
    Update,
}

/// Decision source for deleting the backup after a successful update.
pub trait Confirm {
    fn confirm(&mut self, question: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm(&mut self, question: &str) -> bool {
        self(question)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromotionReport {
    pub subject: Subject,
    pub images: usize,
    pub destination: PathBuf,
    pub combined: PathBuf,
    /// Backup that still exists after the run.
    pub backup_kept: Option<PathBuf>,
}

pub struct PromotionWorkflow<'a> {
    cfg: &'a Config,
    tool: &'a dyn PanoramaTool,
    state: PromotionState,
    failed_at: Option<PromotionState>,
}

impl<'a> PromotionWorkflow<'a> {
    pub fn new(cfg: &'a Config, tool: &'a dyn PanoramaTool) -> Self {
        Self {
            cfg,
            tool,
            state: PromotionState::Collecting,
            failed_at: None,
        }
    }

    pub fn state(&self) -> PromotionState {
        self.state
    }

    /// State the last run was in when it failed.
    pub fn failed_at(&self) -> Option<PromotionState> {
        self.failed_at
    }

    #[tracing::instrument(skip(self, subject, confirm), fields(subject = %subject))]
    pub fn run(
        &mut self,
        subject: &Subject,
        flow: PromotionFlow,
        confirm: &mut dyn Confirm,
    ) -> BoardResult<PromotionReport> {
        self.state = PromotionState::Collecting;
        self.failed_at = None;
        match self.run_states(subject, flow, confirm) {
            Ok(report) => {
                self.enter(PromotionState::Done);
                Ok(report)
            }
            Err(e) => {
                tracing::error!(error = %e, state = ?self.state, "promotion failed");
                self.failed_at = Some(self.state);
                self.state = PromotionState::Failed;
                Err(e)
            }
        }
    }

    fn enter(&mut self, state: PromotionState) {
        tracing::debug!(from = ?self.state, to = ?state, "promotion state");
        self.state = state;
    }

    fn run_states(
        &mut self,
        subject: &Subject,
        flow: PromotionFlow,
        confirm: &mut dyn Confirm,
    ) -> BoardResult<PromotionReport> {
        let layout = Layout::new(self.cfg);

        let images = collect_previews(&layout.preview_dir(subject))?;
        tracing::info!(count = images.len(), "collected flattened previews");

        self.enter(PromotionState::Staging);
        // Removed on drop, whichever way this function returns.
        let staging = tempfile::Builder::new()
            .prefix("tourboard-")
            .tempdir()
            .context("create staging directory")?;
        let staged = stage(&images, staging.path())?;

        self.enter(PromotionState::Building);
        let tour = self.tool.build(staging.path(), &staged)?;
        let panos = tour.join(layout::PANOS_DIR);
        if !panos.is_dir() {
            return Err(BoardError::panorama(format!(
                "generated tour has no '{}' directory",
                layout::PANOS_DIR
            )));
        }

        let mut backup = None;
        if flow == PromotionFlow::Update {
            self.enter(PromotionState::BackingUp);
            backup = backup_dir(&layout.panos_dir(subject))?;
        }

        self.enter(PromotionState::Copying);
        let (source, destination) = match flow {
            PromotionFlow::Create => (tour.as_path(), layout.tour_dir(subject)),
            PromotionFlow::Update => (panos.as_path(), layout.panos_dir(subject)),
        };
        copy_into_empty(source, &destination)?;
        tracing::info!(dest = %destination.display(), "promoted tour");

        let combined = layout.combined_panos_dir(subject);
        replace_dir_contents(&panos, &combined)?;
        tracing::info!(dest = %combined.display(), "refreshed combined tour");

        let mut backup_kept = None;
        if let Some(backup) = backup {
            self.enter(PromotionState::Confirming);
            let question = format!("Delete backup '{}'?", backup.display());
            if confirm.confirm(&question) {
                std::fs::remove_dir_all(&backup)
                    .with_context(|| format!("remove backup '{}'", backup.display()))?;
                tracing::info!(backup = %backup.display(), "deleted backup");
            } else {
                tracing::info!(backup = %backup.display(), "keeping backup");
                backup_kept = Some(backup);
            }
        }

        Ok(PromotionReport {
            subject: subject.clone(),
            images: images.len(),
            destination,
            combined,
            backup_kept,
        })
    }
}

/// Flattened previews (`*.jpg`) in `preview_dir`.
pub fn collect_previews(preview_dir: &Path) -> BoardResult<Vec<PathBuf>> {
    let images: Vec<PathBuf> = scan::list_files(preview_dir)?
        .into_iter()
        .filter(|p| {
            p.extension()
                .is_some_and(|e| e.eq_ignore_ascii_case(layout::PREVIEW_EXTENSION))
        })
        .collect();
    if images.is_empty() {
        return Err(BoardError::not_found(format!(
            "no flattened previews in '{}'",
            preview_dir.display()
        )));
    }
    Ok(images)
}

fn stage(images: &[PathBuf], staging: &Path) -> BoardResult<Vec<PathBuf>> {
    let mut staged = Vec::with_capacity(images.len());
    for img in images {
        let to = staging.join(scan::file_name_of(img));
        std::fs::copy(img, &to)
            .with_context(|| format!("stage '{}'", img.display()))?;
        staged.push(to);
    }
    Ok(staged)
}

/// True if `dir` is missing or has no entries at all (hidden ones included).
pub fn is_empty_dir(dir: &Path) -> BoardResult<bool> {
    if !dir.exists() {
        return Ok(true);
    }
    let mut rd = std::fs::read_dir(dir).with_context(|| format!("read dir '{}'", dir.display()))?;
    Ok(rd.next().is_none())
}

/// Move `dir` to its `_backup` sibling, replacing any earlier backup, and recreate `dir`
/// empty. Returns the backup path if `dir` existed.
pub fn backup_dir(dir: &Path) -> BoardResult<Option<PathBuf>> {
    if !dir.is_dir() {
        std::fs::create_dir_all(dir).with_context(|| format!("create '{}'", dir.display()))?;
        return Ok(None);
    }

    let backup = layout::backup_dir_for(dir);
    if backup.exists() {
        tracing::info!(backup = %backup.display(), "removing previous backup");
        std::fs::remove_dir_all(&backup)
            .with_context(|| format!("remove old backup '{}'", backup.display()))?;
    }
    std::fs::rename(dir, &backup).with_context(|| {
        format!(
            "rename '{}' to '{}'",
            dir.display(),
            backup.display()
        )
    })?;
    std::fs::create_dir_all(dir).with_context(|| format!("recreate '{}'", dir.display()))?;
    tracing::info!(backup = %backup.display(), "backed up current panoramas");
    Ok(Some(backup))
}

/// Copy the contents of `src` into `dst`, which must be empty (or missing).
///
/// Fails with [`BoardError::DestinationNotEmpty`] leaving `dst` untouched.
pub fn copy_into_empty(src: &Path, dst: &Path) -> BoardResult<()> {
    if !is_empty_dir(dst)? {
        return Err(BoardError::destination_not_empty(dst));
    }
    std::fs::create_dir_all(dst).with_context(|| format!("create '{}'", dst.display()))?;
    copy_dir_all(src, dst)
}

/// Purge `dst` if it has content, then copy `src` into it.
pub fn replace_dir_contents(src: &Path, dst: &Path) -> BoardResult<()> {
    if !is_empty_dir(dst)? {
        tracing::debug!(dir = %dst.display(), "purging");
        std::fs::remove_dir_all(dst).with_context(|| format!("purge '{}'", dst.display()))?;
    }
    std::fs::create_dir_all(dst).with_context(|| format!("create '{}'", dst.display()))?;
    copy_dir_all(src, dst)
}

fn copy_dir_all(src: &Path, dst: &Path) -> BoardResult<()> {
    let rd = std::fs::read_dir(src).with_context(|| format!("read dir '{}'", src.display()))?;
    for entry in rd {
        let entry = entry.with_context(|| format!("read entry in '{}'", src.display()))?;
        let ty = entry.file_type().context("read file type")?;
        let to = dst.join(entry.file_name());
        if ty.is_dir() {
            std::fs::create_dir_all(&to).with_context(|| format!("create '{}'", to.display()))?;
            copy_dir_all(&entry.path(), &to)?;
        } else {
            std::fs::copy(entry.path(), &to)
                .with_context(|| format!("copy to '{}'", to.display()))?;
        }
    }
    Ok(())
}
