use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use crate::foundation::{
    config::Config,
    error::{BoardError, BoardResult},
};

/// Directory the tool writes the generated tour into, relative to the work directory.
pub const TOUR_OUTPUT_DIR: &str = "vtour";

pub trait PanoramaTool {
    /// Build a tour from `images` (all located in `work_dir`), blocking until done.
    ///
    /// Returns the generated tour directory.
    fn build(&self, work_dir: &Path, images: &[PathBuf]) -> BoardResult<PathBuf>;
}

/// External panorama tool driven through its `makepano` command.
#[derive(Clone, Debug)]
pub struct KrpanoTool {
    pub program: PathBuf,
    pub config_template: PathBuf,
}

impl KrpanoTool {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            program: cfg.panorama_tool.clone(),
            config_template: cfg.panorama_config.clone(),
        }
    }

    pub fn validate(&self) -> BoardResult<()> {
        if self.program.as_os_str().is_empty() {
            return Err(BoardError::validation("panorama tool path must be set"));
        }
        if !self.config_template.is_file() {
            return Err(BoardError::validation(format!(
                "panorama config template '{}' does not exist",
                self.config_template.display()
            )));
        }
        Ok(())
    }

    fn command(&self, work_dir: &Path, images: &[PathBuf]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .arg("makepano")
            .arg(format!("-config={}", self.config_template.display()))
            .args(images);
        cmd
    }
}

impl PanoramaTool for KrpanoTool {
    fn build(&self, work_dir: &Path, images: &[PathBuf]) -> BoardResult<PathBuf> {
        self.validate()?;
        if images.is_empty() {
            return Err(BoardError::panorama("no input images"));
        }

        tracing::info!(
            program = %self.program.display(),
            count = images.len(),
            "running panorama tool"
        );
        let output = self.command(work_dir, images).output().map_err(|e| {
            BoardError::panorama(format!(
                "failed to spawn '{}' (is it installed?): {e}",
                self.program.display()
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BoardError::panorama(format!(
                "'{}' exited with status {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        let tour = work_dir.join(TOUR_OUTPUT_DIR);
        if !tour.is_dir() {
            return Err(BoardError::panorama(format!(
                "tool succeeded but produced no '{}' directory",
                TOUR_OUTPUT_DIR
            )));
        }
        Ok(tour)
    }
}
