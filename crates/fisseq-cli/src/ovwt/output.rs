//! All-or-nothing output writing.
//!
//! Files are written into a hidden staging directory inside the output
//! directory and only moved into place once every one of them was written.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const METRICS_FILE: &str = "train_results.csv";
pub const MODELS_FILE: &str = "models.json";
pub const SELECTED_FEATURES_FILE: &str = "selected_features.csv";
pub const REPORT_FILE: &str = "ovwt_report.html";

/// `{dataset}_attributions.csv`
pub fn attributions_file(dataset: &str) -> String {
    format!("{}_attributions.csv", dataset)
}

#[derive(Debug)]
pub struct OutputStage {
    output_dir: PathBuf,
    staging_dir: PathBuf,
    staged: Vec<String>,
    committed: bool,
}

impl OutputStage {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        let staging_dir = output_dir.join(format!(".fisseq-staging-{}", std::process::id()));
        fs::create_dir_all(&staging_dir)
            .with_context(|| format!("Failed to create output directory: {}", staging_dir.display()))?;
        Ok(Self {
            output_dir,
            staging_dir,
            staged: Vec::new(),
            committed: false,
        })
    }

    /// Staging path of `name`; the file is moved to `output_dir/name` on commit.
    pub fn path(&mut self, name: &str) -> PathBuf {
        if !self.staged.iter().any(|n| n == name) {
            self.staged.push(name.to_string());
        }
        self.staging_dir.join(name)
    }

    /// Move every staged file into the output directory.
    ///
    /// When a move fails the files already moved are returned to the staging
    /// directory, which is then removed. A file that replaced an existing
    /// output of the same name cannot restore the old content.
    pub fn commit(mut self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.staged.len());
        for name in &self.staged {
            let from = self.staging_dir.join(name);
            let to = self.output_dir.join(name);
            if let Err(e) = fs::rename(&from, &to) {
                self.roll_back(&written);
                return Err(e)
                    .with_context(|| format!("Failed to move {} to {}", from.display(), to.display()));
            }
            written.push(to);
        }
        self.committed = true;
        fs::remove_dir_all(&self.staging_dir).with_context(|| {
            format!("Failed to remove staging directory: {}", self.staging_dir.display())
        })?;
        Ok(written)
    }

    fn roll_back(&self, moved: &[PathBuf]) {
        for to in moved {
            let Some(name) = to.file_name() else {
                continue;
            };
            if fs::rename(to, self.staging_dir.join(name)).is_err() {
                if let Err(e) = fs::remove_file(to) {
                    log::warn!("Could not roll back {}: {}", to.display(), e);
                }
            }
        }
    }
}

impl Drop for OutputStage {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = fs::remove_dir_all(&self.staging_dir) {
                log::warn!(
                    "Could not remove staging directory {}: {}",
                    self.staging_dir.display(),
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_moves_files_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run");
        let mut stage = OutputStage::new(&out).unwrap();
        fs::write(stage.path(METRICS_FILE), "a,b\n").unwrap();
        fs::write(stage.path(MODELS_FILE), "{}").unwrap();

        let written = stage.commit().unwrap();
        assert_eq!(written, vec![out.join(METRICS_FILE), out.join(MODELS_FILE)]);
        assert_eq!(fs::read_to_string(out.join(METRICS_FILE)).unwrap(), "a,b\n");
        assert_eq!(fs::read_dir(&out).unwrap().count(), 2);
    }

    #[test]
    fn dropped_stage_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run");
        {
            let mut stage = OutputStage::new(&out).unwrap();
            fs::write(stage.path(METRICS_FILE), "a,b\n").unwrap();
        }
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn failed_commit_rolls_back_moved_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run");
        // a directory in the way of the second file makes its move fail
        fs::create_dir_all(out.join(MODELS_FILE).join("blocker")).unwrap();

        let mut stage = OutputStage::new(&out).unwrap();
        fs::write(stage.path(METRICS_FILE), "a,b\n").unwrap();
        fs::write(stage.path(MODELS_FILE), "{}").unwrap();
        assert!(stage.commit().is_err());

        assert!(!out.join(METRICS_FILE).exists());
        let names: Vec<_> = fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(MODELS_FILE)]);
    }

    #[test]
    fn attribution_file_names() {
        assert_eq!(attributions_file("eval"), "eval_attributions.csv");
    }
}
