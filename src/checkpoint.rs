// src/checkpoint.rs
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint io error: {0}")]
    Io(#[from] io::Error),

    #[error("checkpoint file {path} does not hold a day number: {content:?}")]
    Malformed { path: PathBuf, content: String },
}

/// File holding the next day to process
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Next day to process; day 0 when no checkpoint exists yet.
    pub fn load(&self) -> Result<u64, CheckpointError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        content.trim().parse().map_err(|_| CheckpointError::Malformed {
            path: self.path.clone(),
            content,
        })
    }

    /// Overwrite with `next_day`, via a sibling temp file + rename.
    ///
    /// The temp file is synced before the rename, so the checkpoint on disk
    /// is always either the old day or the new one.
    pub fn save(&self, next_day: u64) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(next_day.to_string().as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
