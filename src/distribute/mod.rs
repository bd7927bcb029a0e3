//! Copying assigned sheets into per-person folders.
//!
//! [`plan`] compares the tree the current people, playlists and assignments
//! call for with what is on disk; [`execute`] applies the difference.

pub mod execute;
pub mod plan;

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use execute::{
    DistributionReporter, DistributionState, DistributionStatus, DistributionSummary, LogLevel,
    distribute, progress_percent,
};
pub use plan::{DistributionInput, DistributionPlan, MissingAssignment, PlannedCopy};

#[derive(Error, Debug)]
pub enum DistributeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Cannot create distribution folder {path}: {source}")]
    Setup { path: String, source: io::Error },
    #[error("Distribution cancelled")]
    Cancelled,
}

/// How often a copy or delete is attempted before it counts as failed.
/// Synced folders and open PDF viewers hold short-lived locks.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 20,
            delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds or attempts are used up; returns the last error.
    pub fn run<T>(&self, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    log::debug!("Attempt {}/{} failed: {}", attempt, attempts, e);
                    std::thread::sleep(Duration::from_millis(self.delay_ms));
                    attempt += 1;
                }
            }
        }
    }
}

/// Shared flag for stopping a run between steps.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lowercase hex SHA-256 of a file, read in chunks.
pub fn sha256_hex(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Whether `destination` already holds the same bytes as `source`.
/// Sizes are compared before anything is hashed.
pub fn same_content(source: &Path, destination: &Path) -> io::Result<bool> {
    let destination_meta = match std::fs::metadata(destination) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if std::fs::metadata(source)?.len() != destination_meta.len() {
        return Ok(false);
    }
    Ok(sha256_hex(source)? == sha256_hex(destination)?)
}
