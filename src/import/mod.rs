//! Turning scanned PDFs into library sheets.
//!
//! A multi-part PDF is split into one file per sheet, the first page of each
//! sheet is run through a [`TextRecognizer`], and the text is classified into
//! instrument, parts and clef. The staged result is reviewed by the caller and
//! then handed to [`import`], which copies it into the repository.

pub mod pdf;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

use crate::catalog::{Clef, Instrument, Part};
use crate::classify::{self, Detection};
use crate::sheet::{
    normalize_parts, DuplicatePolicy, FolderMetadata, ImportOutcome, IncomingSheet, SheetError,
    SheetRepository,
};

pub use pdf::{LopdfSplitter, SidecarRecognizer, TextLayerRecognizer};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF error for {path}: {message}")]
    Pdf { path: String, message: String },
    #[error("{path} has no pages")]
    NoPages { path: String },
    #[error(transparent)]
    Sheet(#[from] SheetError),
    #[error("Title must not be empty")]
    EmptyTitle,
    #[error("Composer must not be empty")]
    EmptyComposer,
    #[error("No sheets selected")]
    NothingSelected,
    #[error("No instrument set for {0}")]
    UnknownInstrument(String),
    #[error("Selected sheets share the same instrument, parts and clef: {0}")]
    Conflict(String),
    #[error("Invalid pages per sheet '{0}' (expected 1-4 or 'all')")]
    InvalidPagesPerSheet(String),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// How many scanned pages make up one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PagesPerSheet {
    One,
    #[default]
    Two,
    Three,
    Four,
    All,
}

impl PagesPerSheet {
    /// Pages per chunk for a document of `total` pages.
    pub fn chunk_size(self, total: usize) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
            Self::All => total.max(1),
        }
    }
}

impl FromStr for PagesPerSheet {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" => Ok(Self::One),
            "2" => Ok(Self::Two),
            "3" => Ok(Self::Three),
            "4" => Ok(Self::Four),
            "all" => Ok(Self::All),
            _ => Err(ImportError::InvalidPagesPerSheet(s.to_string())),
        }
    }
}

impl fmt::Display for PagesPerSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => write!(f, "1 page"),
            Self::Two => write!(f, "2 pages"),
            Self::Three => write!(f, "3 pages"),
            Self::Four => write!(f, "4 pages"),
            Self::All => write!(f, "All pages"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitOptions {
    pub pages_per_sheet: PagesPerSheet,
    /// Turn every page 90 degrees counter-clockwise (landscape scans).
    pub rotate: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            pages_per_sheet: PagesPerSheet::Two,
            rotate: true,
        }
    }
}

/// Splits a scanned PDF into one PDF per sheet.
pub trait PageSource {
    fn split(
        &self,
        input: &Path,
        options: &SplitOptions,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, ImportError>;
}

/// Produces the text of a sheet's first page (an OCR engine, or a text layer).
pub trait TextRecognizer: Sync {
    fn recognize(&self, sheet: &Path) -> Result<String, ImportError>;
}

/// A split or selected file with its detected (and possibly corrected) variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedSheet {
    pub path: PathBuf,
    pub detection: Detection,
    pub selected: bool,
}

impl StagedSheet {
    pub fn new(path: PathBuf, detection: Detection) -> Self {
        Self {
            path,
            detection,
            selected: true,
        }
    }

    pub fn set_variant(&mut self, instrument: Instrument, parts: Vec<Part>, clef: Clef) {
        self.detection = Detection {
            instrument,
            parts: normalize_parts(parts),
            clef,
        };
    }

    fn variant_key(&self) -> String {
        let mut keys: Vec<&str> = self.detection.parts.iter().map(|p| p.key()).collect();
        keys.sort_unstable();
        format!(
            "{}|{}|{}",
            self.detection.instrument.key(),
            keys.join(","),
            self.detection.clef.key()
        )
    }

    pub fn label(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!(
            "{}: {} {:?} {}",
            name,
            self.detection.instrument.display_name(),
            self.detection.parts.iter().map(|p| p.display_name()).collect::<Vec<_>>(),
            self.detection.clef.display_name()
        )
    }
}

/// Indices of selected sheets that share a variant with another selected sheet.
pub fn conflicting(staged: &[StagedSheet]) -> Vec<usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for sheet in staged.iter().filter(|s| s.selected) {
        *counts.entry(sheet.variant_key()).or_default() += 1;
    }
    staged
        .iter()
        .enumerate()
        .filter(|(_, s)| s.selected && counts.get(&s.variant_key()).copied().unwrap_or(0) > 1)
        .map(|(i, _)| i)
        .collect()
}

/// Split `input` into `staging_dir` and detect every sheet.
pub fn stage(
    input: &Path,
    options: &SplitOptions,
    splitter: &dyn PageSource,
    recognizer: &dyn TextRecognizer,
    staging_dir: &Path,
    workers: usize,
) -> Result<Vec<StagedSheet>, ImportError> {
    std::fs::create_dir_all(staging_dir)?;
    let sheets = splitter.split(input, options, staging_dir)?;
    log::info!("Split {} into {} sheets", input.display(), sheets.len());
    detect_all(sheets, recognizer, workers)
}

/// Detect single-sheet files as they are, without splitting.
pub fn stage_files(
    files: &[PathBuf],
    recognizer: &dyn TextRecognizer,
    workers: usize,
) -> Result<Vec<StagedSheet>, ImportError> {
    detect_all(files.to_vec(), recognizer, workers)
}

fn detect_all(
    sheets: Vec<PathBuf>,
    recognizer: &dyn TextRecognizer,
    workers: usize,
) -> Result<Vec<StagedSheet>, ImportError> {
    if sheets.is_empty() {
        return Ok(Vec::new());
    }

    let pb = ProgressBar::new(sheets.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap()
        .progress_chars("#>-"),
    );
    pb.set_message("Detecting instruments...");

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()?;

    let staged: Vec<StagedSheet> = pool.install(|| {
        use rayon::prelude::*;
        sheets
            .into_par_iter()
            .map(|path| {
                let detection = match recognizer.recognize(&path) {
                    Ok(text) => classify::classify(&text),
                    Err(e) => {
                        log::warn!("Text recognition failed for {}: {}", path.display(), e);
                        classify::classify("")
                    }
                };
                pb.inc(1);
                StagedSheet::new(path, detection)
            })
            .collect()
    });

    let unknown = staged
        .iter()
        .filter(|s| s.detection.instrument == Instrument::Unknown)
        .count();
    pb.finish_with_message(format!("Done: {} sheets, {} unknown", staged.len(), unknown));
    Ok(staged)
}

/// Copy the selected staged sheets into the folder titled `metadata.title`.
pub fn import(
    repository: &mut SheetRepository,
    metadata: &FolderMetadata,
    staged: &[StagedSheet],
    policy: DuplicatePolicy,
) -> Result<ImportOutcome, ImportError> {
    if metadata.title.trim().is_empty() {
        return Err(ImportError::EmptyTitle);
    }
    if metadata.composer.trim().is_empty() {
        return Err(ImportError::EmptyComposer);
    }

    let selected: Vec<&StagedSheet> = staged.iter().filter(|s| s.selected).collect();
    if selected.is_empty() {
        return Err(ImportError::NothingSelected);
    }
    if let Some(unknown) = selected
        .iter()
        .find(|s| s.detection.instrument == Instrument::Unknown)
    {
        return Err(ImportError::UnknownInstrument(unknown.path.display().to_string()));
    }
    let conflicts = conflicting(staged);
    if !conflicts.is_empty() {
        let labels: Vec<String> = conflicts.iter().map(|&i| staged[i].label()).collect();
        return Err(ImportError::Conflict(labels.join("; ")));
    }

    let incoming = selected
        .into_iter()
        .map(|s| IncomingSheet {
            source: s.path.clone(),
            instrument: s.detection.instrument,
            parts: s.detection.parts.clone(),
            clef: s.detection.clef,
        })
        .collect();

    let outcome = repository.import_sheets(metadata, incoming, policy)?;
    log::info!(
        "Imported {} sheets into '{}' ({} replaced, {} skipped)",
        outcome.imported,
        metadata.title.trim(),
        outcome.replaced,
        outcome.skipped
    );
    Ok(outcome)
}
