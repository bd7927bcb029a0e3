pub mod metadata;
pub mod repository;

use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use crate::catalog::part::join_parts;
use crate::catalog::{Clef, Instrument, Part};
use crate::sanitize_file_name;

pub use metadata::SheetMetadata;
pub use repository::{refresh_conflicts, DuplicatePolicy, ImportOutcome, IncomingSheet, SheetRepository};

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF error for {path}: {message}")]
    Pdf { path: String, message: String },
    #[error("Missing metadata '{key}' in {path}")]
    MissingMetadata { path: String, key: &'static str },
    #[error("Invalid metadata '{key}' in {path}: {value}")]
    InvalidMetadata {
        path: String,
        key: &'static str,
        value: String,
    },
    #[error("A folder named '{0}' already exists")]
    FolderExists(String),
    #[error("Title must not be empty")]
    EmptyTitle,
    #[error("Unknown folder: {0}")]
    UnknownFolder(Uuid),
    #[error("Unknown sheet: {0}")]
    UnknownSheet(Uuid),
}

/// Title and credits shared by every sheet of a piece.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderMetadata {
    pub title: String,
    pub composer: String,
    pub arranger: String,
}

/// One instrument/part/clef variant of a piece, stored as a single PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub id: Uuid,
    pub folder_id: Uuid,
    pub title: String,
    pub composer: String,
    pub arranger: String,
    pub instrument: Instrument,
    /// Catalog order, no duplicates.
    pub parts: Vec<Part>,
    pub clef: Clef,
    pub path: PathBuf,
    /// Another sheet in the folder has the same instrument, parts and clef.
    pub has_conflict: bool,
}

impl Sheet {
    pub fn from_metadata(meta: SheetMetadata, path: PathBuf) -> Self {
        Self {
            id: meta.id,
            folder_id: meta.folder_id,
            title: meta.title,
            composer: meta.composer,
            arranger: meta.arranger,
            instrument: meta.instrument,
            parts: normalize_parts(meta.parts),
            clef: meta.clef,
            path,
            has_conflict: false,
        }
    }

    pub fn metadata(&self) -> SheetMetadata {
        SheetMetadata {
            id: self.id,
            folder_id: self.folder_id,
            title: self.title.clone(),
            composer: self.composer.clone(),
            arranger: self.arranger.clone(),
            instrument: self.instrument,
            parts: self.parts.clone(),
            clef: self.clef,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Identity of the variant within its folder: `instrument|part keys|clef`.
    pub fn conflict_key(&self) -> String {
        let mut keys: Vec<&str> = self.parts.iter().map(|p| p.key()).collect();
        keys.sort_unstable();
        format!("{}|{}|{}", self.instrument.key(), keys.join(","), self.clef.key())
    }

    /// `"Bb Trumpet - 1st, 2nd"`, or just the instrument without parts.
    pub fn label(&self) -> String {
        if self.parts.is_empty() {
            self.instrument.display_name().to_string()
        } else {
            format!("{} - {}", self.instrument.display_name(), join_parts(&self.parts))
        }
    }

    /// File stem the sheet should carry: `{title} - {instrument} - {parts} - {clef}`.
    pub fn base_name(&self) -> String {
        let mut segments = vec![self.title.clone(), self.instrument.display_name().to_string()];
        if !self.parts.is_empty() {
            segments.push(join_parts(&self.parts));
        }
        segments.push(self.clef.display_name().to_string());
        sanitize_file_name(&segments.join(" - "))
    }
}

/// One piece: a directory of sheets sharing id and credits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetFolder {
    pub id: Uuid,
    pub title: String,
    pub composer: String,
    pub arranger: String,
    pub directory: PathBuf,
    pub sheets: Vec<Sheet>,
}

impl SheetFolder {
    pub fn new(root: &Path, metadata: &FolderMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: metadata.title.trim().to_string(),
            composer: metadata.composer.trim().to_string(),
            arranger: metadata.arranger.trim().to_string(),
            directory: root.join(sanitize_file_name(&metadata.title)),
            sheets: Vec::new(),
        }
    }

    /// `"Composer, arr. Arranger"` with empty parts left out.
    pub fn credits(&self) -> String {
        let mut credits = String::new();
        if !self.composer.trim().is_empty() {
            credits.push_str(self.composer.trim());
        }
        if !self.arranger.trim().is_empty() {
            if !credits.is_empty() {
                credits.push_str(", ");
            }
            credits.push_str("arr. ");
            credits.push_str(self.arranger.trim());
        }
        credits
    }

    pub fn sheet(&self, id: Uuid) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.id == id)
    }

    pub fn has_conflicts(&self) -> bool {
        self.sheets.iter().any(|s| s.has_conflict)
    }
}

/// Sort parts into catalog order and drop duplicates.
pub fn normalize_parts(mut parts: Vec<Part>) -> Vec<Part> {
    parts.sort();
    parts.dedup();
    parts
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::path::Path;

    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Write a PDF with one page per entry of `pages`, each showing that text.
    pub(crate) fn write_pdf(path: &Path, pages: &[&str]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }
}
