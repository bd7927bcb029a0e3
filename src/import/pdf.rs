//! lopdf-backed splitter and text recognizers.

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use lopdf::{Document, Object, ObjectId};

use super::{ImportError, PageSource, SplitOptions, TextRecognizer};

fn pdf_error(path: &Path, e: impl Display) -> ImportError {
    ImportError::Pdf {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Splits by page count: `scan.pdf` becomes `scan - 01.pdf`, `scan - 02.pdf`, ...
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfSplitter;

impl PageSource for LopdfSplitter {
    fn split(
        &self,
        input: &Path,
        options: &SplitOptions,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, ImportError> {
        let doc = Document::load(input).map_err(|e| pdf_error(input, e))?;
        let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        if pages.is_empty() {
            return Err(ImportError::NoPages {
                path: input.display().to_string(),
            });
        }

        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sheet".to_string());
        let size = options.pages_per_sheet.chunk_size(pages.len());

        let mut outputs = Vec::new();
        for (n, chunk) in pages.chunks(size).enumerate() {
            let mut sheet = doc.clone();
            let others: Vec<u32> = pages.iter().copied().filter(|p| !chunk.contains(p)).collect();
            if !others.is_empty() {
                sheet.delete_pages(&others);
            }
            if options.rotate {
                rotate_pages(&mut sheet, -90).map_err(|e| pdf_error(input, e))?;
            }
            sheet.prune_objects();

            let path = out_dir.join(format!("{} - {:02}.pdf", stem, n + 1));
            sheet.save(&path).map_err(|e| pdf_error(&path, e))?;
            log::debug!("Wrote {} ({} pages)", path.display(), chunk.len());
            outputs.push(path);
        }
        Ok(outputs)
    }
}

/// Add `degrees` to every page's `/Rotate`, normalized into 0..360.
pub fn rotate_pages(doc: &mut Document, degrees: i64) -> lopdf::Result<()> {
    let ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
    for id in ids {
        let page = doc.get_object_mut(id).and_then(Object::as_dict_mut)?;
        let current = page.get(b"Rotate").and_then(Object::as_i64).unwrap_or(0);
        page.set("Rotate", (current + degrees).rem_euclid(360));
    }
    Ok(())
}

/// Reads the text layer a scanner's OCR left in the PDF.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLayerRecognizer;

impl TextRecognizer for TextLayerRecognizer {
    fn recognize(&self, sheet: &Path) -> Result<String, ImportError> {
        let doc = Document::load(sheet).map_err(|e| pdf_error(sheet, e))?;
        let Some(&first) = doc.get_pages().keys().next() else {
            return Err(ImportError::NoPages {
                path: sheet.display().to_string(),
            });
        };
        doc.extract_text(&[first]).map_err(|e| pdf_error(sheet, e))
    }
}

/// Uses `sheet.txt` next to the PDF when an external OCR run produced one
/// (pages separated by form feeds, as `pdftotext` writes them); otherwise
/// asks `fallback`.
#[derive(Debug, Clone, Default)]
pub struct SidecarRecognizer<R> {
    pub fallback: R,
}

impl<R: TextRecognizer> TextRecognizer for SidecarRecognizer<R> {
    fn recognize(&self, sheet: &Path) -> Result<String, ImportError> {
        let sidecar = sheet.with_extension("txt");
        match fs::read_to_string(&sidecar) {
            Ok(text) => {
                log::debug!("Using {}", sidecar.display());
                Ok(text.split('\x0c').next().unwrap_or_default().to_string())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => self.fallback.recognize(sheet),
            Err(e) => Err(e.into()),
        }
    }
}
