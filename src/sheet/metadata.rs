//! Sheet metadata stored in the PDF document-info dictionary.
//!
//! The PDF itself is the only persistence for a sheet: id, folder id, credits
//! and the instrument/part/clef variant live under custom `Sheetstand*` keys.
//! Title and composer are mirrored into the standard `Title` / `Author`
//! entries so PDF viewers show something sensible.

use std::fmt::Display;
use std::fs;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use uuid::Uuid;

use super::SheetError;
use crate::catalog::{Clef, Instrument, Part};

const KEY_ID: &str = "SheetstandId";
const KEY_FOLDER_ID: &str = "SheetstandFolderId";
const KEY_TITLE: &str = "SheetstandTitle";
const KEY_COMPOSER: &str = "SheetstandComposer";
const KEY_ARRANGER: &str = "SheetstandArranger";
const KEY_INSTRUMENT: &str = "SheetstandInstrument";
const KEY_PARTS: &str = "SheetstandParts";
const KEY_CLEF: &str = "SheetstandClef";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetMetadata {
    pub id: Uuid,
    pub folder_id: Uuid,
    pub title: String,
    pub composer: String,
    pub arranger: String,
    pub instrument: Instrument,
    pub parts: Vec<Part>,
    pub clef: Clef,
}

pub(crate) fn pdf_error(path: &Path, e: impl Display) -> SheetError {
    SheetError::Pdf {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Read sheet metadata from `path`.
///
/// Ids are required. An unknown instrument reads as `Unknown`, unknown part
/// keys are dropped, and a missing clef reads as treble.
pub fn read(path: &Path) -> Result<SheetMetadata, SheetError> {
    let doc = Document::load(path).map_err(|e| pdf_error(path, e))?;
    let info = info_dictionary(&doc);
    let get = |key: &str| -> Option<String> {
        info.and_then(|dict| dict.get(key.as_bytes()).ok())
            .and_then(decode_text)
    };

    let id = parse_uuid(path, KEY_ID, get(KEY_ID))?;
    let folder_id = parse_uuid(path, KEY_FOLDER_ID, get(KEY_FOLDER_ID))?;

    let title = get(KEY_TITLE)
        .or_else(|| get("Title"))
        .unwrap_or_default();

    let instrument = match get(KEY_INSTRUMENT) {
        Some(key) => Instrument::from_key(&key).unwrap_or_else(|| {
            log::warn!("Unknown instrument '{}' in {}", key, path.display());
            Instrument::Unknown
        }),
        None => Instrument::Unknown,
    };

    let parts = get(KEY_PARTS)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .filter_map(|k| {
                    let part = Part::from_key(k);
                    if part.is_none() {
                        log::debug!("Ignoring unknown part '{}' in {}", k, path.display());
                    }
                    part
                })
                .collect()
        })
        .unwrap_or_default();

    let clef = get(KEY_CLEF)
        .and_then(|key| Clef::from_key(&key))
        .unwrap_or_default();

    Ok(SheetMetadata {
        id,
        folder_id,
        title,
        composer: get(KEY_COMPOSER).unwrap_or_default(),
        arranger: get(KEY_ARRANGER).unwrap_or_default(),
        instrument,
        parts,
        clef,
    })
}

/// Write `meta` into the document-info dictionary of `path`, in place.
pub fn write(path: &Path, meta: &SheetMetadata) -> Result<(), SheetError> {
    let mut doc = Document::load(path).map_err(|e| pdf_error(path, e))?;
    let info_id = ensure_info_dictionary(&mut doc);
    let info = doc
        .get_object_mut(info_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| pdf_error(path, e))?;

    let part_keys: Vec<&str> = meta.parts.iter().map(|p| p.key()).collect();
    let entries = [
        (KEY_ID, meta.id.to_string()),
        (KEY_FOLDER_ID, meta.folder_id.to_string()),
        (KEY_TITLE, meta.title.clone()),
        (KEY_COMPOSER, meta.composer.clone()),
        (KEY_ARRANGER, meta.arranger.clone()),
        (KEY_INSTRUMENT, meta.instrument.key().to_string()),
        (KEY_PARTS, part_keys.join(",")),
        (KEY_CLEF, meta.clef.key().to_string()),
        ("Title", meta.title.clone()),
    ];
    for (key, value) in entries {
        info.set(key, encode_text(&value));
    }
    if meta.composer.is_empty() {
        info.remove(b"Author");
    } else {
        info.set("Author", encode_text(&meta.composer));
    }

    save_in_place(&mut doc, path)
}

/// Save through a temporary sibling so a failed write never truncates the sheet.
pub(crate) fn save_in_place(doc: &mut Document, path: &Path) -> Result<(), SheetError> {
    let tmp = path.with_extension("pdf.tmp");
    doc.save(&tmp).map_err(|e| pdf_error(path, e))?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Id of the indirect info dictionary, created (or lifted from a direct one) if needed.
fn ensure_info_dictionary(doc: &mut Document) -> ObjectId {
    let existing = doc.trailer.get(b"Info").ok().cloned();
    match existing {
        Some(Object::Reference(id)) if doc.get_dictionary(id).is_ok() => id,
        Some(Object::Dictionary(dict)) => {
            let id = doc.add_object(dict);
            doc.trailer.set("Info", id);
            id
        }
        _ => {
            let id = doc.add_object(Dictionary::new());
            doc.trailer.set("Info", id);
            id
        }
    }
}

fn parse_uuid(path: &Path, key: &'static str, value: Option<String>) -> Result<Uuid, SheetError> {
    let value = value.ok_or_else(|| SheetError::MissingMetadata {
        path: path.display().to_string(),
        key,
    })?;
    Uuid::parse_str(value.trim()).map_err(|_| SheetError::InvalidMetadata {
        path: path.display().to_string(),
        key,
        value,
    })
}

/// PDF text strings are PDFDocEncoding or UTF-16BE with a byte-order mark.
fn encode_text(value: &str) -> Object {
    if value.is_ascii() {
        Object::string_literal(value)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in value.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

fn decode_text(object: &Object) -> Option<String> {
    let Object::String(bytes, _) = object else {
        return None;
    };
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&units));
    }
    Some(match String::from_utf8(bytes.clone()) {
        Ok(text) => text,
        // Latin-1 is close enough to PDFDocEncoding for names
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    })
}
