//! Who plays which sheet, per playlist, as a table.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::assign::AssignmentBook;
use crate::catalog::Catalog;
use crate::people::Person;
use crate::playlist::Playlist;
use crate::sheet::SheetRepository;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    /// Instrument heading above its players.
    Group(String),
    Person { label: String, cells: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub title: String,
    pub header: Vec<String>,
    pub rows: Vec<Row>,
}

/// One column per entry with a folder, one row per active non-percussion player.
pub fn distribution_table(
    playlist: &Playlist,
    people: &[Person],
    repository: &SheetRepository,
    assignments: &AssignmentBook,
    catalog: &Catalog,
) -> Table {
    let entries: Vec<_> = playlist
        .resolve(repository)
        .into_iter()
        .filter(|e| e.folder.is_some())
        .collect();

    let mut header = vec!["Person".to_string()];
    header.extend(entries.iter().map(|e| format!("{} {}", e.number(), e.title())));

    let mut players: Vec<&Person> = people
        .iter()
        .filter(|p| !p.dispensed && !p.instrument.is_percussion())
        .collect();
    players.sort_by(|a, b| {
        a.instrument
            .index()
            .cmp(&b.instrument.index())
            .then_with(|| {
                let rank = |p: &Person| p.part.map_or(usize::MAX, |part| part.index());
                rank(a).cmp(&rank(b))
            })
            .then_with(|| a.full_name().cmp(&b.full_name()))
    });

    let mut rows = Vec::new();
    let mut current = None;
    for person in players {
        if current != Some(person.instrument) {
            current = Some(person.instrument);
            rows.push(Row::Group(person.instrument.display_name().to_string()));
        }

        let label = match person.part {
            Some(part) => format!("{} ({})", person.full_name(), part.display_name()),
            None => person.full_name(),
        };
        let cells = entries
            .iter()
            .map(|entry| {
                entry
                    .folder
                    .and_then(|folder| assignments.assigned_sheet(folder, person, catalog))
                    .map(|sheet| sheet.label())
                    .unwrap_or_default()
            })
            .collect();
        rows.push(Row::Person { label, cells });
    }

    Table {
        title: playlist.name.clone(),
        header,
        rows,
    }
}

/// Quote a field when it holds a comma, quote or line break (RFC 4180).
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_line(fields: &[String], width: usize) -> String {
    let mut line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
    line.resize(width, String::new());
    line.join(",")
}

/// Render `table` as CSV: title row, blank row, header, then rows.
/// Every line has the header's width and ends with CRLF.
pub fn to_csv(table: &Table) -> String {
    let width = table.header.len();
    let mut lines = vec![
        csv_line(std::slice::from_ref(&table.title), width),
        csv_line(&[], width),
        csv_line(&table.header, width),
    ];
    for row in &table.rows {
        lines.push(match row {
            Row::Group(name) => csv_line(std::slice::from_ref(name), width),
            Row::Person { label, cells } => {
                let mut fields = vec![label.clone()];
                fields.extend(cells.iter().cloned());
                csv_line(&fields, width)
            }
        });
    }
    let mut out = lines.join("\r\n");
    out.push_str("\r\n");
    out
}

pub fn write_csv(table: &Table, path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    file.write_all(to_csv(table).as_bytes())?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

/// `"{dir}/Sheet distribution {playlist} {timestamp}.csv"`.
pub fn export_path(dir: &Path, playlist: &Playlist, now: DateTime<Local>) -> PathBuf {
    dir.join(format!(
        "Sheet distribution {} {}.csv",
        playlist.sanitized_name(),
        now.format("%Y-%m-%d %H%M%S")
    ))
}
