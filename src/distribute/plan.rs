use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use uuid::Uuid;
use walkdir::WalkDir;

use super::same_content;
use crate::assign::AssignmentBook;
use crate::catalog::{Catalog, Instrument};
use crate::people::Person;
use crate::playlist::Playlist;
use crate::sanitize_file_name;
use crate::sheet::SheetRepository;

/// Everything a distribution is computed from.
#[derive(Clone, Copy)]
pub struct DistributionInput<'a> {
    pub people: &'a [Person],
    pub playlists: &'a [Playlist],
    pub repository: &'a SheetRepository,
    pub assignments: &'a AssignmentBook,
    pub catalog: &'a Catalog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCopy {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Pieces a person gets no sheet for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingAssignment {
    pub person_id: Uuid,
    pub full_name: String,
    pub instrument: Instrument,
    pub titles: Vec<String>,
}

impl MissingAssignment {
    pub fn message(&self) -> String {
        format!(
            "Missing sheets for: {} ({}), missing titles: {}",
            self.full_name,
            self.instrument.display_name(),
            self.titles.join(", ")
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct DistributionPlan {
    pub root: PathBuf,
    /// Shortest first, so parents precede children.
    pub directories_to_create: Vec<PathBuf>,
    /// Destinations that are missing or differ from their source.
    pub files_to_ensure: Vec<PlannedCopy>,
    pub files_unchanged: Vec<PlannedCopy>,
    /// Case-insensitive path order.
    pub files_to_delete: Vec<PathBuf>,
    /// Deepest first.
    pub directories_to_delete_if_empty: Vec<PathBuf>,
    /// Sorted by full name, case-insensitive.
    pub missing_assignments: Vec<MissingAssignment>,
}

impl DistributionPlan {
    /// Number of filesystem steps the executor will take.
    pub fn step_count(&self) -> usize {
        self.directories_to_create.len()
            + self.files_to_ensure.len()
            + self.files_to_delete.len()
            + self.directories_to_delete_if_empty.len()
    }

    /// Nothing on disk needs to change.
    pub fn is_up_to_date(&self) -> bool {
        self.step_count() == 0
    }
}

/// The tree the current state calls for: destination file -> source sheet,
/// plus every directory that should exist under the root.
#[derive(Debug, Default)]
struct ExpectedTree {
    files: BTreeMap<PathBuf, PathBuf>,
    directories: BTreeSet<PathBuf>,
}

impl ExpectedTree {
    /// Expect `directory` and every ancestor below `root`.
    fn add_directory(&mut self, root: &Path, directory: PathBuf) {
        let mut current = Some(directory.as_path());
        while let Some(dir) = current {
            if dir == root || !dir.starts_with(root) {
                break;
            }
            self.directories.insert(dir.to_path_buf());
            current = dir.parent();
        }
    }
}

/// Compare the expected tree under `root` with what exists.
pub fn plan(root: &Path, input: &DistributionInput) -> DistributionPlan {
    let mut expected = ExpectedTree::default();
    let mut missing: HashMap<Uuid, (&Person, Vec<String>)> = HashMap::new();

    let playlists: Vec<&Playlist> = input
        .playlists
        .iter()
        .filter(|p| p.distributes(input.repository))
        .collect();

    for person in input
        .people
        .iter()
        .filter(|p| !p.dispensed && !p.instrument.is_percussion())
    {
        let person_dir = root
            .join(person.instrument.folder_label())
            .join(sanitize_file_name(&person.full_name()));
        expected.add_directory(root, person_dir.clone());

        for playlist in &playlists {
            let playlist_dir = person_dir.join(playlist.sanitized_name());
            expected.add_directory(root, playlist_dir.clone());

            for entry in playlist.resolve(input.repository) {
                let Some(folder) = entry.folder.filter(|_| entry.distributes()) else {
                    continue;
                };
                match input.assignments.assigned_sheet(folder, person, input.catalog) {
                    Some(sheet) => {
                        let destination =
                            playlist_dir.join(format!("{} {}", entry.number(), sheet.file_name()));
                        expected.files.insert(destination, sheet.path.clone());
                    }
                    None => missing
                        .entry(person.id)
                        .or_insert_with(|| (person, Vec::new()))
                        .1
                        .push(folder.title.clone()),
                }
            }
        }
    }

    // Percussion shares one folder per playlist, one subfolder per piece
    let percussion_root = root.join(Instrument::Percussion.folder_label());
    for playlist in &playlists {
        let playlist_dir = percussion_root.join(playlist.sanitized_name());
        expected.add_directory(root, playlist_dir.clone());

        for entry in playlist.resolve(input.repository) {
            let Some(folder) = entry.folder.filter(|_| entry.distributes()) else {
                continue;
            };
            let piece_dir =
                playlist_dir.join(sanitize_file_name(&format!("{} {}", entry.number(), folder.title)));
            expected.add_directory(root, piece_dir.clone());

            for sheet in folder.sheets.iter().filter(|s| s.instrument.is_percussion()) {
                let destination = piece_dir.join(format!("{} {}", entry.number(), sheet.file_name()));
                expected.files.insert(destination, sheet.path.clone());
            }
        }
    }

    diff(root, expected, missing)
}

fn diff(
    root: &Path,
    expected: ExpectedTree,
    missing: HashMap<Uuid, (&Person, Vec<String>)>,
) -> DistributionPlan {
    let mut existing_files = Vec::new();
    let mut existing_directories = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_dir() {
            existing_directories.push(entry.into_path());
        } else {
            existing_files.push(entry.into_path());
        }
    }

    let mut files_to_delete: Vec<PathBuf> = existing_files
        .into_iter()
        .filter(|f| !expected.files.contains_key(f))
        .collect();
    files_to_delete.sort_by_cached_key(|p| p.to_string_lossy().to_lowercase());

    let existing_set: BTreeSet<&PathBuf> = existing_directories.iter().collect();
    let mut directories_to_create: Vec<PathBuf> = expected
        .directories
        .iter()
        .filter(|d| !existing_set.contains(d))
        .cloned()
        .collect();
    directories_to_create.sort_by_key(|d| d.as_os_str().len());

    let mut directories_to_delete_if_empty: Vec<PathBuf> = existing_directories
        .iter()
        .filter(|d| !expected.directories.contains(*d))
        .cloned()
        .collect();
    directories_to_delete_if_empty.sort_by_key(|d| std::cmp::Reverse(d.as_os_str().len()));

    let (files_unchanged, files_to_ensure): (Vec<PlannedCopy>, Vec<PlannedCopy>) = expected
        .files
        .into_iter()
        .map(|(destination, source)| PlannedCopy { source, destination })
        .collect::<Vec<_>>()
        .into_par_iter()
        .partition(|copy| match same_content(&copy.source, &copy.destination) {
            Ok(same) => same,
            Err(e) => {
                log::warn!("Cannot compare {}: {}", copy.destination.display(), e);
                false
            }
        });

    let mut missing_assignments: Vec<MissingAssignment> = missing
        .into_values()
        .map(|(person, mut titles)| {
            titles.sort_by_cached_key(|t| t.to_lowercase());
            titles.dedup_by(|a, b| a.to_lowercase() == b.to_lowercase());
            MissingAssignment {
                person_id: person.id,
                full_name: person.full_name(),
                instrument: person.instrument,
                titles,
            }
        })
        .collect();
    missing_assignments.sort_by_cached_key(|m| m.full_name.to_lowercase());

    DistributionPlan {
        root: root.to_path_buf(),
        directories_to_create,
        files_to_ensure,
        files_unchanged,
        files_to_delete,
        directories_to_delete_if_empty,
        missing_assignments,
    }
}
