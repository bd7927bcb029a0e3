use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use uuid::Uuid;
use walkdir::WalkDir;

use super::{metadata, normalize_parts, FolderMetadata, Sheet, SheetError, SheetFolder};
use crate::catalog::{Clef, Instrument, Part};
use crate::sanitize_file_name;

/// What to do when an imported sheet has the same variant as an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    Replace,
    #[default]
    Skip,
}

/// A classified PDF waiting to be copied into the library.
#[derive(Debug, Clone)]
pub struct IncomingSheet {
    pub source: PathBuf,
    pub instrument: Instrument,
    pub parts: Vec<Part>,
    pub clef: Clef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub folder_id: Uuid,
    pub imported: u64,
    pub replaced: u64,
    pub skipped: u64,
}

/// All pieces under the sheets root, one directory per piece.
#[derive(Debug, Clone)]
pub struct SheetRepository {
    root: PathBuf,
    folders: Vec<SheetFolder>,
}

impl SheetRepository {
    pub fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            folders: Vec::new(),
        }
    }

    /// Load every piece under `root`.
    ///
    /// Each subdirectory holding PDFs becomes a folder; id and credits come
    /// from its first readable sheet. Empty subdirectories are removed.
    pub fn load(root: &Path) -> Result<Self, SheetError> {
        fs::create_dir_all(root)?;

        let directories: Vec<PathBuf> = WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .map(|e| e.into_path())
            .collect();

        let pb = ProgressBar::new(directories.len() as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )
            .unwrap()
            .progress_chars("#>-"),
        );
        pb.set_message("Loading sheets...");

        let mut repository = Self::empty(root);
        let mut unreadable = 0u64;

        for directory in &directories {
            match load_folder(directory) {
                Ok(Some(folder)) => repository.folders.push(folder),
                Ok(None) => remove_if_empty(directory),
                Err(e) => {
                    log::warn!("Error loading {}: {}", directory.display(), e);
                    unreadable += 1;
                }
            }
            pb.inc(1);
        }

        repository.sort_folders();
        pb.finish_with_message(format!(
            "Done: {} folders, {} errors",
            repository.folders.len(),
            unreadable
        ));

        Ok(repository)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn folders(&self) -> &[SheetFolder] {
        &self.folders
    }

    pub fn folder(&self, id: Uuid) -> Option<&SheetFolder> {
        self.folders.iter().find(|f| f.id == id)
    }

    pub fn folder_by_title(&self, title: &str) -> Option<&SheetFolder> {
        self.folders.iter().find(|f| f.title == title.trim())
    }

    /// Folders matching an exact id or a case-insensitive title substring.
    /// An exact title match wins over substring matches.
    pub fn find_folders(&self, query: &str) -> Vec<&SheetFolder> {
        if let Ok(id) = Uuid::parse_str(query.trim()) {
            return self.folder(id).into_iter().collect();
        }
        let needle = query.trim().to_lowercase();
        if let Some(exact) = self.folders.iter().find(|f| f.title.to_lowercase() == needle) {
            return vec![exact];
        }
        self.folders
            .iter()
            .filter(|f| f.title.to_lowercase().contains(&needle))
            .collect()
    }

    fn folder_mut(&mut self, id: Uuid) -> Result<&mut SheetFolder, SheetError> {
        self.folders
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or(SheetError::UnknownFolder(id))
    }

    fn sort_folders(&mut self) {
        self.folders.sort_by_key(|f| f.title.to_lowercase());
    }

    /// Copy `sheets` into the folder titled `metadata.title`, creating it if needed.
    ///
    /// Sheets take the folder's id and credits. A sheet whose variant already
    /// exists is replaced or skipped per `policy`.
    pub fn import_sheets(
        &mut self,
        metadata: &FolderMetadata,
        sheets: Vec<IncomingSheet>,
        policy: DuplicatePolicy,
    ) -> Result<ImportOutcome, SheetError> {
        let title = metadata.title.trim();
        if title.is_empty() {
            return Err(SheetError::EmptyTitle);
        }

        let index = match self.folders.iter().position(|f| f.title == title) {
            Some(index) => index,
            None => {
                let folder = SheetFolder::new(&self.root, metadata);
                log::info!("Creating folder {}", folder.directory.display());
                self.folders.push(folder);
                self.folders.len() - 1
            }
        };

        let folder = &mut self.folders[index];
        fs::create_dir_all(&folder.directory)?;

        let mut outcome = ImportOutcome {
            folder_id: folder.id,
            imported: 0,
            replaced: 0,
            skipped: 0,
        };

        for incoming in sheets {
            let mut sheet = Sheet {
                id: Uuid::new_v4(),
                folder_id: folder.id,
                title: folder.title.clone(),
                composer: folder.composer.clone(),
                arranger: folder.arranger.clone(),
                instrument: incoming.instrument,
                parts: normalize_parts(incoming.parts),
                clef: incoming.clef,
                path: PathBuf::new(),
                has_conflict: false,
            };

            let key = sheet.conflict_key();
            if let Some(duplicate) = folder.sheets.iter().position(|s| s.conflict_key() == key) {
                if policy == DuplicatePolicy::Skip {
                    log::info!(
                        "Skipping {}: {} already exists",
                        incoming.source.display(),
                        folder.sheets[duplicate].file_name()
                    );
                    outcome.skipped += 1;
                    continue;
                }
                let old = folder.sheets.remove(duplicate);
                log::info!("Replacing {}", old.path.display());
                remove_file_if_exists(&old.path)?;
                outcome.replaced += 1;
            }

            let target = unique_path(&folder.directory, &sheet.base_name(), None);
            fs::copy(&incoming.source, &target)?;
            sheet.path = target;
            metadata::write(&sheet.path, &sheet.metadata())?;
            log::debug!("Imported {}", sheet.path.display());

            folder.sheets.push(sheet);
            outcome.imported += 1;
        }

        refresh_conflicts(folder)?;
        self.sort_folders();
        Ok(outcome)
    }

    /// Retitle a folder: moves its directory and renames every sheet file.
    pub fn rename_folder(&mut self, folder_id: Uuid, title: &str) -> Result<(), SheetError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(SheetError::EmptyTitle);
        }
        let root = self.root.clone();
        let folder = self.folder_mut(folder_id)?;
        if folder.title == title {
            return Ok(());
        }

        // Titles that sanitize to the same name keep their directory
        let new_directory = root.join(sanitize_file_name(title));
        if new_directory != folder.directory {
            if new_directory.exists() {
                return Err(SheetError::FolderExists(new_directory.display().to_string()));
            }
            fs::rename(&folder.directory, &new_directory)?;
            log::info!(
                "Moved {} -> {}",
                folder.directory.display(),
                new_directory.display()
            );
            folder.directory = new_directory;
        }
        folder.title = title.to_string();

        let SheetFolder { directory, sheets, .. } = &mut *folder;
        for sheet in sheets.iter_mut() {
            if let Some(name) = sheet.path.file_name() {
                sheet.path = directory.join(name);
            }
            sheet.title = title.to_string();
            rename_sheet_file(directory, sheet)?;
            metadata::write(&sheet.path, &sheet.metadata())?;
        }

        refresh_conflicts(folder)?;
        self.sort_folders();
        Ok(())
    }

    pub fn set_composer(&mut self, folder_id: Uuid, composer: &str) -> Result<(), SheetError> {
        let folder = self.folder_mut(folder_id)?;
        folder.composer = composer.trim().to_string();
        for sheet in &mut folder.sheets {
            sheet.composer = folder.composer.clone();
            metadata::write(&sheet.path, &sheet.metadata())?;
        }
        Ok(())
    }

    pub fn set_arranger(&mut self, folder_id: Uuid, arranger: &str) -> Result<(), SheetError> {
        let folder = self.folder_mut(folder_id)?;
        folder.arranger = arranger.trim().to_string();
        for sheet in &mut folder.sheets {
            sheet.arranger = folder.arranger.clone();
            metadata::write(&sheet.path, &sheet.metadata())?;
        }
        Ok(())
    }

    /// Correct a sheet's variant: renames the file, rewrites its metadata and
    /// re-checks conflicts in the folder.
    pub fn update_sheet(
        &mut self,
        folder_id: Uuid,
        sheet_id: Uuid,
        instrument: Instrument,
        parts: Vec<Part>,
        clef: Clef,
    ) -> Result<(), SheetError> {
        let folder = self.folder_mut(folder_id)?;
        {
            let SheetFolder { directory, sheets, .. } = &mut *folder;
            let sheet = sheets
                .iter_mut()
                .find(|s| s.id == sheet_id)
                .ok_or(SheetError::UnknownSheet(sheet_id))?;

            sheet.instrument = instrument;
            sheet.parts = normalize_parts(parts);
            sheet.clef = clef;
            rename_sheet_file(directory, sheet)?;
            metadata::write(&sheet.path, &sheet.metadata())?;
        }
        refresh_conflicts(folder)
    }

    /// Delete a sheet and its file. A folder left without sheets is removed too.
    pub fn remove_sheet(&mut self, folder_id: Uuid, sheet_id: Uuid) -> Result<Sheet, SheetError> {
        let folder = self.folder_mut(folder_id)?;
        let index = folder
            .sheets
            .iter()
            .position(|s| s.id == sheet_id)
            .ok_or(SheetError::UnknownSheet(sheet_id))?;

        remove_file_if_exists(&folder.sheets[index].path)?;
        let sheet = folder.sheets.remove(index);
        log::info!("Removed {}", sheet.path.display());

        if folder.sheets.is_empty() {
            remove_if_empty(&folder.directory);
            self.folders.retain(|f| f.id != folder_id);
        } else {
            refresh_conflicts(folder)?;
        }
        Ok(sheet)
    }
}

/// Flag sheets sharing a variant as conflicting, then move numbered files of
/// non-conflicting sheets back to their plain name when it is free.
pub fn refresh_conflicts(folder: &mut SheetFolder) -> Result<(), SheetError> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for sheet in &folder.sheets {
        *counts.entry(sheet.conflict_key()).or_default() += 1;
    }
    for sheet in &mut folder.sheets {
        sheet.has_conflict = counts.get(&sheet.conflict_key()).copied().unwrap_or(0) > 1;
    }

    let SheetFolder { directory, sheets, .. } = folder;
    for sheet in sheets.iter_mut().filter(|s| !s.has_conflict) {
        let base = sheet.base_name();
        let stem = sheet
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !is_numbered_variant(&stem, &base) {
            continue;
        }
        let target = directory.join(format!("{base}.pdf"));
        if target.exists() {
            continue;
        }
        fs::rename(&sheet.path, &target)?;
        log::info!("Renamed {} -> {}", sheet.path.display(), target.display());
        sheet.path = target;
    }
    Ok(())
}

fn load_folder(directory: &Path) -> Result<Option<SheetFolder>, SheetError> {
    let pdfs: Vec<PathBuf> = WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_pdf(e.path()))
        .map(|e| e.into_path())
        .collect();

    let mut sheets = Vec::new();
    for path in pdfs {
        match metadata::read(&path) {
            Ok(meta) => sheets.push(Sheet::from_metadata(meta, path)),
            Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
        }
    }

    let Some(first) = sheets.first() else {
        return Ok(None);
    };

    let mut folder = SheetFolder {
        id: first.folder_id,
        title: first.title.clone(),
        composer: first.composer.clone(),
        arranger: first.arranger.clone(),
        directory: directory.to_path_buf(),
        sheets: Vec::new(),
    };
    for mut sheet in sheets {
        if sheet.folder_id != folder.id {
            log::warn!(
                "{} belongs to folder {}, adopting it into {}",
                sheet.path.display(),
                sheet.folder_id,
                folder.id
            );
            sheet.folder_id = folder.id;
        }
        folder.sheets.push(sheet);
    }

    refresh_conflicts(&mut folder)?;
    Ok(Some(folder))
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// `"{base} (n)"` with n a number.
fn is_numbered_variant(stem: &str, base: &str) -> bool {
    stem.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix(" ("))
        .and_then(|rest| rest.strip_suffix(')'))
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// `{base}.pdf`, or `{base} (n).pdf` with the smallest free n >= 2.
/// `own` is the path the sheet already occupies, which counts as free.
fn unique_path(directory: &Path, base: &str, own: Option<&Path>) -> PathBuf {
    let is_free = |candidate: &Path| own == Some(candidate) || !candidate.exists();

    let plain = directory.join(format!("{base}.pdf"));
    if is_free(&plain) {
        return plain;
    }
    let mut n = 2u32;
    loop {
        let candidate = directory.join(format!("{base} ({n}).pdf"));
        if is_free(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Rename a sheet's file to match its current variant.
fn rename_sheet_file(directory: &Path, sheet: &mut Sheet) -> Result<(), SheetError> {
    let current_stem = sheet
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = sheet.base_name();
    if sheet.path.parent() == Some(directory)
        && (current_stem == base || is_numbered_variant(&current_stem, &base))
    {
        return Ok(());
    }

    let target = unique_path(directory, &base, Some(&sheet.path));
    if target != sheet.path {
        fs::rename(&sheet.path, &target)?;
        log::debug!("Renamed {} -> {}", sheet.path.display(), target.display());
        sheet.path = target;
    }
    Ok(())
}

fn remove_file_if_exists(path: &Path) -> Result<(), SheetError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Remove `directory` if it has no entries at all; otherwise leave it and say why.
fn remove_if_empty(directory: &Path) {
    match fs::read_dir(directory).map(|mut entries| entries.next().is_none()) {
        Ok(true) => match fs::remove_dir(directory) {
            Ok(()) => log::info!("Removed empty folder {}", directory.display()),
            Err(e) => log::warn!("Failed to remove {}: {}", directory.display(), e),
        },
        Ok(false) => log::info!("Leaving {}: no readable sheets", directory.display()),
        Err(e) => log::warn!("Failed to read {}: {}", directory.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::fixtures::write_pdf;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        inbox: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("sheets");
        let inbox = dir.path().join("inbox");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&inbox).unwrap();
        Fixture { _dir: dir, root, inbox }
    }

    fn incoming(fx: &Fixture, name: &str, instrument: Instrument, parts: Vec<Part>) -> IncomingSheet {
        let source = fx.inbox.join(name);
        write_pdf(&source, &[name]);
        IncomingSheet {
            source,
            instrument,
            parts,
            clef: Clef::Treble,
        }
    }

    fn march() -> FolderMetadata {
        FolderMetadata {
            title: "Radetzky March".into(),
            composer: "J. Strauss".into(),
            arranger: String::new(),
        }
    }

    #[test]
    fn import_creates_folder_and_named_files() {
        let fx = fixture();
        let mut repo = SheetRepository::load(&fx.root).unwrap();
        let outcome = repo
            .import_sheets(
                &march(),
                vec![
                    incoming(&fx, "a.pdf", Instrument::TrumpetBb, vec![Part::First]),
                    incoming(&fx, "b.pdf", Instrument::Flute, vec![]),
                ],
                DuplicatePolicy::Skip,
            )
            .unwrap();
        assert_eq!(outcome.imported, 2);

        let folder = repo.folder(outcome.folder_id).unwrap();
        assert_eq!(folder.directory, fx.root.join("Radetzky March"));
        let names: Vec<_> = folder.sheets.iter().map(Sheet::file_name).collect();
        assert!(names.contains(&"Radetzky March - Bb Trumpet - 1st - TC.pdf".to_string()));
        assert!(names.contains(&"Radetzky March - Flute - TC.pdf".to_string()));
        assert!(folder.sheets.iter().all(|s| s.composer == "J. Strauss"));
    }

    #[test]
    fn reload_restores_folders_from_pdf_metadata() {
        let fx = fixture();
        let mut repo = SheetRepository::empty(&fx.root);
        let outcome = repo
            .import_sheets(
                &march(),
                vec![incoming(&fx, "a.pdf", Instrument::HornF, vec![Part::Second])],
                DuplicatePolicy::Skip,
            )
            .unwrap();

        let reloaded = SheetRepository::load(&fx.root).unwrap();
        let folder = reloaded.folder(outcome.folder_id).unwrap();
        assert_eq!(folder.title, "Radetzky March");
        assert_eq!(folder.composer, "J. Strauss");
        assert_eq!(folder.sheets.len(), 1);
        assert_eq!(folder.sheets[0].instrument, Instrument::HornF);
        assert_eq!(folder.sheets[0].parts, vec![Part::Second]);
    }

    #[test]
    fn load_removes_empty_dirs_and_keeps_foreign_ones() {
        let fx = fixture();
        fs::create_dir_all(fx.root.join("empty")).unwrap();
        fs::create_dir_all(fx.root.join("notes")).unwrap();
        fs::write(fx.root.join("notes").join("readme.txt"), "keep").unwrap();

        let repo = SheetRepository::load(&fx.root).unwrap();
        assert!(repo.folders().is_empty());
        assert!(!fx.root.join("empty").exists());
        assert!(fx.root.join("notes").join("readme.txt").exists());
    }

    #[test]
    fn duplicate_policy_skip_and_replace() {
        let fx = fixture();
        let mut repo = SheetRepository::empty(&fx.root);
        repo.import_sheets(
            &march(),
            vec![incoming(&fx, "a.pdf", Instrument::Flute, vec![Part::First])],
            DuplicatePolicy::Skip,
        )
        .unwrap();

        let skipped = repo
            .import_sheets(
                &march(),
                vec![incoming(&fx, "b.pdf", Instrument::Flute, vec![Part::First])],
                DuplicatePolicy::Skip,
            )
            .unwrap();
        assert_eq!((skipped.imported, skipped.skipped), (0, 1));

        let replaced = repo
            .import_sheets(
                &march(),
                vec![incoming(&fx, "c.pdf", Instrument::Flute, vec![Part::First])],
                DuplicatePolicy::Replace,
            )
            .unwrap();
        assert_eq!((replaced.imported, replaced.replaced), (1, 1));

        let folder = repo.folder(replaced.folder_id).unwrap();
        assert_eq!(folder.sheets.len(), 1);
        assert_eq!(folder.sheets[0].file_name(), "Radetzky March - Flute - 1st - TC.pdf");
    }

    #[test]
    fn conflicting_sheets_keep_their_numbers() {
        let fx = fixture();
        let mut repo = SheetRepository::empty(&fx.root);
        let outcome = repo
            .import_sheets(
                &march(),
                vec![
                    incoming(&fx, "a.pdf", Instrument::Oboe, vec![]),
                    incoming(&fx, "b.pdf", Instrument::Flute, vec![]),
                ],
                DuplicatePolicy::Skip,
            )
            .unwrap();
        let folder_id = outcome.folder_id;
        let flute = repo.folder(folder_id).unwrap().sheets[1].clone();
        let oboe = repo.folder(folder_id).unwrap().sheets[0].clone();

        // Relabel the flute sheet as oboe: same variant twice
        repo.update_sheet(folder_id, flute.id, Instrument::Oboe, vec![], Clef::Treble)
            .unwrap();
        let folder = repo.folder(folder_id).unwrap();
        assert!(folder.sheets.iter().all(|s| s.has_conflict));
        let relabeled = folder.sheet(flute.id).unwrap();
        assert_eq!(relabeled.file_name(), "Radetzky March - Oboe - TC (2).pdf");

        // Deleting the original frees the plain name; the survivor is renumbered
        repo.remove_sheet(folder_id, oboe.id).unwrap();
        let folder = repo.folder(folder_id).unwrap();
        let survivor = folder.sheet(flute.id).unwrap();
        assert!(!survivor.has_conflict);
        assert_eq!(survivor.file_name(), "Radetzky March - Oboe - TC.pdf");
    }

    #[test]
    fn refresh_conflicts_leaves_conflicts_numbered() {
        let fx = fixture();
        let directory = fx.root.join("Piece");
        fs::create_dir_all(&directory).unwrap();

        let make = |name: &str| {
            let path = directory.join(name);
            write_pdf(&path, &["x"]);
            Sheet {
                id: Uuid::new_v4(),
                folder_id: Uuid::nil(),
                title: "Piece".into(),
                composer: String::new(),
                arranger: String::new(),
                instrument: Instrument::Piano,
                parts: vec![],
                clef: Clef::Treble,
                path,
                has_conflict: false,
            }
        };
        let mut folder = SheetFolder {
            id: Uuid::nil(),
            title: "Piece".into(),
            composer: String::new(),
            arranger: String::new(),
            directory: directory.clone(),
            sheets: vec![make("Piece - Piano - TC (2).pdf"), make("Piece - Piano - TC (3).pdf")],
        };

        refresh_conflicts(&mut folder).unwrap();
        assert!(folder.sheets.iter().all(|s| s.has_conflict));
        assert!(directory.join("Piece - Piano - TC (2).pdf").exists());
        assert!(!directory.join("Piece - Piano - TC.pdf").exists());

        folder.sheets.pop();
        refresh_conflicts(&mut folder).unwrap();
        assert_eq!(folder.sheets[0].file_name(), "Piece - Piano - TC.pdf");
    }

    #[test]
    fn rename_folder_moves_directory_and_files() {
        let fx = fixture();
        let mut repo = SheetRepository::empty(&fx.root);
        let outcome = repo
            .import_sheets(
                &march(),
                vec![incoming(&fx, "a.pdf", Instrument::Piano, vec![])],
                DuplicatePolicy::Skip,
            )
            .unwrap();

        repo.rename_folder(outcome.folder_id, "Radetzky-Marsch").unwrap();
        let folder = repo.folder(outcome.folder_id).unwrap();
        assert_eq!(folder.directory, fx.root.join("Radetzky-Marsch"));
        assert!(!fx.root.join("Radetzky March").exists());
        let sheet = &folder.sheets[0];
        assert_eq!(sheet.file_name(), "Radetzky-Marsch - Piano - TC.pdf");
        assert!(sheet.path.exists());
        assert_eq!(metadata::read(&sheet.path).unwrap().title, "Radetzky-Marsch");
    }

    #[test]
    fn rename_folder_refuses_existing_target() {
        let fx = fixture();
        let mut repo = SheetRepository::empty(&fx.root);
        let outcome = repo
            .import_sheets(
                &march(),
                vec![incoming(&fx, "a.pdf", Instrument::Piano, vec![])],
                DuplicatePolicy::Skip,
            )
            .unwrap();
        fs::create_dir_all(fx.root.join("Taken")).unwrap();
        assert!(matches!(
            repo.rename_folder(outcome.folder_id, "Taken"),
            Err(SheetError::FolderExists(_))
        ));
        assert_eq!(repo.folder(outcome.folder_id).unwrap().title, "Radetzky March");
    }

    #[test]
    fn rename_to_same_sanitized_name_keeps_directory() {
        let fx = fixture();
        let mut repo = SheetRepository::empty(&fx.root);
        let outcome = repo
            .import_sheets(
                &FolderMetadata {
                    title: "AC/DC".into(),
                    composer: "Young".into(),
                    arranger: String::new(),
                },
                vec![incoming(&fx, "a.pdf", Instrument::Piano, vec![])],
                DuplicatePolicy::Skip,
            )
            .unwrap();
        let directory = fx.root.join("AC_DC");
        assert_eq!(repo.folder(outcome.folder_id).unwrap().directory, directory);

        repo.rename_folder(outcome.folder_id, "AC_DC").unwrap();
        let folder = repo.folder(outcome.folder_id).unwrap();
        assert_eq!(folder.title, "AC_DC");
        assert_eq!(folder.directory, directory);
        let sheet = &folder.sheets[0];
        assert!(sheet.path.exists());
        assert_eq!(metadata::read(&sheet.path).unwrap().title, "AC_DC");
    }

    #[test]
    fn credits_are_written_to_every_sheet() {
        let fx = fixture();
        let mut repo = SheetRepository::empty(&fx.root);
        let outcome = repo
            .import_sheets(
                &march(),
                vec![
                    incoming(&fx, "a.pdf", Instrument::Piano, vec![]),
                    incoming(&fx, "b.pdf", Instrument::Oboe, vec![]),
                ],
                DuplicatePolicy::Skip,
            )
            .unwrap();
        repo.set_composer(outcome.folder_id, "Johann Strauss (Vater)").unwrap();
        repo.set_arranger(outcome.folder_id, "A. Schneider").unwrap();

        let folder = repo.folder(outcome.folder_id).unwrap();
        assert_eq!(folder.credits(), "Johann Strauss (Vater), arr. A. Schneider");
        for sheet in &folder.sheets {
            let meta = metadata::read(&sheet.path).unwrap();
            assert_eq!(meta.composer, "Johann Strauss (Vater)");
            assert_eq!(meta.arranger, "A. Schneider");
        }
    }

    #[test]
    fn removing_last_sheet_drops_folder() {
        let fx = fixture();
        let mut repo = SheetRepository::empty(&fx.root);
        let outcome = repo
            .import_sheets(
                &march(),
                vec![incoming(&fx, "a.pdf", Instrument::Piano, vec![])],
                DuplicatePolicy::Skip,
            )
            .unwrap();
        let sheet_id = repo.folder(outcome.folder_id).unwrap().sheets[0].id;
        repo.remove_sheet(outcome.folder_id, sheet_id).unwrap();
        assert!(repo.folder(outcome.folder_id).is_none());
        assert!(!fx.root.join("Radetzky March").exists());
    }

    #[test]
    fn numbered_variant_detection() {
        assert!(is_numbered_variant("A - Flute - TC (2)", "A - Flute - TC"));
        assert!(!is_numbered_variant("A - Flute - TC", "A - Flute - TC"));
        assert!(!is_numbered_variant("A - Flute - TC (x)", "A - Flute - TC"));
        assert!(!is_numbered_variant("A - Flute - TC ()", "A - Flute - TC"));
    }

    #[test]
    fn find_folders_prefers_exact_title() {
        let fx = fixture();
        let mut repo = SheetRepository::empty(&fx.root);
        for title in ["March", "March No. 2"] {
            repo.import_sheets(
                &FolderMetadata { title: title.into(), ..Default::default() },
                vec![incoming(&fx, &format!("{title}.pdf"), Instrument::Piano, vec![])],
                DuplicatePolicy::Skip,
            )
            .unwrap();
        }
        assert_eq!(repo.find_folders("march").len(), 1);
        assert_eq!(repo.find_folders("no. 2").len(), 1);
        assert_eq!(repo.find_folders("arc").len(), 2);
    }
}
