use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use sheetstand::assign::{self, AssignmentBook};
use sheetstand::catalog::{self, Clef, Instrument, Part};
use sheetstand::distribute::{
    self, CancellationToken, DistributionInput, DistributionReporter, DistributionState, LogLevel,
};
use sheetstand::import::{self, LopdfSplitter, PagesPerSheet, SidecarRecognizer, SplitOptions, TextLayerRecognizer};
use sheetstand::people::{Person, PersonUpdate, Roster};
use sheetstand::playlist::Playlist;
use sheetstand::sheet::{DuplicatePolicy, FolderMetadata, SheetFolder, SheetRepository};
use sheetstand::store::{self, JsonStore, SaveQueue};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "sheetstand", version, about = "Sheet-music library manager for bands and orchestras")]
struct Cli {
    /// Library folder (people, playlists, assignments and sheets)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List instruments with their folder numbers and fallbacks
    Instruments,

    /// Manage the people of the band
    People {
        #[command(subcommand)]
        action: PeopleAction,
    },

    /// Import and edit sheets
    Sheets {
        #[command(subcommand)]
        action: SheetsAction,
    },

    /// Manage playlists
    Playlist {
        #[command(subcommand)]
        action: PlaylistAction,
    },

    /// Show or override which sheet each person plays
    Assign {
        #[command(subcommand)]
        action: AssignAction,
    },

    /// Copy assigned sheets into per-person folders
    Distribute {
        /// Target folder (defaults to config distribution_dir)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Show the plan without touching the folder
        #[arg(long)]
        dry_run: bool,
    },

    /// Export a playlist's assignment table as CSV
    Export {
        /// Playlist name or id
        playlist: String,

        /// Output folder (defaults to the current directory)
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum PeopleAction {
    /// List everyone
    List,
    /// Add a person
    Add {
        first_name: String,
        last_name: String,
        instrument: Instrument,
        #[arg(long)]
        part: Option<Part>,
        #[arg(long)]
        clef: Option<Clef>,
    },
    /// Change a person's fields
    Set {
        /// Name or id
        person: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        instrument: Option<Instrument>,
        #[arg(long, conflicts_with = "no_part")]
        part: Option<Part>,
        /// Clear the preferred part
        #[arg(long)]
        no_part: bool,
        #[arg(long)]
        clef: Option<Clef>,
        #[arg(long)]
        dispensed: Option<bool>,
    },
    /// Remove a person and their assignments
    Remove { person: String },
}

#[derive(Subcommand)]
enum SheetsAction {
    /// List folders, or the sheets of matching folders
    List { folder: Option<String> },

    /// Split and detect PDFs, then import them into a folder
    Import {
        /// One multi-part PDF to split, or several single-sheet PDFs
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        title: String,
        #[arg(long)]
        composer: String,
        #[arg(long, default_value = "")]
        arranger: String,
        /// Pages per sheet when splitting (1-4 or "all")
        #[arg(long, default_value = "2")]
        pages: PagesPerSheet,
        /// Keep page orientation when splitting
        #[arg(long)]
        no_rotate: bool,
        /// Replace existing sheets with the same instrument, parts and clef
        #[arg(long)]
        replace: bool,
        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,
        /// Show detections without importing
        #[arg(long)]
        dry_run: bool,
    },

    /// Correct a sheet's instrument, parts or clef
    Set {
        folder: String,
        /// Sheet number as listed, or id
        sheet: String,
        #[arg(long)]
        instrument: Option<Instrument>,
        #[arg(long, value_delimiter = ',')]
        parts: Option<Vec<Part>>,
        #[arg(long)]
        clef: Option<Clef>,
    },

    /// Rename a folder and all its files
    Rename { folder: String, title: String },

    /// Set composer and/or arranger
    Credits {
        folder: String,
        #[arg(long)]
        composer: Option<String>,
        #[arg(long)]
        arranger: Option<String>,
    },

    /// Delete a sheet
    Remove { folder: String, sheet: String },
}

#[derive(Subcommand)]
enum PlaylistAction {
    /// List playlists
    List,
    /// Show a playlist's entries
    Show { playlist: String },
    /// Create an empty playlist
    Create { name: String },
    /// Delete a playlist
    Delete { playlist: String },
    /// Append a folder
    Add { playlist: String, folder: String },
    /// Append a placeholder that only reserves a number
    Placeholder { playlist: String },
    /// Remove the entry with this number
    Remove { playlist: String, number: usize },
    /// Move an entry to another number
    Move { playlist: String, from: usize, to: usize },
    /// Include or exclude an entry from distribution
    Distribute {
        playlist: String,
        number: usize,
        #[arg(long)]
        off: bool,
    },
}

#[derive(Subcommand)]
enum AssignAction {
    /// Show who gets which sheet in a folder
    Show { folder: String },
    /// Give a person a specific sheet
    Pin { folder: String, person: String, sheet: String },
    /// Drop a person's override
    Unpin { folder: String, person: String },
    /// Drop every override in a folder
    Reset { folder: String },
}

/// Everything loaded from the data folder, with one save queue per document.
struct Library {
    data_dir: PathBuf,
    repository: SheetRepository,
    roster: Roster,
    playlists: Vec<Playlist>,
    assignments: AssignmentBook,
    people_queue: SaveQueue<Person>,
    playlist_queue: SaveQueue<Playlist>,
    assignment_queue: SaveQueue<assign::Assignment>,
}

impl Library {
    fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;

        let repository = SheetRepository::load(&data_dir.join(store::SHEETS_DIR))
            .context("Failed to load sheets")?;

        let people_store = JsonStore::new(data_dir.join(store::PEOPLE_FILE));
        let playlist_store = JsonStore::new(data_dir.join(store::PLAYLISTS_FILE));
        let assignment_store = JsonStore::new(data_dir.join(store::ASSIGNMENTS_FILE));

        let roster = Roster::new(people_store.load().context("Failed to load people")?);
        let playlists = playlist_store.load().context("Failed to load playlists")?;
        let assignments = AssignmentBook::new(
            assignment_store.load().context("Failed to load assignments")?,
        );

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            repository,
            roster,
            playlists,
            assignments,
            people_queue: SaveQueue::new(people_store),
            playlist_queue: SaveQueue::new(playlist_store),
            assignment_queue: SaveQueue::new(assignment_store),
        })
    }

    fn save_people(&self) -> Result<()> {
        self.people_queue.save(self.roster.people().to_vec())?;
        self.people_queue.flush().context("Failed to save people")
    }

    fn save_playlists(&self) -> Result<()> {
        self.playlist_queue.save(self.playlists.clone())?;
        self.playlist_queue.flush().context("Failed to save playlists")
    }

    fn save_assignments(&self) -> Result<()> {
        self.assignment_queue.save(self.assignments.assignments().to_vec())?;
        self.assignment_queue.flush().context("Failed to save assignments")
    }

    /// Drop playlist entries and overrides that point at removed sheets.
    fn prune(&mut self) -> Result<()> {
        let mut pruned = 0;
        for playlist in &mut self.playlists {
            pruned += playlist.prune(&self.repository);
        }
        if pruned > 0 {
            self.save_playlists()?;
        }
        if self.assignments.prune(&self.repository, self.roster.people()) > 0 {
            self.save_assignments()?;
        }
        Ok(())
    }

    fn folder(&self, query: &str) -> Result<&SheetFolder> {
        let found = self.repository.find_folders(query);
        match found.as_slice() {
            [folder] => Ok(*folder),
            [] => anyhow::bail!("No folder matching \"{}\"", query),
            many => anyhow::bail!(
                "\"{}\" matches {} folders: {}",
                query,
                many.len(),
                many.iter().map(|f| f.title.as_str()).collect::<Vec<_>>().join(", ")
            ),
        }
    }

    fn person(&self, query: &str) -> Result<&Person> {
        let found = self.roster.find(query);
        match found.as_slice() {
            [person] => Ok(*person),
            [] => anyhow::bail!("No person matching \"{}\"", query),
            many => anyhow::bail!(
                "\"{}\" matches {} people: {}",
                query,
                many.len(),
                many.iter().map(|p| p.full_name()).collect::<Vec<_>>().join(", ")
            ),
        }
    }

    fn playlist_index(&self, query: &str) -> Result<usize> {
        if let Ok(id) = Uuid::parse_str(query.trim()) {
            return self
                .playlists
                .iter()
                .position(|p| p.id == id)
                .with_context(|| format!("No playlist with id {}", id));
        }
        let needle = query.trim().to_lowercase();
        if let Some(i) = self.playlists.iter().position(|p| p.name.to_lowercase() == needle) {
            return Ok(i);
        }
        let matches: Vec<usize> = (0..self.playlists.len())
            .filter(|&i| self.playlists[i].name.to_lowercase().contains(&needle))
            .collect();
        match matches.as_slice() {
            [i] => Ok(*i),
            [] => anyhow::bail!("No playlist matching \"{}\"", query),
            _ => anyhow::bail!("\"{}\" matches {} playlists", query, matches.len()),
        }
    }
}

/// Sheet by 1-based number as listed, or by id.
fn sheet_id(folder: &SheetFolder, query: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(query.trim()) {
        return folder
            .sheet(id)
            .map(|s| s.id)
            .with_context(|| format!("No sheet {} in \"{}\"", id, folder.title));
    }
    let number: usize = query
        .trim()
        .parse()
        .with_context(|| format!("Not a sheet number or id: {}", query))?;
    number
        .checked_sub(1)
        .and_then(|i| folder.sheets.get(i))
        .map(|s| s.id)
        .with_context(|| format!("\"{}\" has no sheet {}", folder.title, number))
}

/// Entry number (1-based) to index.
fn entry_index(playlist: &Playlist, number: usize) -> Result<usize> {
    match number.checked_sub(1) {
        Some(i) if i < playlist.entries.len() => Ok(i),
        _ => anyhow::bail!("\"{}\" has no entry {}", playlist.name, number),
    }
}

/// Progress bar and log lines for a distribution run.
struct CliReporter {
    pb: ProgressBar,
}

impl CliReporter {
    fn new() -> Self {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}",
            )
            .unwrap()
            .progress_chars("#>-"),
        );
        Self { pb }
    }
}

impl DistributionReporter for CliReporter {
    fn set_state(&mut self, state: DistributionState) {
        log::debug!("Distribution state: {:?}", state);
    }

    fn report_progress(&mut self, percent: u8, status: &str) {
        self.pb.set_position(percent as u64);
        self.pb.set_message(status.to_string());
    }

    fn append_log(&mut self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => log::info!("{}", message),
            LogLevel::Warning => self.pb.println(format!("WARNING {}", message)),
            LogLevel::Error => self.pb.println(format!("ERROR   {}", message)),
        }
    }

    fn mark_completed(&mut self, state: DistributionState, summary: &str) {
        let label = match state {
            DistributionState::Completed(distribute::DistributionStatus::Success) => "Distributed",
            DistributionState::Completed(distribute::DistributionStatus::Warning) => "Distributed with warnings",
            DistributionState::Completed(distribute::DistributionStatus::Error) => "Distributed with errors",
            DistributionState::Cancelled => "Cancelled",
            DistributionState::Idle | DistributionState::Planning | DistributionState::Applying => "Stopped",
        };
        self.pb.finish_with_message(format!("{}: {}", label, summary));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = sheetstand::config::AppConfig::load();

    // Initialize global catalog (must happen before any fallback lookups)
    catalog::init(&config.custom_fallbacks);
    let catalog = catalog::registry();

    // Resolve data dir: CLI > config > XDG default
    let data_dir = cli.data_dir.unwrap_or_else(|| config.resolve_data_dir());
    log::info!("Library: {}", data_dir.display());

    if let Commands::Instruments = cli.command {
        println!("{:<4} {:<24} {:<12} {}", "No", "Instrument", "Key", "Fallbacks");
        println!("{}", "-".repeat(80));
        for &instrument in Instrument::ALL.iter().skip(1) {
            let fallbacks: Vec<&str> = catalog
                .fallbacks(instrument)
                .iter()
                .map(|i| i.display_name())
                .collect();
            println!(
                "{:<4} {:<24} {:<12} {}",
                format!("{:02}", instrument.index()),
                instrument.display_name(),
                format!("{:?}", instrument.category()),
                fallbacks.join(", ")
            );
        }
        return Ok(());
    }

    let mut library = Library::open(&data_dir)?;

    match cli.command {
        Commands::Instruments => {}

        Commands::People { action } => match action {
            PeopleAction::List => {
                if library.roster.people().is_empty() {
                    println!("No people yet. Add one with `sheetstand people add`.");
                    return Ok(());
                }
                println!("{:<28} {:<22} {:<8} {:<5} {}", "Name", "Instrument", "Part", "Clef", "");
                println!("{}", "-".repeat(72));
                for p in library.roster.people() {
                    println!(
                        "{:<28} {:<22} {:<8} {:<5} {}",
                        p.full_name(),
                        p.instrument.display_name(),
                        p.part.map(|part| part.display_name()).unwrap_or("-"),
                        p.clef.display_name(),
                        if p.dispensed { "dispensed" } else { "" }
                    );
                }
            }
            PeopleAction::Add { first_name, last_name, instrument, part, clef } => {
                let mut person = Person::new(&first_name, &last_name, instrument);
                person.part = part;
                // Bass-clef and percussion instruments get their fixed clef
                person.clef = clef.unwrap_or_else(|| sheetstand::classify::detect_clef("", instrument));
                let name = person.full_name();
                library.roster.add(person);
                library.save_people()?;
                println!("Added {}", name);
            }
            PeopleAction::Set {
                person,
                first_name,
                last_name,
                instrument,
                part,
                no_part,
                clef,
                dispensed,
            } => {
                let id = library.person(&person)?.id;
                let update = PersonUpdate {
                    first_name,
                    last_name,
                    instrument,
                    part: if no_part { Some(None) } else { part.map(Some) },
                    clef,
                    dispensed,
                };
                let updated = library
                    .roster
                    .update(id, update)
                    .map(|p| p.full_name())
                    .context("Person disappeared during update")?;
                library.save_people()?;
                println!("Updated {}", updated);
            }
            PeopleAction::Remove { person } => {
                let id = library.person(&person)?.id;
                if let Some(removed) = library.roster.remove(id) {
                    library.save_people()?;
                    library.prune()?;
                    println!("Removed {}", removed.full_name());
                }
            }
        },

        Commands::Sheets { action } => match action {
            SheetsAction::List { folder } => match folder {
                None => {
                    if library.repository.folders().is_empty() {
                        println!("No sheets yet. Import some with `sheetstand sheets import`.");
                        return Ok(());
                    }
                    for f in library.repository.folders() {
                        let conflict = if f.has_conflicts() { "  (conflicts)" } else { "" };
                        println!("{:<40} {:>3} sheets  {}{}", f.title, f.sheets.len(), f.credits(), conflict);
                    }
                }
                Some(query) => {
                    let f = library.folder(&query)?;
                    println!("{} ({})", f.title, f.credits());
                    println!();
                    for (i, s) in f.sheets.iter().enumerate() {
                        println!(
                            "{:>3}  {:<32} {:<5} {}{}",
                            i + 1,
                            s.label(),
                            s.clef.display_name(),
                            s.file_name(),
                            if s.has_conflict { "  CONFLICT" } else { "" }
                        );
                    }
                }
            },

            SheetsAction::Import {
                files,
                title,
                composer,
                arranger,
                pages,
                no_rotate,
                replace,
                jobs,
                dry_run,
            } => {
                let workers = if jobs > 0 { jobs } else { config.resolve_workers() };
                let recognizer = SidecarRecognizer { fallback: TextLayerRecognizer };
                let staging_dir = library.data_dir.join("staging").join(Uuid::new_v4().to_string());

                let staged = if files.len() == 1 {
                    let options = SplitOptions { pages_per_sheet: pages, rotate: !no_rotate };
                    import::stage(&files[0], &options, &LopdfSplitter, &recognizer, &staging_dir, workers)
                        .context("Split & detect failed")?
                } else {
                    import::stage_files(&files, &recognizer, workers).context("Detection failed")?
                };

                let conflicts = import::conflicting(&staged);
                for (i, s) in staged.iter().enumerate() {
                    let flag = if s.detection.instrument == Instrument::Unknown {
                        "  UNKNOWN"
                    } else if conflicts.contains(&i) {
                        "  CONFLICT"
                    } else {
                        ""
                    };
                    println!("{:>3}  {}{}", i + 1, s.label(), flag);
                }

                if dry_run {
                    println!("DRY RUN — nothing imported");
                } else {
                    let metadata = FolderMetadata { title, composer, arranger };
                    let policy = if replace { DuplicatePolicy::Replace } else { DuplicatePolicy::Skip };
                    let result = import::import(&mut library.repository, &metadata, &staged, policy);
                    if staging_dir.exists() {
                        if let Err(e) = std::fs::remove_dir_all(&staging_dir) {
                            log::warn!("Failed to remove {}: {}", staging_dir.display(), e);
                        }
                    }
                    let outcome = result.context("Import failed")?;
                    println!(
                        "Import complete: {} imported, {} replaced, {} skipped",
                        outcome.imported, outcome.replaced, outcome.skipped
                    );
                }
            }

            SheetsAction::Set { folder, sheet, instrument, parts, clef } => {
                let f = library.folder(&folder)?;
                let (folder_id, sheet_id) = (f.id, sheet_id(f, &sheet)?);
                let current = f.sheet(sheet_id).context("Sheet disappeared")?.clone();
                library
                    .repository
                    .update_sheet(
                        folder_id,
                        sheet_id,
                        instrument.unwrap_or(current.instrument),
                        parts.unwrap_or(current.parts),
                        clef.unwrap_or(current.clef),
                    )
                    .context("Failed to update sheet")?;
                println!("Updated sheet {}", sheet);
            }

            SheetsAction::Rename { folder, title } => {
                let folder_id = library.folder(&folder)?.id;
                library
                    .repository
                    .rename_folder(folder_id, &title)
                    .context("Rename failed")?;
                println!("Renamed to \"{}\"", title.trim());
            }

            SheetsAction::Credits { folder, composer, arranger } => {
                let folder_id = library.folder(&folder)?.id;
                if let Some(composer) = composer {
                    library.repository.set_composer(folder_id, &composer)?;
                }
                if let Some(arranger) = arranger {
                    library.repository.set_arranger(folder_id, &arranger)?;
                }
                let f = library.folder(&folder_id.to_string())?;
                println!("{}: {}", f.title, f.credits());
            }

            SheetsAction::Remove { folder, sheet } => {
                let f = library.folder(&folder)?;
                let (folder_id, sheet_id) = (f.id, sheet_id(f, &sheet)?);
                let removed = library
                    .repository
                    .remove_sheet(folder_id, sheet_id)
                    .context("Failed to remove sheet")?;
                library.prune()?;
                println!("Removed {}", removed.file_name());
            }
        },

        Commands::Playlist { action } => match action {
            PlaylistAction::List => {
                if library.playlists.is_empty() {
                    println!("No playlists yet.");
                    return Ok(());
                }
                for p in &library.playlists {
                    let marker = if p.distributes(&library.repository) { "" } else { "  (not distributed)" };
                    println!("{:<32} {:>3} entries{}", p.name, p.entries.len(), marker);
                }
            }
            PlaylistAction::Show { playlist } => {
                let p = &library.playlists[library.playlist_index(&playlist)?];
                println!("{}", p.name);
                println!();
                for entry in p.resolve(&library.repository) {
                    println!(
                        "{}  {:<40} {}",
                        entry.number(),
                        entry.title(),
                        if entry.distributes() { "" } else { "(skipped)" }
                    );
                }
            }
            PlaylistAction::Create { name } => {
                let playlist = Playlist::new(&name);
                println!("Created playlist \"{}\"", playlist.name);
                library.playlists.push(playlist);
                library.save_playlists()?;
            }
            PlaylistAction::Delete { playlist } => {
                let index = library.playlist_index(&playlist)?;
                let removed = library.playlists.remove(index);
                library.save_playlists()?;
                println!("Deleted playlist \"{}\"", removed.name);
            }
            PlaylistAction::Add { playlist, folder } => {
                let index = library.playlist_index(&playlist)?;
                let f = library.folder(&folder)?;
                let (folder_id, title) = (f.id, f.title.clone());
                if library.playlists[index].add_folder(folder_id) {
                    library.save_playlists()?;
                    println!("Added \"{}\" as {:02}", title, library.playlists[index].entries.len());
                } else {
                    println!("\"{}\" is already in the playlist", title);
                }
            }
            PlaylistAction::Placeholder { playlist } => {
                let index = library.playlist_index(&playlist)?;
                library.playlists[index].add_placeholder();
                library.save_playlists()?;
                println!("Added placeholder {:02}", library.playlists[index].entries.len());
            }
            PlaylistAction::Remove { playlist, number } => {
                let index = library.playlist_index(&playlist)?;
                let entry = entry_index(&library.playlists[index], number)?;
                library.playlists[index].remove_entry(entry);
                library.save_playlists()?;
                println!("Removed entry {:02}", number);
            }
            PlaylistAction::Move { playlist, from, to } => {
                let index = library.playlist_index(&playlist)?;
                let p = &mut library.playlists[index];
                let (from, to) = (entry_index(p, from)?, entry_index(p, to)?);
                p.move_entry(from, to);
                library.save_playlists()?;
            }
            PlaylistAction::Distribute { playlist, number, off } => {
                let index = library.playlist_index(&playlist)?;
                let entry = entry_index(&library.playlists[index], number)?;
                library.playlists[index].set_distribute(entry, !off);
                library.save_playlists()?;
            }
        },

        Commands::Assign { action } => match action {
            AssignAction::Show { folder } => {
                let f = library.folder(&folder)?;
                println!("{}", f.title);
                println!();
                for person in library
                    .roster
                    .people()
                    .iter()
                    .filter(|p| !p.instrument.is_percussion())
                {
                    let assigned = library
                        .assignments
                        .assigned_sheet(f, person, catalog)
                        .map(|s| s.label())
                        .unwrap_or_else(|| "-".to_string());
                    let custom = if library.assignments.is_custom(f, person, catalog) { "  (custom)" } else { "" };
                    let options = assign::assignable_sheets(f, person, catalog).len();
                    println!(
                        "{:<28} {:<32} {} options{}",
                        person.full_name(),
                        assigned,
                        options,
                        custom
                    );
                }
            }
            AssignAction::Pin { folder, person, sheet } => {
                let f = library.folder(&folder)?;
                let p = library.person(&person)?;
                let sheet_id = sheet_id(f, &sheet)?;
                let (folder_id, person_id, name) = (f.id, p.id, p.full_name());
                library.assignments.pin(folder_id, sheet_id, person_id);
                library.save_assignments()?;
                println!("Pinned sheet {} for {}", sheet, name);
            }
            AssignAction::Unpin { folder, person } => {
                let folder_id = library.folder(&folder)?.id;
                let person_id = library.person(&person)?.id;
                if library.assignments.unpin(folder_id, person_id) {
                    library.save_assignments()?;
                    println!("Override removed");
                } else {
                    println!("No override to remove");
                }
            }
            AssignAction::Reset { folder } => {
                let folder_id = library.folder(&folder)?.id;
                let removed = library.assignments.restore_defaults(folder_id);
                library.save_assignments()?;
                println!("Removed {} overrides", removed);
            }
        },

        Commands::Distribute { dir, dry_run } => {
            let root = dir.unwrap_or_else(|| config.resolve_distribution_dir());
            let input = DistributionInput {
                people: library.roster.people(),
                playlists: &library.playlists,
                repository: &library.repository,
                assignments: &library.assignments,
                catalog,
            };

            if dry_run {
                println!("DRY RUN — no changes will be made to {}", root.display());
                println!();
                let plan = distribute::plan::plan(&root, &input);
                for d in &plan.directories_to_create {
                    println!("CREATE DIR  {}", d.display());
                }
                for c in &plan.files_to_ensure {
                    println!("COPY FILE {}", c.destination.display());
                }
                for f in &plan.files_to_delete {
                    println!("DELETE FILE {}", f.display());
                }
                for d in &plan.directories_to_delete_if_empty {
                    println!("RMDIR {}", d.display());
                }
                for m in &plan.missing_assignments {
                    println!("WARNING {}", m.message());
                }
                println!();
                println!(
                    "Plan complete: {} steps, {} files unchanged, {} people with missing sheets",
                    plan.step_count(),
                    plan.files_unchanged.len(),
                    plan.missing_assignments.len()
                );
                return Ok(());
            }

            let mut reporter = CliReporter::new();
            let summary = distribute::distribute(
                &root,
                &input,
                config.retry,
                &mut reporter,
                &CancellationToken::new(),
            )
            .context("Distribution failed")?;
            println!(
                "Distribution complete: {} copied, {} deleted, {} skipped, {} warnings, {} errors",
                summary.copied, summary.deleted, summary.skipped, summary.warnings, summary.errors
            );
        }

        Commands::Export { playlist, out } => {
            let p = &library.playlists[library.playlist_index(&playlist)?];
            let table = sheetstand::export::distribution_table(
                p,
                library.roster.people(),
                &library.repository,
                &library.assignments,
                catalog,
            );
            let path = sheetstand::export::export_path(&out, p, chrono::Local::now());
            sheetstand::export::write_csv(&table, &path).context("Export failed")?;
            println!("Export complete: {}", path.display());
        }
    }

    Ok(())
}
