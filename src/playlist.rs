use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sanitize_file_name;
use crate::sheet::{SheetFolder, SheetRepository};

/// One numbered slot in a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaylistEntry {
    /// Nil for a placeholder that only reserves its number.
    #[serde(rename = "MusicSheetFolderId")]
    pub folder_id: Uuid,
    pub distribute: bool,
}

impl PlaylistEntry {
    pub fn new(folder_id: Uuid) -> Self {
        Self { folder_id, distribute: true }
    }

    pub fn placeholder() -> Self {
        Self { folder_id: Uuid::nil(), distribute: false }
    }

    pub fn is_placeholder(&self) -> bool {
        self.folder_id.is_nil()
    }
}

/// Two-digit, 1-based entry number (`"01"`), used as file name prefix.
pub fn entry_number(index: usize) -> String {
    format!("{:02}", index + 1)
}

/// An entry joined with the folder it points at.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedEntry<'a> {
    pub index: usize,
    pub entry: &'a PlaylistEntry,
    pub folder: Option<&'a SheetFolder>,
}

impl ResolvedEntry<'_> {
    pub fn number(&self) -> String {
        entry_number(self.index)
    }

    /// Only entries whose folder still exists can be distributed.
    pub fn distributes(&self) -> bool {
        self.entry.distribute && self.folder.is_some()
    }

    pub fn title(&self) -> &str {
        self.folder.map(|f| f.title.as_str()).unwrap_or("Placeholder")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Playlist {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub entries: Vec<PlaylistEntry>,
}

impl Playlist {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            entries: Vec::new(),
        }
    }

    /// Name with characters invalid in file names replaced by `_`.
    pub fn sanitized_name(&self) -> String {
        sanitize_file_name(&self.name)
    }

    pub fn resolve<'a>(&'a self, repository: &'a SheetRepository) -> Vec<ResolvedEntry<'a>> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| ResolvedEntry {
                index,
                entry,
                folder: if entry.is_placeholder() {
                    None
                } else {
                    repository.folder(entry.folder_id)
                },
            })
            .collect()
    }

    /// A playlist distributes when any of its entries does.
    pub fn distributes(&self, repository: &SheetRepository) -> bool {
        self.resolve(repository).iter().any(ResolvedEntry::distributes)
    }

    /// Append a folder. Returns `false` if the folder is already listed.
    pub fn add_folder(&mut self, folder_id: Uuid) -> bool {
        if folder_id.is_nil() || self.entries.iter().any(|e| e.folder_id == folder_id) {
            return false;
        }
        self.entries.push(PlaylistEntry::new(folder_id));
        true
    }

    pub fn add_placeholder(&mut self) {
        self.entries.push(PlaylistEntry::placeholder());
    }

    pub fn remove_entry(&mut self, index: usize) -> Option<PlaylistEntry> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    /// Move the entry at `from` to position `to`, renumbering everything between.
    pub fn move_entry(&mut self, from: usize, to: usize) -> bool {
        if from >= self.entries.len() || to >= self.entries.len() {
            return false;
        }
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
        true
    }

    pub fn set_distribute(&mut self, index: usize, distribute: bool) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) => {
                entry.distribute = distribute;
                true
            }
            None => false,
        }
    }

    /// Drop entries pointing at folders that no longer exist. Placeholders stay.
    pub fn prune(&mut self, repository: &SheetRepository) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| e.is_placeholder() || repository.folder(e.folder_id).is_some());
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_numbers_are_two_digits() {
        assert_eq!(entry_number(0), "01");
        assert_eq!(entry_number(9), "10");
        assert_eq!(entry_number(99), "100");
    }

    #[test]
    fn sanitized_name_replaces_invalid_chars() {
        let playlist = Playlist::new("Spring: 2025/26?");
        assert_eq!(playlist.sanitized_name(), "Spring_ 2025_26_");
    }

    #[test]
    fn reads_pascal_case_document() {
        let json = r#"{
            "Id": "7a1c1a0e-3d1f-4f7c-9d9e-0c2b6f3a1b2c",
            "Name": "Jahreskonzert",
            "Entries": [
                { "MusicSheetFolderId": "00000000-0000-0000-0000-000000000000", "Distribute": false },
                { "MusicSheetFolderId": "1b4e28ba-2fa1-11d2-883f-0016d3cca427", "Distribute": true }
            ]
        }"#;
        let playlist: Playlist = serde_json::from_str(json).unwrap();
        assert_eq!(playlist.name, "Jahreskonzert");
        assert!(playlist.entries[0].is_placeholder());
        assert!(playlist.entries[1].distribute);
    }

    #[test]
    fn add_folder_rejects_duplicates() {
        let mut playlist = Playlist::new("Concert");
        let id = Uuid::new_v4();
        assert!(playlist.add_folder(id));
        assert!(!playlist.add_folder(id));
        assert!(!playlist.add_folder(Uuid::nil()));
        playlist.add_placeholder();
        playlist.add_placeholder();
        assert_eq!(playlist.entries.len(), 3);
        assert!(playlist.entries[0].distribute);
    }

    #[test]
    fn move_and_remove_entries() {
        let mut playlist = Playlist::new("Concert");
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        playlist.add_folder(a);
        playlist.add_folder(b);
        playlist.add_folder(c);

        assert!(playlist.move_entry(2, 0));
        let order: Vec<_> = playlist.entries.iter().map(|e| e.folder_id).collect();
        assert_eq!(order, vec![c, a, b]);

        assert!(!playlist.move_entry(3, 0));
        assert_eq!(playlist.remove_entry(1).map(|e| e.folder_id), Some(a));
        assert!(playlist.remove_entry(5).is_none());
        assert!(playlist.set_distribute(0, false));
        assert!(!playlist.entries[0].distribute);
    }

    #[test]
    fn unresolved_entries_never_distribute() {
        let repository = SheetRepository::empty(std::path::Path::new("/nonexistent"));
        let mut playlist = Playlist::new("Concert");
        playlist.add_folder(Uuid::new_v4());
        playlist.add_placeholder();

        let resolved = playlist.resolve(&repository);
        assert_eq!(resolved.len(), 2);
        assert!(resolved.iter().all(|r| !r.distributes()));
        assert_eq!(resolved[1].title(), "Placeholder");
        assert_eq!(resolved[1].number(), "02");
        assert!(!playlist.distributes(&repository));

        assert_eq!(playlist.prune(&repository), 1);
        assert!(playlist.entries[0].is_placeholder());
    }
}
