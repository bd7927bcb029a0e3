//! Which sheet of a piece each person plays.
//!
//! Resolution walks the person's instrument and then its fallbacks. Within one
//! instrument it prefers the person's part, then each higher part, then a sheet
//! that names no part at all. An explicit override beats all of that.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{Catalog, Part};
use crate::people::Person;
use crate::sheet::{Sheet, SheetFolder, SheetRepository};

/// A manual choice of sheet for one person in one folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(rename = "MusicSheetFolderId")]
    pub folder_id: Uuid,
    #[serde(rename = "MusicSheetId")]
    pub sheet_id: Uuid,
    #[serde(rename = "PersonId")]
    pub person_id: Uuid,
}

/// Sheets the person could play: own instrument first, then fallbacks, same clef only.
pub fn assignable_sheets<'a>(
    folder: &'a SheetFolder,
    person: &Person,
    catalog: &Catalog,
) -> Vec<&'a Sheet> {
    catalog
        .self_and_fallbacks(person.instrument)
        .flat_map(|instrument| {
            folder
                .sheets
                .iter()
                .filter(move |s| s.instrument == instrument && s.clef == person.clef)
        })
        .collect()
}

/// The sheet a person gets when nobody chose one for them.
pub fn default_sheet<'a>(
    folder: &'a SheetFolder,
    person: &Person,
    catalog: &Catalog,
) -> Option<&'a Sheet> {
    let descent = person.part.unwrap_or(Part::LOWEST).self_and_higher();

    for instrument in catalog.self_and_fallbacks(person.instrument) {
        let candidates: Vec<&Sheet> = folder
            .sheets
            .iter()
            .filter(|s| s.instrument == instrument && s.clef == person.clef)
            .collect();
        if candidates.is_empty() {
            continue;
        }

        for part in &descent {
            if let Some(&sheet) = candidates.iter().find(|s| s.parts.contains(part)) {
                return Some(sheet);
            }
        }
        if let Some(&sheet) = candidates.iter().find(|s| s.parts.is_empty()) {
            return Some(sheet);
        }
    }
    None
}

/// All overrides, at most one per (folder, person).
#[derive(Debug, Default, Clone)]
pub struct AssignmentBook {
    assignments: Vec<Assignment>,
}

impl AssignmentBook {
    /// Build from a persisted list. Later duplicates for the same pair win.
    pub fn new(assignments: Vec<Assignment>) -> Self {
        let mut book = Self::default();
        for a in assignments {
            book.pin(a.folder_id, a.sheet_id, a.person_id);
        }
        book
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn into_vec(self) -> Vec<Assignment> {
        self.assignments
    }

    pub fn override_for(&self, folder_id: Uuid, person_id: Uuid) -> Option<&Assignment> {
        self.assignments
            .iter()
            .find(|a| a.folder_id == folder_id && a.person_id == person_id)
    }

    /// Choose `sheet_id` for the person, replacing any earlier choice.
    pub fn pin(&mut self, folder_id: Uuid, sheet_id: Uuid, person_id: Uuid) {
        self.unpin(folder_id, person_id);
        self.assignments.push(Assignment {
            folder_id,
            sheet_id,
            person_id,
        });
    }

    pub fn unpin(&mut self, folder_id: Uuid, person_id: Uuid) -> bool {
        let before = self.assignments.len();
        self.assignments
            .retain(|a| !(a.folder_id == folder_id && a.person_id == person_id));
        before != self.assignments.len()
    }

    /// The sheet the person will receive: the override if it still points at a
    /// sheet of the folder, otherwise the default.
    pub fn assigned_sheet<'a>(
        &self,
        folder: &'a SheetFolder,
        person: &Person,
        catalog: &Catalog,
    ) -> Option<&'a Sheet> {
        if let Some(a) = self.override_for(folder.id, person.id) {
            match folder.sheet(a.sheet_id) {
                Some(sheet) => return Some(sheet),
                None => log::debug!(
                    "Override for {} in '{}' points at a removed sheet",
                    person.full_name(),
                    folder.title
                ),
            }
        }
        default_sheet(folder, person, catalog)
    }

    /// An override exists and differs from what the person would get anyway.
    pub fn is_custom(&self, folder: &SheetFolder, person: &Person, catalog: &Catalog) -> bool {
        let Some(a) = self.override_for(folder.id, person.id) else {
            return false;
        };
        folder.sheet(a.sheet_id).is_some()
            && default_sheet(folder, person, catalog).map(|s| s.id) != Some(a.sheet_id)
    }

    /// Replace every override of `folder` with `selections` (person id, chosen
    /// sheet). Selections matching the default, or naming no sheet, are not stored.
    /// Returns the number of overrides kept.
    pub fn replace_folder(
        &mut self,
        folder: &SheetFolder,
        people: &[Person],
        selections: &[(Uuid, Option<Uuid>)],
        catalog: &Catalog,
    ) -> usize {
        self.restore_defaults(folder.id);

        let mut kept = 0;
        for &(person_id, sheet_id) in selections {
            let (Some(person), Some(sheet_id)) =
                (people.iter().find(|p| p.id == person_id), sheet_id)
            else {
                continue;
            };
            if folder.sheet(sheet_id).is_none() {
                log::warn!("Ignoring selection of unknown sheet {} in '{}'", sheet_id, folder.title);
                continue;
            }
            if default_sheet(folder, person, catalog).map(|s| s.id) == Some(sheet_id) {
                continue;
            }
            self.pin(folder.id, sheet_id, person_id);
            kept += 1;
        }
        kept
    }

    /// Drop every override for a folder.
    pub fn restore_defaults(&mut self, folder_id: Uuid) -> usize {
        let before = self.assignments.len();
        self.assignments.retain(|a| a.folder_id != folder_id);
        before - self.assignments.len()
    }

    /// Drop overrides whose folder, sheet or person is gone.
    pub fn prune(&mut self, repository: &SheetRepository, people: &[Person]) -> usize {
        let before = self.assignments.len();
        self.assignments.retain(|a| {
            let sheet_exists = repository
                .folder(a.folder_id)
                .is_some_and(|f| f.sheet(a.sheet_id).is_some());
            sheet_exists && people.iter().any(|p| p.id == a.person_id)
        });
        let removed = before - self.assignments.len();
        if removed > 0 {
            log::info!("Dropped {} stale assignments", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::catalog::{Clef, Instrument};
    use crate::sheet::FolderMetadata;

    fn folder(variants: &[(Instrument, &[Part], Clef)]) -> SheetFolder {
        let mut folder = SheetFolder::new(
            Path::new("/lib"),
            &FolderMetadata {
                title: "Florentiner Marsch".into(),
                ..Default::default()
            },
        );
        for (n, (instrument, parts, clef)) in variants.iter().enumerate() {
            folder.sheets.push(Sheet {
                id: Uuid::new_v4(),
                folder_id: folder.id,
                title: folder.title.clone(),
                composer: String::new(),
                arranger: String::new(),
                instrument: *instrument,
                parts: parts.to_vec(),
                clef: *clef,
                path: PathBuf::from(format!("/lib/Florentiner Marsch/{n}.pdf")),
                has_conflict: false,
            });
        }
        folder
    }

    fn person(instrument: Instrument, part: Option<Part>) -> Person {
        let mut p = Person::new("Anna", "Berger", instrument);
        p.part = part;
        p
    }

    #[test]
    fn falls_back_to_substitute_instrument_and_higher_part() {
        let catalog = Catalog::default();
        let folder = folder(&[(Instrument::CornetBb, &[Part::First], Clef::Treble)]);
        let trumpet = person(Instrument::TrumpetBb, Some(Part::Second));

        let sheet = default_sheet(&folder, &trumpet, &catalog).unwrap();
        assert_eq!(sheet.instrument, Instrument::CornetBb);
        assert_eq!(sheet.parts, vec![Part::First]);
    }

    #[test]
    fn own_instrument_beats_fallback() {
        let catalog = Catalog::default();
        let folder = folder(&[
            (Instrument::CornetBb, &[Part::Second], Clef::Treble),
            (Instrument::TrumpetBb, &[Part::First], Clef::Treble),
        ]);
        let trumpet = person(Instrument::TrumpetBb, Some(Part::Second));
        let sheet = default_sheet(&folder, &trumpet, &catalog).unwrap();
        assert_eq!(sheet.instrument, Instrument::TrumpetBb);
    }

    #[test]
    fn partless_sheet_when_no_part_matches() {
        let catalog = Catalog::default();
        let folder = folder(&[
            (Instrument::Flute, &[], Clef::Treble),
            (Instrument::Flute, &[Part::Second], Clef::Treble),
        ]);
        let flute = person(Instrument::Flute, Some(Part::First));
        assert!(default_sheet(&folder, &flute, &catalog).unwrap().parts.is_empty());
    }

    #[test]
    fn no_preferred_part_descends_from_lowest() {
        let catalog = Catalog::default();
        let folder = folder(&[
            (Instrument::HornF, &[Part::First], Clef::Treble),
            (Instrument::HornF, &[Part::Third], Clef::Treble),
        ]);
        let horn = person(Instrument::HornF, None);
        assert_eq!(
            default_sheet(&folder, &horn, &catalog).unwrap().parts,
            vec![Part::Third]
        );
    }

    #[test]
    fn clef_must_match() {
        let catalog = Catalog::default();
        let folder = folder(&[(Instrument::EuphoniumBb, &[], Clef::Treble)]);
        let mut euph = person(Instrument::EuphoniumBb, None);
        euph.clef = Clef::Bass;
        assert!(default_sheet(&folder, &euph, &catalog).is_none());
        assert!(assignable_sheets(&folder, &euph, &catalog).is_empty());
    }

    #[test]
    fn assignable_sheets_follow_fallback_order() {
        let catalog = Catalog::default();
        let folder = folder(&[
            (Instrument::FlugelhornBb, &[], Clef::Treble),
            (Instrument::CornetBb, &[Part::First], Clef::Treble),
            (Instrument::TrumpetBb, &[Part::Second], Clef::Treble),
            (Instrument::Flute, &[], Clef::Treble),
        ]);
        let trumpet = person(Instrument::TrumpetBb, None);
        let order: Vec<_> = assignable_sheets(&folder, &trumpet, &catalog)
            .iter()
            .map(|s| s.instrument)
            .collect();
        assert_eq!(
            order,
            vec![Instrument::TrumpetBb, Instrument::CornetBb, Instrument::FlugelhornBb]
        );
    }

    #[test]
    fn without_override_assigned_sheet_is_the_default() {
        let catalog = Catalog::default();
        let folder = folder(&[
            (Instrument::TrumpetBb, &[Part::First], Clef::Treble),
            (Instrument::TrumpetBb, &[Part::Second], Clef::Treble),
            (Instrument::CornetBb, &[], Clef::Treble),
            (Instrument::Flute, &[Part::First, Part::Second], Clef::Treble),
        ]);
        let people = [
            person(Instrument::TrumpetBb, Some(Part::First)),
            person(Instrument::TrumpetBb, Some(Part::Third)),
            person(Instrument::CornetBb, None),
            person(Instrument::Flute, Some(Part::Second)),
            person(Instrument::Oboe, None),
            person(Instrument::Piano, None),
        ];

        // An override for someone else leaves the rest on their defaults
        let mut book = AssignmentBook::default();
        book.pin(folder.id, folder.sheets[2].id, people[0].id);

        for p in &people[1..] {
            assert_eq!(
                book.assigned_sheet(&folder, p, &catalog).map(|s| s.id),
                default_sheet(&folder, p, &catalog).map(|s| s.id),
                "{:?}",
                p.instrument
            );
            assert!(!book.is_custom(&folder, p, &catalog));
        }
        assert_eq!(
            book.assigned_sheet(&folder, &people[0], &catalog).map(|s| s.id),
            Some(folder.sheets[2].id)
        );
    }

    #[test]
    fn override_wins_until_its_sheet_disappears() {
        let catalog = Catalog::default();
        let mut folder = folder(&[
            (Instrument::TrumpetBb, &[Part::First], Clef::Treble),
            (Instrument::TrumpetBb, &[Part::Second], Clef::Treble),
        ]);
        let trumpet = person(Instrument::TrumpetBb, Some(Part::First));
        let second = folder.sheets[1].id;

        let mut book = AssignmentBook::default();
        book.pin(folder.id, second, trumpet.id);
        assert_eq!(book.assigned_sheet(&folder, &trumpet, &catalog).unwrap().id, second);
        assert!(book.is_custom(&folder, &trumpet, &catalog));

        folder.sheets.remove(1);
        let fallback = book.assigned_sheet(&folder, &trumpet, &catalog).unwrap();
        assert_eq!(fallback.parts, vec![Part::First]);
        assert!(!book.is_custom(&folder, &trumpet, &catalog));
    }

    #[test]
    fn pin_replaces_existing_choice() {
        let mut book = AssignmentBook::default();
        let (folder, person) = (Uuid::new_v4(), Uuid::new_v4());
        book.pin(folder, Uuid::new_v4(), person);
        let second = Uuid::new_v4();
        book.pin(folder, second, person);
        assert_eq!(book.assignments().len(), 1);
        assert_eq!(book.override_for(folder, person).unwrap().sheet_id, second);
        assert!(book.unpin(folder, person));
        assert!(!book.unpin(folder, person));
    }

    #[test]
    fn replace_folder_keeps_only_custom_choices() {
        let catalog = Catalog::default();
        let folder = folder(&[
            (Instrument::ClarinetBb, &[Part::First], Clef::Treble),
            (Instrument::ClarinetBb, &[Part::Second], Clef::Treble),
        ]);
        let first = person(Instrument::ClarinetBb, Some(Part::First));
        let second = person(Instrument::ClarinetBb, Some(Part::Second));
        let people = vec![first.clone(), second.clone()];
        let (s1, s2) = (folder.sheets[0].id, folder.sheets[1].id);

        let mut book = AssignmentBook::default();
        book.pin(folder.id, s2, first.id);

        // first now gets the default; second is moved up to the 1st part
        let kept = book.replace_folder(
            &folder,
            &people,
            &[(first.id, Some(s1)), (second.id, Some(s1))],
            &catalog,
        );
        assert_eq!(kept, 1);
        assert!(book.override_for(folder.id, first.id).is_none());
        assert_eq!(book.override_for(folder.id, second.id).unwrap().sheet_id, s1);

        assert_eq!(book.restore_defaults(folder.id), 1);
        assert!(book.assignments().is_empty());
    }

    #[test]
    fn reads_pascal_case_document() {
        let json = r#"[{
            "MusicSheetFolderId": "1b4e28ba-2fa1-11d2-883f-0016d3cca427",
            "MusicSheetId": "7a1c1a0e-3d1f-4f7c-9d9e-0c2b6f3a1b2c",
            "PersonId": "00000000-0000-0000-0000-000000000001"
        }]"#;
        let list: Vec<Assignment> = serde_json::from_str(json).unwrap();
        let book = AssignmentBook::new(list);
        assert_eq!(book.assignments().len(), 1);
        assert_eq!(book.assignments()[0].person_id, Uuid::from_u128(1));
    }

    #[test]
    fn prune_drops_stale_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let repository = SheetRepository::empty(dir.path());
        let trumpet = person(Instrument::TrumpetBb, None);
        let mut book = AssignmentBook::default();
        book.pin(Uuid::new_v4(), Uuid::new_v4(), trumpet.id);
        assert_eq!(book.prune(&repository, std::slice::from_ref(&trumpet)), 1);
        assert!(book.assignments().is_empty());
    }
}
