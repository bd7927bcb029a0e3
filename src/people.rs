use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{Clef, Instrument, Part};

/// A member of the orchestra.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Person {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub instrument: Instrument,
    /// Preferred part; `None` plays whatever part is available.
    #[serde(default)]
    pub part: Option<Part>,
    #[serde(default)]
    pub clef: Clef,
    /// Dispensed people are skipped by distribution and export.
    #[serde(default)]
    pub dispensed: bool,
}

impl Person {
    pub fn new(first_name: &str, last_name: &str, instrument: Instrument) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            instrument,
            part: None,
            clef: Clef::default(),
            dispensed: false,
        }
    }

    /// `"Last First"`, the sort key and the distribution folder name.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

/// Field changes for [`Roster::update`]. `None` leaves a field untouched;
/// `part: Some(None)` clears the preferred part.
#[derive(Debug, Default, Clone)]
pub struct PersonUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub instrument: Option<Instrument>,
    pub part: Option<Option<Part>>,
    pub clef: Option<Clef>,
    pub dispensed: Option<bool>,
}

/// All people, kept sorted by full name.
#[derive(Debug, Default, Clone)]
pub struct Roster {
    people: Vec<Person>,
}

impl Roster {
    pub fn new(mut people: Vec<Person>) -> Self {
        sort_people(&mut people);
        Self { people }
    }

    pub fn people(&self) -> &[Person] {
        &self.people
    }

    pub fn into_vec(self) -> Vec<Person> {
        self.people
    }

    pub fn get(&self, id: Uuid) -> Option<&Person> {
        self.people.iter().find(|p| p.id == id)
    }

    /// People matching `query`: an exact id, or a case-insensitive substring
    /// of either name order.
    pub fn find(&self, query: &str) -> Vec<&Person> {
        if let Ok(id) = Uuid::parse_str(query.trim()) {
            return self.get(id).into_iter().collect();
        }
        let needle = query.trim().to_lowercase();
        self.people
            .iter()
            .filter(|p| {
                p.full_name().to_lowercase().contains(&needle)
                    || p.to_string().to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn add(&mut self, person: Person) -> Uuid {
        let id = person.id;
        log::info!("Adding {} ({})", person, person.instrument);
        self.people.push(person);
        sort_people(&mut self.people);
        id
    }

    pub fn remove(&mut self, id: Uuid) -> Option<Person> {
        let index = self.people.iter().position(|p| p.id == id)?;
        Some(self.people.remove(index))
    }

    /// Apply `update` to the person with `id`. Returns the updated person.
    pub fn update(&mut self, id: Uuid, update: PersonUpdate) -> Option<&Person> {
        let person = self.people.iter_mut().find(|p| p.id == id)?;

        if let Some(first) = update.first_name {
            person.first_name = first.trim().to_string();
        }
        if let Some(last) = update.last_name {
            person.last_name = last.trim().to_string();
        }
        if let Some(instrument) = update.instrument {
            person.instrument = instrument;
        }
        if let Some(part) = update.part {
            person.part = part;
        }
        if let Some(clef) = update.clef {
            person.clef = clef;
        }
        if let Some(dispensed) = update.dispensed {
            person.dispensed = dispensed;
        }

        sort_people(&mut self.people);
        self.get(id)
    }
}

fn sort_people(people: &mut [Person]) {
    people.sort_by_key(|p| p.full_name().to_lowercase());
}
