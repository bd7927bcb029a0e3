use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::CatalogError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Clef {
    #[default]
    #[serde(rename = "TrebleClef", alias = "Treble")]
    Treble,
    #[serde(rename = "BassClef", alias = "Bass")]
    Bass,
    #[serde(rename = "PercussionClef", alias = "Percussion")]
    Percussion,
}

impl Clef {
    pub const ALL: &'static [Clef] = &[Self::Treble, Self::Bass, Self::Percussion];

    pub fn key(self) -> &'static str {
        match self {
            Self::Treble => "TrebleClef",
            Self::Bass => "BassClef",
            Self::Percussion => "PercussionClef",
        }
    }

    /// Short label used in file names (`TC`, `BC`, `Perc`).
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Treble => "TC",
            Self::Bass => "BC",
            Self::Percussion => "Perc",
        }
    }

    pub fn patterns(self) -> &'static [&'static str] {
        match self {
            Self::Treble => &[
                r"\bTC\b",
                r"\bT\.\s?C\.",
                r"Treble\s*Clef",
                r"Violinschl(?:ü|ue)ssel",
            ],
            Self::Bass => &[
                r"\bBC\b",
                r"\bB\.\s?C\.",
                r"Bass\s*Clef",
                r"Bassschl(?:ü|ue)ssel",
            ],
            Self::Percussion => &[r"\bPerc\b"],
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| {
            c.key().eq_ignore_ascii_case(key)
                || c.display_name().eq_ignore_ascii_case(key)
                || c.key().trim_end_matches("Clef").eq_ignore_ascii_case(key)
        })
    }
}

impl fmt::Display for Clef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Clef {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| CatalogError::UnknownClef(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_legacy_keys() {
        assert_eq!(serde_json::to_string(&Clef::Bass).unwrap(), "\"BassClef\"");
        let clef: Clef = serde_json::from_str("\"PercussionClef\"").unwrap();
        assert_eq!(clef, Clef::Percussion);
    }

    #[test]
    fn from_key_accepts_short_forms() {
        assert_eq!(Clef::from_key("bass"), Some(Clef::Bass));
        assert_eq!(Clef::from_key("TC"), Some(Clef::Treble));
        assert_eq!(Clef::from_key("TrebleClef"), Some(Clef::Treble));
        assert_eq!(Clef::from_key("alto"), None);
    }
}
