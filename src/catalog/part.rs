use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::CatalogError;

/// A part (voice) number printed on an instrument's sheet.
///
/// Declaration order is the rank: a lower index is a higher part. The numbered
/// "Part N" parts of flexible arrangements rank below 1st..4th.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Part {
    First,
    Second,
    Third,
    Fourth,
    Part1,
    Part2,
    Part3,
    Part4,
    Part5,
}

impl Part {
    pub const ALL: &'static [Part] = &[
        Self::First,
        Self::Second,
        Self::Third,
        Self::Fourth,
        Self::Part1,
        Self::Part2,
        Self::Part3,
        Self::Part4,
        Self::Part5,
    ];

    /// The lowest-ranked part. Its descent sequence covers every part, which is
    /// what a person without a preferred part walks through.
    pub const LOWEST: Part = Part::Part5;

    pub fn key(self) -> &'static str {
        match self {
            Self::First => "First",
            Self::Second => "Second",
            Self::Third => "Third",
            Self::Fourth => "Fourth",
            Self::Part1 => "Part1",
            Self::Part2 => "Part2",
            Self::Part3 => "Part3",
            Self::Part4 => "Part4",
            Self::Part5 => "Part5",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::First => "1st",
            Self::Second => "2nd",
            Self::Third => "3rd",
            Self::Fourth => "4th",
            Self::Part1 => "Part 1",
            Self::Part2 => "Part 2",
            Self::Part3 => "Part 3",
            Self::Part4 => "Part 4",
            Self::Part5 => "Part 5",
        }
    }

    /// Case-insensitive patterns searched near an instrument name.
    /// `Ist`/`lst` are common OCR misreads of `1st`.
    pub fn patterns(self) -> &'static [&'static str] {
        match self {
            Self::First => &[r"1st", r"\bIst\b", r"\blst\b", r"\b1\b"],
            Self::Second => &[r"2nd", r"\b2\b"],
            Self::Third => &[r"3rd", r"\b3\b"],
            Self::Fourth => &[r"4th", r"\b4\b"],
            Self::Part1 => &[r"Part\s*1\b"],
            Self::Part2 => &[r"Part\s*2\b"],
            Self::Part3 => &[r"Part\s*3\b"],
            Self::Part4 => &[r"Part\s*4\b"],
            Self::Part5 => &[r"Part\s*5\b"],
        }
    }

    /// Rank of the part; 0 is the highest.
    pub fn index(self) -> usize {
        Self::ALL.iter().position(|&p| p == self).unwrap_or(0)
    }

    /// This part followed by every higher-ranked part, nearest first.
    ///
    /// `Third` yields `[Third, Second, First]`: if a 3rd part is missing the
    /// player reads the 2nd, then the 1st.
    pub fn self_and_higher(self) -> Vec<Part> {
        let mut parts = vec![self];
        parts.extend(Self::ALL[..self.index()].iter().rev().copied());
        parts
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let wanted: String = key.chars().filter(|c| !c.is_whitespace()).collect();
        Self::ALL.iter().copied().find(|p| {
            p.key().eq_ignore_ascii_case(&wanted)
                || p.display_name().replace(' ', "").eq_ignore_ascii_case(&wanted)
        })
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Part {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| CatalogError::UnknownPart(s.to_string()))
    }
}

/// Join parts for display and file names: `"1st, 2nd"`.
pub fn join_parts(parts: &[Part]) -> String {
    parts
        .iter()
        .map(|p| p.display_name())
        .collect::<Vec<_>>()
        .join(", ")
}
