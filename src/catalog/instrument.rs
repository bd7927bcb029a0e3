use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::CatalogError;

/// Instrument family, used to route percussion through its own distribution layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Wind,
    Brass,
    Percussion,
    Strings,
    Keys,
    Conductor,
    Unknown,
}

/// Every instrument the library knows about.
///
/// Variant names are the persisted keys (people.json, PDF metadata), so renaming
/// a variant breaks existing libraries. Declaration order is the catalog order:
/// it drives distribution folder numbering and breaks detection ties, so the
/// specific variants of a family (e.g. `TromboneBb`) come before the generic one
/// that shares their leading word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Instrument {
    Unknown,
    Conductor,
    Piccolo,
    Flute,
    Oboe,
    Bassoon,
    ClarinetEb,
    ClarinetBb,
    AltoClarinetEb,
    BassClarinetBb,
    AltoSaxophoneEb,
    TenorSaxophoneBb,
    BaritoneSaxophoneEb,
    CornetEb,
    CornetBb,
    TrumpetBb,
    FlugelhornBb,
    HornEb,
    HornF,
    TenorHornC,
    TenorHornBb,
    BaritoneHornC,
    BaritoneHornBb,
    TromboneBb,
    BassTromboneC,
    TromboneC,
    EuphoniumC,
    EuphoniumBb,
    BassEb,
    BassBb,
    BassC,
    StringBass,
    Piano,
    Timpani,
    Mallets,
    DrumSet,
    SnareDrum,
    BassDrum,
    Cymbals,
    Triangle,
    Percussion,
}

impl Instrument {
    /// All instruments in catalog order.
    pub const ALL: &'static [Instrument] = &[
        Self::Unknown,
        Self::Conductor,
        Self::Piccolo,
        Self::Flute,
        Self::Oboe,
        Self::Bassoon,
        Self::ClarinetEb,
        Self::ClarinetBb,
        Self::AltoClarinetEb,
        Self::BassClarinetBb,
        Self::AltoSaxophoneEb,
        Self::TenorSaxophoneBb,
        Self::BaritoneSaxophoneEb,
        Self::CornetEb,
        Self::CornetBb,
        Self::TrumpetBb,
        Self::FlugelhornBb,
        Self::HornEb,
        Self::HornF,
        Self::TenorHornC,
        Self::TenorHornBb,
        Self::BaritoneHornC,
        Self::BaritoneHornBb,
        Self::TromboneBb,
        Self::BassTromboneC,
        Self::TromboneC,
        Self::EuphoniumC,
        Self::EuphoniumBb,
        Self::BassEb,
        Self::BassBb,
        Self::BassC,
        Self::StringBass,
        Self::Piano,
        Self::Timpani,
        Self::Mallets,
        Self::DrumSet,
        Self::SnareDrum,
        Self::BassDrum,
        Self::Cymbals,
        Self::Triangle,
        Self::Percussion,
    ];

    /// Persisted key (identical to the variant name).
    pub fn key(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Conductor => "Conductor",
            Self::Piccolo => "Piccolo",
            Self::Flute => "Flute",
            Self::Oboe => "Oboe",
            Self::Bassoon => "Bassoon",
            Self::ClarinetEb => "ClarinetEb",
            Self::ClarinetBb => "ClarinetBb",
            Self::AltoClarinetEb => "AltoClarinetEb",
            Self::BassClarinetBb => "BassClarinetBb",
            Self::AltoSaxophoneEb => "AltoSaxophoneEb",
            Self::TenorSaxophoneBb => "TenorSaxophoneBb",
            Self::BaritoneSaxophoneEb => "BaritoneSaxophoneEb",
            Self::CornetEb => "CornetEb",
            Self::CornetBb => "CornetBb",
            Self::TrumpetBb => "TrumpetBb",
            Self::FlugelhornBb => "FlugelhornBb",
            Self::HornEb => "HornEb",
            Self::HornF => "HornF",
            Self::TenorHornC => "TenorHornC",
            Self::TenorHornBb => "TenorHornBb",
            Self::BaritoneHornC => "BaritoneHornC",
            Self::BaritoneHornBb => "BaritoneHornBb",
            Self::TromboneBb => "TromboneBb",
            Self::BassTromboneC => "BassTromboneC",
            Self::TromboneC => "TromboneC",
            Self::EuphoniumC => "EuphoniumC",
            Self::EuphoniumBb => "EuphoniumBb",
            Self::BassEb => "BassEb",
            Self::BassBb => "BassBb",
            Self::BassC => "BassC",
            Self::StringBass => "StringBass",
            Self::Piano => "Piano",
            Self::Timpani => "Timpani",
            Self::Mallets => "Mallets",
            Self::DrumSet => "DrumSet",
            Self::SnareDrum => "SnareDrum",
            Self::BassDrum => "BassDrum",
            Self::Cymbals => "Cymbals",
            Self::Triangle => "Triangle",
            Self::Percussion => "Percussion",
        }
    }

    /// Human-readable name used in file and folder names.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Conductor => "Conductor",
            Self::Piccolo => "Piccolo",
            Self::Flute => "Flute",
            Self::Oboe => "Oboe",
            Self::Bassoon => "Bassoon",
            Self::ClarinetEb => "Eb Clarinet",
            Self::ClarinetBb => "Bb Clarinet",
            Self::AltoClarinetEb => "Eb Alto Clarinet",
            Self::BassClarinetBb => "Bb Bass Clarinet",
            Self::AltoSaxophoneEb => "Eb Alto Saxophone",
            Self::TenorSaxophoneBb => "Bb Tenor Saxophone",
            Self::BaritoneSaxophoneEb => "Eb Baritone Saxophone",
            Self::CornetEb => "Eb Cornet",
            Self::CornetBb => "Bb Cornet",
            Self::TrumpetBb => "Bb Trumpet",
            Self::FlugelhornBb => "Bb Flugelhorn",
            Self::HornEb => "Eb Horn",
            Self::HornF => "F Horn",
            Self::TenorHornC => "C Tenor Horn",
            Self::TenorHornBb => "Bb Tenor Horn",
            Self::BaritoneHornC => "C Baritone",
            Self::BaritoneHornBb => "Bb Baritone",
            Self::TromboneBb => "Bb Trombone",
            Self::BassTromboneC => "C Bass Trombone",
            Self::TromboneC => "C Trombone",
            Self::EuphoniumC => "C Euphonium",
            Self::EuphoniumBb => "Bb Euphonium",
            Self::BassEb => "Eb Bass",
            Self::BassBb => "Bb Bass",
            Self::BassC => "C Bass",
            Self::StringBass => "String Bass",
            Self::Piano => "Piano",
            Self::Timpani => "Timpani",
            Self::Mallets => "Mallets",
            Self::DrumSet => "Drum Set",
            Self::SnareDrum => "Snare Drum",
            Self::BassDrum => "Bass Drum",
            Self::Cymbals => "Cymbals",
            Self::Triangle => "Triangle",
            Self::Percussion => "Percussion",
        }
    }

    pub fn category(self) -> Category {
        match self {
            Self::Unknown => Category::Unknown,
            Self::Conductor => Category::Conductor,
            Self::Piccolo
            | Self::Flute
            | Self::Oboe
            | Self::Bassoon
            | Self::ClarinetEb
            | Self::ClarinetBb
            | Self::AltoClarinetEb
            | Self::BassClarinetBb
            | Self::AltoSaxophoneEb
            | Self::TenorSaxophoneBb
            | Self::BaritoneSaxophoneEb => Category::Wind,
            Self::CornetEb
            | Self::CornetBb
            | Self::TrumpetBb
            | Self::FlugelhornBb
            | Self::HornEb
            | Self::HornF
            | Self::TenorHornC
            | Self::TenorHornBb
            | Self::BaritoneHornC
            | Self::BaritoneHornBb
            | Self::TromboneBb
            | Self::BassTromboneC
            | Self::TromboneC
            | Self::EuphoniumC
            | Self::EuphoniumBb
            | Self::BassEb
            | Self::BassBb
            | Self::BassC => Category::Brass,
            Self::StringBass => Category::Strings,
            Self::Piano => Category::Keys,
            Self::Timpani
            | Self::Mallets
            | Self::DrumSet
            | Self::SnareDrum
            | Self::BassDrum
            | Self::Cymbals
            | Self::Triangle
            | Self::Percussion => Category::Percussion,
        }
    }

    /// Case-insensitive regex patterns recognizing this instrument in OCR text.
    /// English and German spellings appear side by side on printed parts.
    pub fn patterns(self) -> &'static [&'static str] {
        match self {
            Self::Unknown => &[],
            Self::Conductor => &[r"Conductor", r"Full\s*Score", r"Direktion", r"Partitur"],
            Self::Piccolo => &[r"Piccolo", r"Pikkolo"],
            Self::Flute => &[r"Flute", r"Fl(?:ö|oe)te"],
            Self::Oboe => &[r"Oboe", r"Hautbois"],
            Self::Bassoon => &[r"Bassoon", r"Fagott"],
            Self::ClarinetEb => &[
                r"\b(?:Eb|E♭|Es)[\s-]*Clarinet",
                r"Clarinet\s*(?:in\s*)?(?:Eb\b|E♭|Es\b)",
                r"\bEs[\s-]*Klarinette",
            ],
            Self::ClarinetBb => &[r"Clarinet", r"Klarinette"],
            Self::AltoClarinetEb => &[r"Alto?\s*Clarinet", r"Altklarinette"],
            Self::BassClarinetBb => &[
                r"\b(?:Bb|B♭)[\s-]*Bass\s*Clarinet",
                r"Bass\s*Clarinet",
                r"Bassklarinette",
            ],
            Self::AltoSaxophoneEb => &[r"Alto?[\s-]*Sax"],
            Self::TenorSaxophoneBb => &[r"Tenor[\s-]*Sax"],
            Self::BaritoneSaxophoneEb => &[r"Baritone?[\s-]*Sax"],
            Self::CornetEb => &[
                r"\b(?:Eb|E♭|Es)[\s-]*Corn?ett?",
                r"Corn?ett?\s*(?:in\s*)?(?:Eb\b|E♭|Es\b)",
                r"Soprano\s*Cornet",
            ],
            Self::CornetBb => &[r"Cornet", r"Kornett"],
            Self::TrumpetBb => &[r"Trumpet", r"Trompete"],
            Self::FlugelhornBb => &[r"Fl(?:u|ü|ue)gelhorn"],
            Self::HornEb => &[r"Horn\s*(?:in\s*)?(?:Eb\b|E♭|Es\b)", r"\b(?:Eb|E♭|Es)[\s-]*Horn"],
            Self::HornF => &[r"Horn\b", r"Cor\b"],
            Self::TenorHornC => &[r"Tenor\s*horn\s*(?:in\s*)?C\b", r"\bC[\s-]*Tenor\s*horn"],
            Self::TenorHornBb => &[r"Tenor\s*horn"],
            Self::BaritoneHornC => &[r"Baritone?\s*(?:in\s*)?C\b", r"\bC[\s-]*Baritone?\b"],
            Self::BaritoneHornBb => &[r"Baritone?"],
            Self::TromboneBb => &[
                r"(?:Trombone|Posaune)\s*(?:in\s*)?(?:Bb|B♭|B\b)",
                r"\b(?:Bb|B♭)[\s-]*(?:Trombone|Posaune)",
            ],
            Self::BassTromboneC => &[r"Bass\s*Trombone", r"\bC[\s-]*Bass\s*Trombone", r"Bassposaune"],
            Self::TromboneC => &[r"Trombone", r"Posaune"],
            Self::EuphoniumC => &[r"Euphonium\s*(?:in\s*)?C\b", r"\bC[\s-]*Euphoni(?:um|on)"],
            Self::EuphoniumBb => &[r"Euphoni(?:um|on)"],
            Self::BassEb => &[r"\b(?:Eb|E♭|Es)[\s-]*Bass\b", r"Bass\s*(?:in\s*)?(?:Eb\b|E♭|Es\b)"],
            Self::BassBb => &[r"\b(?:Bb|B♭)[\s-]*Bass\b", r"Bass\s*(?:in\s*)?(?:Bb|B♭|B)\b"],
            Self::BassC => &[r"Bass\s*(?:in\s*)?C\b", r"\bC[\s-]*Bass\b", r"Tuba"],
            Self::StringBass => &[r"String\s*Bass", r"Double\s*Bass", r"Kontrabass", r"Contrabass"],
            Self::Piano => &[r"Piano", r"Klavier"],
            Self::Timpani => &[r"Timpani", r"Pauken"],
            Self::Mallets => &[
                r"Mallets",
                r"Glockenspiel",
                r"Xylophone?",
                r"Vibraphone?",
                r"Marimba",
            ],
            Self::DrumSet => &[r"Drum\s*Set", r"Drums\b", r"Schlagzeug"],
            Self::SnareDrum => &[r"Snare", r"Kleine\s*Trommel"],
            Self::BassDrum => &[r"Bass\s*Drum", r"Gro(?:ss|ß)e\s*Trommel"],
            Self::Cymbals => &[r"Cymbals?", r"Becken"],
            Self::Triangle => &[r"Triangle", r"Triangel"],
            Self::Percussion => &[r"Percussion", r"Perkussion"],
        }
    }

    /// Position in the catalog, used for ordering and folder numbering.
    pub fn index(self) -> usize {
        Self::ALL.iter().position(|&i| i == self).unwrap_or(0)
    }

    /// Distribution folder label, e.g. `"15 Bb Trumpet"`.
    pub fn folder_label(self) -> String {
        format!("{:02} {}", self.index(), self.display_name())
    }

    pub fn is_percussion(self) -> bool {
        self.category() == Category::Percussion
    }

    /// Look up by key or display name, ignoring case and spaces.
    pub fn from_key(key: &str) -> Option<Self> {
        let wanted = normalize(key);
        Self::ALL.iter().copied().find(|i| {
            normalize(i.key()) == wanted || normalize(i.display_name()) == wanted
        })
    }

    /// Built-in substitute chain, in priority order.
    pub(crate) fn builtin_fallbacks(self) -> &'static [Instrument] {
        match self {
            Self::Piccolo => &[Self::Flute],
            Self::Flute => &[Self::Oboe],
            Self::Oboe => &[Self::Flute],
            Self::Bassoon => &[Self::BaritoneHornC, Self::EuphoniumC, Self::TromboneC],
            Self::ClarinetEb => &[Self::CornetEb],
            Self::ClarinetBb => &[Self::CornetBb, Self::TrumpetBb],
            Self::AltoClarinetEb => &[Self::AltoSaxophoneEb],
            Self::BassClarinetBb => &[Self::TenorSaxophoneBb, Self::BaritoneHornBb, Self::EuphoniumBb],
            Self::AltoSaxophoneEb => &[Self::AltoClarinetEb, Self::HornEb],
            Self::TenorSaxophoneBb => &[Self::BaritoneHornBb, Self::EuphoniumBb, Self::TenorHornBb],
            Self::BaritoneSaxophoneEb => &[Self::BassEb],
            Self::CornetEb => &[Self::ClarinetEb],
            Self::CornetBb => &[Self::TrumpetBb, Self::FlugelhornBb],
            Self::TrumpetBb => &[Self::CornetBb, Self::FlugelhornBb],
            Self::FlugelhornBb => &[Self::CornetBb, Self::TrumpetBb],
            Self::HornEb => &[Self::AltoSaxophoneEb],
            Self::TenorHornC => &[Self::BaritoneHornC, Self::EuphoniumC, Self::TromboneC],
            Self::TenorHornBb => &[Self::BaritoneHornBb, Self::EuphoniumBb],
            Self::BaritoneHornC => &[Self::EuphoniumC, Self::TromboneC, Self::Bassoon],
            Self::BaritoneHornBb => &[Self::EuphoniumBb, Self::TenorHornBb, Self::TromboneBb],
            Self::TromboneBb => &[Self::BaritoneHornBb, Self::EuphoniumBb],
            Self::BassTromboneC => &[Self::TromboneC, Self::BassC],
            Self::TromboneC => &[Self::BaritoneHornC, Self::EuphoniumC],
            Self::EuphoniumC => &[Self::BaritoneHornC, Self::TromboneC, Self::Bassoon],
            Self::EuphoniumBb => &[Self::BaritoneHornBb, Self::TenorHornBb, Self::TromboneBb],
            Self::BassEb => &[Self::BaritoneSaxophoneEb],
            Self::BassC => &[Self::StringBass, Self::BassTromboneC],
            Self::StringBass => &[Self::BassC],
            _ => &[],
        }
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Instrument {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| CatalogError::UnknownInstrument(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_lists_every_variant_once() {
        for (i, instrument) in Instrument::ALL.iter().enumerate() {
            assert_eq!(instrument.index(), i);
        }
        assert_eq!(Instrument::ALL.first(), Some(&Instrument::Unknown));
    }

    #[test]
    fn key_matches_serde_name() {
        for instrument in Instrument::ALL {
            let json = serde_json::to_string(instrument).unwrap();
            assert_eq!(json, format!("\"{}\"", instrument.key()));
        }
    }

    #[test]
    fn from_key_accepts_display_names() {
        assert_eq!(Instrument::from_key("TrumpetBb"), Some(Instrument::TrumpetBb));
        assert_eq!(Instrument::from_key("bb trumpet"), Some(Instrument::TrumpetBb));
        assert_eq!(Instrument::from_key("Drum Set"), Some(Instrument::DrumSet));
        assert_eq!(Instrument::from_key("kazoo"), None);
        assert!("kazoo".parse::<Instrument>().is_err());
    }

    #[test]
    fn percussion_category() {
        assert!(Instrument::Timpani.is_percussion());
        assert!(Instrument::DrumSet.is_percussion());
        assert!(!Instrument::Piano.is_percussion());
        assert_eq!(Instrument::StringBass.category(), Category::Strings);
    }

    #[test]
    fn folder_label_is_zero_padded() {
        assert_eq!(Instrument::Flute.folder_label(), "03 Flute");
    }

    #[test]
    fn fallbacks_never_include_self() {
        for instrument in Instrument::ALL {
            assert!(!instrument.builtin_fallbacks().contains(instrument));
        }
    }
}
