//! Instrument / part / clef detection from recognized page text.
//!
//! OCR output is noisy and mixes English and German, so every match is a
//! case-insensitive regex, and parts and clefs are only searched in a small
//! window around the instrument name rather than across the whole page.

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use crate::catalog::{Clef, Instrument, Part};

/// Characters searched on either side of the instrument match.
pub const CONTEXT_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub instrument: Instrument,
    pub parts: Vec<Part>,
    pub clef: Clef,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| RegexBuilder::new(p).case_insensitive(true).build().unwrap())
        .collect()
}

static INSTRUMENT_PATTERNS: LazyLock<Vec<(Instrument, Vec<Regex>)>> = LazyLock::new(|| {
    Instrument::ALL
        .iter()
        .map(|&i| (i, compile(i.patterns())))
        .collect()
});

static PART_PATTERNS: LazyLock<Vec<(Part, Vec<Regex>)>> = LazyLock::new(|| {
    Part::ALL
        .iter()
        .map(|&p| (p, compile(p.patterns())))
        .collect()
});

static CLEF_PATTERNS: LazyLock<Vec<(Clef, Vec<Regex>)>> = LazyLock::new(|| {
    Clef::ALL
        .iter()
        .map(|&c| (c, compile(c.patterns())))
        .collect()
});

fn instrument_patterns(instrument: Instrument) -> &'static [Regex] {
    INSTRUMENT_PATTERNS
        .iter()
        .find(|(i, _)| *i == instrument)
        .map(|(_, regexes)| regexes.as_slice())
        .unwrap_or(&[])
}

/// Detect the instrument named earliest in `text`.
///
/// Each instrument scores the lowest offset any of its patterns matches at.
/// The lowest score wins; on a tie the earlier catalog entry wins, which is
/// why specific variants ("Eb Clarinet") precede generic ones ("Clarinet").
pub fn detect_instrument(text: &str) -> Instrument {
    let mut best: Option<(usize, Instrument)> = None;

    for (instrument, regexes) in INSTRUMENT_PATTERNS.iter() {
        let Some(offset) = regexes.iter().filter_map(|re| re.find(text)).map(|m| m.start()).min() else {
            continue;
        };
        match best {
            Some((best_offset, _)) if offset >= best_offset => {}
            _ => best = Some((offset, *instrument)),
        }
    }

    best.map(|(_, i)| i).unwrap_or(Instrument::Unknown)
}

/// Byte span of the first instrument pattern (in pattern order) that matches.
fn instrument_span(text: &str, instrument: Instrument) -> Option<Range<usize>> {
    instrument_patterns(instrument)
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| m.range())
}

/// Widen `span` by `radius` characters on each side, staying on char boundaries.
fn context_window(text: &str, span: Range<usize>, radius: usize) -> &str {
    let start = if radius == 0 {
        span.start
    } else {
        text[..span.start]
            .char_indices()
            .rev()
            .nth(radius - 1)
            .map(|(i, _)| i)
            .unwrap_or(0)
    };
    let end = text[span.end..]
        .char_indices()
        .nth(radius)
        .map(|(i, _)| span.end + i)
        .unwrap_or(text.len());
    &text[start..end]
}

/// Detect the part numbers printed next to the instrument name.
///
/// A page may carry several ("1st & 2nd"); they come back in catalog order.
/// A bare digit that is part of a "Part N" label is not also read as 1st..4th.
pub fn detect_parts(text: &str, instrument: Instrument) -> Vec<Part> {
    let Some(span) = instrument_span(text, instrument) else {
        return Vec::new();
    };
    let window = context_window(text, span, CONTEXT_CHARS);

    // Spans taken by "Part N" labels
    let numbered: Vec<Range<usize>> = PART_PATTERNS
        .iter()
        .filter(|(p, _)| p.index() >= Part::Part1.index())
        .flat_map(|(_, regexes)| regexes.iter().flat_map(|re| re.find_iter(window)))
        .map(|m| m.range())
        .collect();

    PART_PATTERNS
        .iter()
        .filter(|(part, regexes)| {
            let is_numbered = part.index() >= Part::Part1.index();
            regexes.iter().any(|re| {
                re.find_iter(window).any(|m| {
                    is_numbered
                        || !numbered
                            .iter()
                            .any(|n| n.start <= m.start() && m.end() <= n.end)
                })
            })
        })
        .map(|(part, _)| *part)
        .collect()
}

/// Clef forced by the instrument itself, regardless of page text.
fn fixed_clef(instrument: Instrument) -> Option<Clef> {
    match instrument {
        Instrument::StringBass
        | Instrument::Timpani
        | Instrument::BassDrum
        | Instrument::Bassoon
        | Instrument::TromboneC
        | Instrument::BassTromboneC
        | Instrument::EuphoniumC
        | Instrument::TenorHornC
        | Instrument::BaritoneHornC
        | Instrument::BassC => Some(Clef::Bass),
        Instrument::Percussion
        | Instrument::DrumSet
        | Instrument::SnareDrum
        | Instrument::Cymbals
        | Instrument::Triangle => Some(Clef::Percussion),
        _ => None,
    }
}

/// Detect the clef: fixed instrument rules, then labels near the instrument
/// name, then treble.
pub fn detect_clef(text: &str, instrument: Instrument) -> Clef {
    if let Some(clef) = fixed_clef(instrument) {
        return clef;
    }

    let Some(span) = instrument_span(text, instrument) else {
        return Clef::default();
    };
    let window = context_window(text, span, CONTEXT_CHARS);

    CLEF_PATTERNS
        .iter()
        .find(|(_, regexes)| regexes.iter().any(|re| re.is_match(window)))
        .map(|(clef, _)| *clef)
        .unwrap_or_default()
}

/// Run all three detectors over one page of text.
pub fn classify(text: &str) -> Detection {
    let instrument = detect_instrument(text);
    Detection {
        instrument,
        parts: detect_parts(text, instrument),
        clef: detect_clef(text, instrument),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_earliest_instrument() {
        assert_eq!(detect_instrument("Flute\nOboe"), Instrument::Flute);
        assert_eq!(detect_instrument("Score notes ... Oboe\nFlute"), Instrument::Oboe);
        assert_eq!(detect_instrument("no music here"), Instrument::Unknown);
        assert_eq!(detect_instrument(""), Instrument::Unknown);
    }

    #[test]
    fn detection_is_case_insensitive_and_bilingual() {
        assert_eq!(detect_instrument("2. TROMPETE in B"), Instrument::TrumpetBb);
        assert_eq!(detect_instrument("Schlagzeug"), Instrument::DrumSet);
        assert_eq!(detect_instrument("Querflöte"), Instrument::Flute);
    }

    #[test]
    fn tie_goes_to_earlier_catalog_entry() {
        // "Eb Clarinet" and "Clarinet" patterns compete; specific variant wins.
        assert_eq!(detect_instrument("Eb Clarinet"), Instrument::ClarinetEb);
        assert_eq!(detect_instrument("Clarinet in Eb"), Instrument::ClarinetEb);
        assert_eq!(detect_instrument("Clarinet in Bb"), Instrument::ClarinetBb);
        assert_eq!(detect_instrument("Trombone Bb"), Instrument::TromboneBb);
        assert_eq!(detect_instrument("Trombone"), Instrument::TromboneC);
    }

    #[test]
    fn display_name_detects_its_own_instrument() {
        for &instrument in Instrument::ALL {
            assert_eq!(
                detect_instrument(instrument.display_name()),
                instrument,
                "{:?}",
                instrument.display_name()
            );
        }
    }

    #[test]
    fn key_prefix_labels_pick_the_keyed_variant() {
        assert_eq!(detect_instrument("Bb Bass Clarinet"), Instrument::BassClarinetBb);
        assert_eq!(detect_instrument("Bb Bass"), Instrument::BassBb);
        assert_eq!(detect_instrument("C Bass Trombone"), Instrument::BassTromboneC);
        assert_eq!(detect_instrument("C Tenor Horn"), Instrument::TenorHornC);
        assert_eq!(detect_instrument("Tenor Horn"), Instrument::TenorHornBb);

        let trombone = classify("2nd Bb Trombone");
        assert_eq!(trombone.instrument, Instrument::TromboneBb);
        assert_eq!(trombone.parts, vec![Part::Second]);
        assert_eq!(trombone.clef, Clef::Treble);
    }

    #[test]
    fn detects_part_next_to_instrument() {
        assert_eq!(detect_parts("2nd Trumpet", Instrument::TrumpetBb), vec![Part::Second]);
        assert_eq!(
            detect_parts("Trumpet 1st & 2nd", Instrument::TrumpetBb),
            vec![Part::First, Part::Second]
        );
        // OCR misread of "1st"
        assert_eq!(detect_parts("Ist Cornet", Instrument::CornetBb), vec![Part::First]);
    }

    #[test]
    fn part_outside_window_is_ignored() {
        let text = "Trumpet                                  measure 3";
        assert!(detect_parts(text, Instrument::TrumpetBb).is_empty());
    }

    #[test]
    fn numbered_part_label_is_not_read_twice() {
        assert_eq!(detect_parts("Flute Part 1", Instrument::Flute), vec![Part::Part1]);
        assert_eq!(
            detect_parts("1 Flute Part 2", Instrument::Flute),
            vec![Part::First, Part::Part2]
        );
    }

    #[test]
    fn parts_empty_when_instrument_absent() {
        assert!(detect_parts("1st Flute", Instrument::Oboe).is_empty());
    }

    #[test]
    fn window_clamps_to_char_boundaries() {
        // Multi-byte characters around the match must not split a code point
        let text = "ääääääääääääääääää Flöte ßßßßßßßßßßßßßß 2";
        assert!(detect_parts(text, Instrument::Flute).is_empty());
        let text = "ä 2 Flöte ß";
        assert_eq!(detect_parts(text, Instrument::Flute), vec![Part::Second]);
    }

    #[test]
    fn context_window_counts_characters() {
        let text = "abcdefXYZghijkl";
        assert_eq!(context_window(text, 6..9, 2), "efXYZgh");
        assert_eq!(context_window(text, 0..3, 10), "abcdefXYZghij");
        assert_eq!(context_window("ééXéé", 4..5, 1), "éXé");
    }

    #[test]
    fn fixed_clef_rules_win() {
        assert_eq!(detect_clef("Tuba TC", Instrument::BassC), Clef::Bass);
        assert_eq!(detect_clef("Snare Drum", Instrument::SnareDrum), Clef::Percussion);
        assert_eq!(detect_clef("Bass Drum", Instrument::BassDrum), Clef::Bass);
    }

    #[test]
    fn clef_from_window_then_default() {
        assert_eq!(detect_clef("Baritone Bb BC", Instrument::BaritoneHornBb), Clef::Bass);
        assert_eq!(detect_clef("Baritone Bb T.C.", Instrument::BaritoneHornBb), Clef::Treble);
        assert_eq!(detect_clef("Baritone Bb", Instrument::BaritoneHornBb), Clef::Treble);
        assert_eq!(detect_clef("nothing", Instrument::Flute), Clef::Treble);
    }

    #[test]
    fn classify_chains_detectors() {
        let detection = classify("Concert March\n2nd Bb Trumpet\nAllegro");
        assert_eq!(detection.instrument, Instrument::TrumpetBb);
        assert_eq!(detection.parts, vec![Part::Second]);
        assert_eq!(detection.clef, Clef::Treble);

        let unknown = classify("");
        assert_eq!(unknown.instrument, Instrument::Unknown);
        assert!(unknown.parts.is_empty());
        assert_eq!(unknown.clef, Clef::Treble);
    }

    #[test]
    fn every_pattern_compiles() {
        assert_eq!(INSTRUMENT_PATTERNS.len(), Instrument::ALL.len());
        assert_eq!(PART_PATTERNS.len(), Part::ALL.len());
        assert_eq!(CLEF_PATTERNS.len(), Clef::ALL.len());
    }

    #[test]
    fn part_next_to_instrument_is_always_found() {
        for &instrument in &[Instrument::Flute, Instrument::TrumpetBb, Instrument::HornF] {
            let name = instrument.display_name();
            for &part in &[Part::First, Part::Second, Part::Third, Part::Fourth] {
                let text = format!("{} {}", part.display_name(), name);
                assert!(
                    detect_parts(&text, instrument).contains(&part),
                    "{text} should contain {part}"
                );
            }
        }
    }
}
