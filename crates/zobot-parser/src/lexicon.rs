//! Word-list tokenizer
//!
//! A deterministic stand-in for the parser service: known words and phrases
//! become entities, numbers become number or range beads, configured filler
//! words become fluff, punctuation is split off, everything else is a token.

use std::collections::{HashMap, HashSet};
use zobot_domain::{Bead, BeadParser, Entity, EntityId, ParseError, RangeBead};

const PUNCTUATION: &[char] = &[',', '.', '!', '?', ';', ':'];

#[derive(Debug, Clone)]
struct LexiconEntry {
    entity: Entity,
    // an adjacent number is folded into an entity-range bead
    valued: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Word { raw: String, lower: String },
    Punct(String),
}

/// Lexicon-driven parser
///
/// # Examples
///
/// ```
/// use zobot_domain::{Bead, BeadParser, EntityId};
/// use zobot_parser::LexiconParser;
///
/// let parser = LexiconParser::new()
///     .with_entity("yes", EntityId::new(1, 105, "YES"))
///     .with_entity("sore throat", EntityId::new(2, 1, "SORE_THROAT"));
///
/// let beads = parser.parse("Yes, a sore throat").unwrap();
/// assert!(beads[0].mentions(&EntityId::new(1, 105, "YES")));
/// assert_eq!(beads[1], Bead::punct(","));
/// assert!(beads[3].mentions(&EntityId::new(2, 1, "SORE_THROAT")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct LexiconParser {
    entries: HashMap<String, LexiconEntry>,
    fluff: HashSet<String>,
    longest_phrase: usize,
}

impl LexiconParser {
    /// Create an empty lexicon
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a word or phrase to an entity
    pub fn with_entity(self, phrase: &str, id: EntityId) -> Self {
        self.insert(phrase, id, false)
    }

    /// Map a word or phrase to an entity that absorbs an adjacent number
    ///
    /// "temperature 101" then parses as one entity-range bead.
    pub fn with_valued_entity(self, phrase: &str, id: EntityId) -> Self {
        self.insert(phrase, id, true)
    }

    /// Words to report as fluff
    pub fn with_fluff<'a>(mut self, words: impl IntoIterator<Item = &'a str>) -> Self {
        self.fluff
            .extend(words.into_iter().map(|w| w.to_lowercase()));
        self
    }

    fn insert(mut self, phrase: &str, id: EntityId, valued: bool) -> Self {
        let key = normalize(phrase);
        self.longest_phrase = self.longest_phrase.max(key.split(' ').count());
        let entity = Entity::new(id).with_name(phrase);
        self.entries.insert(key, LexiconEntry { entity, valued });
        self
    }

    fn lookup_phrase(&self, pieces: &[Piece], start: usize) -> Option<(usize, &LexiconEntry)> {
        let mut words = Vec::new();
        for piece in pieces.iter().skip(start).take(self.longest_phrase) {
            match piece {
                Piece::Word { lower, .. } => words.push(lower.as_str()),
                Piece::Punct(_) => break,
            }
        }

        (1..=words.len())
            .rev()
            .find_map(|len| self.entries.get(&words[..len].join(" ")).map(|e| (len, e)))
    }
}

impl BeadParser for LexiconParser {
    fn parse(&self, text: &str) -> Result<Vec<Bead>, ParseError> {
        let pieces = split_pieces(text);
        let mut beads = Vec::with_capacity(pieces.len());
        let mut pos = 0;

        while pos < pieces.len() {
            match &pieces[pos] {
                Piece::Punct(p) => {
                    beads.push(Bead::punct(p.clone()));
                    pos += 1;
                }
                Piece::Word { raw, lower } => {
                    if let Some((len, entry)) = self.lookup_phrase(&pieces, pos) {
                        pos += len;
                        let range = match pieces.get(pos) {
                            Some(Piece::Word { lower, .. }) if entry.valued => numeric(lower),
                            _ => None,
                        };
                        match range {
                            Some(range) => {
                                pos += 1;
                                beads.push(Bead::Erc {
                                    ent: entry.entity.clone(),
                                    range,
                                });
                            }
                            None => beads.push(Bead::Entity(entry.entity.clone())),
                        }
                        continue;
                    }

                    let bead = match numeric(lower) {
                        Some(range) if range.lo == range.hi => Bead::number(range.lo.unwrap_or_default()),
                        Some(range) => Bead::Range(range),
                        None if self.fluff.contains(lower) => Bead::Fluff { value: raw.clone() },
                        None => Bead::token(raw.clone()),
                    };
                    beads.push(bead);
                    pos += 1;
                }
            }
        }

        Ok(beads)
    }
}

fn normalize(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn split_pieces(text: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    for raw in text.split_whitespace() {
        let core = raw.trim_matches(PUNCTUATION);
        let lead = &raw[..raw.len() - raw.trim_start_matches(PUNCTUATION).len()];
        let trail = &raw[raw.trim_end_matches(PUNCTUATION).len()..];

        pieces.extend(lead.chars().map(|c| Piece::Punct(c.to_string())));
        if !core.is_empty() {
            pieces.push(Piece::Word {
                raw: core.to_string(),
                lower: core.to_lowercase(),
            });
        }
        if !core.is_empty() || lead.is_empty() {
            pieces.extend(trail.chars().map(|c| Piece::Punct(c.to_string())));
        }
    }
    pieces
}

/// "101" is a degenerate range, "99-101" a proper one
fn numeric(word: &str) -> Option<RangeBead> {
    if let Ok(n) = word.parse::<f64>() {
        return Some(RangeBead::new(Some(n), Some(n)));
    }
    let (lo, hi) = word.split_once('-')?;
    let lo = lo.parse::<f64>().ok()?;
    let hi = hi.parse::<f64>().ok()?;
    let (lo, hi) = RangeBead::new(Some(lo), Some(hi)).ordered();
    Some(RangeBead::new(lo, hi))
}
