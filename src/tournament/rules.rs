//! Rule Variants
//!
//! A variant is a named defeat table: each move lists the moves it beats.
//! Moves are matched after capitalization (`rock`, `ROCK` -> `Rock`).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ArenaError, ArenaResult};

/// Name of the default five-move variant.
pub const FIRE_WELL: &str = "Rock, Paper, Scissors, Fire, Well";
/// Name of the Lizard/Spock variant.
pub const LIZARD_SPOCK: &str = "Rock, Paper, Scissors, Lizard, Spock";
/// Name of the Fire/Water variant.
pub const FIRE_WATER: &str = "Rock, Paper, Scissors, Fire, Water";

/// A validated move within a variant.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Move(String);

impl Move {
    /// Move name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of comparing two moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// First move defeats the second.
    FirstWins,
    /// Second move defeats the first.
    SecondWins,
    /// Neither move defeats the other.
    Tie,
}

/// Capitalize the first character, lowercase the rest.
pub fn normalize_move(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// A named rule set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Display name; votes must match it exactly.
    pub name: String,
    /// move -> moves it defeats.
    pub defeats: BTreeMap<String, Vec<String>>,
}

impl Variant {
    /// Build a variant from `(move, beats)` rows.
    pub fn new(name: &str, rows: &[(&str, &[&str])]) -> Self {
        let defeats = rows
            .iter()
            .map(|(mv, beats)| {
                (
                    mv.to_string(),
                    beats.iter().map(|b| b.to_string()).collect(),
                )
            })
            .collect();
        Self {
            name: name.to_string(),
            defeats,
        }
    }

    /// Check table consistency.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("variant name is empty".into());
        }
        if self.defeats.len() < 2 {
            return Err(format!("variant {:?} needs at least two moves", self.name));
        }
        for (mv, beaten) in &self.defeats {
            if normalize_move(mv) != *mv {
                return Err(format!("move {:?} is not capitalized", mv));
            }
            for other in beaten {
                if other == mv {
                    return Err(format!("move {:?} defeats itself", mv));
                }
                if !self.defeats.contains_key(other) {
                    return Err(format!("move {:?} defeats unknown move {:?}", mv, other));
                }
                if self.defeats[other].contains(mv) {
                    return Err(format!("moves {:?} and {:?} defeat each other", mv, other));
                }
            }
        }
        Ok(())
    }

    /// Normalize `raw` and check it is part of this variant.
    pub fn parse_move(&self, raw: &str) -> ArenaResult<Move> {
        let normalized = normalize_move(raw);
        if self.defeats.contains_key(&normalized) {
            Ok(Move(normalized))
        } else {
            Err(ArenaError::InvalidMove(normalized))
        }
    }

    /// Moves in table order.
    pub fn moves(&self) -> impl Iterator<Item = &str> {
        self.defeats.keys().map(String::as_str)
    }

    /// Whether `a` is listed as defeating `b`.
    pub fn beats(&self, a: &Move, b: &Move) -> bool {
        self.defeats
            .get(a.as_str())
            .map(|beaten| beaten.iter().any(|m| m == b.as_str()))
            .unwrap_or(false)
    }

    /// Compare `first` against `second`.
    pub fn adjudicate(&self, first: &Move, second: &Move) -> Outcome {
        if self.beats(first, second) {
            Outcome::FirstWins
        } else if self.beats(second, first) {
            Outcome::SecondWins
        } else {
            Outcome::Tie
        }
    }

    /// Human-readable rules listing, one line per move.
    pub fn rules_text(&self) -> String {
        self.defeats
            .iter()
            .map(|(mv, beaten)| format!("{} defeats {}", mv, beaten.join(" and ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The three variants offered when no variants file is configured.
pub fn builtin_variants() -> Vec<Variant> {
    vec![
        Variant::new(
            FIRE_WELL,
            &[
                ("Rock", &["Scissors", "Fire"]),
                ("Paper", &["Rock", "Well"]),
                ("Scissors", &["Paper", "Fire"]),
                ("Fire", &["Paper", "Well"]),
                ("Well", &["Rock", "Scissors"]),
            ],
        ),
        Variant::new(
            LIZARD_SPOCK,
            &[
                ("Scissors", &["Paper", "Lizard"]),
                ("Paper", &["Rock", "Spock"]),
                ("Rock", &["Lizard", "Scissors"]),
                ("Lizard", &["Spock", "Paper"]),
                ("Spock", &["Scissors", "Rock"]),
            ],
        ),
        Variant::new(
            FIRE_WATER,
            &[
                ("Rock", &["Scissors", "Fire"]),
                ("Paper", &["Rock", "Water"]),
                ("Scissors", &["Paper", "Water"]),
                ("Fire", &["Paper", "Scissors"]),
                ("Water", &["Fire", "Rock"]),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fire_well() -> Variant {
        builtin_variants().remove(0)
    }

    #[test]
    fn test_builtin_variants_validate() {
        for variant in builtin_variants() {
            assert!(variant.validate().is_ok(), "{} invalid", variant.name);
        }
    }

    #[test]
    fn test_normalize_move() {
        assert_eq!(normalize_move("rock"), "Rock");
        assert_eq!(normalize_move("SCISSORS"), "Scissors");
        assert_eq!(normalize_move("  spock "), "Spock");
        assert_eq!(normalize_move(""), "");
    }

    #[test]
    fn test_parse_move() {
        let variant = fire_well();
        assert_eq!(variant.parse_move("well").unwrap().as_str(), "Well");
        assert_eq!(
            variant.parse_move("lizard"),
            Err(ArenaError::InvalidMove("Lizard".into()))
        );
    }

    #[test]
    fn test_rock_beats_scissors() {
        let variant = fire_well();
        let rock = variant.parse_move("Rock").unwrap();
        let scissors = variant.parse_move("Scissors").unwrap();

        assert_eq!(variant.adjudicate(&rock, &scissors), Outcome::FirstWins);
        assert_eq!(variant.adjudicate(&scissors, &rock), Outcome::SecondWins);
        assert_eq!(variant.adjudicate(&rock, &rock), Outcome::Tie);
    }

    #[test]
    fn test_every_distinct_pair_decided_in_builtins() {
        for variant in builtin_variants() {
            let moves: Vec<Move> = variant
                .moves()
                .map(|m| variant.parse_move(m).unwrap())
                .collect();
            for a in &moves {
                for b in &moves {
                    let outcome = variant.adjudicate(a, b);
                    if a == b {
                        assert_eq!(outcome, Outcome::Tie);
                    } else {
                        assert_ne!(outcome, Outcome::Tie, "{} vs {} in {}", a, b, variant.name);
                    }
                }
            }
        }
    }

    #[test]
    fn test_validate_rejects_bad_tables() {
        let unknown = Variant::new("bad", &[("Rock", &["Banana"]), ("Paper", &["Rock"])]);
        assert!(unknown.validate().is_err());

        let mutual = Variant::new("bad", &[("Rock", &["Paper"]), ("Paper", &["Rock"])]);
        assert!(mutual.validate().is_err());

        let tiny = Variant::new("bad", &[("Rock", &[])]);
        assert!(tiny.validate().is_err());
    }

    #[test]
    fn test_rules_text() {
        let text = fire_well().rules_text();
        assert!(text.contains("Rock defeats Scissors and Fire"));
        assert_eq!(text.lines().count(), 5);
    }
}
