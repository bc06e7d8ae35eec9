use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const POCKET_COUNT: usize = 37;
pub const MAX_VALUE: u8 = 36;

/// Ordre des cases sur une roue européenne, en partant du 0 et dans le sens horaire.
pub const WHEEL_ORDER: [u8; POCKET_COUNT] = [
    0, 32, 15, 19, 4, 21, 2, 25, 17, 34, 6, 27, 13, 36, 11, 30, 8, 23, 10, 5, 24, 16, 33, 1, 20,
    14, 31, 9, 22, 18, 29, 7, 28, 12, 35, 3, 26,
];

const RED_NUMBERS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Black,
    Green,
}

impl Color {
    pub fn of(value: u8) -> Color {
        if value == 0 {
            Color::Green
        } else if RED_NUMBERS.contains(&value) {
            Color::Red
        } else {
            Color::Black
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Color::Red => write!(f, "RED"),
            Color::Black => write!(f, "BLACK"),
            Color::Green => write!(f, "GREEN"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pocket {
    pub value: u8,
    pub color: Color,
    pub wheel_index: usize,
}

impl Pocket {
    /// Case à la position `index` de la roue (0..37).
    pub fn at(index: usize) -> Option<Pocket> {
        (index < POCKET_COUNT).then(|| Pocket::at_wrapped(index))
    }

    /// Comme `at`, l'indice étant pris modulo 37.
    pub fn at_wrapped(index: usize) -> Pocket {
        let wheel_index = index % POCKET_COUNT;
        let value = WHEEL_ORDER[wheel_index];
        Pocket {
            value,
            color: Color::of(value),
            wheel_index,
        }
    }

    pub fn of(value: u8) -> Option<Pocket> {
        WHEEL_ORDER
            .iter()
            .position(|&v| v == value)
            .and_then(Pocket::at)
    }
}

pub fn wheel() -> impl Iterator<Item = Pocket> {
    (0..POCKET_COUNT).filter_map(Pocket::at)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dozen {
    First,
    Second,
    Third,
}

impl Dozen {
    pub const ALL: [Dozen; 3] = [Dozen::First, Dozen::Second, Dozen::Third];

    pub fn of(value: u8) -> Option<Dozen> {
        match value {
            1..=12 => Some(Dozen::First),
            13..=24 => Some(Dozen::Second),
            25..=36 => Some(Dozen::Third),
            _ => None,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Dozen::First => 0,
            Dozen::Second => 1,
            Dozen::Third => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dozen::First => "1-12",
            Dozen::Second => "13-24",
            Dozen::Third => "25-36",
        }
    }
}

impl std::fmt::Display for Dozen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    First,
    Second,
    Third,
}

impl Column {
    pub const ALL: [Column; 3] = [Column::First, Column::Second, Column::Third];

    /// Colonne 1 : n ≡ 1 (mod 3), colonne 2 : n ≡ 2, colonne 3 : n ≡ 0. Le 0 n'a pas de colonne.
    pub fn of(value: u8) -> Option<Column> {
        if value == 0 || value > MAX_VALUE {
            return None;
        }
        match value % 3 {
            1 => Some(Column::First),
            2 => Some(Column::Second),
            _ => Some(Column::Third),
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Column::First => 0,
            Column::Second => 1,
            Column::Third => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Column::First => "Col 1",
            Column::Second => "Col 2",
            Column::Third => "Col 3",
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Lose,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Win => write!(f, "win"),
            Outcome::Lose => write!(f, "lose"),
        }
    }
}

impl std::str::FromStr for Outcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "win" | "w" | "gagne" | "g" => Ok(Outcome::Win),
            "lose" | "l" | "perdu" | "p" => Ok(Outcome::Lose),
            other => bail!("Résultat inconnu : '{}' (attendu win/lose)", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub value: u8,
    pub outcome: Option<Outcome>,
    pub ts: u64,
}

impl HistoryEntry {
    pub fn new(value: u8, ts: u64) -> Self {
        Self {
            value,
            outcome: None,
            ts,
        }
    }

    pub fn color(&self) -> Color {
        Color::of(self.value)
    }
}

pub fn validate_value(value: i64) -> Result<u8> {
    if !(0..=MAX_VALUE as i64).contains(&value) {
        bail!("Numéro {} hors limites (0-36)", value);
    }
    Ok(value as u8)
}

/// Saisie manuelle : un entier 0-36, espaces autour tolérés. Tout le reste est ignoré.
pub fn parse_value(raw: &str) -> Option<u8> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|v| validate_value(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wheel_covers_every_value_once() {
        let mut seen = [false; POCKET_COUNT];
        for pocket in wheel() {
            assert!(!seen[pocket.value as usize], "Doublon : {}", pocket.value);
            seen[pocket.value as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_colors() {
        assert_eq!(Color::of(0), Color::Green);
        assert_eq!(Color::of(32), Color::Red);
        assert_eq!(Color::of(15), Color::Black);
        assert_eq!(wheel().filter(|p| p.color == Color::Red).count(), 18);
        assert_eq!(wheel().filter(|p| p.color == Color::Black).count(), 18);
    }

    #[test]
    fn test_pocket_lookup() {
        let p = Pocket::of(26).unwrap();
        assert_eq!(p.wheel_index, 36);
        assert_eq!(Pocket::at(1).unwrap().value, 32);
        assert!(Pocket::at(37).is_none());
        assert!(Pocket::of(37).is_none());
    }

    #[test]
    fn test_dozen_and_column() {
        assert_eq!(Dozen::of(0), None);
        assert_eq!(Dozen::of(12), Some(Dozen::First));
        assert_eq!(Dozen::of(13), Some(Dozen::Second));
        assert_eq!(Dozen::of(36), Some(Dozen::Third));
        assert_eq!(Column::of(0), None);
        assert_eq!(Column::of(1), Some(Column::First));
        assert_eq!(Column::of(35), Some(Column::Second));
        assert_eq!(Column::of(36), Some(Column::Third));
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("17"), Some(17));
        assert_eq!(parse_value(" 0 "), Some(0));
        assert_eq!(parse_value("36"), Some(36));
        assert_eq!(parse_value("37"), None);
        assert_eq!(parse_value("-1"), None);
        assert_eq!(parse_value("abc"), None);
        assert_eq!(parse_value("4.5"), None);
        assert_eq!(parse_value(""), None);
    }

    #[test]
    fn test_outcome_from_str() {
        assert_eq!("win".parse::<Outcome>().unwrap(), Outcome::Win);
        assert_eq!("LOSE".parse::<Outcome>().unwrap(), Outcome::Lose);
        assert!("draw".parse::<Outcome>().is_err());
    }

    #[test]
    fn test_entry_serde_shape() {
        let entry = HistoryEntry {
            value: 7,
            outcome: Some(Outcome::Win),
            ts: 42,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"value":7,"outcome":"win","ts":42}"#);
        let untagged = serde_json::to_string(&HistoryEntry::new(3, 1)).unwrap();
        assert_eq!(untagged, r#"{"value":3,"outcome":null,"ts":1}"#);
    }
}
