use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

use crate::db::{delete_slot, read_slot, write_slot};
use crate::models::{HistoryEntry, Outcome, MAX_VALUE};

/// Clé de l'emplacement et version du format persisté.
pub const SCHEMA_VERSION: &str = "roulette_state_v1";
pub const HISTORY_CAP: usize = 500;
pub const RECENT_CAP: usize = 12;
/// Au-delà, un horodatage persisté est tenu pour absent et renuméroté.
pub const MAX_TS: u64 = i64::MAX as u64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub schema_version: String,
    pub input_buffer: String,
    /// Plus récent en tête.
    pub history: Vec<HistoryEntry>,
    pub recent: Vec<u8>,
    pub rotation: f64,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            input_buffer: String::new(),
            history: Vec::new(),
            recent: Vec::new(),
            rotation: 0.0,
        }
    }
}

struct RawEntry {
    value: u8,
    outcome: Option<Outcome>,
    ts: Option<u64>,
}

pub fn encode_state(state: &PersistedState) -> Result<String> {
    serde_json::to_string(state).context("Échec de la sérialisation de l'état")
}

/// Décode un état persisté champ par champ. Un champ de type inattendu prend sa valeur
/// par défaut, une entrée d'historique illisible est écartée, les horodatages sont réparés.
/// Seul un document qui n'est pas un objet JSON est rejeté.
pub fn decode_state(raw: &str, cap: usize) -> Result<PersistedState> {
    let doc: Value = serde_json::from_str(raw).context("JSON invalide dans l'état persisté")?;
    let Some(obj) = doc.as_object() else {
        bail!("L'état persisté n'est pas un objet JSON");
    };

    if let Some(version) = obj.get("schemaVersion").and_then(Value::as_str) {
        if version != SCHEMA_VERSION {
            log::info!("Version de schéma {version} lue sous la clé {SCHEMA_VERSION}");
        }
    }

    let input_buffer = obj
        .get("inputBuffer")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let rotation = obj
        .get("rotation")
        .and_then(Value::as_f64)
        .filter(|r| r.is_finite())
        .unwrap_or(0.0);

    let mut raw_entries = parse_entries(obj.get("history"));
    if raw_entries.is_empty() {
        // Anciens enregistrements : seule la liste des derniers numéros existait.
        raw_entries = parse_entries(obj.get("recent"));
    }
    raw_entries.truncate(cap);

    let (history, repaired) = repair_timestamps(raw_entries);
    if repaired > 0 {
        log::warn!("{repaired} horodatage(s) réparé(s) dans l'historique persisté");
    }

    let recent = history.iter().take(RECENT_CAP).map(|e| e.value).collect();

    Ok(PersistedState {
        schema_version: SCHEMA_VERSION.to_string(),
        input_buffer,
        history,
        recent,
        rotation,
    })
}

fn parse_entries(field: Option<&Value>) -> Vec<RawEntry> {
    let Some(items) = field.and_then(Value::as_array) else {
        return Vec::new();
    };
    items.iter().filter_map(parse_entry).collect()
}

fn parse_entry(item: &Value) -> Option<RawEntry> {
    // Forme nue : un simple numéro.
    if let Some(n) = item.as_u64() {
        return as_value(n).map(|value| RawEntry { value, outcome: None, ts: None });
    }
    let obj = item.as_object()?;
    let value = obj.get("value").and_then(Value::as_u64).and_then(as_value)?;
    let outcome = match obj.get("outcome").and_then(Value::as_str) {
        Some("win") => Some(Outcome::Win),
        Some("lose") => Some(Outcome::Lose),
        _ => None,
    };
    let ts = obj
        .get("ts")
        .and_then(Value::as_u64)
        .filter(|&ts| ts <= MAX_TS);
    Some(RawEntry { value, outcome, ts })
}

fn as_value(n: u64) -> Option<u8> {
    (n <= MAX_VALUE as u64).then_some(n as u8)
}

/// Rétablit des horodatages strictement croissants dans l'ordre d'insertion
/// (du plus ancien, en queue, vers le plus récent). Retourne le nombre d'entrées corrigées.
fn repair_timestamps(entries: Vec<RawEntry>) -> (Vec<HistoryEntry>, usize) {
    let mut last = 0u64;
    let mut repaired = 0;
    let mut history: Vec<HistoryEntry> = entries
        .into_iter()
        .rev()
        .map(|raw| {
            let ts = match raw.ts {
                Some(ts) if ts > last => ts,
                _ => {
                    repaired += 1;
                    // `last` ≤ MAX_TS + nombre d'entrées : pas de débordement possible.
                    last.saturating_add(1)
                }
            };
            last = ts;
            HistoryEntry {
                value: raw.value,
                outcome: raw.outcome,
                ts,
            }
        })
        .collect();
    history.reverse();
    (history, repaired)
}

/// Ne remonte jamais d'erreur : un échec est journalisé, l'état en mémoire reste la référence.
pub fn save_state(conn: &Connection, state: &PersistedState) {
    let result = encode_state(state).and_then(|payload| write_slot(conn, SCHEMA_VERSION, &payload));
    if let Err(e) = result {
        log::warn!("Échec de la sauvegarde de l'état : {e:#}");
    }
}

/// `None` si aucun état n'est enregistré ou s'il est illisible.
pub fn load_state(conn: &Connection, cap: usize) -> Option<PersistedState> {
    let raw = match read_slot(conn, SCHEMA_VERSION) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            log::warn!("Échec du chargement de l'état : {e:#}");
            return None;
        }
    };
    match decode_state(&raw, cap) {
        Ok(state) => Some(state),
        Err(e) => {
            log::warn!("État persisté corrompu, ignoré : {e:#}");
            None
        }
    }
}

pub fn erase_state(conn: &Connection) {
    if let Err(e) = delete_slot(conn, SCHEMA_VERSION) {
        log::warn!("Échec de l'effacement de l'état : {e:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrate;

    fn is_strictly_decreasing(history: &[HistoryEntry]) -> bool {
        history.windows(2).all(|w| w[0].ts > w[1].ts)
    }

    #[test]
    fn test_missing_ts_is_repaired() {
        let raw = r#"{"schemaVersion":"roulette_state_v1","inputBuffer":"1",
            "history":[{"value":5,"outcome":null,"ts":300},{"value":7,"outcome":"win"},{"value":9,"ts":100}]}"#;
        let state = decode_state(raw, HISTORY_CAP).unwrap();
        assert_eq!(state.history.len(), 3);
        assert_eq!(state.history[1].value, 7);
        assert_eq!(state.history[1].outcome, Some(Outcome::Win));
        assert_eq!(state.history[1].ts, 101);
        assert!(is_strictly_decreasing(&state.history));
    }

    #[test]
    fn test_non_increasing_ts_are_repaired() {
        let raw = r#"{"history":[{"value":1,"ts":50},{"value":2,"ts":50},{"value":3,"ts":80}]}"#;
        let state = decode_state(raw, HISTORY_CAP).unwrap();
        let ts: Vec<u64> = state.history.iter().map(|e| e.ts).collect();
        assert_eq!(ts, vec![82, 81, 80]);
    }

    #[test]
    fn test_out_of_range_ts_is_renumbered() {
        let raw = r#"{"history":[{"value":5},{"value":7,"ts":18446744073709551615}]}"#;
        let state = decode_state(raw, HISTORY_CAP).unwrap();
        let ts: Vec<u64> = state.history.iter().map(|e| e.ts).collect();
        assert_eq!(ts, vec![2, 1]);

        let raw = r#"{"history":[{"value":1,"ts":9223372036854775808},{"value":2,"ts":9223372036854775807}]}"#;
        let state = decode_state(raw, HISTORY_CAP).unwrap();
        let ts: Vec<u64> = state.history.iter().map(|e| e.ts).collect();
        assert_eq!(ts, vec![MAX_TS + 1, MAX_TS]);
        assert!(is_strictly_decreasing(&state.history));
    }

    #[test]
    fn test_bad_fields_fall_back_to_defaults() {
        let raw = r#"{"inputBuffer":42,"rotation":"x",
            "history":[{"value":40,"ts":1},"seven",{"value":3,"outcome":"maybe","ts":2},12]}"#;
        let state = decode_state(raw, HISTORY_CAP).unwrap();
        assert_eq!(state.input_buffer, "");
        assert_eq!(state.rotation, 0.0);
        let values: Vec<u8> = state.history.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![3, 12]);
        assert_eq!(state.history[0].outcome, None);
        assert!(is_strictly_decreasing(&state.history));
    }

    #[test]
    fn test_history_truncated_to_cap() {
        let items: Vec<String> = (0..600).map(|i| format!("{}", i % 37)).collect();
        let raw = format!(r#"{{"history":[{}]}}"#, items.join(","));
        let state = decode_state(&raw, HISTORY_CAP).unwrap();
        assert_eq!(state.history.len(), HISTORY_CAP);
        assert_eq!(state.history[0].value, 0);
        assert_eq!(state.recent.len(), RECENT_CAP);
    }

    #[test]
    fn test_legacy_recent_list() {
        let raw = r#"{"history":"oops","recent":[4,5,6]}"#;
        let state = decode_state(raw, HISTORY_CAP).unwrap();
        let values: Vec<u8> = state.history.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![4, 5, 6]);
    }

    #[test]
    fn test_not_an_object_is_rejected() {
        assert!(decode_state("[1,2,3]", HISTORY_CAP).is_err());
        assert!(decode_state("{pas du json", HISTORY_CAP).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert!(load_state(&conn, HISTORY_CAP).is_none());

        let state = PersistedState {
            input_buffer: "2".to_string(),
            history: vec![HistoryEntry::new(17, 20), HistoryEntry::new(0, 10)],
            recent: vec![17, 0],
            rotation: 2170.5,
            ..PersistedState::default()
        };
        save_state(&conn, &state);
        assert_eq!(load_state(&conn, HISTORY_CAP), Some(state));

        erase_state(&conn);
        assert!(load_state(&conn, HISTORY_CAP).is_none());
    }

    #[test]
    fn test_corrupt_slot_loads_as_empty() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        write_slot(&conn, SCHEMA_VERSION, "not json").unwrap();
        assert!(load_state(&conn, HISTORY_CAP).is_none());
    }

    #[test]
    fn test_save_without_table_does_not_panic() {
        let conn = Connection::open_in_memory().unwrap();
        save_state(&conn, &PersistedState::default());
        assert!(load_state(&conn, HISTORY_CAP).is_none());
        erase_state(&conn);
    }
}
