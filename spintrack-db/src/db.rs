use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS slots (
    key       TEXT PRIMARY KEY,
    payload   TEXT NOT NULL,
    saved_at  TEXT NOT NULL
);
";

pub fn db_path() -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("spintrack.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Échec de la migration")?;
    Ok(())
}

/// Écrase le contenu de l'emplacement `key`.
pub fn write_slot(conn: &Connection, key: &str, payload: &str) -> Result<()> {
    let saved_at = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO slots (key, payload, saved_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET payload = excluded.payload, saved_at = excluded.saved_at",
        rusqlite::params![key, payload, saved_at],
    ).with_context(|| format!("Échec de l'écriture de l'emplacement '{}'", key))?;
    Ok(())
}

pub fn read_slot(conn: &Connection, key: &str) -> Result<Option<String>> {
    let payload = conn
        .query_row("SELECT payload FROM slots WHERE key = ?1", [key], |row| row.get(0))
        .optional()
        .with_context(|| format!("Échec de la lecture de l'emplacement '{}'", key))?;
    Ok(payload)
}

pub fn slot_saved_at(conn: &Connection, key: &str) -> Result<Option<String>> {
    let saved_at = conn
        .query_row("SELECT saved_at FROM slots WHERE key = ?1", [key], |row| row.get(0))
        .optional()?;
    Ok(saved_at)
}

pub fn delete_slot(conn: &Connection, key: &str) -> Result<bool> {
    let changed = conn
        .execute("DELETE FROM slots WHERE key = ?1", [key])
        .with_context(|| format!("Échec de la suppression de l'emplacement '{}'", key))?;
    Ok(changed > 0)
}
