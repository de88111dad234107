//! Database schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

/// Version written by [`migrate`] once the tables below exist.
pub const SCHEMA_VERSION: i64 = 1;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS tracker_sessions (
            code TEXT PRIMARY KEY,
            is_active INTEGER NOT NULL DEFAULT 1,
            last_latitude REAL NOT NULL,
            last_longitude REAL NOT NULL,
            last_timestamp_ms INTEGER NOT NULL,
            safe_zone_json TEXT,
            zone_label TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS location_samples (
            id INTEGER PRIMARY KEY,
            session_code TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            timestamp_ms INTEGER NOT NULL,
            FOREIGN KEY (session_code) REFERENCES tracker_sessions(code)
        );

        CREATE TABLE IF NOT EXISTS incidents (
            id TEXT PRIMARY KEY,
            session_code TEXT NOT NULL,
            severity TEXT NOT NULL,
            kinds_json TEXT NOT NULL,
            message TEXT NOT NULL,
            message_source TEXT NOT NULL,
            sample_timestamp_ms INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (session_code) REFERENCES tracker_sessions(code)
        );

        CREATE INDEX IF NOT EXISTS idx_samples_session_ts ON location_samples(session_code, timestamp_ms);
        CREATE INDEX IF NOT EXISTS idx_incidents_session ON incidents(session_code, created_at);
        CREATE INDEX IF NOT EXISTS idx_sessions_active ON tracker_sessions(is_active);",
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}
