use super::{generate_code, TrackingError, TrackingSession};
use crate::geo::{Coordinate, LocationSample, SafeZone};
use crate::storage::Pool;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

/// Attempts at finding an unused code before giving up.
const CODE_ATTEMPTS: usize = 8;

const SESSION_COLUMNS: &str = "code, is_active, last_latitude, last_longitude, last_timestamp_ms, \
     safe_zone_json, zone_label, created_at, updated_at";

/// SQLite-backed session store.
#[derive(Clone)]
pub struct SessionStore {
    pool: Pool,
}

struct SessionRow {
    code: String,
    is_active: bool,
    last: LocationSample,
    safe_zone_json: Option<String>,
    zone_label: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            code: row.get(0)?,
            is_active: row.get::<_, i64>(1)? != 0,
            last: LocationSample::new(row.get(2)?, row.get(3)?, row.get(4)?),
            safe_zone_json: row.get(5)?,
            zone_label: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_session(self) -> Result<TrackingSession, TrackingError> {
        let safe_zone = match self.safe_zone_json {
            Some(json) => Some(serde_json::from_str::<SafeZone>(&json).map_err(|source| {
                TrackingError::CorruptZone {
                    code: self.code.clone(),
                    source,
                }
            })?),
            None => None,
        };
        Ok(TrackingSession {
            code: self.code,
            is_active: self.is_active,
            last_location: self.last,
            safe_zone,
            zone_label: self.zone_label,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl SessionStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Start a session at `initial` and return it with its fresh code.
    pub fn create(&self, initial: Coordinate, timestamp_ms: i64) -> Result<TrackingSession, TrackingError> {
        let mut conn = self.pool.get()?;
        let now = Utc::now();

        for _ in 0..CODE_ATTEMPTS {
            let code = generate_code();
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO tracker_sessions
                    (code, is_active, last_latitude, last_longitude, last_timestamp_ms, created_at, updated_at)
                 VALUES (?1, 1, ?2, ?3, ?4, ?5, ?5)",
                params![code, initial.latitude, initial.longitude, timestamp_ms, now],
            )?;
            if inserted == 0 {
                debug!(%code, "tracking code collision, retrying");
                continue;
            }
            tx.execute(
                "INSERT INTO location_samples (session_code, latitude, longitude, timestamp_ms)
                 VALUES (?1, ?2, ?3, ?4)",
                params![code, initial.latitude, initial.longitude, timestamp_ms],
            )?;
            tx.commit()?;

            info!(%code, "tracking session started");
            return load(&conn, &code)?.ok_or(TrackingError::NotFound(code));
        }

        Err(TrackingError::CodeSpaceExhausted)
    }

    /// Fetch a session regardless of whether it is still active.
    pub fn get(&self, code: &str) -> Result<TrackingSession, TrackingError> {
        let conn = self.pool.get()?;
        load(&conn, code)?.ok_or_else(|| TrackingError::NotFound(code.to_string()))
    }

    /// Fetch a session, failing if it has been stopped.
    pub fn get_active(&self, code: &str) -> Result<TrackingSession, TrackingError> {
        let session = self.get(code)?;
        if !session.is_active {
            return Err(TrackingError::Inactive(code.to_string()));
        }
        Ok(session)
    }

    /// Record a new fix for an active session.
    pub fn append_location(&self, code: &str, sample: LocationSample) -> Result<TrackingSession, TrackingError> {
        let mut conn = self.pool.get()?;
        let session = load(&conn, code)?.ok_or_else(|| TrackingError::NotFound(code.to_string()))?;
        if !session.is_active {
            return Err(TrackingError::Inactive(code.to_string()));
        }

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO location_samples (session_code, latitude, longitude, timestamp_ms)
             VALUES (?1, ?2, ?3, ?4)",
            params![code, sample.latitude, sample.longitude, sample.timestamp_millis],
        )?;
        // Late-arriving fixes join the timeline but do not move the last-known position.
        tx.execute(
            "UPDATE tracker_sessions
             SET last_latitude = ?2, last_longitude = ?3, last_timestamp_ms = ?4, updated_at = ?5
             WHERE code = ?1 AND last_timestamp_ms <= ?4",
            params![code, sample.latitude, sample.longitude, sample.timestamp_millis, Utc::now()],
        )?;
        tx.commit()?;

        load(&conn, code)?.ok_or_else(|| TrackingError::NotFound(code.to_string()))
    }

    /// The newest `limit` samples for a session, oldest first.
    pub fn history(&self, code: &str, limit: usize) -> Result<Vec<LocationSample>, TrackingError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT latitude, longitude, timestamp_ms FROM location_samples
             WHERE session_code = ?1
             ORDER BY timestamp_ms DESC, id DESC
             LIMIT ?2",
        )?;
        let mut samples = stmt
            .query_map(params![code, limit as i64], |row| {
                Ok(LocationSample::new(row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        samples.reverse();
        Ok(samples)
    }

    /// Samples at or after `since_ms`, plus the newest one before it, oldest
    /// first. At most `cap` rows are returned, keeping the newest.
    ///
    /// The extra older sample lets a window starting at `since_ms` be fully
    /// spanned even when fixes do not land exactly on its edge.
    pub fn window(&self, code: &str, since_ms: i64, cap: usize) -> Result<Vec<LocationSample>, TrackingError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT latitude, longitude, timestamp_ms FROM location_samples
             WHERE session_code = ?1
               AND timestamp_ms >= COALESCE(
                   (SELECT MAX(timestamp_ms) FROM location_samples
                    WHERE session_code = ?1 AND timestamp_ms < ?2),
                   ?2)
             ORDER BY timestamp_ms DESC, id DESC
             LIMIT ?3",
        )?;
        let mut samples = stmt
            .query_map(params![code, since_ms, cap as i64], |row| {
                Ok(LocationSample::new(row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        samples.reverse();
        Ok(samples)
    }

    /// Replace (or clear, with `None`) a session's safe zone.
    pub fn set_safe_zone(
        &self,
        code: &str,
        zone: Option<&SafeZone>,
        label: Option<&str>,
    ) -> Result<TrackingSession, TrackingError> {
        let conn = self.pool.get()?;
        let zone_json = zone
            .map(serde_json::to_string)
            .transpose()
            .map_err(|source| TrackingError::CorruptZone {
                code: code.to_string(),
                source,
            })?;
        let changed = conn.execute(
            "UPDATE tracker_sessions SET safe_zone_json = ?2, zone_label = ?3, updated_at = ?4 WHERE code = ?1",
            params![code, zone_json, label, Utc::now()],
        )?;
        if changed == 0 {
            return Err(TrackingError::NotFound(code.to_string()));
        }
        info!(%code, has_zone = zone.is_some(), "safe zone updated");
        load(&conn, code)?.ok_or_else(|| TrackingError::NotFound(code.to_string()))
    }

    /// Stop sharing. The timeline is kept so receivers can still read it.
    pub fn deactivate(&self, code: &str) -> Result<(), TrackingError> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE tracker_sessions SET is_active = 0, updated_at = ?2 WHERE code = ?1",
            params![code, Utc::now()],
        )?;
        if changed == 0 {
            return Err(TrackingError::NotFound(code.to_string()));
        }
        info!(%code, "tracking session stopped");
        Ok(())
    }

    pub fn list_active(&self) -> Result<Vec<TrackingSession>, TrackingError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM tracker_sessions WHERE is_active = 1 ORDER BY created_at",
            SESSION_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], SessionRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(SessionRow::into_session).collect()
    }
}

fn load(conn: &Connection, code: &str) -> Result<Option<TrackingSession>, TrackingError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM tracker_sessions WHERE code = ?1", SESSION_COLUMNS),
            params![code],
            SessionRow::from_row,
        )
        .optional()?;
    row.map(SessionRow::into_session).transpose()
}
