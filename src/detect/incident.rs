use crate::detect::engine::Assessment;
use crate::detect::{AnomalyKind, Incident, Severity};
use crate::storage::Pool;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

/// Persists alerts raised for tracking sessions.
#[derive(Clone)]
pub struct IncidentManager {
    pool: Pool,
}

impl IncidentManager {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Record an assessment that found an anomaly.
    pub fn record(&self, tracking_code: &str, assessment: &Assessment) -> Result<Uuid> {
        let conn = self.pool.get()?;
        let id = Uuid::new_v4();
        let severity_str = format!("{:?}", Severity::for_verdict(&assessment.verdict)); // Info, Warning, Critical
        let kinds: Vec<AnomalyKind> = assessment.verdict.kinds().iter().copied().collect();
        let kinds_json = serde_json::to_string(&kinds)?;

        conn.execute(
            "INSERT INTO incidents (id, session_code, severity, kinds_json, message, message_source, sample_timestamp_ms, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id.to_string(),
                tracking_code,
                severity_str,
                kinds_json,
                assessment.alert_message,
                assessment.message_source.label(),
                assessment.sample_timestamp_millis,
                Utc::now()
            ],
        )
        .context("Failed to insert incident")?;

        Ok(id)
    }

    /// Most recent incidents for a session, newest first.
    pub fn list_recent(&self, tracking_code: &str, limit: usize) -> Result<Vec<Incident>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, session_code, severity, kinds_json, message, message_source, sample_timestamp_ms, created_at
             FROM incidents WHERE session_code = ?1
             ORDER BY created_at DESC LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![tracking_code, limit as i64], |row| {
            let id_str: String = row.get(0)?;
            let sev_str: String = row.get(2)?;
            let severity = match sev_str.as_str() {
                "Critical" => Severity::Critical,
                "Warning" => Severity::Warning,
                _ => Severity::Info,
            };
            let kinds_str: String = row.get(3)?;

            Ok(Incident {
                id: Uuid::parse_str(&id_str).unwrap_or_default(),
                tracking_code: row.get(1)?,
                severity,
                kinds: serde_json::from_str(&kinds_str).unwrap_or_default(),
                message: row.get(4)?,
                message_source: row.get(5)?,
                sample_timestamp_millis: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;

        let mut incidents = Vec::new();
        for r in rows {
            incidents.push(r?);
        }
        Ok(incidents)
    }
}
