//! Tracking sessions -- codes handed from sender to receiver, and the
//! location timeline recorded under each code.

pub mod store;

pub use self::store::SessionStore;

use crate::geo::{LocationSample, SafeZone};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

/// Characters used in tracking codes. `I`, `O`, `0` and `1` are left out
/// because they are easy to misread.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("invalid tracking code '{0}'")]
    InvalidCode(String),
    #[error("no tracking session with code {0}")]
    NotFound(String),
    #[error("tracking session {0} is no longer active")]
    Inactive(String),
    #[error("could not allocate an unused tracking code")]
    CodeSpaceExhausted,
    #[error("stored safe zone for {code} is corrupt: {source}")]
    CorruptZone {
        code: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

/// Generate a random tracking code.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Normalise user input (trim, upper-case) and check it is a well-formed code.
pub fn normalize_code(input: &str) -> Result<String, TrackingError> {
    let code = input.trim().to_ascii_uppercase();
    let well_formed = code.len() == CODE_LEN && code.bytes().all(|b| CODE_ALPHABET.contains(&b));
    if !well_formed {
        return Err(TrackingError::InvalidCode(input.to_string()));
    }
    Ok(code)
}

/// Snapshot of a sender's session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSession {
    pub code: String,
    pub is_active: bool,
    pub last_location: LocationSample,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safe_zone: Option<SafeZone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_label: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
