use crate::detect::{AnomalyKind, DetectionConfig};
use crate::geo::{LocationSample, SafeZone};
use serde::Serialize;
use std::collections::BTreeSet;

/// Outcome of a single evaluation.
///
/// Fields are private so the invariants hold: `anomaly_detected` is true iff
/// `kinds` is non-empty, the inactivity duration is present iff inactivity
/// fired, and `is_outside_safe_zone` mirrors the out-of-zone kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyVerdict {
    kinds: BTreeSet<AnomalyKind>,
    anomaly_detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    inactivity_duration_minutes: Option<u64>,
    is_outside_safe_zone: bool,
}

impl AnomalyVerdict {
    fn from_parts(inactivity_duration_minutes: Option<u64>, is_outside_safe_zone: bool) -> Self {
        let mut kinds = BTreeSet::new();
        if inactivity_duration_minutes.is_some() {
            kinds.insert(AnomalyKind::Inactivity);
        }
        if is_outside_safe_zone {
            kinds.insert(AnomalyKind::OutOfSafeZone);
        }
        Self {
            anomaly_detected: !kinds.is_empty(),
            kinds,
            inactivity_duration_minutes,
            is_outside_safe_zone,
        }
    }

    pub fn kinds(&self) -> &BTreeSet<AnomalyKind> {
        &self.kinds
    }

    pub fn anomaly_detected(&self) -> bool {
        self.anomaly_detected
    }

    pub fn inactivity_duration_minutes(&self) -> Option<u64> {
        self.inactivity_duration_minutes
    }

    pub fn is_outside_safe_zone(&self) -> bool {
        self.is_outside_safe_zone
    }

    pub fn has(&self, kind: AnomalyKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// Evaluate the latest sample against recent history and an optional safe zone.
///
/// Pure and total: both checks always run and the verdict carries the union
/// of whatever fired.
pub fn evaluate(
    current: &LocationSample,
    history: &[LocationSample],
    safe_zone: Option<&SafeZone>,
    config: &DetectionConfig,
) -> AnomalyVerdict {
    let inactivity = inactivity_minutes(current, history, config);
    let outside = safe_zone.is_some_and(|zone| !zone.contains(current.coordinate()));
    AnomalyVerdict::from_parts(inactivity, outside)
}

/// Minutes of inactivity, or `None` when the window shows movement, is too
/// short, or has fewer than two points.
fn inactivity_minutes(current: &LocationSample, history: &[LocationSample], config: &DetectionConfig) -> Option<u64> {
    let window = config.window_millis();

    let window_samples: Vec<&LocationSample> = history
        .iter()
        .filter(|s| (current.timestamp_millis.saturating_sub(s.timestamp_millis) as f64) <= window)
        .chain(std::iter::once(current))
        .collect();

    if window_samples.len() < 2 {
        return None;
    }

    // Sum of hops rather than net displacement, so pacing back and forth
    // still counts as movement.
    let moved: f64 = window_samples
        .windows(2)
        .map(|pair| pair[0].distance_to(pair[1]))
        .sum();

    let oldest = window_samples[0].timestamp_millis;
    let newest = window_samples[window_samples.len() - 1].timestamp_millis;
    let span = newest.saturating_sub(oldest);

    if moved < config.safe_zone_threshold_meters() && (span as f64) >= window {
        Some((span / 60_000) as u64)
    } else {
        None
    }
}
