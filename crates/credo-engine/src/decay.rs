//! Decay-weighted repair of flagged identifiers.
//!
//! The decay multiplier depends on two things: whether the identifier is
//! currently flagged, and whether its ledger history reaches back further
//! than [`DECAY_HORIZON_DAYS`]. Long-standing flagged identifiers recover
//! slowest.

use chrono::Duration;

/// History older than this counts as long-standing.
pub const DECAY_HORIZON_DAYS: i64 = 180;

/// Score added per repair step, before the multiplier.
pub const REPAIR_INCREMENT: f64 = 0.1;

pub const DECAY_FLAGGED_LONG: f64 = 0.3;
pub const DECAY_FLAGGED_RECENT: f64 = 0.6;
pub const DECAY_CLEAN_LONG: f64 = 0.8;
pub const DECAY_CLEAN_RECENT: f64 = 1.0;

/// Multiplier for an identifier, given its flag and the time since its
/// oldest ledger entry. Identifiers with no history get `1.0`.
pub fn decay_multiplier(flagged: bool, since_oldest: Option<Duration>) -> f64 {
    let Some(elapsed) = since_oldest else {
        return DECAY_CLEAN_RECENT;
    };
    let long_standing = elapsed > Duration::days(DECAY_HORIZON_DAYS);
    match (flagged, long_standing) {
        (true, true) => DECAY_FLAGGED_LONG,
        (true, false) => DECAY_FLAGGED_RECENT,
        (false, true) => DECAY_CLEAN_LONG,
        (false, false) => DECAY_CLEAN_RECENT,
    }
}

/// One repair step, capped at 1.0.
pub fn repaired_score(current: f64, multiplier: f64) -> f64 {
    (current + REPAIR_INCREMENT * multiplier).min(1.0)
}
