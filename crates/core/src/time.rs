//! Wall-clock helpers. All persisted timestamps are whole seconds since the
//! Unix epoch; each `run` samples the clock once and threads that value
//! through, so a single invocation sees one consistent "now".

use chrono::Utc;

/// Current time as whole seconds since the Unix epoch.
pub fn epoch_secs() -> u64 {
    Utc::now().timestamp().max(0) as u64
}
