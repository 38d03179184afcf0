//! Epoch helpers and the JSON envelope wrapped around machine-readable output.

use serde_json::Value as JsonValue;
use ulid::Ulid;

pub const ENVELOPE_VERSION: &str = "1.0.0";

pub fn now_epoch_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Unix-epoch seconds with a `Z` suffix (e.g. `1771220592Z`).
pub fn now_epoch_z() -> String {
    format!("{}Z", now_epoch_secs())
}

pub fn new_run_id() -> String {
    Ulid::new().to_string()
}

/// Wraps a command result as `{envelope_version, ts, event_id, cmd, status, ..extra}`.
///
/// Keys in `extra` are appended after the header fields; a key that collides
/// with a header field overwrites it.
pub fn command_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "envelope_version": ENVELOPE_VERSION,
        "ts": now_epoch_z(),
        "event_id": new_run_id(),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}
