//! Config validation - warns about unknown fields

use serde_json::Value;
use tracing::warn;

/// Known sections and the keys each accepts.
const SCHEMA: &[(&str, &[&str])] = &[
    ("server", &["listenAddr", "statusAddr"]),
    (
        "session",
        &[
            "maxGuests",
            "heartbeatTimeoutSecs",
            "sweepIntervalSecs",
            "tallyPeriodSecs",
            "codeAttempts",
        ],
    ),
];

/// Log a warning for every key the daemon does not understand.
pub fn warn_unknown_fields(content: &str, config_name: &str) {
    let Ok(value) = serde_json::from_str::<Value>(content) else {
        return;
    };

    for path in unknown_keys(&value) {
        warn!("Unknown config field in {config_name}: {path}");
    }
}

/// Dotted paths of unknown keys, e.g. `session.maxGuest`.
fn unknown_keys(value: &Value) -> Vec<String> {
    let Value::Object(root) = value else {
        return Vec::new();
    };

    let mut unknowns = Vec::new();
    for (section, body) in root {
        let Some((_, keys)) = SCHEMA.iter().find(|(name, _)| name == section) else {
            unknowns.push(section.clone());
            continue;
        };
        if let Value::Object(fields) = body {
            unknowns.extend(
                fields
                    .keys()
                    .filter(|key| !keys.contains(&key.as_str()))
                    .map(|key| format!("{section}.{key}")),
            );
        }
    }
    unknowns
}
