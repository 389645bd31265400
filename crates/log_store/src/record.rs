use serde::{Deserialize, Serialize};

/// One physical line of service output.
///
/// `id` is assigned by the owning store and is strictly increasing within a
/// service, so per-service arrival order can be recovered without relying on
/// timestamps. `timestamp` is wall-clock milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogLine {
    pub id: u64,
    pub timestamp: i64,
    pub text: String,
}

impl LogLine {
    #[must_use]
    pub fn new(id: u64, timestamp: i64, text: impl Into<String>) -> Self {
        Self {
            id,
            timestamp,
            text: text.into(),
        }
    }
}
