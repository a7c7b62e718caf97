use serde::{Deserialize, Serialize};

/// RFC 5424 severities, as used by `logging/setLevel` and the
/// `notifications/message` log events it gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl LogLevel {
    pub fn permits(self, message_level: LogLevel) -> bool {
        message_level >= self
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}
