use crate::log::log_level::LogLevel;

/// A single log message event: severity, timestamp, origin and text.
#[derive(Debug, Clone)]
pub struct LogMsg {
    /// The severity level of the log.
    pub level: LogLevel,
    /// The timestamp of the log event in milliseconds.
    pub ts_ms: u128,
    /// The actual content of the log message.
    pub text: String,
    /// The target source of the log, typically the static module path.
    pub target: &'static str,
}
