//! Logging configuration derived from [`Settings`].

use crate::config::Settings;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, one event per line.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Resolved logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive string.
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Builds logging configuration from top-level settings.
    ///
    /// `settings.debug` overrides `settings.log_level` to `"debug"` rather
    /// than requiring both to be set consistently.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let filter = if settings.debug { "debug".to_string() } else { settings.log_level.clone() };
        let format = if settings.log_json { LogFormat::Json } else { LogFormat::Pretty };
        Self { filter, format }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_overrides_log_level() {
        std::env::set_var("MNEMOGRAPH_DEBUG", "true");
        std::env::set_var("MNEMOGRAPH_LOG_LEVEL", "warn");
        let settings = Settings::from_env().expect("defaults must validate");
        let config = LoggingConfig::from_settings(&settings);
        std::env::remove_var("MNEMOGRAPH_DEBUG");
        std::env::remove_var("MNEMOGRAPH_LOG_LEVEL");
        assert_eq!(config.filter, "debug");
    }

    #[test]
    fn json_flag_selects_json_format() {
        std::env::set_var("MNEMOGRAPH_LOG_JSON", "true");
        let settings = Settings::from_env().expect("defaults must validate");
        let config = LoggingConfig::from_settings(&settings);
        std::env::remove_var("MNEMOGRAPH_LOG_JSON");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn defaults_are_pretty_at_info() {
        let settings = Settings::from_env().expect("defaults must validate");
        let config = LoggingConfig::from_settings(&settings);
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.filter, "info");
    }
}
