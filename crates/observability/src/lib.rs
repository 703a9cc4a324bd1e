//! Tracing and logging setup shared by every Orbit binary and test harness.

use serde::Deserialize;

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::init;

/// Logging section of the process configuration.
///
/// `RUST_LOG`, when set, takes precedence over `level`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit one JSON object per line instead of human-readable output.
    #[serde(default = "default_json")]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    true
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: default_json(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: ObservabilityConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, ObservabilityConfig::default());
        assert_eq!(cfg.level, "info");
        assert!(cfg.json);
    }

    #[test]
    fn explicit_fields_win() {
        let cfg: ObservabilityConfig =
            serde_json::from_str(r#"{"level":"debug","json":false}"#).unwrap();
        assert_eq!(cfg.level, "debug");
        assert!(!cfg.json);
    }
}
