//! Recorder configuration
//!
//! There is no configuration file; hosts either build a `RecorderConfig` in
//! code or let the global recorder read it from the environment.

use std::path::PathBuf;

/// Environment variable that disables recording when set to `0`, `false`, `off` or `no`
pub const ENV_ENABLED: &str = "SCOPETRACE_ENABLED";

/// Environment variable overriding the profile output path
pub const ENV_OUTPUT: &str = "SCOPETRACE_OUTPUT";

/// Default profile file written at teardown
pub const DEFAULT_OUTPUT_PATH: &str = "profile.prof";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderConfig {
    /// Initial state of the enable flag
    pub enabled: bool,

    /// Where `flush()` and the teardown hook write the profile
    pub output_path: PathBuf,

    /// Initial capacity of the encoded-block store
    pub store_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            store_capacity: 4096,
        }
    }
}

impl RecorderConfig {
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    #[must_use]
    pub fn with_store_capacity(mut self, capacity: usize) -> Self {
        self.store_capacity = capacity;
        self
    }

    /// Defaults overridden by `SCOPETRACE_ENABLED` and `SCOPETRACE_OUTPUT`
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_ENABLED) {
            config.enabled = parse_flag(&value).unwrap_or_else(|| {
                log::warn!("ignoring invalid {ENV_ENABLED}={value:?}");
                config.enabled
            });
        }
        if let Some(path) = lookup(ENV_OUTPUT).filter(|p| !p.is_empty()) {
            config.output_path = PathBuf::from(path);
        }
        config
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
