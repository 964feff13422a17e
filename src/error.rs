//! Error types for Glint.
//!
//! The simulation itself never fails. Errors only come from loading and
//! validating scene configuration, and from the command-line runner.

use std::fmt;

/// Errors that can occur while loading, saving or validating a scene.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read or write the config file.
    Io(std::io::Error),
    /// The file is not valid scene JSON.
    Json(serde_json::Error),
    /// The config parsed but holds a value the engine cannot run with.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to access scene file: {}", e),
            ConfigError::Json(e) => write!(f, "Failed to parse scene JSON: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid scene config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Json(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

/// Errors reported by the `glint` command-line runner.
#[derive(Debug)]
pub enum RunError {
    /// Scene config could not be loaded.
    Config(ConfigError),
    /// No preset with the given name exists.
    UnknownPreset(String),
    /// Bad command-line arguments.
    Usage(String),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Config(e) => write!(f, "{}", e),
            RunError::UnknownPreset(name) => write!(
                f,
                "Unknown preset '{}'. Run with --list to see available presets.",
                name
            ),
            RunError::Usage(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for RunError {
    fn from(e: ConfigError) -> Self {
        RunError::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_invalid_message() {
        let err = ConfigError::Invalid("count must be > 0".into());
        assert_eq!(err.to_string(), "Invalid scene config: count must be > 0");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_json_error_has_source() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: ConfigError = json_err.into();
        assert!(err.source().is_some());

        let run: RunError = err.into();
        assert!(run.to_string().starts_with("Failed to parse scene JSON"));
    }
}
