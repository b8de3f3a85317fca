use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Tunables for a game session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// How often the snake steps, in milliseconds.
    pub snake_interval_ms: f64,
    /// Keep stepping while the page (or terminal) is not focused.
    pub render_when_hidden: bool,
    /// How long the terminal loop waits for input between frames.
    pub frame_poll_ms: u64,
    /// Starting body, head first.
    pub initial_body: Vec<(i32, i32)>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            snake_interval_ms: 500.0,
            render_when_hidden: false,
            frame_poll_ms: 16,
            initial_body: vec![(14, 7), (13, 7), (12, 7)],
        }
    }
}

impl GameConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = GameConfig::from_json_str(r#"{ "snake_interval_ms": 250 }"#).unwrap();
        assert_eq!(config.snake_interval_ms, 250.0);
        assert_eq!(config.frame_poll_ms, 16);
        assert_eq!(config.initial_body.len(), 3);
    }

    #[test]
    fn test_round_trips_through_json() {
        let config = GameConfig {
            render_when_hidden: true,
            initial_body: vec![(3, 3)],
            ..GameConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(GameConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_malformed_json_is_a_config_error() {
        let err = GameConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let err = GameConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
