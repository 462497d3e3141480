//! Configuration for media sessions.
//!
//! All configuration is explicit: a `SessionConfig` value is handed to the
//! session at construction. There is no process-wide mutable configuration.

use crate::errors::SessionError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    pub transport: TransportConfig,
    pub media: MediaConfig,
}

/// Transport / connectivity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// STUN/TURN servers used for connectivity-candidate discovery
    pub ice_servers: Vec<IceServerConfig>,
}

/// One ICE server entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Media track configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Stream label announced for the video track
    pub video_stream_label: String,
    /// Stream label announced for the audio track
    pub audio_stream_label: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: vec!["stun:stun.l.google.com:19302".to_string()],
                username: None,
                credential: None,
            }],
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            video_stream_label: "app-video".to_string(),
            audio_stream_label: "app-audio".to_string(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SessionError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| SessionError::State(format!("Failed to read config file: {}", e)))?;

        let config: SessionConfig = toml::from_str(&contents)
            .map_err(|e| SessionError::State(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SessionError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SessionError::State(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| SessionError::State(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| SessionError::State(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("crabcast.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.transport.ice_servers.is_empty() {
            return Err("At least one ICE server is required".to_string());
        }

        for server in &self.transport.ice_servers {
            if server.urls.is_empty() {
                return Err("ICE server URL list cannot be empty".to_string());
            }
            for url in &server.urls {
                if !url.starts_with("stun:") && !url.starts_with("turn:") {
                    return Err(format!("ICE server URL must be stun: or turn:, got {}", url));
                }
                if url.starts_with("turn:")
                    && (server.username.is_none() || server.credential.is_none())
                {
                    return Err("TURN servers require username and credential".to_string());
                }
            }
        }

        if self.media.video_stream_label.is_empty() || self.media.audio_stream_label.is_empty() {
            return Err("Stream labels cannot be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.transport.ice_servers.len(), 1);
        assert_eq!(config.media.video_stream_label, "app-video");
        assert_eq!(config.media.audio_stream_label, "app-audio");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut bad_config = SessionConfig::default();
        bad_config.transport.ice_servers.clear();
        assert!(bad_config.validate().is_err());

        let mut turn_without_creds = SessionConfig::default();
        turn_without_creds.transport.ice_servers = vec![IceServerConfig {
            urls: vec!["turn:turn.example.com:3478".to_string()],
            username: None,
            credential: None,
        }];
        assert!(turn_without_creds.validate().is_err());

        let mut bad_scheme = SessionConfig::default();
        bad_scheme.transport.ice_servers[0].urls = vec!["relay.example.com".to_string()];
        assert!(bad_scheme.validate().is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = std::env::temp_dir();
        let config_path = temp_dir.join("test_crabcast.toml");

        let _ = fs::remove_file(&config_path);

        let config = SessionConfig::default();
        assert!(config.save_to_file(&config_path).is_ok());

        let loaded = SessionConfig::load_from_file(&config_path).unwrap();
        assert_eq!(
            loaded.media.video_stream_label,
            config.media.video_stream_label
        );
        assert_eq!(
            loaded.transport.ice_servers[0].urls,
            config.transport.ice_servers[0].urls
        );

        let _ = fs::remove_file(&config_path);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = SessionConfig::load_from_file("nonexistent_file.toml");
        assert!(result.is_ok()); // Should return default
        assert!(result.unwrap().validate().is_ok());
    }
}
