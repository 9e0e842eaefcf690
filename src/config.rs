// Configuration management for ChoirLoop

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Root folder holding `index.json` and the `songs/` tree
    pub data_dir: PathBuf,

    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port the HTTP server listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base URL of the practice frontend, used as the prefix for deeplinks
    #[serde(default = "default_app_base_url")]
    pub app_base_url: String,

    /// Origins allowed by CORS
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Upper bound for a single uploaded file
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Beats per measure used to convert measure:beat positions into seconds.
    /// MIDI time signatures are not consulted.
    #[serde(default = "default_beats_per_measure")]
    pub beats_per_measure: u32,

    /// Sample rate of rendered practice tracks
    #[serde(default = "default_render_sample_rate")]
    pub render_sample_rate: u32,

    /// Longest practice track a single render request may produce, in seconds
    #[serde(default = "default_max_render_seconds")]
    pub max_render_seconds: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: get_default_data_dir(),
            bind_address: default_bind_address(),
            port: default_port(),
            app_base_url: default_app_base_url(),
            allowed_origins: default_allowed_origins(),
            max_upload_bytes: default_max_upload_bytes(),
            beats_per_measure: default_beats_per_measure(),
            render_sample_rate: default_render_sample_rate(),
            max_render_seconds: default_max_render_seconds(),
        }
    }
}

impl Config {
    /// Load config from disk or return default
    pub fn load_or_default(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(contents) => {
                    match toml::from_str(&contents) {
                        Ok(config) => return config,
                        Err(e) => {
                            log::warn!("Failed to parse config: {}", e);
                        }
                    }
                }
                Err(e) => {
                    log::warn!("Failed to read config file: {}", e);
                }
            }
        }

        Self::default()
    }

    /// Save config to disk
    pub fn save(&self, config_path: &Path) -> anyhow::Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(config_path, contents)?;

        Ok(())
    }

    /// `bind_address:port`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Get the default data folder for songs
fn get_default_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ChoirLoop")
}

/// Get the config file path
pub fn get_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ChoirLoop")
        .join("config.toml")
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_app_base_url() -> String {
    "http://localhost:5173".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

/// 100 MB, the largest upload role (per-voice audio)
fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024
}

fn default_beats_per_measure() -> u32 {
    4
}

fn default_render_sample_rate() -> u32 {
    44_100
}

/// Ten minutes
fn default_max_render_seconds() -> f64 {
    600.0
}
