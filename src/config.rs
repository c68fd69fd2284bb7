use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub image: ImageConfig,
    pub window: WindowConfig,
    pub sampler: SamplerConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub iterations: u64,
    pub report_interval_ms: u64,
    pub decode_mode: String,
    pub release: String,
    pub trim_heap: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            iterations: 1_000_000,
            report_interval_ms: 500,
            decode_mode: "stream".to_string(),
            release: "iteration".to_string(),
            trim_heap: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub path: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub marker_x: u32,
    pub marker_y: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        ImageConfig {
            path: None,
            width: 300,
            height: 200,
            marker_x: 10,
            marker_y: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            title: "ICO Memory Test".to_string(),
            width: 400,
            height: 300,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub source: String,
    pub executable: Option<String>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            source: "ps".to_string(),
            executable: None,
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("leakprobe").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}
