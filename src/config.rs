// Persisted user defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::{ContainerOption, EncodePreset, PriorityClass, VideoEncoderOption};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Explicit path to the ffmpeg executable. When unset, the standard
    /// search order applies (next to the application, then a bundled copy).
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Scheduling priority for spawned engine processes.
    #[serde(default)]
    pub priority: PriorityClass,

    /// Output container for muxed-video modes.
    #[serde(default)]
    pub container: String,

    /// Encoder preset for custom encodes.
    #[serde(default)]
    pub preset: String,

    /// Video encoder selection ("auto" resolves against probed capabilities).
    #[serde(default)]
    pub encoder: String,
}

impl DefaultsConfig {
    pub fn container_option(&self) -> ContainerOption {
        match self.container.as_str() {
            "mp4" => ContainerOption::Mp4,
            _ => ContainerOption::Mkv,
        }
    }

    pub fn preset_option(&self) -> EncodePreset {
        match self.preset.as_str() {
            "ultrafast" => EncodePreset::Ultrafast,
            "superfast" => EncodePreset::Superfast,
            "veryfast" => EncodePreset::Veryfast,
            "faster" => EncodePreset::Faster,
            "fast" => EncodePreset::Fast,
            "slow" => EncodePreset::Slow,
            "slower" => EncodePreset::Slower,
            "veryslow" => EncodePreset::Veryslow,
            _ => EncodePreset::Medium,
        }
    }

    pub fn encoder_option(&self) -> VideoEncoderOption {
        match self.encoder.as_str() {
            "libx264" => VideoEncoderOption::Libx264,
            "libx265" => VideoEncoderOption::Libx265,
            "h264_nvenc" => VideoEncoderOption::H264Nvenc,
            "hevc_nvenc" => VideoEncoderOption::HevcNvenc,
            "h264_amf" => VideoEncoderOption::H264Amf,
            "hevc_amf" => VideoEncoderOption::HevcAmf,
            "h264_qsv" => VideoEncoderOption::H264Qsv,
            "hevc_qsv" => VideoEncoderOption::HevcQsv,
            _ => VideoEncoderOption::Auto,
        }
    }
}

impl Config {
    /// Path to the config file.
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("ffremux");
        Ok(config_dir.join("config.toml"))
    }

    /// Load config from disk, falling back to defaults when absent.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            let config: Config = toml::from_str(&contents).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?;

            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to disk, creating the directory if needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }
}
