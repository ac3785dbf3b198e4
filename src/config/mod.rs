// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for mudra-studio

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Remote mudra classifier
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Live capture settings
    #[serde(default)]
    pub camera: CameraConfig,

    /// Video analysis pacing
    #[serde(default)]
    pub video: VideoConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_url")]
    pub url: String,
    /// Multipart field carrying the image bytes
    #[serde(default = "default_field_name")]
    pub field_name: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_true")]
    pub audio: bool,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    /// Cadence at which the encoder emits chunks
    #[serde(default = "default_chunk_interval")]
    pub chunk_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct VideoConfig {
    #[serde(default = "default_step_percent")]
    pub step_percent: u8,
    #[serde(default = "default_step_interval")]
    pub step_interval_ms: u64,
}

// Default value functions
fn default_classifier_url() -> String { "https://hastash-backend.onrender.com/predict".to_string() }
fn default_field_name() -> String { "file".to_string() }
fn default_timeout() -> u64 { 60 }
fn default_width() -> u32 { 1280 }
fn default_height() -> u32 { 720 }
fn default_true() -> bool { true }
fn default_mime_type() -> String { "video/webm;codecs=vp8,opus".to_string() }
fn default_chunk_interval() -> u64 { 250 }
fn default_step_percent() -> u8 { 10 }
fn default_step_interval() -> u64 { 500 }

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            url: default_classifier_url(),
            field_name: default_field_name(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            audio: true,
            mime_type: default_mime_type(),
            chunk_interval_ms: default_chunk_interval(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            step_percent: default_step_percent(),
            step_interval_ms: default_step_interval(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            camera: CameraConfig::default(),
            video: VideoConfig::default(),
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl VideoConfig {
    pub fn step_interval(&self) -> Duration {
        Duration::from_millis(self.step_interval_ms)
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::MudraError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the sessions cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        let url = &self.classifier.url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(crate::MudraError::Config(format!(
                "classifier.url must be an http(s) URL, got {:?}",
                url
            )));
        }
        if self.classifier.field_name.is_empty() {
            return Err(crate::MudraError::Config("classifier.field_name is empty".to_string()));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(crate::MudraError::Config(format!(
                "camera resolution {}x{} is invalid",
                self.camera.width, self.camera.height
            )));
        }
        if self.video.step_percent == 0 || self.video.step_percent > 100 {
            return Err(crate::MudraError::Config(format!(
                "video.step_percent must be within 1..=100, got {}",
                self.video.step_percent
            )));
        }
        Ok(())
    }
}
