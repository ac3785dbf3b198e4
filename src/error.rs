// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for mudra-studio

use thiserror::Error;

use crate::camera::CameraError;

/// Result type alias for mudra-studio operations
pub type Result<T> = std::result::Result<T, MudraError>;

/// mudra-studio error types
#[derive(Error, Debug)]
pub enum MudraError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Cannot decode {0}")]
    Decode(String),

    #[error("Invalid MIME type: {0}")]
    InvalidMime(String),

    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("Server is not responding. Please try again later.")]
    ServerUnavailable,

    #[error("Unexpected response from server")]
    MalformedResponse,

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Recording captured no media")]
    EmptyRecording,

    #[error("Cannot {action} while {state}")]
    InvalidTransition { state: &'static str, action: &'static str },

    #[error("Analysis error: {0}")]
    Analysis(String),
}
