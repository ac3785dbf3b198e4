// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! mudra-studio: capture and analysis sessions for Bharatanatyam mudras
//!
//! Two independent sessions drive everything: a photo session that submits
//! stills to a remote classifier, and a video session that records or loads
//! footage and produces a gesture report. A camera controller owns the live
//! capture device underneath the video session.

pub mod camera;
pub mod classifier;
pub mod config;
pub mod error;
pub mod media;
pub mod photo;
pub mod video;

pub use config::AppConfig;
pub use error::{MudraError, Result};
