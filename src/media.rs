// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Media artifacts and the decoding that turns them into displayable sources

use base64::{engine::general_purpose, Engine as _};
use std::path::Path;
use tracing::debug;

use crate::{MudraError, Result};

/// A finalized media object, ready for submission or playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let mime = guess_mime(path).to_string();
        debug!("Loaded {} ({}, {} bytes)", name, mime, bytes.len());
        Ok(Self { name, mime, bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `data:` URI embedding the artifact bytes
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

fn guess_mime(path: &Path) -> &'static str {
    if let Ok(format) = image::ImageFormat::from_path(path) {
        return format.to_mime_type();
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

/// Decode an uploaded photo and produce its preview `data:` URI.
///
/// The image must be decodable; the MIME type of the preview follows the
/// detected format rather than the file name.
pub fn photo_preview(artifact: &Artifact) -> Result<String> {
    let format = image::guess_format(&artifact.bytes)
        .map_err(|_| MudraError::Decode(format!("{} as an image", artifact.name)))?;
    image::load_from_memory_with_format(&artifact.bytes, format)
        .map_err(|_| MudraError::Decode(format!("{} as an image", artifact.name)))?;

    Ok(format!(
        "data:{};base64,{}",
        format.to_mime_type(),
        general_purpose::STANDARD.encode(&artifact.bytes)
    ))
}

/// Video container families recognised by their leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoContainer {
    /// WebM / Matroska (EBML header)
    Matroska,
    /// MP4 / MOV / 3GP (ISO base media `ftyp` box)
    IsoMedia,
    /// RIFF AVI
    Avi,
}

impl VideoContainer {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            Some(Self::Matroska)
        } else if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
            Some(Self::IsoMedia)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"AVI " {
            Some(Self::Avi)
        } else {
            None
        }
    }

    fn default_mime(self) -> &'static str {
        match self {
            Self::Matroska => "video/webm",
            Self::IsoMedia => "video/mp4",
            Self::Avi => "video/x-msvideo",
        }
    }
}

/// A playable video source: where to play it from, and what it is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSource {
    pub uri: String,
    pub artifact: Artifact,
}

impl VideoSource {
    /// Validate an uploaded file as video and embed it as a `data:` URI
    pub fn from_upload(mut artifact: Artifact) -> Result<Self> {
        let container = VideoContainer::sniff(&artifact.bytes)
            .ok_or_else(|| MudraError::Decode(format!("{} as a video", artifact.name)))?;
        if !artifact.mime.starts_with("video/") {
            artifact.mime = container.default_mime().to_string();
        }
        Ok(Self {
            uri: artifact.data_uri(),
            artifact,
        })
    }

    /// Wrap a finished recording under a `blob:` URI
    pub fn from_recording(artifact: Artifact) -> Self {
        Self {
            uri: format!("blob:recording/{}", uuid::Uuid::new_v4()),
            artifact,
        }
    }
}
