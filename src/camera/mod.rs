// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Camera controller: exclusive ownership of a live capture device and
//! chunked recording from it

pub mod synthetic;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::config::CameraConfig;
use crate::media::Artifact;

pub use synthetic::SyntheticCamera;

/// Failures of the capture device and the recorder
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("camera is already recording")]
    DeviceBusy,

    #[error("no active camera")]
    NotActive,

    #[error("recording sink is still open")]
    SinkOpen,
}

/// What to ask the device for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub width: u32,
    pub height: u32,
    pub audio: bool,
    pub mime_type: String,
}

impl From<&CameraConfig> for CaptureConstraints {
    fn from(config: &CameraConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            audio: config.audio,
            mime_type: config.mime_type.clone(),
        }
    }
}

/// A live stream opened on a capture device
pub trait MediaStream: Send {
    /// Start encoding; encoded chunks arrive on the returned channel,
    /// which closes after the encoder is stopped and flushed
    fn start_encoder(&mut self, mime_type: &str) -> Result<UnboundedReceiver<Vec<u8>>, CameraError>;

    /// Stop encoding, flushing any pending data as a final chunk
    fn stop_encoder(&mut self);

    /// Stop every underlying track
    fn stop_tracks(&mut self);

    fn is_live(&self) -> bool;
}

/// Platform capture API
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn open(&self, constraints: &CaptureConstraints) -> Result<Box<dyn MediaStream>, CameraError>;
}

/// Exclusive ownership of one open stream. Tracks stop on release or drop.
pub struct CameraHandle {
    id: u64,
    stream: Option<Box<dyn MediaStream>>,
    recording: bool,
}

impl CameraHandle {
    pub fn is_released(&self) -> bool {
        !self.stream.as_ref().is_some_and(|s| s.is_live())
    }

    /// Stop all tracks. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if self.recording {
                stream.stop_encoder();
                self.recording = false;
            }
            stream.stop_tracks();
            debug!("Released camera handle {}", self.id);
        }
    }
}

impl Drop for CameraHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Accumulates encoded chunks in arrival order until closed
pub struct RecordingSink {
    rx: UnboundedReceiver<Vec<u8>>,
    chunks: Vec<Vec<u8>>,
    mime_type: String,
    closed: bool,
}

impl RecordingSink {
    fn new(rx: UnboundedReceiver<Vec<u8>>, mime_type: &str) -> Self {
        Self {
            rx,
            chunks: Vec::new(),
            mime_type: mime_type.to_string(),
            closed: false,
        }
    }

    /// Pull in whatever chunks have arrived so far without waiting
    pub fn collect_pending(&mut self) {
        while let Ok(chunk) = self.rx.try_recv() {
            self.push(chunk);
        }
    }

    fn push(&mut self, chunk: Vec<u8>) {
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }

    /// Wait for the encoder to flush and hang up
    pub async fn close(&mut self) {
        while let Some(chunk) = self.rx.recv().await {
            self.push(chunk);
        }
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

/// Concatenate a closed sink into one artifact
pub fn finalize(sink: RecordingSink) -> Result<Artifact, CameraError> {
    if !sink.closed {
        return Err(CameraError::SinkOpen);
    }
    // "video/webm;codecs=vp8,opus" -> "video/webm"
    let mime = sink
        .mime_type
        .split(';')
        .next()
        .unwrap_or("video/webm")
        .trim()
        .to_string();
    let bytes = sink.chunks.concat();
    Ok(Artifact::new("recording.webm", mime, bytes))
}

/// Owner of at most one active camera handle
pub struct CameraController {
    device: Box<dyn CaptureDevice>,
    active: Option<CameraHandle>,
    next_id: u64,
}

impl CameraController {
    pub fn new(device: Box<dyn CaptureDevice>) -> Self {
        Self {
            device,
            active: None,
            next_id: 1,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.as_ref().is_some_and(|h| !h.is_released())
    }

    pub fn is_recording(&self) -> bool {
        self.active.as_ref().is_some_and(|h| h.recording)
    }

    /// Open the device, releasing any handle already held
    pub async fn acquire(&mut self, constraints: &CaptureConstraints) -> Result<u64, CameraError> {
        if self.active.is_some() {
            debug!("Releasing existing camera handle before re-acquiring");
            self.release();
        }

        let stream = self.device.open(constraints).await.map_err(|e| {
            warn!("Camera acquisition failed: {}", e);
            e
        })?;

        let id = self.next_id;
        self.next_id += 1;
        self.active = Some(CameraHandle {
            id,
            stream: Some(stream),
            recording: false,
        });
        info!("Camera acquired at {}x{} (handle {})", constraints.width, constraints.height, id);
        Ok(id)
    }

    /// Stop the active handle, if any. Idempotent.
    pub fn release(&mut self) {
        if let Some(mut handle) = self.active.take() {
            handle.release();
            info!("Camera released (handle {})", handle.id);
        }
    }

    /// Start recording the active stream
    pub fn record(&mut self, mime_type: &str) -> Result<RecordingSink, CameraError> {
        let handle = self.active.as_mut().ok_or(CameraError::NotActive)?;
        if handle.recording {
            return Err(CameraError::DeviceBusy);
        }
        let stream = handle.stream.as_mut().ok_or(CameraError::NotActive)?;
        let rx = stream.start_encoder(mime_type)?;
        handle.recording = true;
        debug!("Recording started on handle {}", handle.id);
        Ok(RecordingSink::new(rx, mime_type))
    }

    /// Stop the encoder so the sink can close; the device stays open
    pub fn stop_recording(&mut self) -> Result<(), CameraError> {
        let handle = self.active.as_mut().ok_or(CameraError::NotActive)?;
        if !handle.recording {
            return Err(CameraError::NotActive);
        }
        if let Some(stream) = handle.stream.as_mut() {
            stream.stop_encoder();
        }
        handle.recording = false;
        Ok(())
    }
}

impl Drop for CameraController {
    fn drop(&mut self) {
        self.release();
    }
}
