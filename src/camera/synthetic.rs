// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Software capture device that emits WebM-framed test chunks

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::oneshot;
use tracing::debug;

use super::{CameraError, CaptureConstraints, CaptureDevice, MediaStream};

const EBML_HEADER: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];
const CLUSTER_ID: [u8; 4] = [0x1F, 0x43, 0xB6, 0x75];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Working,
    Denied,
    Unavailable,
}

/// A capture device with no hardware behind it
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    chunk_interval: Duration,
    mode: Mode,
    live: Arc<AtomicUsize>,
}

impl SyntheticCamera {
    pub fn new(chunk_interval: Duration) -> Self {
        Self {
            chunk_interval,
            mode: Mode::Working,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A device whose user refuses permission
    pub fn denied() -> Self {
        Self {
            mode: Mode::Denied,
            ..Self::new(Duration::from_millis(250))
        }
    }

    /// A device that is not plugged in
    pub fn unavailable() -> Self {
        Self {
            mode: Mode::Unavailable,
            ..Self::new(Duration::from_millis(250))
        }
    }

    /// Streams opened and not yet stopped
    pub fn live_streams(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevice for SyntheticCamera {
    async fn open(&self, constraints: &CaptureConstraints) -> Result<Box<dyn MediaStream>, CameraError> {
        match self.mode {
            Mode::Denied => return Err(CameraError::PermissionDenied),
            Mode::Unavailable => {
                return Err(CameraError::DeviceUnavailable("no synthetic device attached".to_string()))
            }
            Mode::Working => {}
        }
        if constraints.width == 0 || constraints.height == 0 {
            return Err(CameraError::DeviceUnavailable(format!(
                "unsupported resolution {}x{}",
                constraints.width, constraints.height
            )));
        }

        self.live.fetch_add(1, Ordering::SeqCst);
        debug!("Synthetic stream opened at {}x{}", constraints.width, constraints.height);

        Ok(Box::new(SyntheticStream {
            live: Arc::clone(&self.live),
            chunk_interval: self.chunk_interval,
            stopped: false,
            encoder: None,
        }))
    }
}

struct SyntheticStream {
    live: Arc<AtomicUsize>,
    chunk_interval: Duration,
    stopped: bool,
    encoder: Option<oneshot::Sender<()>>,
}

fn cluster(seq: u32) -> Vec<u8> {
    let mut chunk = CLUSTER_ID.to_vec();
    chunk.extend_from_slice(&seq.to_be_bytes());
    chunk.extend_from_slice(&[0u8; 16]);
    chunk
}

impl MediaStream for SyntheticStream {
    fn start_encoder(&mut self, mime_type: &str) -> Result<UnboundedReceiver<Vec<u8>>, CameraError> {
        if self.stopped {
            return Err(CameraError::NotActive);
        }
        if self.encoder.is_some() {
            return Err(CameraError::DeviceBusy);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut header = EBML_HEADER.to_vec();
        header.extend_from_slice(mime_type.as_bytes());
        let _ = tx.send(header);

        let (stop_tx, mut stop_rx) = oneshot::channel();
        let interval = self.chunk_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            let mut seq = 0u32;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        let _ = tx.send(cluster(seq + 1));
                        break;
                    }
                    _ = ticker.tick() => {
                        seq += 1;
                        if tx.send(cluster(seq)).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        self.encoder = Some(stop_tx);
        Ok(rx)
    }

    fn stop_encoder(&mut self) {
        if let Some(stop) = self.encoder.take() {
            let _ = stop.send(());
        }
    }

    fn stop_tracks(&mut self) {
        self.stop_encoder();
        if !self.stopped {
            self.stopped = true;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        !self.stopped
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}
