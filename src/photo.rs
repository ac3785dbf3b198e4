// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Photo session: upload a still, classify it remotely, hold the outcome
//!
//! [`PhotoSession`] is a plain state container changed only through
//! [`PhotoSession::apply`]. [`PhotoStore`] owns one and runs the classifier
//! call the session asks for, feeding the completion back as an event.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

use crate::classifier::{Classifier, Prediction};
use crate::media::{self, Artifact};
use crate::{MudraError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoStatus {
    Idle,
    Loaded,
    Analyzing,
    Done,
    Errored,
}

impl PhotoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loaded => "loaded",
            Self::Analyzing => "analyzing",
            Self::Done => "done",
            Self::Errored => "errored",
        }
    }
}

/// What the view shows once analysis settles
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PhotoResult {
    Detected(Prediction),
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Default)]
enum Phase {
    #[default]
    Idle,
    Loaded,
    Analyzing,
    Done(Prediction),
    Errored(String),
}

/// Events that move a photo session
#[derive(Debug, Clone)]
pub enum PhotoEvent {
    Uploaded { file: Artifact, preview: String },
    AnalysisRequested,
    ClassifierSettled {
        generation: u64,
        outcome: std::result::Result<Prediction, String>,
    },
    Cleared,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoEffect {
    Classify { generation: u64, file: Artifact },
}

#[derive(Debug, Clone, Default)]
pub struct PhotoSession {
    file: Option<Artifact>,
    preview: Option<String>,
    phase: Phase,
    // Bumped on every upload and clear; classifier results carry the value
    // they were issued under.
    generation: u64,
}

// generation is bookkeeping, not observable state
impl PartialEq for PhotoSession {
    fn eq(&self, other: &Self) -> bool {
        self.file == other.file && self.preview == other.preview && self.phase == other.phase
    }
}

impl PhotoSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> PhotoStatus {
        match self.phase {
            Phase::Idle => PhotoStatus::Idle,
            Phase::Loaded => PhotoStatus::Loaded,
            Phase::Analyzing => PhotoStatus::Analyzing,
            Phase::Done(_) => PhotoStatus::Done,
            Phase::Errored(_) => PhotoStatus::Errored,
        }
    }

    pub fn result(&self) -> Option<PhotoResult> {
        match &self.phase {
            Phase::Done(prediction) => Some(PhotoResult::Detected(prediction.clone())),
            Phase::Errored(error) => Some(PhotoResult::Failed { error: error.clone() }),
            _ => None,
        }
    }

    pub fn file(&self) -> Option<&Artifact> {
        self.file.as_ref()
    }

    pub fn preview_data_uri(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Apply one event. Events that are not valid in the current state are
    /// ignored.
    pub fn apply(&mut self, event: PhotoEvent) -> Option<PhotoEffect> {
        match event {
            PhotoEvent::Uploaded { file, preview } => {
                self.generation += 1;
                self.file = Some(file);
                self.preview = Some(preview);
                self.phase = Phase::Loaded;
                None
            }
            PhotoEvent::AnalysisRequested => {
                if matches!(self.phase, Phase::Idle | Phase::Analyzing) {
                    return None;
                }
                let file = self.file.clone()?;
                self.phase = Phase::Analyzing;
                Some(PhotoEffect::Classify {
                    generation: self.generation,
                    file,
                })
            }
            PhotoEvent::ClassifierSettled { generation, outcome } => {
                if generation != self.generation || self.phase != Phase::Analyzing {
                    warn!(
                        "Discarding classifier result for generation {} (session is at {})",
                        generation, self.generation
                    );
                    return None;
                }
                self.phase = match outcome {
                    Ok(prediction) => Phase::Done(prediction),
                    Err(message) => Phase::Errored(message),
                };
                None
            }
            PhotoEvent::Cleared => {
                let generation = self.generation + 1;
                *self = Self {
                    generation,
                    ..Self::default()
                };
                None
            }
        }
    }
}

/// Text shown inline when classification fails. Only a failure to reach
/// the server gets the generic connection text.
pub fn failure_message(err: &MudraError) -> String {
    match err {
        MudraError::Api(e) if e.is_connect() || e.is_timeout() => "Failed to connect to server".to_string(),
        other => other.to_string(),
    }
}

/// Photo session plus the classifier it submits to
pub struct PhotoStore {
    session: Mutex<PhotoSession>,
    classifier: Arc<dyn Classifier>,
}

impl PhotoStore {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self {
            session: Mutex::new(PhotoSession::new()),
            classifier,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PhotoSession> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> PhotoSession {
        self.lock().clone()
    }

    /// Load a photo. A file that is not a decodable image leaves the session
    /// untouched.
    pub fn upload_photo(&self, file: Artifact) -> Result<()> {
        let preview = media::photo_preview(&file)?;
        info!("Photo loaded: {} ({} bytes)", file.name, file.len());
        self.lock().apply(PhotoEvent::Uploaded { file, preview });
        Ok(())
    }

    /// Submit the loaded photo. Returns false when there was nothing to
    /// submit or a submission is already in flight.
    pub async fn analyze(&self) -> bool {
        let effect = self.lock().apply(PhotoEvent::AnalysisRequested);
        let Some(PhotoEffect::Classify { generation, file }) = effect else {
            return false;
        };

        info!("Analyzing photo {}", file.name);
        let outcome = match self.classifier.classify(&file).await {
            Ok(prediction) => {
                info!("Detected {} ({}%)", prediction.mudra, prediction.confidence);
                Ok(prediction)
            }
            Err(e) => {
                warn!("Photo analysis failed: {}", e);
                Err(failure_message(&e))
            }
        };

        self.lock().apply(PhotoEvent::ClassifierSettled { generation, outcome });
        true
    }

    pub fn clear(&self) {
        self.lock().apply(PhotoEvent::Cleared);
    }
}
