// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Video session: acquire footage by upload or live capture, then analyze it

pub mod analysis;

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::camera::{self, CameraController, CaptureConstraints, CaptureDevice, RecordingSink};
use crate::media::{Artifact, VideoSource};
use crate::{MudraError, Result};

pub use analysis::{DetectedGesture, SimulatedAnalyzer, VideoAnalyzer, VideoReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoStatus {
    Idle,
    CameraLive,
    Recording,
    FileLoaded,
    Analyzing,
    Done,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CameraLive => "camera live",
            Self::Recording => "recording",
            Self::FileLoaded => "file loaded",
            Self::Analyzing => "analyzing",
            Self::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionMode {
    #[default]
    FilePick,
    LiveCamera,
}

/// Events that move a video session
#[derive(Debug, Clone)]
pub enum VideoEvent {
    MediaLoaded { source: VideoSource, mode: AcquisitionMode },
    CameraStarted,
    RecordingStarted,
    CameraStopped,
    AnalysisRequested,
    Progress { generation: u64, percent: u8 },
    AnalysisSettled {
        generation: u64,
        outcome: std::result::Result<VideoReport, String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum VideoEffect {
    Analyze { generation: u64, source: VideoSource },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoSession {
    source: Option<VideoSource>,
    mode: AcquisitionMode,
    progress: u8,
    status: VideoStatus,
    report: Option<VideoReport>,
    error: Option<String>,
    generation: u64,
}

impl Default for VideoSession {
    fn default() -> Self {
        Self {
            source: None,
            mode: AcquisitionMode::FilePick,
            progress: 0,
            status: VideoStatus::Idle,
            report: None,
            error: None,
            generation: 0,
        }
    }
}

impl VideoSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> VideoStatus {
        self.status
    }

    pub fn source(&self) -> Option<&VideoSource> {
        self.source.as_ref()
    }

    pub fn acquisition_mode(&self) -> AcquisitionMode {
        self.mode
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress
    }

    pub fn report(&self) -> Option<&VideoReport> {
        self.report.as_ref()
    }

    /// Why the last analysis failed, if it did
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn reject(&self, action: &'static str) -> MudraError {
        MudraError::InvalidTransition {
            state: self.status.as_str(),
            action,
        }
    }

    fn reset_results(&mut self) {
        self.generation += 1;
        self.progress = 0;
        self.report = None;
        self.error = None;
    }

    /// Apply one event. User actions invalid in the current state are
    /// rejected; stale collaborator completions are dropped.
    pub fn apply(&mut self, event: VideoEvent) -> Result<Option<VideoEffect>> {
        match event {
            VideoEvent::MediaLoaded { source, mode } => {
                self.reset_results();
                self.source = Some(source);
                self.mode = mode;
                self.status = VideoStatus::FileLoaded;
            }
            VideoEvent::CameraStarted => {
                if self.status == VideoStatus::Analyzing {
                    return Err(self.reject("start the camera"));
                }
                self.reset_results();
                self.source = None;
                self.mode = AcquisitionMode::LiveCamera;
                self.status = VideoStatus::CameraLive;
            }
            VideoEvent::RecordingStarted => {
                if self.status != VideoStatus::CameraLive {
                    return Err(self.reject("start recording"));
                }
                self.status = VideoStatus::Recording;
            }
            VideoEvent::CameraStopped => {
                if !matches!(self.status, VideoStatus::CameraLive | VideoStatus::Recording) {
                    return Err(self.reject("stop the camera"));
                }
                self.status = VideoStatus::Idle;
            }
            VideoEvent::AnalysisRequested => {
                if self.status != VideoStatus::FileLoaded {
                    return Err(self.reject("analyze"));
                }
                let source = self.source.clone().ok_or_else(|| self.reject("analyze"))?;
                self.progress = 0;
                self.report = None;
                self.error = None;
                self.status = VideoStatus::Analyzing;
                return Ok(Some(VideoEffect::Analyze {
                    generation: self.generation,
                    source,
                }));
            }
            VideoEvent::Progress { generation, percent } => {
                if generation == self.generation
                    && self.status == VideoStatus::Analyzing
                    && percent >= self.progress
                {
                    self.progress = percent.min(100);
                }
            }
            VideoEvent::AnalysisSettled { generation, outcome } => {
                if generation != self.generation || self.status != VideoStatus::Analyzing {
                    warn!("Discarding video analysis for generation {}", generation);
                    return Ok(None);
                }
                match outcome {
                    Ok(report) => {
                        self.progress = 100;
                        self.report = Some(report);
                        self.status = VideoStatus::Done;
                    }
                    Err(message) => {
                        self.error = Some(message);
                        self.status = VideoStatus::FileLoaded;
                    }
                }
            }
        }
        Ok(None)
    }
}

struct Capture {
    controller: CameraController,
    sink: Option<RecordingSink>,
}

/// Video session plus the camera and analyzer it drives
pub struct VideoStore {
    session: Mutex<VideoSession>,
    capture: tokio::sync::Mutex<Capture>,
    analyzer: Arc<dyn VideoAnalyzer>,
    constraints: CaptureConstraints,
    progress: watch::Sender<u8>,
}

impl VideoStore {
    pub fn new(
        device: Box<dyn CaptureDevice>,
        constraints: CaptureConstraints,
        analyzer: Arc<dyn VideoAnalyzer>,
    ) -> Self {
        let (progress, _) = watch::channel(0);
        Self {
            session: Mutex::new(VideoSession::new()),
            capture: tokio::sync::Mutex::new(Capture {
                controller: CameraController::new(device),
                sink: None,
            }),
            analyzer,
            constraints,
            progress,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VideoSession> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> VideoSession {
        self.lock().clone()
    }

    /// Progress of the running analysis, for observers
    pub fn subscribe_progress(&self) -> watch::Receiver<u8> {
        self.progress.subscribe()
    }

    pub async fn camera_active(&self) -> bool {
        self.capture.lock().await.controller.is_active()
    }

    /// Load a video file, dropping any live capture and prior results
    pub async fn upload_video(&self, file: Artifact) -> Result<()> {
        let source = VideoSource::from_upload(file)?;

        let mut capture = self.capture.lock().await;
        capture.sink = None;
        capture.controller.release();

        info!("Video loaded: {} ({} bytes)", source.artifact.name, source.artifact.len());
        self.lock().apply(VideoEvent::MediaLoaded {
            source,
            mode: AcquisitionMode::FilePick,
        })?;
        self.progress.send_replace(0);
        Ok(())
    }

    /// Acquire the camera. On failure the session is left as it was.
    pub async fn start_camera(&self) -> Result<()> {
        let mut capture = self.capture.lock().await;
        if self.lock().status() == VideoStatus::Analyzing {
            return Err(self.lock().reject("start the camera"));
        }

        capture.sink = None;
        if let Err(e) = capture.controller.acquire(&self.constraints).await {
            warn!("Could not access camera: {}", e);
            return Err(e.into());
        }

        if let Err(e) = self.lock().apply(VideoEvent::CameraStarted) {
            capture.controller.release();
            return Err(e);
        }
        Ok(())
    }

    pub async fn start_recording(&self) -> Result<()> {
        let mut capture = self.capture.lock().await;
        if self.lock().status() != VideoStatus::CameraLive {
            return Err(self.lock().reject("start recording"));
        }

        let sink = capture.controller.record(&self.constraints.mime_type)?;
        capture.sink = Some(sink);
        self.lock().apply(VideoEvent::RecordingStarted)?;
        info!("Recording started");
        Ok(())
    }

    /// Finish the recording, load it as the session's video and release the
    /// camera
    pub async fn stop_recording(&self) -> Result<()> {
        let mut capture = self.capture.lock().await;
        if self.lock().status() != VideoStatus::Recording {
            return Err(self.lock().reject("stop recording"));
        }

        let sink = capture.sink.take();
        capture.controller.stop_recording()?;
        let artifact = match sink {
            Some(mut sink) => {
                sink.close().await;
                camera::finalize(sink)
            }
            None => Err(camera::CameraError::NotActive),
        };
        capture.controller.release();

        let artifact = match artifact {
            Ok(artifact) if !artifact.is_empty() => artifact,
            Ok(_) => {
                self.lock().apply(VideoEvent::CameraStopped)?;
                return Err(MudraError::EmptyRecording);
            }
            Err(e) => {
                self.lock().apply(VideoEvent::CameraStopped)?;
                return Err(e.into());
            }
        };

        info!("Recording finished ({} bytes)", artifact.len());
        self.lock().apply(VideoEvent::MediaLoaded {
            source: VideoSource::from_recording(artifact),
            mode: AcquisitionMode::LiveCamera,
        })?;
        self.progress.send_replace(0);
        Ok(())
    }

    /// Release the camera immediately, discarding any recording in progress
    pub async fn stop_camera(&self) -> Result<()> {
        let mut capture = self.capture.lock().await;
        if !matches!(self.lock().status(), VideoStatus::CameraLive | VideoStatus::Recording) {
            return Err(self.lock().reject("stop the camera"));
        }

        capture.sink = None;
        capture.controller.release();
        self.lock().apply(VideoEvent::CameraStopped)?;
        info!("Camera stopped");
        Ok(())
    }

    /// Run the analyzer over the loaded video. Analyzer failures are kept
    /// in the session rather than returned.
    pub async fn analyze(&self) -> Result<()> {
        // Serialized with camera work so a pending acquire cannot interleave
        let effect = {
            let _capture = self.capture.lock().await;
            self.lock().apply(VideoEvent::AnalysisRequested)?
        };
        let Some(VideoEffect::Analyze { generation, source }) = effect else {
            return Ok(());
        };
        self.progress.send_replace(0);

        info!("Analyzing video {}", source.artifact.name);
        let report_progress = |percent: u8| {
            let accepted = {
                let mut session = self.lock();
                let _ = session.apply(VideoEvent::Progress { generation, percent });
                session.generation == generation && session.progress == percent
            };
            if accepted {
                self.progress.send_replace(percent);
            }
        };

        let outcome = match self.analyzer.analyze(&source, &report_progress).await {
            Ok(report) => Ok(report),
            Err(e) => {
                warn!("Video analysis failed: {}", e);
                Err(e.to_string())
            }
        };

        self.lock().apply(VideoEvent::AnalysisSettled { generation, outcome })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraError, MediaStream, SyntheticCamera};
    use crate::config::{CameraConfig, VideoConfig};
    use crate::media::tests::webm_bytes;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn store_with(camera: SyntheticCamera) -> VideoStore {
        let analyzer = SimulatedAnalyzer::new(&VideoConfig { step_percent: 10, step_interval_ms: 1 });
        VideoStore::new(
            Box::new(camera),
            CaptureConstraints::from(&CameraConfig::default()),
            Arc::new(analyzer),
        )
    }

    fn clip() -> Artifact {
        Artifact::new("dance.webm", "video/webm", webm_bytes())
    }

    #[tokio::test]
    async fn test_upload_then_analyze() {
        let store = store_with(SyntheticCamera::new(Duration::from_millis(2)));
        store.upload_video(clip()).await.unwrap();
        assert_eq!(store.snapshot().status(), VideoStatus::FileLoaded);

        store.analyze().await.unwrap();
        let session = store.snapshot();
        assert_eq!(session.status(), VideoStatus::Done);
        assert_eq!(session.progress_percent(), 100);
        let report = session.report().unwrap();
        assert_eq!(report.detected_gestures.len(), report.gestures_identified);
        assert_eq!(*store.subscribe_progress().borrow(), 100);
    }

    #[tokio::test]
    async fn test_upload_rejects_non_video() {
        let store = store_with(SyntheticCamera::new(Duration::from_millis(2)));
        let err = store.upload_video(Artifact::new("a.txt", "text/plain", b"hello".to_vec())).await;
        assert!(matches!(err, Err(MudraError::Decode(_))));
        assert_eq!(store.snapshot(), VideoSession::new());
    }

    #[tokio::test]
    async fn test_analyze_requires_loaded_file() {
        let store = store_with(SyntheticCamera::new(Duration::from_millis(2)));
        assert!(matches!(store.analyze().await, Err(MudraError::InvalidTransition { .. })));
        assert_eq!(store.snapshot().status(), VideoStatus::Idle);
    }

    #[tokio::test]
    async fn test_recording_before_camera_is_rejected() {
        let store = store_with(SyntheticCamera::new(Duration::from_millis(2)));
        assert!(matches!(store.start_recording().await, Err(MudraError::InvalidTransition { .. })));
        assert!(matches!(store.stop_recording().await, Err(MudraError::InvalidTransition { .. })));
        assert_eq!(store.snapshot().status(), VideoStatus::Idle);
    }

    #[tokio::test]
    async fn test_record_cycle_releases_device() {
        let camera = SyntheticCamera::new(Duration::from_millis(2));
        let store = store_with(camera.clone());

        store.start_camera().await.unwrap();
        assert_eq!(store.snapshot().status(), VideoStatus::CameraLive);
        store.start_recording().await.unwrap();
        assert_eq!(store.snapshot().status(), VideoStatus::Recording);
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.stop_recording().await.unwrap();

        let session = store.snapshot();
        assert_eq!(session.status(), VideoStatus::FileLoaded);
        assert_eq!(session.acquisition_mode(), AcquisitionMode::LiveCamera);
        let source = session.source().unwrap();
        assert!(!source.artifact.is_empty());
        assert!(source.uri.starts_with("blob:recording/"));
        assert_eq!(camera.live_streams(), 0);
        assert!(!store.camera_active().await);

        store.start_camera().await.unwrap();
        assert_eq!(camera.live_streams(), 1);
    }

    #[tokio::test]
    async fn test_stop_camera_discards_recording() {
        let camera = SyntheticCamera::new(Duration::from_millis(2));
        let store = store_with(camera.clone());

        store.start_camera().await.unwrap();
        store.start_recording().await.unwrap();
        store.stop_camera().await.unwrap();

        let session = store.snapshot();
        assert_eq!(session.status(), VideoStatus::Idle);
        assert!(session.source().is_none());
        assert_eq!(camera.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_denied_camera_keeps_session_usable() {
        let store = store_with(SyntheticCamera::denied());
        match store.start_camera().await {
            Err(MudraError::Camera(CameraError::PermissionDenied)) => {}
            other => panic!("expected permission denied, got {:?}", other),
        }
        assert_eq!(store.snapshot().status(), VideoStatus::Idle);

        store.upload_video(clip()).await.unwrap();
        assert_eq!(store.snapshot().status(), VideoStatus::FileLoaded);
    }

    #[tokio::test]
    async fn test_upload_while_camera_live_releases_it() {
        let camera = SyntheticCamera::new(Duration::from_millis(2));
        let store = store_with(camera.clone());

        store.start_camera().await.unwrap();
        store.upload_video(clip()).await.unwrap();
        assert_eq!(camera.live_streams(), 0);
        assert_eq!(store.snapshot().acquisition_mode(), AcquisitionMode::FilePick);
    }

    #[tokio::test]
    async fn test_reupload_clears_report() {
        let store = store_with(SyntheticCamera::new(Duration::from_millis(2)));
        store.upload_video(clip()).await.unwrap();
        store.analyze().await.unwrap();
        assert!(store.snapshot().report().is_some());

        store.upload_video(clip()).await.unwrap();
        let session = store.snapshot();
        assert!(session.report().is_none());
        assert_eq!(session.progress_percent(), 0);
        assert_eq!(session.status(), VideoStatus::FileLoaded);
    }

    struct FailingAnalyzer;

    #[async_trait]
    impl VideoAnalyzer for FailingAnalyzer {
        async fn analyze(&self, _source: &VideoSource, progress: &(dyn Fn(u8) + Send + Sync)) -> Result<VideoReport> {
            progress(0);
            progress(40);
            Err(MudraError::Analysis("decoder crashed".to_string()))
        }
    }

    #[tokio::test]
    async fn test_analyzer_failure_is_kept_in_session() {
        let store = VideoStore::new(
            Box::new(SyntheticCamera::new(Duration::from_millis(2))),
            CaptureConstraints::from(&CameraConfig::default()),
            Arc::new(FailingAnalyzer),
        );
        store.upload_video(clip()).await.unwrap();
        store.analyze().await.unwrap();

        let session = store.snapshot();
        assert_eq!(session.status(), VideoStatus::FileLoaded);
        assert_eq!(session.error(), Some("Analysis error: decoder crashed"));
        assert!(session.report().is_none());
    }

    #[test]
    fn test_progress_never_moves_backwards() {
        let mut session = VideoSession::new();
        session
            .apply(VideoEvent::MediaLoaded {
                source: VideoSource::from_upload(clip()).unwrap(),
                mode: AcquisitionMode::FilePick,
            })
            .unwrap();
        let Some(VideoEffect::Analyze { generation, .. }) = session.apply(VideoEvent::AnalysisRequested).unwrap() else {
            panic!("expected analyze effect");
        };

        session.apply(VideoEvent::Progress { generation, percent: 50 }).unwrap();
        session.apply(VideoEvent::Progress { generation, percent: 20 }).unwrap();
        assert_eq!(session.progress_percent(), 50);

        session.apply(VideoEvent::Progress { generation: generation + 7, percent: 90 }).unwrap();
        assert_eq!(session.progress_percent(), 50);
    }

    /// Holds `open` until the test lets it through
    struct GatedCamera {
        inner: SyntheticCamera,
        entered: Arc<Notify>,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl CaptureDevice for GatedCamera {
        async fn open(&self, constraints: &CaptureConstraints) -> std::result::Result<Box<dyn MediaStream>, CameraError> {
            self.entered.notify_one();
            self.gate.notified().await;
            self.inner.open(constraints).await
        }
    }

    #[tokio::test]
    async fn test_analyze_waits_for_pending_camera_acquire() {
        let camera = SyntheticCamera::new(Duration::from_millis(2));
        let entered = Arc::new(Notify::new());
        let gate = Arc::new(Notify::new());
        let store = Arc::new(VideoStore::new(
            Box::new(GatedCamera { inner: camera.clone(), entered: entered.clone(), gate: gate.clone() }),
            CaptureConstraints::from(&CameraConfig::default()),
            Arc::new(SimulatedAnalyzer::new(&VideoConfig { step_percent: 50, step_interval_ms: 1 })),
        ));
        store.upload_video(clip()).await.unwrap();

        let starting = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.start_camera().await }
        });
        entered.notified().await;

        let analyzing = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.analyze().await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(store.snapshot().status(), VideoStatus::FileLoaded);

        gate.notify_one();
        starting.await.unwrap().unwrap();
        assert!(matches!(analyzing.await.unwrap(), Err(MudraError::InvalidTransition { .. })));

        assert_eq!(store.snapshot().status(), VideoStatus::CameraLive);
        assert_eq!(camera.live_streams(), 1);
        store.stop_camera().await.unwrap();
        assert_eq!(camera.live_streams(), 0);
        assert!(!store.camera_active().await);
    }

    /// Reports 0%, then waits for the test before finishing
    struct GatedAnalyzer {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl VideoAnalyzer for GatedAnalyzer {
        async fn analyze(&self, _source: &VideoSource, progress: &(dyn Fn(u8) + Send + Sync)) -> Result<VideoReport> {
            progress(0);
            self.gate.notified().await;
            progress(100);
            Ok(analysis::placeholder_report())
        }
    }

    #[tokio::test]
    async fn test_report_after_reupload_is_discarded() {
        let gate = Arc::new(Notify::new());
        let store = Arc::new(VideoStore::new(
            Box::new(SyntheticCamera::new(Duration::from_millis(2))),
            CaptureConstraints::from(&CameraConfig::default()),
            Arc::new(GatedAnalyzer { gate: gate.clone() }),
        ));
        store.upload_video(clip()).await.unwrap();

        let running = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.analyze().await }
        });
        while store.snapshot().status() != VideoStatus::Analyzing {
            tokio::task::yield_now().await;
        }

        store
            .upload_video(Artifact::new("second.webm", "video/webm", webm_bytes()))
            .await
            .unwrap();
        gate.notify_one();
        running.await.unwrap().unwrap();

        let session = store.snapshot();
        assert_eq!(session.status(), VideoStatus::FileLoaded);
        assert!(session.report().is_none());
        assert_eq!(session.progress_percent(), 0);
        assert_eq!(session.source().unwrap().artifact.name, "second.webm");
        assert_eq!(*store.subscribe_progress().borrow(), 0);
    }
}
