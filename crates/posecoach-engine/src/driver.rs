//! Runs the session: frames in, remote pipelines on a worker thread, results
//! folded back into [`SessionState`] on the caller's thread.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use posecoach_contracts::errors::{error_chain_text, SessionError};
use posecoach_contracts::events::{EventLog, SessionEvent};
use posecoach_contracts::gallery::GalleryStore;
use posecoach_contracts::pose::{Gender, PoseLandmarks, Style};
use posecoach_contracts::session::{
    AnalysisBundle, BusyKind, Capture, CaptureIntent, Dispatch, IgnoreReason, JobId,
    PipelineOutcome, PipelineRequest, SessionState,
};

use crate::capture::CaptureDevice;
use crate::overlay::render_ghost;
use crate::{timestamp_millis, PoseService};

pub const GALLERY_FILE: &str = "gallery.json";
pub const EVENTS_FILE: &str = "events.jsonl";

/// What a capture turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchReport {
    Started { job: JobId, kind: BusyKind },
    Saved { id: String },
    Ignored(IgnoreReason),
}

struct PipelineWorker {
    job: JobId,
    kind: BusyKind,
    started: Instant,
    rx: Receiver<PipelineOutcome>,
}

pub struct SessionDriver {
    state: SessionState,
    service: Arc<dyn PoseService>,
    gallery: GalleryStore,
    events: EventLog,
    pipeline_timeout: Duration,
    worker: Option<PipelineWorker>,
}

impl SessionDriver {
    pub fn new(
        service: Arc<dyn PoseService>,
        gallery: GalleryStore,
        events: EventLog,
        pipeline_timeout: Duration,
        gender: Gender,
        style: Style,
    ) -> Self {
        let driver = Self {
            state: SessionState::new(gender, style),
            service,
            gallery,
            events,
            pipeline_timeout,
            worker: None,
        };
        driver.emit(SessionEvent::SessionStarted {
            provider: driver.service.name().to_string(),
            gender,
            style,
            gallery_size: driver.gallery.len(),
        });
        driver
    }

    /// Session rooted at `out_dir`: gallery and event log live inside it.
    pub fn open(
        out_dir: &Path,
        service: Arc<dyn PoseService>,
        pipeline_timeout: Duration,
        gender: Gender,
        style: Style,
    ) -> Result<Self> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;
        let events = EventLog::new(
            out_dir.join(EVENTS_FILE),
            uuid::Uuid::new_v4().to_string(),
        );
        let gallery = GalleryStore::open(out_dir.join(GALLERY_FILE));
        Ok(Self::new(service, gallery, events, pipeline_timeout, gender, style))
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn gallery(&self) -> &GalleryStore {
        &self.gallery
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// Takes one frame from `device` and routes it by `intent`.
    ///
    /// While a pipeline is outstanding the device is not touched and the
    /// trigger is ignored. A device failure is returned as a [`SessionError`]
    /// of kind `Device` and leaves the session untouched.
    pub fn capture(
        &mut self,
        intent: CaptureIntent,
        device: &mut dyn CaptureDevice,
    ) -> Result<DispatchReport> {
        if let Some(kind) = self.state.busy() {
            return Ok(self.ignore(intent, IgnoreReason::Busy(kind)));
        }
        let frame = device.capture_frame().map_err(|err| {
            if err.downcast_ref::<SessionError>().is_some() {
                err
            } else {
                anyhow::Error::new(SessionError::device(error_chain_text(&err)))
            }
        })?;
        Ok(self.submit(Capture::new(intent, frame, timestamp_millis())))
    }

    /// Routes an already captured frame.
    pub fn submit(&mut self, capture: Capture) -> DispatchReport {
        let intent = capture.intent;
        let frame_bytes = capture.frame.len();
        match self.state.begin(capture) {
            Dispatch::Remote(request) => {
                let job = request.job();
                let kind = request.busy_kind();
                tracing::info!(job, kind = kind.label(), "pipeline started");
                self.emit(match kind {
                    BusyKind::Analyzing => SessionEvent::AnalyzeStarted {
                        job,
                        frame_bytes,
                        gender: self.state.gender(),
                        style: self.state.style(),
                    },
                    BusyKind::Grading => SessionEvent::GradeStarted { job, frame_bytes },
                });
                self.spawn(request);
                DispatchReport::Started { job, kind }
            }
            Dispatch::Saved(entry) => {
                let score = entry.score;
                let has_reference = entry.reference_image.is_some();
                let id = self.gallery.append(entry);
                tracing::info!(id = %id, score, "gallery entry saved");
                self.emit(SessionEvent::GallerySaved {
                    id: id.clone(),
                    score,
                    frame_bytes,
                    has_reference,
                    gallery_size: self.gallery.len(),
                });
                DispatchReport::Saved { id }
            }
            Dispatch::Ignored(reason) => self.ignore(intent, reason),
        }
    }

    fn ignore(&self, intent: CaptureIntent, reason: IgnoreReason) -> DispatchReport {
        tracing::info!(intent = intent.label(), %reason, "capture ignored");
        self.emit(SessionEvent::CaptureIgnored {
            intent: intent.label().to_string(),
            reason: reason.to_string(),
        });
        DispatchReport::Ignored(reason)
    }

    /// Applies a finished pipeline result if one is ready. Returns `true`
    /// when the outstanding job ended (finished, failed or timed out).
    pub fn poll(&mut self) -> bool {
        let Some(worker) = self.worker.as_ref() else {
            return false;
        };
        match worker.rx.try_recv() {
            Ok(outcome) => {
                self.finish(outcome);
                true
            }
            Err(TryRecvError::Empty) => {
                if worker.started.elapsed() >= self.pipeline_timeout {
                    self.time_out();
                    return true;
                }
                false
            }
            Err(TryRecvError::Disconnected) => {
                self.finish(worker_lost());
                true
            }
        }
    }

    /// Blocks until the outstanding job ends or the pipeline timeout passes.
    pub fn wait(&mut self) -> bool {
        let Some(worker) = self.worker.as_ref() else {
            return false;
        };
        let remaining = self.pipeline_timeout.saturating_sub(worker.started.elapsed());
        match worker.rx.recv_timeout(remaining) {
            Ok(outcome) => self.finish(outcome),
            Err(RecvTimeoutError::Timeout) => self.time_out(),
            Err(RecvTimeoutError::Disconnected) => self.finish(worker_lost()),
        }
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.gallery.remove(id);
        if removed {
            self.emit(SessionEvent::GalleryRemoved {
                id: id.to_string(),
                gallery_size: self.gallery.len(),
            });
        }
        removed
    }

    /// Back to Idle. An outstanding pipeline keeps running but its result is
    /// dropped.
    pub fn reset(&mut self) {
        let abandoned = self.worker.take().map(|worker| worker.job);
        self.state.reset();
        self.emit(SessionEvent::SessionReset {
            abandoned_job: abandoned,
        });
    }

    pub fn set_gender(&mut self, gender: Gender) {
        self.state.set_gender(gender);
    }

    pub fn set_style(&mut self, style: Style) {
        self.state.set_style(style);
    }

    /// Ghost overlay of the reference over the last captured frame.
    pub fn ghost(&self, opacity: f32) -> Result<Vec<u8>> {
        render_ghost(
            self.state.last_frame(),
            self.state.reference_image(),
            self.state.landmarks(),
            opacity,
        )
    }

    fn spawn(&mut self, request: PipelineRequest) {
        let job = request.job();
        let kind = request.busy_kind();
        let (tx, rx) = mpsc::channel();
        let service = Arc::clone(&self.service);
        self.worker = Some(PipelineWorker {
            job,
            kind,
            started: Instant::now(),
            rx,
        });
        let spawned = thread::Builder::new()
            .name(format!("posecoach-{}", kind.label()))
            .spawn(move || {
                let _ = tx.send(run_pipeline(service.as_ref(), request));
            });
        if let Err(err) = spawned {
            self.finish(PipelineOutcome::Failed(SessionError::generation(format!(
                "pipeline thread spawn failed: {err}"
            ))));
        }
    }

    fn finish(&mut self, outcome: PipelineOutcome) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let job = worker.job;
        let elapsed_ms = worker.started.elapsed().as_millis() as u64;
        let event = match (&outcome, worker.kind) {
            (PipelineOutcome::Analyzed(bundle), _) => SessionEvent::AnalysisReady {
                job,
                pose: bundle.analysis.suggested_pose.title.clone(),
                reference_bytes: bundle.reference_image.len(),
                landmarks: bundle.landmarks.as_ref().map(PoseLandmarks::len).unwrap_or(0),
                elapsed_ms,
            },
            (PipelineOutcome::Graded(feedback), _) => SessionEvent::PoseGraded {
                job,
                score: feedback.score,
                match_status: feedback.match_status,
                elapsed_ms,
            },
            (PipelineOutcome::Failed(err), kind) => {
                tracing::warn!(job, kind = kind.label(), error = %err, "pipeline failed");
                let error = err.message().to_string();
                match kind {
                    BusyKind::Analyzing => SessionEvent::AnalyzeFailed { job, error },
                    BusyKind::Grading => SessionEvent::GradeFailed { job, error },
                }
            }
        };
        if self.state.complete(job, outcome) {
            self.emit(event);
        } else {
            tracing::debug!(job, "stale pipeline result dropped");
        }
    }

    fn time_out(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let seconds = self.pipeline_timeout.as_secs_f64();
        tracing::warn!(job = worker.job, kind = worker.kind.label(), seconds, "pipeline timed out");
        self.state.complete(
            worker.job,
            PipelineOutcome::Failed(SessionError::generation(format!(
                "{} timed out after {seconds:.1}s",
                worker.kind.label()
            ))),
        );
        self.emit(SessionEvent::PipelineTimedOut {
            job: worker.job,
            busy: worker.kind.label().to_string(),
            timeout_s: seconds,
        });
    }

    fn emit(&self, event: SessionEvent) {
        if let Err(err) = self.events.append(&event) {
            tracing::warn!(
                event = event.name(),
                error = %format!("{err:#}"),
                "event log write failed"
            );
        }
    }
}

fn worker_lost() -> PipelineOutcome {
    PipelineOutcome::Failed(SessionError::generation(
        "pipeline worker exited without a result",
    ))
}

/// Executes one request against the service. Runs on the worker thread.
pub fn run_pipeline(service: &dyn PoseService, request: PipelineRequest) -> PipelineOutcome {
    let result = match request {
        PipelineRequest::Analyze {
            frame,
            gender,
            style,
            ..
        } => analyze_pipeline(service, &frame, gender, style).map(PipelineOutcome::Analyzed),
        PipelineRequest::Grade { frame, target, .. } => service
            .evaluate_match(&frame, &target)
            .context("pose grading failed")
            .map(PipelineOutcome::Graded),
    };
    result.unwrap_or_else(|err| PipelineOutcome::Failed(SessionError::generation_from(&err)))
}

/// Scene analysis, then the reference image, then landmarks on that image.
/// The first failure abandons the rest.
fn analyze_pipeline(
    service: &dyn PoseService,
    frame: &[u8],
    gender: Gender,
    style: Style,
) -> Result<AnalysisBundle> {
    let analysis = service
        .analyze_scene(frame, gender, style)
        .context("scene analysis failed")?;
    let reference_image = service
        .generate_reference(&analysis.suggested_pose.target_description(), gender, style)
        .context("reference generation failed")?;
    let landmarks = service
        .extract_landmarks(&reference_image)
        .context("landmark extraction failed")?;
    Ok(AnalysisBundle {
        analysis,
        reference_image,
        landmarks,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use anyhow::{anyhow, bail, Result};
    use posecoach_contracts::errors::{ErrorKind, SessionError};
    use posecoach_contracts::events::EventLog;
    use posecoach_contracts::gallery::GalleryStore;
    use posecoach_contracts::pose::{
        AnalysisResult, BodyPart, Gender, MatchStatus, PoseFeedback, PoseLandmarks, Style,
    };
    use posecoach_contracts::session::{BusyKind, CaptureIntent, IgnoreReason, Phase};
    use serde_json::{json, Value};

    use super::{DispatchReport, SessionDriver};
    use crate::capture::CaptureDevice;
    use crate::PoseService;

    const REFERENCE: &[u8] = b"reference-bytes";

    #[derive(Default)]
    struct ScriptedService {
        fail_analyze: bool,
        fail_reference: bool,
        fail_landmarks: bool,
        no_landmarks: bool,
        delay: Option<Duration>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedService {
        fn record(&self, call: String) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call);
            }
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }
    }

    impl PoseService for ScriptedService {
        fn name(&self) -> &str {
            "scripted"
        }

        fn analyze_scene(&self, image: &[u8], gender: Gender, style: Style) -> Result<AnalysisResult> {
            self.record(format!("analyze:{}:{}:{}", String::from_utf8_lossy(image), gender, style));
            if self.fail_analyze {
                bail!("model overloaded");
            }
            AnalysisResult::from_value(&json!({
                "environment": "Bedroom with a window",
                "lighting": {"quality": "Good", "direction": "Left window", "suggestion": "Face the window"},
                "background": {"clutterLevel": "Moderate", "suggestion": "Clear the bed"},
                "suggestedPose": {
                    "title": "Candid Lean",
                    "description": "Lean on the wall",
                    "difficulty": "Easy",
                    "steps": ["Lean", "Smile"],
                },
            }))
            .map_err(|err| anyhow!(err))
        }

        fn generate_reference(&self, pose_description: &str, _: Gender, _: Style) -> Result<Vec<u8>> {
            self.record(format!("reference:{pose_description}"));
            if self.fail_reference {
                bail!("quota exceeded");
            }
            Ok(REFERENCE.to_vec())
        }

        fn evaluate_match(&self, image: &[u8], target: &str) -> Result<PoseFeedback> {
            self.record(format!("grade:{}:{target}", String::from_utf8_lossy(image)));
            Ok(PoseFeedback {
                score: 72,
                match_status: MatchStatus::Good,
                adjustments: vec!["Chin up".to_string()],
            })
        }

        fn extract_landmarks(&self, image: &[u8]) -> Result<Option<PoseLandmarks>> {
            self.record(format!("landmarks:{}", String::from_utf8_lossy(image)));
            if self.fail_landmarks {
                bail!("landmark response malformed");
            }
            if self.no_landmarks {
                return Ok(None);
            }
            Ok(Some(PoseLandmarks::new().with_point(BodyPart::Nose, 50.0, 15.0)))
        }
    }

    /// Hands out the queued frames, then fails like an unplugged camera.
    struct Frames {
        queue: Vec<&'static [u8]>,
        reads: usize,
    }

    impl Frames {
        fn of(queue: Vec<&'static [u8]>) -> Self {
            Self { queue, reads: 0 }
        }
    }

    impl CaptureDevice for Frames {
        fn capture_frame(&mut self) -> Result<Vec<u8>> {
            self.reads += 1;
            if self.queue.is_empty() {
                bail!("camera unplugged");
            }
            Ok(self.queue.remove(0).to_vec())
        }
    }

    fn driver(dir: &std::path::Path, service: Arc<ScriptedService>, timeout: Duration) -> SessionDriver {
        SessionDriver::new(
            service,
            GalleryStore::open(dir.join("gallery.json")),
            EventLog::new(dir.join("events.jsonl"), "test-session"),
            timeout,
            Gender::Female,
            Style::Casual,
        )
    }

    fn event_types(dir: &std::path::Path) -> Vec<String> {
        std::fs::read_to_string(dir.join("events.jsonl"))
            .unwrap_or_default()
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|event| event["type"].as_str().map(str::to_string))
            .collect()
    }

    #[test]
    fn analyze_grade_save_cycle() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let service = Arc::new(ScriptedService::default());
        let mut driver = driver(temp.path(), service.clone(), Duration::from_secs(10));
        let mut camera = Frames::of(vec![b"bedroom photo", b"me posing", b"keeper"]);

        let started = driver.capture(CaptureIntent::Analyze, &mut camera)?;
        assert_eq!(started, DispatchReport::Started { job: 1, kind: BusyKind::Analyzing });
        assert_eq!(driver.state().phase(), Phase::Idle);
        assert!(driver.wait());
        assert_eq!(driver.state().phase(), Phase::Suggested);
        assert_eq!(
            driver.state().analysis().map(|a| a.suggested_pose.title.as_str()),
            Some("Candid Lean")
        );
        assert_eq!(driver.state().reference_image(), Some(REFERENCE));
        assert!(driver.state().landmarks().and_then(|l| l.get(BodyPart::Nose)).is_some());

        driver.capture(CaptureIntent::Grade, &mut camera)?;
        assert!(driver.wait());
        assert_eq!(driver.state().phase(), Phase::Graded);
        assert_eq!(driver.state().feedback().map(|fb| fb.score), Some(72));

        let saved = driver.capture(CaptureIntent::Save, &mut camera)?;
        let DispatchReport::Saved { id } = saved else {
            panic!("expected a gallery save");
        };
        let entry = driver.gallery().get(&id).cloned().unwrap();
        assert_eq!(entry.score, 72);
        assert_eq!(entry.image_data, b"keeper".to_vec());
        assert_eq!(entry.reference_image.as_deref(), Some(REFERENCE));
        assert_eq!(driver.gallery().entries()[0].id, id);

        assert_eq!(
            service.calls(),
            vec![
                "analyze:bedroom photo:Female:Casual".to_string(),
                "reference:Candid Lean: Lean on the wall Steps: Lean; Smile".to_string(),
                "landmarks:reference-bytes".to_string(),
                "grade:me posing:Candid Lean: Lean on the wall Steps: Lean; Smile".to_string(),
            ]
        );
        assert_eq!(
            event_types(temp.path()),
            vec![
                "session_started",
                "analyze_started",
                "analysis_ready",
                "grade_started",
                "pose_graded",
                "gallery_saved",
            ]
        );
        Ok(())
    }

    #[test]
    fn reference_failure_discards_partial_analysis() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let service = Arc::new(ScriptedService {
            fail_reference: true,
            ..ScriptedService::default()
        });
        let mut driver = driver(temp.path(), service.clone(), Duration::from_secs(10));
        driver.capture(CaptureIntent::Analyze, &mut Frames::of(vec![b"room"]))?;
        driver.wait();

        assert_eq!(driver.state().phase(), Phase::Idle);
        assert!(driver.state().analysis().is_none());
        assert!(driver.state().reference_image().is_none());
        assert_eq!(driver.state().busy(), None);
        let err = driver.state().error().cloned().unwrap();
        assert_eq!(err.kind(), ErrorKind::Generation);
        assert!(err.message().contains("quota exceeded"));
        // landmarks never requested
        assert_eq!(service.calls().len(), 2);
        assert_eq!(event_types(temp.path()).last().map(String::as_str), Some("analyze_failed"));
        Ok(())
    }

    #[test]
    fn absent_landmarks_are_not_a_failure() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let service = Arc::new(ScriptedService {
            no_landmarks: true,
            ..ScriptedService::default()
        });
        let mut driver = driver(temp.path(), service, Duration::from_secs(10));
        driver.capture(CaptureIntent::Analyze, &mut Frames::of(vec![b"room"]))?;
        driver.wait();
        assert_eq!(driver.state().phase(), Phase::Suggested);
        assert!(driver.state().landmarks().is_none());
        assert!(driver.state().error().is_none());
        Ok(())
    }

    #[test]
    fn grade_and_save_without_suggestion_make_no_remote_call() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let service = Arc::new(ScriptedService::default());
        let mut driver = driver(temp.path(), service.clone(), Duration::from_secs(10));
        let mut camera = Frames::of(vec![b"a", b"b"]);
        assert_eq!(
            driver.capture(CaptureIntent::Grade, &mut camera)?,
            DispatchReport::Ignored(IgnoreReason::NoSuggestion)
        );
        assert_eq!(
            driver.capture(CaptureIntent::Save, &mut camera)?,
            DispatchReport::Ignored(IgnoreReason::NoSuggestion)
        );
        assert!(!driver.poll());
        assert!(service.calls().is_empty());
        assert!(driver.gallery().is_empty());
        Ok(())
    }

    #[test]
    fn capture_while_busy_is_ignored() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let service = Arc::new(ScriptedService {
            delay: Some(Duration::from_millis(100)),
            ..ScriptedService::default()
        });
        let mut driver = driver(temp.path(), service.clone(), Duration::from_secs(10));
        let mut camera = Frames::of(vec![b"first", b"second"]);
        driver.capture(CaptureIntent::Analyze, &mut camera)?;
        assert_eq!(
            driver.capture(CaptureIntent::Analyze, &mut camera)?,
            DispatchReport::Ignored(IgnoreReason::Busy(BusyKind::Analyzing))
        );
        driver.wait();
        assert_eq!(driver.state().phase(), Phase::Suggested);
        assert_eq!(service.calls().iter().filter(|c| c.starts_with("analyze")).count(), 1);
        Ok(())
    }

    #[test]
    fn busy_trigger_never_reads_the_device() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let service = Arc::new(ScriptedService {
            delay: Some(Duration::from_millis(100)),
            ..ScriptedService::default()
        });
        let mut driver = driver(temp.path(), service, Duration::from_secs(10));
        // one frame only: a second read would fail as unplugged
        let mut camera = Frames::of(vec![b"room"]);
        driver.capture(CaptureIntent::Analyze, &mut camera)?;

        for intent in [CaptureIntent::Grade, CaptureIntent::Save, CaptureIntent::Analyze] {
            assert_eq!(
                driver.capture(intent, &mut camera)?,
                DispatchReport::Ignored(IgnoreReason::Busy(BusyKind::Analyzing))
            );
        }
        assert_eq!(camera.reads, 1);
        assert!(driver.wait());
        assert_eq!(driver.state().phase(), Phase::Suggested);
        assert!(driver.state().error().is_none());
        let ignored = event_types(temp.path())
            .iter()
            .filter(|kind| kind.as_str() == "capture_ignored")
            .count();
        assert_eq!(ignored, 3);
        Ok(())
    }

    #[test]
    fn analysis_failure_stops_the_pipeline() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let service = Arc::new(ScriptedService {
            fail_analyze: true,
            ..ScriptedService::default()
        });
        let mut driver = driver(temp.path(), service.clone(), Duration::from_secs(10));
        driver.capture(CaptureIntent::Analyze, &mut Frames::of(vec![b"room"]))?;
        driver.wait();

        assert_eq!(driver.state().phase(), Phase::Idle);
        assert!(driver.state().analysis().is_none());
        assert!(driver.state().reference_image().is_none());
        assert!(driver.state().landmarks().is_none());
        assert_eq!(driver.state().busy(), None);
        let err = driver.state().error().cloned().unwrap();
        assert_eq!(err.kind(), ErrorKind::Generation);
        assert!(err.message().contains("model overloaded"));
        assert_eq!(service.calls(), vec!["analyze:room:Female:Casual".to_string()]);
        Ok(())
    }

    #[test]
    fn landmark_failure_discards_analysis_and_reference() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let service = Arc::new(ScriptedService {
            fail_landmarks: true,
            ..ScriptedService::default()
        });
        let mut driver = driver(temp.path(), service.clone(), Duration::from_secs(10));
        driver.capture(CaptureIntent::Analyze, &mut Frames::of(vec![b"room"]))?;
        driver.wait();

        assert_eq!(driver.state().phase(), Phase::Idle);
        assert!(driver.state().analysis().is_none());
        assert!(driver.state().reference_image().is_none());
        assert!(driver.state().landmarks().is_none());
        let err = driver.state().error().cloned().unwrap();
        assert_eq!(err.kind(), ErrorKind::Generation);
        assert!(err.message().contains("landmark response malformed"));
        assert_eq!(service.calls().len(), 3);
        assert_eq!(event_types(temp.path()).last().map(String::as_str), Some("analyze_failed"));
        Ok(())
    }

    #[test]
    fn timeout_fails_job_and_drops_late_result() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let service = Arc::new(ScriptedService {
            delay: Some(Duration::from_millis(300)),
            ..ScriptedService::default()
        });
        let mut driver = driver(temp.path(), service, Duration::from_millis(50));
        driver.capture(CaptureIntent::Analyze, &mut Frames::of(vec![b"slow"]))?;
        assert!(driver.wait());
        assert_eq!(driver.state().busy(), None);
        assert_eq!(
            driver.state().error().map(SessionError::kind),
            Some(ErrorKind::Generation)
        );

        thread::sleep(Duration::from_millis(1000));
        assert!(!driver.poll());
        assert!(driver.state().analysis().is_none());
        assert!(event_types(temp.path()).contains(&"pipeline_timed_out".to_string()));
        Ok(())
    }

    #[test]
    fn reset_abandons_outstanding_pipeline() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let service = Arc::new(ScriptedService {
            delay: Some(Duration::from_millis(50)),
            ..ScriptedService::default()
        });
        let mut driver = driver(temp.path(), service, Duration::from_secs(10));
        driver.set_style(Style::Editorial);
        driver.capture(CaptureIntent::Analyze, &mut Frames::of(vec![b"room"]))?;
        driver.reset();
        assert!(!driver.wait());
        assert_eq!(driver.state().busy(), None);
        assert_eq!(driver.state().style(), Style::Editorial);
        assert_eq!(driver.state().phase(), Phase::Idle);
        Ok(())
    }

    #[test]
    fn device_failure_is_a_device_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut driver = driver(temp.path(), Arc::new(ScriptedService::default()), Duration::from_secs(1));
        let err = driver
            .capture(CaptureIntent::Analyze, &mut Frames::of(Vec::new()))
            .err()
            .unwrap();
        let session_err = err.downcast_ref::<SessionError>().unwrap();
        assert_eq!(session_err.kind(), ErrorKind::Device);
        assert!(session_err.is_fatal());
        assert_eq!(driver.state().busy(), None);
        Ok(())
    }

    #[test]
    fn remove_and_ghost() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut driver = driver(temp.path(), Arc::new(ScriptedService::default()), Duration::from_secs(10));
        assert!(driver.ghost(0.4).is_err());
        assert!(!driver.remove("missing"));
        assert!(!event_types(temp.path()).contains(&"gallery_removed".to_string()));
        Ok(())
    }
}
