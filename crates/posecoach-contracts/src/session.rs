//! Capture-intent routing and the session state machine.
//!
//! Every capture carries its intent with it. [`SessionState::begin`] decides
//! what the frame is for and hands back a side-effect request; the caller runs
//! the request and folds the result back in with [`SessionState::complete`].
//! Nothing here performs I/O.

use std::fmt;

use serde_json::{json, Value};

use crate::errors::SessionError;
use crate::gallery::GalleryImage;
use crate::pose::{AnalysisResult, Gender, PoseFeedback, PoseLandmarks, Style};

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureIntent {
    Analyze,
    Grade,
    Save,
}

impl CaptureIntent {
    pub fn label(self) -> &'static str {
        match self {
            CaptureIntent::Analyze => "analyze",
            CaptureIntent::Grade => "grade",
            CaptureIntent::Save => "save",
        }
    }
}

/// One frame bound to the purpose it was taken for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub intent: CaptureIntent,
    pub frame: Vec<u8>,
    /// Capture time, unix milliseconds.
    pub captured_at: i64,
}

impl Capture {
    pub fn new(intent: CaptureIntent, frame: Vec<u8>, captured_at: i64) -> Self {
        Self {
            intent,
            frame,
            captured_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Suggested,
    Graded,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Suggested => "suggested",
            Phase::Graded => "graded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyKind {
    Analyzing,
    Grading,
}

impl BusyKind {
    pub fn label(self) -> &'static str {
        match self {
            BusyKind::Analyzing => "analyzing",
            BusyKind::Grading => "grading",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Busy(BusyKind),
    /// Grade and save need a suggested pose first.
    NoSuggestion,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::Busy(kind) => write!(f, "busy ({}), capture ignored", kind.label()),
            IgnoreReason::NoSuggestion => f.write_str("no pose suggested yet, capture ignored"),
        }
    }
}

/// Remote work requested by a capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineRequest {
    /// analyze scene, then generate the reference, then extract landmarks
    Analyze {
        job: JobId,
        frame: Vec<u8>,
        gender: Gender,
        style: Style,
    },
    Grade {
        job: JobId,
        frame: Vec<u8>,
        target: String,
    },
}

impl PipelineRequest {
    pub fn job(&self) -> JobId {
        match self {
            PipelineRequest::Analyze { job, .. } | PipelineRequest::Grade { job, .. } => *job,
        }
    }

    pub fn busy_kind(&self) -> BusyKind {
        match self {
            PipelineRequest::Analyze { .. } => BusyKind::Analyzing,
            PipelineRequest::Grade { .. } => BusyKind::Grading,
        }
    }
}

/// Everything a successful analyze pipeline produces.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisBundle {
    pub analysis: AnalysisResult,
    pub reference_image: Vec<u8>,
    pub landmarks: Option<PoseLandmarks>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Analyzed(AnalysisBundle),
    Graded(PoseFeedback),
    Failed(SessionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Remote(PipelineRequest),
    Saved(GalleryImage),
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    job: JobId,
    kind: BusyKind,
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    analysis: Option<AnalysisResult>,
    feedback: Option<PoseFeedback>,
    reference_image: Option<Vec<u8>>,
    landmarks: Option<PoseLandmarks>,
    last_frame: Option<Vec<u8>>,
    gender: Gender,
    style: Style,
    pending: Option<Pending>,
    error: Option<SessionError>,
    next_job: JobId,
}

impl SessionState {
    pub fn new(gender: Gender, style: Style) -> Self {
        Self {
            gender,
            style,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> Phase {
        match (&self.analysis, &self.feedback) {
            (None, _) => Phase::Idle,
            (Some(_), None) => Phase::Suggested,
            (Some(_), Some(_)) => Phase::Graded,
        }
    }

    pub fn busy(&self) -> Option<BusyKind> {
        self.pending.map(|pending| pending.kind)
    }

    pub fn pending_job(&self) -> Option<JobId> {
        self.pending.map(|pending| pending.job)
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    pub fn feedback(&self) -> Option<&PoseFeedback> {
        self.feedback.as_ref()
    }

    pub fn reference_image(&self) -> Option<&[u8]> {
        self.reference_image.as_deref()
    }

    pub fn landmarks(&self) -> Option<&PoseLandmarks> {
        self.landmarks.as_ref()
    }

    /// Most recent frame captured for any intent.
    pub fn last_frame(&self) -> Option<&[u8]> {
        self.last_frame.as_deref()
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn style(&self) -> Style {
        self.style
    }

    pub fn set_gender(&mut self, gender: Gender) {
        self.gender = gender;
    }

    pub fn set_style(&mut self, style: Style) {
        self.style = style;
    }

    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    /// Routes a captured frame by its intent.
    pub fn begin(&mut self, capture: Capture) -> Dispatch {
        if let Some(kind) = self.busy() {
            return Dispatch::Ignored(IgnoreReason::Busy(kind));
        }

        match capture.intent {
            CaptureIntent::Analyze => {
                self.analysis = None;
                self.feedback = None;
                self.reference_image = None;
                self.landmarks = None;
                self.error = None;
                self.last_frame = Some(capture.frame.clone());
                let job = self.start(BusyKind::Analyzing);
                Dispatch::Remote(PipelineRequest::Analyze {
                    job,
                    frame: capture.frame,
                    gender: self.gender,
                    style: self.style,
                })
            }
            CaptureIntent::Grade => {
                let Some(analysis) = self.analysis.as_ref() else {
                    return Dispatch::Ignored(IgnoreReason::NoSuggestion);
                };
                let target = analysis.suggested_pose.target_description();
                self.error = None;
                self.last_frame = Some(capture.frame.clone());
                let job = self.start(BusyKind::Grading);
                Dispatch::Remote(PipelineRequest::Grade {
                    job,
                    frame: capture.frame,
                    target,
                })
            }
            CaptureIntent::Save => {
                if self.analysis.is_none() {
                    return Dispatch::Ignored(IgnoreReason::NoSuggestion);
                }
                let score = self.feedback.as_ref().map(|fb| fb.score).unwrap_or(0);
                self.last_frame = Some(capture.frame.clone());
                Dispatch::Saved(GalleryImage::from_capture(
                    capture.frame,
                    self.reference_image.clone(),
                    score,
                    capture.captured_at,
                ))
            }
        }
    }

    /// Folds a pipeline result back in. Returns `false` when `job` is not the
    /// outstanding job (stale after a reset or timeout); nothing changes then.
    pub fn complete(&mut self, job: JobId, outcome: PipelineOutcome) -> bool {
        let Some(pending) = self.pending else {
            return false;
        };
        if pending.job != job {
            return false;
        }
        self.pending = None;

        match (pending.kind, outcome) {
            (BusyKind::Analyzing, PipelineOutcome::Analyzed(bundle)) => {
                self.analysis = Some(bundle.analysis);
                self.reference_image = Some(bundle.reference_image);
                self.landmarks = bundle.landmarks;
                self.feedback = None;
            }
            (BusyKind::Grading, PipelineOutcome::Graded(feedback)) => {
                if self.analysis.is_some() {
                    self.feedback = Some(feedback);
                }
            }
            (_, PipelineOutcome::Failed(err)) => {
                self.error = Some(err);
            }
            (kind, _) => {
                self.error = Some(SessionError::generation(format!(
                    "unexpected pipeline result while {}",
                    kind.label()
                )));
            }
        }
        true
    }

    /// Back to Idle. Gender and style survive; an outstanding job's result
    /// will be rejected when it arrives.
    pub fn reset(&mut self) {
        self.analysis = None;
        self.feedback = None;
        self.reference_image = None;
        self.landmarks = None;
        self.last_frame = None;
        self.error = None;
        self.pending = None;
    }

    pub fn status_json(&self) -> Value {
        json!({
            "phase": self.phase().label(),
            "busy": self.busy().map(BusyKind::label),
            "gender": self.gender.label(),
            "style": self.style.label(),
            "pose": self.analysis.as_ref().map(|a| a.suggested_pose.title.clone()),
            "score": self.feedback.as_ref().map(|fb| fb.score),
            "has_reference": self.reference_image.is_some(),
            "landmarks": self.landmarks.as_ref().map(PoseLandmarks::len).unwrap_or(0),
            "error": self.error.as_ref().map(|err| err.user_message()),
        })
    }

    fn start(&mut self, kind: BusyKind) -> JobId {
        self.next_job += 1;
        let job = self.next_job;
        self.pending = Some(Pending { job, kind });
        job
    }
}
