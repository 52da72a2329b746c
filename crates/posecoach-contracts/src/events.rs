//! Session event log. One JSON line per state transition, tagged by `type`.
//!
//! Events carry ids, sizes and labels only. There is no variant that can hold
//! image bytes.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::pose::{Gender, MatchStatus, Style};
use crate::session::JobId;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        provider: String,
        gender: Gender,
        style: Style,
        gallery_size: usize,
    },
    AnalyzeStarted {
        job: JobId,
        frame_bytes: usize,
        gender: Gender,
        style: Style,
    },
    AnalysisReady {
        job: JobId,
        pose: String,
        reference_bytes: usize,
        landmarks: usize,
        elapsed_ms: u64,
    },
    AnalyzeFailed {
        job: JobId,
        error: String,
    },
    GradeStarted {
        job: JobId,
        frame_bytes: usize,
    },
    PoseGraded {
        job: JobId,
        score: u8,
        match_status: MatchStatus,
        elapsed_ms: u64,
    },
    GradeFailed {
        job: JobId,
        error: String,
    },
    GallerySaved {
        id: String,
        score: u8,
        frame_bytes: usize,
        has_reference: bool,
        gallery_size: usize,
    },
    GalleryRemoved {
        id: String,
        gallery_size: usize,
    },
    CaptureIgnored {
        intent: String,
        reason: String,
    },
    SessionReset {
        abandoned_job: Option<JobId>,
    },
    PipelineTimedOut {
        job: JobId,
        busy: String,
        timeout_s: f64,
    },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::SessionStarted { .. } => "session_started",
            SessionEvent::AnalyzeStarted { .. } => "analyze_started",
            SessionEvent::AnalysisReady { .. } => "analysis_ready",
            SessionEvent::AnalyzeFailed { .. } => "analyze_failed",
            SessionEvent::GradeStarted { .. } => "grade_started",
            SessionEvent::PoseGraded { .. } => "pose_graded",
            SessionEvent::GradeFailed { .. } => "grade_failed",
            SessionEvent::GallerySaved { .. } => "gallery_saved",
            SessionEvent::GalleryRemoved { .. } => "gallery_removed",
            SessionEvent::CaptureIgnored { .. } => "capture_ignored",
            SessionEvent::SessionReset { .. } => "session_reset",
            SessionEvent::PipelineTimedOut { .. } => "pipeline_timed_out",
        }
    }
}

#[derive(Serialize)]
struct EventLine<'a> {
    #[serde(flatten)]
    event: &'a SessionEvent,
    session_id: &'a str,
    ts: String,
}

/// Appends [`SessionEvent`]s to a session's `events.jsonl`. Clones share the
/// file lock, so lines from different threads never interleave.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
    session_id: Arc<str>,
    lock: Arc<Mutex<()>>,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            session_id: Arc::from(session_id.into()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, event: &SessionEvent) -> Result<()> {
        let line = serde_json::to_string(&EventLine {
            event,
            session_id: &self.session_id,
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        })?;
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("event log lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed opening {}", self.path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed appending to {}", self.path.display()))?;
        Ok(())
    }
}
