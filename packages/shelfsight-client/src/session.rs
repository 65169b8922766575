use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progress::ProgressGauge;

/// Lifecycle of one analysis session. Terminal phases persist until an
/// explicit reset returns the session to `Upload`; there is no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Upload,
    Processing,
    Completed,
    Error,
}

impl SessionPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionPhase::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Completed | SessionPhase::Error)
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionPhase::Upload => "upload",
            SessionPhase::Processing => "processing",
            SessionPhase::Completed => "completed",
            SessionPhase::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Everything that can move the session. Progress-bearing events carry the
/// attempt they belong to so stale work can never touch a later session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    SubmissionAccepted {
        attempt: u64,
        at: DateTime<Utc>,
    },
    TransferAdvanced {
        attempt: u64,
        sent_bytes: u64,
        total_bytes: u64,
    },
    ClockTick {
        attempt: u64,
        elapsed_secs: u64,
    },
    AnalysisSucceeded {
        attempt: u64,
        at: DateTime<Utc>,
    },
    AnalysisFailed {
        attempt: u64,
        message: String,
        at: DateTime<Utc>,
    },
    SessionReset,
}

/// Observable session state. Cloned out to callers; mutated only through
/// [`reduce`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    /// Generation counter, incremented on each accepted submission.
    pub attempt: u64,
    pub progress: ProgressGauge,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionSnapshot {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Upload,
            attempt: 0,
            progress: ProgressGauge::idle(),
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    fn matches(&self, attempt: u64) -> bool {
        self.phase == SessionPhase::Processing && self.attempt == attempt
    }
}

/// Pure transition function. Events that do not apply to the current
/// phase or attempt leave the state untouched, which is what makes the
/// timer-lifecycle and no-regression invariants hold by construction: a
/// late tick after completion, failure, or reset is a no-op.
pub fn reduce(current: &SessionSnapshot, event: &SessionEvent) -> SessionSnapshot {
    let mut next = current.clone();
    match event {
        SessionEvent::SubmissionAccepted { attempt, at } => {
            if current.phase == SessionPhase::Upload {
                next.phase = SessionPhase::Processing;
                next.attempt = *attempt;
                next.progress = ProgressGauge::started();
                next.error = None;
                next.started_at = Some(*at);
                next.finished_at = None;
            }
        }
        SessionEvent::TransferAdvanced {
            attempt,
            sent_bytes,
            total_bytes,
        } => {
            if current.matches(*attempt) {
                next.progress.record_transfer(*sent_bytes, *total_bytes);
            }
        }
        SessionEvent::ClockTick {
            attempt,
            elapsed_secs,
        } => {
            if current.matches(*attempt) {
                next.progress.record_tick(*elapsed_secs);
            }
        }
        SessionEvent::AnalysisSucceeded { attempt, at } => {
            if current.matches(*attempt) {
                next.phase = SessionPhase::Completed;
                next.progress.complete();
                next.finished_at = Some(*at);
            }
        }
        SessionEvent::AnalysisFailed {
            attempt,
            message,
            at,
        } => {
            if current.matches(*attempt) {
                next.phase = SessionPhase::Error;
                next.error = Some(message.clone());
                next.progress.clear();
                next.finished_at = Some(*at);
            }
        }
        SessionEvent::SessionReset => {
            next = SessionSnapshot {
                phase: SessionPhase::Upload,
                attempt: current.attempt,
                progress: ProgressGauge::idle(),
                error: None,
                started_at: None,
                finished_at: None,
            };
        }
    }
    next
}
