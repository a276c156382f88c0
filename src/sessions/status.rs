//! Session status inference
//!
//! The gateway does not always report a live status, so the console infers
//! one from how recently the session was updated. This is a presentation
//! heuristic only: it may disagree with the backend under clock skew or
//! bursty updates. The single precedence rule is that an explicit `failed`
//! from the backend is always kept.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Younger than this: running
pub const RUNNING_WINDOW: Duration = Duration::seconds(30);
/// Younger than this: idle
pub const IDLE_WINDOW: Duration = Duration::seconds(120);
/// Younger than this: waiting
pub const WAITING_WINDOW: Duration = Duration::seconds(300);
/// Younger than this: sleeping; anything older is completed
pub const SLEEPING_WINDOW: Duration = Duration::seconds(900);

/// Displayed session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Idle,
    Waiting,
    Sleeping,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Idle => "idle",
            SessionStatus::Waiting => "waiting",
            SessionStatus::Sleeping => "sleeping",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    /// Whether the session is still doing or about to do work
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Running | SessionStatus::Idle | SessionStatus::Waiting)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Infer a status from the backend's explicit status and the last update time.
///
/// A missing `updated_at` infers `Completed`; a timestamp in the future
/// counts as age zero.
pub fn infer_status(
    explicit: Option<&str>,
    updated_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> SessionStatus {
    if explicit.map_or(false, |s| s.eq_ignore_ascii_case("failed")) {
        return SessionStatus::Failed;
    }

    let Some(updated_at) = updated_at else {
        return SessionStatus::Completed;
    };

    let age = (now - updated_at).max(Duration::zero());
    if age < RUNNING_WINDOW {
        SessionStatus::Running
    } else if age < IDLE_WINDOW {
        SessionStatus::Idle
    } else if age < WAITING_WINDOW {
        SessionStatus::Waiting
    } else if age < SLEEPING_WINDOW {
        SessionStatus::Sleeping
    } else {
        SessionStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ago(now: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
        Some(now - Duration::seconds(secs))
    }

    #[test]
    fn test_age_windows() {
        let now = Utc::now();
        assert_eq!(infer_status(None, ago(now, 10), now), SessionStatus::Running);
        assert_eq!(infer_status(None, ago(now, 60), now), SessionStatus::Idle);
        assert_eq!(infer_status(None, ago(now, 200), now), SessionStatus::Waiting);
        assert_eq!(infer_status(None, ago(now, 600), now), SessionStatus::Sleeping);
        assert_eq!(infer_status(None, ago(now, 3600), now), SessionStatus::Completed);
    }

    #[test]
    fn test_window_boundaries_are_exclusive() {
        let now = Utc::now();
        assert_eq!(infer_status(None, ago(now, 29), now), SessionStatus::Running);
        assert_eq!(infer_status(None, ago(now, 30), now), SessionStatus::Idle);
        assert_eq!(infer_status(None, ago(now, 900), now), SessionStatus::Completed);
    }

    #[test]
    fn test_explicit_failed_is_never_overridden() {
        let now = Utc::now();
        for secs in [0, 10, 200, 899, 100_000] {
            assert_eq!(infer_status(Some("failed"), ago(now, secs), now), SessionStatus::Failed);
        }
        assert_eq!(infer_status(Some("FAILED"), None, now), SessionStatus::Failed);
    }

    #[test]
    fn test_other_explicit_statuses_do_not_override() {
        let now = Utc::now();
        assert_eq!(infer_status(Some("completed"), ago(now, 5), now), SessionStatus::Running);
        assert_eq!(infer_status(Some("running"), ago(now, 5000), now), SessionStatus::Completed);
    }

    #[test]
    fn test_missing_and_future_timestamps() {
        let now = Utc::now();
        assert_eq!(infer_status(None, None, now), SessionStatus::Completed);
        assert_eq!(infer_status(None, ago(now, -120), now), SessionStatus::Running);
    }
}
