//! Session polling loop
//!
//! Polls the gateway on a fixed interval and feeds the results into a
//! [`SessionBoard`]. Results that land after `stop()` are discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::{AgentSession, SessionBoard};
use crate::error::Result;

/// Shortest interval the poller will run at
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Something that can list sessions
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn fetch_sessions(&self, limit: u32) -> Result<Vec<AgentSession>>;
}

/// Background poller handle
pub struct SessionPoller {
    alive: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl SessionPoller {
    /// Start polling immediately, then every `interval` (at least
    /// [`MIN_POLL_INTERVAL`]). Must be called from within a Tokio runtime.
    pub fn start(
        source: Arc<dyn SessionSource>,
        board: SessionBoard,
        interval: Duration,
        limit: u32,
    ) -> Self {
        if interval < MIN_POLL_INTERVAL {
            warn!(
                "Poll interval {:?} is too short, using {:?}",
                interval, MIN_POLL_INTERVAL
            );
        }
        let interval = interval.max(MIN_POLL_INTERVAL);

        let alive = Arc::new(AtomicBool::new(true));
        let guard = alive.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Session poller started, interval: {:?}", interval);

            loop {
                ticker.tick().await;
                match source.fetch_sessions(limit).await {
                    Ok(sessions) => {
                        if !guard.load(Ordering::SeqCst) {
                            break;
                        }
                        let count = sessions.len();
                        let changed = board.apply_poll(sessions);
                        debug!(count, changed, "Session poll applied");
                    }
                    Err(e) => warn!("Session poll failed: {}", e),
                }
            }
        });

        SessionPoller { alive, handle }
    }

    /// Stop polling; in-flight results are dropped
    pub fn stop(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.handle.is_finished()
    }
}

impl Drop for SessionPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;

    struct FakeSource {
        calls: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl SessionSource for FakeSource {
        async fn fetch_sessions(&self, _limit: u32) -> Result<Vec<AgentSession>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err(Error::Gateway("boom".into()));
            }
            let mut session = AgentSession::new(format!("agent:main:{}", call));
            session.updated_at = Some(Utc::now());
            Ok(vec![session])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_interval() {
        let source = Arc::new(FakeSource {
            calls: AtomicUsize::new(0),
            fail_first: false,
        });
        let board = SessionBoard::new();
        let poller =
            SessionPoller::start(source.clone(), board.clone(), Duration::from_secs(10), 50);

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(board.len(), 3);

        poller.stop();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_do_not_stop_polling() {
        let source = Arc::new(FakeSource {
            calls: AtomicUsize::new(0),
            fail_first: true,
        });
        let board = SessionBoard::new();
        let _poller =
            SessionPoller::start(source.clone(), board.clone(), Duration::from_secs(10), 50);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(board.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let source = Arc::new(FakeSource {
            calls: AtomicUsize::new(0),
            fail_first: false,
        });
        let board = SessionBoard::new();
        let poller = SessionPoller::start(source.clone(), board.clone(), Duration::ZERO, 50);

        tokio::time::sleep(MIN_POLL_INTERVAL * 2 + MIN_POLL_INTERVAL / 2).await;
        assert!(poller.is_running());
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(board.len(), 3);
    }
}
