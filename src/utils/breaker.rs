use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

// ============================================================================
// Failure Breaker
// ============================================================================
//
// Tracks broker failures and temporarily rejects publish calls once too many
// accumulate, so a down broker is not hammered by every request and sweep.
//
// States:
// - Closed: Normal operation, calls pass through
// - Open: Too many failures, calls rejected until the cooldown elapses
// - HalfOpen: Probing recovery, calls allowed until verdict
//
// The publisher drives this imperatively: `check` before a publish,
// `record_success` / `record_failure` after.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, thiserror::Error)]
#[error("Failure breaker is open")]
pub struct BreakerOpen;

#[derive(Clone)]
pub struct BreakerConfig {
    /// Number of consecutive failures before opening
    pub failure_threshold: u32,
    /// Time to wait before probing recovery
    pub cooldown: Duration,
    /// Number of successes needed to close from half-open
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
}

#[derive(Clone)]
pub struct FailureBreaker {
    inner: Arc<Mutex<BreakerInner>>,
    config: BreakerConfig,
}

impl FailureBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
            })),
            config,
        }
    }

    /// Whether a call may proceed right now.
    ///
    /// An open breaker whose cooldown has elapsed moves to half-open and
    /// lets the call through as a probe.
    pub async fn check(&self) -> Result<(), BreakerOpen> {
        let mut inner = self.inner.lock().await;

        match inner.state {
            BreakerState::Open => {
                if let Some(last_failure) = inner.last_failure_time {
                    if last_failure.elapsed() >= self.config.cooldown {
                        tracing::info!("Failure breaker transitioning to HalfOpen");
                        inner.state = BreakerState::HalfOpen;
                        inner.success_count = 0;
                        return Ok(());
                    }
                }
                Err(BreakerOpen)
            }
            BreakerState::HalfOpen | BreakerState::Closed => Ok(()),
        }
    }

    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;

        match inner.state {
            BreakerState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    tracing::info!(
                        successes = inner.success_count,
                        "Failure breaker closing"
                    );
                    inner.state = BreakerState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.last_failure_time = None;
                }
            }
            BreakerState::Closed => {
                inner.failure_count = 0;
            }
            BreakerState::Open => {
                tracing::warn!("Success recorded while breaker is open");
            }
        }
    }

    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;

        inner.failure_count += 1;
        inner.last_failure_time = Some(Instant::now());

        match inner.state {
            BreakerState::Closed => {
                if inner.failure_count >= self.config.failure_threshold {
                    tracing::warn!(
                        failures = inner.failure_count,
                        "Failure breaker opening"
                    );
                    inner.state = BreakerState::Open;
                }
            }
            BreakerState::HalfOpen => {
                tracing::warn!("Failure during half-open, reopening breaker");
                inner.state = BreakerState::Open;
                inner.success_count = 0;
            }
            BreakerState::Open => {}
        }
    }

    pub async fn state(&self) -> BreakerState {
        self.inner.lock().await.state
    }
}
