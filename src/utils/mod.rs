pub mod breaker;
pub mod retry;

pub use breaker::{BreakerConfig, BreakerState, FailureBreaker};
pub use retry::{retry_transient, BackoffPolicy, IsTransient};
