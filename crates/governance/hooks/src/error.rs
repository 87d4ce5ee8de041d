use crate::registry::HookEvent;
use thiserror::Error;

/// Result type for hook registration and dispatch.
pub type HookResult<T> = Result<T, HookError>;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook registry lock poisoned")]
    LockPoisoned,

    #[error("{event} received a {received} payload")]
    PayloadMismatch {
        event: HookEvent,
        received: &'static str,
    },

    #[error("hook handler failed: {0}")]
    Handler(String),
}
