//! Session lifecycle state machine.
//!
//! A consumer starts `Uninitialized`, settles to `Ready` or `Failed` when
//! the engine's init completion fires, and ends `Destroyed`. Gated
//! operations consult [`Lifecycle::check_ready`]; interested parties
//! register single-shot ready/error callbacks.

use std::fmt;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::engine::EngineFailure;

/// Single-shot callback fired when the session becomes ready.
pub type ReadyFn = Box<dyn FnOnce() + Send>;

/// Single-shot callback fired when session initialization fails.
pub type ErrorFn = Box<dyn FnOnce(EngineFailure) + Send>;

/// Where a session is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Ready,
    Failed,
    Destroyed,
}

impl LifecycleState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a gated operation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("consumer is not yet ready")]
    NotReady,

    #[error("consumer initialization failed: {cause}")]
    InitFailed { cause: String },

    #[error("consumer has been destroyed")]
    AlreadyDestroyed,
}

struct Inner {
    state: LifecycleState,
    failure: Option<EngineFailure>,
    ready_listeners: Vec<ReadyFn>,
    error_listeners: Vec<ErrorFn>,
}

/// Thread-safe lifecycle shared between a consumer and the engine's init
/// completion.
pub struct Lifecycle {
    inner: Mutex<Inner>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: LifecycleState::Uninitialized,
                failure: None,
                ready_listeners: Vec::new(),
                error_listeners: Vec::new(),
            }),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    /// Settle initialization. Only the first completion on an uninitialized
    /// lifecycle transitions; later or post-destroy completions are ignored.
    /// Listeners run outside the lock.
    pub fn complete_init(&self, result: Result<(), EngineFailure>) {
        let mut inner = self.inner.lock();
        if inner.state != LifecycleState::Uninitialized {
            debug!(state = inner.state.as_str(), "ignoring late init completion");
            return;
        }
        match result {
            Ok(()) => {
                inner.state = LifecycleState::Ready;
                inner.error_listeners.clear();
                let listeners = std::mem::take(&mut inner.ready_listeners);
                drop(inner);
                info!("session ready");
                for notify in listeners {
                    notify();
                }
            }
            Err(cause) => {
                inner.state = LifecycleState::Failed;
                inner.failure = Some(cause.clone());
                inner.ready_listeners.clear();
                let listeners = std::mem::take(&mut inner.error_listeners);
                drop(inner);
                warn!(error = %cause, "session initialization failed");
                for notify in listeners {
                    notify(cause.clone());
                }
            }
        }
    }

    /// Register a ready callback; fires immediately if already ready.
    pub fn on_ready(&self, notify: ReadyFn) {
        let mut inner = self.inner.lock();
        match inner.state {
            LifecycleState::Uninitialized => inner.ready_listeners.push(notify),
            LifecycleState::Ready => {
                drop(inner);
                notify();
            }
            LifecycleState::Failed | LifecycleState::Destroyed => {}
        }
    }

    /// Register an error callback; fires immediately if init already failed.
    pub fn on_error(&self, notify: ErrorFn) {
        let mut inner = self.inner.lock();
        match inner.state {
            LifecycleState::Uninitialized => inner.error_listeners.push(notify),
            LifecycleState::Failed => {
                let cause = inner.failure.clone();
                drop(inner);
                if let Some(cause) = cause {
                    notify(cause);
                }
            }
            LifecycleState::Ready | LifecycleState::Destroyed => {}
        }
    }

    /// Gate check for operations that need a live, ready session.
    pub fn check_ready(&self) -> Result<(), LifecycleError> {
        let inner = self.inner.lock();
        match inner.state {
            LifecycleState::Ready => Ok(()),
            LifecycleState::Uninitialized => Err(LifecycleError::NotReady),
            LifecycleState::Failed => Err(LifecycleError::InitFailed {
                cause: inner
                    .failure
                    .as_ref()
                    .map(|cause| cause.to_string())
                    .unwrap_or_else(|| "unknown cause".to_owned()),
            }),
            LifecycleState::Destroyed => Err(LifecycleError::AlreadyDestroyed),
        }
    }

    /// Transition to `Destroyed` from any live state. Pending listeners are
    /// dropped unfired.
    pub fn destroy(&self) -> Result<(), LifecycleError> {
        let mut inner = self.inner.lock();
        if inner.state == LifecycleState::Destroyed {
            return Err(LifecycleError::AlreadyDestroyed);
        }
        let prior = inner.state;
        inner.state = LifecycleState::Destroyed;
        inner.ready_listeners.clear();
        inner.error_listeners.clear();
        drop(inner);
        info!(prior = prior.as_str(), "session lifecycle destroyed");
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
