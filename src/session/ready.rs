//! Completion tokens
//!
//! A request's "ready" flag is set exactly once by the responder and
//! polled by the requester, which may live on a host tick that cannot
//! suspend mid-frame. Closing the session cancels every outstanding token;
//! a cancelled token never reads as ready, so "never became ready" after
//! teardown means cancellation, not a hang.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct TokenState {
    ready: AtomicBool,
    cancelled: AtomicBool,
}

/// Set-once completion flag plus a cancellation signal. Cheap to clone;
/// clones share state.
#[derive(Debug, Clone, Default)]
pub struct ReadyToken {
    state: Arc<TokenState>,
}

impl ReadyToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks completion. A no-op on a cancelled token; later calls change
    /// nothing.
    pub fn set_ready(&self) {
        if !self.state.cancelled.load(Ordering::Acquire) {
            self.state.ready.store(true, Ordering::Release);
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.ready.load(Ordering::Acquire) && !self.is_cancelled()
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }
}

/// Tracks every token handed out during a session so teardown can cancel
/// them all. Shared between the engine and requester threads.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    tokens: Mutex<Vec<ReadyToken>>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, token: &ReadyToken) {
        let mut tokens = self.tokens.lock();
        // Drop settled tokens while we are here.
        tokens.retain(|t| !t.is_ready() && !t.is_cancelled());
        tokens.push(token.clone());
    }

    pub fn cancel_all(&self) {
        let mut tokens = self.tokens.lock();
        for token in tokens.drain(..) {
            token.cancel();
        }
    }

    pub fn outstanding(&self) -> usize {
        self.tokens
            .lock()
            .iter()
            .filter(|t| !t.is_ready() && !t.is_cancelled())
            .count()
    }
}
