//! Reusable one-shot completion tokens
//!
//! A `WaitToken` links one queued lookup to the continuation waiting for it.
//! Tokens are taken from a shared pool when a job is queued and handed back
//! once the continuation has fired, so token ids are recycled under load.

use std::sync::{Arc, Mutex};
use tracing::warn;

/// One-shot handle identifying a pending continuation.
///
/// Deliberately not `Clone`: a token is fired at most once, then released.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct WaitToken {
    id: u64,
}

impl WaitToken {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Default)]
struct PoolState {
    free: Vec<u64>,
    next_id: u64,
    in_use: usize,
}

/// Shared pool of wait tokens
#[derive(Debug, Clone, Default)]
pub struct WaitTokenPool {
    state: Arc<Mutex<PoolState>>,
}

impl WaitTokenPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a token from the pool, minting a new one if none is free
    pub fn acquire(&self) -> WaitToken {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        let id = match state.free.pop() {
            Some(id) => id,
            None => {
                state.next_id += 1;
                state.next_id
            }
        };
        state.in_use += 1;
        WaitToken { id }
    }

    /// Return a fired token to the pool
    pub fn release(&self, token: WaitToken) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        if state.in_use == 0 {
            warn!("Released wait token {} that was never acquired", token.id);
            return;
        }
        state.in_use -= 1;
        state.free.push(token.id);
    }

    /// Tokens acquired and not yet released
    pub fn in_use(&self) -> usize {
        self.state.lock().map(|state| state.in_use).unwrap_or(0)
    }

    /// Tokens waiting in the pool for reuse
    pub fn free_count(&self) -> usize {
        self.state.lock().map(|state| state.free.len()).unwrap_or(0)
    }
}
