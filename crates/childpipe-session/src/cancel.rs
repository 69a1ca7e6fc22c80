use std::sync::{Arc, Mutex, MutexGuard};

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct TokenState {
    cancelled: bool,
    next_id: u64,
    callbacks: Vec<(u64, Callback)>,
}

/// Cloneable cancellation context.
///
/// Blocking operations observe a token at their defined suspension points
/// (between frames, between wait iterations) via [`is_cancelled`]; side
/// effects that must run when cancellation fires are attached with
/// [`on_cancel`] and detached by dropping the returned registration.
///
/// [`cancel`] fires at most once: the first call runs every registered
/// callback synchronously in registration order, later calls are no-ops.
/// Registering on an already-cancelled token runs the callback immediately.
///
/// [`is_cancelled`]: CancelToken::is_cancelled
/// [`on_cancel`]: CancelToken::on_cancel
/// [`cancel`]: CancelToken::cancel
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Mutex<TokenState>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Request cancellation, running registered callbacks in order.
    pub fn cancel(&self) {
        let callbacks = {
            let mut state = self.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            std::mem::take(&mut state.callbacks)
        };
        // Callbacks run outside the lock so they may touch the token.
        for (_, callback) in callbacks {
            callback();
        }
    }

    /// Attach a callback to run when the token is cancelled.
    ///
    /// The registration is scoped: dropping it detaches the callback. If the
    /// token is already cancelled, the callback runs before this returns.
    pub fn on_cancel(&self, callback: impl FnOnce() + Send + 'static) -> CancelRegistration {
        let id = {
            let mut state = self.lock();
            if state.cancelled {
                drop(state);
                callback();
                // Nothing to detach; the id matches no stored callback.
                return CancelRegistration {
                    token: self.clone(),
                    id: u64::MAX,
                };
            }
            let id = state.next_id;
            state.next_id += 1;
            state.callbacks.push((id, Box::new(callback)));
            id
        };
        CancelRegistration {
            token: self.clone(),
            id,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TokenState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Scoped attachment of a cancellation callback.
///
/// Dropping the registration detaches the callback if it has not run yet.
#[must_use = "dropping the registration detaches the callback"]
pub struct CancelRegistration {
    token: CancelToken,
    id: u64,
}

impl Drop for CancelRegistration {
    fn drop(&mut self) {
        let mut state = self.token.lock();
        state.callbacks.retain(|(id, _)| *id != self.id);
    }
}
