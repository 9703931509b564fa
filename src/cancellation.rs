//! Cooperative cancellation shared between the caller, the connection
//! manager and every in-flight request.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use futures_channel::oneshot;

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct State {
    cancelled: bool,
    next_id: u64,
    callbacks: HashMap<u64, Callback>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        // Callbacks never run under the lock, a poisoned state is still
        // consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A cloneable cancellation signal.
///
/// Cancelling any clone cancels all of them. Callbacks registered with
/// [`CancellationToken::register`] run once, on the thread calling
/// [`CancellationToken::cancel`].
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// Create a new, not yet cancelled, token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the token and run every registered callback.
    ///
    /// Cancelling twice is a no-op.
    pub fn cancel(&self) {
        let callbacks = {
            let mut state = self.inner.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            std::mem::take(&mut state.callbacks)
        };
        for callback in callbacks.into_values() {
            callback();
        }
    }

    /// Whether [`CancellationToken::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.lock().cancelled
    }

    /// Register `callback` to run when the token gets cancelled.
    ///
    /// If the token is already cancelled the callback runs immediately.
    /// Dropping the returned registration removes the callback.
    #[must_use = "dropping the registration unregisters the callback"]
    pub fn register(&self, callback: impl FnOnce() + Send + 'static) -> CancellationRegistration {
        let mut state = self.inner.lock();
        if state.cancelled {
            drop(state);
            callback();
            return CancellationRegistration {
                token: Weak::new(),
                id: 0,
            };
        }
        let id = state.next_id;
        state.next_id += 1;
        state.callbacks.insert(id, Box::new(callback));
        CancellationRegistration {
            token: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let (sender, receiver) = oneshot::channel::<()>();
        let _registration = self.register(move || {
            let _ = sender.send(());
        });
        // The sender lives in the registration, it is only dropped after
        // sending.
        let _ = receiver.await;
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Keeps a callback registered on a [`CancellationToken`].
///
/// Dropping it unregisters the callback if it did not run yet.
pub struct CancellationRegistration {
    token: Weak<Inner>,
    id: u64,
}

impl Drop for CancellationRegistration {
    fn drop(&mut self) {
        if let Some(inner) = self.token.upgrade() {
            let callback = inner.lock().callbacks.remove(&self.id);
            drop(callback);
        }
    }
}

impl fmt::Debug for CancellationRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationRegistration")
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::CancellationToken;

    #[test]
    fn callbacks_run_once() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _registration = token.register(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        token.clone().cancel();
        token.cancel();

        assert!(token.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_registration_does_not_fire() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registration = token.register(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(registration);

        token.cancel();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn register_after_cancel_fires_immediately() {
        let token = CancellationToken::new();
        token.cancel();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _registration = token.register(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_resolves() {
        let token = CancellationToken::new();
        let waiter = token.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });
        token.cancel();
        task.await.unwrap();
    }
}
