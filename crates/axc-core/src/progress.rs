//! Progress reporting and cooperative cancellation for streaming operations
//!
//! A `Progress` is passed explicitly into each streaming call. The pipeline
//! calls [`Progress::add`] once per chunk; that is the only place where a
//! cancellation request is observed.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{AxcError, AxcResult};

/// Progress callback: receives the running byte count, may request
/// cancellation by returning `ControlFlow::Break`.
pub type ProgressFn<'a> = Box<dyn FnMut(u64) -> ControlFlow<()> + Send + 'a>;

/// Shared cancellation flag. Clones observe the same flag, so a UI thread can
/// hold one while the worker streams with another.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Progress<'a> {
    callback: Option<ProgressFn<'a>>,
    cancel: CancelToken,
    done: u64,
}

impl<'a> Progress<'a> {
    /// Progress that reports nowhere and can only be cancelled via its token.
    pub fn none() -> Self {
        Self {
            callback: None,
            cancel: CancelToken::new(),
            done: 0,
        }
    }

    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(u64) -> ControlFlow<()> + Send + 'a,
    {
        Self {
            callback: Some(Box::new(callback)),
            cancel: CancelToken::new(),
            done: 0,
        }
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Bytes reported so far.
    pub fn done(&self) -> u64 {
        self.done
    }

    /// Record `bytes` more of work. Returns `Cancelled` if the callback or the
    /// token asked to stop.
    pub fn add(&mut self, bytes: u64) -> AxcResult<()> {
        self.done += bytes;
        if let Some(callback) = self.callback.as_mut() {
            if callback(self.done).is_break() {
                self.cancel.cancel();
            }
        }
        if self.cancel.is_cancelled() {
            tracing::debug!(done = self.done, "cancellation observed");
            return Err(AxcError::Cancelled);
        }
        Ok(())
    }
}

impl Default for Progress<'_> {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("done", &self.done)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_counts_accumulate() {
        let seen = Mutex::new(Vec::new());
        {
            let mut progress = Progress::new(|done| {
                seen.lock().unwrap().push(done);
                ControlFlow::Continue(())
            });
            progress.add(10).unwrap();
            progress.add(5).unwrap();
            assert_eq!(progress.done(), 15);
        }
        assert_eq!(*seen.lock().unwrap(), vec![10, 15]);
    }

    #[test]
    fn test_callback_break_cancels() {
        let mut progress = Progress::new(|done| {
            if done >= 20 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        progress.add(10).unwrap();
        let err = progress.add(10).unwrap_err();
        assert!(err.is_cancelled());
        assert!(progress.cancel_token().is_cancelled());
    }

    #[test]
    fn test_token_cancel_from_other_thread() {
        let token = CancelToken::new();
        let mut progress = Progress::none().with_cancel_token(token.clone());
        progress.add(1).unwrap();

        std::thread::spawn(move || token.cancel()).join().unwrap();

        assert!(progress.add(1).unwrap_err().is_cancelled());
    }
}
