//! The submission guard.
//!
//! While a form submission is in flight, or a modal dialog is open,
//! background (non-forced) checks are answered from the cache. A check
//! landing mid-submit could otherwise observe a half-updated backend
//! session and wipe the user out from under the form.
//!
//! Submissions nest: the guard is a depth counter, active while the depth
//! is above zero. Prefer [`SubmissionGuard::scope`], which ends the
//! submission when dropped, over pairing `start`/`end` by hand.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Counts in-flight submissions and tracks the modal flag.
///
/// Cloning is cheap and clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct SubmissionGuard {
    depth: Arc<AtomicUsize>,
    modal_open: Arc<AtomicBool>,
}

impl SubmissionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a submission as started. Returns the new depth.
    pub fn start(&self) -> usize {
        self.depth.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Marks a submission as finished. Returns the new depth.
    ///
    /// An unmatched `end` is ignored (the depth never goes below zero).
    pub fn end(&self) -> usize {
        let result = self
            .depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| d.checked_sub(1));
        match result {
            Ok(previous) => previous - 1,
            Err(_) => {
                tracing::warn!("end_form_submit without a matching start, ignoring");
                0
            }
        }
    }

    /// Starts a submission that ends when the returned scope is dropped,
    /// including on early return or panic.
    pub fn scope(&self) -> SubmitScope {
        self.start();
        SubmitScope {
            guard: self.clone(),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn set_modal_open(&self, open: bool) {
        self.modal_open.store(open, Ordering::SeqCst);
    }

    pub fn modal_open(&self) -> bool {
        self.modal_open.load(Ordering::SeqCst)
    }

    /// `true` if non-forced checks should be suppressed.
    pub fn is_active(&self) -> bool {
        self.depth() > 0 || self.modal_open()
    }
}

/// RAII handle from [`SubmissionGuard::scope`].
#[must_use = "the submission ends as soon as the scope is dropped"]
#[derive(Debug)]
pub struct SubmitScope {
    guard: SubmissionGuard,
}

impl Drop for SubmitScope {
    fn drop(&mut self) {
        self.guard.end();
    }
}
