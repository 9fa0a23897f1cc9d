//! Debounced duplicate-invoice guard.
//!
//! A goods receipt is keyed by (vendor, invoice reference); registering the
//! same pair twice creates a duplicate payable. The guard watches header
//! edits and, once both fields are non-empty, asks the backend whether the
//! pair already exists - but only after a quiet period, so a typing burst
//! costs exactly one round trip. Each new qualifying edit cancels the pending
//! timer and restarts it.
//!
//! State machine: `Idle -> Checking -> {Clear, Duplicate}`, re-entering
//! `Checking` on every qualifying change. Only `Duplicate` blocks submission.
//! What an *inconclusive* check (checker error) means is an explicit policy:
//! [`OutagePolicy::FailOpen`] admits the submission (the default),
//! [`OutagePolicy::FailClosed`] blocks it until a check succeeds.

use crate::errors::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default quiet period after the last qualifying keystroke.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(800);

/// Where the guard currently stands for the latest (vendor, reference) pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GuardState {
    /// Vendor or reference is empty; nothing to check
    #[default]
    Idle,
    /// A check is debouncing or in flight
    Checking,
    /// The pair is not registered; submission may proceed
    Clear,
    /// The pair already exists; submission is blocked
    Duplicate,
}

/// Behavior when the duplicate check itself fails (network outage, backend
/// error): admit the submission or block it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutagePolicy {
    /// Inconclusive check counts as `Clear` (availability over strictness)
    #[default]
    FailOpen,
    /// Inconclusive check counts as `Duplicate` until a check succeeds
    FailClosed,
}

/// Asks the backend whether a (vendor, reference) pair is already registered.
#[async_trait]
pub trait DuplicateChecker: Send + Sync {
    /// Returns whether a payable already exists for this vendor and invoice
    /// reference.
    async fn invoice_exists(&self, vendor: &str, reference: &str) -> Result<bool>;
}

/// Debounced, cancellation-aware wrapper around a [`DuplicateChecker`].
///
/// Must be driven from within a Tokio runtime: each qualifying edit spawns a
/// timer task that is aborted by the next edit, by [`DuplicateGuard::reset`],
/// or by dropping the guard (a torn-down form never applies a late response).
pub struct DuplicateGuard {
    checker: Arc<dyn DuplicateChecker>,
    debounce: Duration,
    policy: OutagePolicy,
    state: Arc<Mutex<GuardState>>,
    root: CancellationToken,
    pending: Option<CancellationToken>,
}

impl DuplicateGuard {
    /// Creates a guard with the default 800 ms debounce.
    #[must_use]
    pub fn new(checker: Arc<dyn DuplicateChecker>, policy: OutagePolicy) -> Self {
        Self::with_debounce(checker, policy, DEFAULT_DEBOUNCE)
    }

    /// Creates a guard with a custom debounce window.
    #[must_use]
    pub fn with_debounce(
        checker: Arc<dyn DuplicateChecker>,
        policy: OutagePolicy,
        debounce: Duration,
    ) -> Self {
        Self {
            checker,
            debounce,
            policy,
            state: Arc::new(Mutex::new(GuardState::Idle)),
            root: CancellationToken::new(),
            pending: None,
        }
    }

    /// Notifies the guard of a header edit.
    ///
    /// Cancels any pending check. When both fields are non-empty the guard
    /// enters `Checking` and schedules a new check after the debounce window;
    /// otherwise it returns to `Idle`.
    pub fn on_change(&mut self, vendor: &str, reference: &str) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }

        if vendor.is_empty() || reference.is_empty() {
            *lock(&self.state) = GuardState::Idle;
            return;
        }

        *lock(&self.state) = GuardState::Checking;

        let token = self.root.child_token();
        self.pending = Some(token.clone());

        let checker = Arc::clone(&self.checker);
        let state = Arc::clone(&self.state);
        let debounce = self.debounce;
        let policy = self.policy;
        let vendor = vendor.to_string();
        let reference = reference.to_string();

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => return,
                () = tokio::time::sleep(debounce) => {}
            }

            let outcome = checker.invoice_exists(&vendor, &reference).await;

            // A cancellation that raced the request must not apply its result
            if token.is_cancelled() {
                return;
            }

            let next = match outcome {
                Ok(true) => {
                    debug!(%vendor, %reference, "Duplicate invoice detected");
                    GuardState::Duplicate
                }
                Ok(false) => GuardState::Clear,
                Err(e) => {
                    warn!(%vendor, %reference, error = %e, ?policy, "Duplicate check inconclusive");
                    match policy {
                        OutagePolicy::FailOpen => GuardState::Clear,
                        OutagePolicy::FailClosed => GuardState::Duplicate,
                    }
                }
            };
            *lock(&state) = next;
        });
    }

    /// Current guard state.
    #[must_use]
    pub fn state(&self) -> GuardState {
        *lock(&self.state)
    }

    /// Whether the guard currently blocks submission.
    #[must_use]
    pub fn blocks_submission(&self) -> bool {
        self.state() == GuardState::Duplicate
    }

    /// Cancels any pending check and returns to `Idle` (used after a
    /// successful submission or an explicit form reset).
    pub fn reset(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
        *lock(&self.state) = GuardState::Idle;
    }
}

impl Drop for DuplicateGuard {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

fn lock(state: &Mutex<GuardState>) -> MutexGuard<'_, GuardState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
