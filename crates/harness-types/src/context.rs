//! `HarnessContext`: a context value threaded through every long operation,
//! carrying cancellation, a deadline and an environment-variable view.
//!
//! Spec §9 flags the source's ambient `log`/`os.Stderr`/environment mutation
//! as a pattern needing re-architecture: "pass a context carrying logger,
//! environment view, and clock; never reach for ambient state from inside
//! the engine." This module is that context. Nothing downstream of it reads
//! `std::env` or a global logger directly.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A read-only snapshot of the environment the caller wants the engine to
/// see, instead of the engine reading `std::env::vars()` itself.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentView {
    vars: HashMap<String, String>,
}

impl EnvironmentView {
    #[must_use]
    pub fn from_process_env() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

/// Context carried into every component operation. Cheap to clone: the
/// cancellation token is reference-counted and the deadline/environment are
/// plain values.
#[derive(Debug, Clone)]
pub struct HarnessContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    environment: EnvironmentView,
}

impl HarnessContext {
    #[must_use]
    pub fn new(environment: EnvironmentView) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
            environment,
        }
    }

    #[must_use]
    pub fn background() -> Self {
        Self::new(EnvironmentView::from_process_env())
    }

    /// Derive a child context with a narrower deadline, matching spec §4.2's
    /// "any external tool call carries its own narrower deadline".
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => Some(existing),
            _ => Some(candidate),
        };
        Self {
            cancel: self.cancel.child_token(),
            deadline,
            environment: self.environment.clone(),
        }
    }

    /// Derive a child whose cancellation also cancels every descendant,
    /// used by `BatchRunner`'s stop-on-first-failure (spec §4.8) and by
    /// subprocess lifetime scoping (spec §9).
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
            environment: self.environment.clone(),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Remaining time until the nearest deadline, or `None` if unbounded.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    #[must_use]
    pub fn environment(&self) -> &EnvironmentView {
        &self.environment
    }

    /// Await either cancellation or the deadline firing, whichever is
    /// first — used by `RpcTransport::call` per spec §4.3.
    pub async fn cancelled_or_deadline(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.cancel.cancelled() => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.cancel.cancelled().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_view_roundtrips() {
        let env = EnvironmentView::default().with("FOO", "bar");
        assert_eq!(env.get("FOO"), Some("bar"));
        assert_eq!(env.get("MISSING"), None);
    }

    #[test]
    fn child_cancellation_is_observed_by_parent_token_only_downward() {
        let ctx = HarnessContext::background();
        let child = ctx.child();
        child.cancel();
        assert!(child.is_cancelled());
        // Cancelling a child must not cancel the parent.
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn with_timeout_narrows_the_nearest_deadline() {
        let ctx = HarnessContext::background().with_timeout(Duration::from_secs(10));
        let narrower = ctx.with_timeout(Duration::from_secs(1));
        assert!(narrower.remaining().unwrap() <= Duration::from_secs(1));
    }
}
