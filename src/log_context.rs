//! Log context propagation
//!
//! A per-task string label identifying which unit of work emitted a log
//! record. [`scope`] pins a label to a future and everything it awaits;
//! [`current`] reads the active label from anywhere and falls back to the
//! [`NO_CONTEXT`] sentinel, so lookup can never fail. The logging pipeline
//! stamps this label into every record it formats.
//!
//! Labels follow awaits, not spawns: a task started with `tokio::spawn`
//! begins unlabeled, and callers carry the label across explicitly with
//! `tokio::spawn(log_context::scope(log_context::current(), future))`.

use std::future::Future;

use tokio::task::futures::TaskLocalFuture;

tokio::task_local! {
    /// Label of the unit of work the current task is serving.
    static LOG_CONTEXT: String;
}

/// Sentinel label reported when no scope is active
pub const NO_CONTEXT: &str = "NoContext";

/// Run `future` with `label` as the active log context
///
/// The label is visible to [`current`] inside `future` and across all of
/// its awaits, and disappears when the returned future completes. Scopes
/// nest; the innermost label wins until its future finishes.
///
/// The returned future can be handed straight to `tokio::spawn` to label a
/// new task.
///
/// # Examples
///
/// ```
/// use groundcrew::log_context;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let seen = log_context::scope("build-7421", async { log_context::current() }).await;
/// assert_eq!(seen, "build-7421");
/// assert_eq!(log_context::current(), log_context::NO_CONTEXT);
/// # }
/// ```
pub fn scope<F>(label: impl Into<String>, future: F) -> TaskLocalFuture<String, F>
where
    F: Future,
{
    LOG_CONTEXT.scope(label.into(), future)
}

/// The active log context label, or [`NO_CONTEXT`] when there is none
///
/// Never fails: outside any [`scope`], and outside tokio tasks entirely, it
/// returns the sentinel.
#[must_use]
pub fn current() -> String {
    LOG_CONTEXT
        .try_with(Clone::clone)
        .unwrap_or_else(|_| NO_CONTEXT.to_string())
}
