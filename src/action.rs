//! Action and condition abstractions.
//!
//! An [`Action`] is the unit of work a task wraps: an argument-free async
//! callable that resolves to success or an opaque failure. A [`Condition`] is
//! its boolean counterpart, used by the executor to gate whether an action
//! runs at all.
//!
//! Both traits follow the same type-erasure pattern: a typed closure is
//! stored behind an object-safe trait so heterogeneous callables can live in
//! the same graph. Blanket implementations cover any `Fn() -> impl Future`,
//! so plain async functions and closures work directly:
//!
//! ```ignore
//! use cascade::prelude::*;
//!
//! async fn render() -> Result<(), ActionError> {
//!     // arbitrary side effects
//!     Ok(())
//! }
//!
//! let task = Task::named("render", render);
//! ```

use core::fmt;
use core::future::Future;
use core::pin::Pin;
use std::sync::Arc;

/// A boxed future that is Send.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opaque failure produced by an action or condition.
///
/// The engine never inspects this value; it is reported upward unmodified,
/// wrapped with the identity of the task that produced it.
pub type ActionError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// A unit of work attached to a task.
///
/// Actions take no arguments, may suspend, and resolve to success or an
/// [`ActionError`]. Any state an action needs is captured in its closure.
pub trait Action: Send + Sync + 'static {
    /// Executes the action.
    fn run(&self) -> BoxFuture<'_, Result<(), ActionError>>;
}

impl<F, Fut> Action for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
{
    fn run(&self) -> BoxFuture<'_, Result<(), ActionError>> {
        Box::pin(self())
    }
}

impl fmt::Debug for dyn Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action").finish_non_exhaustive()
    }
}

/// Boxed type-erased action.
pub type BoxedAction = Box<dyn Action>;

/// An async predicate gating whether a task's action runs.
///
/// Evaluated immediately before the action would run. `Ok(false)` settles the
/// task as "satisfied, nothing to do"; an error fails the task exactly as if
/// its action had failed.
pub trait Condition: Send + Sync + 'static {
    /// Evaluates the condition.
    fn evaluate(&self) -> BoxFuture<'_, Result<bool, ActionError>>;
}

impl<F, Fut> Condition for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, ActionError>> + Send + 'static,
{
    fn evaluate(&self) -> BoxFuture<'_, Result<bool, ActionError>> {
        Box::pin(self())
    }
}

impl fmt::Debug for dyn Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition").finish_non_exhaustive()
    }
}

/// Shared type-erased condition.
///
/// Conditions are shared (`Arc`) rather than boxed because they are read by
/// in-flight task runs while the binding table stays locked only briefly.
pub type SharedCondition = Arc<dyn Condition>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn noop() -> Result<(), ActionError> {
        Ok(())
    }

    #[tokio::test]
    async fn closure_implements_action() {
        let action: BoxedAction = Box::new(noop);
        assert!(action.run().await.is_ok());
    }

    #[tokio::test]
    async fn closure_implements_condition() {
        let condition: SharedCondition = Arc::new(|| async { Ok::<bool, ActionError>(true) });
        assert!(condition.evaluate().await.unwrap());
    }

    #[tokio::test]
    async fn action_error_is_opaque() {
        let action: BoxedAction = Box::new(|| async { Err::<(), ActionError>("boom".into()) });
        let err = action.run().await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
