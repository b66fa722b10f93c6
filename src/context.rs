//! Per-run bookkeeping shared across task invocations.
//!
//! The source of truth for "what has already settled this epoch" is a
//! [`RunContext`] owned by the graph and passed by reference into every task
//! invocation, never ambient or static state. Each task settles through a
//! [`OnceCell`], which makes the mark-membership-then-recurse sequence atomic
//! per task: a second concurrent entrant does not merely observe membership,
//! it waits for the first entrant's settlement and receives the same outcome.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::action::SharedCondition;
use crate::task::{ActionFailure, TaskId};

/// Terminal per-epoch outcome of a task: succeeded, or settled-but-failed.
pub(crate) type Outcome = Result<(), ActionFailure>;

/// Epoch state for a graph: settlement cells, condition bindings, and a
/// counter of action invocations.
///
/// This is the only structure mutated concurrently by in-flight task runs.
/// Locks guard the maps themselves and are never held across a suspension
/// point; waiting for another entrant happens inside the task's cell.
#[derive(Default)]
pub struct RunContext {
    /// Settlement cell per task. A task is *settled* once its cell is
    /// initialized; the stored value distinguishes success from failure.
    cells: Mutex<HashMap<TaskId, Arc<OnceCell<Outcome>>>>,
    /// Conditions bound by the executor. Not epoch-scoped: `clear` leaves
    /// bindings in place so a re-run re-evaluates them.
    conditions: Mutex<HashMap<TaskId, SharedCondition>>,
    /// Total action invocations since the context was created.
    actions_run: AtomicUsize,
}

impl RunContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the settlement cell for a task, creating it if absent.
    pub(crate) fn settlement(&self, task: TaskId) -> Arc<OnceCell<Outcome>> {
        self.cells
            .lock()
            .entry(task)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// Returns whether a task has settled in the current epoch.
    #[must_use]
    pub fn is_settled(&self, task: TaskId) -> bool {
        self.cells
            .lock()
            .get(&task)
            .is_some_and(|cell| cell.initialized())
    }

    /// Drops a task's settlement cell so its next run re-executes.
    pub(crate) fn invalidate(&self, task: TaskId) {
        self.cells.lock().remove(&task);
    }

    /// Drops everything known about a task: settlement and condition binding.
    pub(crate) fn forget(&self, task: TaskId) {
        self.cells.lock().remove(&task);
        self.conditions.lock().remove(&task);
    }

    /// Binds (or replaces) the condition gating a task's action.
    pub(crate) fn bind_condition(&self, task: TaskId, condition: SharedCondition) {
        self.conditions.lock().insert(task, condition);
    }

    /// Returns the condition bound to a task, if any.
    pub(crate) fn condition(&self, task: TaskId) -> Option<SharedCondition> {
        self.conditions.lock().get(&task).cloned()
    }

    /// Records one action invocation.
    pub(crate) fn count_action(&self) {
        self.actions_run.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the total number of action invocations so far.
    #[must_use]
    pub fn actions_run(&self) -> usize {
        self.actions_run.load(Ordering::Relaxed)
    }
}

impl core::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RunContext")
            .field("tracked", &self.cells.lock().len())
            .field("conditions", &self.conditions.lock().len())
            .field("actions_run", &self.actions_run())
            .finish()
    }
}
