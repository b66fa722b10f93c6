//! Tasks: units of work with dependency edges and memoized per-epoch runs.
//!
//! A [`Task`] wraps an [`Action`](crate::action::Action) together with two
//! edge lists: the tasks it depends on, and the tasks that depend on it.
//! Edges are always created as a matched pair by [`Task::depends_on`].
//!
//! Tasks are identity-keyed: two handles are equal exactly when they point at
//! the same task, regardless of name or action. Handles are cheap to clone.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::join_all;
use hashbrown::HashSet;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::action::{Action, ActionError, BoxFuture, BoxedAction};
use crate::context::RunContext;

/// Unique identifier for a task.
///
/// Allocated from a process-global counter, so ids are unique across all
/// graphs in a process. Task comparisons go through ids, never values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Returns the raw id value.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task_{}", self.0)
    }
}

/// Process-global id allocator.
static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(0);

fn allocate_task_id() -> TaskId {
    TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
}

/// Errors produced by [`Task::depends_on`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidEdge {
    /// A task cannot depend on itself.
    #[error("task '{task}' cannot depend on itself")]
    SelfDependency {
        /// The offending task.
        task: TaskId,
    },
    /// The edge would make the receiver a transitive dependency of itself.
    #[error("edge from '{from}' to '{to}' would close a dependency cycle")]
    WouldCycle {
        /// The task that attempted to gain a dependency.
        from: TaskId,
        /// The dependency that already reaches `from`.
        to: TaskId,
    },
}

/// A task's action or condition resolved unsuccessfully.
///
/// Carries the identity of the task that produced the failure and the
/// underlying cause, reported unmodified. When a dependency fails, its
/// dependents propagate this same value: the failure a caller sees always
/// names the root cause.
#[derive(Debug, Clone, thiserror::Error)]
#[error("task '{label}' failed: {cause}")]
pub struct ActionFailure {
    /// Identity of the failed task.
    pub task: TaskId,
    /// Display label of the failed task (its name, or `task_<n>`).
    pub label: Arc<str>,
    /// The underlying cause, exactly as the action or condition produced it.
    pub cause: Arc<dyn core::error::Error + Send + Sync>,
}

impl ActionFailure {
    fn new(task: &Task, cause: ActionError) -> Self {
        Self {
            task: task.id(),
            label: task.label(),
            cause: Arc::from(cause),
        }
    }
}

/// Edge lists for a task. Dependencies hold strong handles; dependents hold
/// weak ones, which breaks the reference cycle a matched edge pair would
/// otherwise create.
struct Edges {
    dependencies: Vec<Task>,
    dependents: Vec<Weak<TaskInner>>,
}

pub(crate) struct TaskInner {
    id: TaskId,
    name: Option<Arc<str>>,
    action: BoxedAction,
    edges: Mutex<Edges>,
}

/// A unit of work with an action, dependencies, and dependents.
///
/// `Task` is a cheaply cloneable handle; all clones refer to the same task.
/// Tasks are caller-owned: dropping every handle drops the task, and a graph
/// holding it merely shares ownership of the same inner state.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    /// Creates a task wrapping an action.
    #[must_use]
    pub fn new<A: Action>(action: A) -> Self {
        Self::build(None, Box::new(action))
    }

    /// Creates a named task wrapping an action.
    ///
    /// The name appears in logs and failure reports; it carries no identity
    /// semantics and need not be unique.
    #[must_use]
    pub fn named<A: Action>(name: impl Into<Arc<str>>, action: A) -> Self {
        Self::build(Some(name.into()), Box::new(action))
    }

    fn build(name: Option<Arc<str>>, action: BoxedAction) -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id: allocate_task_id(),
                name,
                action,
                edges: Mutex::new(Edges {
                    dependencies: Vec::new(),
                    dependents: Vec::new(),
                }),
            }),
        }
    }

    /// Returns the task's unique id.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// Returns the task's name, if it has one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Returns the task's display label: its name, or `task_<n>`.
    #[must_use]
    pub fn label(&self) -> Arc<str> {
        match &self.inner.name {
            Some(name) => name.clone(),
            None => self.id().to_string().into(),
        }
    }

    /// Returns a snapshot of the task's direct dependencies.
    #[must_use]
    pub fn dependencies(&self) -> Vec<Task> {
        self.inner.edges.lock().dependencies.clone()
    }

    /// Returns a snapshot of the task's direct dependents.
    ///
    /// Dependent edges are weak; entries whose task has been dropped are
    /// pruned here.
    #[must_use]
    pub fn dependents(&self) -> Vec<Task> {
        let mut edges = self.inner.edges.lock();
        edges.dependents.retain(|weak| weak.strong_count() > 0);
        edges
            .dependents
            .iter()
            .filter_map(|weak| weak.upgrade().map(|inner| Task { inner }))
            .collect()
    }

    /// Registers `other` as a dependency of this task and, symmetrically,
    /// this task as a dependent of `other`.
    ///
    /// Duplicate edges are permitted; `run` is memoized per epoch, so a
    /// duplicated dependency is awaited twice but executed once.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidEdge::SelfDependency`] if `other` is this task, and
    /// [`InvalidEdge::WouldCycle`] if this task is already reachable from
    /// `other` through dependency edges. The reachability walk is the only
    /// cycle checking the engine performs; `run` assumes acyclicity.
    pub fn depends_on(&self, other: &Task) -> Result<(), InvalidEdge> {
        if self.id() == other.id() {
            return Err(InvalidEdge::SelfDependency { task: self.id() });
        }
        if other.reaches(self.id()) {
            return Err(InvalidEdge::WouldCycle {
                from: self.id(),
                to: other.id(),
            });
        }

        self.inner.edges.lock().dependencies.push(other.clone());
        other
            .inner
            .edges
            .lock()
            .dependents
            .push(Arc::downgrade(&self.inner));
        Ok(())
    }

    /// Returns whether `target` is reachable from this task via dependency
    /// edges (including this task itself).
    fn reaches(&self, target: TaskId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![self.clone()];
        while let Some(task) = stack.pop() {
            if !visited.insert(task.id()) {
                continue;
            }
            if task.id() == target {
                return true;
            }
            stack.extend(task.dependencies());
        }
        false
    }

    /// Runs this task within an epoch tracked by `ctx`.
    ///
    /// If the task has already settled this epoch, its stored outcome is
    /// returned without re-executing anything; a concurrent entrant waits
    /// for settlement rather than double-running. Otherwise the task settles
    /// exactly once: dependencies run first, concurrently; if all of them
    /// succeed, the bound condition (if any) and then the action run. If a
    /// dependency fails, the action is skipped and the dependency's failure
    /// is returned as-is, leaving this task settled-but-failed.
    pub fn run<'a>(&'a self, ctx: &'a RunContext) -> BoxFuture<'a, Result<(), ActionFailure>> {
        Box::pin(async move {
            let cell = ctx.settlement(self.id());
            cell.get_or_init(|| self.settle(ctx)).await.clone()
        })
    }

    /// Settles the task: dependencies, then condition, then action.
    async fn settle(&self, ctx: &RunContext) -> Result<(), ActionFailure> {
        let dependencies = self.dependencies();
        if !dependencies.is_empty() {
            debug!(task = %self, waiting_on = dependencies.len(), "running dependencies");
            let results = join_all(dependencies.iter().map(|dep| dep.run(ctx))).await;
            for result in results {
                if let Err(failure) = result {
                    debug!(task = %self, cause = %failure.label, "dependency failed, skipping action");
                    return Err(failure);
                }
            }
        }

        if let Some(condition) = ctx.condition(self.id()) {
            match condition.evaluate().await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(task = %self, "condition not met, nothing to do");
                    return Ok(());
                }
                Err(cause) => {
                    warn!(task = %self, error = %cause, "condition failed");
                    return Err(ActionFailure::new(self, cause));
                }
            }
        }

        ctx.count_action();
        debug!(task = %self, "running action");
        match self.inner.action.run().await {
            Ok(()) => Ok(()),
            Err(cause) => {
                warn!(task = %self, error = %cause, "action failed");
                Err(ActionFailure::new(self, cause))
            }
        }
    }

    /// Removes `id` from this task's dependency list.
    pub(crate) fn remove_dependency(&self, id: TaskId) {
        self.inner
            .edges
            .lock()
            .dependencies
            .retain(|dep| dep.id() != id);
    }

    /// Removes `id` from this task's dependent list.
    pub(crate) fn remove_dependent(&self, id: TaskId) {
        self.inner
            .edges
            .lock()
            .dependents
            .retain(|weak| weak.upgrade().is_none_or(|inner| inner.id != id));
    }

    /// Returns a non-owning handle to this task.
    pub(crate) fn downgrade(&self) -> Weak<TaskInner> {
        Arc::downgrade(&self.inner)
    }

    /// Recovers a task from a non-owning handle, if it is still alive.
    pub(crate) fn upgrade(weak: &Weak<TaskInner>) -> Option<Task> {
        weak.upgrade().map(|inner| Task { inner })
    }

    /// Empties both edge lists.
    pub(crate) fn detach_edges(&self) {
        let mut edges = self.inner.edges.lock();
        edges.dependencies.clear();
        edges.dependents.clear();
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Task {}

impl core::hash::Hash for Task {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let edges = self.inner.edges.lock();
        f.debug_struct("Task")
            .field("id", &self.id())
            .field("name", &self.inner.name)
            .field("dependencies", &edges.dependencies.len())
            .field("dependents", &edges.dependents.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn noop() -> Result<(), ActionError> {
        Ok(())
    }

    #[test]
    fn task_ids_are_unique() {
        let a = Task::new(noop);
        let b = Task::new(noop);
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn labels_fall_back_to_id() {
        let anon = Task::new(noop);
        assert_eq!(&*anon.label(), anon.id().to_string());

        let named = Task::named("render", noop);
        assert_eq!(named.name(), Some("render"));
        assert_eq!(&*named.label(), "render");
    }

    #[test]
    fn depends_on_creates_matched_pair() {
        let a = Task::new(noop);
        let b = Task::new(noop);
        a.depends_on(&b).expect("valid edge");

        assert_eq!(a.dependencies(), vec![b.clone()]);
        assert!(a.dependents().is_empty());
        assert_eq!(b.dependents(), vec![a.clone()]);
        assert!(b.dependencies().is_empty());
    }

    #[test]
    fn self_dependency_is_rejected() {
        let a = Task::new(noop);
        assert_eq!(
            a.depends_on(&a),
            Err(InvalidEdge::SelfDependency { task: a.id() })
        );
    }

    #[test]
    fn cycle_closing_edge_is_rejected() {
        let a = Task::new(noop);
        let b = Task::new(noop);
        let c = Task::new(noop);
        b.depends_on(&a).expect("valid edge");
        c.depends_on(&b).expect("valid edge");

        assert_eq!(
            a.depends_on(&c),
            Err(InvalidEdge::WouldCycle {
                from: a.id(),
                to: c.id(),
            })
        );
        assert!(a.dependencies().is_empty());
    }

    #[test]
    fn duplicate_edges_are_permitted() {
        let a = Task::new(noop);
        let b = Task::new(noop);
        a.depends_on(&b).expect("first edge");
        a.depends_on(&b).expect("duplicate edge");
        assert_eq!(a.dependencies().len(), 2);
    }

    #[test]
    fn dropped_dependents_are_pruned() {
        let a = Task::new(noop);
        {
            let b = Task::new(noop);
            b.depends_on(&a).expect("valid edge");
            assert_eq!(a.dependents().len(), 1);
        }
        assert!(a.dependents().is_empty());
    }

    #[tokio::test]
    async fn settled_task_returns_stored_outcome() {
        let ctx = RunContext::new();
        let task = Task::new(|| async { Err::<(), ActionError>("broken".into()) });

        let first = task.run(&ctx).await.unwrap_err();
        assert_eq!(first.task, task.id());

        // Settled-but-failed: the stored failure comes back without a rerun.
        let second = task.run(&ctx).await.unwrap_err();
        assert_eq!(second.task, task.id());
        assert_eq!(ctx.actions_run(), 1);
    }
}
