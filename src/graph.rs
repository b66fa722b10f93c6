//! Dependency-aware task graphs.
//!
//! A [`Graph`] is a registry of tasks plus the [`RunContext`] that tracks
//! which of them have settled. Registration is closed under dependencies,
//! runs are incremental, and [`Graph::clear`] re-opens exactly one task and
//! its downstream cone for re-execution.

use core::fmt;
use std::sync::Weak;
use std::time::{Duration, Instant};

use futures::future::join_all;
use hashbrown::HashSet;
use tracing::{debug, info};

use crate::context::RunContext;
use crate::task::{ActionFailure, Task, TaskId, TaskInner};

/// Statistics for one [`Graph::run`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Number of actions invoked during this run. Tasks that were already
    /// settled, or whose condition resolved false, do not count.
    pub actions_run: usize,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

/// One or more tasks failed during a [`Graph::run`].
///
/// Failures are collected across the whole fan-out, deduplicated by failing
/// task, in first-seen order. Every entry names a root cause; tasks that were
/// skipped because a dependency failed are not listed separately.
#[derive(Debug, Clone, thiserror::Error)]
#[error("run failed: {} task(s) failed", .failures.len())]
pub struct AggregateFailure {
    /// Root-cause failures, one per failed task.
    pub failures: Vec<ActionFailure>,
}

/// Roster entry: the id is kept alongside the handle so a dropped task can
/// still be deregistered.
struct Registration {
    id: TaskId,
    handle: Weak<TaskInner>,
}

/// A registry of tasks executed incrementally in dependency order.
///
/// The graph owns the run context, so settlement survives across calls to
/// [`run`](Graph::run): a second run re-executes nothing until something is
/// [`clear`](Graph::clear)ed. Tasks stay caller-owned: the graph holds only
/// non-owning handles, and a task whose last caller handle is dropped simply
/// stops participating in runs.
#[derive(Default)]
pub struct Graph {
    tasks: Vec<Registration>,
    registered: HashSet<TaskId>,
    ctx: RunContext,
}

impl Graph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task and, transitively, every dependency reachable from
    /// it at the time of the call. Edges added afterwards do not register
    /// their targets retroactively.
    ///
    /// Re-adding a registered task is a no-op.
    pub fn add(&mut self, task: &Task) -> &mut Self {
        self.prune();
        let mut pending = vec![task.clone()];
        while let Some(task) = pending.pop() {
            if !self.registered.insert(task.id()) {
                continue;
            }
            debug!(task = %task, "registered");
            pending.extend(task.dependencies());
            self.tasks.push(Registration {
                id: task.id(),
                handle: task.downgrade(),
            });
        }
        self
    }

    /// Runs every unsettled registered task, dependencies first.
    ///
    /// All live registered tasks are started concurrently; shared
    /// dependencies still execute at most once because settlement is
    /// memoized in the run context. Failures do not abort the rest of the
    /// fan-out: independent subgraphs complete, and everything that failed
    /// is reported together.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateFailure`] listing the root-cause failure of every
    /// task that failed this run, including tasks still settled-but-failed
    /// from a previous run.
    pub async fn run(&self) -> Result<RunReport, AggregateFailure> {
        let started = Instant::now();
        let actions_before = self.ctx.actions_run();

        let live = self.tasks();
        let results = join_all(live.iter().map(|task| task.run(&self.ctx))).await;

        let mut seen = HashSet::new();
        let mut failures = Vec::new();
        for result in results {
            if let Err(failure) = result {
                if seen.insert(failure.task) {
                    failures.push(failure);
                }
            }
        }

        let report = RunReport {
            actions_run: self.ctx.actions_run() - actions_before,
            duration: started.elapsed(),
        };
        if failures.is_empty() {
            info!(
                actions_run = report.actions_run,
                duration_us = report.duration.as_micros() as u64,
                "run complete"
            );
            Ok(report)
        } else {
            info!(
                failed = failures.len(),
                actions_run = report.actions_run,
                "run finished with failures"
            );
            Err(AggregateFailure { failures })
        }
    }

    /// Marks a task and everything downstream of it as needing re-execution.
    ///
    /// Only the task and its transitive dependents are invalidated; its
    /// dependencies stay settled, so the next run re-executes exactly the
    /// affected cone. Clearing a never-run or unregistered task is harmless.
    pub fn clear(&self, task: &Task) {
        let mut visited = HashSet::new();
        let mut pending = vec![task.clone()];
        while let Some(task) = pending.pop() {
            if !visited.insert(task.id()) {
                continue;
            }
            debug!(task = %task, "invalidated");
            self.ctx.invalidate(task.id());
            pending.extend(task.dependents());
        }
    }

    /// Deregisters a task and scrubs it out of its neighbours' edge lists.
    ///
    /// The task's dependents lose it as a dependency and its dependencies
    /// lose it as a dependent; the graph drops its settlement state and any
    /// condition binding. Other tasks are not removed or invalidated.
    ///
    /// Returns whether the task was registered.
    pub fn remove(&mut self, task: &Task) -> bool {
        self.prune();
        if !self.registered.remove(&task.id()) {
            return false;
        }
        self.tasks.retain(|entry| entry.id != task.id());

        for dependency in task.dependencies() {
            dependency.remove_dependent(task.id());
        }
        for dependent in task.dependents() {
            dependent.remove_dependency(task.id());
        }
        task.detach_edges();

        self.ctx.forget(task.id());
        debug!(task = %task, "removed");
        true
    }

    /// Drops roster entries whose task no longer exists.
    fn prune(&mut self) {
        let registered = &mut self.registered;
        let ctx = &self.ctx;
        self.tasks.retain(|entry| {
            let alive = entry.handle.strong_count() > 0;
            if !alive {
                registered.remove(&entry.id);
                ctx.forget(entry.id);
            }
            alive
        });
    }

    /// Returns the live registered tasks, in registration order.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks
            .iter()
            .filter_map(|entry| Task::upgrade(&entry.handle))
            .collect()
    }

    /// Returns whether a task is registered.
    #[must_use]
    pub fn contains(&self, task: &Task) -> bool {
        self.registered.contains(&task.id())
    }

    /// Number of live registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks
            .iter()
            .filter(|entry| entry.handle.strong_count() > 0)
            .count()
    }

    /// Returns whether the graph has no live registered tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the graph's run context.
    #[must_use]
    pub fn context(&self) -> &RunContext {
        &self.ctx
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("tasks", &self.len())
            .field("ctx", &self.ctx)
            .finish()
    }
}
