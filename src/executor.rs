//! Condition-gated execution on top of [`Graph`].
//!
//! An [`Executor`] pairs tasks with async boolean conditions. At run time a
//! task's dependencies settle first, then its condition is evaluated; only a
//! true condition lets the action run. A false condition settles the task as
//! satisfied, so dependents proceed normally.

use std::sync::Arc;

use crate::action::Condition;
use crate::graph::{AggregateFailure, Graph, RunReport};
use crate::task::Task;

/// A [`Graph`] whose tasks can be gated by conditions.
///
/// Tasks added without a condition behave exactly as in a plain graph.
/// Conditions are bound per task and survive [`clear`](Executor::clear), so
/// an invalidated task is re-gated on its next run.
#[derive(Debug, Default)]
pub struct Executor {
    graph: Graph,
}

impl Executor {
    /// Creates an empty executor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing graph, keeping its registrations and settlement
    /// state.
    #[must_use]
    pub fn from_graph(graph: Graph) -> Self {
        Self { graph }
    }

    /// Registers a task gated by `condition`.
    ///
    /// The condition is evaluated after the task's dependencies settle and
    /// before its action runs. `Ok(false)` settles the task without running
    /// the action; an error fails the task as if the action had failed.
    /// Re-adding with a new condition replaces the old binding.
    ///
    /// Dependencies registered through this call are not gated; gate each
    /// task explicitly if its dependencies need conditions of their own.
    pub fn add<C: Condition>(&mut self, task: &Task, condition: C) -> &mut Self {
        self.graph
            .context()
            .bind_condition(task.id(), Arc::new(condition));
        self.graph.add(task);
        self
    }

    /// Registers a task with no condition.
    pub fn add_unconditional(&mut self, task: &Task) -> &mut Self {
        self.graph.add(task);
        self
    }

    /// Runs every unsettled task, evaluating conditions along the way.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateFailure`] exactly as [`Graph::run`] does; condition
    /// errors appear as the failing task's root cause.
    pub async fn run(&self) -> Result<RunReport, AggregateFailure> {
        self.graph.run().await
    }

    /// Marks a task and its downstream cone for re-execution.
    ///
    /// The task's condition binding is kept and re-evaluated on the next run.
    pub fn clear(&self, task: &Task) {
        self.graph.clear(task);
    }

    /// Deregisters a task, dropping its condition binding along with its
    /// settlement state and edges.
    ///
    /// Returns whether the task was registered.
    pub fn remove(&mut self, task: &Task) -> bool {
        self.graph.remove(task)
    }

    /// Returns the underlying graph.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Unwraps the executor, returning its graph with condition bindings
    /// intact.
    #[must_use]
    pub fn into_inner(self) -> Graph {
        self.graph
    }
}

impl From<Graph> for Executor {
    fn from(graph: Graph) -> Self {
        Self::from_graph(graph)
    }
}
