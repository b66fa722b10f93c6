//! Incremental, dependency-aware async task execution.
//!
//! `cascade` runs directed acyclic graphs of tasks so that every task
//! executes after its dependencies, at most once per invalidation epoch, and
//! only when it actually needs to run. Re-running a graph is cheap: settled
//! tasks are skipped until something upstream of them is cleared.
//!
//! # Core Concepts
//!
//! - [`Task`] - A unit of work wrapping an async [`Action`], with edges
//! - [`Graph`] - A task registry plus the settlement state of one epoch
//! - [`Executor`] - A graph whose tasks are gated by async [`Condition`]s
//! - [`RunContext`] - Per-epoch bookkeeping threaded through every run
//!
//! # Example
//!
//! ```ignore
//! use cascade::prelude::*;
//!
//! async fn compile() -> Result<(), ActionError> { Ok(()) }
//! async fn link() -> Result<(), ActionError> { Ok(()) }
//!
//! let compile = Task::named("compile", compile);
//! let link = Task::named("link", link);
//! link.depends_on(&compile)?;
//!
//! let mut graph = Graph::new();
//! graph.add(&link);
//!
//! let report = graph.run().await?;          // compile, then link
//! assert_eq!(report.actions_run, 2);
//!
//! graph.run().await?;                       // nothing to do
//!
//! graph.clear(&compile);                    // invalidate compile + link
//! graph.run().await?;                       // both run again
//! # Ok::<(), Box<dyn core::error::Error>>(())
//! ```

/// Action and condition abstractions.
pub mod action;

/// Per-run bookkeeping shared across task invocations.
pub mod context;

/// Condition-gated execution.
pub mod executor;

/// Dependency-aware task graphs.
pub mod graph;

/// Tasks, edges, and per-epoch runs.
pub mod task;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::action::{
        Action, ActionError, BoxFuture, BoxedAction, Condition, SharedCondition,
    };
    pub use crate::context::RunContext;
    pub use crate::executor::Executor;
    pub use crate::graph::{AggregateFailure, Graph, RunReport};
    pub use crate::task::{ActionFailure, InvalidEdge, Task, TaskId};
}

// Re-export key types at crate root for convenience
pub use action::{Action, ActionError, Condition};
pub use context::RunContext;
pub use executor::Executor;
pub use graph::{AggregateFailure, Graph, RunReport};
pub use task::{ActionFailure, InvalidEdge, Task, TaskId};
