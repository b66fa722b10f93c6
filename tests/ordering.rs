//! Property-based tests over randomly generated DAGs.
//!
//! Each case generates a graph where task `i` may only depend on tasks with
//! a smaller index, which keeps the generated edge set acyclic by
//! construction. Properties assert at-most-once execution, dependency
//! ordering, and that clearing a task reruns exactly its downstream cone.


use cascade::prelude::*;
use proptest::prelude::*;
use test_utils::ExecutionLog;

/// Task that records its label in the log and succeeds.
fn tracked(log: &ExecutionLog, name: String) -> Task {
    let log = log.clone();
    let label = name.clone();
    Task::named(name, move || {
        let log = log.clone();
        let label = label.clone();
        async move {
            log.record(&label);
            Ok::<(), ActionError>(())
        }
    })
}

/// Adjacency lists where task `i` depends only on tasks `j < i`.
fn layered_dag() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (2usize..10).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<bool>(), n), n).prop_map(
            |rows| {
                rows.into_iter()
                    .enumerate()
                    .map(|(i, row)| {
                        row.into_iter()
                            .take(i)
                            .enumerate()
                            .filter_map(|(j, edge)| edge.then_some(j))
                            .collect()
                    })
                    .collect()
            },
        )
    })
}

fn build(log: &ExecutionLog, edges: &[Vec<usize>]) -> Vec<Task> {
    let tasks: Vec<Task> = (0..edges.len())
        .map(|i| tracked(log, format!("t{i}")))
        .collect();
    for (i, deps) in edges.iter().enumerate() {
        for &j in deps {
            tasks[i].depends_on(&tasks[j]).expect("indices descend");
        }
    }
    tasks
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_task_runs_once_after_its_dependencies(edges in layered_dag()) {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async {
            let log = ExecutionLog::default();
            let tasks = build(&log, &edges);

            let mut graph = Graph::new();
            for task in &tasks {
                graph.add(task);
            }

            let report = graph.run().await.expect("run succeeds");
            prop_assert_eq!(report.actions_run, tasks.len());

            for (i, deps) in edges.iter().enumerate() {
                let label = format!("t{i}");
                prop_assert_eq!(log.count(&label), 1);
                for &j in deps {
                    let dep = format!("t{j}");
                    prop_assert!(log.ran_before(&dep, &label));
                }
            }
            Ok(())
        })?;
    }

    #[test]
    fn clear_reruns_exactly_the_downstream_cone(
        edges in layered_dag(),
        pick in any::<prop::sample::Index>(),
    ) {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async {
            let log = ExecutionLog::default();
            let tasks = build(&log, &edges);
            let cleared = pick.index(tasks.len());

            let mut graph = Graph::new();
            for task in &tasks {
                graph.add(task);
            }
            graph.run().await.expect("first run");

            // Dependents always carry a larger index, so one ascending pass
            // computes the transitive cone of the cleared task.
            let mut cone = vec![false; tasks.len()];
            cone[cleared] = true;
            for (i, deps) in edges.iter().enumerate() {
                if deps.iter().any(|&j| cone[j]) {
                    cone[i] = true;
                }
            }

            graph.clear(&tasks[cleared]);
            let report = graph.run().await.expect("second run");

            let expected: usize = cone.iter().filter(|&&in_cone| in_cone).count();
            prop_assert_eq!(report.actions_run, expected);
            for (i, &in_cone) in cone.iter().enumerate() {
                let runs = log.count(&format!("t{i}"));
                prop_assert_eq!(runs, if in_cone { 2 } else { 1 });
            }
            Ok(())
        })?;
    }
}
