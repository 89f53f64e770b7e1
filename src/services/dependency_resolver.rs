use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};

use tracing::{debug, warn};

use crate::models::dependency::{
    DanglingReference, DependencyEdge, DependencyGraph, DependencyValidation, TaskNode,
};
use crate::models::task::TaskDefinition;

/// Orders tasks so that predecessors come first, breaking ties by priority.
///
/// The resolver never fails: cyclic input is still returned in full, with the
/// unresolvable remainder appended in descending priority order.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyResolver;

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Build the precedence graph for `tasks`. Edges run from predecessor to
    /// dependent; references to ids outside the set are kept as dangling.
    pub fn build_dependency_graph(&self, tasks: &[TaskDefinition]) -> DependencyGraph {
        let mut nodes: BTreeMap<String, TaskNode> = tasks
            .iter()
            .map(|task| {
                (
                    task.id.clone(),
                    TaskNode {
                        task_id: task.id.clone(),
                        dependencies: Vec::new(),
                        dependents: Vec::new(),
                    },
                )
            })
            .collect();

        let mut edges = Vec::new();
        let mut dangling = Vec::new();

        for task in tasks {
            for predecessor in task.predecessors() {
                if !nodes.contains_key(predecessor) {
                    dangling.push(DanglingReference {
                        task_id: task.id.clone(),
                        missing_id: predecessor.to_string(),
                    });
                    continue;
                }

                if let Some(node) = nodes.get_mut(predecessor) {
                    node.dependents.push(task.id.clone());
                }
                if let Some(node) = nodes.get_mut(&task.id) {
                    node.dependencies.push(predecessor.to_string());
                }
                edges.push(DependencyEdge {
                    source: predecessor.to_string(),
                    target: task.id.clone(),
                });
            }
        }

        debug!(
            target: "app::dependency",
            nodes = nodes.len(),
            edges = edges.len(),
            dangling = dangling.len(),
            "dependency graph built"
        );

        DependencyGraph {
            nodes,
            edges,
            dangling,
        }
    }

    /// Every cycle reachable by depth-first search, each as a closed id path
    /// (`a -> b -> a` is returned as `["a", "b", "a"]`).
    pub fn detect_circular_dependencies(&self, graph: &DependencyGraph) -> Vec<Vec<String>> {
        let mut visited = HashSet::new();
        let mut cycles = Vec::new();

        for node_id in graph.nodes.keys() {
            if !visited.contains(node_id.as_str()) {
                dfs_cycle_detection(node_id, graph, &mut visited, &mut cycles);
            }
        }

        cycles
    }

    pub fn has_circular_dependencies(&self, graph: &DependencyGraph) -> bool {
        !self.detect_circular_dependencies(graph).is_empty()
    }

    /// Kahn's algorithm with a priority-ordered ready set.
    pub fn topological_sort(&self, tasks: &[TaskDefinition]) -> Vec<TaskDefinition> {
        let mut index_of: HashMap<&str, usize> = HashMap::new();
        for (idx, task) in tasks.iter().enumerate() {
            index_of.entry(task.id.as_str()).or_insert(idx);
        }

        let mut in_degree = vec![0usize; tasks.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
        for (idx, task) in tasks.iter().enumerate() {
            for predecessor in task.predecessors() {
                if let Some(&pred_idx) = index_of.get(predecessor) {
                    in_degree[idx] += 1;
                    dependents[pred_idx].push(idx);
                }
            }
        }

        // Highest priority first, then earliest input position
        let mut ready: BinaryHeap<(i32, Reverse<usize>)> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(idx, _)| (tasks[idx].priority, Reverse(idx)))
            .collect();

        let mut emitted = vec![false; tasks.len()];
        let mut order = Vec::with_capacity(tasks.len());

        while let Some((_, Reverse(current))) = ready.pop() {
            emitted[current] = true;
            order.push(current);

            for &dependent in &dependents[current] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push((tasks[dependent].priority, Reverse(dependent)));
                }
            }
        }

        if order.len() < tasks.len() {
            let mut remaining: Vec<usize> =
                (0..tasks.len()).filter(|idx| !emitted[*idx]).collect();
            remaining.sort_by_key(|idx| (Reverse(tasks[*idx].priority), *idx));

            warn!(
                target: "app::dependency",
                unresolved = remaining.len(),
                ids = ?remaining.iter().map(|idx| tasks[*idx].id.as_str()).collect::<Vec<_>>(),
                "circular dependencies detected, falling back to priority order"
            );
            order.extend(remaining);
        }

        order.into_iter().map(|idx| tasks[idx].clone()).collect()
    }

    pub fn validate_dependency_chain(&self, tasks: &[TaskDefinition]) -> DependencyValidation {
        let graph = self.build_dependency_graph(tasks);
        let mut errors = Vec::new();

        for reference in &graph.dangling {
            errors.push(format!(
                "Task {} depends on unknown task {}",
                reference.task_id, reference.missing_id
            ));
        }

        let cycles = self.detect_circular_dependencies(&graph);
        for cycle in &cycles {
            if cycle.len() == 2 {
                errors.push(format!("Task {} depends on itself", cycle[0]));
            } else {
                errors.push(format!("Circular dependency: {}", cycle.join(" -> ")));
            }
        }

        DependencyValidation {
            is_valid: errors.is_empty(),
            errors,
            cycles,
        }
    }
}

/// Iterative depth-first search from `root`. Each frame holds a node and the
/// index of the next dependent to visit, so chain length does not grow the
/// call stack.
fn dfs_cycle_detection<'a>(
    root: &'a str,
    graph: &'a DependencyGraph,
    visited: &mut HashSet<&'a str>,
    cycles: &mut Vec<Vec<String>>,
) {
    let mut rec_stack: HashSet<&'a str> = HashSet::new();
    let mut path: Vec<&'a str> = Vec::new();
    let mut frames: Vec<(&'a str, usize)> = Vec::new();

    visited.insert(root);
    rec_stack.insert(root);
    path.push(root);
    frames.push((root, 0));

    while let Some(frame) = frames.last_mut() {
        let (node, next) = *frame;
        let Some(neighbor) = graph
            .nodes
            .get(node)
            .and_then(|current| current.dependents.get(next))
        else {
            frames.pop();
            rec_stack.remove(node);
            path.pop();
            continue;
        };
        frame.1 += 1;

        let neighbor = neighbor.as_str();
        if !visited.contains(neighbor) {
            visited.insert(neighbor);
            rec_stack.insert(neighbor);
            path.push(neighbor);
            frames.push((neighbor, 0));
        } else if rec_stack.contains(neighbor) {
            if let Some(start) = path.iter().position(|id| *id == neighbor) {
                let mut cycle: Vec<String> =
                    path[start..].iter().map(|id| id.to_string()).collect();
                cycle.push(neighbor.to_string());
                cycles.push(cycle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(tasks: &[TaskDefinition]) -> Vec<&str> {
        tasks.iter().map(|task| task.id.as_str()).collect()
    }

    #[test]
    fn graph_links_both_directions_and_keeps_dangling() {
        let tasks = vec![
            TaskDefinition::flexible("a", 30),
            TaskDefinition::flexible("b", 30).with_dependency("a"),
            TaskDefinition::flexible("c", 30).with_dependency("ghost"),
        ];
        let graph = DependencyResolver::new().build_dependency_graph(&tasks);

        assert_eq!(graph.len(), 3);
        let a = graph.node("a").expect("node a");
        let b = graph.node("b").expect("node b");
        assert_eq!(a.dependents, vec!["b".to_string()]);
        assert_eq!(b.dependencies, vec!["a".to_string()]);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.dangling.len(), 1);
        assert_eq!(graph.dangling[0].missing_id, "ghost");
    }

    #[test]
    fn ready_tasks_come_out_by_priority() {
        let tasks = vec![
            TaskDefinition::flexible("low", 30).with_priority(1),
            TaskDefinition::flexible("high", 30).with_priority(9),
            TaskDefinition::flexible("mid", 30).with_priority(5),
        ];
        let sorted = DependencyResolver::new().topological_sort(&tasks);
        assert_eq!(ids(&sorted), vec!["high", "mid", "low"]);
    }

    #[test]
    fn predecessors_precede_even_when_less_important() {
        let tasks = vec![
            TaskDefinition::flexible("report", 60)
                .with_priority(10)
                .with_dependency("research"),
            TaskDefinition::flexible("research", 60)
                .with_priority(1)
                .with_dependency("setup"),
            TaskDefinition::flexible("setup", 15).with_priority(0),
            TaskDefinition::flexible("email", 15).with_priority(5),
        ];
        let sorted = DependencyResolver::new().topological_sort(&tasks);
        assert_eq!(ids(&sorted), vec!["email", "setup", "research", "report"]);
    }

    #[test]
    fn equal_priorities_keep_input_order() {
        let tasks = vec![
            TaskDefinition::flexible("first", 30),
            TaskDefinition::flexible("second", 30),
            TaskDefinition::flexible("third", 30),
        ];
        let sorted = DependencyResolver::new().topological_sort(&tasks);
        assert_eq!(ids(&sorted), vec!["first", "second", "third"]);
    }

    #[test]
    fn cycles_fall_back_to_priority_order() {
        let tasks = vec![
            TaskDefinition::flexible("a", 30)
                .with_priority(2)
                .with_dependency("c"),
            TaskDefinition::flexible("b", 30)
                .with_priority(7)
                .with_dependency("a"),
            TaskDefinition::flexible("c", 30)
                .with_priority(4)
                .with_dependency("b"),
            TaskDefinition::flexible("free", 30).with_priority(1),
        ];
        let sorted = DependencyResolver::new().topological_sort(&tasks);
        assert_eq!(sorted.len(), tasks.len());
        assert_eq!(ids(&sorted), vec!["free", "b", "c", "a"]);
    }

    #[test]
    fn self_dependency_is_a_cycle_of_one() {
        let resolver = DependencyResolver::new();
        let tasks = vec![
            TaskDefinition::flexible("loop", 30)
                .with_priority(3)
                .with_dependency("loop"),
            TaskDefinition::flexible("plain", 30).with_priority(1),
        ];
        let sorted = resolver.topological_sort(&tasks);
        assert_eq!(ids(&sorted), vec!["plain", "loop"]);

        let graph = resolver.build_dependency_graph(&tasks);
        let cycles = resolver.detect_circular_dependencies(&graph);
        assert_eq!(cycles, vec![vec!["loop".to_string(), "loop".to_string()]]);
    }

    #[test]
    fn detects_closed_cycle_path() {
        let resolver = DependencyResolver::new();
        let tasks = vec![
            TaskDefinition::flexible("a", 30).with_dependency("b"),
            TaskDefinition::flexible("b", 30).with_dependency("a"),
            TaskDefinition::flexible("c", 30),
        ];
        let graph = resolver.build_dependency_graph(&tasks);
        assert!(resolver.has_circular_dependencies(&graph));
        let cycles = resolver.detect_circular_dependencies(&graph);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].first(), cycles[0].last());
        assert_eq!(cycles[0].len(), 3);
    }

    #[test]
    fn validation_collects_all_problems() {
        let tasks = vec![
            TaskDefinition::flexible("a", 30).with_dependency("b"),
            TaskDefinition::flexible("b", 30).with_dependency("a"),
            TaskDefinition::flexible("me", 30).with_dependency("me"),
            TaskDefinition::flexible("orphan", 30).with_dependency("nobody"),
        ];
        let report = DependencyResolver::new().validate_dependency_chain(&tasks);
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 3);
        assert!(report.errors.iter().any(|e| e.contains("unknown task nobody")));
        assert!(report.errors.iter().any(|e| e.contains("me depends on itself")));
        assert!(report.errors.iter().any(|e| e.starts_with("Circular dependency")));

        let clean = vec![
            TaskDefinition::flexible("a", 30),
            TaskDefinition::flexible("b", 30).with_dependency("a"),
        ];
        assert!(DependencyResolver::new().validate_dependency_chain(&clean).is_valid);
    }

    #[test]
    fn long_chain_is_walked_without_recursion() {
        let len = 50_000;
        let mut tasks: Vec<TaskDefinition> = (0..len)
            .map(|idx| {
                let task = TaskDefinition::flexible(format!("t{idx}"), 5);
                if idx == 0 {
                    task
                } else {
                    task.with_dependency(format!("t{}", idx - 1))
                }
            })
            .collect();
        let resolver = DependencyResolver::new();

        assert!(resolver.validate_dependency_chain(&tasks).is_valid);

        // Close the chain into one long loop
        tasks[0] = TaskDefinition::flexible("t0", 5).with_dependency(format!("t{}", len - 1));
        let report = resolver.validate_dependency_chain(&tasks);
        assert!(!report.is_valid);
        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.cycles[0].len(), len + 1);
    }
}
