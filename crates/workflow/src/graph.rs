// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency-graph algorithms: cycle detection and topological ordering.

use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency cycle: {}", path.join(" -> "))]
pub struct CycleError {
    /// One witness cycle, starting and ending at the same job.
    pub path: Vec<String>,
}

#[derive(Clone, Copy, PartialEq)]
enum Colour {
    White,
    Grey,
    Black,
}

/// DFS cycle detection with white/grey/black colouring.
///
/// `deps` maps each job to the jobs it depends on. Returns a witness
/// cycle when one exists.
pub fn detect_cycle(deps: &IndexMap<String, Vec<String>>) -> Option<Vec<String>> {
    let mut colours: IndexMap<&str, Colour> =
        deps.keys().map(|k| (k.as_str(), Colour::White)).collect();
    let mut stack: Vec<&str> = Vec::new();

    fn visit<'a>(
        node: &'a str,
        deps: &'a IndexMap<String, Vec<String>>,
        colours: &mut IndexMap<&'a str, Colour>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        colours.insert(node, Colour::Grey);
        stack.push(node);

        if let Some(children) = deps.get(node) {
            for child in children {
                match colours.get(child.as_str()).copied() {
                    // References to unknown jobs are caught by validation
                    None => continue,
                    Some(Colour::Black) => continue,
                    Some(Colour::Grey) => {
                        let start = stack
                            .iter()
                            .position(|n| *n == child.as_str())
                            .unwrap_or(0);
                        let mut path: Vec<String> =
                            stack[start..].iter().map(|s| s.to_string()).collect();
                        path.push(child.clone());
                        return Some(path);
                    }
                    Some(Colour::White) => {
                        if let Some(cycle) = visit(child.as_str(), deps, colours, stack) {
                            return Some(cycle);
                        }
                    }
                }
            }
        }

        stack.pop();
        colours.insert(node, Colour::Black);
        None
    }

    for node in deps.keys() {
        if colours.get(node.as_str()) == Some(&Colour::White) {
            if let Some(cycle) = visit(node.as_str(), deps, &mut colours, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

/// Kahn's algorithm: one topological order of the dependency graph.
///
/// Jobs with equal depth keep their document order (the queue is FIFO and
/// seeded in iteration order).
pub fn kahn_order(deps: &IndexMap<String, Vec<String>>) -> Result<Vec<String>, CycleError> {
    let mut in_degree: IndexMap<&str, usize> = deps.keys().map(|k| (k.as_str(), 0)).collect();
    // Reverse edges: dependency -> dependants
    let mut dependants: IndexMap<&str, Vec<&str>> =
        deps.keys().map(|k| (k.as_str(), Vec::new())).collect();

    for (job, job_deps) in deps {
        for dep in job_deps {
            if !in_degree.contains_key(dep.as_str()) {
                continue;
            }
            *in_degree.entry(job.as_str()).or_insert(0) += 1;
            if let Some(list) = dependants.get_mut(dep.as_str()) {
                list.push(job.as_str());
            }
        }
    }

    let mut queue: std::collections::VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();

    let mut order = Vec::with_capacity(deps.len());
    while let Some(node) = queue.pop_front() {
        order.push(node.to_string());
        if let Some(children) = dependants.get(node) {
            for child in children.clone() {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }
    }

    if order.len() != deps.len() {
        let cycle = detect_cycle(deps).unwrap_or_default();
        return Err(CycleError { path: cycle });
    }
    Ok(order)
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
