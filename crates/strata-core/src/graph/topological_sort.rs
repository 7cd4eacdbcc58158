// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Kahn's algorithm over dense node indices.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

/// A cycle was detected. Carries the nodes that could not be ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    /// Indices of the nodes left with unresolved dependencies.
    pub unresolved: Vec<usize>,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dependency cycle between nodes {:?}", self.unresolved)
    }
}

impl std::error::Error for CycleError {}

/// Sorts `node_count` nodes (`0..node_count`) so every edge `(parent, child)`
/// has the parent first.
///
/// Among nodes that are ready at the same time, the lowest index comes first,
/// so a graph without edges keeps its insertion order.
///
/// # Arguments
///
/// * `node_count`: The number of nodes.
/// * `edges`: Directed `(parent, child)` pairs. Edges referencing nodes out of range are ignored.
///
/// # Returns
///
/// * `Ok(Vec<usize>)`: A valid topological order.
/// * `Err(CycleError)`: If the graph contains one or more cycles.
pub fn topological_sort(
    node_count: usize,
    edges: impl IntoIterator<Item = (usize, usize)>,
) -> Result<Vec<usize>, CycleError> {
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    let mut in_degree = vec![0usize; node_count];

    for (parent, child) in edges {
        if parent >= node_count || child >= node_count {
            continue;
        }
        children[parent].push(child);
        in_degree[child] += 1;
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(node_count);
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &child in &children[node] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.push(Reverse(child));
            }
        }
    }

    if order.len() == node_count {
        Ok(order)
    } else {
        Err(CycleError {
            unresolved: (0..node_count).filter(|i| in_degree[*i] > 0).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_edges_keeps_insertion_order() {
        assert_eq!(topological_sort(4, []), Ok(vec![0, 1, 2, 3]));
    }

    #[test]
    fn dependencies_come_first() {
        let order = topological_sort(4, [(3, 1), (1, 0), (2, 0)]).unwrap();
        let pos = |n| order.iter().position(|x| *x == n).unwrap();
        assert!(pos(3) < pos(1));
        assert!(pos(1) < pos(0));
        assert!(pos(2) < pos(0));
    }

    #[test]
    fn cycle_is_reported() {
        let err = topological_sort(3, [(0, 1), (1, 2), (2, 1)]).unwrap_err();
        assert_eq!(err.unresolved, vec![1, 2]);
    }

    #[test]
    fn empty_graph() {
        assert_eq!(topological_sort(0, []), Ok(vec![]));
    }
}
