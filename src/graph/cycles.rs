//! Cycle detection and topological ordering over the dependency graph.
//!
//! Cycles are never fatal anywhere in this crate: both functions here return
//! best-effort results on cyclic input and leave the judgment to callers.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::DocumentId;

use super::DependencyGraph;

/// Finds every cycle reachable by depth-first search.
///
/// Each back edge yields one cycle: the recursion-stack slice from the back
/// edge's target up to the current node. A self-loop yields a singleton
/// cycle. Nodes are visited in sorted order, so repeated runs over the same
/// graph return the same cycles in the same order.
pub fn detect_cycles(graph: &DependencyGraph) -> Vec<Vec<DocumentId>> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Unvisited,
        OnStack,
        Done,
    }

    let mut state: BTreeMap<&DocumentId, State> = graph
        .nodes()
        .iter()
        .map(|n| (n, State::Unvisited))
        .collect();
    let mut stack: Vec<DocumentId> = Vec::new();
    let mut cycles: Vec<Vec<DocumentId>> = Vec::new();

    fn visit<'a>(
        node: &'a DocumentId,
        graph: &'a DependencyGraph,
        state: &mut BTreeMap<&'a DocumentId, State>,
        stack: &mut Vec<DocumentId>,
        cycles: &mut Vec<Vec<DocumentId>>,
    ) {
        state.insert(node, State::OnStack);
        stack.push(node.clone());

        for next in graph.successors(node) {
            match state.get(next).copied().unwrap_or(State::Done) {
                State::OnStack => {
                    // Back edge: the stack slice from `next` to here is a cycle.
                    if let Some(start) = stack.iter().position(|n| n == next) {
                        cycles.push(stack[start..].to_vec());
                    }
                }
                State::Unvisited => visit(next, graph, state, stack, cycles),
                State::Done => {}
            }
        }

        stack.pop();
        state.insert(node, State::Done);
    }

    for node in graph.nodes() {
        if state.get(node) == Some(&State::Unvisited) {
            visit(node, graph, &mut state, &mut stack, &mut cycles);
        }
    }
    cycles
}

/// A linear order of the graph's nodes. `complete` is false when cycles
/// stranded some nodes and the tail of `order` is a best-effort DFS
/// placement instead of a true topological position.
#[derive(Debug, Clone, PartialEq)]
pub struct TopologicalOrder {
    pub order: Vec<DocumentId>,
    pub complete: bool,
}

/// Kahn's algorithm over a zero-in-degree frontier, with a DFS post-order
/// fallback for nodes stranded by cycles. Never fails: cyclic graphs get a
/// partial order covering every node.
pub fn topological_order(graph: &DependencyGraph) -> TopologicalOrder {
    let mut in_degree: BTreeMap<&DocumentId, usize> =
        graph.nodes().iter().map(|n| (n, 0)).collect();
    for from in graph.nodes() {
        for to in graph.successors(from) {
            *in_degree.entry(to).or_insert(0) += 1;
        }
    }

    // BTreeSet frontier keeps tie-breaking deterministic (smallest id first).
    let mut frontier: BTreeSet<&DocumentId> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(n, _)| *n)
        .collect();

    let mut order: Vec<DocumentId> = Vec::with_capacity(graph.nodes().len());
    let mut placed: BTreeSet<&DocumentId> = BTreeSet::new();

    while let Some(node) = frontier.iter().next().copied() {
        frontier.remove(node);
        order.push(node.clone());
        placed.insert(node);
        for next in graph.successors(node) {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    frontier.insert(next);
                }
            }
        }
    }

    let complete = order.len() == graph.nodes().len();
    if !complete {
        // Reverse post-order keeps prerequisites ahead of dependents along
        // the acyclic portions of the stranded subgraph.
        let mut visited: BTreeSet<&DocumentId> = placed.clone();
        let mut post: Vec<DocumentId> = Vec::new();

        fn visit<'a>(
            node: &'a DocumentId,
            graph: &'a DependencyGraph,
            visited: &mut BTreeSet<&'a DocumentId>,
            post: &mut Vec<DocumentId>,
        ) {
            visited.insert(node);
            for next in graph.successors(node) {
                if !visited.contains(next) {
                    visit(next, graph, visited, post);
                }
            }
            post.push(node.clone());
        }

        for node in graph.nodes() {
            if !visited.contains(node) {
                visit(node, graph, &mut visited, &mut post);
            }
        }
        post.reverse();
        order.extend(post);
    }

    debug_assert_eq!(order.len(), graph.nodes().len());
    TopologicalOrder { order, complete }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DependencyGraph;

    fn graph(edges: &[(&str, &str)], extra_nodes: &[&str]) -> DependencyGraph {
        let mut g = DependencyGraph::default();
        for node in extra_nodes {
            g.add_node(DocumentId::new(*node));
        }
        for (from, to) in edges {
            g.add_node(DocumentId::new(*from));
            g.add_node(DocumentId::new(*to));
            g.add_edge(DocumentId::new(*from), DocumentId::new(*to));
        }
        g
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let g = graph(&[("a", "b"), ("b", "c"), ("a", "c")], &[]);
        assert!(detect_cycles(&g).is_empty());
    }

    #[test]
    fn simple_cycle_is_found() {
        let g = graph(&[("a", "b"), ("b", "a")], &[]);
        let cycles = detect_cycles(&g);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 2);
    }

    #[test]
    fn self_loop_yields_singleton_cycle() {
        let g = graph(&[("a", "a")], &[]);
        let cycles = detect_cycles(&g);
        assert_eq!(cycles, vec![vec![DocumentId::new("a")]]);
    }

    #[test]
    fn detection_is_idempotent() {
        let g = graph(&[("a", "b"), ("b", "c"), ("c", "a"), ("d", "d")], &[]);
        let first = detect_cycles(&g);
        let second = detect_cycles(&g);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn topological_order_respects_edges() {
        let g = graph(&[("base", "mid"), ("mid", "top"), ("base", "top")], &[]);
        let topo = topological_order(&g);
        assert!(topo.complete);
        let pos = |id: &str| {
            topo.order
                .iter()
                .position(|n| n.as_str() == id)
                .unwrap()
        };
        assert!(pos("base") < pos("mid"));
        assert!(pos("mid") < pos("top"));
    }

    #[test]
    fn cyclic_graph_still_covers_every_node() {
        let g = graph(&[("a", "b"), ("b", "a"), ("c", "a")], &["d"]);
        let topo = topological_order(&g);
        assert!(!topo.complete);
        assert_eq!(topo.order.len(), 4);
    }
}
