//! Single-source shortest routes over a planet (Dijkstra).

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use crate::planet::Planet;
use crate::route::Route;
use crate::types::{NodeId, PathId};

#[derive(Debug)]
struct Candidate {
    length: f64,
    seq: u64,
    node_id: NodeId,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // Reversed so the max-heap pops the shortest candidate; equal lengths
    // fall back to discovery order.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .length
            .total_cmp(&self.length)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl Planet {
    fn adjacency(&self) -> BTreeMap<&str, Vec<(&str, &str, f64)>> {
        let mut adjacency: BTreeMap<&str, Vec<(&str, &str, f64)>> = BTreeMap::new();
        for path in self.paths().values() {
            if path.is_self_loop() || path.is_blocked() {
                continue;
            }
            adjacency
                .entry(path.node_a.as_str())
                .or_default()
                .push((path.node_b.as_str(), path.name.as_str(), path.length));
            adjacency
                .entry(path.node_b.as_str())
                .or_default()
                .push((path.node_a.as_str(), path.name.as_str(), path.length));
        }
        adjacency
    }

    /// The cheapest route from `origin` to every node reachable from it with
    /// finite length, including `origin` itself as an empty route.
    /// Unreachable nodes are absent.
    pub fn shortest_routes_from(&self, origin: &str) -> BTreeMap<NodeId, Route> {
        let mut routes = BTreeMap::new();
        if !self.contains_node(origin) {
            return routes;
        }

        let adjacency = self.adjacency();
        let mut best: BTreeMap<&str, f64> = BTreeMap::new();
        let mut previous: BTreeMap<&str, (&str, &str)> = BTreeMap::new();
        let mut settled: BTreeMap<&str, f64> = BTreeMap::new();
        let mut heap = BinaryHeap::new();
        let mut seq = 0_u64;

        best.insert(origin, 0.0);
        heap.push(Candidate {
            length: 0.0,
            seq,
            node_id: origin.to_string(),
        });

        while let Some(Candidate { length, node_id, .. }) = heap.pop() {
            let Some((&current, _)) = best.get_key_value(node_id.as_str()) else {
                continue;
            };
            if settled.contains_key(current) {
                continue;
            }
            settled.insert(current, length);

            let Some(edges) = adjacency.get(current) else {
                continue;
            };
            for &(neighbor, path_id, edge_length) in edges {
                if settled.contains_key(neighbor) {
                    continue;
                }
                let candidate = length + edge_length;
                let improves = best
                    .get(neighbor)
                    .map_or(true, |known| candidate < *known);
                if improves {
                    best.insert(neighbor, candidate);
                    previous.insert(neighbor, (current, path_id));
                    seq += 1;
                    heap.push(Candidate {
                        length: candidate,
                        seq,
                        node_id: neighbor.to_string(),
                    });
                }
            }
        }

        for (&node_id, &length) in &settled {
            routes.insert(
                node_id.to_string(),
                Route::new(origin, node_id, length, walk_back(&previous, origin, node_id)),
            );
        }
        routes
    }
}

/// Path ids from `target` back to `origin`: the last element is the first
/// hop out of `origin`.
fn walk_back(previous: &BTreeMap<&str, (&str, &str)>, origin: &str, target: &str) -> Vec<PathId> {
    let mut path_ids = Vec::new();
    let mut cursor = target;
    while cursor != origin {
        let Some(&(from, path_id)) = previous.get(cursor) else {
            break;
        };
        path_ids.push(path_id.to_string());
        cursor = from;
    }
    path_ids
}
