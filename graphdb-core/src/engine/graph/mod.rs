//! Higher-level graph operations layered over the [`StorageEngine`]:
//! property-predicate scans (thin pass-throughs) and bounded-depth
//! neighborhood traversal with request-scoped memoization.

use crate::engine::codec::properties::PropertyMap;
use crate::engine::storage::{Edge, Node, StorageEngine};
use crate::engine::types::GraphError;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

const DEFAULT_QUERY_TTL: Duration = Duration::from_secs(300);

struct QueryState {
    visited: HashSet<u32>,
    last_touched: Instant,
}

impl QueryState {
    fn new() -> Self {
        Self {
            visited: HashSet::new(),
            last_touched: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_touched = Instant::now();
    }
}

/// Wraps a [`StorageEngine`] with the query-id-scoped vocabulary the storage
/// layer deliberately knows nothing about.
pub struct GraphEngine {
    storage: StorageEngine,
    queries: HashMap<String, QueryState>,
    query_ttl: Duration,
}

impl GraphEngine {
    pub fn new(storage: StorageEngine) -> Self {
        Self::with_query_ttl(storage, DEFAULT_QUERY_TTL)
    }

    pub fn with_query_ttl(storage: StorageEngine, query_ttl: Duration) -> Self {
        Self {
            storage,
            queries: HashMap::new(),
            query_ttl,
        }
    }

    pub fn storage(&self) -> &StorageEngine {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut StorageEngine {
        &mut self.storage
    }

    pub fn get_nodes_by_properties(&mut self, query: &PropertyMap) -> Result<Vec<Node>, GraphError> {
        self.storage.get_nodes_by_properties(query)
    }

    pub fn get_edges_by_properties(&mut self, query: &PropertyMap) -> Result<Vec<Edge>, GraphError> {
        self.storage.get_edges_by_properties(query)
    }

    /// Explicitly discards the visited set for `query_id`. Callers that know
    /// a traversal has completed (e.g. the shard router, after the last hop)
    /// should call this rather than waiting on the TTL.
    pub fn end_query(&mut self, query_id: &str) {
        self.queries.remove(query_id);
    }

    /// Breadth-first over `hops` steps from `start_id`, deduplicating against
    /// every node already visited under `query_id` (including by an earlier
    /// call sharing the same id, e.g. from a cross-shard fan-out).
    ///
    /// `hops = 0` yields the empty set. Negative `hops` is `InvalidArgument`.
    /// An unknown `start_id` is `NotFound`.
    pub fn find_neighbours(
        &mut self,
        start_id: u32,
        hops: i64,
        query_id: &str,
        node_predicate: Option<&dyn Fn(&Node) -> bool>,
        edge_predicate: Option<&dyn Fn(&Edge) -> bool>,
    ) -> Result<HashSet<u32>, GraphError> {
        if hops < 0 {
            return Err(GraphError::InvalidArgument("hops must not be negative".into()));
        }
        if !self.storage.node_exists(start_id)? {
            return Err(GraphError::NotFound);
        }

        self.evict_stale_queries();
        let state = self
            .queries
            .entry(query_id.to_string())
            .or_insert_with(QueryState::new);
        state.touch();
        state.visited.insert(start_id);

        let mut result = HashSet::new();
        if hops == 0 {
            return Ok(result);
        }

        let mut frontier = vec![start_id];
        for _ in 0..hops {
            if frontier.is_empty() {
                break;
            }
            let mut next_frontier = Vec::new();
            for node_id in frontier {
                let mut incident = self.storage.get_edges_from(node_id)?;
                incident.extend(self.storage.get_edges_to(node_id)?);

                for edge_id in incident {
                    let edge = self.storage.get_edge(edge_id, false, false)?;
                    if let Some(pred) = edge_predicate {
                        if !pred(&edge) {
                            continue;
                        }
                    }
                    let other = if edge.from_id == node_id {
                        edge.to_id
                    } else {
                        edge.from_id
                    };

                    let state = self.queries.get_mut(query_id).expect("query state just inserted");
                    if state.visited.contains(&other) {
                        continue;
                    }

                    let other_node = self.storage.get_node(other)?;
                    if let Some(pred) = node_predicate {
                        if !pred(&other_node) {
                            continue;
                        }
                    }

                    let state = self.queries.get_mut(query_id).expect("query state just inserted");
                    state.visited.insert(other);
                    result.insert(other);
                    next_frontier.push(other);
                }
            }
            frontier = next_frontier;
        }

        Ok(result)
    }

    fn evict_stale_queries(&mut self) {
        let ttl = self.query_ttl;
        self.queries.retain(|_, state| state.last_touched.elapsed() < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::storage::StorageEngine;
    use tempfile::TempDir;

    fn engine() -> (TempDir, GraphEngine) {
        let dir = TempDir::new().unwrap();
        let storage = StorageEngine::open(dir.path(), "test").unwrap();
        (dir, GraphEngine::new(storage))
    }

    #[test]
    fn s3_bounded_hop_traversal() {
        let (_dir, mut g) = engine();
        let n1 = g.storage_mut().create_node(&PropertyMap::new()).unwrap();
        let n2 = g.storage_mut().create_node(&PropertyMap::new()).unwrap();
        let n3 = g.storage_mut().create_node(&PropertyMap::new()).unwrap();
        g.storage_mut().create_edge(n1, &PropertyMap::new(), n2).unwrap();
        g.storage_mut().create_edge(n2, &PropertyMap::new(), n3).unwrap();

        let two_hops = g.find_neighbours(n1, 2, "q1", None, None).unwrap();
        assert_eq!(two_hops, HashSet::from([n2, n3]));

        let one_hop = g.find_neighbours(n1, 1, "q2", None, None).unwrap();
        assert_eq!(one_hop, HashSet::from([n2]));
    }

    #[test]
    fn zero_hops_is_empty() {
        let (_dir, mut g) = engine();
        let n1 = g.storage_mut().create_node(&PropertyMap::new()).unwrap();
        let n2 = g.storage_mut().create_node(&PropertyMap::new()).unwrap();
        g.storage_mut().create_edge(n1, &PropertyMap::new(), n2).unwrap();

        let result = g.find_neighbours(n1, 0, "q", None, None).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn negative_hops_is_invalid_argument() {
        let (_dir, mut g) = engine();
        let n1 = g.storage_mut().create_node(&PropertyMap::new()).unwrap();
        assert!(matches!(
            g.find_neighbours(n1, -1, "q", None, None),
            Err(GraphError::InvalidArgument(_))
        ));
    }

    #[test]
    fn unknown_start_is_not_found() {
        let (_dir, mut g) = engine();
        assert!(matches!(
            g.find_neighbours(999, 1, "q", None, None),
            Err(GraphError::NotFound)
        ));
    }

    #[test]
    fn traversal_does_not_revisit_through_a_cycle() {
        let (_dir, mut g) = engine();
        let n1 = g.storage_mut().create_node(&PropertyMap::new()).unwrap();
        let n2 = g.storage_mut().create_node(&PropertyMap::new()).unwrap();
        g.storage_mut().create_edge(n1, &PropertyMap::new(), n2).unwrap();
        g.storage_mut().create_edge(n2, &PropertyMap::new(), n1).unwrap();

        let result = g.find_neighbours(n1, 5, "q", None, None).unwrap();
        assert_eq!(result, HashSet::from([n2]));
    }

    #[test]
    fn shared_query_id_accumulates_visited_state_across_calls() {
        let (_dir, mut g) = engine();
        let n1 = g.storage_mut().create_node(&PropertyMap::new()).unwrap();
        let n2 = g.storage_mut().create_node(&PropertyMap::new()).unwrap();
        let n3 = g.storage_mut().create_node(&PropertyMap::new()).unwrap();
        g.storage_mut().create_edge(n1, &PropertyMap::new(), n2).unwrap();
        g.storage_mut().create_edge(n1, &PropertyMap::new(), n3).unwrap();

        let first = g.find_neighbours(n1, 1, "shared", None, None).unwrap();
        assert_eq!(first, HashSet::from([n2, n3]));

        // Re-entering with the same start and query id contributes no new
        // nodes since n2/n3 are already in the shared visited set.
        let second = g.find_neighbours(n1, 1, "shared", None, None).unwrap();
        assert!(second.is_empty());

        g.end_query("shared");
        let third = g.find_neighbours(n1, 1, "shared", None, None).unwrap();
        assert_eq!(third, HashSet::from([n2, n3]));
    }
}
