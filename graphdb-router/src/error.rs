//! The router's error surface: every [`GraphError`] kind plus the two
//! router-only kinds a single-engine operation can never produce.

use graphdb_core::GraphError;
use std::fmt;

#[derive(Debug)]
pub enum RouterError {
    Graph(GraphError),
    /// A cross-shard operation succeeded on a subset of shards; the router
    /// has already attempted compensating cleanup before returning this.
    PartiallyApplied(String),
    /// A shard endpoint did not respond within the deadline.
    Unreachable(usize),
    /// An external id ("shard:local") failed to parse or names a shard
    /// index outside the router's static shard list.
    InvalidExternalId(String),
}

impl std::error::Error for RouterError {}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::Graph(e) => write!(f, "{e}"),
            RouterError::PartiallyApplied(detail) => write!(f, "partially applied: {detail}"),
            RouterError::Unreachable(shard) => write!(f, "shard {shard} unreachable"),
            RouterError::InvalidExternalId(id) => write!(f, "invalid external id: {id}"),
        }
    }
}

impl From<GraphError> for RouterError {
    fn from(error: GraphError) -> Self {
        RouterError::Graph(error)
    }
}
