pub mod config;
pub mod engine;

pub use engine::codec::properties::PropertyMap;
pub use engine::codec::value::PropertyValue;
pub use engine::graph::GraphEngine;
pub use engine::storage::{Edge, Node, StorageEngine};
pub use engine::types::GraphError;
