//! Talent tree metadata: typed definitions, the dataset source, and the cache

pub mod source;
pub mod store;
pub mod tree;

pub use source::{HttpMetadataSource, MetadataSource};
pub use store::{MetadataSnapshot, MetadataStore, SnapshotOrigin};
pub use tree::{Entry, Node, NodeGroup, NodeType, TreeDefinition};
