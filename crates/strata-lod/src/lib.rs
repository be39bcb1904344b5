//! # Strata LOD
//!
//! Clustered level-of-detail hierarchies for triangle meshes.
//!
//! ## Pipeline
//! - Cluster the mesh into fixed-capacity meshlets
//! - Group neighbouring clusters through a swappable graph partitioner
//! - Merge and simplify each group with its border locked, then re-cluster
//! - Repeat until the generation budget is spent or nothing is left
//!
//! At runtime [`LodHierarchy::select`] picks, per instance, the coarsest
//! clusters whose projected error stays under the instance's pixel threshold.

pub mod cluster;
pub mod config;
pub mod group;
pub mod hierarchy;
pub mod instance;
pub mod merge;
pub mod mesh;
pub mod partition;
pub mod primitives;
pub mod select;
pub mod simplify;

pub use cluster::{Cluster, ClusterId, ClusterLimits, ClusterSet, ParentLink, build_clusters};
pub use config::HierarchyConfig;
pub use group::{ClusterGroup, group_clusters, link_parent_groups};
pub use hierarchy::{GenerationSummary, LodHierarchy, LodHierarchyBuilder};
pub use instance::{InstanceParams, grid_instances};
pub use merge::{ClusterSpan, MergedGroup, merge_group};
pub use mesh::{Mesh, Vertex};
pub use partition::{AdjacencyGraph, GraphPartitioner, GreedyPartitioner};
pub use select::{Selection, ViewState, screen_space_error, select_clusters};
pub use simplify::{SimplifiedGroup, simplify_group};

#[cfg(feature = "metis")]
pub use partition::MetisPartitioner;

use thiserror::Error;

/// LOD construction errors
#[derive(Error, Debug)]
pub enum LodError {
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Vertex layout rejected: {0}")]
    VertexLayout(String),

    #[error("Graph partitioning failed: {0}")]
    Partition(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

/// Result type for LOD operations
pub type LodResult<T> = Result<T, LodError>;
