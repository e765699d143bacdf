//! geocluster-algorithms: Density-based clustering for point features.
//!
//! This crate provides:
//! - **DBSCAN** with deterministic, collection-ordered cluster ids
//! - Pluggable **distance metrics** (planar Euclidean, haversine, closures)
//! - A sparse **spatial grid** backing neighborhood queries
//!
#![warn(missing_docs)]

mod dbscan;
pub mod metric;
mod processing;
pub mod spatial;

pub use dbscan::{DbscanClustering, DbscanConfig, DbscanState, NeighborSearch, GRID_THRESHOLD};
pub use metric::{DistanceMetric, Euclidean, GridEmbedding, Haversine, MetricKind, EARTH_RADIUS_M};
pub use processing::{cluster, cluster_with_metric};
pub use spatial::SpatialGrid;

// Re-export core clustering types
pub use geocluster_core::clustering::{
    ClusterAssignment, ClusterLabel, ClusterParams, ClusteringStatistics,
};
