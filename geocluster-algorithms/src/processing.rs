//! High-level clustering entry points.

use geocluster_core::{ClusterAssignment, ClusterParams, FeatureCollection, Result};

use crate::dbscan::{DbscanClustering, DbscanConfig, NeighborSearch};
use crate::metric::{DistanceMetric, Euclidean, Haversine, MetricKind};

/// Clusters `collection` with DBSCAN under an arbitrary metric.
///
/// # Errors
/// Returns an error if `params` is invalid.
pub fn cluster<M>(
    collection: &FeatureCollection,
    params: &ClusterParams,
    distance: &M,
) -> Result<ClusterAssignment>
where
    M: DistanceMetric + ?Sized,
{
    DbscanClustering::new(DbscanConfig {
        params: *params,
        search: NeighborSearch::Auto,
    })
    .cluster(collection, distance)
}

/// Clusters `collection` with one of the built-in metrics.
///
/// # Errors
/// Returns an error if the configured parameters are invalid.
pub fn cluster_with_metric(
    collection: &FeatureCollection,
    config: &DbscanConfig,
    metric: MetricKind,
) -> Result<ClusterAssignment> {
    let algo = DbscanClustering::new(config.clone());
    match metric {
        MetricKind::Euclidean => algo.cluster(collection, &Euclidean),
        MetricKind::Haversine => algo.cluster(collection, &Haversine::default()),
    }
}
