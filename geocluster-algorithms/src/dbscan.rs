//! DBSCAN clustering over a feature collection.
//!
//! Visitation and neighborhood enumeration both follow collection order, so
//! cluster ids are reproducible for a fixed input. A border point keeps the
//! first cluster that reaches it.

use std::collections::VecDeque;

use geocluster_core::{ClusterAssignment, ClusterLabel, ClusterParams, FeatureCollection, Result};
use rayon::prelude::*;

use crate::metric::{chord_length, unit_vector, DistanceMetric, GridEmbedding};
use crate::spatial::SpatialGrid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Collections larger than this use the grid index under [`NeighborSearch::Auto`].
pub const GRID_THRESHOLD: usize = 64;

/// Strategy used to answer epsilon-neighborhood queries.
///
/// Every strategy yields the same assignment; they differ only in cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum NeighborSearch {
    /// Grid when the metric allows it and the collection is large, else linear.
    #[default]
    Auto,
    /// Compare against every point (O(n²)).
    Linear,
    /// Uniform grid in the metric's [`GridEmbedding`]; falls back to linear
    /// for metrics without one.
    Grid,
}

/// DBSCAN configuration.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DbscanConfig {
    /// Density parameters.
    pub params: ClusterParams,
    /// Neighbor-query strategy.
    pub search: NeighborSearch,
}

/// Reusable scratch buffers.
#[derive(Default)]
pub struct DbscanState {
    core: Vec<bool>,
    labels: Vec<Option<ClusterLabel>>,
    neighbors: Vec<usize>,
    queue: VecDeque<usize>,
}

/// Absolute cell slack for the spherical grid, covering trigonometric
/// rounding when epsilon is a tiny fraction of the radius.
const SPHERE_CELL_SLACK: f64 = 1e-12;

/// Candidate index for one run.
enum NeighborIndex {
    Planar(SpatialGrid<2>),
    Spherical {
        grid: SpatialGrid<3>,
        positions: Vec<[f64; 3]>,
    },
}

impl NeighborIndex {
    fn build(coords: &[[f64; 2]], epsilon: f64, embedding: GridEmbedding) -> Option<Self> {
        match embedding {
            GridEmbedding::Unsupported => None,
            GridEmbedding::Planar => Some(Self::Planar(SpatialGrid::build(coords, epsilon))),
            GridEmbedding::Spherical { radius_m } => {
                let positions: Vec<[f64; 3]> = coords.iter().map(|&p| unit_vector(p)).collect();
                let cell = chord_length(epsilon, radius_m) + SPHERE_CELL_SLACK;
                Some(Self::Spherical {
                    grid: SpatialGrid::build(&positions, cell),
                    positions,
                })
            }
        }
    }

    fn candidates_into(&self, idx: usize, p: [f64; 2], out: &mut Vec<usize>) {
        match self {
            Self::Planar(grid) => grid.query_neighborhood_into(p, out),
            Self::Spherical { grid, positions } => grid.query_neighborhood_into(positions[idx], out),
        }
    }
}

/// Answers neighborhood queries for one run.
struct RegionQuery<'a, M: ?Sized> {
    coords: &'a [[f64; 2]],
    metric: &'a M,
    epsilon: f64,
    index: Option<NeighborIndex>,
}

impl<M: DistanceMetric + ?Sized> RegionQuery<'_, M> {
    /// Fills `out` with every index within epsilon of `idx` (itself included),
    /// ascending.
    fn region_query_into(&self, idx: usize, out: &mut Vec<usize>) {
        let p = self.coords[idx];
        match &self.index {
            Some(index) => {
                index.candidates_into(idx, p, out);
                out.retain(|&j| self.metric.distance(p, self.coords[j]) <= self.epsilon);
                out.sort_unstable();
            }
            None => {
                out.clear();
                out.extend(
                    self.coords
                        .iter()
                        .enumerate()
                        .filter(|(_, q)| self.metric.distance(p, **q) <= self.epsilon)
                        .map(|(j, _)| j),
                );
            }
        }
    }
}

/// Density-based clustering with noise.
#[derive(Clone, Debug, Default)]
pub struct DbscanClustering {
    config: DbscanConfig,
}

impl DbscanClustering {
    /// Create with custom configuration.
    #[must_use]
    pub fn new(config: DbscanConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &DbscanConfig {
        &self.config
    }

    /// Fresh scratch buffers for [`Self::cluster_with_state`].
    #[must_use]
    pub fn create_state(&self) -> DbscanState {
        DbscanState::default()
    }

    /// Clusters `collection` under `metric`.
    ///
    /// # Errors
    /// Returns an error if the configured parameters are invalid.
    pub fn cluster<M>(&self, collection: &FeatureCollection, metric: &M) -> Result<ClusterAssignment>
    where
        M: DistanceMetric + ?Sized,
    {
        let mut state = self.create_state();
        self.cluster_with_state(collection, metric, &mut state)
    }

    /// Clusters `collection`, reusing the buffers in `state`.
    ///
    /// # Errors
    /// Returns an error if the configured parameters are invalid.
    pub fn cluster_with_state<M>(
        &self,
        collection: &FeatureCollection,
        metric: &M,
        state: &mut DbscanState,
    ) -> Result<ClusterAssignment>
    where
        M: DistanceMetric + ?Sized,
    {
        let params = self.config.params;
        params.validate()?;

        let n = collection.len();
        if n == 0 {
            return Ok(ClusterAssignment::default());
        }

        let coords = collection.coordinates();
        let query = RegionQuery {
            coords: &coords,
            metric,
            epsilon: params.epsilon,
            index: if self.use_grid(n, metric) {
                NeighborIndex::build(&coords, params.epsilon, metric.grid_embedding())
            } else {
                None
            },
        };
        log::debug!(
            "dbscan: {n} points, metric={}, index={}",
            metric.name(),
            match query.index {
                Some(NeighborIndex::Planar(_)) => "planar grid",
                Some(NeighborIndex::Spherical { .. }) => "spherical grid",
                None => "linear",
            }
        );

        // Phase 1: core flags, in parallel. Neighbor lists are not kept so
        // memory stays linear for dense inputs.
        state.core.clear();
        state.core.par_extend((0..n).into_par_iter().map_init(Vec::new, |buf, i| {
            query.region_query_into(i, buf);
            buf.len() >= params.min_points
        }));

        // Phase 2: sequential expansion in collection order. Points are
        // labelled when first reached and only core points are queued, so
        // each index enters the queue at most once.
        state.labels.clear();
        state.labels.resize(n, None);
        let mut next_id = 0usize;

        for i in 0..n {
            if state.labels[i].is_some() {
                continue;
            }
            if !state.core[i] {
                // Provisional: may still be absorbed as a border point.
                state.labels[i] = Some(ClusterLabel::Noise);
                continue;
            }

            let cluster_id = next_id;
            next_id += 1;
            state.labels[i] = Some(ClusterLabel::Cluster(cluster_id));
            state.queue.clear();
            state.queue.push_back(i);

            while let Some(j) = state.queue.pop_front() {
                query.region_query_into(j, &mut state.neighbors);
                for &k in &state.neighbors {
                    match state.labels[k] {
                        Some(ClusterLabel::Cluster(_)) => {}
                        // Known non-core: border point, no expansion.
                        Some(ClusterLabel::Noise) => {
                            state.labels[k] = Some(ClusterLabel::Cluster(cluster_id));
                        }
                        None => {
                            state.labels[k] = Some(ClusterLabel::Cluster(cluster_id));
                            if state.core[k] {
                                state.queue.push_back(k);
                            }
                        }
                    }
                }
            }
        }

        let labels = state
            .labels
            .iter()
            .map(|l| l.unwrap_or(ClusterLabel::Noise))
            .collect();
        let assignment = ClusterAssignment::from_labels(labels);
        log::debug!(
            "dbscan: {} cluster(s), {} noise point(s)",
            assignment.cluster_count(),
            assignment.noise_count()
        );
        Ok(assignment)
    }

    fn use_grid<M: DistanceMetric + ?Sized>(&self, n: usize, metric: &M) -> bool {
        let prunable = metric.grid_embedding() != GridEmbedding::Unsupported;
        match self.config.search {
            NeighborSearch::Linear => false,
            NeighborSearch::Grid => {
                if !prunable {
                    log::debug!(
                        "dbscan: metric '{}' cannot use the grid index, scanning linearly",
                        metric.name()
                    );
                }
                prunable
            }
            NeighborSearch::Auto => prunable && n > GRID_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{Euclidean, Haversine};
    use geocluster_core::ClusterLabel::{Cluster, Noise};

    fn run(points: &[(f64, f64)], epsilon: f64, min_points: usize) -> ClusterAssignment {
        let collection = FeatureCollection::from_points(points.iter().copied()).unwrap();
        let algo = DbscanClustering::new(DbscanConfig {
            params: ClusterParams::new(epsilon, min_points).unwrap(),
            search: NeighborSearch::Linear,
        });
        algo.cluster(&collection, &Euclidean).unwrap()
    }

    #[test]
    fn test_empty_collection() {
        let assignment = run(&[], 0.05, 2);
        assert!(assignment.is_empty());
        assert_eq!(assignment.cluster_count(), 0);
    }

    #[test]
    fn test_min_points_one_makes_every_point_a_cluster() {
        let assignment = run(&[(0.0, 0.0), (5.0, 5.0)], 0.05, 1);
        assert_eq!(assignment.labels(), &[Cluster(0), Cluster(1)]);
    }

    #[test]
    fn test_noise_later_absorbed_as_border() {
        // Points on a line, epsilon 1.0, min_points 3:
        //   neighborhoods 0:{0,1}  1:{0,1,2}  2:{1,2,3}  3:{2,3}
        // Index 0 is scanned first and provisionally marked noise; core index 1
        // later absorbs it as a border point.
        let assignment = run(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (2.5, 0.0)], 1.0, 3);
        assert_eq!(assignment.labels(), &[Cluster(0), Cluster(0), Cluster(0), Cluster(0)]);
    }

    #[test]
    fn test_border_point_keeps_first_cluster() {
        // Two dense groups; index 4 is within reach of exactly one point of each
        // group and is not itself core.
        let points = [
            (0.0, 0.0),
            (0.0, 0.1),
            (0.1, 0.0),
            (-0.05, 0.05),
            (1.0, 0.0),
            (1.9, 0.0),
            (2.0, 0.1),
            (2.0, 0.0),
            (2.05, 0.05),
        ];
        let assignment = run(&points, 0.95, 4);
        assert_eq!(assignment.cluster_count(), 2);
        assert_eq!(assignment.get(4), Some(Cluster(0)));
        assert_eq!(assignment.members(0), vec![0, 1, 2, 3, 4]);
        assert_eq!(assignment.members(1), vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let collection = FeatureCollection::from_points([(0.0, 0.0)]).unwrap();
        let algo = DbscanClustering::new(DbscanConfig {
            params: ClusterParams {
                epsilon: -1.0,
                min_points: 2,
            },
            search: NeighborSearch::Auto,
        });
        assert!(algo.cluster(&collection, &Euclidean).is_err());
    }

    #[test]
    fn test_haversine_on_spherical_grid() {
        // Oslo centre and a point ~500 m east; a far point in Bergen.
        let collection =
            FeatureCollection::from_points([(10.7522, 59.9139), (10.7612, 59.9139), (5.3221, 60.3913)])
                .unwrap();
        let algo = DbscanClustering::new(DbscanConfig {
            params: ClusterParams::new(1_000.0, 2).unwrap(),
            search: NeighborSearch::Grid,
        });
        assert!(algo.use_grid(collection.len(), &Haversine::default()));
        let assignment = algo.cluster(&collection, &Haversine::default()).unwrap();
        assert_eq!(assignment.labels(), &[Cluster(0), Cluster(0), Noise]);
    }

    #[test]
    fn test_closure_metric_never_uses_grid() {
        let algo = DbscanClustering::new(DbscanConfig {
            params: ClusterParams::default(),
            search: NeighborSearch::Grid,
        });
        let chebyshev = |a: [f64; 2], b: [f64; 2]| (a[0] - b[0]).abs().max((a[1] - b[1]).abs());
        assert!(!algo.use_grid(10_000, &chebyshev));
    }

    #[test]
    fn test_coincident_points_keep_queue_linear() {
        let n = 3_000;
        let collection = FeatureCollection::from_points(vec![(10.0, 59.0); n]).unwrap();
        let algo = DbscanClustering::new(DbscanConfig {
            params: ClusterParams::new(0.05, 2).unwrap(),
            search: NeighborSearch::Linear,
        });
        let mut state = algo.create_state();

        let assignment = algo.cluster_with_state(&collection, &Euclidean, &mut state).unwrap();

        assert_eq!(assignment.cluster_count(), 1);
        assert_eq!(assignment.noise_count(), 0);
        assert!(
            state.queue.capacity() <= 4 * n,
            "queue grew to {}",
            state.queue.capacity()
        );
    }

    #[test]
    fn test_state_reuse_between_runs() {
        let algo = DbscanClustering::new(DbscanConfig::default());
        let mut state = algo.create_state();
        let big = FeatureCollection::from_points([(0.0, 0.0), (0.01, 0.0), (0.02, 0.0)]).unwrap();
        let small = FeatureCollection::from_points([(5.0, 5.0)]).unwrap();

        let a = algo.cluster_with_state(&big, &Euclidean, &mut state).unwrap();
        assert_eq!(a.cluster_count(), 1);
        let b = algo.cluster_with_state(&small, &Euclidean, &mut state).unwrap();
        assert_eq!(b.labels(), &[Noise]);
    }
}
