//! Clustering parameters and results.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Density parameters for DBSCAN.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterParams {
    /// Neighborhood radius, in the distance metric's units.
    pub epsilon: f64,
    /// Minimum neighborhood size (including the point itself) for a core point.
    pub min_points: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            epsilon: 0.05,
            min_points: 2,
        }
    }
}

impl ClusterParams {
    /// Creates validated parameters.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParams`] if `epsilon` is not positive and finite
    /// or `min_points` is zero.
    pub fn new(epsilon: f64, min_points: usize) -> Result<Self> {
        let params = Self {
            epsilon,
            min_points,
        };
        params.validate()?;
        Ok(params)
    }

    /// Sets the neighborhood radius.
    #[must_use]
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Sets the minimum neighborhood size.
    #[must_use]
    pub fn with_min_points(mut self, min_points: usize) -> Self {
        self.min_points = min_points;
        self
    }

    /// Checks the parameter domain.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParams`] describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(Error::InvalidParams(format!(
                "epsilon must be positive and finite, got {}",
                self.epsilon
            )));
        }
        if self.min_points == 0 {
            return Err(Error::InvalidParams(
                "min_points must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Label assigned to one feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterLabel {
    /// Not density-reachable from any core point.
    Noise,
    /// Member of the cluster with this id.
    Cluster(usize),
}

impl ClusterLabel {
    /// Returns the cluster id, or `None` for noise.
    #[must_use]
    pub fn cluster_id(self) -> Option<usize> {
        match self {
            Self::Cluster(id) => Some(id),
            Self::Noise => None,
        }
    }

    /// Returns true for noise.
    #[must_use]
    pub fn is_noise(self) -> bool {
        matches!(self, Self::Noise)
    }
}

#[cfg(feature = "serde")]
impl Serialize for ClusterLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Noise => serializer.serialize_none(),
            Self::Cluster(id) => serializer.serialize_u64(*id as u64),
        }
    }
}

/// Summary counts for one clustering run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ClusteringStatistics {
    /// Number of clusters found.
    pub clusters: usize,
    /// Number of noise points.
    pub noise: usize,
    /// Size of the largest cluster (0 when there are none).
    pub largest_cluster: usize,
}

/// Feature index → label mapping produced by one clustering run.
///
/// Holds exactly one label per feature of the clustered collection. Cluster
/// ids are dense, starting at 0, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ClusterAssignment {
    labels: Vec<ClusterLabel>,
    cluster_count: usize,
}

impl ClusterAssignment {
    /// Wraps a label vector; the cluster count is derived from the highest id.
    #[must_use]
    pub fn from_labels(labels: Vec<ClusterLabel>) -> Self {
        let cluster_count = labels
            .iter()
            .filter_map(|l| l.cluster_id())
            .max()
            .map_or(0, |max| max + 1);
        Self {
            labels,
            cluster_count,
        }
    }

    /// Number of labelled features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true when no features were labelled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label of the feature at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<ClusterLabel> {
        self.labels.get(index).copied()
    }

    /// Labels in feature order.
    pub fn iter(&self) -> impl Iterator<Item = ClusterLabel> + '_ {
        self.labels.iter().copied()
    }

    /// All labels as a slice.
    #[must_use]
    pub fn labels(&self) -> &[ClusterLabel] {
        &self.labels
    }

    /// Number of distinct clusters.
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    /// Number of features labelled noise.
    #[must_use]
    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|l| l.is_noise()).count()
    }

    /// Feature indices belonging to `cluster_id`, ascending.
    #[must_use]
    pub fn members(&self, cluster_id: usize) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, l)| l.cluster_id() == Some(cluster_id))
            .map(|(i, _)| i)
            .collect()
    }

    /// Summary counts.
    #[must_use]
    pub fn statistics(&self) -> ClusteringStatistics {
        let mut sizes = vec![0usize; self.cluster_count];
        let mut noise = 0;
        for label in &self.labels {
            match label {
                ClusterLabel::Cluster(id) => sizes[*id] += 1,
                ClusterLabel::Noise => noise += 1,
            }
        }
        ClusteringStatistics {
            clusters: self.cluster_count,
            noise,
            largest_cluster: sizes.into_iter().max().unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_params() {
        let params = ClusterParams::default()
            .with_epsilon(2.0)
            .with_min_points(5);

        assert!((params.epsilon - 2.0).abs() < f64::EPSILON);
        assert_eq!(params.min_points, 5);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_cluster_params_rejects_bad_domain() {
        assert!(ClusterParams::new(0.0, 2).is_err());
        assert!(ClusterParams::new(-1.0, 2).is_err());
        assert!(ClusterParams::new(f64::NAN, 2).is_err());
        assert!(ClusterParams::new(f64::INFINITY, 2).is_err());
        assert!(ClusterParams::new(0.1, 0).is_err());
        assert!(ClusterParams::new(0.1, 1).is_ok());
    }

    #[test]
    fn test_assignment_operations() {
        use ClusterLabel::{Cluster, Noise};

        let assignment =
            ClusterAssignment::from_labels(vec![Cluster(0), Cluster(0), Noise, Cluster(1)]);
        assert_eq!(assignment.len(), 4);
        assert_eq!(assignment.cluster_count(), 2);
        assert_eq!(assignment.noise_count(), 1);
        assert_eq!(assignment.members(0), vec![0, 1]);
        assert_eq!(assignment.get(2), Some(Noise));
        assert_eq!(assignment.get(9), None);

        let stats = assignment.statistics();
        assert_eq!(stats.clusters, 2);
        assert_eq!(stats.noise, 1);
        assert_eq!(stats.largest_cluster, 2);
    }
}
