//! Distance metrics for neighborhood queries.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Mean Earth radius (IUGG), in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Distance between two `[lon, lat]` positions.
///
/// Any `Fn([f64; 2], [f64; 2]) -> f64` closure is a metric as well.
pub trait DistanceMetric: Send + Sync {
    /// Distance between `a` and `b`. Must be symmetric and non-negative.
    fn distance(&self, a: [f64; 2], b: [f64; 2]) -> f64;

    /// How the grid index may prune candidates for this metric.
    ///
    /// Metrics without a known per-axis bound keep the default and are
    /// answered by a linear scan.
    fn grid_embedding(&self) -> GridEmbedding {
        GridEmbedding::Unsupported
    }

    /// Short name for logging.
    fn name(&self) -> &'static str {
        "custom"
    }
}

/// Space in which a metric's epsilon-neighbors are at most one grid cell apart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GridEmbedding {
    /// No per-axis bound is known.
    Unsupported,
    /// `distance(a, b) >= max(|a.lon - b.lon|, |a.lat - b.lat|)`, so cells are
    /// `epsilon` wide in coordinate units.
    Planar,
    /// Great-circle distance on a sphere of radius `radius_m`. Points are
    /// placed on the unit sphere, where the chord bounds every axis difference.
    Spherical { radius_m: f64 },
}

/// Position of a `[lon, lat]` (degrees) on the unit sphere.
#[must_use]
pub fn unit_vector(p: [f64; 2]) -> [f64; 3] {
    let (lon, lat) = (p[0].to_radians(), p[1].to_radians());
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Unit-sphere chord subtending a great-circle arc of `distance` on a sphere
/// of radius `radius`.
#[must_use]
pub fn chord_length(distance: f64, radius: f64) -> f64 {
    let angle = (distance / radius).min(std::f64::consts::PI);
    2.0 * (angle / 2.0).sin()
}

impl<F> DistanceMetric for F
where
    F: Fn([f64; 2], [f64; 2]) -> f64 + Send + Sync,
{
    fn distance(&self, a: [f64; 2], b: [f64; 2]) -> f64 {
        self(a, b)
    }
}

/// Planar distance on raw coordinate differences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Euclidean;

impl DistanceMetric for Euclidean {
    #[inline]
    fn distance(&self, a: [f64; 2], b: [f64; 2]) -> f64 {
        (a[0] - b[0]).hypot(a[1] - b[1])
    }

    fn grid_embedding(&self) -> GridEmbedding {
        GridEmbedding::Planar
    }

    fn name(&self) -> &'static str {
        "euclidean"
    }
}

/// Great-circle distance in metres on a spherical Earth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Haversine {
    /// Sphere radius in metres.
    pub radius_m: f64,
}

impl Default for Haversine {
    fn default() -> Self {
        Self {
            radius_m: EARTH_RADIUS_M,
        }
    }
}

impl DistanceMetric for Haversine {
    fn distance(&self, a: [f64; 2], b: [f64; 2]) -> f64 {
        let (lat1, lat2) = (a[1].to_radians(), b[1].to_radians());
        let dlat = lat2 - lat1;
        let dlon = (b[0] - a[0]).to_radians();
        let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * self.radius_m * h.sqrt().min(1.0).asin()
    }

    fn grid_embedding(&self) -> GridEmbedding {
        GridEmbedding::Spherical {
            radius_m: self.radius_m,
        }
    }

    fn name(&self) -> &'static str {
        "haversine"
    }
}

/// Selectable built-in metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum MetricKind {
    /// [`Euclidean`]; epsilon in coordinate units.
    #[default]
    Euclidean,
    /// [`Haversine`]; epsilon in metres.
    Haversine,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Euclidean => write!(f, "euclidean"),
            MetricKind::Haversine => write!(f, "haversine"),
        }
    }
}
