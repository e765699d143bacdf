//! geocluster-core: Canonical types for geospatial point clustering.
//!
//! This crate provides the feature model every input format is normalized
//! into, the normalizer itself, and the parameter and result types shared by
//! the clustering engine and the ingestion pipeline.
//!

pub mod clustering;
pub mod error;
pub mod feature;
pub mod normalize;

pub use clustering::{ClusterAssignment, ClusterLabel, ClusterParams, ClusteringStatistics};
pub use error::{Error, Result};
pub use feature::{
    parse_finite, Bounds, Feature, FeatureCollection, GeometryType, Point, Properties,
    PropertyValue,
};
pub use normalize::{normalize, DecodeWarning, Normalized, RawCoordinates, RawRecord};
