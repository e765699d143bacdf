//! Error types for geocluster-core.

use thiserror::Error;

/// Result type alias for geocluster-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Clustering parameters outside their valid domain.
    #[error("invalid clustering parameters: {0}")]
    InvalidParams(String),

    /// A coordinate pair containing NaN or an infinity.
    #[error("non-finite coordinate: ({lon}, {lat})")]
    NonFiniteCoordinate { lon: f64, lat: f64 },
}
