//! Canonical point-feature model.
//!
//! Every input format is reduced to a [`FeatureCollection`]: an ordered list of
//! [`Feature`]s, each a single finite `(longitude, latitude)` point plus a flat
//! map of scalar properties. Order is ingestion order and is what cluster
//! assignments are indexed by.

use std::collections::BTreeMap;
use std::fmt;

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-feature metadata, keyed by property name.
pub type Properties = BTreeMap<String, PropertyValue>;

/// A scalar property value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(untagged))]
pub enum PropertyValue {
    /// Explicitly empty.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Finite number.
    Number(f64),
    /// Anything else.
    String(String),
}

impl PropertyValue {
    /// Infers a typed value from raw cell text.
    ///
    /// Attempts, in order: empty → `Null`, finite number → `Number`,
    /// `true`/`false` (ASCII case-insensitive) → `Bool`, otherwise `String`.
    /// The text is trimmed before the number and boolean attempts only; a
    /// string value keeps its original spacing.
    #[must_use]
    pub fn infer(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Self::Null;
        }
        if let Some(number) = parse_finite(trimmed) {
            return Self::Number(number);
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        Self::String(text.to_string())
    }

    /// Returns the numeric value, if this is a number.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string value, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true for `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Parses a number, rejecting NaN and infinities.
///
/// `str::parse::<f64>` accepts `"inf"` and `"NaN"`; those are not numbers as
/// far as property typing and coordinates are concerned.
#[must_use]
pub fn parse_finite(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Geometry kinds a feature may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GeometryType {
    /// A single position.
    Point,
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Point => f.write_str("Point"),
        }
    }
}

/// A finite `(longitude, latitude)` position.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Point {
    lon: f64,
    lat: f64,
}

impl Point {
    /// Creates a point, rejecting non-finite components.
    ///
    /// # Errors
    /// Returns [`Error::NonFiniteCoordinate`] if either component is NaN or infinite.
    pub fn new(lon: f64, lat: f64) -> Result<Self> {
        if lon.is_finite() && lat.is_finite() {
            Ok(Self { lon, lat })
        } else {
            Err(Error::NonFiniteCoordinate { lon, lat })
        }
    }

    /// Longitude (x).
    #[inline]
    #[must_use]
    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Latitude (y).
    #[inline]
    #[must_use]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Returns `[lon, lat]`.
    #[inline]
    #[must_use]
    pub fn coords(&self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}

/// One geographic point of interest.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Feature {
    point: Point,
    properties: Properties,
}

impl Feature {
    /// Creates a feature from a validated point.
    #[must_use]
    pub fn new(point: Point, properties: Properties) -> Self {
        Self { point, properties }
    }

    /// Geometry kind; always [`GeometryType::Point`].
    #[must_use]
    pub fn geometry_type(&self) -> GeometryType {
        GeometryType::Point
    }

    /// The feature's position.
    #[must_use]
    pub fn point(&self) -> Point {
        self.point
    }

    /// The feature's metadata.
    #[must_use]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Looks up a single property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }
}

/// Axis-aligned bounds of a collection, in coordinate units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

/// Ordered, immutable sequence of features.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct FeatureCollection {
    features: Vec<Feature>,
}

impl FeatureCollection {
    /// Creates a collection from already-validated features.
    #[must_use]
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    /// Builds a property-less collection from raw positions.
    ///
    /// # Errors
    /// Returns [`Error::NonFiniteCoordinate`] for the first non-finite position.
    pub fn from_points<I>(points: I) -> Result<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        points
            .into_iter()
            .map(|(lon, lat)| Point::new(lon, lat).map(|p| Feature::new(p, Properties::new())))
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    /// Returns the number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true if the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Returns the feature at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Feature> {
        self.features.get(index)
    }

    /// Returns an iterator over the features in ingestion order.
    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Returns all features as a slice.
    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Returns the positions as `[lon, lat]` pairs, in order.
    #[must_use]
    pub fn coordinates(&self) -> Vec<[f64; 2]> {
        self.features.iter().map(|f| f.point().coords()).collect()
    }

    /// Returns the bounding box, or `None` for an empty collection.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        let first = self.features.first()?.point();
        let init = Bounds {
            min_lon: first.lon(),
            min_lat: first.lat(),
            max_lon: first.lon(),
            max_lat: first.lat(),
        };
        Some(self.features.iter().fold(init, |b, f| {
            let p = f.point();
            Bounds {
                min_lon: b.min_lon.min(p.lon()),
                min_lat: b.min_lat.min(p.lat()),
                max_lon: b.max_lon.max(p.lon()),
                max_lat: b.max_lat.max(p.lat()),
            }
        }))
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_infer_order() {
        assert_eq!(PropertyValue::infer(""), PropertyValue::Null);
        assert_eq!(PropertyValue::infer("  "), PropertyValue::Null);
        assert_eq!(PropertyValue::infer("42"), PropertyValue::Number(42.0));
        assert_eq!(PropertyValue::infer("-1.5e3"), PropertyValue::Number(-1500.0));
        assert_eq!(PropertyValue::infer("TRUE"), PropertyValue::Bool(true));
        assert_eq!(PropertyValue::infer("false"), PropertyValue::Bool(false));
        assert_eq!(PropertyValue::infer("NaN"), PropertyValue::from("NaN"));
        assert_eq!(PropertyValue::infer("inf"), PropertyValue::from("inf"));
        assert_eq!(PropertyValue::infer("Oslo"), PropertyValue::from("Oslo"));
    }

    #[test]
    fn test_point_rejects_non_finite() {
        assert!(Point::new(f64::NAN, 0.0).is_err());
        assert!(Point::new(0.0, f64::INFINITY).is_err());
        let p = Point::new(10.5, -3.25).unwrap();
        assert_relative_eq!(p.lon(), 10.5);
        assert_relative_eq!(p.lat(), -3.25);
    }

    #[test]
    fn test_collection_bounds() {
        let fc = FeatureCollection::from_points([(1.0, 2.0), (-3.0, 5.0), (4.0, -1.0)]).unwrap();
        let b = fc.bounds().unwrap();
        assert_relative_eq!(b.min_lon, -3.0);
        assert_relative_eq!(b.max_lon, 4.0);
        assert_relative_eq!(b.min_lat, -1.0);
        assert_relative_eq!(b.max_lat, 5.0);
        assert!(FeatureCollection::default().bounds().is_none());
    }
}
