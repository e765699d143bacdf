//! Conversion of parser output into the canonical feature model.
//!
//! Parsers never build [`Feature`]s themselves. They emit [`RawRecord`]s in
//! source order and [`normalize`] decides which records survive, so the
//! finiteness check and the drop-with-warning policy live in one place.

use std::fmt;

use crate::feature::{Feature, FeatureCollection, Point, Properties};

/// Coordinates as recovered by a parser, before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCoordinates {
    /// Both components decoded to numbers (possibly non-finite).
    Parsed { lon: f64, lat: f64 },
    /// The parser could not recover two numbers; the reason is kept for the warning.
    Invalid(String),
}

/// One record emitted by a format parser.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// Human-readable position in the source, e.g. `features[3]` or `row 7`.
    pub locator: String,
    /// Recovered coordinates.
    pub coordinates: RawCoordinates,
    /// Metadata to carry onto the feature.
    pub properties: Properties,
}

impl RawRecord {
    /// Record with parsed coordinates.
    pub fn parsed(locator: impl Into<String>, lon: f64, lat: f64, properties: Properties) -> Self {
        Self {
            locator: locator.into(),
            coordinates: RawCoordinates::Parsed { lon, lat },
            properties,
        }
    }

    /// Record whose coordinates could not be recovered.
    pub fn invalid(
        locator: impl Into<String>,
        reason: impl Into<String>,
        properties: Properties,
    ) -> Self {
        Self {
            locator: locator.into(),
            coordinates: RawCoordinates::Invalid(reason.into()),
            properties,
        }
    }
}

/// Non-fatal notice that a record was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DecodeWarning {
    /// Where the record came from.
    pub locator: String,
    /// Why it was dropped.
    pub reason: String,
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.locator, self.reason)
    }
}

/// Normalizer output: the surviving features plus one warning per dropped record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub collection: FeatureCollection,
    pub warnings: Vec<DecodeWarning>,
}

/// Converts parser records into a [`FeatureCollection`].
///
/// Output order equals input order minus dropped records. A record is dropped
/// when its coordinates are [`RawCoordinates::Invalid`] or not finite; it is
/// never coerced to a default position.
pub fn normalize<I>(records: I) -> Normalized
where
    I: IntoIterator<Item = RawRecord>,
{
    let records = records.into_iter();
    let mut features = Vec::with_capacity(records.size_hint().0);
    let mut warnings = Vec::new();

    for record in records {
        let point = match record.coordinates {
            RawCoordinates::Parsed { lon, lat } => {
                Point::new(lon, lat).map_err(|e| e.to_string())
            }
            RawCoordinates::Invalid(reason) => Err(reason),
        };
        match point {
            Ok(point) => features.push(Feature::new(point, record.properties)),
            Err(reason) => warnings.push(DecodeWarning {
                locator: record.locator,
                reason,
            }),
        }
    }

    if !warnings.is_empty() {
        log::warn!(
            "dropped {} record(s) with unusable coordinates",
            warnings.len()
        );
    }
    log::debug!("normalized {} feature(s)", features.len());

    Normalized {
        collection: FeatureCollection::new(features),
        warnings,
    }
}
