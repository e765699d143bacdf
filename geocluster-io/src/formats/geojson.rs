//! GeoJSON passthrough parser.

use geocluster_core::{Properties, PropertyValue, RawRecord};
use serde_json::{Map, Value};

use super::{decode_text, FormatParser};
use crate::{Error, FormatKind, Result};

/// Parser for GeoJSON `FeatureCollection` documents with Point features.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoJsonParser;

impl FormatParser for GeoJsonParser {
    fn kind(&self) -> FormatKind {
        FormatKind::GeoJson
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json", "geojson"]
    }

    fn parse(&self, buffer: &[u8]) -> Result<Vec<RawRecord>> {
        let text = decode_text(buffer, FormatKind::GeoJson)?;
        let root: Value = serde_json::from_str(text).map_err(|e| {
            Error::malformed(
                FormatKind::GeoJson,
                Some(format!("line {}, column {}", e.line(), e.column())),
                e.to_string(),
            )
        })?;

        let Some(object) = root.as_object() else {
            return Err(Error::malformed(
                FormatKind::GeoJson,
                Some("$".to_string()),
                "expected a JSON object at the top level",
            ));
        };
        let features = match object.get("features") {
            Some(Value::Array(features)) => features,
            Some(_) => {
                return Err(Error::malformed(
                    FormatKind::GeoJson,
                    Some("$.features".to_string()),
                    "`features` is not an array",
                ))
            }
            None => {
                return Err(Error::malformed(
                    FormatKind::GeoJson,
                    Some("$.features".to_string()),
                    "missing `features` array",
                ))
            }
        };

        let records = features
            .iter()
            .enumerate()
            .map(|(i, feature)| {
                let locator = format!("features[{i}]");
                let properties = feature
                    .get("properties")
                    .and_then(Value::as_object)
                    .map(convert_properties)
                    .unwrap_or_default();
                match point_coordinates(feature) {
                    Ok((lon, lat)) => RawRecord::parsed(locator, lon, lat, properties),
                    Err(reason) => RawRecord::invalid(locator, reason, properties),
                }
            })
            .collect::<Vec<_>>();

        log::debug!("geojson: {} feature record(s)", records.len());
        Ok(records)
    }
}

/// Extracts `[lon, lat]` from a feature's Point geometry.
fn point_coordinates(feature: &Value) -> std::result::Result<(f64, f64), String> {
    let geometry = match feature.get("geometry") {
        None => return Err("missing geometry".to_string()),
        Some(Value::Null) => return Err("geometry is null".to_string()),
        Some(geometry) => geometry,
    };
    if let Some(kind) = geometry.get("type").and_then(Value::as_str) {
        if kind != "Point" {
            return Err(format!("unsupported geometry type '{kind}'"));
        }
    }
    let coordinates = geometry
        .get("coordinates")
        .ok_or_else(|| "missing geometry.coordinates".to_string())?;

    match coordinates.as_array().map(Vec::as_slice) {
        Some([lon, lat]) => match (lon.as_f64(), lat.as_f64()) {
            (Some(lon), Some(lat)) => Ok((lon, lat)),
            _ => Err("coordinates are not numbers".to_string()),
        },
        _ => Err("coordinates must be exactly two numbers".to_string()),
    }
}

fn convert_properties(object: &Map<String, Value>) -> Properties {
    object
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Null => PropertyValue::Null,
                Value::Bool(b) => PropertyValue::Bool(*b),
                Value::Number(n) => n.as_f64().map_or(PropertyValue::Null, PropertyValue::Number),
                Value::String(s) => PropertyValue::String(s.clone()),
                // Nested values are flattened to their JSON text.
                nested @ (Value::Array(_) | Value::Object(_)) => {
                    PropertyValue::String(nested.to_string())
                }
            };
            (key.clone(), value)
        })
        .collect()
}
