//! Writers for clustered feature collections.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use geocluster_core::{ClusterAssignment, ClusterLabel, Feature, FeatureCollection, PropertyValue};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::{json, Map, Value};

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Name of the label column/property added to every written feature.
pub const CLUSTER_KEY: &str = "cluster";

const CSV_FIXED_COLUMNS: [&str; 3] = ["longitude", "latitude", CLUSTER_KEY];
const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";

/// Output serialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum OutputFormat {
    /// GeoJSON `FeatureCollection` with a `cluster` property.
    #[default]
    GeoJson,
    /// `longitude,latitude,cluster,...` rows.
    Csv,
    /// KML document with one folder per cluster.
    Kml,
}

impl OutputFormat {
    /// Format implied by a path's extension.
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" | "geojson" => Some(Self::GeoJson),
            "csv" => Some(Self::Csv),
            "kml" => Some(Self::Kml),
            _ => None,
        }
    }
}

fn check_lengths(collection: &FeatureCollection, assignment: &ClusterAssignment) -> Result<()> {
    if collection.len() == assignment.len() {
        Ok(())
    } else {
        Err(Error::LabelMismatch {
            features: collection.len(),
            labels: assignment.len(),
        })
    }
}

fn json_value(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Null => Value::Null,
        PropertyValue::Bool(b) => Value::Bool(*b),
        PropertyValue::Number(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
        PropertyValue::String(s) => Value::String(s.clone()),
    }
}

fn label_value(label: ClusterLabel) -> Value {
    label.cluster_id().map_or(Value::Null, |id| json!(id))
}

/// Builds a GeoJSON `FeatureCollection` with a `cluster` property per feature.
///
/// A source property named `cluster` is overwritten.
///
/// # Errors
/// Returns [`Error::LabelMismatch`] if the lengths differ.
pub fn to_geojson(collection: &FeatureCollection, assignment: &ClusterAssignment) -> Result<Value> {
    check_lengths(collection, assignment)?;
    let features: Vec<Value> = collection
        .iter()
        .zip(assignment.iter())
        .map(|(feature, label)| {
            let mut properties: Map<String, Value> = feature
                .properties()
                .iter()
                .map(|(k, v)| (k.clone(), json_value(v)))
                .collect();
            properties.insert(CLUSTER_KEY.to_string(), label_value(label));
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [feature.point().lon(), feature.point().lat()],
                },
                "properties": properties,
            })
        })
        .collect();
    Ok(json!({ "type": "FeatureCollection", "features": features }))
}

/// Writes a labelled collection in one of the [`OutputFormat`]s.
pub struct LabeledWriter<W: Write> {
    inner: W,
}

impl LabeledWriter<BufWriter<File>> {
    /// Creates (or truncates) a file for writing.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> LabeledWriter<W> {
    /// Wraps a writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Writes in the given format.
    ///
    /// # Errors
    /// Returns an error on length mismatch or write failure.
    pub fn write(
        &mut self,
        format: OutputFormat,
        collection: &FeatureCollection,
        assignment: &ClusterAssignment,
    ) -> Result<()> {
        match format {
            OutputFormat::GeoJson => self.write_geojson(collection, assignment),
            OutputFormat::Csv => self.write_csv(collection, assignment),
            OutputFormat::Kml => self.write_kml(collection, assignment),
        }
    }

    /// Writes GeoJSON.
    ///
    /// # Errors
    /// Returns an error on length mismatch or write failure.
    pub fn write_geojson(
        &mut self,
        collection: &FeatureCollection,
        assignment: &ClusterAssignment,
    ) -> Result<()> {
        let document = to_geojson(collection, assignment)?;
        serde_json::to_writer_pretty(&mut self.inner, &document)?;
        writeln!(self.inner)?;
        self.inner.flush()?;
        Ok(())
    }

    /// Writes CSV: `longitude,latitude,cluster` followed by every property key
    /// in sorted order. Null values and noise labels are empty cells.
    ///
    /// # Errors
    /// Returns an error on length mismatch or write failure.
    pub fn write_csv(
        &mut self,
        collection: &FeatureCollection,
        assignment: &ClusterAssignment,
    ) -> Result<()> {
        check_lengths(collection, assignment)?;

        let mut keys: Vec<&str> = collection
            .iter()
            .flat_map(|f| f.properties().keys().map(String::as_str))
            .filter(|k| !CSV_FIXED_COLUMNS.contains(k))
            .collect();
        keys.sort_unstable();
        keys.dedup();

        let mut writer = csv::Writer::from_writer(&mut self.inner);
        writer.write_record(CSV_FIXED_COLUMNS.iter().copied().chain(keys.iter().copied()))?;

        for (feature, label) in collection.iter().zip(assignment.iter()) {
            let mut row = vec![
                feature.point().lon().to_string(),
                feature.point().lat().to_string(),
                label.cluster_id().map(|id| id.to_string()).unwrap_or_default(),
            ];
            row.extend(
                keys.iter()
                    .map(|k| feature.property(k).map(ToString::to_string).unwrap_or_default()),
            );
            writer.write_record(&row)?;
        }
        writer.flush()?;
        drop(writer);
        self.inner.flush()?;
        Ok(())
    }

    /// Writes KML with a `Folder` per cluster, in id order, then a `Noise`
    /// folder if any feature is noise.
    ///
    /// # Errors
    /// Returns an error on length mismatch or write failure.
    pub fn write_kml(
        &mut self,
        collection: &FeatureCollection,
        assignment: &ClusterAssignment,
    ) -> Result<()> {
        check_lengths(collection, assignment)?;

        let mut folders: Vec<(String, Vec<usize>)> = (0..assignment.cluster_count())
            .map(|id| (format!("Cluster {id}"), assignment.members(id)))
            .collect();
        let noise: Vec<usize> = assignment
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_noise())
            .map(|(i, _)| i)
            .collect();
        if !noise.is_empty() {
            folders.push(("Noise".to_string(), noise));
        }

        let mut writer = Writer::new_with_indent(&mut self.inner, b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(
            BytesStart::new("kml").with_attributes([("xmlns", KML_NAMESPACE)]),
        ))?;
        writer.write_event(Event::Start(BytesStart::new("Document")))?;

        for (name, members) in &folders {
            writer.write_event(Event::Start(BytesStart::new("Folder")))?;
            write_text_element(&mut writer, "name", name)?;
            for &index in members {
                if let Some(feature) = collection.get(index) {
                    write_placemark(&mut writer, feature)?;
                }
            }
            writer.write_event(Event::End(BytesEnd::new("Folder")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("Document")))?;
        writer.write_event(Event::End(BytesEnd::new("kml")))?;
        drop(writer);
        writeln!(self.inner)?;
        self.inner.flush()?;
        Ok(())
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, value: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_placemark<W: Write>(writer: &mut Writer<W>, feature: &Feature) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("Placemark")))?;
    for key in ["name", "description"] {
        if let Some(value) = feature.property(key).filter(|v| !v.is_null()) {
            write_text_element(writer, key, &value.to_string())?;
        }
    }

    let extended: Vec<(&String, &PropertyValue)> = feature
        .properties()
        .iter()
        .filter(|(k, _)| k.as_str() != "name" && k.as_str() != "description")
        .collect();
    if !extended.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("ExtendedData")))?;
        for (key, value) in extended {
            writer.write_event(Event::Start(
                BytesStart::new("Data").with_attributes([("name", key.as_str())]),
            ))?;
            write_text_element(writer, "value", &value.to_string())?;
            writer.write_event(Event::End(BytesEnd::new("Data")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("ExtendedData")))?;
    }

    let point = feature.point();
    writer.write_event(Event::Start(BytesStart::new("Point")))?;
    write_text_element(writer, "coordinates", &format!("{},{}", point.lon(), point.lat()))?;
    writer.write_event(Event::End(BytesEnd::new("Point")))?;
    writer.write_event(Event::End(BytesEnd::new("Placemark")))?;
    Ok(())
}
