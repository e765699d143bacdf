//! End-to-end behaviour of `ingest_and_cluster` across formats.

use geocluster_core::ClusterLabel::{Cluster, Noise};
use geocluster_core::{ClusterParams, PropertyValue};
use geocluster_io::{ingest_and_cluster, Error, FormatKind};

fn params(epsilon: f64, min_points: usize) -> Option<ClusterParams> {
    Some(ClusterParams::new(epsilon, min_points).unwrap())
}

#[test]
fn test_geojson_round_trip_passthrough() {
    let text = r#"{
      "type": "FeatureCollection",
      "features": [
        {"type": "Feature", "geometry": {"type": "Point", "coordinates": [10.75, 59.91]},
         "properties": {"name": "Oslo", "population": 709037, "capital": true, "note": null}},
        {"type": "Feature", "geometry": {"type": "Point", "coordinates": [-0.1276, 51.5072]},
         "properties": {"name": "London"}},
        {"type": "Feature", "geometry": {"type": "Point", "coordinates": [139.69, 35.69]},
         "properties": {}}
      ]
    }"#;

    let outcome = ingest_and_cluster(text.as_bytes(), "cities.geojson", None).unwrap();

    assert_eq!(outcome.format, FormatKind::GeoJson);
    assert!(outcome.warnings.is_empty());
    assert_eq!(
        outcome.collection.coordinates(),
        vec![[10.75, 59.91], [-0.1276, 51.5072], [139.69, 35.69]]
    );
    let oslo = outcome.collection.get(0).unwrap();
    assert_eq!(oslo.property("name"), Some(&PropertyValue::from("Oslo")));
    assert_eq!(oslo.property("population"), Some(&PropertyValue::Number(709_037.0)));
    assert_eq!(oslo.property("capital"), Some(&PropertyValue::Bool(true)));
    assert_eq!(oslo.property("note"), Some(&PropertyValue::Null));
    assert_eq!(outcome.collection.get(1).unwrap().properties().len(), 1);
    assert!(outcome.collection.get(2).unwrap().properties().is_empty());
}

#[test]
fn test_csv_column_resolution() {
    let outcome = ingest_and_cluster(b"lat,lon\n0,0\n0,0.01\n10,10\n", "points.csv", params(0.05, 2))
        .unwrap();

    assert_eq!(outcome.collection.len(), 3);
    assert_eq!(outcome.collection.get(1).unwrap().point().lon(), 0.01);
    assert_eq!(outcome.assignment.labels(), &[Cluster(0), Cluster(0), Noise]);
    assert_eq!(outcome.assignment.members(0), vec![0, 1]);
}

#[test]
fn test_all_noise() {
    let outcome = ingest_and_cluster(b"x,y\n0,0\n1,0\n0,1\n", "sparse.csv", params(0.05, 2)).unwrap();
    assert_eq!(outcome.assignment.labels(), &[Noise, Noise, Noise]);
    assert_eq!(outcome.assignment.cluster_count(), 0);
}

#[test]
fn test_chain_is_one_cluster() {
    let mut text = String::from("lon,lat\n");
    for i in 0..10 {
        text.push_str(&format!("{},0\n", f64::from(i) * 0.04));
    }

    let outcome = ingest_and_cluster(text.as_bytes(), "chain.csv", params(0.05, 2)).unwrap();

    // The ends are 0.36 apart, far beyond epsilon.
    assert_eq!(outcome.assignment.cluster_count(), 1);
    assert!(outcome.assignment.iter().all(|l| l == Cluster(0)));
}

#[test]
fn test_determinism() {
    let mut text = String::from("lon,lat\n");
    let mut state = 7u64;
    for _ in 0..300 {
        state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        let x = (state >> 40) as f64 / f64::from(1u32 << 24);
        state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        let y = (state >> 40) as f64 / f64::from(1u32 << 24);
        text.push_str(&format!("{x},{y}\n"));
    }

    let first = ingest_and_cluster(text.as_bytes(), "random.csv", params(0.03, 3)).unwrap();
    let second = ingest_and_cluster(text.as_bytes(), "random.csv", params(0.03, 3)).unwrap();
    assert_eq!(first.assignment, second.assignment);
    assert_eq!(first.collection, second.collection);
}

#[test]
fn test_kml_malformed_record_tolerance() {
    let kml = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark>
      <name>Good</name>
      <Point><coordinates>10.0,59.0</coordinates></Point>
    </Placemark>
    <Placemark>
      <name>No coordinates</name>
    </Placemark>
  </Document>
</kml>"#;

    let outcome = ingest_and_cluster(kml.as_bytes(), "places.kml", None).unwrap();

    assert_eq!(outcome.collection.len(), 1);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].locator.contains("No coordinates"));
    assert_eq!(outcome.assignment.labels(), &[Noise]);
}

#[test]
fn test_missing_required_column_is_fatal() {
    let err = ingest_and_cluster(b"foo,bar\n1,2\n", "table.csv", None).unwrap_err();
    assert!(matches!(err, Error::MissingRequiredColumn { .. }));
    assert!(err.is_structural());
}

#[test]
fn test_non_finite_coordinates_are_dropped() {
    let outcome = ingest_and_cluster(b"lon,lat\nNaN,1\ninf,2\n3,4\n", "t.csv", None).unwrap();
    assert_eq!(outcome.collection.len(), 1);
    assert_eq!(outcome.warnings.len(), 2);
    assert_eq!(outcome.warnings[0].locator, "line 2");
    assert_eq!(outcome.warnings[1].locator, "line 3");
}

#[test]
fn test_unsupported_extension() {
    let err = ingest_and_cluster(b"lon,lat\n1,2\n", "points.txt", None).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat { .. }));
}
