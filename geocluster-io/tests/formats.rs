//! The same points encoded in every supported format cluster identically.

use std::sync::Arc;

use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use geocluster_io::{ingest_and_cluster, FormatKind, IngestOutcome, LabeledWriter, OutputFormat};

const POINTS: [(&str, f64, f64); 5] = [
    ("a", 10.00, 59.00),
    ("b", 10.02, 59.00),
    ("c", 10.04, 59.01),
    ("d", 20.00, 40.00),
    ("e", 20.01, 40.00),
];

fn as_csv() -> Vec<u8> {
    let mut text = String::from("name,longitude,latitude\n");
    for (name, lon, lat) in POINTS {
        text.push_str(&format!("{name},{lon},{lat}\n"));
    }
    text.into_bytes()
}

fn as_geojson() -> Vec<u8> {
    let features: Vec<serde_json::Value> = POINTS
        .iter()
        .map(|(name, lon, lat)| {
            serde_json::json!({
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [lon, lat]},
                "properties": {"name": name},
            })
        })
        .collect();
    serde_json::to_vec(&serde_json::json!({"type": "FeatureCollection", "features": features}))
        .unwrap()
}

fn as_kml() -> Vec<u8> {
    let mut text = String::from("<kml><Document><Folder>");
    for (name, lon, lat) in POINTS {
        text.push_str(&format!(
            "<Placemark><name>{name}</name><Point><coordinates>{lon},{lat},0</coordinates></Point></Placemark>"
        ));
    }
    text.push_str("</Folder></Document></kml>");
    text.into_bytes()
}

fn as_arrow() -> Vec<u8> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("name", DataType::Utf8, false),
        Field::new("x", DataType::Float64, false),
        Field::new("y", DataType::Float64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(POINTS.iter().map(|p| p.0).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(POINTS.iter().map(|p| p.1).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(POINTS.iter().map(|p| p.2).collect::<Vec<_>>())),
        ],
    )
    .unwrap();

    let mut buf = Vec::new();
    {
        let mut writer = FileWriter::try_new(&mut buf, &schema).unwrap();
        writer.write(&batch).unwrap();
        writer.finish().unwrap();
    }
    buf
}

fn check(outcome: &IngestOutcome, format: FormatKind) {
    assert_eq!(outcome.format, format);
    assert!(outcome.warnings.is_empty(), "{format}: {:?}", outcome.warnings);
    assert_eq!(outcome.collection.len(), POINTS.len(), "{format}");
    assert_eq!(outcome.assignment.members(0), vec![0, 1, 2], "{format}");
    assert_eq!(outcome.assignment.members(1), vec![3, 4], "{format}");
    for (feature, (name, lon, lat)) in outcome.collection.iter().zip(POINTS) {
        assert_eq!(feature.point().coords(), [lon, lat], "{format}");
        assert_eq!(
            feature.property("name").and_then(|v| v.as_str()),
            Some(name),
            "{format}"
        );
    }
}

#[test]
fn test_formats_agree() {
    let cases = [
        (as_csv(), "points.csv", FormatKind::Csv),
        (as_geojson(), "points.json", FormatKind::GeoJson),
        (as_kml(), "points.KML", FormatKind::Kml),
        (as_arrow(), "points.arrow", FormatKind::Arrow),
    ];
    for (bytes, hint, format) in cases {
        let outcome = ingest_and_cluster(&bytes, hint, None).unwrap();
        check(&outcome, format);
    }
}

#[test]
fn test_written_output_reingests_with_labels() {
    let outcome = ingest_and_cluster(&as_csv(), "points.csv", None).unwrap();

    for (format, hint) in [
        (OutputFormat::GeoJson, "out.geojson"),
        (OutputFormat::Csv, "out.csv"),
        (OutputFormat::Kml, "out.kml"),
    ] {
        let mut writer = LabeledWriter::new(Vec::new());
        writer
            .write(format, &outcome.collection, &outcome.assignment)
            .unwrap();
        let bytes = writer.into_inner();

        let again = ingest_and_cluster(&bytes, hint, None).unwrap();
        assert_eq!(again.collection.len(), POINTS.len(), "{hint}");
        assert_eq!(again.assignment.cluster_count(), 2, "{hint}");
    }
}
