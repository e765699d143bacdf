//! KML parser.
//!
//! Placemarks are collected at any nesting depth (`Document`, `Folder`, ...).
//! Only the first `Point/coordinates` of a Placemark is read; other geometry
//! types are reported as unsupported.

use geocluster_core::{Properties, PropertyValue, RawRecord};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{decode_text, FormatParser};
use crate::{Error, FormatKind, Result};

/// Parser for KML documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct KmlParser;

/// State for the Placemark currently being read.
struct PlacemarkBuilder {
    /// Element stack depth at which the Placemark was opened.
    depth: usize,
    name: Option<String>,
    coordinates: Option<std::result::Result<(f64, f64), String>>,
    saw_other_geometry: bool,
    /// `name` attribute of the open `Data`/`SimpleData` element.
    data_name: Option<String>,
    properties: Properties,
}

impl PlacemarkBuilder {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            name: None,
            coordinates: None,
            saw_other_geometry: false,
            data_name: None,
            properties: Properties::new(),
        }
    }

    fn finish(self, ordinal: usize) -> RawRecord {
        let locator = match &self.name {
            Some(name) => format!("Placemark #{ordinal} ('{name}')"),
            None => format!("Placemark #{ordinal}"),
        };
        match self.coordinates {
            Some(Ok((lon, lat))) => RawRecord::parsed(locator, lon, lat, self.properties),
            Some(Err(reason)) => RawRecord::invalid(locator, reason, self.properties),
            None if self.saw_other_geometry => RawRecord::invalid(
                locator,
                "unsupported geometry (only Point is read)",
                self.properties,
            ),
            None => RawRecord::invalid(locator, "missing Point coordinates", self.properties),
        }
    }
}

/// Elements whose text content is collected.
const CAPTURED: [&str; 5] = ["coordinates", "name", "description", "value", "SimpleData"];

/// First whitespace-separated tuple, rejoining tokens split around a comma
/// (`10.5, 59.9`).
fn first_tuple(text: &str) -> Option<String> {
    let mut tokens = text.split_whitespace().peekable();
    let mut tuple = tokens.next()?.to_string();
    while let Some(next) = tokens.peek() {
        if !(tuple.ends_with(',') || next.starts_with(',')) {
            break;
        }
        tuple.push_str(next);
        tokens.next();
    }
    Some(tuple)
}

/// Parses the first `lon,lat[,alt]` tuple of a `coordinates` element.
fn parse_coordinates(text: &str) -> std::result::Result<(f64, f64), String> {
    let tuple = first_tuple(text).ok_or_else(|| "empty coordinates".to_string())?;
    let mut parts = tuple.split(',').map(str::trim);
    match (parts.next(), parts.next()) {
        (Some(lon), Some(lat)) => match (lon.parse::<f64>(), lat.parse::<f64>()) {
            (Ok(lon), Ok(lat)) => Ok((lon, lat)),
            _ => Err(format!("coordinates '{tuple}' are not numbers")),
        },
        _ => Err(format!("coordinates '{tuple}' lack a latitude")),
    }
}

fn name_attribute(element: &BytesStart<'_>) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| Error::malformed(FormatKind::Kml, None, e.to_string()))?;
        if attr.key.local_name().as_ref() == b"name" {
            let value = attr.unescape_value().map_err(|e| {
                Error::malformed(FormatKind::Kml, None, e.to_string())
            })?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

impl FormatParser for KmlParser {
    fn kind(&self) -> FormatKind {
        FormatKind::Kml
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["kml"]
    }

    fn parse(&self, buffer: &[u8]) -> Result<Vec<RawRecord>> {
        let text = decode_text(buffer, FormatKind::Kml)?;
        // Whitespace is significant inside mixed content; captured text is
        // trimmed once its element closes.
        let mut reader = Reader::from_str(text);
        reader.trim_text(false);

        let malformed = |reader: &Reader<&[u8]>, message: String| {
            Error::malformed(
                FormatKind::Kml,
                Some(format!("byte {}", reader.buffer_position())),
                message,
            )
        };

        let mut stack: Vec<String> = Vec::new();
        let mut text_buf = String::new();
        // Stack depth of the element whose text is being collected.
        let mut capture: Option<usize> = None;
        let mut current: Option<PlacemarkBuilder> = None;
        let mut records = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if capture.is_none() && CAPTURED.contains(&local.as_str()) {
                        text_buf.clear();
                        capture = Some(stack.len());
                    }
                    match (local.as_str(), current.as_mut()) {
                        ("Placemark", None) => current = Some(PlacemarkBuilder::new(stack.len())),
                        ("Data" | "SimpleData", Some(pm)) => pm.data_name = name_attribute(e)?,
                        _ => {}
                    }
                    stack.push(local);
                }
                Ok(Event::Empty(ref e)) => {
                    // `<Placemark/>` has no geometry at all.
                    if current.is_none() && e.local_name().as_ref() == b"Placemark" {
                        records.push(PlacemarkBuilder::new(stack.len()).finish(records.len() + 1));
                    }
                }
                Ok(Event::Text(ref e)) => {
                    let unescaped = e.unescape().map_err(|err| malformed(&reader, err.to_string()))?;
                    if capture.is_some() {
                        text_buf.push_str(&unescaped);
                    }
                }
                Ok(Event::CData(ref e)) => {
                    if capture.is_some() {
                        text_buf.push_str(&String::from_utf8_lossy(e));
                    }
                }
                Ok(Event::End(_)) => {
                    let Some(local) = stack.pop() else {
                        return Err(malformed(&reader, "unexpected closing tag".to_string()));
                    };
                    let closes_capture = capture == Some(stack.len());
                    let content = if closes_capture {
                        capture = None;
                        std::mem::take(&mut text_buf).trim().to_string()
                    } else {
                        String::new()
                    };
                    let Some(pm) = current.as_mut() else {
                        continue;
                    };
                    let inner = stack.get(pm.depth + 1..).unwrap_or_default();
                    let parent = stack.last().map(String::as_str);

                    match local.as_str() {
                        "Placemark" if stack.len() == pm.depth => {
                            if let Some(pm) = current.take() {
                                records.push(pm.finish(records.len() + 1));
                            }
                        }
                        _ if !closes_capture && CAPTURED.contains(&local.as_str()) => {}
                        "coordinates" if inner.iter().any(|s| s == "Point") => {
                            if pm.coordinates.is_none() {
                                pm.coordinates = Some(parse_coordinates(&content));
                            }
                        }
                        "coordinates" => pm.saw_other_geometry = true,
                        "name" if parent == Some("Placemark") => {
                            pm.name = Some(content.clone());
                            pm.properties.insert("name".to_string(), PropertyValue::String(content));
                        }
                        "description" if parent == Some("Placemark") => {
                            pm.properties
                                .insert("description".to_string(), PropertyValue::String(content));
                        }
                        "value" if parent == Some("Data") => {
                            if let Some(key) = pm.data_name.clone() {
                                pm.properties.insert(key, PropertyValue::infer(&content));
                            }
                        }
                        "SimpleData" => {
                            if let Some(key) = pm.data_name.take() {
                                pm.properties.insert(key, PropertyValue::infer(&content));
                            }
                        }
                        "Data" => pm.data_name = None,
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(malformed(&reader, e.to_string())),
                Ok(_) => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(malformed(&reader, format!("unclosed element <{open}>")));
        }

        log::debug!("kml: {} placemark(s)", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geocluster_core::RawCoordinates;

    fn parse(text: &str) -> Result<Vec<RawRecord>> {
        KmlParser.parse(text.as_bytes())
    }

    #[test]
    fn test_nested_folders_and_extended_data() {
        let records = parse(
            r##"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>Trip</name>
    <Folder>
      <Folder>
        <Placemark>
          <name>Depot &amp; yard</name>
          <description><![CDATA[<b>main</b> site]]></description>
          <ExtendedData>
            <Data name="capacity"><value>42</value></Data>
            <SchemaData schemaUrl="#s"><SimpleData name="open">TRUE</SimpleData></SchemaData>
          </ExtendedData>
          <Point><coordinates>10.75,59.91,12.0</coordinates></Point>
        </Placemark>
      </Folder>
    </Folder>
    <Placemark><Point><coordinates>
      5.32,60.39
    </coordinates></Point></Placemark>
  </Document>
</kml>"##,
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.locator, "Placemark #1 ('Depot & yard')");
        assert_eq!(first.coordinates, RawCoordinates::Parsed { lon: 10.75, lat: 59.91 });
        assert_eq!(first.properties["name"], PropertyValue::from("Depot & yard"));
        assert_eq!(first.properties["description"], PropertyValue::from("<b>main</b> site"));
        assert_eq!(first.properties["capacity"], PropertyValue::Number(42.0));
        assert_eq!(first.properties["open"], PropertyValue::Bool(true));

        assert_eq!(records[1].locator, "Placemark #2");
        assert_eq!(records[1].coordinates, RawCoordinates::Parsed { lon: 5.32, lat: 60.39 });
    }

    #[test]
    fn test_placemarks_without_point() {
        let records = parse(
            "<kml><Placemark><name>a</name></Placemark>\
             <Placemark><LineString><coordinates>0,0 1,1</coordinates></LineString></Placemark>\
             <Placemark><Point><coordinates>abc,1</coordinates></Point></Placemark>\
             <Placemark/></kml>",
        )
        .unwrap();

        assert_eq!(records.len(), 4);
        for record in &records {
            assert!(matches!(record.coordinates, RawCoordinates::Invalid(_)));
        }
        assert_eq!(
            records[1].coordinates,
            RawCoordinates::Invalid("unsupported geometry (only Point is read)".to_string())
        );
        assert_eq!(records[3].locator, "Placemark #4");
    }

    #[test]
    fn test_document_name_is_not_a_property() {
        let records = parse(
            "<kml><Document><name>doc</name><Placemark><Point><coordinates>1,2</coordinates>\
             </Point></Placemark></Document></kml>",
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].properties.is_empty());
    }

    #[test]
    fn test_syntax_errors_are_fatal() {
        let err = parse("<kml><Placemark></Folder></kml>").unwrap_err();
        assert!(matches!(err, Error::MalformedInput { format: FormatKind::Kml, .. }));

        let err = parse("<kml><Placemark>").unwrap_err();
        assert!(matches!(err, Error::MalformedInput { format: FormatKind::Kml, .. }));
    }

    #[test]
    fn test_parse_coordinates() {
        assert_eq!(parse_coordinates("1.5,2.5,100"), Ok((1.5, 2.5)));
        assert_eq!(parse_coordinates("\n  1,2\n  3,4"), Ok((1.0, 2.0)));
        assert_eq!(parse_coordinates("10.5, 59.9"), Ok((10.5, 59.9)));
        assert_eq!(parse_coordinates("10.5 ,59.9 , 3  11,60"), Ok((10.5, 59.9)));
        assert!(parse_coordinates("").is_err());
        assert!(parse_coordinates("7").is_err());
    }

    #[test]
    fn test_description_with_inline_markup_keeps_all_text() {
        let records = parse(
            r#"<kml><Placemark>
                 <name>Museum</name>
                 <description>Visit <a href="https://example.org">the <b>site</b></a> today</description>
                 <Point><coordinates>10.5, 59.9</coordinates></Point>
               </Placemark></kml>"#,
        )
        .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].properties["description"],
            PropertyValue::from("Visit the site today")
        );
        assert_eq!(records[0].properties["name"], PropertyValue::from("Museum"));
        assert_eq!(records[0].coordinates, RawCoordinates::Parsed { lon: 10.5, lat: 59.9 });
    }
}
