//! Delimited text parser.

use csv::{ReaderBuilder, StringRecord};
use geocluster_core::{Properties, PropertyValue, RawRecord};

use super::{decode_text, resolve_coordinate_columns, FormatParser};
use crate::{Error, FormatKind, Result};

/// Parser for comma-separated text with a header row.
///
/// Column values are typed by shape through [`PropertyValue::infer`]. Rows may
/// be ragged; a missing cell becomes `Null`.
#[derive(Debug, Clone, Copy)]
pub struct CsvParser {
    delimiter: u8,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvParser {
    /// Use a different field delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

fn malformed(err: &csv::Error) -> Error {
    let location = err.position().map(|p| format!("line {}", p.line()));
    Error::malformed(FormatKind::Csv, location, err.to_string())
}

fn coordinate(record: &StringRecord, index: usize, name: &str) -> std::result::Result<f64, String> {
    let cell = record
        .get(index)
        .ok_or_else(|| format!("missing {name} value"))?;
    // Non-finite values parse here and are rejected by the normalizer.
    cell.trim()
        .parse::<f64>()
        .map_err(|_| format!("{name} '{cell}' is not a number"))
}

impl FormatParser for CsvParser {
    fn kind(&self) -> FormatKind {
        FormatKind::Csv
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["csv"]
    }

    fn parse(&self, buffer: &[u8]) -> Result<Vec<RawRecord>> {
        let text = decode_text(buffer, FormatKind::Csv)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(text.as_bytes());

        let headers = reader.headers().map_err(|e| malformed(&e))?.clone();
        let columns = resolve_coordinate_columns(&headers.iter().collect::<Vec<_>>())?;
        log::debug!(
            "csv: longitude column '{}', latitude column '{}'",
            &headers[columns.lon],
            &headers[columns.lat]
        );

        let mut records = Vec::new();
        for (i, row) in reader.records().enumerate() {
            let row = row.map_err(|e| malformed(&e))?;
            let line = row.position().map_or(i as u64 + 2, csv::Position::line);
            let locator = format!("line {line}");

            let properties: Properties = headers
                .iter()
                .enumerate()
                .filter(|&(c, _)| c != columns.lon && c != columns.lat)
                .map(|(c, name)| {
                    let value = row.get(c).map_or(PropertyValue::Null, PropertyValue::infer);
                    (name.to_string(), value)
                })
                .collect();

            let lon = coordinate(&row, columns.lon, "longitude");
            let lat = coordinate(&row, columns.lat, "latitude");
            records.push(match (lon, lat) {
                (Ok(lon), Ok(lat)) => RawRecord::parsed(locator, lon, lat, properties),
                (Err(reason), _) | (_, Err(reason)) => RawRecord::invalid(locator, reason, properties),
            });
        }

        log::debug!("csv: {} data row(s)", records.len());
        Ok(records)
    }
}
