//! Format parsers.
//!
//! Each parser turns a raw buffer into [`RawRecord`]s in source order. They
//! do not validate coordinates beyond decoding them; that is the normalizer's
//! job.

mod arrow_ipc;
mod geojson;
mod kml;
mod tabular;

pub use arrow_ipc::ArrowParser;
pub use geojson::GeoJsonParser;
pub use kml::KmlParser;
pub use tabular::CsvParser;

use geocluster_core::RawRecord;

use crate::{Error, FormatKind, Result};

/// Accepted longitude column names, in resolution priority.
pub const LONGITUDE_ALIASES: [&str; 3] = ["lon", "longitude", "x"];
/// Accepted latitude column names, in resolution priority.
pub const LATITUDE_ALIASES: [&str; 3] = ["lat", "latitude", "y"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Capability shared by every format: bytes in, raw records out.
pub trait FormatParser: Send + Sync {
    /// Format handled by this parser.
    fn kind(&self) -> FormatKind;

    /// Lower-case filename extensions (without the dot) routed to this parser.
    fn extensions(&self) -> &'static [&'static str];

    /// Decodes `buffer` into records.
    ///
    /// # Errors
    /// Returns a structural error if the input cannot be decoded as a whole.
    fn parse(&self, buffer: &[u8]) -> Result<Vec<RawRecord>>;
}

/// Indices of the coordinate columns within a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CoordinateColumns {
    pub lon: usize,
    pub lat: usize,
}

/// Resolves longitude/latitude columns by name (case-insensitive, trimmed).
///
/// Aliases are tried in priority order, so a header with both `lon` and `x`
/// resolves to `lon`.
pub(crate) fn resolve_coordinate_columns<S: AsRef<str>>(names: &[S]) -> Result<CoordinateColumns> {
    let find = |aliases: &[&str], column: &'static str| {
        aliases
            .iter()
            .find_map(|alias| {
                names
                    .iter()
                    .position(|name| name.as_ref().trim().eq_ignore_ascii_case(alias))
            })
            .ok_or_else(|| Error::MissingRequiredColumn {
                column,
                available: names.iter().map(|n| n.as_ref().to_string()).collect(),
            })
    };

    Ok(CoordinateColumns {
        lon: find(&LONGITUDE_ALIASES, "longitude")?,
        lat: find(&LATITUDE_ALIASES, "latitude")?,
    })
}

/// Decodes a text payload, skipping a leading byte-order mark.
pub(crate) fn decode_text(buffer: &[u8], format: FormatKind) -> Result<&str> {
    let (body, offset) = match buffer.strip_prefix(UTF8_BOM) {
        Some(rest) => (rest, UTF8_BOM.len()),
        None => (buffer, 0),
    };
    std::str::from_utf8(body).map_err(|e| {
        Error::malformed(
            format,
            Some(format!("byte {}", offset + e.valid_up_to())),
            "input is not valid UTF-8",
        )
    })
}
