//! Extension-based format routing.

use std::collections::HashMap;
use std::path::Path;

use geocluster_core::{normalize, Normalized};

use crate::formats::{ArrowParser, CsvParser, FormatParser, GeoJsonParser, KmlParser};
use crate::{Error, FormatKind, Result};

/// Maps filename extensions to parsers.
///
/// Dispatch looks only at the extension of the hint (ASCII case-insensitive).
/// The buffer content is never sniffed.
pub struct FormatRegistry {
    parsers: Vec<Box<dyn FormatParser>>,
    by_extension: HashMap<String, usize>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut extensions: Vec<&str> = self.by_extension.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        f.debug_struct("FormatRegistry")
            .field("extensions", &extensions)
            .finish()
    }
}

impl FormatRegistry {
    /// Registry with the built-in GeoJSON, CSV, Arrow and KML parsers.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(GeoJsonParser);
        registry.register(CsvParser::default());
        registry.register(ArrowParser);
        registry.register(KmlParser);
        registry
    }

    /// Registry with no parsers.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            parsers: Vec::new(),
            by_extension: HashMap::new(),
        }
    }

    /// Adds a parser. Its extensions replace any earlier mapping.
    pub fn register<P: FormatParser + 'static>(&mut self, parser: P) {
        let index = self.parsers.len();
        for ext in parser.extensions() {
            self.by_extension.insert(ext.to_ascii_lowercase(), index);
        }
        self.parsers.push(Box::new(parser));
    }

    /// Parser for a filename hint.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedFormat`] when the hint has no extension or
    /// the extension is not registered.
    pub fn parser_for(&self, filename_hint: &str) -> Result<&dyn FormatParser> {
        Path::new(filename_hint)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.by_extension.get(&ext.to_ascii_lowercase()))
            .map(|&index| self.parsers[index].as_ref())
            .ok_or_else(|| Error::UnsupportedFormat {
                hint: filename_hint.to_string(),
            })
    }

    /// Parses and normalizes `buffer` with the parser selected by `filename_hint`.
    ///
    /// # Errors
    /// Returns a structural error if the format is unsupported or the input
    /// cannot be decoded as a whole.
    pub fn route(&self, buffer: &[u8], filename_hint: &str) -> Result<(FormatKind, Normalized)> {
        let parser = self.parser_for(filename_hint)?;
        let kind = parser.kind();
        log::debug!("routing '{filename_hint}' to the {kind} parser ({} bytes)", buffer.len());

        let records = parser.parse(buffer)?;
        let normalized = normalize(records);
        log::debug!(
            "{kind}: {} feature(s), {} record(s) dropped",
            normalized.collection.len(),
            normalized.warnings.len()
        );
        Ok((kind, normalized))
    }
}

/// Routes `buffer` through the built-in parsers and the normalizer.
///
/// # Errors
/// See [`FormatRegistry::route`].
pub fn route(buffer: &[u8], filename_hint: &str) -> Result<Normalized> {
    FormatRegistry::new()
        .route(buffer, filename_hint)
        .map(|(_, normalized)| normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geocluster_core::RawRecord;

    #[test]
    fn test_dispatch_by_extension() {
        let registry = FormatRegistry::new();
        let cases = [
            ("points.json", FormatKind::GeoJson),
            ("points.GeoJSON", FormatKind::GeoJson),
            ("dir.v2/points.CSV", FormatKind::Csv),
            ("points.arrow", FormatKind::Arrow),
            ("trip.Kml", FormatKind::Kml),
        ];
        for (hint, kind) in cases {
            assert_eq!(registry.parser_for(hint).unwrap().kind(), kind, "{hint}");
        }
    }

    #[test]
    fn test_unsupported_hints() {
        let registry = FormatRegistry::new();
        for hint in ["points.txt", "points", "", ".csv", "archive.csv.gz"] {
            assert!(
                matches!(registry.parser_for(hint), Err(Error::UnsupportedFormat { .. })),
                "{hint}"
            );
        }
    }

    #[test]
    fn test_no_content_sniffing() {
        // Valid GeoJSON under a CSV name goes to the CSV parser.
        let err = route(br#"{"features":[]}"#, "data.csv").unwrap_err();
        assert!(matches!(err, Error::MissingRequiredColumn { .. }));
    }

    struct PipeParser;

    impl FormatParser for PipeParser {
        fn kind(&self) -> FormatKind {
            FormatKind::Csv
        }

        fn extensions(&self) -> &'static [&'static str] {
            &["psv"]
        }

        fn parse(&self, buffer: &[u8]) -> Result<Vec<RawRecord>> {
            CsvParser::default().with_delimiter(b'|').parse(buffer)
        }
    }

    #[test]
    fn test_register_custom_parser() {
        let mut registry = FormatRegistry::new();
        registry.register(PipeParser);

        let (kind, normalized) = registry.route(b"lon|lat\n1|2\nx|3\n", "a.PSV").unwrap();
        assert_eq!(kind, FormatKind::Csv);
        assert_eq!(normalized.collection.len(), 1);
        assert_eq!(normalized.warnings.len(), 1);
        assert_eq!(normalized.warnings[0].locator, "line 3");
    }
}
