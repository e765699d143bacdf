//! Arrow IPC parser (file and stream framing).

use std::io::Cursor;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, SchemaRef};
use arrow::ipc::reader::{FileReader, StreamReader};
use arrow::record_batch::RecordBatch;
use geocluster_core::{Properties, PropertyValue, RawRecord};

use super::{resolve_coordinate_columns, FormatParser};
use crate::{Error, FormatKind, Result};

const FILE_MAGIC: &[u8] = b"ARROW1";

/// Parser for Arrow IPC payloads.
///
/// Both the file format (magic `ARROW1`) and the bare stream format are read.
/// Any decoding failure rejects the whole payload; no partial batches are
/// returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrowParser;

/// One decoded property column.
enum PropertyColumn {
    Bool(ArrayRef),
    Number(ArrayRef),
    Text(ArrayRef),
}

impl PropertyColumn {
    fn from_array(array: &ArrayRef) -> Option<Self> {
        let data_type = array.data_type();
        if *data_type == DataType::Boolean {
            return Some(Self::Bool(array.clone()));
        }
        if data_type.is_numeric() {
            return cast(array, &DataType::Float64).ok().map(Self::Number);
        }
        cast(array, &DataType::Utf8).ok().map(Self::Text)
    }

    fn value(&self, row: usize) -> PropertyValue {
        match self {
            Self::Bool(a) if a.is_valid(row) => PropertyValue::Bool(a.as_boolean().value(row)),
            Self::Number(a) if a.is_valid(row) => {
                let v = a.as_primitive::<Float64Type>().value(row);
                if v.is_finite() {
                    PropertyValue::Number(v)
                } else {
                    PropertyValue::String(v.to_string())
                }
            }
            Self::Text(a) if a.is_valid(row) => {
                PropertyValue::String(a.as_string::<i32>().value(row).to_string())
            }
            _ => PropertyValue::Null,
        }
    }
}

fn read_batches(buffer: &[u8]) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    if buffer.starts_with(FILE_MAGIC) {
        let reader = FileReader::try_new(Cursor::new(buffer), None).map_err(Error::decode)?;
        let schema = reader.schema();
        let batches = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::decode)?;
        Ok((schema, batches))
    } else {
        let reader = StreamReader::try_new(Cursor::new(buffer), None).map_err(Error::decode)?;
        let schema = reader.schema();
        let batches = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::decode)?;
        Ok((schema, batches))
    }
}

fn coordinate_column(batch: &RecordBatch, index: usize) -> Result<ArrayRef> {
    cast(batch.column(index), &DataType::Float64).map_err(Error::decode)
}

impl FormatParser for ArrowParser {
    fn kind(&self) -> FormatKind {
        FormatKind::Arrow
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["arrow"]
    }

    fn parse(&self, buffer: &[u8]) -> Result<Vec<RawRecord>> {
        let (schema, batches) = read_batches(buffer)?;

        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        let columns = resolve_coordinate_columns(&names)?;
        for index in [columns.lon, columns.lat] {
            let field = schema.field(index);
            if !field.data_type().is_numeric() {
                return Err(Error::decode(format!(
                    "column '{}' has non-numeric type {}",
                    field.name(),
                    field.data_type()
                )));
            }
        }

        let mut records = Vec::with_capacity(batches.iter().map(RecordBatch::num_rows).sum());
        for batch in &batches {
            let lon = coordinate_column(batch, columns.lon)?;
            let lat = coordinate_column(batch, columns.lat)?;
            let (lon, lat) = (lon.as_primitive::<Float64Type>(), lat.as_primitive::<Float64Type>());

            let properties: Vec<(&str, PropertyColumn)> = names
                .iter()
                .enumerate()
                .filter(|&(c, _)| c != columns.lon && c != columns.lat)
                .filter_map(|(c, &name)| match PropertyColumn::from_array(batch.column(c)) {
                    Some(column) => Some((name, column)),
                    None => {
                        log::debug!("arrow: skipping column '{name}' with unsupported type");
                        None
                    }
                })
                .collect();

            for row in 0..batch.num_rows() {
                let locator = format!("row {}", records.len());
                let props: Properties = properties
                    .iter()
                    .map(|(name, column)| ((*name).to_string(), column.value(row)))
                    .collect();
                records.push(if lon.is_null(row) || lat.is_null(row) {
                    RawRecord::invalid(locator, "null coordinate", props)
                } else {
                    RawRecord::parsed(locator, lon.value(row), lat.value(row), props)
                });
            }
        }

        log::debug!("arrow: {} row(s) in {} batch(es)", records.len(), batches.len());
        Ok(records)
    }
}
