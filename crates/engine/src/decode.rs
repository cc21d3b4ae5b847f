//! Decoding per-country boundary resources into raw rows.
//!
//! Two encodings are accepted, picked by file extension:
//! - GeoParquet (`.parquet`): string attribute columns plus a WKB `geometry`
//!   column, as written by the conversion pipeline.
//! - GeoJSON (`.geojson`, `.json`): a FeatureCollection whose properties are
//!   the raw GADM attributes.

use std::collections::BTreeMap;

use arrow_array::{
    Array, BinaryArray, BinaryViewArray, LargeBinaryArray, LargeStringArray, RecordBatch,
    StringArray, StringViewArray,
};
use geo::{Geometry, MultiPolygon};
use geojson::GeoJson;
use geozero::ToGeo;
use geozero::wkb::Wkb;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use query::GEOMETRY_COLUMN;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::row::{RawRow, to_multipolygon};

const PARQUET_MAGIC: &[u8] = b"PAR1";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResourceFormat {
    GeoParquet,
    GeoJson,
}

impl ResourceFormat {
    pub fn from_data_ref(data_ref: &str) -> Option<Self> {
        let ext = data_ref.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "parquet" | "geoparquet" => Some(Self::GeoParquet),
            "geojson" | "json" => Some(Self::GeoJson),
            _ => None,
        }
    }

    /// Extension first, then content sniffing.
    pub fn detect(data_ref: &str, bytes: &[u8]) -> Self {
        Self::from_data_ref(data_ref).unwrap_or(if bytes.starts_with(PARQUET_MAGIC) {
            Self::GeoParquet
        } else {
            Self::GeoJson
        })
    }
}

pub fn decode_rows(data_ref: &str, bytes: Vec<u8>) -> Result<Vec<RawRow>, EngineError> {
    let rows = match ResourceFormat::detect(data_ref, &bytes) {
        ResourceFormat::GeoParquet => decode_geoparquet(data_ref, bytes)?,
        ResourceFormat::GeoJson => decode_geojson(data_ref, &bytes)?,
    };
    debug!(data_ref, rows = rows.len(), "decoded boundary rows");
    Ok(rows)
}

/// Parses WKB and keeps its polygonal parts.
pub fn parse_areal_wkb(bytes: &[u8]) -> Result<MultiPolygon<f64>, String> {
    let geometry = Wkb(bytes.to_vec()).to_geo().map_err(|e| e.to_string())?;
    to_multipolygon(geometry).ok_or_else(|| "geometry has no polygonal part".to_string())
}

fn decode_geojson(data_ref: &str, bytes: &[u8]) -> Result<Vec<RawRow>, EngineError> {
    let text = std::str::from_utf8(bytes).map_err(|e| read_failed(data_ref, e))?;
    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| read_failed(data_ref, e))?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(EngineError::QueryFailed(format!(
            "{data_ref}: expected a FeatureCollection"
        )));
    };

    let mut rows = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.into_iter().enumerate() {
        let mut attributes = BTreeMap::new();
        for (key, value) in feature.properties.unwrap_or_default() {
            match value {
                serde_json::Value::Null => {}
                serde_json::Value::String(s) => {
                    attributes.insert(key, s);
                }
                other => {
                    attributes.insert(key, other.to_string());
                }
            }
        }

        let geometry = match feature.geometry {
            Some(g) => match Geometry::<f64>::try_from(g.value) {
                Ok(geometry) => {
                    let areal = to_multipolygon(geometry);
                    if areal.is_none() {
                        warn!(data_ref, index, "raw row has no polygonal geometry");
                    }
                    areal
                }
                Err(e) => {
                    warn!(data_ref, index, "raw row geometry rejected: {e}");
                    None
                }
            },
            None => None,
        };
        rows.push(RawRow::new(attributes, geometry));
    }
    Ok(rows)
}

fn decode_geoparquet(data_ref: &str, bytes: Vec<u8>) -> Result<Vec<RawRow>, EngineError> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes::Bytes::from(bytes))
        .map_err(|e| read_failed(data_ref, e))?
        .build()
        .map_err(|e| read_failed(data_ref, e))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| read_failed(data_ref, e))?;
        decode_batch(data_ref, &batch, &mut rows);
    }
    Ok(rows)
}

fn read_failed(data_ref: &str, e: impl std::fmt::Display) -> EngineError {
    EngineError::QueryFailed(format!("{data_ref}: {e}"))
}

fn decode_batch(data_ref: &str, batch: &RecordBatch, out: &mut Vec<RawRow>) {
    let schema = batch.schema();
    let geometry_idx = schema.index_of(GEOMETRY_COLUMN).ok();
    let attribute_columns: Vec<(&str, &dyn Array)> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(idx, _)| Some(*idx) != geometry_idx)
        .map(|(idx, field)| (field.name().as_str(), batch.column(idx).as_ref()))
        .collect();

    for row in 0..batch.num_rows() {
        let mut attributes = BTreeMap::new();
        for (name, column) in &attribute_columns {
            if let Some(value) = string_value(*column, row) {
                attributes.insert(name.to_string(), value);
            }
        }

        let geometry = geometry_idx
            .and_then(|idx| binary_value(batch.column(idx).as_ref(), row))
            .and_then(|wkb| match parse_areal_wkb(wkb) {
                Ok(mp) => Some(mp),
                Err(e) => {
                    warn!(data_ref, row = out.len(), "raw row geometry rejected: {e}");
                    None
                }
            });
        out.push(RawRow::new(attributes, geometry));
    }
}

fn string_value(array: &dyn Array, row: usize) -> Option<String> {
    if array.is_null(row) {
        return None;
    }
    let any = array.as_any();
    if let Some(a) = any.downcast_ref::<StringArray>() {
        return Some(a.value(row).to_string());
    }
    if let Some(a) = any.downcast_ref::<LargeStringArray>() {
        return Some(a.value(row).to_string());
    }
    if let Some(a) = any.downcast_ref::<StringViewArray>() {
        return Some(a.value(row).to_string());
    }
    None
}

fn binary_value(array: &dyn Array, row: usize) -> Option<&[u8]> {
    if array.is_null(row) {
        return None;
    }
    let any = array.as_any();
    if let Some(a) = any.downcast_ref::<BinaryArray>() {
        return Some(a.value(row));
    }
    if let Some(a) = any.downcast_ref::<LargeBinaryArray>() {
        return Some(a.value(row));
    }
    if let Some(a) = any.downcast_ref::<BinaryViewArray>() {
        return Some(a.value(row));
    }
    None
}
