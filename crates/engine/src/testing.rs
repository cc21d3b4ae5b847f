//! Shared test data: a small fictional country with two levels.

use serde_json::json;

pub const CATALOG_JSON: &str = r#"{"countries": [
    {"name": "Wakanda", "filename": "wakanda.geojson", "bounds": [0, -2, 2, 2], "admin_levels": [1, 2]},
    {"name": "Atlantis", "filename": "atlantis.geojson", "bounds": [0, 0, 1, 1], "admin_levels": [1]}
]}"#;

fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> serde_json::Value {
    json!({
        "type": "Polygon",
        "coordinates": [[[x0, y0], [x1, y0], [x1, y1], [x0, y1], [x0, y0]]]
    })
}

fn feature(props: serde_json::Value, geometry: serde_json::Value) -> serde_json::Value {
    json!({"type": "Feature", "properties": props, "geometry": geometry})
}

/// Six raw rows:
/// - two Birnin Zana pieces sharing `GID_2 = X.1.1_1` (adjacent unit squares)
/// - one Jabari Lands row
/// - a South row with an empty `NAME_2` and one with a null `NAME_2`
/// - a Golden City row whose geometry is a point
pub fn wakanda_geojson() -> String {
    let north = |name2: &str, gid2: &str| {
        json!({
            "NAME_0": "Wakanda", "GID_0": "WAK",
            "NAME_1": "North", "GID_1": "X.1_1", "TYPE_1": "Province", "ENGTYPE_1": "Province",
            "NAME_2": name2, "GID_2": gid2, "TYPE_2": "City", "ENGTYPE_2": "City"
        })
    };
    let south = |name2: serde_json::Value| {
        json!({
            "NAME_0": "Wakanda", "GID_0": "WAK",
            "NAME_1": "South", "GID_1": "X.2_1", "TYPE_1": "Province", "ENGTYPE_1": "Province",
            "NAME_2": name2, "GID_2": "X.2.1_1", "TYPE_2": "City", "ENGTYPE_2": "City"
        })
    };
    let features = vec![
        feature(north("Birnin Zana", "X.1.1_1"), square(0.0, 0.0, 1.0, 1.0)),
        feature(north("Birnin Zana", "X.1.1_1"), square(1.0, 0.0, 2.0, 1.0)),
        feature(north("Jabari Lands", "X.1.2_1"), square(0.0, 1.0, 2.0, 2.0)),
        feature(south(json!("")), square(0.0, -1.0, 2.0, 0.0)),
        feature(south(serde_json::Value::Null), square(0.0, -2.0, 2.0, -1.0)),
        feature(
            south(json!("Golden City")),
            json!({"type": "Point", "coordinates": [1.0, -1.5]}),
        ),
    ];
    json!({"type": "FeatureCollection", "features": features}).to_string()
}

pub fn atlantis_geojson() -> String {
    let props = json!({
        "NAME_0": "Atlantis", "GID_0": "ATL",
        "NAME_1": "Deep", "GID_1": "A.1_1", "TYPE_1": "Trench", "ENGTYPE_1": "Trench"
    });
    json!({
        "type": "FeatureCollection",
        "features": [feature(props, square(0.0, 0.0, 1.0, 1.0))]
    })
    .to_string()
}

#[cfg(test)]
fn wkb_square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<u8> {
    use geo::{Geometry, Rect, coord};
    use geozero::{CoordDimensions, ToWkb};

    let rect = Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 });
    Geometry::Polygon(rect.to_polygon())
        .to_wkb(CoordDimensions::xy())
        .unwrap()
}

/// Level-1 rows as GeoParquet: two North pieces and one South row with a
/// null `TYPE_1`.
#[cfg(test)]
pub fn wakanda_parquet() -> Vec<u8> {
    use std::sync::Arc;

    use arrow_array::{ArrayRef, BinaryArray, RecordBatch, StringArray};
    use arrow_schema::{DataType, Field, Schema};
    use parquet::arrow::ArrowWriter;

    let schema = Arc::new(Schema::new(vec![
        Field::new("NAME_0", DataType::Utf8, true),
        Field::new("NAME_1", DataType::Utf8, true),
        Field::new("GID_1", DataType::Utf8, true),
        Field::new("TYPE_1", DataType::Utf8, true),
        Field::new("ENGTYPE_1", DataType::Utf8, true),
        Field::new("geometry", DataType::Binary, true),
    ]));
    let geometries = [
        wkb_square(0.0, 0.0, 1.0, 1.0),
        wkb_square(1.0, 0.0, 2.0, 1.0),
        wkb_square(0.0, -1.0, 2.0, 0.0),
    ];
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(vec![Some("Wakanda"); 3])),
        Arc::new(StringArray::from(vec![Some("North"), Some("North"), Some("South")])),
        Arc::new(StringArray::from(vec![Some("X.1_1"), Some("X.1_1"), Some("X.2_1")])),
        Arc::new(StringArray::from(vec![Some("Province"), Some("Province"), None])),
        Arc::new(StringArray::from(vec![Some("Province"), Some("Province"), None])),
        Arc::new(BinaryArray::from(
            geometries
                .iter()
                .map(|g| Some(g.as_slice()))
                .collect::<Vec<_>>(),
        )),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    buf
}

pub fn catalog() -> catalog::Catalog {
    catalog::Catalog::from_json(CATALOG_JSON.as_bytes()).expect("fixture catalog parses")
}

/// Catalog plus both countries' raw rows, keyed the way the catalog names them.
pub fn memory_source() -> streaming::MemorySource {
    streaming::MemorySource::new()
        .with("countries.json", CATALOG_JSON.as_bytes().to_vec())
        .with("wakanda.geojson", wakanda_geojson().into_bytes())
        .with("atlantis.geojson", atlantis_geojson().into_bytes())
}
