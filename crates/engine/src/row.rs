use std::collections::BTreeMap;

use geo::{Geometry, MultiPolygon};

/// One raw boundary row: string attributes plus its areal geometry.
///
/// Attributes absent from the map are `NULL`. Rows whose geometry could not
/// be decoded, or is not a polygon, carry `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub attributes: BTreeMap<String, String>,
    pub geometry: Option<MultiPolygon<f64>>,
}

impl RawRow {
    pub fn new(attributes: BTreeMap<String, String>, geometry: Option<MultiPolygon<f64>>) -> Self {
        Self {
            attributes,
            geometry,
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.attributes.get(column).map(String::as_str)
    }

    pub fn has_value(&self, column: &str) -> bool {
        self.get(column).is_some_and(|v| !v.is_empty())
    }
}

/// Keeps the polygonal parts of a geometry.
///
/// Returns `None` for geometries with no areal component.
pub fn to_multipolygon(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    let mut polygons = Vec::new();
    collect_polygons(geometry, &mut polygons);
    if polygons.is_empty() {
        None
    } else {
        Some(MultiPolygon::new(polygons))
    }
}

fn collect_polygons(geometry: Geometry<f64>, out: &mut Vec<geo::Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p),
        Geometry::MultiPolygon(mp) => out.extend(mp.0),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for g in gc.0 {
                collect_polygons(g, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::to_multipolygon;
    use geo::{Geometry, GeometryCollection, Point, Rect, coord};

    #[test]
    fn keeps_only_areal_parts() {
        let rect = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 });
        let gc = GeometryCollection(vec![
            Geometry::Point(Point::new(5.0, 5.0)),
            Geometry::Rect(rect),
        ]);
        let mp = to_multipolygon(Geometry::GeometryCollection(gc)).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert!(to_multipolygon(Geometry::Point(Point::new(0.0, 0.0))).is_none());
    }
}
