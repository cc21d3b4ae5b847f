//! In-process execution of aggregation plans.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use geo::{BooleanOps, Geometry, MultiPolygon};
use geozero::{CoordDimensions, ToWkb};
use parking_lot::RwLock;
use query::{AggregationQuery, GroupKey};
use tracing::{debug, info};

use crate::decode::decode_rows;
use crate::engine::{QueryEngine, ResultRow};
use crate::error::EngineError;
use crate::row::RawRow;
use streaming::BoxFuture;

/// Geometric union of all parts.
///
/// Parts are merged pairwise in a balanced tree rather than folded into one
/// growing accumulator, which keeps each boolean op small.
pub fn dissolve<'a, I>(parts: I) -> MultiPolygon<f64>
where
    I: IntoIterator<Item = &'a MultiPolygon<f64>>,
{
    let mut layer: Vec<MultiPolygon<f64>> = parts.into_iter().cloned().collect();
    if layer.is_empty() {
        return MultiPolygon::new(Vec::new());
    }
    while layer.len() > 1 {
        layer = layer
            .chunks(2)
            .map(|pair| match pair {
                [a, b] => a.union(b),
                [a] => a.clone(),
                _ => MultiPolygon::new(Vec::new()),
            })
            .collect();
    }
    layer.pop().unwrap_or_else(|| MultiPolygon::new(Vec::new()))
}

/// Groups `rows` by the plan's key and dissolves each group.
///
/// Ordering contract:
/// - Results are ordered by [`GroupKey`].
pub fn execute_plan(query: &AggregationQuery, rows: &[RawRow]) -> Result<Vec<ResultRow>, EngineError> {
    let mut groups: BTreeMap<GroupKey, Vec<&MultiPolygon<f64>>> = BTreeMap::new();
    for row in rows {
        let Some(key) = query.key_for(|column| row.get(column)) else {
            continue;
        };
        let parts = groups.entry(key).or_default();
        if let Some(geometry) = row.geometry.as_ref() {
            parts.push(geometry);
        }
    }

    groups
        .into_iter()
        .map(|(key, parts)| {
            let geometry = if parts.is_empty() {
                None
            } else {
                let merged = dissolve(parts);
                let wkb = Geometry::MultiPolygon(merged)
                    .to_wkb(CoordDimensions::xy())
                    .map_err(|e| EngineError::QueryFailed(format!("encode {}: {e}", key.name)))?;
                Some(wkb)
            };
            Ok(ResultRow { key, geometry })
        })
        .collect()
}

/// In-process [`QueryEngine`] that evaluates aggregation plans with `geo`.
///
/// Registered resources are decoded once into raw rows and kept for the
/// session, the way an embedded engine keeps a loaded table.
#[derive(Debug, Default)]
pub struct DissolveEngine {
    ready: AtomicBool,
    tables: RwLock<BTreeMap<String, Arc<Vec<RawRow>>>>,
    // Queries run one at a time.
    query_gate: tokio::sync::Mutex<()>,
}

impl DissolveEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueryEngine for DissolveEngine {
    fn name(&self) -> &str {
        "dissolve"
    }

    fn init(&self) -> BoxFuture<'_, Result<(), EngineError>> {
        Box::pin(async move {
            self.ready.store(true, Ordering::SeqCst);
            info!("in-process dissolve engine ready");
            Ok(())
        })
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn is_registered(&self, data_ref: &str) -> bool {
        self.tables.read().contains_key(data_ref)
    }

    fn register(&self, data_ref: &str, bytes: Vec<u8>) -> BoxFuture<'_, Result<usize, EngineError>> {
        let data_ref = data_ref.to_string();
        Box::pin(async move {
            let rows = decode_rows(&data_ref, bytes)?;
            let count = rows.len();
            self.tables.write().insert(data_ref.clone(), Arc::new(rows));
            info!(%data_ref, rows = count, "registered boundary table");
            Ok(count)
        })
    }

    fn execute<'a>(
        &'a self,
        query: &'a AggregationQuery,
    ) -> BoxFuture<'a, Result<Vec<ResultRow>, EngineError>> {
        Box::pin(async move {
            if !self.is_ready() {
                return Err(EngineError::NotReady {
                    waited: std::time::Duration::ZERO,
                });
            }
            let _gate = self.query_gate.lock().await;
            let rows = self
                .tables
                .read()
                .get(query.data_ref())
                .cloned()
                .ok_or_else(|| {
                    EngineError::QueryFailed(format!("no table registered for {}", query.data_ref()))
                })?;
            let out = execute_plan(query, &rows)?;
            debug!(
                data_ref = query.data_ref(),
                level = query.level().get(),
                input = rows.len(),
                groups = out.len(),
                "executed aggregation"
            );
            Ok(out)
        })
    }

    fn unregister(&self, data_ref: &str) -> bool {
        let removed = self.tables.write().remove(data_ref).is_some();
        if removed {
            info!(%data_ref, "unregistered boundary table");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::{DissolveEngine, dissolve, execute_plan};
    use crate::decode::{decode_rows, parse_areal_wkb};
    use crate::engine::QueryEngine;
    use crate::error::EngineError;
    use crate::testing as fixtures;
    use foundation::AdminLevel;
    use geo::{Area, BoundingRect, MultiPolygon, Rect, coord};
    use query::AggregationQuery;

    fn unit(x: f64, y: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![
            Rect::new(coord! { x: x, y: y }, coord! { x: x + 1.0, y: y + 1.0 }).to_polygon(),
        ])
    }

    #[test]
    fn dissolve_merges_adjacent_parts() {
        let parts = [unit(0.0, 0.0), unit(1.0, 0.0), unit(2.0, 0.0)];
        let merged = dissolve(parts.iter());
        assert!((merged.unsigned_area() - 3.0).abs() < 1e-9);
        let bbox = merged.bounding_rect().unwrap();
        assert_eq!(bbox.min(), coord! { x: 0.0, y: 0.0 });
        assert_eq!(bbox.max(), coord! { x: 3.0, y: 1.0 });
    }

    #[test]
    fn dissolve_of_nothing_is_empty() {
        assert!(dissolve(std::iter::empty()).0.is_empty());
    }

    #[test]
    fn shared_gid_dissolves_into_one_region() {
        let rows = decode_rows("w.geojson", fixtures::wakanda_geojson().into_bytes()).unwrap();
        let q = AggregationQuery::new(AdminLevel::new(2).unwrap(), "w.geojson", None);
        let out = execute_plan(&q, &rows).unwrap();

        let names: Vec<&str> = out.iter().map(|r| r.key.name.as_str()).collect();
        assert_eq!(names, vec!["Birnin Zana", "Golden City", "Jabari Lands"]);

        let birnin = &out[0];
        assert_eq!(birnin.key.gid.as_deref(), Some("X.1.1_1"));
        assert_eq!(birnin.key.parent.as_deref(), Some("North"));
        let merged = parse_areal_wkb(birnin.geometry.as_ref().unwrap()).unwrap();
        assert!((merged.unsigned_area() - 2.0).abs() < 1e-9);
        let bbox = merged.bounding_rect().unwrap();
        assert_eq!(bbox.max(), coord! { x: 2.0, y: 1.0 });

        // The point-only row forms a group without geometry.
        assert!(out[1].geometry.is_none());
    }

    #[tokio::test]
    async fn execute_requires_init_and_registration() {
        let engine = DissolveEngine::new();
        let q = AggregationQuery::new(AdminLevel::new(1).unwrap(), "w.geojson", None);
        assert!(matches!(
            engine.execute(&q).await,
            Err(EngineError::NotReady { .. })
        ));

        engine.init().await.unwrap();
        assert!(matches!(
            engine.execute(&q).await,
            Err(EngineError::QueryFailed(_))
        ));

        let n = engine
            .register("w.geojson", fixtures::wakanda_geojson().into_bytes())
            .await
            .unwrap();
        assert_eq!(n, 6);
        assert!(engine.is_registered("w.geojson"));
        let out = engine.execute(&q).await.unwrap();
        assert_eq!(out.len(), 2);

        assert!(engine.unregister("w.geojson"));
        assert!(!engine.unregister("w.geojson"));
        assert!(matches!(
            engine.execute(&q).await,
            Err(EngineError::QueryFailed(_))
        ));
    }
}
