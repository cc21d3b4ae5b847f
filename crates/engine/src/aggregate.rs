//! On-demand boundary aggregation: resource → engine → regions.

use std::collections::VecDeque;
use std::sync::Arc;

use catalog::Country;
use foundation::AdminLevel;
use geo::MultiPolygon;
use query::{AggregationQuery, GroupKey};
use runtime::ReadinessPolicy;
use streaming::ResourceSource;
use tracing::{debug, info, warn};

use crate::decode::parse_areal_wkb;
use crate::engine::EngineHandle;
use crate::error::EngineError;

/// One dissolved administrative region.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub level: AdminLevel,
    pub key: GroupKey,
    pub geometry: MultiPolygon<f64>,
}

impl Region {
    pub fn name(&self) -> &str {
        &self.key.name
    }

    /// Parent region name; only levels deeper than 1 carry one.
    pub fn parent(&self) -> Option<&str> {
        self.level.parent()?;
        self.key.parent.as_deref()
    }

    pub fn properties(&self) -> geojson::JsonObject {
        let mut props = geojson::JsonObject::new();
        props.insert("name".to_string(), self.key.name.clone().into());
        if let Some(country) = self.key.country.as_deref() {
            props.insert("country".to_string(), country.into());
        }
        props.insert("level".to_string(), self.level.get().into());
        let optional = [
            ("type", self.key.region_type.as_deref()),
            ("eng_type", self.key.eng_type.as_deref()),
            ("gid", self.key.gid.as_deref()),
            ("parent", self.parent()),
        ];
        for (field, value) in optional {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                props.insert(field.to_string(), value.into());
            }
        }
        props
    }

    pub fn to_feature(&self) -> geojson::Feature {
        geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(&self.geometry))),
            id: None,
            properties: Some(self.properties()),
            foreign_members: None,
        }
    }
}

/// Regions of one level of one country, name-ordered.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCollection {
    pub level: AdminLevel,
    pub country: String,
    pub regions: Vec<Region>,
    /// Result rows dropped because their geometry was unusable.
    pub dropped_rows: usize,
}

impl RegionCollection {
    pub fn empty(level: AdminLevel, country: impl Into<String>) -> Self {
        Self {
            level,
            country: country.into(),
            regions: Vec::new(),
            dropped_rows: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn to_feature_collection(&self) -> geojson::FeatureCollection {
        geojson::FeatureCollection {
            bbox: None,
            features: self.regions.iter().map(Region::to_feature).collect(),
            foreign_members: None,
        }
    }

    pub fn to_geojson_string(&self) -> String {
        self.to_feature_collection().to_string()
    }
}

/// Computes dissolved boundaries for a country at one level.
///
/// The country's resource is fetched and registered with the engine on first
/// use. At most `max_resident` resources stay registered; the least recently
/// used one is unregistered when another is loaded. Results themselves are
/// never cached.
pub struct BoundaryAggregator {
    engine: Arc<EngineHandle>,
    source: Arc<dyn ResourceSource>,
    max_resident: usize,
    // Registered data refs, least recently used first. Held across a query so
    // its resource cannot be evicted mid-flight.
    resident: tokio::sync::Mutex<VecDeque<String>>,
}

/// Resources kept registered by default.
pub const DEFAULT_MAX_RESIDENT: usize = 4;

impl BoundaryAggregator {
    pub fn new(engine: Arc<EngineHandle>, source: Arc<dyn ResourceSource>) -> Self {
        Self {
            engine,
            source,
            max_resident: DEFAULT_MAX_RESIDENT,
            resident: tokio::sync::Mutex::new(VecDeque::new()),
        }
    }

    /// Bounds the registered resources; at least one is always kept.
    pub fn with_max_resident(mut self, max_resident: usize) -> Self {
        self.max_resident = max_resident.max(1);
        self
    }

    /// Data refs currently registered through this aggregator, least
    /// recently used first.
    pub async fn resident(&self) -> Vec<String> {
        self.resident.lock().await.iter().cloned().collect()
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Like [`aggregate`](Self::aggregate), but first waits (bounded by
    /// `policy`) for engine initialization to finish.
    pub async fn aggregate_when_ready(
        &self,
        level: AdminLevel,
        country: &Country,
        policy: ReadinessPolicy,
    ) -> Result<RegionCollection, EngineError> {
        self.engine.wait_ready(policy).await?;
        self.aggregate(level, country).await
    }

    pub async fn aggregate(
        &self,
        level: AdminLevel,
        country: &Country,
    ) -> Result<RegionCollection, EngineError> {
        self.engine.check_ready()?;
        let mut resident = self.resident.lock().await;
        self.ensure_loaded(&mut resident, &country.data_ref).await?;

        let query = AggregationQuery::new(level, country.data_ref.clone(), Some(country.name.clone()));
        debug!(sql = %query.to_sql(), "aggregation query");
        let rows = self.engine.engine().execute(&query).await?;
        drop(resident);

        let mut out = RegionCollection::empty(level, country.name.clone());
        for (index, row) in rows.into_iter().enumerate() {
            match parse_row_geometry(index, row.geometry.as_deref()) {
                Ok(geometry) => out.regions.push(Region {
                    level,
                    key: row.key,
                    geometry,
                }),
                Err(e) => {
                    warn!(country = %country.name, %level, region = %row.key.name, "dropping row: {e}");
                    out.dropped_rows += 1;
                }
            }
        }
        info!(
            country = %country.name,
            %level,
            regions = out.len(),
            dropped = out.dropped_rows,
            "aggregated boundaries"
        );
        Ok(out)
    }

    async fn ensure_loaded(&self, resident: &mut VecDeque<String>, data_ref: &str) -> Result<(), EngineError> {
        if let Some(pos) = resident.iter().position(|r| r == data_ref) {
            if let Some(hit) = resident.remove(pos) {
                resident.push_back(hit);
            }
            return Ok(());
        }
        if self.engine.engine().is_registered(data_ref) {
            self.admit(resident, data_ref);
            return Ok(());
        }
        let bytes = self
            .source
            .fetch(data_ref)
            .await
            .map_err(|e| EngineError::ResourceUnreachable {
                data_ref: data_ref.to_string(),
                reason: e.to_string(),
            })?;
        self.engine.engine().register(data_ref, bytes).await?;
        self.admit(resident, data_ref);
        Ok(())
    }

    fn admit(&self, resident: &mut VecDeque<String>, data_ref: &str) {
        resident.push_back(data_ref.to_string());
        while resident.len() > self.max_resident {
            let Some(evicted) = resident.pop_front() else {
                break;
            };
            if self.engine.engine().unregister(&evicted) {
                debug!(data_ref = %evicted, "evicted boundary resource");
            }
        }
    }
}

impl std::fmt::Debug for BoundaryAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundaryAggregator")
            .field("engine", &self.engine)
            .field("source", &self.source.describe())
            .field("max_resident", &self.max_resident)
            .finish()
    }
}

fn parse_row_geometry(index: usize, wkb: Option<&[u8]>) -> Result<MultiPolygon<f64>, EngineError> {
    let wkb = wkb.ok_or_else(|| EngineError::GeometryParse {
        index,
        reason: "null geometry".to_string(),
    })?;
    parse_areal_wkb(wkb).map_err(|reason| EngineError::GeometryParse { index, reason })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::BoundaryAggregator;
    use crate::dissolve::DissolveEngine;
    use crate::engine::{EngineHandle, QueryEngine, ResultRow};
    use crate::error::EngineError;
    use crate::testing as fixtures;
    use catalog::Catalog;
    use foundation::AdminLevel;
    use geo::Area;
    use pretty_assertions::assert_eq;
    use query::AggregationQuery;
    use runtime::ReadinessPolicy;
    use streaming::{BoxFuture, MemorySource, ResourceSource, SourceError};

    struct CountingSource {
        inner: MemorySource,
        fetches: AtomicUsize,
    }

    impl ResourceSource for CountingSource {
        fn describe(&self) -> String {
            "counting".to_string()
        }

        fn fetch(&self, key: &str) -> BoxFuture<'_, Result<Vec<u8>, SourceError>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(key)
        }
    }

    fn level(n: u8) -> AdminLevel {
        AdminLevel::new(n).unwrap()
    }

    async fn ready_aggregator(source: Arc<dyn ResourceSource>) -> BoundaryAggregator {
        let handle = Arc::new(EngineHandle::new(Arc::new(DissolveEngine::new())));
        handle.initialize().await.unwrap();
        BoundaryAggregator::new(handle, source)
    }

    struct BrokenEngine;

    impl QueryEngine for BrokenEngine {
        fn name(&self) -> &str {
            "broken"
        }

        fn init(&self) -> BoxFuture<'_, Result<(), EngineError>> {
            Box::pin(async { Err(EngineError::InitFailed("spatial extension missing".to_string())) })
        }

        fn is_ready(&self) -> bool {
            false
        }

        fn is_registered(&self, _data_ref: &str) -> bool {
            false
        }

        fn register(&self, _data_ref: &str, _bytes: Vec<u8>) -> BoxFuture<'_, Result<usize, EngineError>> {
            Box::pin(async { Ok(0) })
        }

        fn execute<'a>(
            &'a self,
            _query: &'a AggregationQuery,
        ) -> BoxFuture<'a, Result<Vec<ResultRow>, EngineError>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn unregister(&self, _data_ref: &str) -> bool {
            false
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_engine_init_is_not_reported_as_transient() {
        let handle = Arc::new(EngineHandle::new(Arc::new(BrokenEngine)));
        assert!(matches!(handle.initialize().await, Err(EngineError::InitFailed(_))));
        let agg = BoundaryAggregator::new(handle, Arc::new(fixtures::memory_source()));
        let catalog = fixtures::catalog();
        let wakanda = catalog.get("Wakanda").unwrap();

        let start = tokio::time::Instant::now();
        let err = agg
            .aggregate_when_ready(level(1), wakanda, ReadinessPolicy::default())
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::InitFailed("spatial extension missing".to_string()));
        assert!(!err.is_retryable());
        assert!(start.elapsed() < ReadinessPolicy::default().max_wait());

        let err = agg.aggregate(level(1), wakanda).await.unwrap_err();
        assert!(matches!(err, EngineError::InitFailed(_)));
    }

    #[tokio::test]
    async fn refuses_before_engine_init() {
        let handle = Arc::new(EngineHandle::new(Arc::new(DissolveEngine::new())));
        let agg = BoundaryAggregator::new(handle, Arc::new(fixtures::memory_source()));
        let catalog = fixtures::catalog();
        let err = agg
            .aggregate(level(1), catalog.get("Wakanda").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotReady { .. }));
    }

    #[tokio::test]
    async fn level_two_dissolves_and_drops_bad_geometry() {
        let agg = ready_aggregator(Arc::new(fixtures::memory_source())).await;
        let catalog = fixtures::catalog();
        let out = agg
            .aggregate(level(2), catalog.get("Wakanda").unwrap())
            .await
            .unwrap();

        let names: Vec<&str> = out.regions.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["Birnin Zana", "Jabari Lands"]);
        assert_eq!(out.dropped_rows, 1);

        let birnin = &out.regions[0];
        assert_eq!(birnin.key.gid.as_deref(), Some("X.1.1_1"));
        assert_eq!(birnin.parent(), Some("North"));
        assert!((birnin.geometry.unsigned_area() - 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn names_are_non_empty_and_keys_distinct_at_every_level() {
        let agg = ready_aggregator(Arc::new(fixtures::memory_source())).await;
        let catalog = fixtures::catalog();
        for country in catalog.countries() {
            for l in AdminLevel::all() {
                let out = agg.aggregate(l, country).await.unwrap();
                assert!(out.regions.iter().all(|r| !r.name().is_empty()));
                let keys: BTreeSet<_> = out.regions.iter().map(|r| r.key.clone()).collect();
                assert_eq!(keys.len(), out.len(), "{} {l}", country.name);
            }
        }
    }

    #[tokio::test]
    async fn no_matching_rows_is_an_empty_collection() {
        let agg = ready_aggregator(Arc::new(fixtures::memory_source())).await;
        let catalog = fixtures::catalog();
        let out = agg
            .aggregate(level(3), catalog.get("Atlantis").unwrap())
            .await
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(out.to_feature_collection().features.len(), 0);
    }

    #[tokio::test]
    async fn missing_resource_is_unreachable() {
        let agg = ready_aggregator(Arc::new(MemorySource::new())).await;
        let catalog = fixtures::catalog();
        let err = agg
            .aggregate(level(1), catalog.get("Wakanda").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ResourceUnreachable { ref data_ref, .. } if data_ref == "wakanda.geojson"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn resource_is_fetched_once_per_session() {
        let source = Arc::new(CountingSource {
            inner: fixtures::memory_source(),
            fetches: AtomicUsize::new(0),
        });
        let agg = ready_aggregator(source.clone()).await;
        let catalog = fixtures::catalog();
        let wakanda = catalog.get("Wakanda").unwrap();
        agg.aggregate(level(1), wakanda).await.unwrap();
        agg.aggregate(level(2), wakanda).await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resident_resources_stay_bounded() {
        let source = Arc::new(CountingSource {
            inner: fixtures::memory_source(),
            fetches: AtomicUsize::new(0),
        });
        let engine = Arc::new(DissolveEngine::new());
        let handle = Arc::new(EngineHandle::new(engine.clone()));
        handle.initialize().await.unwrap();
        let agg = BoundaryAggregator::new(handle, source.clone()).with_max_resident(1);
        let catalog = fixtures::catalog();
        let wakanda = catalog.get("Wakanda").unwrap();
        let atlantis = catalog.get("Atlantis").unwrap();

        agg.aggregate(level(1), wakanda).await.unwrap();
        agg.aggregate(level(1), atlantis).await.unwrap();
        assert_eq!(agg.resident().await, vec!["atlantis.geojson".to_string()]);
        assert!(!engine.is_registered("wakanda.geojson"));
        assert!(engine.is_registered("atlantis.geojson"));

        // Evicted resources are fetched again on return.
        let out = agg.aggregate(level(2), wakanda).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
        assert_eq!(agg.resident().await, vec!["wakanda.geojson".to_string()]);
    }

    #[tokio::test]
    async fn geoparquet_resource_end_to_end() {
        let source = MemorySource::new().with("wakanda.parquet", fixtures::wakanda_parquet());
        let agg = ready_aggregator(Arc::new(source)).await;
        let catalog = Catalog::from_json(
            br#"{"countries": [{"name": "Wakanda", "filename": "wakanda.parquet",
                "bounds": [0, -1, 2, 1], "admin_levels": [1]}]}"#,
        )
        .unwrap();
        let out = agg
            .aggregate(level(1), catalog.get("Wakanda").unwrap())
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        let north = &out.regions[0];
        assert_eq!(north.name(), "North");
        assert!((north.geometry.unsigned_area() - 2.0).abs() < 1e-9);
        assert_eq!(north.parent(), None);

        let south = out.regions[1].properties();
        assert_eq!(south.get("name").and_then(|v| v.as_str()), Some("South"));
        assert!(!south.contains_key("type"));
        assert!(!south.contains_key("parent"));
        assert_eq!(south.get("level").and_then(|v| v.as_u64()), Some(1));
    }
}
