use std::sync::Arc;

use catalog::{Catalog, Country};
use engine::{BoundaryAggregator, EngineError, RegionCollection};
use foundation::{AdminLevel, Generation};
use runtime::{NoticeBus, ReadinessPolicy};
use tracing::{debug, error, info};

use crate::display::BoundaryDisplay;
use crate::error::SessionError;
use crate::event::UiEvent;
use crate::selection::Selection;
use crate::viewport::{Viewport, ViewportDefaults};

/// An aggregation started under a particular selection generation.
///
/// Resolving it borrows only the aggregator, so the session stays free to
/// accept newer selections while it runs.
#[derive(Debug, Clone)]
pub struct LevelRequest {
    pub generation: Generation,
    pub level: AdminLevel,
    pub country: Country,
}

impl LevelRequest {
    pub async fn resolve(self, aggregator: &BoundaryAggregator, policy: ReadinessPolicy) -> LevelOutcome {
        let result = aggregator
            .aggregate_when_ready(self.level, &self.country, policy)
            .await;
        LevelOutcome {
            generation: self.generation,
            level: self.level,
            result,
        }
    }
}

#[derive(Debug)]
pub struct LevelOutcome {
    pub generation: Generation,
    pub level: AdminLevel,
    pub result: Result<RegionCollection, EngineError>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The result was displayed; carries its region count.
    Applied(usize),
    /// A newer selection superseded the request; nothing changed.
    Discarded,
}

/// On-demand strategy: exactly one level's aggregated boundaries are shown.
pub struct OnDemandSession<D, V> {
    catalog: Arc<Catalog>,
    aggregator: Arc<BoundaryAggregator>,
    policy: ReadinessPolicy,
    defaults: ViewportDefaults,
    display: D,
    viewport: V,
    selection: Selection,
    notices: NoticeBus,
}

impl<D: BoundaryDisplay, V: Viewport> OnDemandSession<D, V> {
    pub fn new(catalog: Arc<Catalog>, aggregator: Arc<BoundaryAggregator>, display: D, viewport: V) -> Self {
        Self {
            catalog,
            aggregator,
            policy: ReadinessPolicy::default(),
            defaults: ViewportDefaults::default(),
            display,
            viewport,
            selection: Selection::default(),
            notices: NoticeBus::new(),
        }
    }

    pub fn with_policy(mut self, policy: ReadinessPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_defaults(mut self, defaults: ViewportDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn viewport(&self) -> &V {
        &self.viewport
    }

    pub fn aggregator(&self) -> &Arc<BoundaryAggregator> {
        &self.aggregator
    }

    pub fn notices_mut(&mut self) -> &mut NoticeBus {
        &mut self.notices
    }

    pub async fn handle(&mut self, event: UiEvent) -> Result<(), SessionError> {
        match event {
            UiEvent::CountryChanged(Some(name)) => self.select_country(&name).await,
            UiEvent::CountryChanged(None) | UiEvent::Reset => {
                self.clear_selection();
                Ok(())
            }
            UiEvent::LevelSelected(level) | UiEvent::LevelToggled(level) => {
                self.select_level(level).await.map(|_| ())
            }
        }
    }

    /// Selects a country, fits the view and loads its first level.
    pub async fn select_country(&mut self, name: &str) -> Result<(), SessionError> {
        match self.enter_country(name)?.first_level() {
            Some(level) => self.select_level(level.get()).await.map(|_| ()),
            None => Ok(()),
        }
    }

    /// Selects a country and loads `level` directly, skipping its first level.
    pub async fn select_country_level(&mut self, name: &str, level: u8) -> Result<Completion, SessionError> {
        self.enter_country(name)?;
        self.select_level(level).await
    }

    fn enter_country(&mut self, name: &str) -> Result<Country, SessionError> {
        let Some(country) = self.catalog.get(name).cloned() else {
            return Err(self.fail(SessionError::UnknownCountry(name.to_string())));
        };
        self.display.clear();
        self.viewport.fit_bounds(country.bounds.corners());
        let generation = self.selection.select_country(country.clone());
        info!(country = name, %generation, "country selected");
        Ok(country)
    }

    pub fn clear_selection(&mut self) {
        let generation = self.selection.clear();
        self.display.clear();
        self.viewport.jump_to(self.defaults.center, self.defaults.zoom);
        info!(%generation, "selection cleared");
    }

    pub async fn select_level(&mut self, level: u8) -> Result<Completion, SessionError> {
        let request = self.begin_level(level)?;
        let aggregator = Arc::clone(&self.aggregator);
        let outcome = request.resolve(&aggregator, self.policy).await;
        self.complete(outcome)
    }

    /// Starts a level change. Any request begun earlier becomes stale.
    pub fn begin_level(&mut self, level: u8) -> Result<LevelRequest, SessionError> {
        let level = self.selection.require_level(level).map_err(|e| self.fail(e))?;
        let Some(country) = self.selection.country().cloned() else {
            return Err(self.fail(SessionError::NoCountrySelected));
        };
        let generation = self.selection.set_level(level);
        debug!(country = %country.name, %level, %generation, "level requested");
        Ok(LevelRequest {
            generation,
            level,
            country,
        })
    }

    /// Applies a resolved request if it is still current.
    pub fn complete(&mut self, outcome: LevelOutcome) -> Result<Completion, SessionError> {
        if !outcome.generation.is_current(self.selection.generation()) {
            debug!(
                level = %outcome.level,
                stale = %outcome.generation,
                current = %self.selection.generation(),
                "discarding superseded result"
            );
            return Ok(Completion::Discarded);
        }
        match outcome.result {
            Ok(regions) => {
                let count = regions.len();
                if regions.dropped_rows > 0 {
                    self.notices.info(
                        outcome.generation,
                        format!("{} regions skipped: unreadable geometry", regions.dropped_rows),
                    );
                }
                self.display.show(regions);
                Ok(Completion::Applied(count))
            }
            Err(e) => Err(self.fail(SessionError::Engine(e))),
        }
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        error!(%err, "selection transition failed");
        if err.is_fatal() {
            self.notices.fatal(self.selection.generation(), err.to_string());
        } else {
            self.notices.error(self.selection.generation(), err.to_string());
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{Completion, OnDemandSession};
    use crate::display::RecordedDisplay;
    use crate::error::SessionError;
    use crate::event::UiEvent;
    use crate::viewport::{RecordedViewport, ViewState, ViewportDefaults};
    use engine::testing as fixtures;
    use engine::{BoundaryAggregator, DissolveEngine, EngineError, EngineHandle, QueryEngine, ResultRow};
    use pretty_assertions::assert_eq;
    use query::AggregationQuery;
    use runtime::ReadinessPolicy;
    use streaming::{BoxFuture, MemorySource};

    async fn session(source: MemorySource) -> OnDemandSession<RecordedDisplay, RecordedViewport> {
        let handle = Arc::new(EngineHandle::new(Arc::new(DissolveEngine::new())));
        handle.initialize().await.unwrap();
        let aggregator = Arc::new(BoundaryAggregator::new(handle, Arc::new(source)));
        OnDemandSession::new(
            Arc::new(fixtures::catalog()),
            aggregator,
            RecordedDisplay::default(),
            RecordedViewport::default(),
        )
    }

    fn shown_names(s: &OnDemandSession<RecordedDisplay, RecordedViewport>) -> Vec<String> {
        s.display()
            .current
            .as_ref()
            .map(|c| c.regions.iter().map(|r| r.name().to_string()).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn selecting_country_loads_first_level() {
        let mut s = session(fixtures::memory_source()).await;
        s.select_country("Wakanda").await.unwrap();
        assert_eq!(s.viewport().state, ViewState::Fitted([[0.0, -2.0], [2.0, 2.0]]));
        assert_eq!(s.selection().level().map(|l| l.get()), Some(1));
        assert_eq!(shown_names(&s), vec!["North", "South"]);
    }

    #[tokio::test]
    async fn select_level_replaces_displayed_level() {
        let mut s = session(fixtures::memory_source()).await;
        s.select_country("Wakanda").await.unwrap();
        let done = s.select_level(2).await.unwrap();
        assert_eq!(done, Completion::Applied(2));
        assert_eq!(shown_names(&s), vec!["Birnin Zana", "Jabari Lands"]);
        assert_eq!(s.display().shows, 2);
    }

    #[tokio::test]
    async fn country_level_selection_loads_only_that_level() {
        let mut s = session(fixtures::memory_source()).await;
        let done = s.select_country_level("Wakanda", 2).await.unwrap();
        assert_eq!(done, Completion::Applied(2));
        assert_eq!(s.display().shows, 1);
        assert_eq!(shown_names(&s), vec!["Birnin Zana", "Jabari Lands"]);
        assert_eq!(s.viewport().state, ViewState::Fitted([[0.0, -2.0], [2.0, 2.0]]));

        assert!(matches!(
            s.select_country_level("Wakanda", 0).await,
            Err(SessionError::LevelUnavailable { level: 0, .. })
        ));
    }

    #[tokio::test]
    async fn superseded_request_is_discarded() {
        let mut s = session(fixtures::memory_source()).await;
        s.select_country("Wakanda").await.unwrap();

        let first = s.begin_level(1).unwrap();
        let second = s.begin_level(2).unwrap();
        let aggregator = Arc::clone(s.aggregator());
        let policy = ReadinessPolicy::default();
        let first = first.resolve(&aggregator, policy).await;
        let second = second.resolve(&aggregator, policy).await;

        assert_eq!(s.complete(second).unwrap(), Completion::Applied(2));
        assert_eq!(s.complete(first).unwrap(), Completion::Discarded);
        assert_eq!(s.display().current.as_ref().map(|c| c.level.get()), Some(2));
        assert_eq!(shown_names(&s), vec!["Birnin Zana", "Jabari Lands"]);
    }

    #[tokio::test]
    async fn clearing_discards_in_flight_request() {
        let mut s = session(fixtures::memory_source()).await;
        s.select_country("Wakanda").await.unwrap();
        let request = s.begin_level(2).unwrap();
        s.handle(UiEvent::Reset).await.unwrap();

        let aggregator = Arc::clone(s.aggregator());
        let outcome = request.resolve(&aggregator, ReadinessPolicy::default()).await;
        assert_eq!(s.complete(outcome).unwrap(), Completion::Discarded);
        assert!(s.display().current.is_none());
        let d = ViewportDefaults::default();
        assert_eq!(s.viewport().state, ViewState::At { center: d.center, zoom: d.zoom });
    }

    #[tokio::test]
    async fn idle_session_rejects_level_selection() {
        let mut s = session(fixtures::memory_source()).await;
        assert_eq!(s.select_level(1).await, Err(SessionError::NoCountrySelected));
        s.select_country("Atlantis").await.unwrap();
        assert!(matches!(
            s.handle(UiEvent::LevelSelected(2)).await,
            Err(SessionError::LevelUnavailable { level: 2, .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_resource_surfaces_and_keeps_session_usable() {
        let source = MemorySource::new()
            .with("atlantis.geojson", fixtures::atlantis_geojson().into_bytes());
        let mut s = session(source).await;
        let err = s.select_country("Wakanda").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Engine(EngineError::ResourceUnreachable { .. })
        ));
        assert!(s.notices_mut().has_errors());
        assert_eq!(s.selection().country().map(|c| c.name.as_str()), Some("Wakanda"));

        s.select_country("Atlantis").await.unwrap();
        assert_eq!(shown_names(&s), vec!["Deep"]);
    }

    #[tokio::test(start_paused = true)]
    async fn uninitialized_engine_times_out_as_not_ready() {
        let handle = Arc::new(EngineHandle::new(Arc::new(DissolveEngine::new())));
        let aggregator = Arc::new(BoundaryAggregator::new(
            handle,
            Arc::new(fixtures::memory_source()),
        ));
        let mut s = OnDemandSession::new(
            Arc::new(fixtures::catalog()),
            aggregator,
            RecordedDisplay::default(),
            RecordedViewport::default(),
        )
        .with_policy(ReadinessPolicy {
            interval: Duration::from_millis(100),
            max_attempts: 3,
        });
        let err = s.select_country("Wakanda").await.unwrap_err();
        assert!(matches!(err, SessionError::Engine(EngineError::NotReady { .. })));
        assert!(err.to_string().contains("not ready"));
        assert!(s.display().current.is_none());
        assert!(!s.notices_mut().has_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_engine_init_is_fatal() {
        let handle = Arc::new(EngineHandle::new(Arc::new(FailingEngine)));
        handle.initialize().await.unwrap_err();
        let aggregator = Arc::new(BoundaryAggregator::new(
            handle,
            Arc::new(fixtures::memory_source()),
        ));
        let mut s = OnDemandSession::new(
            Arc::new(fixtures::catalog()),
            aggregator,
            RecordedDisplay::default(),
            RecordedViewport::default(),
        );
        let start = tokio::time::Instant::now();
        let err = s.select_country("Wakanda").await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, SessionError::Engine(EngineError::InitFailed(_))));
        assert!(start.elapsed() < ReadinessPolicy::default().max_wait());
        assert!(s.notices_mut().has_fatal());
    }

    struct FailingEngine;

    impl QueryEngine for FailingEngine {
        fn name(&self) -> &str {
            "failing"
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
}
