//! Desired-state reconciliation of per-level tile sources and layers.
//!
//! Every entry point computes the layers a level should have and applies only
//! the differences, so repeating a call leaves the map untouched.

use foundation::AdminLevel;
use streaming::TileEndpoints;
use tracing::debug;

use crate::layer::{Filter, LayerKind, LayerSpec, LevelBinding, SourceSpec};
use crate::surface::MapSurface;
use crate::symbology::StyleTable;

/// What one reconciliation call changed.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0
    }

    fn merge(&mut self, other: ReconcileReport) {
        self.added += other.added;
        self.updated += other.updated;
        self.removed += other.removed;
    }
}

/// Desired map state for one level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelLayers {
    pub source: SourceSpec,
    pub fill: LayerSpec,
    pub line: LayerSpec,
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    endpoints: TileEndpoints,
    styles: StyleTable,
}

impl Reconciler {
    pub fn new(endpoints: TileEndpoints, styles: StyleTable) -> Self {
        Self { endpoints, styles }
    }

    pub fn endpoints(&self) -> &TileEndpoints {
        &self.endpoints
    }

    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    /// Layers `level` should show for `country`. Level 0 is never filtered;
    /// it highlights the country through paint instead.
    pub fn desired(&self, level: AdminLevel, country: Option<&str>) -> LevelLayers {
        let binding = LevelBinding::for_level(level);
        let filter = match country {
            Some(c) if !level.is_country() => Some(Filter::country(c)),
            _ => None,
        };
        let source_layer = TileEndpoints::source_layer(level);
        let fill = LayerSpec {
            id: binding.fill_layer_id.clone(),
            kind: LayerKind::Fill,
            source: binding.source_id.clone(),
            source_layer: source_layer.clone(),
            filter: filter.clone(),
            paint: self.styles.level(level).fill_paint(),
            visible: true,
        };
        let line = LayerSpec {
            id: binding.line_layer_id.clone(),
            kind: LayerKind::Line,
            source: binding.source_id.clone(),
            source_layer,
            filter,
            paint: self.styles.line_paint(level, country),
            visible: true,
        };
        LevelLayers {
            source: SourceSpec {
                id: binding.source_id,
                url: self.endpoints.source_url(level),
            },
            fill,
            line,
        }
    }

    pub fn ensure_level_visible<M: MapSurface + ?Sized>(
        &self,
        map: &mut M,
        level: AdminLevel,
        country: Option<&str>,
    ) -> ReconcileReport {
        let desired = self.desired(level, country);
        let mut report = ReconcileReport::default();
        if !map.has_source(&desired.source.id) {
            map.add_source(&desired.source);
            report.added += 1;
        }
        report.merge(apply_layer(map, &desired.fill));
        report.merge(apply_layer(map, &desired.line));
        debug!(%level, country, ?report, "ensure level visible");
        report
    }

    /// Hides a level's layers without touching filter or paint.
    pub fn hide_level<M: MapSurface + ?Sized>(&self, map: &mut M, level: AdminLevel) -> ReconcileReport {
        let binding = LevelBinding::for_level(level);
        let mut report = ReconcileReport::default();
        for id in binding.layer_ids() {
            if map.layer(id).is_some_and(|l| l.visible) {
                map.set_visibility(id, false);
                report.updated += 1;
            }
        }
        debug!(%level, ?report, "hide level");
        report
    }

    /// Removes every subdivision layer and returns level 0 to its
    /// unselected paint. Sources are kept for reuse.
    pub fn reset_all_levels<M: MapSurface + ?Sized>(&self, map: &mut M) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for level in AdminLevel::subdivisions() {
            let binding = LevelBinding::for_level(level);
            for id in binding.layer_ids() {
                if map.has_layer(id) {
                    map.remove_layer(id);
                    report.removed += 1;
                }
            }
        }
        let base = LevelBinding::for_level(AdminLevel::COUNTRY);
        let default_paint = self.styles.line_paint(AdminLevel::COUNTRY, None);
        if map
            .layer(&base.line_layer_id)
            .is_some_and(|l| l.paint != default_paint)
        {
            map.set_paint(&base.line_layer_id, &default_paint);
            report.updated += 1;
        }
        debug!(?report, "reset all levels");
        report
    }
}

fn apply_layer<M: MapSurface + ?Sized>(map: &mut M, desired: &LayerSpec) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let Some(current) = map.layer(&desired.id) else {
        map.add_layer(desired);
        report.added += 1;
        return report;
    };
    if current.filter != desired.filter {
        map.set_filter(&desired.id, desired.filter.as_ref());
        report.updated += 1;
    }
    if current.paint != desired.paint {
        map.set_paint(&desired.id, &desired.paint);
        report.updated += 1;
    }
    if current.visible != desired.visible {
        map.set_visibility(&desired.id, desired.visible);
        report.updated += 1;
    }
    report
}
