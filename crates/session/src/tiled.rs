use std::sync::Arc;

use catalog::Catalog;
use foundation::AdminLevel;
use layers::{MapSurface, Reconciler};
use runtime::NoticeBus;
use tracing::{error, info};

use crate::error::SessionError;
use crate::event::UiEvent;
use crate::selection::Selection;
use crate::viewport::{Viewport, ViewportDefaults};

/// Toggle control for one subdivision level.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LevelControl {
    pub level: AdminLevel,
    pub active: bool,
}

/// Tiled strategy: any subset of a country's levels may be shown at once,
/// each as a filtered layer pair over the shared per-level tile source.
pub struct TiledSession<M, V> {
    catalog: Arc<Catalog>,
    reconciler: Reconciler,
    defaults: ViewportDefaults,
    map: M,
    viewport: V,
    selection: Selection,
    controls: Vec<LevelControl>,
    notices: NoticeBus,
}

impl<M: MapSurface, V: Viewport> TiledSession<M, V> {
    /// Creates the session and puts the unfiltered level 0 base layer on the map.
    pub fn new(catalog: Arc<Catalog>, reconciler: Reconciler, map: M, viewport: V) -> Self {
        let mut session = Self {
            catalog,
            reconciler,
            defaults: ViewportDefaults::default(),
            map,
            viewport,
            selection: Selection::default(),
            controls: Vec::new(),
            notices: NoticeBus::new(),
        };
        session
            .reconciler
            .ensure_level_visible(&mut session.map, AdminLevel::COUNTRY, None);
        session
    }

    pub fn with_defaults(mut self, defaults: ViewportDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn controls(&self) -> &[LevelControl] {
        &self.controls
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn viewport(&self) -> &V {
        &self.viewport
    }

    pub fn notices_mut(&mut self) -> &mut NoticeBus {
        &mut self.notices
    }

    pub fn handle(&mut self, event: UiEvent) -> Result<(), SessionError> {
        match event {
            UiEvent::CountryChanged(Some(name)) => self.select_country(&name),
            UiEvent::CountryChanged(None) | UiEvent::Reset => {
                self.clear_selection();
                Ok(())
            }
            UiEvent::LevelToggled(level) => self.toggle_level(level).map(|_| ()),
            UiEvent::LevelSelected(level) => self.show_only(level),
        }
    }

    pub fn select_country(&mut self, name: &str) -> Result<(), SessionError> {
        let Some(country) = self.catalog.get(name).cloned() else {
            return Err(self.fail(SessionError::UnknownCountry(name.to_string())));
        };
        // Layers filtered to the previous country must not linger.
        if !self.selection.active_levels().is_empty() {
            self.reconciler.reset_all_levels(&mut self.map);
        }
        self.viewport.fit_bounds(country.bounds.corners());
        self.controls = country
            .admin_levels
            .iter()
            .map(|&level| LevelControl { level, active: false })
            .collect();
        self.reconciler
            .ensure_level_visible(&mut self.map, AdminLevel::COUNTRY, Some(&country.name));
        let generation = self.selection.select_country(country);
        info!(country = name, %generation, "country selected");
        self.notices.info(generation, format!("selected {name}"));
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        let generation = self.selection.clear();
        self.controls.clear();
        self.reconciler.reset_all_levels(&mut self.map);
        self.viewport.jump_to(self.defaults.center, self.defaults.zoom);
        info!(%generation, "selection cleared");
    }

    /// Flips a level on or off and returns its new state.
    pub fn toggle_level(&mut self, level: u8) -> Result<bool, SessionError> {
        let level = self.selection.require_level(level).map_err(|e| self.fail(e))?;
        let active = self.selection.toggle(level);
        self.apply_level(level, active);
        Ok(active)
    }

    fn show_only(&mut self, level: u8) -> Result<(), SessionError> {
        let level = self.selection.require_level(level).map_err(|e| self.fail(e))?;
        let others: Vec<AdminLevel> = self
            .selection
            .active_levels()
            .iter()
            .copied()
            .filter(|&l| l != level)
            .collect();
        for other in others {
            self.selection.toggle(other);
            self.apply_level(other, false);
        }
        if !self.selection.active_levels().contains(&level) {
            self.selection.toggle(level);
            self.apply_level(level, true);
        }
        Ok(())
    }

    fn apply_level(&mut self, level: AdminLevel, active: bool) {
        if active {
            let country = self.selection.country().map(|c| c.name.as_str());
            self.reconciler
                .ensure_level_visible(&mut self.map, level, country);
        } else {
            self.reconciler.hide_level(&mut self.map, level);
        }
        if let Some(control) = self.controls.iter_mut().find(|c| c.level == level) {
            control.active = active;
        }
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        error!(%err, "selection transition rejected");
        self.notices.error(self.selection.generation(), err.to_string());
        err
    }
}
