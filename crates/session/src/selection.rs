use std::collections::BTreeSet;

use catalog::Country;
use foundation::{AdminLevel, Generation};

use crate::error::SessionError;

/// Session selection. Mutated only through session transitions.
///
/// Every transition bumps `generation`; in-flight work tagged with an older
/// generation is stale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    country: Option<Country>,
    level: Option<AdminLevel>,
    active_levels: BTreeSet<AdminLevel>,
    generation: Generation,
}

impl Selection {
    pub fn is_idle(&self) -> bool {
        self.country.is_none()
    }

    pub fn country(&self) -> Option<&Country> {
        self.country.as_ref()
    }

    /// The single displayed level (on-demand strategy).
    pub fn level(&self) -> Option<AdminLevel> {
        self.level
    }

    /// Toggled-on levels (tiled strategy).
    pub fn active_levels(&self) -> &BTreeSet<AdminLevel> {
        &self.active_levels
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Selected country, or `NoCountrySelected` while idle.
    pub fn require_country(&self) -> Result<&Country, SessionError> {
        self.country.as_ref().ok_or(SessionError::NoCountrySelected)
    }

    /// Checks that `level` is a subdivision the selected country has.
    pub fn require_level(&self, level: u8) -> Result<AdminLevel, SessionError> {
        let country = self.require_country()?;
        AdminLevel::new(level)
            .filter(|l| country.admin_levels.contains(l))
            .ok_or_else(|| SessionError::LevelUnavailable {
                country: country.name.clone(),
                level,
            })
    }

    pub(crate) fn select_country(&mut self, country: Country) -> Generation {
        self.country = Some(country);
        self.level = None;
        self.active_levels.clear();
        self.generation.bump()
    }

    pub(crate) fn clear(&mut self) -> Generation {
        self.country = None;
        self.level = None;
        self.active_levels.clear();
        self.generation.bump()
    }

    pub(crate) fn set_level(&mut self, level: AdminLevel) -> Generation {
        self.level = Some(level);
        self.generation.bump()
    }

    /// Flips `level` and returns whether it is now active.
    pub(crate) fn toggle(&mut self, level: AdminLevel) -> bool {
        self.generation.bump();
        if self.active_levels.remove(&level) {
            false
        } else {
            self.active_levels.insert(level);
            true
        }
    }
}
