use foundation::AdminLevel;

/// Naming convention for the pre-built per-level tile archives.
///
/// One archive per administrative level, shared by every country:
/// `gadm_level{N}`. Level 0 features live in the `countries` source layer,
/// deeper levels in `admin{N}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileEndpoints {
    /// URL template; `{level}` and `{archive}` are substituted.
    pub url_template: String,
}

pub const DEFAULT_TILE_URL_TEMPLATE: &str = "pmtiles://tiles/{archive}.pmtiles";

impl TileEndpoints {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
        }
    }

    pub fn archive_name(level: AdminLevel) -> String {
        format!("gadm_level{}", level.get())
    }

    pub fn source_layer(level: AdminLevel) -> String {
        if level.is_country() {
            "countries".to_string()
        } else {
            format!("admin{}", level.get())
        }
    }

    /// Source URL for `level`. Country-independent by construction.
    pub fn source_url(&self, level: AdminLevel) -> String {
        self.url_template
            .replace("{archive}", &Self::archive_name(level))
            .replace("{level}", &level.get().to_string())
    }
}

impl Default for TileEndpoints {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_URL_TEMPLATE)
    }
}
