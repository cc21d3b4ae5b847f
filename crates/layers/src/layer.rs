use foundation::AdminLevel;
use query::COUNTRY_COLUMN;
use serde::Serialize;
use serde_json::{Value, json};

use crate::symbology::Paint;

/// Stable map identifiers for one level: one source and one line/fill pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LevelBinding {
    pub level: AdminLevel,
    pub source_id: String,
    pub line_layer_id: String,
    pub fill_layer_id: String,
}

impl LevelBinding {
    pub fn for_level(level: AdminLevel) -> Self {
        let source_id = format!("gadm-level{}", level.get());
        Self {
            level,
            line_layer_id: format!("{source_id}-line"),
            fill_layer_id: format!("{source_id}-fill"),
            source_id,
        }
    }

    pub fn layer_ids(&self) -> [&str; 2] {
        [&self.fill_layer_id, &self.line_layer_id]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSpec {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Line,
    Fill,
}

/// Feature filter restricting a layer to one country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    CountryEquals(String),
}

impl Filter {
    pub fn country(name: impl Into<String>) -> Self {
        Self::CountryEquals(name.into())
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::CountryEquals(name) => json!(["==", COUNTRY_COLUMN, name]),
        }
    }
}

impl Serialize for Filter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSpec {
    pub id: String,
    pub kind: LayerKind,
    pub source: String,
    #[serde(rename = "source-layer")]
    pub source_layer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    pub paint: Paint,
    pub visible: bool,
}

#[cfg(test)]
mod tests {
    use super::{Filter, LevelBinding};
    use foundation::AdminLevel;
    use serde_json::json;

    #[test]
    fn binding_ids_are_derived_from_level() {
        let b = LevelBinding::for_level(AdminLevel::new(3).unwrap());
        assert_eq!(b.source_id, "gadm-level3");
        assert_eq!(b.layer_ids(), ["gadm-level3-fill", "gadm-level3-line"]);
    }

    #[test]
    fn country_filter_matches_name_column() {
        assert_eq!(
            Filter::country("Kenya").to_json(),
            json!(["==", "NAME_0", "Kenya"])
        );
    }
}
