//! Static country catalog (`countries.json`).
//!
//! Loaded once at startup; nothing else in the viewer works without it.

use std::collections::BTreeMap;

use foundation::{AdminLevel, LonLatBounds};
use serde::{Deserialize, Serialize};
use streaming::ResourceSource;
use tracing::{error, info};

pub const CATALOG_FILE_NAME: &str = "countries.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub name: String,
    /// Per-country boundary resource (file name relative to the data root).
    #[serde(rename = "filename", alias = "folder")]
    pub data_ref: String,
    pub bounds: LonLatBounds,
    /// Available subdivision levels, ascending, within 1..=5.
    pub admin_levels: Vec<AdminLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

impl Country {
    pub fn has_level(&self, level: AdminLevel) -> bool {
        level.is_country() || self.admin_levels.contains(&level)
    }

    /// The shallowest available subdivision level.
    pub fn first_level(&self) -> Option<AdminLevel> {
        self.admin_levels.first().copied()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    countries: Vec<Country>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_countries: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    simplify_tolerance: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog could not be fetched or parsed. Fatal to all interaction.
    #[error("country catalog unavailable: {0}")]
    Unavailable(String),
    #[error("country catalog corrupt: {0}")]
    Corrupt(String),
}

/// Immutable, name-ordered list of countries.
#[derive(Debug, Clone)]
pub struct Catalog {
    countries: Vec<Country>,
    by_name: BTreeMap<String, usize>,
    simplify_tolerance: Option<f64>,
    revision: String,
}

impl Catalog {
    pub fn from_json(bytes: &[u8]) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            serde_json::from_slice(bytes).map_err(|e| CatalogError::Corrupt(e.to_string()))?;
        Self::build(file.countries, file.simplify_tolerance, revision_of(bytes))
    }

    pub fn from_countries(
        countries: Vec<Country>,
        simplify_tolerance: Option<f64>,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::build(countries, simplify_tolerance, String::new())?;
        let json = catalog.to_json_pretty()?;
        catalog.revision = revision_of(json.as_bytes());
        Ok(catalog)
    }

    /// Fetches and parses the catalog. Any failure maps to
    /// [`CatalogError::Unavailable`].
    pub async fn load(source: &dyn ResourceSource, key: &str) -> Result<Self, CatalogError> {
        let bytes = source.fetch(key).await.map_err(|e| {
            error!(source = %source.describe(), "catalog fetch failed: {e}");
            CatalogError::Unavailable(e.to_string())
        })?;
        let catalog = Self::from_json(&bytes).map_err(|e| {
            error!(source = %source.describe(), "catalog parse failed: {e}");
            CatalogError::Unavailable(e.to_string())
        })?;
        info!(
            countries = catalog.len(),
            revision = %catalog.revision(),
            "loaded country catalog"
        );
        Ok(catalog)
    }

    fn build(
        mut countries: Vec<Country>,
        simplify_tolerance: Option<f64>,
        revision: String,
    ) -> Result<Self, CatalogError> {
        for c in countries.iter_mut() {
            if c.name.trim().is_empty() {
                return Err(CatalogError::Corrupt("country with empty name".to_string()));
            }
            if !c.bounds.is_valid() {
                return Err(CatalogError::Corrupt(format!(
                    "{}: bounds {:?} are not an ordered WGS84 box",
                    c.name,
                    <[f64; 4]>::from(c.bounds)
                )));
            }
            if c.admin_levels.iter().any(|l| l.is_country()) {
                return Err(CatalogError::Corrupt(format!(
                    "{}: admin_levels must be within 1..={}",
                    c.name,
                    AdminLevel::MAX
                )));
            }
            c.admin_levels.sort();
            c.admin_levels.dedup();
        }
        countries.sort_by(|a, b| a.name.cmp(&b.name));

        let mut by_name = BTreeMap::new();
        for (idx, c) in countries.iter().enumerate() {
            if by_name.insert(c.name.clone(), idx).is_some() {
                return Err(CatalogError::Corrupt(format!(
                    "duplicate country: {}",
                    c.name
                )));
            }
        }

        Ok(Self {
            countries,
            by_name,
            simplify_tolerance,
            revision,
        })
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    /// Countries ordered by name.
    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    pub fn get(&self, name: &str) -> Option<&Country> {
        self.by_name.get(name).map(|&idx| &self.countries[idx])
    }

    pub fn simplify_tolerance(&self) -> Option<f64> {
        self.simplify_tolerance
    }

    /// Content hash (blake3 hex) of the catalog bytes.
    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn to_json_pretty(&self) -> Result<String, CatalogError> {
        let file = CatalogFile {
            countries: self.countries.clone(),
            total_countries: Some(self.countries.len()),
            simplify_tolerance: self.simplify_tolerance,
        };
        serde_json::to_string_pretty(&file).map_err(|e| CatalogError::Corrupt(e.to_string()))
    }
}

fn revision_of(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Converts a country name into a file-system safe name.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' | ',' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{Catalog, CatalogError, sanitize_filename};
    use foundation::{AdminLevel, LonLatBounds};
    use pretty_assertions::assert_eq;
    use streaming::MemorySource;

    const WAKANDA: &str = r#"{
        "countries": [
            {"name": "Zamunda", "filename": "Zamunda.parquet", "bounds": [30, -5, 35, 0], "admin_levels": [1]},
            {"name": "Wakanda", "filename": "wakanda.parquet", "bounds": [10, 10, 20, 20], "admin_levels": [2, 1, 2]}
        ]
    }"#;

    #[test]
    fn parses_and_orders_by_name() {
        let c = Catalog::from_json(WAKANDA.as_bytes()).unwrap();
        let names: Vec<&str> = c.countries().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Wakanda", "Zamunda"]);

        let w = c.get("Wakanda").unwrap();
        assert_eq!(w.data_ref, "wakanda.parquet");
        assert_eq!(w.bounds, LonLatBounds::new(10.0, 10.0, 20.0, 20.0));
        let levels: Vec<u8> = w.admin_levels.iter().map(|l| l.get()).collect();
        assert_eq!(levels, vec![1, 2]);
        assert_eq!(w.first_level(), AdminLevel::new(1));
        assert!(w.has_level(AdminLevel::COUNTRY));
        assert!(!w.has_level(AdminLevel::new(3).unwrap()));
        assert_eq!(c.revision().len(), 64);
    }

    #[test]
    fn accepts_conversion_script_extras() {
        let json = r#"{"countries": [{"name": "A", "folder": "A", "bounds": [0,0,1,1],
            "admin_levels": [1], "record_count": 12, "file_size": 345}],
            "total_countries": 1, "simplify_tolerance": 0.001}"#;
        let c = Catalog::from_json(json.as_bytes()).unwrap();
        assert_eq!(c.get("A").unwrap().record_count, Some(12));
        assert_eq!(c.simplify_tolerance(), Some(0.001));
    }

    #[test]
    fn rejects_bad_levels_and_duplicates() {
        let level_six = r#"{"countries": [{"name": "A", "filename": "a", "bounds": [0,0,1,1], "admin_levels": [6]}]}"#;
        assert!(matches!(
            Catalog::from_json(level_six.as_bytes()),
            Err(CatalogError::Corrupt(_))
        ));
        let level_zero = r#"{"countries": [{"name": "A", "filename": "a", "bounds": [0,0,1,1], "admin_levels": [0]}]}"#;
        assert!(Catalog::from_json(level_zero.as_bytes()).is_err());
        let dup = r#"{"countries": [
            {"name": "A", "filename": "a", "bounds": [0,0,1,1], "admin_levels": []},
            {"name": "A", "filename": "b", "bounds": [0,0,1,1], "admin_levels": []}]}"#;
        assert!(Catalog::from_json(dup.as_bytes()).is_err());
    }

    #[test]
    fn rejects_inverted_or_out_of_range_bounds() {
        for bounds in ["[2,0,1,1]", "[0,0,1,91]", "[-200,0,1,1]"] {
            let json = format!(
                r#"{{"countries": [{{"name": "A", "filename": "a", "bounds": {bounds}, "admin_levels": [1]}}]}}"#
            );
            assert!(
                matches!(Catalog::from_json(json.as_bytes()), Err(CatalogError::Corrupt(ref m)) if m.contains("bounds")),
                "{bounds}"
            );
        }
    }

    #[test]
    fn pretty_json_reparses_to_same_countries() {
        let c = Catalog::from_json(WAKANDA.as_bytes()).unwrap();
        let json = c.to_json_pretty().unwrap();
        assert!(json.contains("\"total_countries\": 2"));
        let again = Catalog::from_json(json.as_bytes()).unwrap();
        assert_eq!(again.countries(), c.countries());
    }

    #[tokio::test]
    async fn load_maps_failures_to_unavailable() {
        let missing = MemorySource::new();
        assert!(matches!(
            Catalog::load(&missing, "countries.json").await,
            Err(CatalogError::Unavailable(_))
        ));

        let garbage = MemorySource::new().with("countries.json", b"not json".to_vec());
        assert!(matches!(
            Catalog::load(&garbage, "countries.json").await,
            Err(CatalogError::Unavailable(_))
        ));

        let ok = MemorySource::new().with("countries.json", WAKANDA.as_bytes().to_vec());
        assert_eq!(Catalog::load(&ok, "countries.json").await.unwrap().len(), 2);
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_filename("Bosnia and Herzegovina"), "Bosnia_and_Herzegovina");
        assert_eq!(sanitize_filename("Korea, North/South:x\\y"), "Korea__North_South_x_y");
    }
}
