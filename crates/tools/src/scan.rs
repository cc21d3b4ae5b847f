use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use catalog::{CATALOG_FILE_NAME, Catalog, Country};
use engine::{RawRow, ResourceFormat, decode_rows};
use foundation::{AdminLevel, LonLatBounds};
use geo::BoundingRect;
use query::COUNTRY_COLUMN;
use tracing::{info, warn};

/// Builds a catalog entry from one per-country raw-row file.
///
/// Bounds cover every row geometry; a level is available when at least one
/// row has a non-empty `NAME_L`.
pub fn scan_country(path: &Path) -> Result<Country> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("not a file name: {}", path.display()))?
        .to_string();
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let file_size = bytes.len() as u64;
    let rows = decode_rows(&file_name, bytes)?;

    let name = rows
        .iter()
        .find_map(|r| r.get(COUNTRY_COLUMN).filter(|n| !n.is_empty()))
        .map(str::to_string)
        .or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.replace('_', " "))
        })
        .with_context(|| format!("{file_name}: no country name"))?;

    let bounds = rows_bounds(&rows);
    if !bounds.is_valid() {
        bail!("{file_name}: no usable geometry");
    }

    Ok(Country {
        name,
        data_ref: file_name,
        bounds,
        admin_levels: available_levels(&rows),
        record_count: Some(rows.len() as u64),
        file_size: Some(file_size),
    })
}

pub fn rows_bounds(rows: &[RawRow]) -> LonLatBounds {
    let mut bounds = LonLatBounds::empty();
    for rect in rows
        .iter()
        .filter_map(|r| r.geometry.as_ref())
        .filter_map(|g| g.bounding_rect())
    {
        bounds.extend(rect.min().x, rect.min().y);
        bounds.extend(rect.max().x, rect.max().y);
    }
    bounds
}

pub fn available_levels(rows: &[RawRow]) -> Vec<AdminLevel> {
    AdminLevel::subdivisions()
        .filter(|level| {
            let column = level.name_column();
            rows.iter().any(|r| r.has_value(&column))
        })
        .collect()
}

/// Scans every raw-row file in `dir` (sorted by file name).
///
/// Files that cannot be read, or that have no subdivision levels, are logged
/// and skipped.
pub fn build_catalog(dir: &Path, simplify_tolerance: Option<f64>) -> Result<Catalog> {
    let mut paths: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("read dir {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| p.file_name().and_then(|n| n.to_str()) != Some(CATALOG_FILE_NAME))
        .filter(|p| {
            p.to_str()
                .and_then(ResourceFormat::from_data_ref)
                .is_some()
        })
        .collect();
    paths.sort();

    let mut countries = Vec::with_capacity(paths.len());
    for path in paths {
        match scan_country(&path) {
            Ok(country) if country.admin_levels.is_empty() => {
                warn!(country = %country.name, "skipping: no admin levels found");
            }
            Ok(country) => {
                info!(
                    country = %country.name,
                    levels = ?country.admin_levels.iter().map(|l| l.get()).collect::<Vec<_>>(),
                    records = country.record_count,
                    "scanned"
                );
                countries.push(country);
            }
            Err(e) => warn!(path = %path.display(), "skipping: {e:#}"),
        }
    }
    Ok(Catalog::from_countries(countries, simplify_tolerance)?)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{build_catalog, scan_country};
    use engine::testing as fixtures;
    use foundation::{AdminLevel, LonLatBounds};
    use pretty_assertions::assert_eq;

    #[test]
    fn scan_computes_bounds_levels_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wakanda.geojson");
        let body = fixtures::wakanda_geojson();
        fs::write(&path, &body).unwrap();

        let country = scan_country(&path).unwrap();
        assert_eq!(country.name, "Wakanda");
        assert_eq!(country.data_ref, "wakanda.geojson");
        assert_eq!(country.bounds, LonLatBounds::new(0.0, -2.0, 2.0, 2.0));
        assert_eq!(
            country.admin_levels,
            vec![AdminLevel::new(1).unwrap(), AdminLevel::new(2).unwrap()]
        );
        assert_eq!(country.record_count, Some(6));
        assert_eq!(country.file_size, Some(body.len() as u64));
    }

    #[test]
    fn catalog_skips_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("wakanda.geojson"), fixtures::wakanda_geojson()).unwrap();
        fs::write(dir.path().join("atlantis.geojson"), fixtures::atlantis_geojson()).unwrap();
        fs::write(dir.path().join("countries.json"), "{}").unwrap();
        fs::write(dir.path().join("README.txt"), "hi").unwrap();
        fs::write(dir.path().join("broken.geojson"), "not json").unwrap();

        let catalog = build_catalog(dir.path(), Some(0.001)).unwrap();
        let names: Vec<&str> = catalog.countries().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Atlantis", "Wakanda"]);
        assert_eq!(catalog.simplify_tolerance(), Some(0.001));
        let json = catalog.to_json_pretty().unwrap();
        assert!(json.contains("\"total_countries\": 2"));
    }
}
