use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use catalog::{Country, sanitize_filename};
use engine::{BoundaryAggregator, RegionCollection};
use foundation::AdminLevel;
use geo::SimplifyVwPreserve;
use tracing::info;

/// Simplifies every region in place without introducing self-intersections.
/// Non-positive tolerances are a no-op.
///
/// `tolerance` is in degrees; vertices whose effective area falls below
/// `tolerance²` are removed.
pub fn simplify_regions(regions: &mut RegionCollection, tolerance: f64) {
    if tolerance <= 0.0 {
        return;
    }
    let min_area = tolerance * tolerance;
    for region in &mut regions.regions {
        region.geometry = region.geometry.simplify_vw_preserve(&min_area);
    }
}

pub fn level_file_name(level: AdminLevel) -> String {
    format!("level_{}.geojson", level.get())
}

/// Writes `<out>/<sanitized country>/level_<L>.geojson` for each available
/// level and returns the written paths.
pub async fn export_country(
    aggregator: &BoundaryAggregator,
    country: &Country,
    out: &Path,
    tolerance: f64,
) -> Result<Vec<PathBuf>> {
    let dir = out.join(sanitize_filename(&country.name));
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("create {}", dir.display()))?;

    let mut written = Vec::with_capacity(country.admin_levels.len());
    for &level in &country.admin_levels {
        let mut regions = aggregator
            .aggregate(level, country)
            .await
            .with_context(|| format!("{} level {level}", country.name))?;
        simplify_regions(&mut regions, tolerance);
        let body = regions.to_geojson_string();
        let path = dir.join(level_file_name(level));
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        info!(
            country = %country.name,
            %level,
            regions = regions.len(),
            kib = body.len() / 1024,
            "exported"
        );
        written.push(path);
    }
    Ok(written)
}
