use serde::{Deserialize, Serialize};

/// Geographic bounding box in WGS84 degrees.
///
/// Serialized as `[min_lon, min_lat, max_lon, max_lat]`, the order used by
/// `countries.json` and GeoJSON `bbox` members.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct LonLatBounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl LonLatBounds {
    pub const fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// An inverted box that any `extend` call will replace.
    pub const fn empty() -> Self {
        Self::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY)
    }

    pub fn is_empty(&self) -> bool {
        self.min_lon > self.max_lon || self.min_lat > self.max_lat
    }

    /// Finite, ordered, and inside the WGS84 domain.
    pub fn is_valid(&self) -> bool {
        let finite = [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
            .iter()
            .all(|v| v.is_finite());
        finite
            && !self.is_empty()
            && self.min_lon >= -180.0
            && self.max_lon <= 180.0
            && self.min_lat >= -90.0
            && self.max_lat <= 90.0
    }

    pub fn extend(&mut self, lon: f64, lat: f64) {
        self.min_lon = self.min_lon.min(lon);
        self.min_lat = self.min_lat.min(lat);
        self.max_lon = self.max_lon.max(lon);
        self.max_lat = self.max_lat.max(lat);
    }

    /// South-west and north-east corners as `[[lon, lat], [lon, lat]]`.
    ///
    /// This is the shape map viewports expect for "fit bounds".
    pub fn corners(&self) -> [[f64; 2]; 2] {
        [[self.min_lon, self.min_lat], [self.max_lon, self.max_lat]]
    }
}

impl From<[f64; 4]> for LonLatBounds {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<LonLatBounds> for [f64; 4] {
    fn from(b: LonLatBounds) -> Self {
        [b.min_lon, b.min_lat, b.max_lon, b.max_lat]
    }
}

#[cfg(test)]
mod tests {
    use super::LonLatBounds;

    #[test]
    fn corners_are_sw_then_ne() {
        let b = LonLatBounds::from([10.0, 10.0, 20.0, 20.0]);
        assert_eq!(b.corners(), [[10.0, 10.0], [20.0, 20.0]]);
    }

    #[test]
    fn extend_from_empty() {
        let mut b = LonLatBounds::empty();
        assert!(b.is_empty());
        assert!(!b.is_valid());
        b.extend(3.0, -1.0);
        b.extend(-2.0, 4.0);
        assert_eq!(b, LonLatBounds::new(-2.0, -1.0, 3.0, 4.0));
        assert!(b.is_valid());
    }

    #[test]
    fn out_of_range_or_inverted_is_invalid() {
        assert!(!LonLatBounds::new(2.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!LonLatBounds::new(-181.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!LonLatBounds::new(0.0, 0.0, 1.0, f64::NAN).is_valid());
        assert!(LonLatBounds::new(-180.0, -90.0, 180.0, 90.0).is_valid());
    }

    #[test]
    fn serializes_as_array() {
        let b = LonLatBounds::new(1.0, 2.0, 3.0, 4.0);
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "[1.0,2.0,3.0,4.0]");
        let back: LonLatBounds = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }
}
