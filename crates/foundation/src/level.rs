use serde::{Deserialize, Serialize};

/// GADM administrative level.
///
/// Level 0 is the country outline; levels 1..=5 are nested subdivisions.
/// Each level `L` names its attributes `NAME_L`, `TYPE_L`, `ENGTYPE_L` and
/// `GID_L`, and inherits `NAME_0..NAME_(L-1)` for ancestry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct AdminLevel(u8);

impl AdminLevel {
    pub const COUNTRY: Self = Self(0);
    pub const MAX: u8 = 5;

    pub const fn new(level: u8) -> Option<Self> {
        if level <= Self::MAX {
            Some(Self(level))
        } else {
            None
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn is_country(self) -> bool {
        self.0 == 0
    }

    /// The enclosing level that names a region's parent.
    ///
    /// Only subdivisions below the first level have a parent column; level 1
    /// regions are children of the country, which is carried separately.
    pub fn parent(self) -> Option<Self> {
        if self.0 > 1 { Some(Self(self.0 - 1)) } else { None }
    }

    /// Levels 0..=5 in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..=Self::MAX).map(Self)
    }

    /// Levels 1..=5 in ascending order.
    pub fn subdivisions() -> impl Iterator<Item = Self> {
        (1..=Self::MAX).map(Self)
    }

    pub fn name_column(self) -> String {
        format!("NAME_{}", self.0)
    }

    pub fn type_column(self) -> String {
        format!("TYPE_{}", self.0)
    }

    pub fn engtype_column(self) -> String {
        format!("ENGTYPE_{}", self.0)
    }

    pub fn gid_column(self) -> String {
        format!("GID_{}", self.0)
    }
}

impl TryFrom<u8> for AdminLevel {
    type Error = InvalidAdminLevel;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidAdminLevel(value))
    }
}

impl From<AdminLevel> for u8 {
    fn from(level: AdminLevel) -> Self {
        level.0
    }
}

impl std::fmt::Display for AdminLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "level {}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InvalidAdminLevel(pub u8);

impl std::fmt::Display for InvalidAdminLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "administrative level {} is outside 0..={}",
            self.0,
            AdminLevel::MAX
        )
    }
}

impl std::error::Error for InvalidAdminLevel {}
