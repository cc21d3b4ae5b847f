use serde::{Deserialize, Serialize};

/// Grouping key of one dissolved region.
///
/// Exactly the non-geometry columns of an aggregation query:
/// `(NAME_L, TYPE_L, ENGTYPE_L, GID_L, NAME_0[, NAME_(L-1)])`.
/// Nullable columns stay `None` so that `NULL` and `''` group separately,
/// the way a SQL `GROUP BY` treats them.
///
/// Ordering contract:
/// - Keys order by name first, so grouped results come out name-sorted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub name: String,
    #[serde(rename = "type")]
    pub region_type: Option<String>,
    pub eng_type: Option<String>,
    pub gid: Option<String>,
    pub country: Option<String>,
    pub parent: Option<String>,
}
