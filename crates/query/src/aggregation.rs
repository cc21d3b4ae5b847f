//! Aggregation plan: dissolve raw boundary rows into one region per key.
//!
//! The plan is engine-neutral. In-process engines evaluate it with
//! [`AggregationQuery::key_for`]; SQL engines run [`AggregationQuery::to_sql`].
//! Both must agree with the offline conversion, which dissolves each level
//! by `(GID_L, NAME_L, NAME_0..NAME_(L-1), TYPE_L, ENGTYPE_L)`.

use foundation::AdminLevel;

use crate::key::GroupKey;

pub const COUNTRY_COLUMN: &str = "NAME_0";
pub const COUNTRY_GID_COLUMN: &str = "GID_0";
pub const GEOMETRY_COLUMN: &str = "geometry";

/// Source columns feeding each output field at one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyColumns {
    pub name: String,
    pub region_type: Option<String>,
    pub eng_type: Option<String>,
    pub gid: String,
    pub country: String,
    pub parent: Option<String>,
}

impl KeyColumns {
    pub fn for_level(level: AdminLevel) -> Self {
        if level.is_country() {
            // Country outlines: dissolve by country name and code only.
            return Self {
                name: COUNTRY_COLUMN.to_string(),
                region_type: None,
                eng_type: None,
                gid: COUNTRY_GID_COLUMN.to_string(),
                country: COUNTRY_COLUMN.to_string(),
                parent: None,
            };
        }
        Self {
            name: level.name_column(),
            region_type: Some(level.type_column()),
            eng_type: Some(level.engtype_column()),
            gid: level.gid_column(),
            country: COUNTRY_COLUMN.to_string(),
            parent: level.parent().map(AdminLevel::name_column),
        }
    }

    /// `(source column, output alias)` pairs in select order. A `None` column
    /// projects `NULL`.
    pub fn projections(&self) -> Vec<(Option<&str>, &'static str)> {
        let mut out = vec![
            (Some(self.name.as_str()), "name"),
            (self.region_type.as_deref(), "type"),
            (self.eng_type.as_deref(), "eng_type"),
            (Some(self.gid.as_str()), "gid"),
            (Some(self.country.as_str()), "country"),
        ];
        if let Some(parent) = self.parent.as_deref() {
            out.push((Some(parent), "parent"));
        }
        out
    }

    /// Distinct source columns of the group key, in select order.
    pub fn group_by(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for (column, _alias) in self.projections() {
            if let Some(column) = column {
                if !out.contains(&column) {
                    out.push(column);
                }
            }
        }
        out
    }
}

/// A deterministic dissolve query for one level of one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationQuery {
    level: AdminLevel,
    data_ref: String,
    country: Option<String>,
    columns: KeyColumns,
}

impl AggregationQuery {
    pub fn new(level: AdminLevel, data_ref: impl Into<String>, country: Option<String>) -> Self {
        Self {
            level,
            data_ref: data_ref.into(),
            country,
            columns: KeyColumns::for_level(level),
        }
    }

    pub fn level(&self) -> AdminLevel {
        self.level
    }

    pub fn data_ref(&self) -> &str {
        &self.data_ref
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn columns(&self) -> &KeyColumns {
        &self.columns
    }

    /// Evaluates filter and key for one raw row.
    ///
    /// `lookup` returns a column value, `None` for `NULL`. Returns `None` when
    /// the row is filtered out: empty or null name at this level, or a
    /// different country than the one requested.
    pub fn key_for<'a, F>(&self, lookup: F) -> Option<GroupKey>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let name = lookup(&self.columns.name).filter(|n| !n.is_empty())?;
        if let Some(country) = self.country.as_deref() {
            if lookup(COUNTRY_COLUMN) != Some(country) {
                return None;
            }
        }
        let get = |column: Option<&str>| column.and_then(&lookup).map(str::to_string);
        Some(GroupKey {
            name: name.to_string(),
            region_type: get(self.columns.region_type.as_deref()),
            eng_type: get(self.columns.eng_type.as_deref()),
            gid: get(Some(self.columns.gid.as_str())),
            country: get(Some(self.columns.country.as_str())),
            parent: get(self.columns.parent.as_deref()),
        })
    }

    /// Renders the plan as DuckDB spatial SQL over the Parquet resource.
    pub fn to_sql(&self) -> String {
        let select: Vec<String> = self
            .columns
            .projections()
            .into_iter()
            .map(|(column, alias)| match column {
                Some(column) => format!("{column} AS {alias}"),
                None => format!("NULL AS {alias}"),
            })
            .chain(std::iter::once(format!(
                "ST_AsWKB(ST_Union_Agg({GEOMETRY_COLUMN})) AS {GEOMETRY_COLUMN}"
            )))
            .collect();

        let name = &self.columns.name;
        let mut predicates = vec![format!("{name} IS NOT NULL"), format!("{name} <> ''")];
        if let Some(country) = self.country.as_deref() {
            predicates.push(format!("{COUNTRY_COLUMN} = {}", quote_literal(country)));
        }

        format!(
            "SELECT {}\nFROM read_parquet({})\nWHERE {}\nGROUP BY {}\nORDER BY name, gid",
            select.join(", "),
            quote_literal(&self.data_ref),
            predicates.join(" AND "),
            self.columns.group_by().join(", "),
        )
    }
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
