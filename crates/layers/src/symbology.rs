use foundation::AdminLevel;
use query::COUNTRY_COLUMN;
use serde::Serialize;
use serde_json::{Value, json};

/// A paint property that is either constant or keyed on the selected country.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleValue<T> {
    Constant(T),
    /// `selected` for features of `country`, `otherwise` for the rest.
    CountryCase {
        country: String,
        selected: T,
        otherwise: T,
    },
}

impl<T: Serialize> StyleValue<T> {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Constant(v) => json!(v),
            Self::CountryCase {
                country,
                selected,
                otherwise,
            } => json!([
                "case",
                ["==", ["get", COUNTRY_COLUMN], country],
                selected,
                otherwise
            ]),
        }
    }
}

impl<T: Serialize> Serialize for StyleValue<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Paint {
    Line {
        #[serde(rename = "line-color")]
        color: StyleValue<String>,
        #[serde(rename = "line-width")]
        width: StyleValue<f64>,
    },
    Fill {
        #[serde(rename = "fill-color")]
        color: String,
        #[serde(rename = "fill-opacity")]
        opacity: f64,
    },
}

/// Colors and widths for one administrative level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelStyle {
    pub line_color: String,
    pub line_width: f64,
    pub fill_color: String,
    pub fill_opacity: f64,
}

impl LevelStyle {
    pub fn new(line_color: &str, line_width: f64, fill_opacity: f64) -> Self {
        Self {
            line_color: line_color.to_string(),
            line_width,
            fill_color: line_color.to_string(),
            fill_opacity,
        }
    }

    pub fn line_paint(&self) -> Paint {
        Paint::Line {
            color: StyleValue::Constant(self.line_color.clone()),
            width: StyleValue::Constant(self.line_width),
        }
    }

    pub fn fill_paint(&self) -> Paint {
        Paint::Fill {
            color: self.fill_color.clone(),
            opacity: self.fill_opacity,
        }
    }
}

/// Per-level styles plus the outline used to single out the selected country
/// on the always-present level 0 layer.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleTable {
    levels: [LevelStyle; 6],
    pub highlight_color: String,
    pub highlight_width: f64,
}

impl StyleTable {
    pub fn level(&self, level: AdminLevel) -> &LevelStyle {
        &self.levels[usize::from(level.get())]
    }

    /// Line paint for `level`. Only level 0 reacts to the selection.
    pub fn line_paint(&self, level: AdminLevel, country: Option<&str>) -> Paint {
        let style = self.level(level);
        match country {
            Some(country) if level.is_country() => Paint::Line {
                color: StyleValue::CountryCase {
                    country: country.to_string(),
                    selected: self.highlight_color.clone(),
                    otherwise: style.line_color.clone(),
                },
                width: StyleValue::CountryCase {
                    country: country.to_string(),
                    selected: self.highlight_width,
                    otherwise: style.line_width,
                },
            },
            _ => style.line_paint(),
        }
    }
}

impl Default for StyleTable {
    fn default() -> Self {
        Self {
            levels: [
                LevelStyle::new("#6b6b6b", 0.8, 0.0),
                LevelStyle::new("#1f77b4", 1.6, 0.04),
                LevelStyle::new("#2ca02c", 1.2, 0.04),
                LevelStyle::new("#ff7f0e", 1.0, 0.04),
                LevelStyle::new("#9467bd", 0.8, 0.04),
                LevelStyle::new("#8c564b", 0.6, 0.04),
            ],
            highlight_color: "#e6194b".to_string(),
            highlight_width: 2.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Paint, StyleTable};
    use foundation::AdminLevel;
    use serde_json::json;

    #[test]
    fn level_zero_highlights_selected_country() {
        let styles = StyleTable::default();
        let paint = styles.line_paint(AdminLevel::COUNTRY, Some("Chad"));
        assert_eq!(
            serde_json::to_value(&paint).unwrap(),
            json!({
                "line-color": ["case", ["==", ["get", "NAME_0"], "Chad"], "#e6194b", "#6b6b6b"],
                "line-width": ["case", ["==", ["get", "NAME_0"], "Chad"], 2.5, 0.8],
            })
        );
    }

    #[test]
    fn deeper_levels_ignore_selection_in_paint() {
        let styles = StyleTable::default();
        let l2 = AdminLevel::new(2).unwrap();
        assert_eq!(styles.line_paint(l2, Some("Chad")), styles.line_paint(l2, None));
        assert!(matches!(styles.level(l2).fill_paint(), Paint::Fill { .. }));
    }
}
