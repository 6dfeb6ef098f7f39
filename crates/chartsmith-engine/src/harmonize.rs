use chartsmith_contracts::{ChartKind, ChartSpec, RawRecommendation, RecommendError};
use serde_json::{Map, Value};
use tracing::warn;

pub const DEFAULT_TITLE: &str = "Visualization";
pub const DEFAULT_DESCRIPTION: &str = "model-recommended visualization";
pub const DEFAULT_RATIONALE: &str = "derived from data analysis";
pub const DEFAULT_BAR_MODE: &str = "group";
pub const DEFAULT_BIN_COUNT: u32 = 30;

/// Harmonization result. `degraded` distinguishes "nothing to show because
/// the payload could not be processed" from a legitimately empty list.
#[derive(Debug, Clone, PartialEq)]
pub struct Harmonized {
    pub specs: Vec<ChartSpec>,
    pub degraded: bool,
}

/// Maps loosely-typed proposals onto the fixed chart-specification schema.
/// Pure: no I/O, no side effects beyond a warning when the whole payload
/// has to be discarded. Field references that do not name an existing
/// column are substituted deterministically, never left dangling.
pub fn harmonize(
    raw: &RawRecommendation,
    columns: &[String],
    numeric_columns: &[String],
) -> Harmonized {
    match try_harmonize(raw, columns, numeric_columns) {
        Ok(specs) => Harmonized {
            specs,
            degraded: false,
        },
        Err(err) => {
            warn!("harmonization failed, returning no specifications: {err}");
            Harmonized {
                specs: Vec::new(),
                degraded: true,
            }
        }
    }
}

fn try_harmonize(
    raw: &RawRecommendation,
    columns: &[String],
    numeric_columns: &[String],
) -> Result<Vec<ChartSpec>, RecommendError> {
    let mut specs = Vec::new();
    for (index, proposal) in raw.proposals().iter().enumerate() {
        let proposal = proposal.as_object().ok_or_else(|| {
            RecommendError::Harmonization(format!("proposal {index} is not an object"))
        })?;
        specs.push(harmonize_proposal(proposal, columns, numeric_columns));
    }
    Ok(specs)
}

fn harmonize_proposal(
    proposal: &Map<String, Value>,
    columns: &[String],
    numeric_columns: &[String],
) -> ChartSpec {
    let kind = ChartKind::from_reported(str_field(proposal, "viz_type").unwrap_or("scatter"));
    let justification = str_field(proposal, "justification");

    let x_field = resolve_x(str_field(proposal, "x_axis"), columns);
    let y_field = resolve_y(str_field(proposal, "y_axis"), columns, numeric_columns);
    let color_field = optional_column(proposal, "color", "color_col", columns);
    let size_field = optional_column(proposal, "size", "size_col", columns);

    let bar_mode = (kind == ChartKind::Bar).then(|| {
        str_field(proposal, "barmode")
            .unwrap_or(DEFAULT_BAR_MODE)
            .to_string()
    });
    let bin_count = (kind == ChartKind::Histogram).then(|| {
        proposal
            .get("nbins")
            .and_then(Value::as_u64)
            .map(|bins| bins as u32)
            .unwrap_or(DEFAULT_BIN_COUNT)
    });

    ChartSpec {
        kind,
        title: str_field(proposal, "title")
            .unwrap_or(DEFAULT_TITLE)
            .to_string(),
        description: justification.unwrap_or(DEFAULT_DESCRIPTION).to_string(),
        rationale: justification.unwrap_or(DEFAULT_RATIONALE).to_string(),
        x_field,
        y_field,
        color_field,
        size_field,
        bar_mode,
        bin_count,
    }
}

/// Reported column when it exists, else the first column, else absent.
fn resolve_x(reported: Option<&str>, columns: &[String]) -> Option<String> {
    match reported {
        Some(name) if column_exists(columns, name) => Some(name.to_string()),
        _ => columns.first().cloned(),
    }
}

/// Reported column when it exists, else the first numeric column, else the
/// second column, else absent.
fn resolve_y(
    reported: Option<&str>,
    columns: &[String],
    numeric_columns: &[String],
) -> Option<String> {
    match reported {
        Some(name) if column_exists(columns, name) => Some(name.to_string()),
        _ => numeric_columns
            .first()
            .cloned()
            .or_else(|| columns.get(1).cloned()),
    }
}

/// Optional enhancements are kept only when they name an existing column;
/// there is no fallback for them.
fn optional_column(
    proposal: &Map<String, Value>,
    key: &str,
    alt_key: &str,
    columns: &[String],
) -> Option<String> {
    str_field(proposal, key)
        .or_else(|| str_field(proposal, alt_key))
        .filter(|name| column_exists(columns, name))
        .map(str::to_string)
}

fn column_exists(columns: &[String], name: &str) -> bool {
    columns.iter().any(|column| column == name)
}

fn str_field<'a>(proposal: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    proposal
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use chartsmith_contracts::{ChartKind, RawRecommendation};
    use serde_json::json;

    use super::harmonize;

    fn raw_with(proposals: serde_json::Value) -> RawRecommendation {
        RawRecommendation(
            json!({"visualizations": proposals})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        )
    }

    fn columns() -> Vec<String> {
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    }

    fn numeric() -> Vec<String> {
        vec!["b".to_string(), "c".to_string()]
    }

    #[test]
    fn unknown_x_field_falls_back_to_first_column() {
        let raw = raw_with(json!([
            {"viz_type": "scatter_plot", "x_axis": "nonexistent", "y_axis": "b"}
        ]));
        let result = harmonize(&raw, &columns(), &numeric());
        assert!(!result.degraded);
        assert_eq!(result.specs[0].x_field.as_deref(), Some("a"));
        assert_eq!(result.specs[0].y_field.as_deref(), Some("b"));
    }

    #[test]
    fn absent_y_field_falls_back_to_first_numeric_column() {
        let raw = raw_with(json!([{"viz_type": "scatter_plot", "x_axis": "a"}]));
        let result = harmonize(&raw, &columns(), &numeric());
        assert_eq!(result.specs[0].y_field.as_deref(), Some("b"));
    }

    #[test]
    fn y_field_uses_second_column_when_nothing_is_numeric() {
        let raw = raw_with(json!([{"viz_type": "bar_chart", "x_axis": "a"}]));
        let result = harmonize(&raw, &columns(), &[]);
        assert_eq!(result.specs[0].y_field.as_deref(), Some("b"));
    }

    #[test]
    fn y_field_is_absent_for_single_column_dataset() {
        let raw = raw_with(json!([{"viz_type": "line_chart"}]));
        let result = harmonize(&raw, &["only".to_string()], &[]);
        assert_eq!(result.specs[0].x_field.as_deref(), Some("only"));
        assert_eq!(result.specs[0].y_field, None);
    }

    #[test]
    fn invalid_color_field_is_omitted_not_substituted() {
        let raw = raw_with(json!([
            {"viz_type": "scatter_plot", "x_axis": "a", "y_axis": "b", "color": "ghost"}
        ]));
        let result = harmonize(&raw, &columns(), &numeric());
        assert_eq!(result.specs[0].color_field, None);
    }

    #[test]
    fn valid_color_and_size_fields_are_kept() {
        let raw = raw_with(json!([
            {"viz_type": "scatter_plot", "x_axis": "a", "y_axis": "b", "color": "c", "size": "b"}
        ]));
        let result = harmonize(&raw, &columns(), &numeric());
        assert_eq!(result.specs[0].color_field.as_deref(), Some("c"));
        assert_eq!(result.specs[0].size_field.as_deref(), Some("b"));
    }

    #[test]
    fn bar_charts_always_carry_a_grouping_mode() {
        let raw = raw_with(json!([
            {"viz_type": "bar_chart", "x_axis": "a", "y_axis": "b"},
            {"viz_type": "bar_chart", "x_axis": "a", "y_axis": "b", "barmode": "stack"}
        ]));
        let result = harmonize(&raw, &columns(), &numeric());
        assert_eq!(result.specs[0].bar_mode.as_deref(), Some("group"));
        assert_eq!(result.specs[1].bar_mode.as_deref(), Some("stack"));
        assert_eq!(result.specs[0].bin_count, None);
    }

    #[test]
    fn histograms_always_carry_a_bin_count() {
        let raw = raw_with(json!([
            {"viz_type": "histogram", "x_axis": "b"},
            {"viz_type": "histogram", "x_axis": "b", "nbins": 50}
        ]));
        let result = harmonize(&raw, &columns(), &numeric());
        assert_eq!(result.specs[0].bin_count, Some(30));
        assert_eq!(result.specs[1].bin_count, Some(50));
        assert_eq!(result.specs[0].bar_mode, None);
    }

    #[test]
    fn missing_titles_get_defaults() {
        let raw = raw_with(json!([{"viz_type": "heatmap"}]));
        let result = harmonize(&raw, &columns(), &numeric());
        assert_eq!(result.specs[0].title, "Visualization");
        assert_eq!(result.specs[0].description, "model-recommended visualization");
        assert_eq!(result.specs[0].rationale, "derived from data analysis");
    }

    #[test]
    fn unrecognized_kind_passes_through_unchanged() {
        let raw = raw_with(json!([{"viz_type": "violin", "x_axis": "a", "y_axis": "b"}]));
        let result = harmonize(&raw, &columns(), &numeric());
        assert_eq!(
            result.specs[0].kind,
            ChartKind::Other("violin".to_string())
        );
    }

    #[test]
    fn non_object_proposal_degrades_to_empty_list() {
        let raw = raw_with(json!(["not an object"]));
        let result = harmonize(&raw, &columns(), &numeric());
        assert!(result.degraded);
        assert!(result.specs.is_empty());
    }
}
