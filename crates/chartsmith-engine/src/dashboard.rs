use chartsmith_contracts::{ChartSpec, Dataset};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::client::TextCompletion;
use crate::validate::strip_code_fence;

pub const DASHBOARD_TEMPERATURE: f64 = 0.5;
pub const DASHBOARD_MAX_TOKENS: u32 = 1500;

const KPI_COLUMN_LIMIT: usize = 4;

/// Suggests KPI groupings from dataset structure alone, no model call.
/// Sections are keyed by theme and only appear when the dataset can
/// support them.
pub fn recommend_kpis(dataset: &Dataset) -> IndexMap<String, Vec<String>> {
    let numeric = dataset.numeric_columns();
    let categorical = dataset.categorical_columns();
    let has_datetime = dataset
        .column_info()
        .values()
        .any(|kind| *kind == chartsmith_contracts::ColumnType::Datetime);

    let mut sections: IndexMap<String, Vec<String>> = IndexMap::new();

    let performance: Vec<String> = numeric
        .iter()
        .take(KPI_COLUMN_LIMIT)
        .flat_map(|column| [format!("Average {column}"), format!("Total {column}")])
        .collect();
    if !performance.is_empty() {
        sections.insert("Performance".to_string(), performance);
    }

    if has_datetime {
        let trend: Vec<String> = numeric
            .iter()
            .take(KPI_COLUMN_LIMIT)
            .map(|column| format!("{column} over time"))
            .collect();
        if !trend.is_empty() {
            sections.insert("Trend".to_string(), trend);
        }
    }

    let distribution: Vec<String> = numeric
        .iter()
        .take(KPI_COLUMN_LIMIT)
        .map(|column| format!("Distribution of {column}"))
        .collect();
    if !distribution.is_empty() {
        sections.insert("Distribution".to_string(), distribution);
    }

    if numeric.len() >= 2 {
        let mut correlation = Vec::new();
        for (idx, left) in numeric.iter().take(KPI_COLUMN_LIMIT).enumerate() {
            for right in numeric.iter().take(KPI_COLUMN_LIMIT).skip(idx + 1) {
                correlation.push(format!("{left} vs {right}"));
            }
        }
        sections.insert("Correlation".to_string(), correlation);
    }

    let category: Vec<String> = categorical
        .iter()
        .take(KPI_COLUMN_LIMIT)
        .flat_map(|group| {
            numeric
                .iter()
                .take(1)
                .map(move |column| format!("{column} by {group}"))
        })
        .collect();
    if !category.is_empty() {
        sections.insert("Category".to_string(), category);
    }

    sections
}

/// Asks the model to lay the recommended charts out as one dashboard.
/// Responses that cannot be parsed fall back to a deterministic layout, so
/// this always yields a usable document.
pub fn synthesize_dashboard(
    provider: &dyn TextCompletion,
    question: &str,
    dataset: &Dataset,
    specs: &[ChartSpec],
) -> Map<String, Value> {
    let prompt = dashboard_prompt(question, dataset, specs);
    provider
        .complete(&prompt, DASHBOARD_TEMPERATURE, DASHBOARD_MAX_TOKENS)
        .ok()
        .and_then(|response| parse_dashboard(&response))
        .unwrap_or_else(|| {
            warn!("dashboard synthesis failed, using the basic layout");
            basic_dashboard_spec(dataset, specs)
        })
}

fn parse_dashboard(response: &str) -> Option<Map<String, Value>> {
    let parsed: Value = serde_json::from_str(strip_code_fence(response)).ok()?;
    match parsed {
        Value::Object(object) => Some(object),
        // Some models wrap the document in a one-element array.
        Value::Array(items) => items
            .into_iter()
            .find_map(|item| item.as_object().cloned()),
        _ => None,
    }
}

/// Deterministic fallback: numeric KPI cards, every chart in a 2x2 grid,
/// categorical columns as filters.
pub fn basic_dashboard_spec(dataset: &Dataset, specs: &[ChartSpec]) -> Map<String, Value> {
    let kpi_cards: Vec<Value> = dataset
        .numeric_columns()
        .iter()
        .take(KPI_COLUMN_LIMIT)
        .filter_map(|name| {
            let values = dataset.column(name)?.numeric_values();
            if values.is_empty() {
                return None;
            }
            let total: f64 = values.iter().sum();
            Some(json!({
                "label": format!("Average {name}"),
                "value": total / values.len() as f64,
                "column": name,
            }))
        })
        .collect();
    let charts: Vec<Value> = specs
        .iter()
        .map(|spec| json!({"title": spec.title, "kind": spec.kind}))
        .collect();
    let filters: Vec<Value> = dataset
        .categorical_columns()
        .into_iter()
        .map(Value::String)
        .collect();

    let mut dashboard = Map::new();
    dashboard.insert("title".to_string(), json!("Data Overview"));
    dashboard.insert("layout".to_string(), json!("2x2"));
    dashboard.insert("kpi_cards".to_string(), Value::Array(kpi_cards));
    dashboard.insert("charts".to_string(), Value::Array(charts));
    dashboard.insert("filters".to_string(), Value::Array(filters));
    dashboard
}

fn dashboard_prompt(question: &str, dataset: &Dataset, specs: &[ChartSpec]) -> String {
    let stats = dataset.statistics();
    let chart_lines: Vec<String> = specs
        .iter()
        .map(|spec| format!("- {} ({}): {}", spec.title, spec.kind.as_str(), spec.rationale))
        .collect();

    format!(
        r#"You are assembling a dashboard from recommended charts.

**User's Problem:**
{question}

**Dataset:** {rows} rows, {columns} columns.
Numeric: {numeric}
Categorical: {categorical}

**Charts to arrange:**
{charts}

**Your task:** design one dashboard that answers the question at a glance.

**Output format (JSON only, no other text):**
{{
  "title": "Dashboard title",
  "layout": "2x2",
  "kpi_cards": [{{"label": "Average price", "column": "price"}}],
  "charts": [{{"title": "chart title", "position": 1}}],
  "filters": ["categorical_column"]
}}"#,
        rows = stats.rows,
        columns = stats.columns,
        numeric = stats.numeric_columns.join(", "),
        categorical = stats.categorical_columns.join(", "),
        charts = chart_lines.join("\n"),
    )
}
