use chartsmith_contracts::{ChartSpec, ColumnType, Dataset};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::client::TextCompletion;
use crate::validate::strip_code_fence;

pub const REFINEMENT_TEMPERATURE: f64 = 0.5;
pub const REFINEMENT_MAX_TOKENS: u32 = 1000;

/// Colorblind-safe palette used when the model offers nothing better.
pub const DEFAULT_PALETTE: [&str; 8] = [
    "#0173b2", "#de8f05", "#029e73", "#cc78bc", "#ca9161", "#fbafe4", "#949494", "#ece133",
];

const TOP_VALUES: usize = 5;

/// A chart specification plus model-suggested presentation hints. The
/// hints are advisory styling, never structural changes to the spec.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinedSpec {
    pub spec: ChartSpec,
    pub style: Map<String, Value>,
}

/// Second model pass over a single chart: asks for presentation tweaks
/// informed by per-field statistics. Any failure falls back to the basic
/// enhancements instead of surfacing an error, so refinement can never
/// make a chart worse than unrefined.
pub fn refine(provider: &dyn TextCompletion, dataset: &Dataset, spec: &ChartSpec) -> RefinedSpec {
    let prompt = refinement_prompt(dataset, spec);
    let style = provider
        .complete(&prompt, REFINEMENT_TEMPERATURE, REFINEMENT_MAX_TOKENS)
        .ok()
        .and_then(|response| parse_style(&response))
        .unwrap_or_else(|| {
            warn!("refinement pass failed for '{}', using basic enhancements", spec.title);
            basic_enhancements(spec)
        });
    RefinedSpec {
        spec: spec.clone(),
        style,
    }
}

fn parse_style(response: &str) -> Option<Map<String, Value>> {
    let parsed: Value = serde_json::from_str(strip_code_fence(response)).ok()?;
    parsed.as_object().cloned()
}

/// Deterministic presentation defaults: labeled axes, a colorblind-safe
/// palette, and a legible default canvas.
pub fn basic_enhancements(spec: &ChartSpec) -> Map<String, Value> {
    let mut style = Map::new();
    let mut axis_labels = Map::new();
    if let Some(x) = &spec.x_field {
        axis_labels.insert("x".to_string(), Value::String(title_case(x)));
    }
    if let Some(y) = &spec.y_field {
        axis_labels.insert("y".to_string(), Value::String(title_case(y)));
    }
    style.insert("axis_labels".to_string(), Value::Object(axis_labels));
    style.insert(
        "color_palette".to_string(),
        Value::Array(
            DEFAULT_PALETTE
                .iter()
                .map(|color| Value::String(color.to_string()))
                .collect(),
        ),
    );
    style.insert("figure_size".to_string(), json!([10, 6]));
    style.insert(
        "additional_params".to_string(),
        json!({
            "show_grid": true,
            "show_legend": spec.color_field.is_some(),
            "font_size": 12,
        }),
    );
    style
}

fn refinement_prompt(dataset: &Dataset, spec: &ChartSpec) -> String {
    let stats = serde_json::to_string_pretty(&Value::Object(referenced_field_statistics(
        dataset, spec,
    )))
    .unwrap_or_else(|_| "{}".to_string());
    let spec_json = serde_json::to_string_pretty(spec).unwrap_or_else(|_| "{}".to_string());

    format!(
        r##"You are refining a chart for presentation quality.

**Chart specification:**
{spec_json}

**Statistics for the fields it uses:**
{stats}

**Your task:** suggest presentation refinements only. Do not change which
columns are plotted.

**Output format (JSON only, no other text):**
{{
  "axis_labels": {{"x": "Readable X Label", "y": "Readable Y Label"}},
  "color_palette": ["#hex", "..."],
  "figure_size": [10, 6],
  "additional_params": {{"show_grid": true, "show_legend": true, "font_size": 12}}
}}"##,
    )
}

/// Per-column summary for every field the spec references: dtype, distinct
/// and missing counts, plus numeric spread or the most frequent values.
pub fn referenced_field_statistics(dataset: &Dataset, spec: &ChartSpec) -> Map<String, Value> {
    let mut stats = Map::new();
    let fields = [
        spec.x_field.as_deref(),
        spec.y_field.as_deref(),
        spec.color_field.as_deref(),
        spec.size_field.as_deref(),
    ];
    for name in fields.into_iter().flatten() {
        if let Some(summary) = field_statistics(dataset, name) {
            stats.insert(name.to_string(), Value::Object(summary));
        }
    }
    stats
}

fn field_statistics(dataset: &Dataset, name: &str) -> Option<Map<String, Value>> {
    let column = dataset.column(name)?;
    let mut summary = Map::new();
    summary.insert(
        "dtype".to_string(),
        Value::String(column.kind().to_string()),
    );
    summary.insert("distinct".to_string(), json!(column.distinct_count()));
    summary.insert("missing".to_string(), json!(column.missing_count()));

    if column.kind().is_numeric() {
        let values = column.numeric_values();
        if !values.is_empty() {
            summary.insert("min".to_string(), json!(fold_min(&values)));
            summary.insert("max".to_string(), json!(fold_max(&values)));
            summary.insert("mean".to_string(), json!(mean(&values)));
            summary.insert("median".to_string(), json!(median(&values)));
            summary.insert("std".to_string(), json!(std_dev(&values)));
        }
    } else if column.kind() != ColumnType::Datetime {
        summary.insert("top_values".to_string(), json!(top_values(column.values())));
    }
    Some(summary)
}

fn fold_min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

fn fold_max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn top_values(values: &[Value]) -> Vec<String> {
    let mut counts: indexmap::IndexMap<String, usize> = indexmap::IndexMap::new();
    for value in values {
        if let Some(text) = value.as_str() {
            *counts.entry(text.to_string()).or_insert(0) += 1;
        }
    }
    let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries
        .into_iter()
        .take(TOP_VALUES)
        .map(|(value, _)| value)
        .collect()
}

fn title_case(name: &str) -> String {
    name.split(['_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
