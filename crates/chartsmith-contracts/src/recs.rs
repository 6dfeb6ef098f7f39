use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The external service's structured-but-untyped response: a top-level
/// object whose `visualizations` array holds exactly three proposals once
/// validated. Kept as a generic map on purpose — the typed [`ChartSpec`]
/// is only ever built by the harmonizer, never by direct deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecommendation(pub Map<String, Value>);

impl RawRecommendation {
    pub fn analysis(&self) -> Option<&str> {
        self.0.get("analysis").and_then(Value::as_str)
    }

    pub fn proposals(&self) -> &[Value] {
        self.0
            .get("visualizations")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Internal chart kinds. Unrecognized reported kinds survive as `Other`
/// and are rejected by the renderer rather than silently guessed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Scatter,
    Bar,
    Line,
    Histogram,
    Box,
    Heatmap,
    #[serde(untagged)]
    Other(String),
}

impl ChartKind {
    /// Maps a reported kind name onto the internal enumeration. Internal
    /// names map to themselves, so the mapping is idempotent.
    pub fn from_reported(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "scatter_plot" | "scatter" => ChartKind::Scatter,
            "bar_chart" | "bar" => ChartKind::Bar,
            "line_chart" | "line" => ChartKind::Line,
            "histogram" => ChartKind::Histogram,
            "box_plot" | "box" => ChartKind::Box,
            "heatmap" => ChartKind::Heatmap,
            other => ChartKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ChartKind::Scatter => "scatter",
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Histogram => "histogram",
            ChartKind::Box => "box",
            ChartKind::Heatmap => "heatmap",
            ChartKind::Other(name) => name,
        }
    }
}

/// Fully resolved description of one chart. Every field reference present
/// is guaranteed by the harmonizer to name an existing dataset column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub description: String,
    pub rationale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_field: Option<String>,
    /// Bar charts only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar_mode: Option<String>,
    /// Histograms only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin_count: Option<u32>,
}
