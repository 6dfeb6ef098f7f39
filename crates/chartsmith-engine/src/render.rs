use chartsmith_contracts::{ChartKind, ChartSpec, ColumnType, Dataset, RecommendError};
use serde_json::{json, Map, Value};
use tracing::warn;

pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 500;

const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";

/// A chart ready for export: a display title and a self-contained
/// Vega-Lite document with the data inlined.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChart {
    pub title: String,
    pub document: Value,
}

pub trait ChartRenderer {
    fn render(&self, dataset: &Dataset, spec: &ChartSpec) -> Result<RenderedChart, RecommendError>;
}

pub struct VegaLiteRenderer {
    width: u32,
    height: u32,
}

impl Default for VegaLiteRenderer {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl VegaLiteRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Renders every specification, collecting failures by position
    /// instead of aborting the batch on the first bad one.
    pub fn render_all(
        &self,
        dataset: &Dataset,
        specs: &[ChartSpec],
    ) -> (Vec<RenderedChart>, Vec<(usize, RecommendError)>) {
        let mut charts = Vec::new();
        let mut failures = Vec::new();
        for (index, spec) in specs.iter().enumerate() {
            match self.render(dataset, spec) {
                Ok(chart) => charts.push(chart),
                Err(err) => {
                    warn!("chart {index} ({}) failed to render: {err}", spec.title);
                    failures.push((index, err));
                }
            }
        }
        (charts, failures)
    }

    fn document(&self, spec: &ChartSpec, data: Vec<Value>, mark: Value, encoding: Value) -> Value {
        json!({
            "$schema": VEGA_LITE_SCHEMA,
            "title": spec.title,
            "description": spec.description,
            "width": self.width,
            "height": self.height,
            "data": {"values": data},
            "mark": mark,
            "encoding": encoding,
        })
    }
}

impl ChartRenderer for VegaLiteRenderer {
    fn render(&self, dataset: &Dataset, spec: &ChartSpec) -> Result<RenderedChart, RecommendError> {
        let document = match &spec.kind {
            ChartKind::Scatter => scatter(self, dataset, spec)?,
            ChartKind::Bar => bar(self, dataset, spec)?,
            ChartKind::Line => line(self, dataset, spec)?,
            ChartKind::Histogram => histogram(self, dataset, spec)?,
            ChartKind::Box => boxplot(self, dataset, spec)?,
            ChartKind::Heatmap => heatmap(self, dataset, spec)?,
            ChartKind::Other(name) => {
                return Err(RecommendError::Harmonization(format!(
                    "unsupported chart kind '{name}'"
                )))
            }
        };
        Ok(RenderedChart {
            title: spec.title.clone(),
            document,
        })
    }
}

fn scatter(
    renderer: &VegaLiteRenderer,
    dataset: &Dataset,
    spec: &ChartSpec,
) -> Result<Value, RecommendError> {
    let x = required_field(dataset, spec.x_field.as_deref(), "x")?;
    let y = required_field(dataset, spec.y_field.as_deref(), "y")?;
    let mut encoding = Map::new();
    encoding.insert("x".to_string(), field_channel(dataset, x));
    encoding.insert("y".to_string(), field_channel(dataset, y));
    if let Some(color) = optional_field(dataset, spec.color_field.as_deref())? {
        encoding.insert("color".to_string(), field_channel(dataset, color));
    }
    if let Some(size) = optional_field(dataset, spec.size_field.as_deref())? {
        encoding.insert("size".to_string(), field_channel(dataset, size));
    }
    Ok(renderer.document(
        spec,
        inline_data(dataset),
        json!({"type": "point", "filled": true}),
        Value::Object(encoding),
    ))
}

fn bar(
    renderer: &VegaLiteRenderer,
    dataset: &Dataset,
    spec: &ChartSpec,
) -> Result<Value, RecommendError> {
    let x = required_field(dataset, spec.x_field.as_deref(), "x")?;
    let y = required_field(dataset, spec.y_field.as_deref(), "y")?;
    let mut encoding = Map::new();
    encoding.insert("x".to_string(), field_channel(dataset, x));
    encoding.insert("y".to_string(), field_channel(dataset, y));
    if let Some(color) = optional_field(dataset, spec.color_field.as_deref())? {
        encoding.insert("color".to_string(), field_channel(dataset, color));
        // Grouped bars sit side by side; stacked bars are the Vega-Lite
        // default once color is set.
        if spec.bar_mode.as_deref() == Some("group") {
            encoding.insert("xOffset".to_string(), field_channel(dataset, color));
        }
    }
    Ok(renderer.document(
        spec,
        inline_data(dataset),
        json!("bar"),
        Value::Object(encoding),
    ))
}

fn line(
    renderer: &VegaLiteRenderer,
    dataset: &Dataset,
    spec: &ChartSpec,
) -> Result<Value, RecommendError> {
    let x = required_field(dataset, spec.x_field.as_deref(), "x")?;
    let y = required_field(dataset, spec.y_field.as_deref(), "y")?;
    let mut encoding = Map::new();
    encoding.insert("x".to_string(), field_channel(dataset, x));
    encoding.insert("y".to_string(), field_channel(dataset, y));
    if let Some(color) = optional_field(dataset, spec.color_field.as_deref())? {
        encoding.insert("color".to_string(), field_channel(dataset, color));
    }
    Ok(renderer.document(
        spec,
        inline_data(dataset),
        json!({"type": "line", "point": true}),
        Value::Object(encoding),
    ))
}

fn histogram(
    renderer: &VegaLiteRenderer,
    dataset: &Dataset,
    spec: &ChartSpec,
) -> Result<Value, RecommendError> {
    let x = required_field(dataset, spec.x_field.as_deref(), "x")?;
    let bins = spec.bin_count.unwrap_or(30);
    let mut encoding = Map::new();
    encoding.insert(
        "x".to_string(),
        json!({"field": x, "bin": {"maxbins": bins}, "type": "quantitative"}),
    );
    encoding.insert(
        "y".to_string(),
        json!({"aggregate": "count", "type": "quantitative"}),
    );
    if let Some(color) = optional_field(dataset, spec.color_field.as_deref())? {
        encoding.insert("color".to_string(), field_channel(dataset, color));
    }
    Ok(renderer.document(
        spec,
        inline_data(dataset),
        json!("bar"),
        Value::Object(encoding),
    ))
}

fn boxplot(
    renderer: &VegaLiteRenderer,
    dataset: &Dataset,
    spec: &ChartSpec,
) -> Result<Value, RecommendError> {
    let y = required_field(dataset, spec.y_field.as_deref(), "y")?;
    let mut encoding = Map::new();
    encoding.insert("y".to_string(), field_channel(dataset, y));
    if let Some(x) = optional_field(dataset, spec.x_field.as_deref())? {
        encoding.insert("x".to_string(), field_channel(dataset, x));
    }
    if let Some(color) = optional_field(dataset, spec.color_field.as_deref())? {
        encoding.insert("color".to_string(), field_channel(dataset, color));
    }
    Ok(renderer.document(
        spec,
        inline_data(dataset),
        json!({"type": "boxplot", "extent": "min-max"}),
        Value::Object(encoding),
    ))
}

/// Correlation heatmaps ignore the proposed axes: the matrix is computed
/// over every numeric column pair in-process and inlined as long-form
/// rows.
fn heatmap(
    renderer: &VegaLiteRenderer,
    dataset: &Dataset,
    spec: &ChartSpec,
) -> Result<Value, RecommendError> {
    let numeric = dataset.numeric_columns();
    if numeric.len() < 2 {
        return Err(RecommendError::Dataset(
            "correlation heatmap needs at least two numeric columns".to_string(),
        ));
    }

    let mut data = Vec::with_capacity(numeric.len() * numeric.len());
    for left in &numeric {
        for right in &numeric {
            let correlation = pearson(dataset, left, right);
            data.push(json!({
                "x": left,
                "y": right,
                "correlation": correlation,
            }));
        }
    }

    let encoding = json!({
        "x": {"field": "x", "type": "nominal", "title": null},
        "y": {"field": "y", "type": "nominal", "title": null},
        "color": {
            "field": "correlation",
            "type": "quantitative",
            "scale": {"scheme": "redblue", "domain": [-1, 1]},
        },
    });
    Ok(renderer.document(spec, data, json!("rect"), encoding))
}

/// Pearson correlation over rows where both cells are numeric. Degenerate
/// pairs (constant or empty columns) report zero rather than NaN.
fn pearson(dataset: &Dataset, left: &str, right: &str) -> f64 {
    let pairs = paired_values(dataset, left, right);
    let n = pairs.len() as f64;
    if pairs.is_empty() {
        return 0.0;
    }
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;
    let mut covariance = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        covariance += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }
    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }
    covariance / (var_x.sqrt() * var_y.sqrt())
}

fn paired_values(dataset: &Dataset, left: &str, right: &str) -> Vec<(f64, f64)> {
    let (Some(left), Some(right)) = (dataset.column(left), dataset.column(right)) else {
        return Vec::new();
    };
    left.values()
        .iter()
        .zip(right.values())
        .filter_map(|(x, y)| Some((x.as_f64()?, y.as_f64()?)))
        .collect()
}

fn inline_data(dataset: &Dataset) -> Vec<Value> {
    dataset.records().into_iter().map(Value::Object).collect()
}

fn required_field<'a>(
    dataset: &Dataset,
    field: Option<&'a str>,
    axis: &str,
) -> Result<&'a str, RecommendError> {
    let name = field.ok_or_else(|| {
        RecommendError::Harmonization(format!("chart is missing a required {axis} field"))
    })?;
    if dataset.column(name).is_none() {
        return Err(RecommendError::ColumnNotFound(name.to_string()));
    }
    Ok(name)
}

fn optional_field<'a>(
    dataset: &Dataset,
    field: Option<&'a str>,
) -> Result<Option<&'a str>, RecommendError> {
    match field {
        None => Ok(None),
        Some(name) if dataset.column(name).is_some() => Ok(Some(name)),
        Some(name) => Err(RecommendError::ColumnNotFound(name.to_string())),
    }
}

fn field_channel(dataset: &Dataset, name: &str) -> Value {
    let kind = dataset
        .column(name)
        .map(|column| column.kind())
        .unwrap_or(ColumnType::Text);
    json!({"field": name, "type": vega_type(kind)})
}

fn vega_type(kind: ColumnType) -> &'static str {
    match kind {
        ColumnType::Integer | ColumnType::Float => "quantitative",
        ColumnType::Datetime => "temporal",
        ColumnType::Boolean | ColumnType::Categorical | ColumnType::Text => "nominal",
    }
}

#[cfg(test)]
mod tests {
    use chartsmith_contracts::{ChartKind, ChartSpec, Dataset, RecommendError};
    use serde_json::json;

    use super::{pearson, ChartRenderer, VegaLiteRenderer};

    const HOUSING_CSV: &str = "price,size,location\n\
        100.0,50,Paris\n\
        200.0,100,Lyon\n\
        300.0,150,Paris\n\
        400.0,200,Lyon\n";

    fn dataset() -> anyhow::Result<Dataset> {
        Ok(Dataset::from_csv_bytes(HOUSING_CSV.as_bytes())?)
    }

    fn spec(kind: ChartKind) -> ChartSpec {
        ChartSpec {
            kind,
            title: "Test Chart".to_string(),
            description: "d".to_string(),
            rationale: "r".to_string(),
            x_field: Some("size".to_string()),
            y_field: Some("price".to_string()),
            color_field: None,
            size_field: None,
            bar_mode: None,
            bin_count: None,
        }
    }

    #[test]
    fn scatter_inlines_data_and_types_the_axes() -> anyhow::Result<()> {
        let renderer = VegaLiteRenderer::default();
        let chart = renderer.render(&dataset()?, &spec(ChartKind::Scatter))?;

        assert_eq!(chart.title, "Test Chart");
        assert_eq!(chart.document["encoding"]["x"]["field"], json!("size"));
        assert_eq!(
            chart.document["encoding"]["x"]["type"],
            json!("quantitative")
        );
        assert_eq!(
            chart.document["data"]["values"].as_array().map(Vec::len),
            Some(4)
        );
        Ok(())
    }

    #[test]
    fn grouped_bar_offsets_by_color() -> anyhow::Result<()> {
        let renderer = VegaLiteRenderer::default();
        let mut grouped = spec(ChartKind::Bar);
        grouped.x_field = Some("location".to_string());
        grouped.color_field = Some("location".to_string());
        grouped.bar_mode = Some("group".to_string());
        let chart = renderer.render(&dataset()?, &grouped)?;

        assert_eq!(
            chart.document["encoding"]["xOffset"]["field"],
            json!("location")
        );
        assert_eq!(
            chart.document["encoding"]["color"]["type"],
            json!("nominal")
        );
        Ok(())
    }

    #[test]
    fn histogram_bins_and_counts() -> anyhow::Result<()> {
        let renderer = VegaLiteRenderer::default();
        let mut hist = spec(ChartKind::Histogram);
        hist.x_field = Some("price".to_string());
        hist.bin_count = Some(20);
        let chart = renderer.render(&dataset()?, &hist)?;

        assert_eq!(
            chart.document["encoding"]["x"]["bin"]["maxbins"],
            json!(20)
        );
        assert_eq!(chart.document["encoding"]["y"]["aggregate"], json!("count"));
        Ok(())
    }

    #[test]
    fn heatmap_covers_every_numeric_pair() -> anyhow::Result<()> {
        let renderer = VegaLiteRenderer::default();
        let chart = renderer.render(&dataset()?, &spec(ChartKind::Heatmap))?;

        let values = chart.document["data"]["values"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        // price and size: a 2x2 matrix.
        assert_eq!(values.len(), 4);
        let diagonal = values
            .iter()
            .find(|cell| cell["x"] == cell["y"])
            .cloned()
            .unwrap_or_default();
        let correlation = diagonal["correlation"].as_f64().unwrap_or(0.0);
        assert!((correlation - 1.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn heatmap_rejects_datasets_without_numeric_pairs() -> anyhow::Result<()> {
        let text_only = Dataset::from_csv_bytes(b"city,country\nParis,France\nLyon,France\n")?;
        let renderer = VegaLiteRenderer::default();
        let result = renderer.render(&text_only, &spec(ChartKind::Heatmap));
        assert!(matches!(result, Err(RecommendError::Dataset(_))));
        Ok(())
    }

    #[test]
    fn dangling_field_reference_is_reported_by_name() -> anyhow::Result<()> {
        let renderer = VegaLiteRenderer::default();
        let mut bad = spec(ChartKind::Scatter);
        bad.y_field = Some("ghost".to_string());
        match renderer.render(&dataset()?, &bad) {
            Err(RecommendError::ColumnNotFound(name)) => assert_eq!(name, "ghost"),
            other => panic!("expected ColumnNotFound, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn pass_through_kind_is_rejected() -> anyhow::Result<()> {
        let renderer = VegaLiteRenderer::default();
        let result = renderer.render(&dataset()?, &spec(ChartKind::Other("violin".to_string())));
        let message = result.err().map(|err| err.to_string()).unwrap_or_default();
        assert!(message.contains("violin"));
        Ok(())
    }

    #[test]
    fn render_all_collects_failures_without_aborting() -> anyhow::Result<()> {
        let renderer = VegaLiteRenderer::default();
        let mut bad = spec(ChartKind::Scatter);
        bad.x_field = Some("ghost".to_string());
        let specs = vec![spec(ChartKind::Scatter), bad, spec(ChartKind::Line)];

        let (charts, failures) = renderer.render_all(&dataset()?, &specs);
        assert_eq!(charts.len(), 2);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, 1);
        Ok(())
    }

    #[test]
    fn perfectly_linear_columns_correlate_to_one() -> anyhow::Result<()> {
        let dataset = dataset()?;
        let correlation = pearson(&dataset, "price", "size");
        assert!((correlation - 1.0).abs() < 1e-9);
        Ok(())
    }
}
