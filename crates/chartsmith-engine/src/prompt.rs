use chartsmith_contracts::ColumnType;
use indexmap::IndexMap;

use crate::client::truncate_text;

/// The compact prompt keeps only this much of the sample preview.
const SAMPLE_PREVIEW_CHARS: usize = 200;

pub fn recommendation_prompt(
    question: &str,
    column_info: &IndexMap<String, ColumnType>,
    sample: &str,
    detailed: bool,
) -> String {
    if detailed {
        detailed_prompt(question, column_info, sample)
    } else {
        compact_prompt(question, column_info, sample)
    }
}

fn compact_prompt(
    question: &str,
    column_info: &IndexMap<String, ColumnType>,
    sample: &str,
) -> String {
    let columns: Vec<String> = column_info
        .iter()
        .map(|(name, kind)| format!("{name}({kind})"))
        .collect();
    let sample_preview = truncate_text(sample, SAMPLE_PREVIEW_CHARS);

    format!(
        r#"Data viz expert: analyze & recommend 3 visualizations.

PROBLEM: {question}

COLUMNS: {columns}

SAMPLE:
{sample_preview}

TASK: Return 3 different viz recommendations following best practices.

VIZ TYPES: scatter_plot, bar_chart, line_chart, histogram, box_plot, heatmap

OUTPUT (JSON only):
{{
  "analysis": "brief insight",
  "visualizations": [
    {{
      "viz_type": "scatter_plot|bar_chart|line_chart|histogram|box_plot|heatmap",
      "title": "clear title",
      "x_axis": "column_name",
      "y_axis": "column_name",
      "color": "column_name or null",
      "justification": "why this helps"
    }}
  ]
}}

Return 3 visualizations. JSON only, no markdown."#,
        columns = columns.join(", "),
    )
}

fn detailed_prompt(
    question: &str,
    column_info: &IndexMap<String, ColumnType>,
    sample: &str,
) -> String {
    let columns: Vec<String> = column_info
        .iter()
        .map(|(name, kind)| format!("- {name}: {kind}"))
        .collect();

    format!(
        r#"You are an expert data visualization consultant. Analyze the problem and recommend visualizations.

**User's Problem:**
{question}

**Dataset Columns:**
{columns}

**Sample Data (first rows):**
{sample}

**Your Task:**
1. Analyze what the user wants to discover
2. Recommend EXACTLY 3 different visualization approaches
3. Each visualization must follow data visualization best practices

**Output Format (JSON only, no other text):**
{{
  "analysis": "Brief analysis of the user's question",
  "visualizations": [
    {{
      "viz_type": "scatter_plot",
      "title": "Descriptive title",
      "x_axis": "column_name",
      "y_axis": "column_name",
      "color": "optional_column_name or null",
      "justification": "Why this visualization answers the question"
    }}
  ]
}}

**Available viz_types:** scatter_plot, bar_chart, line_chart, histogram, box_plot, heatmap

Respond ONLY with valid JSON, no markdown code blocks, no additional text."#,
        columns = columns.join("\n"),
    )
}
