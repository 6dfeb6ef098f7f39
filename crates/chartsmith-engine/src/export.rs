use std::fs;
use std::path::{Path, PathBuf};

use chartsmith_contracts::RecommendError;
use serde_json::Value;
use tracing::info;

use crate::render::RenderedChart;

const VEGA_CDN: &str = "https://cdn.jsdelivr.net/npm/vega@5";
const VEGA_LITE_CDN: &str = "https://cdn.jsdelivr.net/npm/vega-lite@5";
const VEGA_EMBED_CDN: &str = "https://cdn.jsdelivr.net/npm/vega-embed@6";

/// Where the viewer page loads the Vega runtime from. `Local` points at
/// script files sitting next to the exported page, for offline viewing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptSource {
    Cdn,
    Local,
}

impl ScriptSource {
    fn tags(&self) -> String {
        let sources = match self {
            ScriptSource::Cdn => [VEGA_CDN, VEGA_LITE_CDN, VEGA_EMBED_CDN],
            ScriptSource::Local => ["vega.min.js", "vega-lite.min.js", "vega-embed.min.js"],
        };
        sources
            .iter()
            .map(|src| format!("  <script src=\"{src}\"></script>"))
            .collect::<Vec<String>>()
            .join("\n")
    }
}

/// Writes rendered charts to disk as standalone HTML viewers or plain
/// Vega-Lite JSON documents. The output directory is created on demand.
pub struct Exporter {
    output_dir: PathBuf,
    scripts: ScriptSource,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            scripts: ScriptSource::Cdn,
        }
    }

    pub fn with_scripts(mut self, scripts: ScriptSource) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn export_html(&self, chart: &RenderedChart) -> Result<PathBuf, RecommendError> {
        let path = self.target_path(&chart.title, "html")?;
        let page = html_page(&chart.title, &chart.document, self.scripts);
        fs::write(&path, page)
            .map_err(|err| RecommendError::Export(format!("{}: {err}", path.display())))?;
        info!("exported {}", path.display());
        Ok(path)
    }

    pub fn export_json(&self, chart: &RenderedChart) -> Result<PathBuf, RecommendError> {
        let path = self.target_path(&chart.title, "json")?;
        self.write_json(&path, &chart.document)?;
        Ok(path)
    }

    /// Arbitrary JSON payload under a caller-chosen name, used for the
    /// specification manifest and dashboard documents.
    pub fn export_document(&self, name: &str, document: &Value) -> Result<PathBuf, RecommendError> {
        let path = self.target_path(name, "json")?;
        self.write_json(&path, document)?;
        Ok(path)
    }

    fn write_json(&self, path: &Path, document: &Value) -> Result<(), RecommendError> {
        let rendered = serde_json::to_string_pretty(document)
            .map_err(|err| RecommendError::Export(err.to_string()))?;
        fs::write(path, rendered)
            .map_err(|err| RecommendError::Export(format!("{}: {err}", path.display())))?;
        info!("exported {}", path.display());
        Ok(())
    }

    fn target_path(&self, title: &str, extension: &str) -> Result<PathBuf, RecommendError> {
        fs::create_dir_all(&self.output_dir).map_err(|err| {
            RecommendError::Export(format!("{}: {err}", self.output_dir.display()))
        })?;
        let stem = sanitize_filename(title);
        Ok(self.output_dir.join(format!("{stem}.{extension}")))
    }
}

/// Keeps titles usable as file names: path separators and whitespace
/// become underscores, everything else passes through.
pub fn sanitize_filename(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| {
            if c.is_whitespace() || c == '/' || c == '\\' {
                '_'
            } else {
                c
            }
        })
        .collect();
    if cleaned.is_empty() {
        "chart".to_string()
    } else {
        cleaned
    }
}

fn html_page(title: &str, document: &Value, scripts: ScriptSource) -> String {
    let spec_json = serde_json::to_string_pretty(document).unwrap_or_else(|_| "{}".to_string());
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{title}</title>
{script_tags}
  <style>
    body {{ font-family: sans-serif; margin: 2em; }}
    #vis {{ width: 100%; }}
  </style>
</head>
<body>
  <div id="vis"></div>
  <script>
    const spec = {spec_json};
    vegaEmbed('#vis', spec, {{actions: true}});
  </script>
</body>
</html>
"#,
        script_tags = scripts.tags(),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::render::RenderedChart;

    use super::{sanitize_filename, Exporter, ScriptSource};

    fn chart() -> RenderedChart {
        RenderedChart {
            title: "Price vs Size".to_string(),
            document: json!({"mark": "point"}),
        }
    }

    #[test]
    fn html_export_embeds_the_document() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let exporter = Exporter::new(temp.path().join("exports"));
        let path = exporter.export_html(&chart())?;

        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("Price_vs_Size.html"));
        let page = std::fs::read_to_string(&path)?;
        assert!(page.contains("vegaEmbed('#vis'"));
        assert!(page.contains("\"mark\": \"point\""));
        assert!(page.contains("cdn.jsdelivr.net/npm/vega-embed@6"));
        Ok(())
    }

    #[test]
    fn local_scripts_replace_cdn_urls() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let exporter = Exporter::new(temp.path()).with_scripts(ScriptSource::Local);
        let page = std::fs::read_to_string(exporter.export_html(&chart())?)?;
        assert!(page.contains("src=\"vega-embed.min.js\""));
        assert!(!page.contains("jsdelivr"));
        Ok(())
    }

    #[test]
    fn json_export_round_trips_the_document() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let exporter = Exporter::new(temp.path());
        let path = exporter.export_json(&chart())?;

        let parsed: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        assert_eq!(parsed, chart().document);
        Ok(())
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("Price vs Size"), "Price_vs_Size");
        assert_eq!(sanitize_filename("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_filename("  "), "chart");
    }

    #[test]
    fn named_documents_land_under_the_given_stem() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let exporter = Exporter::new(temp.path());
        let path = exporter.export_document("specs", &json!([1, 2, 3]))?;
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("specs.json"));
        Ok(())
    }
}
