use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chartsmith_contracts::{ChartSpec, Dataset, ResultCache};
use chartsmith_engine::render::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use chartsmith_engine::{
    recommend_kpis, refine, synthesize_dashboard, Analyzer, ChatCompletionsClient, ClientConfig,
    Exporter, ScriptSource, TokenTracker, VegaLiteRenderer, DEFAULT_MODEL,
};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "chartsmith", version, about = "Problem-to-chart assistant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Recommend, render, and export charts for a question about a CSV.
    Analyze(AnalyzeArgs),
    /// Print the inferred structure of a CSV without calling the model.
    Profile(ProfileArgs),
    /// Re-render previously saved chart specifications.
    Export(ExportArgs),
    /// Delete every cached recommendation.
    ClearCache(ClearCacheArgs),
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    /// CSV file to analyze.
    #[arg(long)]
    data: PathBuf,
    /// The question the charts should answer.
    #[arg(long)]
    question: String,
    #[arg(long, default_value = "exports")]
    out: PathBuf,
    #[arg(long, default_value = "cache")]
    cache_dir: PathBuf,
    /// Skip the cache for this run entirely.
    #[arg(long)]
    no_cache: bool,
    /// Ignore any cached result and ask the model again.
    #[arg(long)]
    refresh: bool,
    /// Use the longer prompt with the full sample preview.
    #[arg(long)]
    detailed: bool,
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
    #[arg(long)]
    api_base: Option<String>,
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    width: u32,
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    height: u32,
    /// Reference Vega scripts next to the exported page instead of a CDN.
    #[arg(long)]
    local_scripts: bool,
    /// Also synthesize a dashboard document from the recommendations.
    #[arg(long)]
    dashboard: bool,
    /// Run a refinement pass over the chart at this index (0-based).
    #[arg(long)]
    refine: Option<usize>,
    /// Report estimated token usage and cost.
    #[arg(long)]
    track_tokens: bool,
}

#[derive(Debug, Parser)]
struct ProfileArgs {
    #[arg(long)]
    data: PathBuf,
    /// Include KPI suggestions grouped by theme.
    #[arg(long)]
    kpis: bool,
}

#[derive(Debug, Parser)]
struct ExportArgs {
    #[arg(long)]
    data: PathBuf,
    /// Manifest of chart specifications written by a previous analyze run.
    #[arg(long)]
    specs: PathBuf,
    #[arg(long, default_value = "exports")]
    out: PathBuf,
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    width: u32,
    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    height: u32,
    #[arg(long)]
    local_scripts: bool,
}

#[derive(Debug, Parser)]
struct ClearCacheArgs {
    #[arg(long, default_value = "cache")]
    cache_dir: PathBuf,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("chartsmith error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Analyze(args) => run_analyze(args),
        Command::Profile(args) => {
            run_profile(args)?;
            Ok(0)
        }
        Command::Export(args) => {
            run_export(args)?;
            Ok(0)
        }
        Command::ClearCache(args) => {
            let removed = ResultCache::new(args.cache_dir).clear();
            println!("removed {removed} cached entries");
            Ok(0)
        }
    }
}

fn run_analyze(args: AnalyzeArgs) -> Result<i32> {
    let api_key = env::var("GROQ_API_KEY")
        .context("GROQ_API_KEY is not set; export it before running analyze")?;
    let dataset = Dataset::from_csv_path(&args.data)
        .with_context(|| format!("failed to load {}", args.data.display()))?;

    let mut config = ClientConfig::new(api_key).with_model(&args.model);
    if let Some(api_base) = &args.api_base {
        config = config.with_api_base(api_base);
    }
    let client = ChatCompletionsClient::new(config);

    let mut tracker = args.track_tokens.then(|| TokenTracker::new(&args.model));
    let mut analyzer = Analyzer::new(client).with_detailed_prompt(args.detailed);
    if !args.no_cache {
        analyzer = analyzer.with_cache(ResultCache::new(&args.cache_dir));
    }

    let analysis = analyzer.analyze(&args.question, &dataset, args.refresh)?;
    if let Some(insight) = analysis.raw.analysis() {
        println!("Analysis: {insight}");
    }
    if analysis.from_cache {
        println!("(served from cache)");
    }
    if analysis.degraded {
        println!("The model response could not be mapped onto chart specifications.");
        return Ok(1);
    }

    let renderer = VegaLiteRenderer::new(args.width, args.height);
    let (charts, failures) = renderer.render_all(&dataset, &analysis.specs);

    let scripts = if args.local_scripts {
        ScriptSource::Local
    } else {
        ScriptSource::Cdn
    };
    let exporter = Exporter::new(&args.out).with_scripts(scripts);
    for chart in &charts {
        let path = exporter.export_html(chart)?;
        exporter.export_json(chart)?;
        println!("  {} -> {}", chart.title, path.display());
    }
    for (index, err) in &failures {
        let title = analysis
            .specs
            .get(*index)
            .map(|spec| spec.title.as_str())
            .unwrap_or("chart");
        eprintln!("  {title} skipped: {err}");
    }
    exporter.export_document("specs", &serde_json::to_value(&analysis.specs)?)?;

    for (index, spec) in analysis.specs.iter().enumerate() {
        println!("{}. {} [{}]", index + 1, spec.title, spec.kind.as_str());
        println!("   {}", spec.rationale);
    }

    if let Some(index) = args.refine {
        let spec = analysis
            .specs
            .get(index)
            .with_context(|| format!("no chart at index {index}"))?;
        let refined = refine(analyzer.provider(), &dataset, spec);
        exporter.export_document(
            &format!("refined_{index}"),
            &json!({"spec": refined.spec, "style": Value::Object(refined.style)}),
        )?;
        println!("Refined chart {index} ({}).", spec.title);
    }

    if args.dashboard {
        let dashboard =
            synthesize_dashboard(analyzer.provider(), &args.question, &dataset, &analysis.specs);
        exporter.export_document("dashboard", &Value::Object(dashboard))?;
        println!("Dashboard specification written.");
    }

    if let Some(tracker) = &mut tracker {
        // Counts are re-estimated from the texts we already hold; the
        // provider does not report usage through this path.
        let prompt_side = args.question.clone() + &dataset.sample_preview(3);
        let response_side = serde_json::to_string(&analysis.raw)?;
        let usage = tracker.track_request(&prompt_side, &response_side);
        println!(
            "Tokens: ~{} (est. ${:.6})",
            usage.total_tokens, usage.estimated_cost
        );
    }

    if charts.is_empty() && !analysis.specs.is_empty() {
        // Everything the model proposed failed to render.
        return Ok(1);
    }
    Ok(0)
}

fn run_profile(args: ProfileArgs) -> Result<()> {
    let dataset = Dataset::from_csv_path(&args.data)
        .with_context(|| format!("failed to load {}", args.data.display()))?;
    let stats = dataset.statistics();
    println!("{}", serde_json::to_string_pretty(&stats)?);
    println!();
    println!("Sample:");
    println!("{}", dataset.sample_preview(5));

    if args.kpis {
        println!();
        println!("Suggested KPIs:");
        for (section, items) in recommend_kpis(&dataset) {
            println!("  {section}:");
            for item in items {
                println!("    - {item}");
            }
        }
    }
    Ok(())
}

fn run_export(args: ExportArgs) -> Result<()> {
    let dataset = Dataset::from_csv_path(&args.data)
        .with_context(|| format!("failed to load {}", args.data.display()))?;
    let manifest = fs::read_to_string(&args.specs)
        .with_context(|| format!("failed to read {}", args.specs.display()))?;
    let specs: Vec<ChartSpec> = serde_json::from_str(&manifest)
        .with_context(|| format!("{} is not a chart manifest", args.specs.display()))?;
    if specs.is_empty() {
        bail!("{} contains no chart specifications", args.specs.display());
    }

    let renderer = VegaLiteRenderer::new(args.width, args.height);
    let (charts, failures) = renderer.render_all(&dataset, &specs);
    let scripts = if args.local_scripts {
        ScriptSource::Local
    } else {
        ScriptSource::Cdn
    };
    let exporter = Exporter::new(&args.out).with_scripts(scripts);
    for chart in &charts {
        let path = exporter.export_html(chart)?;
        println!("  {} -> {}", chart.title, path.display());
    }
    for (index, err) in &failures {
        let title = specs
            .get(*index)
            .map(|spec| spec.title.as_str())
            .unwrap_or("chart");
        eprintln!("  {title} skipped: {err}");
    }
    Ok(())
}
