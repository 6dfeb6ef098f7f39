pub mod analyzer;
pub mod client;
pub mod dashboard;
pub mod export;
pub mod harmonize;
pub mod prompt;
pub mod refine;
pub mod render;
pub mod tokens;
pub mod validate;

pub use analyzer::{Analysis, Analyzer};
pub use client::{
    complete_with_retry, ChatCompletionsClient, ClientConfig, TextCompletion, DEFAULT_MODEL,
};
pub use dashboard::{recommend_kpis, synthesize_dashboard};
pub use export::{Exporter, ScriptSource};
pub use harmonize::{harmonize, Harmonized};
pub use refine::{refine, RefinedSpec};
pub use render::{ChartRenderer, RenderedChart, VegaLiteRenderer};
pub use tokens::{estimate_tokens, TokenTracker};
pub use validate::validate_response;
