use thiserror::Error;

/// Failure taxonomy for the recommendation pipeline.
///
/// Network and validator errors are fatal to the current request and
/// surface to the caller verbatim. Harmonization and cache failures are
/// absorbed where they occur and only logged. `ColumnNotFound` is fatal to
/// the single chart being rendered, never to its siblings.
#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("text generation request failed: {0}")]
    Network(String),

    #[error("failed to parse model response as JSON: {detail}\n\nresponse was:\n{raw}")]
    MalformedResponse { detail: String, raw: String },

    #[error("response missing '{0}' field")]
    MissingField(&'static str),

    #[error("expected 3 visualizations, got {0}")]
    WrongCount(usize),

    #[error("visualization {index} missing fields: {names:?}")]
    MissingFields { index: usize, names: Vec<String> },

    #[error("failed to harmonize recommendation: {0}")]
    Harmonization(String),

    #[error("column '{0}' not found in dataset")]
    ColumnNotFound(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("export failed: {0}")]
    Export(String),
}
