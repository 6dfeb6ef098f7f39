use chartsmith_contracts::{CacheKey, ChartSpec, Dataset, RawRecommendation, RecommendError, ResultCache};
use tracing::{debug, info};

use crate::client::{
    complete_with_retry, TextCompletion, DEFAULT_MAX_RETRIES, DEFAULT_MAX_TOKENS,
    DEFAULT_TEMPERATURE,
};
use crate::harmonize::harmonize;
use crate::prompt::recommendation_prompt;
use crate::validate::validate_response;

pub const SAMPLE_ROWS: usize = 3;

/// Outcome of one analysis request. An empty `specs` list with `degraded`
/// set means harmonization was swallowed, not that the model proposed
/// nothing — callers can tell the two apart.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub raw: RawRecommendation,
    pub specs: Vec<ChartSpec>,
    pub from_cache: bool,
    pub degraded: bool,
}

/// Sequences one request: cache lookup → model call with retry →
/// validation → cache write → harmonization. Everything above the
/// harmonizer propagates; harmonization failures degrade to an empty list.
pub struct Analyzer<P> {
    provider: P,
    cache: Option<ResultCache>,
    temperature: f64,
    max_tokens: u32,
    max_retries: u32,
    detailed_prompt: bool,
}

impl<P: TextCompletion> Analyzer<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            cache: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_retries: DEFAULT_MAX_RETRIES,
            detailed_prompt: false,
        }
    }

    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_detailed_prompt(mut self, detailed: bool) -> Self {
        self.detailed_prompt = detailed;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn analyze(
        &self,
        question: &str,
        dataset: &Dataset,
        force_refresh: bool,
    ) -> Result<Analysis, RecommendError> {
        let key = CacheKey::derive(question, &dataset.signature());
        let columns = dataset.column_names();
        let numeric = dataset.numeric_columns();

        if !force_refresh {
            if let Some(cache) = &self.cache {
                if let Some(raw) = cache.lookup(&key) {
                    debug!(fingerprint = %key.fingerprint, "using cached recommendation");
                    return Ok(self.finish(raw, &columns, &numeric, true));
                }
            }
        }

        let prompt = recommendation_prompt(
            question,
            &dataset.column_info(),
            &dataset.sample_preview(SAMPLE_ROWS),
            self.detailed_prompt,
        );
        info!("requesting chart recommendations from model");
        let response = complete_with_retry(
            &self.provider,
            &prompt,
            self.temperature,
            self.max_tokens,
            self.max_retries,
        )?;
        let raw = validate_response(&response)?;

        // force_refresh skips the lookup only; the fresh result still
        // replaces whatever the cache held for this key.
        if let Some(cache) = &self.cache {
            cache.store(&key, &raw);
        }
        Ok(self.finish(raw, &columns, &numeric, false))
    }

    /// Removes every cached recommendation; returns how many were deleted.
    pub fn clear_cache(&self) -> usize {
        self.cache.as_ref().map(ResultCache::clear).unwrap_or(0)
    }

    fn finish(
        &self,
        raw: RawRecommendation,
        columns: &[String],
        numeric: &[String],
        from_cache: bool,
    ) -> Analysis {
        let harmonized = harmonize(&raw, columns, numeric);
        Analysis {
            raw,
            specs: harmonized.specs,
            from_cache,
            degraded: harmonized.degraded,
        }
    }
}
