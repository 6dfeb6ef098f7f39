use serde::Serialize;

/// Cost per 1000 tokens in USD, by model. Anything unknown gets the
/// conservative default rate.
const PRICING: [(&str, f64); 4] = [
    ("llama-3.3-70b-versatile", 0.00027),
    ("llama-3.1-70b-versatile", 0.00027),
    ("mixtral-8x7b-32768", 0.00024),
    ("llama-3.1-8b-instant", 0.00005),
];

const DEFAULT_PRICE_PER_1K: f64 = 0.0003;

/// Rough token count: four characters per token.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() / 4) as u64
}

pub fn price_per_1k(model: &str) -> f64 {
    PRICING
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, price)| *price)
        .unwrap_or(DEFAULT_PRICE_PER_1K)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RequestUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub estimated_cost: f64,
}

/// Running estimate of token spend across a session. Counts are estimated
/// from text length, not reported by the provider, so treat totals as a
/// budgeting aid rather than billing truth.
#[derive(Debug, Clone, Serialize)]
pub struct TokenTracker {
    model: String,
    requests: u64,
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl TokenTracker {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            requests: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
        }
    }

    pub fn track_request(&mut self, prompt: &str, completion: &str) -> RequestUsage {
        let prompt_tokens = estimate_tokens(prompt);
        let completion_tokens = estimate_tokens(completion);
        self.requests += 1;
        self.prompt_tokens += prompt_tokens;
        self.completion_tokens += completion_tokens;

        let total_tokens = prompt_tokens + completion_tokens;
        RequestUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens,
            estimated_cost: self.cost_of(total_tokens),
        }
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn total_cost(&self) -> f64 {
        self.cost_of(self.total_tokens())
    }

    fn cost_of(&self, tokens: u64) -> f64 {
        tokens as f64 / 1000.0 * price_per_1k(&self.model)
    }
}
