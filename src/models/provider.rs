//! LLM provider and model catalog entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Capability/cost metadata for a single model offered by a provider.
/// Seeded at boot per §4.E/§9 ("explicit registry seeded at boot with
/// (model, mode, costs, schema-support) triples").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    /// `"chat"` for chat-completion models; other modes (embeddings, etc.)
    /// are never chat models regardless of the deny-list below.
    pub mode: String,
    pub input_cost_per_token: f64,
    pub output_cost_per_token: f64,
    pub max_input_tokens: u64,
    pub max_output_tokens: u64,
    pub supports_structured_output: bool,
    /// Solver-Processing-Unit cost per page for this model.
    pub spu_cost_per_page: u64,
}

impl ModelInfo {
    pub fn has_cost_information(&self) -> bool {
        self.max_input_tokens > 0
            && self.max_output_tokens > 0
            && self.input_cost_per_token > 0.0
            && self.output_cost_per_token > 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProvider {
    pub name: String,
    pub display_name: String,
    pub litellm_provider: String,
    pub litellm_models_available: Vec<String>,
    pub litellm_models_enabled: Vec<String>,
    pub enabled: bool,
    /// Encrypted at rest; `None` until a token has been set.
    pub token: Option<String>,
    pub token_created_at: Option<DateTime<Utc>>,
}

impl LlmProvider {
    /// Bedrock-family providers need AWS credentials passed separately
    /// rather than (or in addition to) the stored provider token (§4.G
    /// step 5).
    pub fn is_bedrock_family(&self) -> bool {
        self.litellm_provider == "bedrock" || self.name.starts_with("bedrock")
    }
}
