//! LLM run orchestration (component G): `run_llm` and the batch entry
//! point used by the pipeline's LLM handler (§4.J).

use std::sync::Arc;

use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::instrument;

use crate::credit::{CreditGate, UsageKind, UsageRecord};
use crate::error::{PipelineError, Result};
use crate::models::{DEFAULT_MODEL, OCR_TEXT_SEPARATOR, SYSTEM_MESSAGE};
use crate::repository::{DocumentRegistry, OrganizationRepository, PromptSchemaStore, ProviderRegistry, ResultStore};

use super::client::{AwsCredentials, ChatRequest, ProviderClient};
use super::retry::RetryPolicy;

#[derive(Clone)]
pub struct LlmOrchestrator {
    documents: DocumentRegistry,
    organizations: OrganizationRepository,
    prompts_schemas: PromptSchemaStore,
    providers: ProviderRegistry,
    results: ResultStore,
    client: Arc<dyn ProviderClient>,
    credit_gate: Arc<dyn CreditGate>,
    retry_policy: RetryPolicy,
    nextauth_secret: String,
    aws_credentials: Option<AwsCredentials>,
}

impl LlmOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        documents: DocumentRegistry,
        organizations: OrganizationRepository,
        prompts_schemas: PromptSchemaStore,
        providers: ProviderRegistry,
        results: ResultStore,
        client: Arc<dyn ProviderClient>,
        credit_gate: Arc<dyn CreditGate>,
        nextauth_secret: String,
        aws_credentials: Option<AwsCredentials>,
    ) -> Self {
        Self {
            documents,
            organizations,
            prompts_schemas,
            providers,
            results,
            client,
            credit_gate,
            retry_policy: RetryPolicy::default(),
            nextauth_secret,
            aws_credentials,
        }
    }

    /// Runs a single prompt revision against a document's OCR text (§4.G).
    #[instrument(skip(self, ocr_text), fields(document_id, prompt_rev_id))]
    pub async fn run_llm(
        &self,
        organization_id: &str,
        document_id: &str,
        prompt_rev_id: &str,
        ocr_text: &str,
        pages: u64,
        llm_model: Option<String>,
        force: bool,
    ) -> Result<crate::models::LlmResult> {
        // Step 1: short-circuit on an existing result unless forced.
        if !force {
            if let Some(existing) = self.results.latest(document_id, prompt_rev_id).await? {
                return Ok(existing);
            }
        } else {
            self.results.delete_for_pair(document_id, prompt_rev_id).await?;
        }

        // Step 2: resolve document + organization.
        let document = self
            .documents
            .get(organization_id, document_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("document {document_id}")))?;
        if document.organization_id.is_empty() {
            return Err(PipelineError::ValidationFailed(
                "document is missing an organization_id".to_string(),
            ));
        }
        self.organizations
            .get(organization_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("organization {organization_id}")))?;

        let prompt = if prompt_rev_id == crate::models::DEFAULT_PROMPT_REV_ID {
            crate::models::PromptRevision::default_prompt(organization_id.to_string(), document.uploaded_by.clone())
        } else {
            self.prompts_schemas
                .get_prompt_revision(prompt_rev_id)
                .await?
                .ok_or_else(|| PipelineError::NotFound(format!("prompt revision {prompt_rev_id}")))?
        };

        // Step 3: choose model, with fallback to the default when the
        // resolved choice is not a supported chat model.
        let mut model = llm_model.unwrap_or_else(|| {
            if prompt.model.is_empty() { DEFAULT_MODEL.to_string() } else { prompt.model.clone() }
        });
        if !self.providers.is_chat_model(&model) || !self.providers.is_supported_model(&model) {
            model = DEFAULT_MODEL.to_string();
        }

        // Step 4: credit check.
        let spu_cost = self
            .providers
            .model_info(&model)
            .map(|m| m.spu_cost_per_page)
            .unwrap_or(1)
            * pages.max(1);
        if !self.credit_gate.check(organization_id, spu_cost).await {
            return Err(PipelineError::InsufficientCredits);
        }

        // Step 5: resolve provider token (and AWS credentials for Bedrock).
        let provider_name = self.provider_name_for_model(&model).await?;
        let provider = self
            .providers
            .get(&provider_name)
            .await?
            .ok_or_else(|| PipelineError::ProviderFatal(format!("provider {provider_name} not configured")))?;
        let api_key = self
            .providers
            .decrypted_token(&self.nextauth_secret, &provider_name)
            .await?
            .ok_or_else(|| PipelineError::ProviderFatal(format!("provider {provider_name} has no token")))?;
        let aws_credentials = if provider.is_bedrock_family() {
            self.aws_credentials()
        } else {
            None
        };

        // Step 6: assemble the prompt.
        let user_message = format!("{}{}{}", prompt.content, OCR_TEXT_SEPARATOR, ocr_text);

        // Step 7: response_format.
        let schema = self.prompts_schemas.resolve_bound_schema(&prompt).await?;
        let response_format = if prompt_rev_id == crate::models::DEFAULT_PROMPT_REV_ID {
            Some(crate::models::ResponseFormat::JsonObject)
        } else if self.providers.supports_structured_output(&model) {
            schema.as_ref().map(|s| s.response_format.clone())
        } else {
            None
        };

        // Step 8: call the provider with retries.
        let request = ChatRequest {
            model: model.clone(),
            system_message: SYSTEM_MESSAGE.to_string(),
            user_message,
            response_format,
            api_key,
            aws_credentials,
        };
        let client = self.client.clone();
        let response = self
            .retry_policy
            .run(move || {
                let client = client.clone();
                let request = request.clone();
                async move { client.chat(request).await }
            })
            .await?;

        let parsed: Value = serde_json::from_str(&response.content)
            .map_err(|e| PipelineError::ProviderFatal(format!("provider response was not valid JSON: {e}")))?;
        let mut result_map = parsed
            .as_object()
            .cloned()
            .ok_or_else(|| PipelineError::ProviderFatal("provider response was not a JSON object".to_string()))?;

        // Step 9: reorder keys to match the bound schema's declaration
        // order, appending unlisted keys in their original order.
        if let Some(schema) = &schema {
            if let crate::models::ResponseFormat::JsonSchema { json_schema } = &schema.response_format {
                result_map = reorder_keys(result_map, &json_schema.property_order());
            }
        }

        // Step 10: record usage.
        self.credit_gate
            .record(
                organization_id,
                spu_cost * UsageKind::Llm.multiplier(),
                UsageKind::Llm,
                UsageRecord {
                    provider: Some(provider_name),
                    model: Some(model),
                    prompt_tokens: Some(response.prompt_tokens),
                    completion_tokens: Some(response.completion_tokens),
                    total_tokens: Some(response.total_tokens),
                    cost: None,
                },
            )
            .await;

        // Step 11: persist.
        self.results
            .insert(document_id, prompt_rev_id, &prompt.prompt_id, prompt.prompt_version, result_map)
            .await
    }

    /// Runs `run_llm` once per prompt revision id, concurrently, isolating
    /// per-revision failures (§4.G).
    pub async fn run_llm_for_prompt_rev_ids(
        &self,
        organization_id: &str,
        document_id: &str,
        prompt_rev_ids: &[String],
        ocr_text: &str,
        pages: u64,
    ) -> Vec<(String, Result<crate::models::LlmResult>)> {
        let futures = prompt_rev_ids.iter().map(|prompt_rev_id| {
            let prompt_rev_id = prompt_rev_id.clone();
            async move {
                let outcome = self
                    .run_llm(organization_id, document_id, &prompt_rev_id, ocr_text, pages, None, false)
                    .await;
                (prompt_rev_id, outcome)
            }
        });
        join_all(futures).await
    }

    /// Maps a model name back to its owning provider via the catalog
    /// (§4.E). The provider's advertised-model list is the source of
    /// truth; this performs a linear scan since the catalog is small and
    /// rebuilt only at startup.
    async fn provider_name_for_model(&self, model: &str) -> Result<String> {
        for provider in self.providers.list().await? {
            if provider.litellm_models_enabled.iter().any(|m| m == model) {
                return Ok(provider.name);
            }
        }
        Err(PipelineError::ProviderFatal(format!("no enabled provider advertises model {model}")))
    }

    /// Passed separately from the provider token for Bedrock-family
    /// providers, which authenticate with AWS credentials rather than a
    /// bearer API key (§4.G step 5).
    fn aws_credentials(&self) -> Option<AwsCredentials> {
        self.aws_credentials.clone()
    }
}

/// Reorders a JSON object's top-level keys to match `order`, appending any
/// key not present in `order` in its original iteration order (§4.G step 9).
fn reorder_keys(original: Map<String, Value>, order: &[String]) -> Map<String, Value> {
    let mut reordered = Map::new();
    let mut remaining = original;

    for key in order {
        if let Some(value) = remaining.remove(key) {
            reordered.insert(key.clone(), value);
        }
    }
    for (key, value) in remaining {
        reordered.insert(key, value);
    }
    reordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reorder_keys_follows_schema_then_appends_unlisted() {
        let mut original = Map::new();
        original.insert("c".to_string(), json!(3));
        original.insert("a".to_string(), json!(1));
        original.insert("extra".to_string(), json!("unlisted"));
        original.insert("b".to_string(), json!(2));

        let reordered = reorder_keys(original, &["a".to_string(), "b".to_string(), "c".to_string()]);
        let keys: Vec<&String> = reordered.keys().collect();
        assert_eq!(keys, vec!["a", "b", "c", "extra"]);
    }
}
