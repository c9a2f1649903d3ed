//! LLM provider/model catalog registry (component E).

use std::collections::HashMap;

use bson::doc;
use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::{Collection, Database};

use crate::config::Settings;
use crate::crypto;
use crate::error::Result;
use crate::models::{LlmProvider, ModelInfo};
use crate::mongo::collections;

/// The canonical provider list seeded and reconciled at boot (§4.E, §9).
/// Mirrors the shape `litellm`-style catalogs use: provider name, the
/// models it currently advertises, and which of those this deployment
/// allow-lists.
fn canonical_providers() -> Vec<(&'static str, &'static str, &'static [&'static str])> {
    vec![
        ("openai", "openai", &["gpt-4o", "gpt-4o-mini", "gpt-4.1", "gpt-4.1-mini", "o3-mini"]),
        ("anthropic", "anthropic", &["claude-3-5-sonnet-latest", "claude-3-5-haiku-latest", "claude-3-opus-latest"]),
        ("groq", "groq", &["llama-3.3-70b-versatile", "llama-3.1-8b-instant"]),
        ("gemini", "gemini", &["gemini-1.5-pro", "gemini-1.5-flash"]),
        ("bedrock", "bedrock", &["anthropic.claude-3-5-sonnet-20241022-v2:0"]),
    ]
}

/// Model catalog entries consulted for capability checks (§4.E). A real
/// deployment would source this from a pricing service; here it is an
/// explicit registry seeded at boot, exactly as the distilled spec's
/// "explicit registry seeded at boot with (model, mode, costs,
/// schema-support) triples" design note prescribes.
fn model_catalog() -> HashMap<&'static str, ModelInfo> {
    let mut m = HashMap::new();
    let entries = [
        ("gpt-4o", 128_000u64, 16_384u64, 0.0000025, 0.00001, true, 3u64),
        ("gpt-4o-mini", 128_000, 16_384, 0.00000015, 0.0000006, true, 1),
        ("gpt-4.1", 1_047_576, 32_768, 0.000002, 0.000008, true, 3),
        ("gpt-4.1-mini", 1_047_576, 32_768, 0.0000004, 0.0000016, true, 1),
        ("o3-mini", 200_000, 100_000, 0.0000011, 0.0000044, false, 2),
        ("claude-3-5-sonnet-latest", 200_000, 8_192, 0.000003, 0.000015, true, 3),
        ("claude-3-5-haiku-latest", 200_000, 8_192, 0.0000008, 0.000004, true, 1),
        ("claude-3-opus-latest", 200_000, 4_096, 0.000015, 0.000075, true, 5),
        ("llama-3.3-70b-versatile", 128_000, 32_768, 0.00000059, 0.00000079, false, 1),
        ("llama-3.1-8b-instant", 128_000, 8_192, 0.00000005, 0.00000008, false, 1),
        ("gemini-1.5-pro", 2_097_152, 8_192, 0.00000125, 0.000005, true, 2),
        ("gemini-1.5-flash", 1_048_576, 8_192, 0.000000075, 0.0000003, true, 1),
        ("anthropic.claude-3-5-sonnet-20241022-v2:0", 200_000, 8_192, 0.000003, 0.000015, true, 3),
    ];
    for (name, max_in, max_out, cost_in, cost_out, structured, spu) in entries {
        m.insert(
            name,
            ModelInfo {
                name: name.to_string(),
                mode: "chat".to_string(),
                input_cost_per_token: cost_in,
                output_cost_per_token: cost_out,
                max_input_tokens: max_in,
                max_output_tokens: max_out,
                supports_structured_output: structured,
                spu_cost_per_page: spu,
            },
        );
    }
    m
}

/// Models that look like chat models by name but are known not to be
/// (§4.E `is_chat_model` deny-list).
const CHAT_MODEL_DENY_LIST: &[&str] = &["gpt-4o-mini-realtime-preview", "text-embedding-3-large"];

/// Models maintained as "supported" independent of the live catalog
/// (§4.E `is_supported_model`).
fn supported_models() -> Vec<&'static str> {
    model_catalog().keys().copied().collect()
}

#[derive(Clone)]
pub struct ProviderRegistry {
    collection: Collection<LlmProvider>,
    catalog: HashMap<String, ModelInfo>,
}

impl ProviderRegistry {
    pub fn new(db: &Database) -> Self {
        let catalog = model_catalog()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Self {
            collection: db.collection(collections::LLM_PROVIDERS),
            catalog,
        }
    }

    /// Seeds/reconciles the provider registry at startup (§4.E):
    /// - inserts providers missing from storage
    /// - removes providers not in the canonical list
    /// - intersects `litellm_models_enabled` with currently advertised models
    /// - re-adds the default model if it fell out of the enabled set
    /// - adopts an environment-supplied token when none is stored
    pub async fn seed(&self, settings: &Settings) -> Result<()> {
        let canonical = canonical_providers();
        let canonical_names: Vec<&str> = canonical.iter().map(|(name, ..)| *name).collect();

        self.collection
            .delete_many(doc! { "name": { "$nin": canonical_names.clone() } })
            .await?;

        for (name, litellm_provider, available) in canonical {
            let available: Vec<String> = available.iter().map(|s| s.to_string()).collect();
            let existing = self.collection.find_one(doc! { "name": name }).await?;

            let mut provider = existing.unwrap_or(LlmProvider {
                name: name.to_string(),
                display_name: name.to_string(),
                litellm_provider: litellm_provider.to_string(),
                litellm_models_available: available.clone(),
                litellm_models_enabled: available.clone(),
                enabled: false,
                token: None,
                token_created_at: None,
            });

            provider.litellm_models_available = available.clone();
            provider
                .litellm_models_enabled
                .retain(|m| available.contains(m));

            if !provider.litellm_models_enabled.contains(&crate::models::DEFAULT_MODEL.to_string())
                && available.contains(&crate::models::DEFAULT_MODEL.to_string())
            {
                provider.litellm_models_enabled.push(crate::models::DEFAULT_MODEL.to_string());
            }

            if provider.token.is_none() {
                if let Some(api_key) = settings.provider_api_keys.get(name) {
                    provider.token = Some(crypto::encrypt(&settings.nextauth_secret, api_key));
                    provider.token_created_at = Some(Utc::now());
                    provider.enabled = true;
                }
            }

            self.collection
                .replace_one(doc! { "name": name }, &provider)
                .upsert(true)
                .await?;
        }
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<LlmProvider>> {
        let cursor = self.collection.find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn get(&self, name: &str) -> Result<Option<LlmProvider>> {
        Ok(self.collection.find_one(doc! { "name": name }).await?)
    }

    pub async fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        self.collection
            .update_one(doc! { "name": name }, doc! { "$set": { "enabled": enabled } })
            .await?;
        Ok(())
    }

    pub async fn set_token(&self, secret: &str, name: &str, plaintext_token: &str) -> Result<()> {
        let encrypted = crypto::encrypt(secret, plaintext_token);
        self.collection
            .update_one(
                doc! { "name": name },
                doc! { "$set": { "token": encrypted, "token_created_at": bson::to_bson(&Utc::now())? } },
            )
            .await?;
        Ok(())
    }

    pub async fn decrypted_token(&self, secret: &str, name: &str) -> Result<Option<String>> {
        let Some(provider) = self.get(name).await? else {
            return Ok(None);
        };
        match provider.token {
            Some(ct) => Ok(Some(crypto::decrypt(secret, &ct)?)),
            None => Ok(None),
        }
    }

    pub fn is_chat_model(&self, model: &str) -> bool {
        if CHAT_MODEL_DENY_LIST.contains(&model) {
            return false;
        }
        self.catalog.get(model).map(|m| m.mode == "chat").unwrap_or(false)
    }

    pub fn has_cost_information(&self, model: &str) -> bool {
        self.catalog
            .get(model)
            .map(ModelInfo::has_cost_information)
            .unwrap_or(false)
    }

    pub fn is_supported_model(&self, model: &str) -> bool {
        supported_models().contains(&model) && self.has_cost_information(model)
    }

    pub fn model_info(&self, model: &str) -> Option<&ModelInfo> {
        self.catalog.get(model)
    }

    pub fn supports_structured_output(&self, model: &str) -> bool {
        self.catalog
            .get(model)
            .map(|m| m.supports_structured_output)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_has_cost_information() {
        let catalog = model_catalog();
        assert!(catalog[crate::models::DEFAULT_MODEL].has_cost_information());
    }

    #[test]
    fn deny_listed_models_are_never_chat_models() {
        assert!(CHAT_MODEL_DENY_LIST.contains(&"text-embedding-3-large"));
    }
}
