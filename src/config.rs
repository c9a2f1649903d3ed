//! Process configuration.
//!
//! Layered as defaults, then a `.env` file (via `dotenvy`), then the
//! process environment, read into a typed struct with `serde` defaults for
//! every optional field.

use serde::{Deserialize, Serialize};

fn default_env_name() -> String {
    "dev".to_string()
}
fn default_n_workers() -> u32 {
    4
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_llm_base_url() -> String {
    "http://localhost:4000".to_string()
}
fn default_ocr_base_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_ocr_upload_bucket() -> String {
    "ocr-uploads".to_string()
}
fn default_converter_lock_path() -> String {
    "/tmp/docrouter-converter.lock".to_string()
}

/// Typed process settings, loaded once at startup and threaded through the
/// rest of the application as part of [`crate::PipelineContext`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Mongo connection string.
    pub mongodb_uri: String,
    /// Logical database name within the Mongo deployment.
    #[serde(default = "default_env_name")]
    pub env: String,
    /// Base URL used when building links back to the app (not otherwise
    /// used by the core pipeline).
    pub nextauth_url: Option<String>,
    /// HMAC/crypto secret: signs session JWTs and derives the AES key for
    /// provider-token encryption.
    pub nextauth_secret: String,
    /// Bootstrap administrator credentials; if both are present and no
    /// matching user exists, an admin user + individual organization are
    /// created idempotently at startup.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_s3_bucket_name: Option<String>,
    /// Per-provider API keys, keyed by provider name (`openai`,
    /// `anthropic`, ...). Seeded into the provider registry at startup if
    /// a provider's stored token is empty.
    pub provider_api_keys: std::collections::HashMap<String, String>,
    #[serde(default = "default_n_workers")]
    pub n_workers: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Base URL of the litellm-style gateway `HttpProviderClient` talks to.
    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,
    /// Base URL of the document-analysis OCR service.
    #[serde(default = "default_ocr_base_url")]
    pub ocr_base_url: String,
    pub ocr_api_key: Option<String>,
    #[serde(default = "default_ocr_upload_bucket")]
    pub ocr_upload_bucket: String,
    /// Path of the advisory lock file serializing external PDF conversion
    /// calls.
    #[serde(default = "default_converter_lock_path")]
    pub converter_lock_path: String,
    /// When true, use the in-memory fakes for OCR/LLM/conversion instead of
    /// live external services (local development, CI).
    #[serde(default)]
    pub use_fake_backends: bool,
}

impl Settings {
    /// Loads settings from `.env` (if present) then the process
    /// environment. Fails if a required variable is missing.
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let mongodb_uri = std::env::var("MONGODB_URI")
            .map_err(|_| anyhow::anyhow!("MONGODB_URI is required"))?;
        let nextauth_secret = std::env::var("NEXTAUTH_SECRET")
            .map_err(|_| anyhow::anyhow!("NEXTAUTH_SECRET is required"))?;

        let mut provider_api_keys = std::collections::HashMap::new();
        for (provider, env_var) in [
            ("openai", "OPENAI_API_KEY"),
            ("anthropic", "ANTHROPIC_API_KEY"),
            ("groq", "GROQ_API_KEY"),
            ("gemini", "GEMINI_API_KEY"),
            ("bedrock", "AWS_ACCESS_KEY_ID"),
        ] {
            if let Ok(value) = std::env::var(env_var) {
                if !value.is_empty() {
                    provider_api_keys.insert(provider.to_string(), value);
                }
            }
        }

        Ok(Self {
            mongodb_uri,
            env: std::env::var("ENV").unwrap_or_else(|_| default_env_name()),
            nextauth_url: std::env::var("NEXTAUTH_URL").ok(),
            nextauth_secret,
            admin_email: std::env::var("ADMIN_EMAIL").ok(),
            admin_password: std::env::var("ADMIN_PASSWORD").ok(),
            aws_access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
            aws_secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
            aws_s3_bucket_name: std::env::var("AWS_S3_BUCKET_NAME").ok(),
            provider_api_keys,
            n_workers: std::env::var("N_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_n_workers),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(default_log_level),
            llm_base_url: std::env::var("LLM_BASE_URL").unwrap_or_else(|_| default_llm_base_url()),
            ocr_base_url: std::env::var("OCR_BASE_URL").unwrap_or_else(|_| default_ocr_base_url()),
            ocr_api_key: std::env::var("OCR_API_KEY").ok(),
            ocr_upload_bucket: std::env::var("OCR_UPLOAD_BUCKET")
                .unwrap_or_else(|_| default_ocr_upload_bucket()),
            converter_lock_path: std::env::var("CONVERTER_LOCK_PATH")
                .unwrap_or_else(|_| default_converter_lock_path()),
            use_fake_backends: std::env::var("USE_FAKE_BACKENDS")
                .ok()
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_optional_fields_absent() {
        let settings = Settings {
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            env: default_env_name(),
            nextauth_url: None,
            nextauth_secret: "secret".to_string(),
            admin_email: None,
            admin_password: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_s3_bucket_name: None,
            provider_api_keys: Default::default(),
            n_workers: default_n_workers(),
            log_level: default_log_level(),
            llm_base_url: default_llm_base_url(),
            ocr_base_url: default_ocr_base_url(),
            ocr_api_key: None,
            ocr_upload_bucket: default_ocr_upload_bucket(),
            converter_lock_path: default_converter_lock_path(),
            use_fake_backends: false,
        };
        assert_eq!(settings.n_workers, 4);
        assert_eq!(settings.log_level, "info");
    }
}
