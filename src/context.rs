//! Application context (component Q): the single place that wires
//! `Settings`, repositories, and the OCR/LLM/conversion adapters into the
//! handles the rest of the application borrows from.
//!
//! An explicit, `Clone`-able value threaded through handlers and workers,
//! built once at startup rather than reached via a module-level singleton.

use std::sync::Arc;

use crate::auth::AuthContext;
use crate::config::Settings;
use crate::converter::{DocumentConverter, ExternalConverter, FakeConverter};
use crate::credit::{CreditGate, NoopCreditGate};
use crate::intake::DocumentIntake;
use crate::llm::{HttpProviderClient, LlmOrchestrator, ProviderClient};
use crate::ocr::{CloudOcrAdapter, InMemoryOcrAdapter, OcrAdapter};
use crate::repository::Repositories;

/// Everything a handler or worker needs, grouped behind cheap `Clone`
/// (every field is itself an `Arc` or a `Clone`-cheap repository handle).
#[derive(Clone)]
pub struct PipelineContext {
    pub settings: Arc<Settings>,
    pub repos: Repositories,
    pub intake: Arc<DocumentIntake>,
    pub orchestrator: Arc<LlmOrchestrator>,
    pub ocr_adapter: Arc<dyn OcrAdapter>,
    pub auth: Arc<AuthContext>,
}

impl PipelineContext {
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let db = crate::mongo::connect(&settings).await?;
        let repos = Repositories::new(&db);

        repos.providers.seed(&settings).await?;

        let converter: Arc<dyn DocumentConverter> = if settings.use_fake_backends {
            Arc::new(FakeConverter)
        } else {
            Arc::new(ExternalConverter::new(settings.converter_lock_path.clone().into()))
        };

        let ocr_adapter: Arc<dyn OcrAdapter> = if settings.use_fake_backends {
            Arc::new(InMemoryOcrAdapter)
        } else {
            Arc::new(CloudOcrAdapter::new(
                settings.ocr_base_url.clone(),
                settings.ocr_api_key.clone().unwrap_or_default(),
                settings.ocr_upload_bucket.clone(),
            ))
        };

        let provider_client: Arc<dyn ProviderClient> = Arc::new(HttpProviderClient::new(settings.llm_base_url.clone()));
        let credit_gate: Arc<dyn CreditGate> = Arc::new(NoopCreditGate);

        let aws_credentials = match (&settings.aws_access_key_id, &settings.aws_secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Some(crate::llm::AwsCredentials {
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
            }),
            _ => None,
        };

        let orchestrator = LlmOrchestrator::new(
            repos.documents.clone(),
            repos.organizations.clone(),
            repos.prompts_schemas.clone(),
            repos.providers.clone(),
            repos.results.clone(),
            provider_client,
            credit_gate,
            settings.nextauth_secret.clone(),
            aws_credentials,
        );

        let intake = DocumentIntake::new(repos.clone(), converter);
        let auth = AuthContext::new(repos.clone(), settings.nextauth_secret.clone());

        Ok(Self {
            settings: Arc::new(settings),
            repos,
            intake: Arc::new(intake),
            orchestrator: Arc::new(orchestrator),
            ocr_adapter,
            auth: Arc::new(auth),
        })
    }
}
