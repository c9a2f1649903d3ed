//! Credit-gate hooks: pluggable pre-check and post-record for billable
//! work (component H). Default implementation allows everything and
//! records nothing, matching the distilled spec's "may be unset" framing
//! — a deployment wires its own billing backend behind the same trait.

use async_trait::async_trait;

/// Usage detail recorded after a successful billable operation.
#[derive(Debug, Clone, Default)]
pub struct UsageRecord {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    pub cost: Option<f64>,
}

/// Solver-Processing-Unit multiplier applied at the record site (§4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageKind {
    Llm,
    Monitoring,
}

impl UsageKind {
    pub fn multiplier(self) -> u64 {
        match self {
            UsageKind::Llm => 10,
            UsageKind::Monitoring => 1,
        }
    }
}

#[async_trait]
pub trait CreditGate: Send + Sync {
    /// Called before billable work; returning `false` aborts the
    /// operation with `insufficient-credits`.
    async fn check(&self, organization_id: &str, spus: u64) -> bool;

    /// Called after a successful billable operation.
    async fn record(&self, organization_id: &str, spus: u64, kind: UsageKind, usage: UsageRecord);
}

/// Allows all checks and records nothing.
#[derive(Debug, Clone, Default)]
pub struct NoopCreditGate;

#[async_trait]
impl CreditGate for NoopCreditGate {
    async fn check(&self, _organization_id: &str, _spus: u64) -> bool {
        true
    }

    async fn record(&self, _organization_id: &str, _spus: u64, _kind: UsageKind, _usage: UsageRecord) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_multiplier_is_tenx_monitoring() {
        assert_eq!(UsageKind::Llm.multiplier(), 10);
        assert_eq!(UsageKind::Monitoring.multiplier(), 1);
    }

    #[tokio::test]
    async fn noop_gate_always_allows() {
        let gate = NoopCreditGate;
        assert!(gate.check("org1", 1_000_000).await);
        gate.record("org1", 5, UsageKind::Llm, UsageRecord::default()).await;
    }
}
