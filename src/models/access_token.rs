//! Access token model and context inference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

/// Auth context inferred from the URL path prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenContext {
    /// `/v0/account/...`
    Account,
    /// `/v0/orgs/{id}/...`
    Organization,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub id: Id,
    pub user_id: Id,
    /// `None` for account-level tokens.
    pub organization_id: Option<Id>,
    pub name: String,
    /// Encrypted at rest.
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub lifetime: Option<chrono::Duration>,
}

impl AccessToken {
    pub fn plaintext_prefix(&self) -> &'static str {
        if self.organization_id.is_some() {
            "org_"
        } else {
            "acc_"
        }
    }

    /// Whether this token may be used in the given context.
    pub fn usable_in(&self, context: TokenContext, path_org_id: Option<&str>) -> bool {
        match context {
            TokenContext::Account => self.organization_id.is_none(),
            TokenContext::Organization => {
                self.organization_id.as_deref() == path_org_id
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(org: Option<&str>) -> AccessToken {
        AccessToken {
            id: "tok".into(),
            user_id: "user".into(),
            organization_id: org.map(str::to_string),
            name: "test".into(),
            token: "encrypted".into(),
            created_at: Utc::now(),
            lifetime: None,
        }
    }

    #[test]
    fn account_token_rejected_in_org_context() {
        let t = token(None);
        assert!(t.usable_in(TokenContext::Account, None));
        assert!(!t.usable_in(TokenContext::Organization, Some("org1")));
    }

    #[test]
    fn org_token_requires_matching_org() {
        let t = token(Some("org1"));
        assert!(!t.usable_in(TokenContext::Account, None));
        assert!(t.usable_in(TokenContext::Organization, Some("org1")));
        assert!(!t.usable_in(TokenContext::Organization, Some("org2")));
    }

    #[test]
    fn prefixes() {
        assert_eq!(token(None).plaintext_prefix(), "acc_");
        assert_eq!(token(Some("org1")).plaintext_prefix(), "org_");
    }
}
