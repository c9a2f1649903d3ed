//! Access control (component N): bearer token resolution, JWT session
//! tokens, and encrypted access tokens, scoped by URL path context.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::{AccessToken, Id, Organization, TokenContext, User};
use crate::repository::Repositories;

/// Claims embedded in a session JWT, signed with the process secret on
/// login and verified here on every request (§4.N).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: the user id.
    pub sub: Id,
    pub email: String,
    pub exp: i64,
}

/// Mints a session JWT for `user`, valid for `lifetime`.
pub fn issue_session_token(secret: &str, user: &User, lifetime: chrono::Duration) -> Result<String> {
    let claims = SessionClaims {
        sub: user.id.clone(),
        email: user.email.clone(),
        exp: (Utc::now() + lifetime).timestamp(),
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| PipelineError::Other(anyhow::anyhow!(e)))
}

fn decode_session_token(secret: &str, token: &str) -> Option<SessionClaims> {
    jsonwebtoken::decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(jsonwebtoken::Algorithm::HS256),
    )
    .ok()
    .map(|data| data.claims)
}

/// Infers the auth context from a request path: `/v0/account/...` is
/// account-scoped, `/v0/orgs/{id}/...` is organization-scoped bound to
/// `{id}` (§4.N).
pub fn infer_context(path: &str) -> (TokenContext, Option<Id>) {
    let mut segments = path.trim_start_matches('/').split('/');
    let _v0 = segments.next();
    match segments.next() {
        Some("orgs") => (TokenContext::Organization, segments.next().map(str::to_string)),
        _ => (TokenContext::Account, None),
    }
}

/// The authenticated principal for a request: the resolved user, and, if
/// resolved via an access token rather than a session JWT, the token record
/// itself (carrying its own scoping restrictions).
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub via_access_token: Option<AccessToken>,
}

pub struct AuthContext {
    repos: Repositories,
    secret: String,
}

impl AuthContext {
    pub fn new(repos: Repositories, secret: String) -> Self {
        Self { repos, secret }
    }

    /// Resolves a bearer token against the request path, trying a session
    /// JWT first and falling back to an encrypted access token lookup
    /// (§4.N). Enforces that account tokens are only usable in account
    /// context and org tokens only for their own organization, with session
    /// tokens usable in any context the user otherwise has access to.
    pub async fn authenticate(&self, bearer: &str, path: &str) -> Result<AuthenticatedUser> {
        let (context, path_org_id) = infer_context(path);

        if let Some(claims) = decode_session_token(&self.secret, bearer) {
            let user = self
                .repos
                .users
                .get(&claims.sub)
                .await?
                .ok_or(PipelineError::Unauthorized)?;
            return Ok(AuthenticatedUser { user, via_access_token: None });
        }

        let token = self
            .repos
            .access_tokens
            .find_by_plaintext(&self.secret, bearer)
            .await?
            .ok_or(PipelineError::Unauthorized)?;

        if !token.usable_in(context, path_org_id.as_deref()) {
            return Err(PipelineError::Forbidden(
                "access token is not usable in this context".to_string(),
            ));
        }

        let user = self
            .repos
            .users
            .get(&token.user_id)
            .await?
            .ok_or(PipelineError::Unauthorized)?;
        Ok(AuthenticatedUser { user, via_access_token: Some(token) })
    }

    /// Loads the organization named by the path and verifies `principal` is
    /// a member, for handlers mounted under `/v0/orgs/{organization_id}`.
    pub async fn require_org_member(&self, principal: &AuthenticatedUser, organization_id: &str) -> Result<Organization> {
        let org = self
            .repos
            .organizations
            .get(organization_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("organization {organization_id}")))?;
        if !org.is_member(&principal.user.id) {
            return Err(PipelineError::Forbidden(format!(
                "user {} is not a member of organization {organization_id}",
                principal.user.id
            )));
        }
        Ok(org)
    }

    /// Verifies `principal` is an admin of `organization_id`.
    pub async fn require_org_admin(&self, principal: &AuthenticatedUser, organization_id: &str) -> Result<Organization> {
        let org = self.require_org_member(principal, organization_id).await?;
        if !org.is_admin(&principal.user.id) {
            return Err(PipelineError::Forbidden(format!(
                "user {} is not an admin of organization {organization_id}",
                principal.user.id
            )));
        }
        Ok(org)
    }

    /// System-admin-only actions: enterprise organization creation and
    /// upgrades are restricted to system administrators (§4.M, §9).
    pub fn require_system_admin(&self, principal: &AuthenticatedUser) -> Result<()> {
        if !principal.user.is_system_admin {
            return Err(PipelineError::Forbidden(
                "this action requires system administrator privileges".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_inferred_from_path() {
        assert_eq!(infer_context("/v0/account/tokens").0, TokenContext::Account);
        let (ctx, org) = infer_context("/v0/orgs/org123/documents");
        assert_eq!(ctx, TokenContext::Organization);
        assert_eq!(org.as_deref(), Some("org123"));
    }

    #[test]
    fn session_token_round_trips() {
        let user = User {
            id: "u1".into(),
            email: "a@example.com".into(),
            name: "A".into(),
            is_system_admin: false,
            password_hash: "x".into(),
            created_at: Utc::now(),
        };
        let secret = "test-secret";
        let token = issue_session_token(secret, &user, chrono::Duration::hours(1)).unwrap();
        let claims = decode_session_token(secret, &token).unwrap();
        assert_eq!(claims.sub, "u1");
    }

    #[test]
    fn session_token_rejected_with_wrong_secret() {
        let user = User {
            id: "u1".into(),
            email: "a@example.com".into(),
            name: "A".into(),
            is_system_admin: false,
            password_hash: "x".into(),
            created_at: Utc::now(),
        };
        let token = issue_session_token("secret-a", &user, chrono::Duration::hours(1)).unwrap();
        assert!(decode_session_token("secret-b", &token).is_none());
    }
}
