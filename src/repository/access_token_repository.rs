//! Access token issuance and lookup (component N).

use bson::doc;
use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::{Collection, Database};

use crate::crypto;
use crate::error::{PipelineError, Result};
use crate::models::{new_id, AccessToken, Id};
use crate::mongo::collections;

#[derive(Clone)]
pub struct AccessTokenRepository {
    collection: Collection<AccessToken>,
}

impl AccessTokenRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(collections::ACCESS_TOKENS),
        }
    }

    /// Mints a new token, returning `(record, plaintext)`. The plaintext is
    /// shown to the caller exactly once; only the encrypted form is
    /// persisted (§4.N).
    pub async fn create(
        &self,
        secret: &str,
        user_id: &str,
        organization_id: Option<Id>,
        name: &str,
        lifetime: Option<chrono::Duration>,
    ) -> Result<(AccessToken, String)> {
        let prefix = if organization_id.is_some() { "org_" } else { "acc_" };
        let plaintext = format!("{prefix}{}", uuid::Uuid::new_v4().simple());
        let encrypted = crypto::encrypt(secret, &plaintext);

        let record = AccessToken {
            id: new_id(),
            user_id: user_id.to_string(),
            organization_id,
            name: name.to_string(),
            token: encrypted,
            created_at: Utc::now(),
            lifetime,
        };
        self.collection.insert_one(&record).await?;
        Ok((record, plaintext))
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<AccessToken>> {
        let cursor = self.collection.find(doc! { "user_id": user_id }).await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn revoke(&self, user_id: &str, token_id: &str) -> Result<()> {
        let result = self
            .collection
            .delete_one(doc! { "id": token_id, "user_id": user_id })
            .await?;
        if result.deleted_count == 0 {
            return Err(PipelineError::NotFound(format!("access token {token_id}")));
        }
        Ok(())
    }

    /// Resolves a bearer token presented by a caller back to its record by
    /// re-encrypting candidates and comparing ciphertext, since AES-CFB is
    /// deterministic for a fixed `(key, iv)` pair (§4.N).
    pub async fn find_by_plaintext(&self, secret: &str, plaintext: &str) -> Result<Option<AccessToken>> {
        let encrypted = crypto::encrypt(secret, plaintext);
        let token = self.collection.find_one(doc! { "token": encrypted }).await?;
        match token {
            Some(t) if t.is_expired() => Ok(None),
            other => Ok(other),
        }
    }
}

impl AccessToken {
    pub fn is_expired(&self) -> bool {
        match self.lifetime {
            Some(lifetime) => Utc::now() > self.created_at + lifetime,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_respects_lifetime() {
        let expired = AccessToken {
            id: "t".into(),
            user_id: "u".into(),
            organization_id: None,
            name: "test".into(),
            token: "ct".into(),
            created_at: Utc::now() - chrono::Duration::days(2),
            lifetime: Some(chrono::Duration::days(1)),
        };
        assert!(expired.is_expired());

        let fresh = AccessToken {
            lifetime: Some(chrono::Duration::days(30)),
            ..expired.clone()
        };
        assert!(!fresh.is_expired());
    }

    #[test]
    fn no_lifetime_never_expires() {
        let token = AccessToken {
            id: "t".into(),
            user_id: "u".into(),
            organization_id: None,
            name: "test".into(),
            token: "ct".into(),
            created_at: Utc::now() - chrono::Duration::days(3650),
            lifetime: None,
        };
        assert!(!token.is_expired());
    }
}
