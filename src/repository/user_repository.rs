//! User accounts and bootstrap-admin provisioning (component N).

use bson::doc;
use chrono::Utc;
use mongodb::{Collection, Database};

use crate::error::{PipelineError, Result};
use crate::models::{new_id, User};
use crate::mongo::collections;

#[derive(Clone)]
pub struct UserRepository {
    collection: Collection<User>,
}

impl UserRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(collections::USERS),
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<User>> {
        Ok(self.collection.find_one(doc! { "id": id }).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.collection.find_one(doc! { "email": email }).await?)
    }

    pub async fn create(&self, email: &str, name: &str, password_hash: String, is_system_admin: bool) -> Result<User> {
        if self.find_by_email(email).await?.is_some() {
            return Err(PipelineError::Conflict(format!("user with email {email} already exists")));
        }
        let user = User {
            id: new_id(),
            email: email.to_string(),
            name: name.to_string(),
            is_system_admin,
            password_hash,
            created_at: Utc::now(),
        };
        self.collection.insert_one(&user).await?;
        Ok(user)
    }

    /// Idempotent bootstrap: finds or creates the admin user named by
    /// `ADMIN_EMAIL`/`ADMIN_PASSWORD`, hashing the password with bcrypt
    /// (§4.Q).
    pub async fn ensure_bootstrap_admin(&self, email: &str, password: &str) -> Result<User> {
        if let Some(existing) = self.find_by_email(email).await? {
            return Ok(existing);
        }
        let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
        self.create(email, "Administrator", hash, true).await
    }

    pub fn verify_password(user: &User, password: &str) -> Result<bool> {
        Ok(bcrypt::verify(password, &user.password_hash)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trips_through_bcrypt() {
        let hash = bcrypt::hash("hunter2", bcrypt::DEFAULT_COST).unwrap();
        let user = User {
            id: "u1".into(),
            email: "a@example.com".into(),
            name: "A".into(),
            is_system_admin: false,
            password_hash: hash,
            created_at: Utc::now(),
        };
        assert!(UserRepository::verify_password(&user, "hunter2").unwrap());
        assert!(!UserRepository::verify_password(&user, "wrong").unwrap());
    }
}
