use crate::domain::auth::{AuthError, Identity, IdentityResolver, ProviderIdentity};
use crate::infrastructure::db::DbPool;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::sync::Arc;

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: Option<String>,
    pub oauth_provider: String,
    pub oauth_provider_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct UserRepository {
    pool: Arc<DbPool>,
}

impl UserRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Insert on first sign-in, otherwise refresh the email. Concurrent first sign-ins
    /// for the same external account converge on one row.
    pub async fn upsert_oauth_user(
        &self,
        provider: &str,
        provider_id: &str,
        email: Option<&str>,
    ) -> Result<UserRow, sqlx::Error> {
        sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (email, oauth_provider, oauth_provider_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (oauth_provider, oauth_provider_id)
            DO UPDATE SET email = COALESCE(EXCLUDED.email, users.email), updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(provider)
        .bind(provider_id)
        .fetch_one(self.pool.as_ref())
        .await
    }
}

#[async_trait::async_trait]
impl IdentityResolver for UserRepository {
    async fn find_or_create(&self, external: &ProviderIdentity) -> Result<Identity, AuthError> {
        let user = self
            .upsert_oauth_user(&external.provider, &external.subject, external.email.as_deref())
            .await
            .map_err(|e| AuthError::IdentityResolution(e.to_string()))?;

        Ok(Identity(user.id))
    }
}
