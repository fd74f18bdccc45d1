use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;
use vf_core::models::Credentials;
use vf_core::traits::{AuditLog, CredentialRepo};

use crate::{blob_to_uuid, to_millis, unique_as_conflict, uuid_to_blob, SqliteForumRepo};

#[async_trait]
impl CredentialRepo for SqliteForumRepo {
    async fn create_credentials(
        &self,
        email: &str,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<Uuid> {
        let user_id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO credentials (user_id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(user_id))
        .bind(email)
        .bind(password_hash)
        .bind(to_millis(at))
        .execute(&self.pool)
        .await
        .map_err(unique_as_conflict("an account with this email already exists"))?;
        Ok(user_id)
    }

    async fn find_credentials(&self, email: &str) -> anyhow::Result<Option<Credentials>> {
        let row = sqlx::query("SELECT user_id, email, password_hash FROM credentials WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Credentials {
                user_id: blob_to_uuid(&row.try_get::<Vec<u8>, _>("user_id")?),
                email: row.try_get("email")?,
                password_hash: row.try_get("password_hash")?,
            })),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl AuditLog for SqliteForumRepo {
    async fn record(
        &self,
        actor: Option<Uuid>,
        action: &str,
        metadata: serde_json::Value,
        at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO audit_logs (user_id, action, metadata, created_at) VALUES (?, ?, ?, ?)")
            .bind(actor.map(uuid_to_blob))
            .bind(action)
            .bind(metadata.to_string())
            .bind(to_millis(at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
