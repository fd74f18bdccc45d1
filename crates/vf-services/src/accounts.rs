//! Email/password accounts and bearer sessions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use vf_core::error::{AppError, Result};
use vf_core::traits::{AuditLog, AuthProvider, CredentialRepo};

use crate::{conflict_or_internal, internal, record_audit};

pub const MIN_PASSWORD_CHARS: usize = 8;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: Uuid,
    pub token: String,
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("invalid credentials".into())
}

pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AppError::validation("a valid email address is required")),
    }
}

pub struct AccountService {
    credentials: Arc<dyn CredentialRepo>,
    auth: Arc<dyn AuthProvider>,
    audit: Arc<dyn AuditLog>,
}

impl AccountService {
    pub fn new(
        credentials: Arc<dyn CredentialRepo>,
        auth: Arc<dyn AuthProvider>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            credentials,
            auth,
            audit,
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str, now: DateTime<Utc>) -> Result<Session> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AppError::validation(format!(
                "password must have at least {MIN_PASSWORD_CHARS} characters"
            )));
        }

        let existing = self
            .credentials
            .find_credentials(&email)
            .await
            .map_err(internal("sign_up"))?;
        if existing.is_some() {
            return Err(AppError::Conflict("an account with this email already exists".into()));
        }

        let hash = self
            .auth
            .hash_password(password)
            .await
            .map_err(internal("hash_password"))?;
        let user_id = self
            .credentials
            .create_credentials(&email, &hash, now)
            .await
            .map_err(conflict_or_internal("sign_up"))?;

        record_audit(&self.audit, Some(user_id), "signed_up", serde_json::json!({}), now).await;
        tracing::info!(%user_id, "account created");
        Ok(Session {
            user_id,
            token: self.auth.issue_token(user_id, now),
        })
    }

    /// Unknown email and wrong password fail the same way.
    pub async fn sign_in(&self, email: &str, password: &str, now: DateTime<Utc>) -> Result<Session> {
        let email = normalize_email(email).map_err(|_| invalid_credentials())?;
        let credentials = self
            .credentials
            .find_credentials(&email)
            .await
            .map_err(internal("sign_in"))?
            .ok_or_else(invalid_credentials)?;

        if !self
            .auth
            .verify_password(password, &credentials.password_hash)
            .await
        {
            tracing::debug!(user_id = %credentials.user_id, "password mismatch");
            return Err(invalid_credentials());
        }

        Ok(Session {
            user_id: credentials.user_id,
            token: self.auth.issue_token(credentials.user_id, now),
        })
    }

    /// Resolves a bearer token to its user.
    pub fn authenticate(&self, token: &str, now: DateTime<Utc>) -> Result<Uuid> {
        self.auth
            .verify_token(token, now)
            .ok_or_else(|| AppError::Unauthorized("invalid or expired session".into()))
    }
}
