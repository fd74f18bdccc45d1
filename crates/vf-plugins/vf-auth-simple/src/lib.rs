//! # vf-auth-simple
//!
//! Argon2-based implementation of `AuthProvider`.
//! Handles password hashing and stateless, HMAC-signed bearer tokens of the
//! form `<user-uuid>.<expiry-unix>.<signature>`.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;
use vf_core::traits::AuthProvider;

type HmacSha256 = Hmac<Sha256>;

pub struct SimpleAuthProvider {
    /// Keyed once with the session secret, cloned per signature
    signer: HmacSha256,
    token_ttl: Duration,
}

impl SimpleAuthProvider {
    /// Accepts the session secret (e.g., from an environment variable) and
    /// the lifetime of issued tokens.
    pub fn new(session_secret: &str, token_ttl: Duration) -> anyhow::Result<Self> {
        if session_secret.is_empty() {
            anyhow::bail!("session secret must not be empty");
        }
        let signer = HmacSha256::new_from_slice(session_secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid session secret: {e}"))?;
        Ok(Self { signer, token_ttl })
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = self.signer.clone();
        mac.update(payload.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

/// Hashes with Argon2id defaults and a fresh 16-byte salt.
fn hash_blocking(password: &str) -> anyhow::Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| anyhow::anyhow!("failed to gather salt: {e}"))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| anyhow::anyhow!("failed to encode salt: {e}"))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

fn verify_blocking(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(p) => p,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Argon2 runs on the blocking pool so request workers keep serving.
#[async_trait]
impl AuthProvider for SimpleAuthProvider {
    async fn hash_password(&self, password: &str) -> anyhow::Result<String> {
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hash_blocking(&password))
            .await
            .map_err(|e| anyhow::anyhow!("password hashing task failed: {e}"))?
    }

    async fn verify_password(&self, password: &str, hash: &str) -> bool {
        let (password, hash) = (password.to_owned(), hash.to_owned());
        match tokio::task::spawn_blocking(move || verify_blocking(&password, &hash)).await {
            Ok(verified) => verified,
            Err(error) => {
                tracing::error!(error = %error, "password verification task failed");
                false
            }
        }
    }

    fn issue_token(&self, user_id: Uuid, now: DateTime<Utc>) -> String {
        let expires = (now + self.token_ttl).timestamp();
        let payload = format!("{user_id}.{expires}");
        let signature = self.sign(&payload);
        format!("{payload}.{signature}")
    }

    fn verify_token(&self, token: &str, now: DateTime<Utc>) -> Option<Uuid> {
        let mut parts = token.trim().splitn(3, '.');
        let (user, expires, signature) = (parts.next()?, parts.next()?, parts.next()?);

        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let mut mac = self.signer.clone();
        mac.update(format!("{user}.{expires}").as_bytes());
        if mac.verify_slice(&signature).is_err() {
            tracing::debug!("rejected token with bad signature");
            return None;
        }

        let expires: i64 = expires.parse().ok()?;
        if expires <= now.timestamp() {
            return None;
        }
        Uuid::parse_str(user).ok()
    }
}
