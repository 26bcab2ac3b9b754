use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use hmac::{Hmac, Mac};
use rusqlite::Connection;
use sha2::Sha256;
use uuid::Uuid;

use crate::db::queries;
use crate::models::AdminRole;

type HmacSha256 = Hmac<Sha256>;

const HASH_ROUNDS: usize = 10_000;

fn mac(key: &[u8]) -> anyhow::Result<HmacSha256> {
    HmacSha256::new_from_slice(key).map_err(|e| anyhow::anyhow!("invalid hmac key: {e}"))
}

fn derive(password: &str, salt: &str) -> anyhow::Result<Vec<u8>> {
    let mut digest = salt.as_bytes().to_vec();
    for _ in 0..HASH_ROUNDS {
        let mut m = mac(password.as_bytes())?;
        m.update(&digest);
        digest = m.finalize().into_bytes().to_vec();
    }
    Ok(digest)
}

/// `<salt>$<base64 digest>`, salt being 32 random hex chars.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = Uuid::new_v4().simple().to_string();
    let digest = derive(password, &salt)?;
    Ok(format!("{salt}${}", STANDARD.encode(digest)))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, encoded)) = stored.split_once('$') else {
        return false;
    };
    let Ok(expected) = STANDARD.decode(encoded) else {
        return false;
    };
    let Ok(digest) = derive(password, salt) else {
        return false;
    };
    // Compare through the MAC so the check is constant-time.
    let Ok(mut m) = mac(salt.as_bytes()) else {
        return false;
    };
    m.update(&digest);
    let tag = m.finalize().into_bytes();
    let Ok(mut check) = mac(salt.as_bytes()) else {
        return false;
    };
    check.update(&expected);
    check.verify_slice(&tag).is_ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub admin_id: String,
    pub expires_at: i64,
}

fn sign(secret: &str, payload: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut m = mac(secret.as_bytes())?;
    m.update(payload);
    Ok(m.finalize().into_bytes().to_vec())
}

/// Signed session token for an admin, valid until `expires_at` (unix seconds).
pub fn issue_token(secret: &str, admin_id: &str, expires_at: i64) -> anyhow::Result<String> {
    let payload = format!("{admin_id}:{expires_at}");
    let signature = sign(secret, payload.as_bytes())?;
    Ok(format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(payload.as_bytes()),
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Returns the claims of a well-signed token that has not expired at `now`.
pub fn verify_token(secret: &str, token: &str, now: i64) -> Option<SessionClaims> {
    let (payload_b64, signature_b64) = token.split_once('.')?;
    let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let signature = URL_SAFE_NO_PAD.decode(signature_b64).ok()?;

    let mut m = mac(secret.as_bytes()).ok()?;
    m.update(&payload);
    m.verify_slice(&signature).ok()?;

    let payload = String::from_utf8(payload).ok()?;
    let (admin_id, expiry) = payload.rsplit_once(':')?;
    let expires_at: i64 = expiry.parse().ok()?;
    if expires_at <= now || admin_id.is_empty() {
        return None;
    }
    Some(SessionClaims {
        admin_id: admin_id.to_string(),
        expires_at,
    })
}

/// Creates the start-up admin account unless that email already exists.
pub fn ensure_admin(conn: &Connection, email: &str, password: &str) -> anyhow::Result<bool> {
    if queries::get_admin_by_email(conn, email)?.is_some() {
        return Ok(false);
    }
    let hash = hash_password(password)?;
    let admin = queries::insert_admin(conn, email, &hash, AdminRole::Superadmin)?;
    tracing::info!(email = %admin.email, "bootstrap admin created");
    Ok(true)
}
