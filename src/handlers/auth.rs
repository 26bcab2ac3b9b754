use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::AdminRole;
use crate::services::auth;
use crate::state::AppState;

/// Who is calling an admin endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdminIdentity {
    /// Holder of the static `ADMIN_TOKEN`.
    Operator,
    User {
        id: String,
        email: String,
        role: AdminRole,
    },
}

fn bearer(headers: &HeaderMap) -> &str {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or("")
}

/// Accepts either the operator token or a live session token for an
/// existing admin user.
pub fn check_auth(state: &AppState, headers: &HeaderMap) -> Result<AdminIdentity, AppError> {
    let token = bearer(headers);
    if token.is_empty() {
        return Err(AppError::Unauthorized);
    }
    if token == state.config.admin_token {
        return Ok(AdminIdentity::Operator);
    }

    let claims = auth::verify_token(&state.config.session_secret, token, Utc::now().timestamp())
        .ok_or(AppError::Unauthorized)?;
    let admin = {
        let conn = state.db()?;
        queries::get_admin(&conn, &claims.admin_id)?
    };
    match admin {
        Some(admin) => Ok(AdminIdentity::User {
            id: admin.id,
            email: admin.email,
            role: admin.role,
        }),
        None => Err(AppError::Unauthorized),
    }
}

// POST /api/admin/login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    token: String,
    expires_at: i64,
    email: String,
    role: AdminRole,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let admin = {
        let conn = state.db()?;
        queries::get_admin_by_email(&conn, &body.email)?
    };

    let Some(admin) = admin.filter(|a| auth::verify_password(&body.password, &a.password_hash))
    else {
        tracing::warn!(email = %body.email.trim(), "admin login rejected");
        return Err(AppError::Unauthorized);
    };

    let expires_at = Utc::now().timestamp() + state.config.session_ttl_hours * 3600;
    let token = auth::issue_token(&state.config.session_secret, &admin.id, expires_at)?;
    tracing::info!(email = %admin.email, "admin logged in");

    Ok(Json(LoginResponse {
        token,
        expires_at,
        email: admin.email,
        role: admin.role,
    }))
}

// GET /api/admin/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AdminIdentity>, AppError> {
    Ok(Json(check_auth(&state, &headers)?))
}
