// 🔑 Bearer tokens and authentication endpoints
// Tokens are HS256 JWTs carrying the caller's account id, role and person id.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    Json,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{error::ApiError, run_blocking, AppState};
use crate::access::Caller;
use crate::accounts::{AccountSummary, ClientRegistration};
use crate::config::{DEFAULT_JWT_EXPIRY_SECONDS, DEV_JWT_SECRET};
use crate::error::{DomainError, Result};
use crate::model::{Account, AccountId, PersonId, Role};

/// Payload stored in the token
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub subject_id: AccountId,
    pub role: Role,
    pub person_id: Option<PersonId>,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Signs and verifies bearer tokens
#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
    expiry_seconds: u64,
}

impl TokenIssuer {
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self> {
        if secret.len() < 32 {
            return Err(DomainError::Internal(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        Ok(TokenIssuer {
            secret,
            expiry_seconds,
        })
    }

    pub fn new_dev() -> Self {
        TokenIssuer {
            secret: DEV_JWT_SECRET.to_string(),
            expiry_seconds: DEFAULT_JWT_EXPIRY_SECONDS,
        }
    }

    pub fn issue(&self, account: &Account) -> Result<String> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;

        let claims = Claims {
            subject_id: account.id,
            role: account.role,
            person_id: account.person_id,
            iat: now,
            exp: now + self.expiry_seconds,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| DomainError::Internal(format!("Failed to sign token: {e}")))
    }

    /// Signature and expiry are checked; the claims become the [`Caller`].
    pub fn verify(&self, token: &str) -> Result<Caller> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| DomainError::Unauthorized(format!("Invalid token: {e}")))?;

        Ok(Caller {
            subject_id: data.claims.subject_id,
            role: data.claims.role,
            person_id: data.claims.person_id,
        })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> std::result::Result<Self, ApiError> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?
            .to_str()
            .map_err(|_| ApiError::unauthorized("Invalid Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Expected a Bearer token"))?;

        Ok(state.tokens.verify(token)?)
    }
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> std::result::Result<Json<LoginResponse>, ApiError> {
    let Json(request) = body?;

    let accounts = state.accounts.clone();
    let account = run_blocking(move || accounts.authenticate(&request.email, &request.password)).await?;

    info!("Account {} logged in", account.id);
    Ok(Json(LoginResponse {
        token: state.tokens.issue(&account)?,
    }))
}

/// POST /auth/register-client (ADMIN)
pub async fn register_client(
    State(state): State<AppState>,
    caller: Caller,
    body: std::result::Result<Json<ClientRegistration>, JsonRejection>,
) -> std::result::Result<(StatusCode, Json<AccountSummary>), ApiError> {
    let Json(registration) = body?;

    let accounts = state.accounts.clone();
    let summary = run_blocking(move || accounts.register_client(&caller, &registration)).await?;

    Ok((StatusCode::CREATED, Json(summary)))
}
