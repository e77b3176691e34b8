use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::FixedOffset;
use tracing::{error, info, warn};

use locals_db::Database;
use locals_db::models::NewUser;
use locals_types::api::{
    AuthResponse, EmailExistsResponse, EmailQuery, LoginRequest, MessageResponse, OAuthLoginRequest,
    OAuthLoginResponse, RegisterRequest,
};
use locals_types::models::{AuthProvider, UserId};

use crate::db_call;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::middleware::create_token;
use crate::oauth::OAuthVerifier;
use crate::uploads::BlobStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub oauth: Arc<dyn OAuthVerifier>,
    pub blobs: BlobStore,
    /// Every new account is allowed to DM this user.
    pub owner_user_id: Option<UserId>,
    /// Zone in which a bare date filter names a calendar day.
    pub utc_offset: FixedOffset,
}

const MIN_PASSWORD_LEN: usize = 8;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = normalize_email(&req.username)?;
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))?
        .to_string();

    let first_name = req.first_name.unwrap_or_default();
    let last_name = req.last_name.unwrap_or_default();
    let (is_host, is_traveler) = (req.is_host, req.is_traveler);
    let name = username.clone();
    let user_id = db_call(&state, move |db| {
        db.create_user(&NewUser {
            username: &name,
            password_hash: Some(&password_hash),
            first_name: &first_name,
            last_name: &last_name,
            is_traveler,
            is_host,
            auth_provider: AuthProvider::Local,
        })
    })
    .await?;

    info!("User {} registered as {}", user_id, username);
    link_to_owner(&state, user_id).await;

    let token = issue_token(&state, user_id, &username)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User created successfully".into(),
            user_id,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invalid = || ApiError::Unauthenticated("Invalid username or password".into());

    let username = req.username.trim().to_lowercase();
    let user = db_call(&state, move |db| db.get_user_by_username(&username))
        .await?
        .ok_or_else(invalid)?;

    // OAuth-only accounts have no password to check
    let stored = user.password.as_deref().ok_or_else(invalid)?;
    let parsed_hash = PasswordHash::new(stored)
        .map_err(|e| ApiError::Internal(format!("stored hash for user {} unreadable: {e}", user.id)))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| invalid())?;

    let token = issue_token(&state, user.id, &user.username)?;
    Ok(Json(AuthResponse {
        message: "User authenticated successfully".into(),
        user_id: user.id,
        token,
    }))
}

pub async fn exists_by_email(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EmailQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let email = query.email.trim().to_lowercase();
    let user = db_call(&state, move |db| db.get_user_by_email(&email)).await?;

    Ok(Json(EmailExistsResponse {
        exists: user.is_some(),
        auth_provider: user.map(|u| u.auth_provider),
    }))
}

/// Signs in (or up) with a provider token. An email registered through a
/// different provider is a conflict.
pub async fn oauth_login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<OAuthLoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let provider: AuthProvider = req
        .provider
        .parse()
        .map_err(|e: locals_types::models::UnknownProvider| ApiError::validation(e.to_string()))?;
    if provider == AuthProvider::Local {
        return Err(ApiError::validation("Use /user/authenticate for password sign-in"));
    }

    let identity = state.oauth.verify(provider, &req.token).await.map_err(|e| {
        warn!("{} token verification failed: {}", provider, e);
        ApiError::from(e)
    })?;
    let email = normalize_email(&identity.email)?;

    let first_name = identity.first_name.unwrap_or_default();
    let last_name = identity.last_name.unwrap_or_default();
    let (user, created) = db_call(&state, move |db| {
        db.find_or_create_oauth_user(&email, provider, &first_name, &last_name)
    })
    .await?;

    if created {
        link_to_owner(&state, user.id).await;
    }

    let token = issue_token(&state, user.id, &user.username)?;
    Ok(Json(OAuthLoginResponse {
        message: if created {
            "User created successfully".into()
        } else {
            "User authenticated successfully".into()
        },
        user_id: user.id,
        token,
        created,
    }))
}

/// POST /user/logout: tokens are stateless, so there is nothing to revoke;
/// the client drops its token.
pub async fn logout() -> impl IntoResponse {
    Json(MessageResponse {
        message: "User logged out successfully".into(),
    })
}

fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    let valid = email.len() <= 254
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid {
        return Err(ApiError::validation("Username must be a valid email address"));
    }
    Ok(email)
}

fn issue_token(state: &AppState, user_id: UserId, username: &str) -> Result<String, ApiError> {
    create_token(&state.jwt_secret, state.token_ttl, user_id, username)
        .map_err(|e| ApiError::Internal(format!("token encoding failed: {e}")))
}

/// Lets a new account message the configured owner. Never fails the signup.
async fn link_to_owner(state: &AppState, user_id: UserId) {
    let Some(owner) = state.owner_user_id else {
        return;
    };
    if owner == user_id {
        return;
    }

    match db_call(state, move |db| db.grant_dm(owner, user_id)).await {
        Ok(_) => info!("User {} linked to owner {}", user_id, owner),
        Err(e) => error!("Failed to link user {} to owner {}: {}", user_id, owner, e),
    }
}
