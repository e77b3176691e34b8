use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use locals_types::api::Claims;
use locals_types::models::UserId;

use crate::auth::AppState;
use crate::error::ApiError;

/// Extract and validate the JWT from the Authorization header, then expose
/// its claims to the handler as an `Extension<Claims>`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(ApiError::unauthenticated)?;

    let claims = decode_token(&state.jwt_secret, token).map_err(|_| ApiError::unauthenticated())?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub fn create_token(
    secret: &str,
    ttl: chrono::Duration,
    user_id: UserId,
    username: &str,
) -> jsonwebtoken::errors::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn decode_token(secret: &str, token: &str) -> jsonwebtoken::errors::Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let token = create_token("secret", chrono::Duration::days(1), 42, "ada@example.com").unwrap();
        let claims = decode_token("secret", &token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.username, "ada@example.com");
    }

    #[test]
    fn wrong_secret_or_expired_is_rejected() {
        let token = create_token("secret", chrono::Duration::days(1), 1, "a@example.com").unwrap();
        assert!(decode_token("other", &token).is_err());

        let expired = create_token("secret", chrono::Duration::days(-1), 1, "a@example.com").unwrap();
        assert!(decode_token("secret", &expired).is_err());
    }
}
