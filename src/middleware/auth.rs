use crate::models::auth::{AuthUser, Claims, ErrorResponse};
use crate::AppState;
use axum::{
    extract::{Extension, Request},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{Json, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;

type AuthRejection = (StatusCode, Json<ErrorResponse>);

fn unauthorized(message: &str) -> AuthRejection {
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(message)))
}

/// Mints an HS256 bearer token for `user_id`, valid for `ttl`.
pub fn issue_token(
    user_id: i32,
    username: &str,
    secret: &str,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        exp: (now + ttl).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

pub async fn auth_middleware(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let auth_str = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| unauthorized("Invalid Authorization header format"))?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("Invalid Authorization header format. Expected 'Bearer <token>'"))?;

    let claims = verify_token(token, &state.jwt_secret).map_err(|e| {
        tracing::warn!("JWT verification failed: {}", e);
        unauthorized("Invalid or expired token")
    })?;

    let user = AuthUser::try_from(claims).map_err(|_| unauthorized("Invalid token subject"))?;

    // Handlers read the caller identity from request extensions
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_token_verifies_with_same_secret() {
        let token = issue_token(42, "ada", "s3cret", Duration::hours(1)).unwrap();
        let claims = verify_token(&token, "s3cret").unwrap();

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.username, "ada");
        assert!(claims.exp > claims.iat);
        assert_eq!(AuthUser::try_from(claims).unwrap().id, 42);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = issue_token(42, "ada", "s3cret", Duration::hours(1)).unwrap();
        assert!(verify_token(&token, "other").is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let token = issue_token(42, "ada", "s3cret", Duration::hours(-2)).unwrap();
        assert!(verify_token(&token, "s3cret").is_err());
    }
}
