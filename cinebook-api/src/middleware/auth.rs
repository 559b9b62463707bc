use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

/// The caller resolved from a valid bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
}

pub fn decode_user(token: &str, secret: &str) -> Result<AuthUser, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::AuthenticationError(format!("Invalid token: {}", e)))?;

    Ok(AuthUser { user_id: token_data.claims.sub })
}

/// HS256 token for `user_id`, valid for `ttl_seconds`.
pub fn issue_token(user_id: Uuid, secret: &str, ttl_seconds: i64) -> Result<String, AppError> {
    let claims = Claims {
        sub: user_id,
        exp: (chrono::Utc::now() + chrono::Duration::seconds(ttl_seconds)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

pub async fn require_user(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;

    let user = decode_user(bearer.token(), &state.auth.secret)?;
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, "secret", 60).unwrap();
        assert_eq!(decode_user(&token, "secret").unwrap().user_id, user_id);
    }

    #[test]
    fn test_rejects_wrong_secret_and_expired() {
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, "secret", 60).unwrap();
        assert!(matches!(decode_user(&token, "other"), Err(AppError::AuthenticationError(_))));

        let expired = issue_token(user_id, "secret", -3600).unwrap();
        assert!(matches!(decode_user(&expired, "secret"), Err(AppError::AuthenticationError(_))));
    }
}
