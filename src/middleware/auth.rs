use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{Uri, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use crate::{dto::auth::Claims, error::AppError, state::AppState};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, "admin")
}

pub fn decode_token(token: &str, secret: &str) -> Option<AuthUser> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;
    let user_id = Uuid::parse_str(&decoded.claims.sub).ok()?;
    Some(AuthUser {
        user_id,
        role: decoded.claims.role,
    })
}

/// Path and query the client asked for. Nested routers strip their prefix
/// from `parts.uri`, so the router-recorded original URI wins.
fn requested_path(parts: &Parts) -> String {
    let uri: &Uri = parts
        .extensions
        .get::<OriginalUri>()
        .map(|original| &original.0)
        .unwrap_or(&parts.uri);
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::trim)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user =
            bearer_token(parts).and_then(|token| decode_token(token, &state.auth.jwt_secret));
        match user {
            Some(user) => Ok(user),
            None => {
                let next = requested_path(parts);
                tracing::debug!(next = %next, "unauthenticated request, redirecting to login");
                Err(AppError::Unauthenticated { next })
            }
        }
    }
}
