use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::jwt::JwtKeys;
use crate::{error::ApiError, state::AppState, users::repo::User};

/// The authenticated caller.
///
/// Extraction verifies the bearer token and records the request as user
/// activity (`last_activity = now`, `is_online = true`), so handlers see the
/// refreshed row and never touch presence themselves.
pub struct AuthUser(pub User);

/// Token from `Authorization: Bearer <t>`, a bare `Authorization: <t>`, or
/// `X-API-TOKEN: <t>`.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let raw = parts
        .headers
        .get(AUTHORIZATION)
        .or_else(|| parts.headers.get("x-api-token"))
        .and_then(|h| h.to_str().ok())?;
    let token = raw
        .strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .unwrap_or(raw)
        .trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::unauthenticated("No se proporcionó token de API"))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|e| {
            warn!(error = %e, "rejected api token");
            ApiError::unauthenticated("Token de API inválido o expirado")
        })?;

        let user = User::touch(&state.db, claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthenticated("Usuario no autenticado"))?;

        Ok(AuthUser(user))
    }
}
