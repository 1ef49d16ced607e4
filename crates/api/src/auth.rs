use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

pub const ADMIN_ROLE: &str = "admin";

/// Claims of a site owner's bearer token (HS256, signed with `JWT_SECRET`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminClaims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

impl FromRequestParts<AppState> for AdminClaims {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Unauthorized)?;

        let key = DecodingKey::from_secret(state.config().jwt_secret.as_bytes());
        let claims = decode::<AdminClaims>(bearer.token(), &key, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                tracing::debug!("Rejected bearer token: {e}");
                ApiError::Unauthorized
            })?
            .claims;

        if claims.role != ADMIN_ROLE {
            return Err(ApiError::Forbidden(format!(
                "role `{}` cannot administer the site",
                claims.role
            )));
        }
        Ok(claims)
    }
}
