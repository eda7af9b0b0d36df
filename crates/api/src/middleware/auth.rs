//! Identity extractors: [`AuthUser`] for any signed-in caller and
//! [`RequireAdmin`] for the admin-only endpoints.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use storyforge_core::error::CoreError;
use storyforge_core::roles::ROLE_ADMIN;
use storyforge_core::types::DbId;

use crate::auth::jwt::{validate_token, JwtConfig};
use crate::error::AppError;
use crate::state::AppState;

fn unauthorized(message: &str) -> AppError {
    AppError::Core(CoreError::Unauthorized(message.into()))
}

/// The caller identified by an access token.
///
/// Handlers take it as an argument; requests without a valid
/// `Authorization: Bearer <token>` header are rejected with 401.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
    /// Role carried in the token; a role change applies at the next login.
    pub role: String,
}

impl AuthUser {
    /// Resolve an access token into a caller; expired or tampered tokens give 401.
    pub fn from_token(token: &str, jwt: &JwtConfig) -> Result<Self, AppError> {
        let claims =
            validate_token(token, jwt).map_err(|_| unauthorized("Invalid or expired token"))?;
        Ok(Self {
            user_id: claims.sub,
            role: claims.role,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("Missing Authorization header"))?
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("Invalid Authorization format. Expected: Bearer <token>"))?;

        Self::from_token(token, &state.config.jwt)
    }
}

/// An authenticated caller holding the admin role; anyone else gets 403.
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Core(CoreError::Forbidden(
                "Admin role required".into(),
            )));
        }
        Ok(RequireAdmin(user))
    }
}
