use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    database::Database,
    error::AppError,
    models::{User, USER_SELECT},
    state::AppState,
    utils::{auth::is_expired, verify_token},
};

pub const AUTH_COOKIE: &str = "auth_token";

const MISSING_TOKEN: &str = "Authorization header not provided or not in the correct format.";
const EXPIRED_TOKEN: &str = "Token has expired.";
const INVALID_TOKEN: &str = "Invalid token.";
const UNKNOWN_USER: &str = "User not found.";
const INACTIVE_USER: &str = "Your account is inactive. Please contact support.";

/// The authenticated caller, loaded fresh from the users table on every request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub fullname: String,
    pub is_admin: bool,
    pub user: User,
}

impl CurrentUser {
    fn from_user(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            fullname: user.fullname.clone(),
            is_admin: user.is_admin || user.is_admin_role(),
            user,
        }
    }
}

/// Like `CurrentUser`, but rejects anyone who is not an administrator.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

/// `Authorization: Bearer <token>` first, then the `auth_token` cookie.
fn bearer_token(parts: &Parts) -> Result<Option<String>, AppError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = header
        .to_str()
        .map_err(|_| AppError::forbidden(MISSING_TOKEN))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme == "Bearer" && !token.trim().is_empty() => {
            Ok(Some(token.trim().to_string()))
        }
        _ => Err(AppError::forbidden(MISSING_TOKEN)),
    }
}

async fn token_from_request(parts: &mut Parts, state: &AppState) -> Result<String, AppError> {
    if let Some(token) = bearer_token(parts)? {
        return Ok(token);
    }

    let cookies = Cookies::from_request_parts(parts, state)
        .await
        .map_err(|_| AppError::forbidden(MISSING_TOKEN))?;

    cookies
        .get(AUTH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::forbidden(MISSING_TOKEN))
}

pub async fn get_current_user(token: &str, state: &AppState) -> Result<CurrentUser, AppError> {
    let claims = verify_token(token, &state.config.jwt_secret).map_err(|err| {
        if is_expired(&err) {
            AppError::forbidden(EXPIRED_TOKEN)
        } else {
            AppError::forbidden(INVALID_TOKEN)
        }
    })?;

    let user_id = claims
        .user_id()
        .ok_or_else(|| AppError::forbidden(INVALID_TOKEN))?;

    let user = get_user_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::forbidden(UNKNOWN_USER))?;

    if !user.is_active {
        return Err(AppError::forbidden(INACTIVE_USER));
    }

    Ok(CurrentUser::from_user(user))
}

async fn get_user_by_id(db: &Database, user_id: Uuid) -> Result<Option<User>, AppError> {
    let query = format!("{} WHERE u.id = $1 AND u.is_deleted = FALSE", USER_SELECT);
    let user = sqlx::query_as::<_, User>(&query)
        .bind(user_id)
        .fetch_optional(db)
        .await?;

    Ok(user)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_request(parts, state).await?;
        get_current_user(&token, state).await
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(AppError::unauthorized("Only Admins Are Allowed."));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn reads_bearer_header() {
        let parts = parts_with(Some("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&parts).unwrap().as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn missing_header_falls_through() {
        let parts = parts_with(None);
        assert_eq!(bearer_token(&parts).unwrap(), None);
    }

    #[test]
    fn rejects_other_schemes() {
        for value in ["Token abc", "Bearer", "Bearer   ", "abc"] {
            let err = bearer_token(&parts_with(Some(value))).unwrap_err();
            assert_eq!(err.to_string(), MISSING_TOKEN);
        }
    }
}
