use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthData, LoginRequest, RegisterRequest, UpdateDetailsRequest, UpdatePasswordRequest,
        },
        extractors::CurrentUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
    },
    error::ApiError,
    rate_limit,
    response::{ok, ApiResponse},
    state::AppState,
    users::{dto::PublicUser, repo::User},
};

pub fn limited_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::auth_limit,
        ))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(me))
        .route("/auth/updatedetails", put(update_details))
        .route("/auth/updatepassword", put(update_password))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Accumulates `{field, message}` pairs for a 400 with field-level details.
#[derive(Default)]
pub(crate) struct FieldErrors(Vec<serde_json::Value>);

impl FieldErrors {
    pub fn push(&mut self, field: &str, message: &str) {
        self.0
            .push(serde_json::json!({"field": field, "message": message}));
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation_with_details(
                "Invalid input",
                serde_json::Value::Array(self.0),
            ))
        }
    }
}

fn auth_data(user: User, token: String) -> AuthData {
    AuthData {
        id: user.id,
        name: user.name,
        email: user.email,
        role: user.role,
        token,
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthData>>), ApiError> {
    payload.name = payload.name.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    let mut errors = FieldErrors::default();
    if payload.name.chars().count() < 2 || payload.name.chars().count() > 50 {
        errors.push("name", "Name must be between 2 and 50 characters");
    }
    if !is_valid_email(&payload.email) {
        errors.push("email", "Invalid email address");
    }
    if payload.password.len() < 6 {
        errors.push("password", "Password must be at least 6 characters");
    }
    errors.into_result()?;

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::validation("Email already in use"));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&state.db, &payload.name, &payload.email, &hash).await?;

    let token = JwtKeys::from_ref(&state).sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, ok(auth_data(user, token))))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AuthData>>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let mut errors = FieldErrors::default();
    if !is_valid_email(&payload.email) {
        errors.push("email", "Invalid email address");
    }
    if payload.password.is_empty() {
        errors.push("password", "Password is required");
    }
    errors.into_result()?;

    // one generic message whether the email or the password was wrong
    let invalid = || ApiError::Unauthorized("Invalid email or password".into());

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with invalid password");
        return Err(invalid());
    }

    let token = JwtKeys::from_ref(&state).sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(ok(auth_data(user, token)))
}

#[instrument(skip_all)]
pub async fn me(
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<PublicUser>>, ApiError> {
    Ok(ok(PublicUser::from(user)))
}

#[instrument(skip(state, payload))]
pub async fn update_details(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdateDetailsRequest>,
) -> Result<Json<ApiResponse<PublicUser>>, ApiError> {
    let name = payload.name.as_deref().map(str::trim);
    let email = payload
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase());

    let mut errors = FieldErrors::default();
    if let Some(n) = name {
        if n.chars().count() < 2 || n.chars().count() > 50 {
            errors.push("name", "Name must be between 2 and 50 characters");
        }
    }
    if let Some(e) = email.as_deref() {
        if !is_valid_email(e) {
            errors.push("email", "Invalid email address");
        }
    }
    errors.into_result()?;

    if let Some(e) = email.as_deref() {
        if let Some(existing) = User::find_by_email(&state.db, e).await? {
            if existing.id != user.id {
                return Err(ApiError::validation("Email already in use"));
            }
        }
    }

    let updated = User::update_details(&state.db, user.id, name, email.as_deref())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!(user_id = %updated.id, "profile updated");
    Ok(ok(PublicUser::from(updated)))
}

#[instrument(skip_all)]
pub async fn update_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Json<ApiResponse<PublicUser>>, ApiError> {
    let mut errors = FieldErrors::default();
    if payload.current_password.is_empty() {
        errors.push("current_password", "Current password is required");
    }
    if payload.new_password.len() < 6 {
        errors.push("new_password", "New password must be at least 6 characters");
    }
    errors.into_result()?;

    if !verify_password(&payload.current_password, &user.password_hash)? {
        return Err(ApiError::Unauthorized("Current password is incorrect".into()));
    }

    let hash = hash_password(&payload.new_password)?;
    User::set_password_hash(&state.db, user.id, &hash).await?;

    info!(user_id = %user.id, "password updated");
    Ok(ok(PublicUser::from(user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("a.b-c@sub.domain.org"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("user@nodot"));
    }

    #[test]
    fn field_errors_collects_details() {
        let mut errors = FieldErrors::default();
        errors.push("email", "Invalid email address");
        errors.push("password", "Password must be at least 6 characters");
        let err = errors.into_result().unwrap_err();
        match err {
            ApiError::Validation { message, details } => {
                assert_eq!(message, "Invalid input");
                let details = details.unwrap();
                assert_eq!(details[0]["field"], "email");
                assert_eq!(details[1]["field"], "password");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_field_errors_is_ok() {
        assert!(FieldErrors::default().into_result().is_ok());
    }
}
