use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::{AdminUser, CurrentUser},
    auth::handlers::{is_valid_email, FieldErrors},
    error::ApiError,
    response::{ok, ApiResponse},
    state::AppState,
    users::{
        dto::{PublicUser, UpdateUserRequest, UserList},
        repo::{User, UserStats},
    },
};

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/users", get(list_users))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/stats", get(user_stats))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<ApiResponse<UserList>>, ApiError> {
    let users: Vec<PublicUser> = User::list(&state.db)
        .await?
        .into_iter()
        .map(PublicUser::from)
        .collect();
    Ok(ok(UserList {
        count: users.len(),
        users,
    }))
}

#[instrument(skip(state, _caller))]
pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(_caller): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PublicUser>>, ApiError> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(ok(PublicUser::from(user)))
}

#[instrument(skip(state, caller, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<PublicUser>>, ApiError> {
    if caller.id != id && !caller.is_admin() {
        return Err(ApiError::Forbidden(
            "Not allowed to modify this user".into(),
        ));
    }
    // role and active-flag changes are reserved for admins
    if (payload.role.is_some() || payload.is_active.is_some()) && !caller.is_admin() {
        return Err(ApiError::Forbidden(
            "Only admins may change role or active status".into(),
        ));
    }

    let name = payload.name.as_deref().map(str::trim);
    let email = payload.email.as_deref().map(|e| e.trim().to_lowercase());

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
            if existing.id != id {
                return Err(ApiError::validation("Email already in use"));
            }
        }
    }

    let updated = User::update_managed(
        &state.db,
        id,
        name,
        email.as_deref(),
        payload.role,
        payload.is_active,
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!(user_id = %id, by = %caller.id, "user updated");
    Ok(ok(PublicUser::from(updated)))
}

#[instrument(skip(state, admin))]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if !User::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("User not found".into()));
    }
    info!(user_id = %id, by = %admin.id, "user deleted");
    Ok(ok(serde_json::json!({"message": "User deleted"})))
}

#[instrument(skip_all)]
pub async fn user_stats(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let stats = UserStats::for_user(&state.db, caller.id).await?;
    Ok(ok(serde_json::json!({
        "user": PublicUser::from(caller),
        "stats": stats,
    })))
}
