use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::db::users::{fetch_user_by_username, insert_user, username_taken};
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::extract::ValidJson;
use crate::jwt::AuthUser;
use crate::models::user::{LoginRequest, NewUser, RegisterRequest, Role, TokenResponse, User, UserStatus};
use crate::utils::{hash_password, verify_password};

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = User),
        (status = 409, description = "Username already in use"),
        (status = 422, description = "Invalid field")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    if username_taken(&state.pool, &payload.username).await? {
        return Err(AppError::conflict("username already in use"));
    }

    let new_user = NewUser {
        username: payload.username,
        password_hash: hash_password(&payload.password)?,
        fullname: payload.fullname,
        address: payload.address,
        role: Role::Client,
        status: UserStatus::Confirmed,
    };

    // A concurrent registration still hits the unique index and maps to 409.
    let user = insert_user(&state.pool, &new_user).await?;

    tracing::info!(user_id = user.id, "user registered");
    log_activity(&state.events, "registered", Some(user.id), &user);

    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials or inactive account")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let db_user = fetch_user_by_username(&state.pool, &payload.username)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let user: User = db_user.try_into()?;
    if !user.is_active {
        return Err(AppError::unauthorized("account is inactive"));
    }

    let access_token = state.jwt.encode(&user)?;
    log_activity(&state.events, "login", Some(user.id), &user);

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        user,
    }))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Missing, invalid or expired token")
    )
)]
pub async fn me(auth: AuthUser) -> AppResult<Json<User>> {
    Ok(Json(auth.user))
}
