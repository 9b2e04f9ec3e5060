use axum::extract::{Path, State};
use axum::Json;

use crate::app::AppState;
use crate::authz::{authorize_collection, Action};
use crate::db::settings;
use crate::errors::{AppError, AppResult};
use crate::events::log_change;
use crate::extract::ValidJson;
use crate::jwt::AuthUser;
use crate::lifecycle::RESPONSE_TIME_HOURS_KEY;
use crate::models::setting::{SettingUpdateRequest, SystemSetting};
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/api/settings",
    tag = "Settings",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "All settings, by key", body = [SystemSetting]),
        (status = 403, description = "Admins only")
    )
)]
pub async fn list_settings(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<SystemSetting>>> {
    authorize_collection(state.policy.as_ref(), &auth.principal, Action::ReadSettings)?;
    Ok(Json(settings::list(&state.pool).await?))
}

#[utoipa::path(
    get,
    path = "/api/settings/{key}",
    tag = "Settings",
    security(("bearerAuth" = [])),
    params(("key" = String, Path, description = "Setting key")),
    responses(
        (status = 200, description = "Setting", body = SystemSetting),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Unknown key")
    )
)]
pub async fn get_setting(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(key): Path<String>,
) -> AppResult<Json<SystemSetting>> {
    authorize_collection(state.policy.as_ref(), &auth.principal, Action::ReadSettings)?;
    Ok(Json(settings::fetch(&state.pool, &key).await?))
}

/// Values the rest of the system parses must parse here too.
fn check_value(key: &str, value: &str) -> AppResult<()> {
    if key == RESPONSE_TIME_HOURS_KEY {
        match value.trim().parse::<i64>() {
            Ok(hours) if hours > 0 => {}
            _ => return Err(AppError::validation("value", "response_time_hours must be a positive integer")),
        }
    }
    Ok(())
}

#[utoipa::path(
    put,
    path = "/api/settings/{key}",
    tag = "Settings",
    security(("bearerAuth" = [])),
    params(("key" = String, Path, description = "Setting key")),
    request_body = SettingUpdateRequest,
    responses(
        (status = 200, description = "Updated setting", body = SystemSetting),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Unknown key"),
        (status = 422, description = "Value rejected for this key")
    )
)]
pub async fn update_setting(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(key): Path<String>,
    ValidJson(payload): ValidJson<SettingUpdateRequest>,
) -> AppResult<Json<SystemSetting>> {
    authorize_collection(state.policy.as_ref(), &auth.principal, Action::WriteSettings)?;

    let old = settings::fetch(&state.pool, &key).await?;
    check_value(&key, &payload.value)?;

    sqlx::query("UPDATE system_settings SET value = ?, updated_at = ? WHERE key = ?")
        .bind(&payload.value)
        .bind(utc_now())
        .bind(&key)
        .execute(&state.pool)
        .await?;

    let setting = settings::fetch(&state.pool, &key).await?;
    tracing::info!(key = %setting.key, value = %setting.value, "setting updated");
    log_change(&state.events, "updated", Some(auth.id()), &setting, Some(&old));

    Ok(Json(setting))
}
