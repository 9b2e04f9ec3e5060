use axum::extract::{Query, State};
use axum::Json;
use sqlx::{QueryBuilder, Sqlite};

use crate::app::AppState;
use crate::authz::scope::Page;
use crate::authz::{authorize_collection, Action};
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::activity::{ActivityEntry, ActivityQuery, DbActivityEntry};

#[utoipa::path(
    get,
    path = "/api/activity",
    tag = "Activity",
    security(("bearerAuth" = [])),
    params(ActivityQuery),
    responses(
        (status = 200, description = "Activity log, newest first", body = [ActivityEntry]),
        (status = 403, description = "Admins only")
    )
)]
pub async fn list_activity(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ActivityQuery>,
) -> AppResult<Json<Vec<ActivityEntry>>> {
    authorize_collection(state.policy.as_ref(), &auth.principal, Action::ViewActivity)?;

    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT id, event_name, description, actor_id, subject_id, occurred_at, properties, severity \
         FROM activity_log WHERE 1 = 1",
    );
    if let Some(name) = query.event_name.as_deref() {
        builder.push(" AND event_name = ").push_bind(name);
    }
    builder.push(" ORDER BY julianday(occurred_at) DESC, rowid DESC");
    Page::new(query.skip, query.limit).push_limit(&mut builder);

    let rows = builder.build_query_as::<DbActivityEntry>().fetch_all(&state.pool).await?;
    Ok(Json(rows.into_iter().map(ActivityEntry::from).collect()))
}
