use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActivityEntry {
    pub id: String,
    #[schema(example = "request.assigned")]
    pub event_name: String,
    pub description: String,
    pub actor_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub occurred_at: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub properties: Value,
    pub severity: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbActivityEntry {
    pub id: String,
    pub event_name: String,
    pub description: String,
    pub actor_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub occurred_at: DateTime<Utc>,
    pub properties: String,
    pub severity: String,
}

impl From<DbActivityEntry> for ActivityEntry {
    fn from(db: DbActivityEntry) -> Self {
        ActivityEntry {
            id: db.id,
            event_name: db.event_name,
            description: db.description,
            actor_id: db.actor_id,
            subject_id: db.subject_id,
            occurred_at: db.occurred_at,
            // rows are only written by the listener, which stores valid JSON
            properties: serde_json::from_str(&db.properties).unwrap_or(Value::Null),
            severity: db.severity,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActivityQuery {
    /// Exact event name, e.g. `request.assigned`
    pub event_name: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}
