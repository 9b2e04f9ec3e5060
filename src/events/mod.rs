//! In-process activity log.
//!
//! Handlers publish JSON events on a broadcast channel after their writes
//! commit; a background listener projects them into `activity_log`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<T> {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub payload: T,
}

impl<T> DomainEvent<T> {
    pub fn new(name: impl Into<String>, actor_id: Option<i64>, subject_id: Option<i64>, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            occurred_at: Utc::now(),
            actor_id,
            subject_id,
            payload,
        }
    }
}

pub type EventBus = broadcast::Sender<Value>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<Value>) {
    broadcast::channel(1024)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPayload {
    #[serde(rename = "new")]
    pub current: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    pub severity: Severity,
}

/// Publishes `<entity>.<action>` for `entity`.
pub fn log_activity<T: Loggable>(event_bus: &EventBus, action: &str, actor_id: Option<i64>, entity: &T) {
    log_change(event_bus, action, actor_id, entity, None);
}

/// Like [`log_activity`], recording the state before the change as well.
pub fn log_change<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    actor_id: Option<i64>,
    entity: &T,
    old_entity: Option<&T>,
) {
    let payload = ActivityPayload {
        current: serde_json::to_value(entity).unwrap_or_default(),
        old: old_entity.map(|old| serde_json::to_value(old).unwrap_or_default()),
        severity: entity.severity_for_action(action),
    };

    let event = DomainEvent::new(
        format!("{}.{}", T::entity_type(), action),
        actor_id,
        Some(entity.subject_id()),
        payload,
    );

    // No receivers is fine; the log is best-effort.
    if let Ok(event) = serde_json::to_value(event) {
        let _ = event_bus.send(event);
    }
}

fn describe(name: &str) -> &'static str {
    match name {
        "user.registered" => "New user registered",
        "user.login" => "User logged in",
        "user.updated" => "User profile updated",
        "user.role_changed" => "User role or status changed",
        "user.deleted" => "User deleted",
        "request.created" => "Request created",
        "request.updated" => "Request updated",
        "request.assigned" => "Executor assigned to request",
        "request.deleted" => "Request deleted",
        "comment.created" => "Comment added",
        "setting.updated" => "System setting changed",
        _ => "System event",
    }
}

/// One row of `activity_log`, pulled out of a published event.
#[derive(Debug, Clone, PartialEq)]
struct ActivityRow {
    event_name: String,
    description: &'static str,
    actor_id: Option<i64>,
    subject_id: Option<i64>,
    occurred_at: DateTime<Utc>,
    severity: String,
}

impl ActivityRow {
    fn from_event(event: &Value) -> Self {
        let event_name = event
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        let occurred_at = event
            .get("occurred_at")
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|at| at.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let severity = event
            .get("payload")
            .and_then(|payload| payload.get("severity"))
            .and_then(Value::as_str)
            .unwrap_or(Severity::Important.as_str())
            .to_string();

        Self {
            description: describe(&event_name),
            actor_id: event.get("actor_id").and_then(Value::as_i64),
            subject_id: event.get("subject_id").and_then(Value::as_i64),
            event_name,
            occurred_at,
            severity,
        }
    }
}

/// Writes one published event into `activity_log`.
async fn record(pool: &SqlitePool, event: &Value) -> Result<ActivityRow, (ActivityRow, sqlx::Error)> {
    let row = ActivityRow::from_event(event);
    let id = match event.get("id").and_then(Value::as_str) {
        Some(id) => id.to_owned(),
        None => Uuid::new_v4().to_string(),
    };

    let inserted = sqlx::query(
        "INSERT INTO activity_log (id, event_name, description, actor_id, subject_id, occurred_at, properties, severity) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&row.event_name)
    .bind(row.description)
    .bind(row.actor_id)
    .bind(row.subject_id)
    .bind(row.occurred_at)
    .bind(event.to_string())
    .bind(&row.severity)
    .execute(pool)
    .await;

    match inserted {
        Ok(_) => Ok(row),
        Err(err) => Err((row, err)),
    }
}

/// Drains the bus until every sender is gone.
pub async fn start_activity_listener(mut rx: broadcast::Receiver<Value>, pool: SqlitePool) {
    use broadcast::error::RecvError;

    tracing::info!("activity listener started");
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Err((row, err)) = record(&pool, &event).await {
                    tracing::error!(event = %row.event_name, error = %err, "activity entry not saved");
                }
            }
            Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "activity listener fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
    tracing::info!("activity listener stopped");
}
