use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::errors::{AppError, AppResult};
use crate::events::Loggable;
use crate::extract::Validate;
use crate::models::user::{Role, UserPublic};
use crate::utils::{check_length, check_optional_length};

pub const DEFAULT_PRIORITY: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    New,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 5] = [
        RequestStatus::New,
        RequestStatus::Assigned,
        RequestStatus::InProgress,
        RequestStatus::Completed,
        RequestStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::New => "new",
            RequestStatus::Assigned => "assigned",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Cancelled)
    }
}

impl FromStr for RequestStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::internal(format!("unknown request status: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Plumbing,
    Electricity,
    Elevator,
    Cleaning,
    Heating,
    Other,
}

impl RequestType {
    pub const ALL: [RequestType; 6] = [
        RequestType::Plumbing,
        RequestType::Electricity,
        RequestType::Elevator,
        RequestType::Cleaning,
        RequestType::Heating,
        RequestType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Plumbing => "plumbing",
            RequestType::Electricity => "electricity",
            RequestType::Elevator => "elevator",
            RequestType::Cleaning => "cleaning",
            RequestType::Heating => "heating",
            RequestType::Other => "other",
        }
    }
}

impl FromStr for RequestType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AppError::internal(format!("unknown request type: {s}")))
    }
}

/// A maintenance ticket filed by a client.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceRequest {
    pub id: i64,
    pub client_id: i64,
    pub executor_id: Option<i64>,
    #[serde(rename = "type")]
    pub request_type: RequestType,
    pub description: String,
    pub status: RequestStatus,
    /// 1 = normal, 2 = high, 3 = urgent
    #[schema(minimum = 1, maximum = 3)]
    pub priority: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub deadline: DateTime<Utc>,
}

impl Loggable for ServiceRequest {
    fn entity_type() -> &'static str { "request" }
    fn subject_id(&self) -> i64 { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbServiceRequest {
    pub id: i64,
    pub client_id: i64,
    pub executor_id: Option<i64>,
    #[sqlx(rename = "type")]
    pub request_type: String,
    pub description: String,
    pub status: String,
    pub priority: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub deadline: DateTime<Utc>,
}

impl TryFrom<DbServiceRequest> for ServiceRequest {
    type Error = AppError;

    fn try_from(value: DbServiceRequest) -> Result<Self, Self::Error> {
        Ok(ServiceRequest {
            id: value.id,
            client_id: value.client_id,
            executor_id: value.executor_id,
            request_type: value.request_type.parse()?,
            description: value.description,
            status: value.status.parse()?,
            priority: value.priority,
            created_at: value.created_at,
            updated_at: value.updated_at,
            assigned_at: value.assigned_at,
            started_at: value.started_at,
            completed_at: value.completed_at,
            deadline: value.deadline,
        })
    }
}

/// A request with its client and executor embedded.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RequestWithParties {
    #[serde(flatten)]
    pub request: ServiceRequest,
    pub client: UserPublic,
    pub executor: Option<UserPublic>,
}

/// Joined row: `requests r` with `users c` (client) and `users e` (executor).
#[derive(Debug, Clone, FromRow)]
pub struct DbRequestWithParties {
    #[sqlx(flatten)]
    pub request: DbServiceRequest,
    pub client_username: String,
    pub client_fullname: String,
    pub client_address: Option<String>,
    pub client_role: String,
    pub executor_username: Option<String>,
    pub executor_fullname: Option<String>,
    pub executor_address: Option<String>,
    pub executor_role: Option<String>,
}

impl DbRequestWithParties {
    /// Column list matching the struct, for `FROM requests r JOIN users c LEFT JOIN users e`.
    pub const SELECT: &'static str = "SELECT r.id, r.client_id, r.executor_id, r.type, r.description, r.status, r.priority, \
        r.created_at, r.updated_at, r.assigned_at, r.started_at, r.completed_at, r.deadline, \
        c.username AS client_username, c.fullname AS client_fullname, c.address AS client_address, c.role AS client_role, \
        e.username AS executor_username, e.fullname AS executor_fullname, e.address AS executor_address, e.role AS executor_role \
        FROM requests r JOIN users c ON c.id = r.client_id LEFT JOIN users e ON e.id = r.executor_id";
}

impl TryFrom<DbRequestWithParties> for RequestWithParties {
    type Error = AppError;

    fn try_from(value: DbRequestWithParties) -> Result<Self, Self::Error> {
        let request: ServiceRequest = value.request.try_into()?;

        let client = UserPublic {
            id: request.client_id,
            username: value.client_username,
            fullname: value.client_fullname,
            address: value.client_address,
            role: value.client_role.parse::<Role>()?,
        };

        let executor = match (request.executor_id, value.executor_username, value.executor_fullname, value.executor_role) {
            (Some(id), Some(username), Some(fullname), Some(role)) => Some(UserPublic {
                id,
                username,
                fullname,
                address: value.executor_address,
                role: role.parse()?,
            }),
            _ => None,
        };

        Ok(RequestWithParties { request, client, executor })
    }
}

fn check_description(description: &str) -> AppResult<()> {
    check_length("description", description, 10, 2000)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestCreateRequest {
    #[serde(rename = "type")]
    pub request_type: RequestType,
    #[schema(example = "Water is leaking under the kitchen sink")]
    pub description: String,
}

impl Validate for RequestCreateRequest {
    fn validate(&self) -> AppResult<()> {
        check_description(&self.description)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RequestUpdateRequest {
    pub description: Option<String>,
    pub status: Option<RequestStatus>,
    #[schema(minimum = 1, maximum = 3)]
    pub priority: Option<i64>,
}

impl Validate for RequestUpdateRequest {
    fn validate(&self) -> AppResult<()> {
        check_optional_length("description", self.description.as_deref(), 10, 2000)?;
        if let Some(priority) = self.priority {
            if !(1..=3).contains(&priority) {
                return Err(AppError::validation("priority", "must be 1, 2 or 3"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRequest {
    pub executor_id: i64,
}

impl Validate for AssignRequest {
    fn validate(&self) -> AppResult<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RequestListQuery {
    #[serde(alias = "status_filter")]
    pub status: Option<RequestStatus>,
    #[serde(rename = "type", alias = "type_filter")]
    pub request_type: Option<RequestType>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}
