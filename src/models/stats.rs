use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::request::RequestStatus;
use crate::models::user::Role;

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_requests: i64,
    pub new_requests: i64,
    /// `assigned` and `in_progress` together
    pub in_progress_requests: i64,
    pub completed_requests: i64,
    pub cancelled_requests: i64,
    pub total_users: i64,
    pub total_clients: i64,
    pub total_executors: i64,
    pub total_managers: i64,
    pub total_admins: i64,
    pub requests_by_status: BTreeMap<String, i64>,
    pub users_by_role: BTreeMap<String, i64>,
}

impl DashboardStats {
    /// Every known status and role appears in the maps, zero when absent.
    pub fn from_counts(mut by_status: BTreeMap<String, i64>, mut by_role: BTreeMap<String, i64>) -> Self {
        for status in RequestStatus::ALL {
            by_status.entry(status.as_str().to_string()).or_insert(0);
        }
        for role in Role::ALL {
            by_role.entry(role.as_str().to_string()).or_insert(0);
        }

        let status = |s: RequestStatus| by_status.get(s.as_str()).copied().unwrap_or(0);
        let role = |r: Role| by_role.get(r.as_str()).copied().unwrap_or(0);

        DashboardStats {
            total_requests: by_status.values().sum(),
            new_requests: status(RequestStatus::New),
            in_progress_requests: status(RequestStatus::Assigned) + status(RequestStatus::InProgress),
            completed_requests: status(RequestStatus::Completed),
            cancelled_requests: status(RequestStatus::Cancelled),
            total_users: by_role.values().sum(),
            total_clients: role(Role::Client),
            total_executors: role(Role::Executor),
            total_managers: role(Role::Manager),
            total_admins: role(Role::Admin),
            requests_by_status: by_status,
            users_by_role: by_role,
        }
    }
}
