//! Row-level visibility for request listings.

use sqlx::{QueryBuilder, Sqlite};

use super::Principal;
use crate::models::user::Role;

/// The predicate applied to `requests` before any user-supplied filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestScope {
    /// Managers and admins.
    All,
    /// Clients: requests they filed.
    Owned(i64),
    /// Executors: requests assigned to them.
    Assigned(i64),
}

impl RequestScope {
    pub fn for_principal(principal: &Principal) -> Self {
        match principal.role {
            Role::Client => RequestScope::Owned(principal.user_id),
            Role::Executor => RequestScope::Assigned(principal.user_id),
            Role::Manager | Role::Admin => RequestScope::All,
        }
    }

    /// Appends ` AND <predicate>` against the `alias` table; a no-op for `All`.
    pub fn push_predicate(&self, builder: &mut QueryBuilder<'_, Sqlite>, alias: &str) {
        match *self {
            RequestScope::All => {}
            RequestScope::Owned(id) => {
                builder.push(format!(" AND {alias}.client_id = ")).push_bind(id);
            }
            RequestScope::Assigned(id) => {
                builder.push(format!(" AND {alias}.executor_id = ")).push_bind(id);
            }
        }
    }
}

/// `skip`/`limit` after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 100;
    pub const MAX_LIMIT: i64 = 500;

    pub fn new(skip: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            skip: skip.unwrap_or(0).max(0),
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(0, Self::MAX_LIMIT),
        }
    }

    pub fn push_limit(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder
            .push(" LIMIT ")
            .push_bind(self.limit)
            .push(" OFFSET ")
            .push_bind(self.skip);
    }

    /// In-memory equivalent of `push_limit`.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.skip as usize)
            .take(self.limit as usize)
            .collect()
    }
}
