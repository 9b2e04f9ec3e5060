use crate::models::user::Role;

/// Principal represents the authenticated actor performing an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }
}

/// Ownership fields of the resource an action targets.
///
/// Collection-level actions (list, create, settings) use an empty context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceContext {
    pub user_id: Option<i64>,
    pub client_id: Option<i64>,
    pub executor_id: Option<i64>,
}

impl ResourceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A user record, targeted by id.
    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// A request (or something hanging off one, like its comments).
    pub fn with_request(mut self, client_id: i64, executor_id: Option<i64>) -> Self {
        self.client_id = Some(client_id);
        self.executor_id = executor_id;
        self
    }
}
