//! Authorization module - policy engine and visibility scopes
//!
//! The permission matrix lives in one declarative table (`evaluator::grants`).
//! Every handler asks the same engine, and the engine never touches storage:
//! it decides from the principal and the ownership fields of an already
//! loaded resource.

mod evaluator;
mod principal;
pub mod scope;

pub use evaluator::{grants, DefaultPolicyEvaluator, Grant, PolicyEvaluator, Relation};
pub use principal::{Principal, ResourceContext};
pub use scope::RequestScope;

use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::{AppError, AppResult};

/// Everything a principal can attempt against the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ListUsers,
    GetUser,
    UpdateUserProfile,
    UpdateUserAdmin,
    DeleteUser,
    ListRequests,
    GetRequest,
    CreateRequest,
    UpdateRequestDescription,
    UpdateRequestStatus,
    UpdateRequestPriority,
    AssignExecutor,
    DeleteRequest,
    ListComments,
    CreateComment,
    ReadSettings,
    WriteSettings,
    ViewDashboard,
    ViewActivity,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ListUsers => "user.list",
            Action::GetUser => "user.view",
            Action::UpdateUserProfile => "user.update_profile",
            Action::UpdateUserAdmin => "user.update_admin",
            Action::DeleteUser => "user.delete",
            Action::ListRequests => "request.list",
            Action::GetRequest => "request.view",
            Action::CreateRequest => "request.create",
            Action::UpdateRequestDescription => "request.update_description",
            Action::UpdateRequestStatus => "request.update_status",
            Action::UpdateRequestPriority => "request.update_priority",
            Action::AssignExecutor => "request.assign",
            Action::DeleteRequest => "request.delete",
            Action::ListComments => "comment.list",
            Action::CreateComment => "comment.create",
            Action::ReadSettings => "setting.view",
            Action::WriteSettings => "setting.update",
            Action::ViewDashboard => "stats.dashboard",
            Action::ViewActivity => "activity.view",
        }
    }

    /// Actions whose failure would otherwise reveal that the target exists.
    pub fn reveals_existence(&self) -> bool {
        matches!(
            self,
            Action::GetUser | Action::GetRequest | Action::ListComments | Action::CreateComment
        )
    }
}

/// Machine-readable reason attached to a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum DenyReason {
    NotOwner,
    RoleInsufficient,
    NotFoundOrForbidden,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::NotOwner => "not-owner",
            DenyReason::RoleInsufficient => "role-insufficient",
            DenyReason::NotFoundOrForbidden => "not-found-or-forbidden",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Turns the decision into a handler result.
    ///
    /// `not-found-or-forbidden` becomes a plain 404 for `what`, identical to
    /// the answer for an id that does not exist.
    pub fn into_result(self, what: &str) -> AppResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(DenyReason::NotFoundOrForbidden) => {
                Err(AppError::not_found(format!("{what} not found")))
            }
            Decision::Deny(reason) => Err(AppError::forbidden(
                reason,
                format!("not allowed to act on this {what} ({})", reason.as_str()),
            )),
        }
    }
}

/// Rejects actions the principal's role can never perform, before anything is loaded.
pub fn ensure_role(policy: &dyn PolicyEvaluator, principal: &Principal, action: Action) -> AppResult<()> {
    if policy.role_may(principal.role, action) {
        return Ok(());
    }
    tracing::debug!(user_id = principal.user_id, action = action.as_str(), "role cannot perform action");
    Decision::Deny(DenyReason::RoleInsufficient).into_result(action_target(action))
}

/// `view` first, so an invisible target answers 404 whatever `action` is.
pub fn authorize_on(
    policy: &dyn PolicyEvaluator,
    principal: &Principal,
    view: Action,
    action: Action,
    ctx: &ResourceContext,
) -> AppResult<()> {
    let what = action_target(view);
    policy.authorize(principal, view, ctx).into_result(what)?;
    if action != view {
        policy.authorize(principal, action, ctx).into_result(what)?;
    }
    Ok(())
}

/// Role check followed by a context-free decision, for collection actions.
pub fn authorize_collection(policy: &dyn PolicyEvaluator, principal: &Principal, action: Action) -> AppResult<()> {
    ensure_role(policy, principal, action)?;
    policy
        .authorize(principal, action, &ResourceContext::new())
        .into_result(action_target(action))
}

fn action_target(action: Action) -> &'static str {
    match action.as_str().split_once('.') {
        Some(("user", _)) => "user",
        Some(("request", _)) => "request",
        Some(("comment", _)) => "request",
        Some(("setting", _)) => "setting",
        _ => "resource",
    }
}
