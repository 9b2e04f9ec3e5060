use super::principal::{Principal, ResourceContext};
use super::{Action, Decision, DenyReason};
use crate::models::user::Role;

/// Policy evaluator trait for pluggable authorization logic
pub trait PolicyEvaluator: Send + Sync {
    /// Decide whether the principal may perform `action` on the resource
    fn authorize(&self, principal: &Principal, action: Action, ctx: &ResourceContext) -> Decision;

    /// Whether `role` holds any grant for `action`, whatever the resource.
    fn role_may(&self, role: Role, action: Action) -> bool;
}

/// How the principal must relate to the resource for a grant to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// No relation required.
    Any,
    /// The targeted user is the principal.
    Itself,
    /// The principal is the request's client.
    Owner,
    /// The principal is the request's executor.
    Assignee,
}

impl Relation {
    fn holds(&self, principal: &Principal, ctx: &ResourceContext) -> bool {
        let me = Some(principal.user_id);
        match self {
            Relation::Any => true,
            Relation::Itself => ctx.user_id == me,
            Relation::Owner => ctx.client_id == me,
            Relation::Assignee => ctx.executor_id.is_some() && ctx.executor_id == me,
        }
    }
}

/// One row fragment of the permission matrix. `role: None` applies to every role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub role: Option<Role>,
    pub relation: Relation,
}

const fn grant(role: Role, relation: Relation) -> Grant {
    Grant {
        role: Some(role),
        relation,
    }
}

const fn anyone(relation: Relation) -> Grant {
    Grant { role: None, relation }
}

const STAFF: &[Grant] = &[grant(Role::Manager, Relation::Any), grant(Role::Admin, Relation::Any)];

const ADMIN_ONLY: &[Grant] = &[grant(Role::Admin, Relation::Any)];

const EVERY_ROLE: &[Grant] = &[
    grant(Role::Client, Relation::Any),
    grant(Role::Executor, Relation::Any),
    grant(Role::Manager, Relation::Any),
    grant(Role::Admin, Relation::Any),
];

const VIEW_USER: &[Grant] = &[
    grant(Role::Client, Relation::Itself),
    grant(Role::Executor, Relation::Itself),
    grant(Role::Manager, Relation::Any),
    grant(Role::Admin, Relation::Any),
];

const VIEW_REQUEST: &[Grant] = &[
    grant(Role::Client, Relation::Owner),
    grant(Role::Executor, Relation::Assignee),
    grant(Role::Manager, Relation::Any),
    grant(Role::Admin, Relation::Any),
];

const SELF_ONLY: &[Grant] = &[anyone(Relation::Itself)];

const CLIENTS: &[Grant] = &[grant(Role::Client, Relation::Any)];

const OWNER_ONLY: &[Grant] = &[anyone(Relation::Owner)];

const ANY_PARTY: &[Grant] = &[
    anyone(Relation::Owner),
    anyone(Relation::Assignee),
    grant(Role::Manager, Relation::Any),
    grant(Role::Admin, Relation::Any),
];

const OWNER_OR_ADMIN: &[Grant] = &[anyone(Relation::Owner), grant(Role::Admin, Relation::Any)];

/// The permission matrix.
pub fn grants(action: Action) -> &'static [Grant] {
    match action {
        Action::ListUsers => STAFF,
        Action::GetUser => VIEW_USER,
        Action::UpdateUserProfile => SELF_ONLY,
        Action::UpdateUserAdmin | Action::DeleteUser => ADMIN_ONLY,
        Action::ListRequests => EVERY_ROLE,
        Action::GetRequest | Action::ListComments | Action::CreateComment => VIEW_REQUEST,
        Action::CreateRequest => CLIENTS,
        Action::UpdateRequestDescription => OWNER_ONLY,
        Action::UpdateRequestStatus => ANY_PARTY,
        Action::UpdateRequestPriority | Action::AssignExecutor => STAFF,
        Action::DeleteRequest => OWNER_OR_ADMIN,
        Action::ReadSettings | Action::WriteSettings | Action::ViewActivity => ADMIN_ONLY,
        Action::ViewDashboard => STAFF,
    }
}

/// Default evaluator over the static matrix
///
/// A request is allowed when any grant for the principal's role holds
/// (grants are a disjunction, never an override chain). Denials carry:
/// 1. `not-found-or-forbidden` for actions that would leak existence
/// 2. `not-owner` when the role has a grant but the relation failed
/// 3. `role-insufficient` otherwise
#[derive(Debug, Clone, Default)]
pub struct DefaultPolicyEvaluator;

impl DefaultPolicyEvaluator {
    pub fn new() -> Self {
        Self
    }

    fn applicable(role: Role, action: Action) -> impl Iterator<Item = &'static Grant> {
        grants(action)
            .iter()
            .filter(move |g| g.role.map_or(true, |r| r == role))
    }

    fn decide(principal: &Principal, action: Action, ctx: &ResourceContext) -> Decision {
        let applicable = Self::applicable(principal.role, action);

        let mut role_has_grant = false;
        for g in applicable {
            role_has_grant = true;
            if g.relation.holds(principal, ctx) {
                return Decision::Allow;
            }
        }

        let reason = if action.reveals_existence() {
            DenyReason::NotFoundOrForbidden
        } else if role_has_grant {
            DenyReason::NotOwner
        } else {
            DenyReason::RoleInsufficient
        };
        Decision::Deny(reason)
    }
}

impl PolicyEvaluator for DefaultPolicyEvaluator {
    fn authorize(&self, principal: &Principal, action: Action, ctx: &ResourceContext) -> Decision {
        let decision = Self::decide(principal, action, ctx);

        match decision {
            Decision::Allow => tracing::debug!(
                user_id = principal.user_id,
                role = principal.role.as_str(),
                action = action.as_str(),
                "permission granted"
            ),
            Decision::Deny(reason) => tracing::debug!(
                user_id = principal.user_id,
                role = principal.role.as_str(),
                action = action.as_str(),
                reason = reason.as_str(),
                "permission denied"
            ),
        }

        decision
    }

    fn role_may(&self, role: Role, action: Action) -> bool {
        Self::applicable(role, action).next().is_some()
    }
}
