//! Request lifecycle: status transitions, set-once timestamps and deadlines.
//!
//! `reduce` is pure. Handlers load a request, reduce an event against its
//! snapshot and persist the resulting snapshot together with `updated_at`.

use chrono::{DateTime, Duration, Utc};

use crate::errors::AppError;
use crate::models::request::{RequestStatus, ServiceRequest};

pub const RESPONSE_TIME_HOURS_KEY: &str = "response_time_hours";
pub const DEFAULT_RESPONSE_TIME_HOURS: i64 = 24;

/// Whether generic status edits are checked against the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionMode {
    /// Any status may be written directly; only set-once stamps are enforced.
    #[default]
    Permissive,
    /// Only edges of `new -> assigned -> in_progress -> completed` plus
    /// cancellation are accepted.
    Strict,
}

impl TransitionMode {
    pub fn from_env() -> Result<Self, AppError> {
        match std::env::var("TRANSITION_MODE") {
            Err(_) => Ok(TransitionMode::Permissive),
            Ok(raw) => match raw.trim().to_lowercase().as_str() {
                "" | "permissive" => Ok(TransitionMode::Permissive),
                "strict" => Ok(TransitionMode::Strict),
                other => Err(AppError::configuration(format!(
                    "TRANSITION_MODE must be `permissive` or `strict`, got `{other}`"
                ))),
            },
        }
    }
}

/// The lifecycle-relevant fields of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleState {
    pub status: RequestStatus,
    pub executor_id: Option<i64>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LifecycleState {
    pub fn new_request() -> Self {
        Self {
            status: RequestStatus::New,
            executor_id: None,
            assigned_at: None,
            started_at: None,
            completed_at: None,
        }
    }
}

impl From<&ServiceRequest> for LifecycleState {
    fn from(request: &ServiceRequest) -> Self {
        Self {
            status: request.status,
            executor_id: request.executor_id,
            assigned_at: request.assigned_at,
            started_at: request.started_at,
            completed_at: request.completed_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The executor has already been checked to exist with role `executor`.
    Assign { executor_id: i64 },
    SetStatus(RequestStatus),
}

/// A field the reducer wrote, in the order it wrote them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    StatusChanged { from: RequestStatus, to: RequestStatus },
    ExecutorSet(i64),
    AssignedAtSet,
    StartedAtSet,
    CompletedAtSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: LifecycleState,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("request is {0:?} and can no longer change")]
    Terminal(RequestStatus),
    #[error("cannot move a request from {from:?} to {to:?}")]
    Illegal { from: RequestStatus, to: RequestStatus },
    #[error("requests enter `assigned` only through assignment")]
    AssignRequired,
}

impl From<TransitionError> for AppError {
    fn from(value: TransitionError) -> Self {
        AppError::conflict(value.to_string())
    }
}

fn edge_allowed(from: RequestStatus, to: RequestStatus) -> bool {
    use RequestStatus::*;
    matches!(
        (from, to),
        (Assigned, InProgress)
            | (InProgress, Completed)
            | (New, Cancelled)
            | (Assigned, Cancelled)
            | (InProgress, Cancelled)
    )
}

/// Applies `event` to `state` at time `now`.
pub fn reduce(
    state: &LifecycleState,
    event: LifecycleEvent,
    now: DateTime<Utc>,
    mode: TransitionMode,
) -> Result<Transition, TransitionError> {
    let mut next = *state;
    let mut effects = Vec::new();

    let target = match event {
        LifecycleEvent::Assign { executor_id } => {
            if mode == TransitionMode::Strict
                && !matches!(state.status, RequestStatus::New | RequestStatus::Assigned)
            {
                return Err(if state.status.is_terminal() {
                    TransitionError::Terminal(state.status)
                } else {
                    TransitionError::Illegal {
                        from: state.status,
                        to: RequestStatus::Assigned,
                    }
                });
            }

            if state.executor_id != Some(executor_id) {
                next.executor_id = Some(executor_id);
                effects.push(Effect::ExecutorSet(executor_id));
            }
            RequestStatus::Assigned
        }
        LifecycleEvent::SetStatus(to) => {
            if mode == TransitionMode::Strict && to != state.status {
                if state.status.is_terminal() {
                    return Err(TransitionError::Terminal(state.status));
                }
                if to == RequestStatus::Assigned {
                    return Err(TransitionError::AssignRequired);
                }
                if !edge_allowed(state.status, to) {
                    return Err(TransitionError::Illegal {
                        from: state.status,
                        to,
                    });
                }
            }
            to
        }
    };

    if target != state.status {
        next.status = target;
        effects.push(Effect::StatusChanged {
            from: state.status,
            to: target,
        });
    }

    // Stamps follow the event, not the status change: re-assigning an
    // assigned request still keeps the first `assigned_at`.
    let assigning = matches!(event, LifecycleEvent::Assign { .. });
    if assigning && next.assigned_at.is_none() {
        next.assigned_at = Some(now);
        effects.push(Effect::AssignedAtSet);
    }
    if target == RequestStatus::InProgress && next.started_at.is_none() {
        next.started_at = Some(now);
        effects.push(Effect::StartedAtSet);
    }
    if target == RequestStatus::Completed && next.completed_at.is_none() {
        next.completed_at = Some(now);
        effects.push(Effect::CompletedAtSet);
    }

    Ok(Transition {
        state: next,
        effects,
    })
}

/// Reads the `response_time_hours` setting value.
///
/// Absent, unparseable and non-positive values all mean the default.
pub fn response_time_hours(raw: Option<&str>) -> i64 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .filter(|hours| *hours > 0)
        .unwrap_or(DEFAULT_RESPONSE_TIME_HOURS)
}

pub fn deadline(created_at: DateTime<Utc>, response_time_hours: i64) -> DateTime<Utc> {
    created_at + Duration::hours(response_time_hours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn permissive(state: &LifecycleState, event: LifecycleEvent, at: i64) -> LifecycleState {
        reduce(state, event, t(at), TransitionMode::Permissive).unwrap().state
    }

    #[test]
    fn assignment_sets_executor_status_and_stamp() {
        let state = permissive(&LifecycleState::new_request(), LifecycleEvent::Assign { executor_id: 4 }, 1);
        assert_eq!(state.status, RequestStatus::Assigned);
        assert_eq!(state.executor_id, Some(4));
        assert_eq!(state.assigned_at, Some(t(1)));
    }

    #[test]
    fn reassignment_keeps_first_assigned_at() {
        let first = permissive(&LifecycleState::new_request(), LifecycleEvent::Assign { executor_id: 4 }, 1);
        let second = reduce(&first, LifecycleEvent::Assign { executor_id: 5 }, t(10), TransitionMode::Permissive).unwrap();

        assert_eq!(second.state.executor_id, Some(5));
        assert_eq!(second.state.assigned_at, Some(t(1)));
        assert_eq!(second.effects, vec![Effect::ExecutorSet(5)]);
    }

    #[test]
    fn completion_is_stamped_once() {
        let started = permissive(&LifecycleState::new_request(), LifecycleEvent::SetStatus(RequestStatus::InProgress), 2);
        assert_eq!(started.started_at, Some(t(2)));

        let done = permissive(&started, LifecycleEvent::SetStatus(RequestStatus::Completed), 3);
        assert_eq!(done.completed_at, Some(t(3)));

        let again = reduce(&done, LifecycleEvent::SetStatus(RequestStatus::Completed), t(9), TransitionMode::Permissive).unwrap();
        assert_eq!(again.state.completed_at, Some(t(3)));
        assert!(again.effects.is_empty());
    }

    #[test]
    fn permissive_mode_accepts_jumps_but_never_clears_stamps() {
        let done = permissive(&LifecycleState::new_request(), LifecycleEvent::SetStatus(RequestStatus::Completed), 1);
        assert_eq!(done.status, RequestStatus::Completed);
        assert_eq!(done.completed_at, Some(t(1)));

        let reopened = permissive(&done, LifecycleEvent::SetStatus(RequestStatus::InProgress), 2);
        assert_eq!(reopened.completed_at, Some(t(1)));
        assert_eq!(reopened.started_at, Some(t(2)));

        let recompleted = permissive(&reopened, LifecycleEvent::SetStatus(RequestStatus::Completed), 3);
        assert_eq!(recompleted.completed_at, Some(t(1)));
        assert_eq!(recompleted.started_at, Some(t(2)));
    }

    #[test]
    fn generic_assigned_status_does_not_stamp() {
        let state = permissive(&LifecycleState::new_request(), LifecycleEvent::SetStatus(RequestStatus::Assigned), 1);
        assert_eq!(state.status, RequestStatus::Assigned);
        assert_eq!(state.assigned_at, None);
        assert_eq!(state.executor_id, None);
    }

    #[test]
    fn cancellation_has_no_stamp() {
        let transition = reduce(
            &LifecycleState::new_request(),
            LifecycleEvent::SetStatus(RequestStatus::Cancelled),
            t(1),
            TransitionMode::Strict,
        )
        .unwrap();
        assert_eq!(transition.state.status, RequestStatus::Cancelled);
        assert_eq!(
            transition.effects,
            vec![Effect::StatusChanged { from: RequestStatus::New, to: RequestStatus::Cancelled }]
        );
    }

    #[test]
    fn strict_mode_walks_the_happy_path() {
        let mode = TransitionMode::Strict;
        let s = reduce(&LifecycleState::new_request(), LifecycleEvent::Assign { executor_id: 4 }, t(1), mode).unwrap().state;
        let s = reduce(&s, LifecycleEvent::SetStatus(RequestStatus::InProgress), t(2), mode).unwrap().state;
        let s = reduce(&s, LifecycleEvent::SetStatus(RequestStatus::Completed), t(3), mode).unwrap().state;
        assert_eq!((s.assigned_at, s.started_at, s.completed_at), (Some(t(1)), Some(t(2)), Some(t(3))));
    }

    #[test]
    fn strict_mode_rejects_illegal_moves() {
        let mode = TransitionMode::Strict;
        let new = LifecycleState::new_request();

        assert_eq!(
            reduce(&new, LifecycleEvent::SetStatus(RequestStatus::Completed), t(1), mode),
            Err(TransitionError::Illegal { from: RequestStatus::New, to: RequestStatus::Completed })
        );
        assert_eq!(
            reduce(&new, LifecycleEvent::SetStatus(RequestStatus::Assigned), t(1), mode),
            Err(TransitionError::AssignRequired)
        );

        let cancelled = permissive(&new, LifecycleEvent::SetStatus(RequestStatus::Cancelled), 1);
        assert_eq!(
            reduce(&cancelled, LifecycleEvent::SetStatus(RequestStatus::InProgress), t(2), mode),
            Err(TransitionError::Terminal(RequestStatus::Cancelled))
        );
        assert_eq!(
            reduce(&cancelled, LifecycleEvent::Assign { executor_id: 4 }, t(2), mode),
            Err(TransitionError::Terminal(RequestStatus::Cancelled))
        );

        // Writing the current status again is not a transition.
        assert!(reduce(&cancelled, LifecycleEvent::SetStatus(RequestStatus::Cancelled), t(2), mode)
            .unwrap()
            .effects
            .is_empty());
    }

    #[test]
    fn response_time_falls_back_to_default() {
        assert_eq!(response_time_hours(None), 24);
        assert_eq!(response_time_hours(Some("abc")), 24);
        assert_eq!(response_time_hours(Some("0")), 24);
        assert_eq!(response_time_hours(Some("-3")), 24);
        assert_eq!(response_time_hours(Some(" 48 ")), 48);
    }

    #[test]
    fn deadline_adds_hours() {
        assert_eq!(deadline(t(0), 24), t(24 * 60));
        assert_eq!(deadline(t(0), response_time_hours(None)), t(0) + Duration::hours(24));
    }
}
