use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How long an activity entry is worth keeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Deletions, role changes and settings writes.
    Critical,
    #[default]
    Important,
    /// Logins and other high-volume events.
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Entities that show up in the activity log.
pub trait Loggable: Serialize + Send + Sync {
    /// Prefix of event names, `request` in `request.assigned`.
    fn entity_type() -> &'static str;

    fn subject_id(&self) -> i64;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" | "role_changed" => Severity::Critical,
            "login" => Severity::Noise,
            "created" | "updated" => self.severity(),
            _ => Severity::Important,
        }
    }
}
