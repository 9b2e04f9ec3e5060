use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::errors::AppResult;
use crate::events::{Loggable, Severity};
use crate::extract::Validate;
use crate::utils::check_length;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct SystemSetting {
    #[serde(skip)]
    pub id: i64,
    #[schema(example = "response_time_hours")]
    pub key: String,
    #[schema(example = "24")]
    pub value: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for SystemSetting {
    fn entity_type() -> &'static str { "setting" }
    fn subject_id(&self) -> i64 { self.id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SettingUpdateRequest {
    #[schema(example = "48")]
    pub value: String,
}

impl Validate for SettingUpdateRequest {
    fn validate(&self) -> AppResult<()> {
        check_length("value", &self.value, 1, 500)
    }
}
