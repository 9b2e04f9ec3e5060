use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::errors::{AppError, AppResult};
use crate::events::Loggable;
use crate::extract::Validate;
use crate::models::user::UserPublic;
use crate::utils::check_length;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Comment {
    pub id: i64,
    pub request_id: i64,
    pub user_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Loggable for Comment {
    fn entity_type() -> &'static str { "comment" }
    fn subject_id(&self) -> i64 { self.id }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbComment {
    pub id: i64,
    pub request_id: i64,
    pub user_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbComment> for Comment {
    fn from(db: DbComment) -> Self {
        Comment {
            id: db.id,
            request_id: db.request_id,
            user_id: db.user_id,
            text: db.text,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommentWithUser {
    #[serde(flatten)]
    pub comment: Comment,
    pub user: UserPublic,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbCommentWithUser {
    #[sqlx(flatten)]
    pub comment: DbComment,
    pub username: String,
    pub fullname: String,
    pub address: Option<String>,
    pub role: String,
}

impl TryFrom<DbCommentWithUser> for CommentWithUser {
    type Error = AppError;

    fn try_from(value: DbCommentWithUser) -> Result<Self, Self::Error> {
        let user = UserPublic {
            id: value.comment.user_id,
            username: value.username,
            fullname: value.fullname,
            address: value.address,
            role: value.role.parse()?,
        };

        Ok(CommentWithUser {
            comment: value.comment.into(),
            user,
        })
    }
}

fn check_text(text: &str) -> AppResult<()> {
    check_length("text", text, 1, 1000)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CommentCreateRequest {
    #[schema(example = "The plumber will arrive tomorrow at 10:00")]
    pub text: String,
}

impl Validate for CommentCreateRequest {
    fn validate(&self) -> AppResult<()> {
        check_text(&self.text)
    }
}

/// Body of `POST /api/comments`, which names the request in the payload.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestCommentCreateRequest {
    pub request_id: i64,
    pub text: String,
}

impl Validate for RequestCommentCreateRequest {
    fn validate(&self) -> AppResult<()> {
        check_text(&self.text)
    }
}
