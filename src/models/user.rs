use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::errors::{AppError, AppResult};
use crate::extract::Validate;
use crate::utils::{check_length, check_optional_length};

pub const USERNAME_LENGTH: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Executor,
    Manager,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Client, Role::Executor, Role::Manager, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Executor => "executor",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| AppError::internal(format!("unknown role: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Confirmed,
    Blocked,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Pending => "pending",
            UserStatus::Confirmed => "confirmed",
            UserStatus::Blocked => "blocked",
        }
    }
}

impl FromStr for UserStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(UserStatus::Pending),
            "confirmed" => Ok(UserStatus::Confirmed),
            "blocked" => Ok(UserStatus::Blocked),
            other => Err(AppError::internal(format!("unknown user status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: i64,
    #[schema(example = "79161111111")]
    pub username: String,
    pub fullname: String,
    pub address: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl crate::events::Loggable for User {
    fn entity_type() -> &'static str { "user" }
    fn subject_id(&self) -> i64 { self.id }
}

/// What other parties get to see about a user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserPublic {
    pub id: i64,
    pub username: String,
    pub fullname: String,
    pub address: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub fullname: String,
    pub address: Option<String>,
    pub role: String,
    pub status: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbUser> for User {
    type Error = AppError;

    fn try_from(value: DbUser) -> Result<Self, Self::Error> {
        Ok(User {
            id: value.id,
            username: value.username,
            fullname: value.fullname,
            address: value.address,
            role: value.role.parse()?,
            status: value.status.parse()?,
            is_active: value.is_active,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

/// Row for inserting a user; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub fullname: String,
    pub address: Option<String>,
    pub role: Role,
    pub status: UserStatus,
}

fn check_username(username: &str) -> AppResult<()> {
    if username.len() != USERNAME_LENGTH || !username.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::validation(
            "username",
            format!("must be a phone number of {USERNAME_LENGTH} digits"),
        ));
    }
    Ok(())
}

fn check_password(password: &str) -> AppResult<()> {
    check_length("password", password, 6, 100)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "79161234567")]
    pub username: String,
    #[schema(example = "S3cureP@ss")]
    pub password: String,
    #[schema(example = "Ivanov Petr Sergeevich")]
    pub fullname: String,
    #[schema(example = "Lenina st. 10, apt. 12")]
    pub address: Option<String>,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> AppResult<()> {
        check_username(&self.username)?;
        check_password(&self.password)?;
        check_length("fullname", &self.fullname, 3, 255)?;
        check_optional_length("address", self.address.as_deref(), 0, 500)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "79161234567")]
    pub username: String,
    #[schema(example = "S3cureP@ss")]
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> AppResult<()> {
        check_length("username", &self.username, 1, 50)?;
        check_length("password", &self.password, 1, 100)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    #[schema(example = "bearer")]
    pub token_type: &'static str,
    pub user: User,
}

/// Self-service profile changes.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UserUpdateRequest {
    pub fullname: Option<String>,
    pub address: Option<String>,
    pub password: Option<String>,
}

impl Validate for UserUpdateRequest {
    fn validate(&self) -> AppResult<()> {
        check_optional_length("fullname", self.fullname.as_deref(), 3, 255)?;
        check_optional_length("address", self.address.as_deref(), 0, 500)?;
        if let Some(password) = self.password.as_deref() {
            check_password(password)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UserAdminUpdateRequest {
    pub fullname: Option<String>,
    pub address: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    pub is_active: Option<bool>,
}

impl UserAdminUpdateRequest {
    pub fn profile(&self) -> UserUpdateRequest {
        UserUpdateRequest {
            fullname: self.fullname.clone(),
            address: self.address.clone(),
            password: self.password.clone(),
        }
    }
}

impl Validate for UserAdminUpdateRequest {
    fn validate(&self) -> AppResult<()> {
        self.profile().validate()
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    /// Case-insensitive substring of username or fullname
    pub search: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(username: &str, password: &str, fullname: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
            fullname: fullname.to_string(),
            address: None,
        }
    }

    fn invalid_field(result: AppResult<()>) -> String {
        match result {
            Err(AppError::Validation { field, .. }) => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn registration_checks_each_field() {
        assert!(registration("79161234567", "secret1", "Ivan Ivanov").validate().is_ok());
        assert_eq!(invalid_field(registration("7916", "secret1", "Ivan").validate()), "username");
        assert_eq!(invalid_field(registration("7916123456x", "secret1", "Ivan").validate()), "username");
        assert_eq!(invalid_field(registration("79161234567", "123", "Ivan").validate()), "password");
        assert_eq!(invalid_field(registration("79161234567", "secret1", "Iv").validate()), "fullname");
    }

    #[test]
    fn role_round_trips_through_storage_text() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }
}
