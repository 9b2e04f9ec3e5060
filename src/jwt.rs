use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};

use crate::app::AppState;
use crate::authz::Principal;
use crate::db::users::fetch_db_user;
use crate::errors::AppError;
use crate::models::user::User;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>, exp_hours: i64) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            exp_hours,
        }
    }

    /// `JWT_SECRET` is required; `JWT_EXP_HOURS` defaults to 24.
    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let exp_hours = match std::env::var("JWT_EXP_HOURS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a whole number of hours"))?,
            Err(_) => 24,
        };

        Ok(Self::new(secret, exp_hours))
    }

    pub fn encode(&self, user: &User) -> Result<String, AppError> {
        let claims = Claims::issue(user, self.exp_hours);
        let key = EncodingKey::from_secret(&self.secret);
        jsonwebtoken::encode(&Header::default(), &claims, &key).map_err(|err| AppError::token(err.to_string()))
    }

    /// Signature and `exp` are both checked.
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let key = DecodingKey::from_secret(&self.secret);
        jsonwebtoken::decode::<Claims>(token, &key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }
}

/// `role` is informational; the extractor trusts the stored role only.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    pub user_id: i64,
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    fn issue(user: &User, valid_for_hours: i64) -> Self {
        let issued = chrono::Utc::now();
        let expires = issued + chrono::Duration::hours(valid_for_hours);
        Self {
            sub: user.username.clone(),
            user_id: user.id,
            role: user.role.as_str().to_owned(),
            exp: expires.timestamp().max(0) as usize,
            iat: issued.timestamp() as usize,
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::trim).filter(|token| !token.is_empty())
}

/// The authenticated caller, reloaded from storage on every request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub principal: Principal,
}

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| AppError::unauthorized("Authorization header missing"))?;
        let claims = state.jwt.decode(token)?;

        let user: User = fetch_db_user(&state.pool, claims.user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("user no longer exists"))?
            .try_into()?;

        if !user.is_active {
            return Err(AppError::unauthorized("account is inactive"));
        }

        Ok(AuthUser {
            principal: Principal::new(user.id, user.role),
            user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{Role, UserStatus};

    fn user() -> User {
        let now = chrono::Utc::now();
        User {
            id: 42,
            username: "79160000042".into(),
            fullname: "Token Holder".into(),
            address: None,
            role: Role::Executor,
            status: UserStatus::Confirmed,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn token_round_trip_carries_identity() {
        let config = JwtConfig::new("test-secret", 1);
        let token = config.encode(&user()).unwrap();
        let claims = config.decode(&token).unwrap();
        assert_eq!(claims.sub, "79160000042");
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.role, "executor");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = JwtConfig::new("one", 1).encode(&user()).unwrap();
        assert!(matches!(JwtConfig::new("two", 1).decode(&token), Err(AppError::Token(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = JwtConfig::new("s", -2).encode(&user()).unwrap();
        assert!(JwtConfig::new("s", -2).decode(&token).is_err());
    }
}
