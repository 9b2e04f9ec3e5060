use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{DefaultPolicyEvaluator, PolicyEvaluator};
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::lifecycle::TransitionMode;
use crate::routes::{activity, auth, comments, health, requests, settings, stats, users};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub policy: Arc<dyn PolicyEvaluator>,
    pub transitions: TransitionMode,
    pub events: EventBus,
}

impl AppState {
    /// State with a fresh event bus; nothing listens until `spawn_activity_listener`.
    pub fn new(pool: SqlitePool, jwt: JwtConfig, transitions: TransitionMode) -> Self {
        let (events, _) = init_event_bus();
        Self {
            pool,
            jwt: Arc::new(jwt),
            policy: Arc::new(DefaultPolicyEvaluator::new()),
            transitions,
            events,
        }
    }

    pub fn spawn_activity_listener(&self) {
        let rx = self.events.subscribe();
        tokio::spawn(start_activity_listener(rx, self.pool.clone()));
    }
}

/// All routes with state applied, no middleware.
pub fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let user_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/:id", get(users::get_user).put(users::update_user).delete(users::delete_user))
        .route("/:id/admin", put(users::update_user_admin));

    let request_routes = Router::new()
        .route("/", get(requests::list_requests).post(requests::create_request))
        .route(
            "/:id",
            get(requests::get_request)
                .put(requests::update_request)
                .delete(requests::delete_request),
        )
        .route("/:id/assign", post(requests::assign_request))
        .route(
            "/:id/comments",
            get(comments::list_comments).post(comments::create_request_comment),
        );

    let settings_routes = Router::new()
        .route("/", get(settings::list_settings))
        .route("/:key", get(settings::get_setting).put(settings::update_setting));

    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/requests", request_routes)
        .route("/comments", post(comments::create_comment))
        .route("/stats/dashboard", get(stats::dashboard))
        .nest("/settings", settings_routes)
        .route("/activity", get(activity::list_activity))
        .route("/health", get(health::health));

    Router::new().nest("/api", api).with_state(state)
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let transitions = TransitionMode::from_env()?;
    let state = AppState::new(pool, jwt_config, transitions);
    state.spawn_activity_listener();

    tracing::info!(?transitions, "application state ready");

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    Ok(router(state).layer(cors).layer(TraceLayer::new_for_http()))
}
