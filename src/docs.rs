use std::sync::Arc;

use axum::{routing::get, Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::server::Server;
use utoipa::openapi::ComponentsBuilder;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::{authz, events, models, routes};

#[derive(OpenApi)]
#[openapi(
	info(title = "housing-desk", description = "Maintenance requests for a housing-management organization"),
	paths(
		routes::auth::register,
		routes::auth::login,
		routes::auth::me,
		routes::users::list_users,
		routes::users::get_user,
		routes::users::update_user,
		routes::users::update_user_admin,
		routes::users::delete_user,
		routes::requests::list_requests,
		routes::requests::get_request,
		routes::requests::create_request,
		routes::requests::update_request,
		routes::requests::assign_request,
		routes::requests::delete_request,
		routes::comments::list_comments,
		routes::comments::create_request_comment,
		routes::comments::create_comment,
		routes::stats::dashboard,
		routes::settings::list_settings,
		routes::settings::get_setting,
		routes::settings::update_setting,
		routes::activity::list_activity,
		routes::health::health
	),
	components(
		schemas(
			models::user::Role,
			models::user::UserStatus,
			models::user::User,
			models::user::UserPublic,
			models::user::RegisterRequest,
			models::user::LoginRequest,
			models::user::TokenResponse,
			models::user::UserUpdateRequest,
			models::user::UserAdminUpdateRequest,
			models::request::RequestStatus,
			models::request::RequestType,
			models::request::ServiceRequest,
			models::request::RequestWithParties,
			models::request::RequestCreateRequest,
			models::request::RequestUpdateRequest,
			models::request::AssignRequest,
			models::comment::Comment,
			models::comment::CommentWithUser,
			models::comment::CommentCreateRequest,
			models::comment::RequestCommentCreateRequest,
			models::setting::SystemSetting,
			models::setting::SettingUpdateRequest,
			models::stats::DashboardStats,
			models::activity::ActivityEntry,
			events::Severity,
			authz::DenyReason,
			routes::health::HealthResponse
		)
	),
	modifiers(&SecurityAddon),
	tags(
		(name = "Auth", description = "Registration, login and the current user"),
		(name = "Users", description = "User accounts"),
		(name = "Requests", description = "Maintenance requests and their lifecycle"),
		(name = "Comments", description = "Discussion on a request"),
		(name = "Stats", description = "Dashboard counters"),
		(name = "Settings", description = "System settings"),
		(name = "Activity", description = "Audit trail of mutations"),
		(name = "Health", description = "Liveness")
	)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		let components = openapi
			.components
			.get_or_insert_with(|| ComponentsBuilder::new().build());

		components.add_security_scheme(
			"bearerAuth",
			SecurityScheme::Http(
				HttpBuilder::new()
					.scheme(HttpAuthScheme::Bearer)
					.bearer_format("JWT")
					.build(),
			),
		);
	}
}

fn tls_enabled() -> bool {
	std::env::var("TLS_CERT_PATH").is_ok() && std::env::var("TLS_KEY_PATH").is_ok()
}

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = ApiDoc::openapi();

	let scheme = if tls_enabled() { "https" } else { "http" };
	doc.servers = Some(vec![Server::new(format!("{scheme}://localhost:{port}"))]);

	Ok(doc)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn every_route_is_documented() {
		let doc = build_openapi(8000).unwrap();
		let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

		for expected in [
			"/api/auth/login",
			"/api/users/{id}/admin",
			"/api/requests/{id}/assign",
			"/api/requests/{id}/comments",
			"/api/comments",
			"/api/stats/dashboard",
			"/api/settings/{key}",
			"/api/activity",
			"/api/health",
		] {
			assert!(paths.contains(&expected), "missing {expected}");
		}

		let schemes = doc.components.unwrap().security_schemes;
		assert!(schemes.contains_key("bearerAuth"));
	}
}
