use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::OpenApi;

pub mod error;
pub mod handlers;
pub mod middleware_hooks;
pub mod models;
pub mod server;


// Re-export server functions for convenience
pub use server::{start_server_with_config, ApiConfig};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub user_manager: Arc<user::UserManager>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(user_manager: Arc<user::UserManager>, config: ApiConfig) -> Self {
        Self {
            user_manager,
            config: Arc::new(config),
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::signup,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::refresh_access,
        handlers::auth::logout,
        handlers::auth::get_current_user,
        handlers::users::get_user,
        handlers::health::health_check,
    ),
    components(
        schemas(
            models::LoginRequest,
            models::UserResponse,
            models::SignupRequest,
            models::SignupResponse,
            models::UserProfileResponse,
            models::RefreshRequest,
            models::RefreshAccessRequest,
            models::TokenPairResponse,
            models::AccessTokenResponse,
            models::MessageResponse,
            models::HealthResponse,
            models::DatabaseHealth,
            error::ApiErrorResponse,
            error::ErrorDetail,
        )
    ),
    tags(
        (name = "auth", description = "Login, signup and token cookie management"),
        (name = "users", description = "User-scoped resources"),
        (name = "health", description = "Health check endpoints"),
    ),
    info(
        title = "Exptrack API",
        version = "1.0.0",
        description = "REST API for the exptrack personal finance tracker",
    ),
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Create the main API router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);

    Router::new()
        // Authentication endpoints
        .route("/auth/signup", post(handlers::auth::signup))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/login/refresh", post(handlers::auth::refresh))
        .route(
            "/auth/login/refresh-access",
            post(handlers::auth::refresh_access),
        )
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::get_current_user))
        // User-scoped resources
        .route("/api/users/:user_id", get(handlers::users::get_user))
        // Public endpoints
        .route("/api/public/health", get(handlers::health::health_check))
        .route("/api/public/openapi.json", get(openapi_json))
        // Authentication runs innermost, after request/response hooks
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middleware_hooks::authentication_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middleware_hooks::request_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middleware_hooks::response_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
