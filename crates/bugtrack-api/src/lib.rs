pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod shape;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use bugtrack_auth::SessionValidator;
use sea_orm::DatabaseConnection;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across handlers
pub struct AppState {
    pub db: DatabaseConnection,
    pub session_secret: String,
    pub session_hours: i64,
    pub sessions: SessionValidator,
}

impl AppState {
    pub fn new(db: DatabaseConnection, session_secret: String, session_hours: i64) -> Self {
        let sessions = SessionValidator::new(session_secret.as_bytes());
        Self {
            db,
            session_secret,
            session_hours,
            sessions,
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bugtrack API",
        version = "0.1.0",
        description = "REST API for project and ticket tracking"
    ),
    paths(
        handlers::health_check,
        handlers::session::signin,
        handlers::session::signout,
        handlers::session::current_session,
        handlers::users::signup,
        handlers::users::list,
        handlers::users::details,
        handlers::users::edit,
        handlers::users::delete,
        handlers::projects::create,
        handlers::projects::list,
        handlers::projects::details,
        handlers::projects::edit,
        handlers::projects::delete,
        handlers::projects::tickets,
        handlers::tickets::create,
        handlers::tickets::list,
        handlers::tickets::details,
        handlers::tickets::edit,
        handlers::tickets::delete,
        handlers::comments::create,
        handlers::comments::list,
        handlers::comments::details,
        handlers::comments::edit,
        handlers::comments::delete,
    ),
    components(
        schemas(
            models::ErrorResponse,
            models::HealthResponse,
            models::UserView,
            models::UserSummary,
            models::SigninRequest,
            models::SignupRequest,
            models::UserEditRequest,
        )
    ),
    tags(
        (name = "session", description = "Signin, signout, and session inspection"),
        (name = "users", description = "User accounts"),
        (name = "projects", description = "Projects and membership"),
        (name = "tickets", description = "Tickets and dev assignment"),
        (name = "comments", description = "Ticket comments"),
        (name = "system", description = "System health endpoints")
    )
)]
struct ApiDoc;

/// API server configuration
pub struct ApiServerConfig {
    /// Address to bind the API server
    pub bind_addr: SocketAddr,
    /// Session token secret (HS256)
    pub session_secret: String,
    /// Session validity in hours
    pub session_hours: i64,
    /// Dev mode: localhost CORS and unmasked 500s
    pub dev: bool,
}

/// API Server
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, db: DatabaseConnection) -> Self {
        let state = Arc::new(AppState::new(
            db,
            config.session_secret.clone(),
            config.session_hours,
        ));
        error::set_dev_mode(config.dev);

        Self { config, state }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let api_doc = ApiDoc::openapi();

        // Public routes: no session required
        let public_router = Router::new()
            .route("/health", get(handlers::health_check))
            .route(
                "/",
                post(handlers::session::signin).delete(handlers::session::signout),
            )
            .route("/users", post(handlers::users::signup))
            .with_state(self.state.clone());

        // Protected routes: session middleware loads the requester
        let protected_router = Router::new()
            .route("/", get(handlers::session::current_session))
            .route("/users", get(handlers::users::list))
            .route(
                "/users/{id}",
                get(handlers::users::details)
                    .put(handlers::users::edit)
                    .delete(handlers::users::delete),
            )
            .route(
                "/projects",
                get(handlers::projects::list).post(handlers::projects::create),
            )
            .route(
                "/projects/{id}",
                get(handlers::projects::details)
                    .put(handlers::projects::edit)
                    .delete(handlers::projects::delete),
            )
            .route("/projects/{id}/tickets", get(handlers::projects::tickets))
            .route(
                "/tickets",
                get(handlers::tickets::list).post(handlers::tickets::create),
            )
            .route(
                "/tickets/{id}",
                get(handlers::tickets::details)
                    .put(handlers::tickets::edit)
                    .delete(handlers::tickets::delete),
            )
            .route(
                "/comments",
                get(handlers::comments::list).post(handlers::comments::create),
            )
            .route(
                "/comments/{id}",
                get(handlers::comments::details)
                    .put(handlers::comments::edit)
                    .delete(handlers::comments::delete),
            )
            .with_state(self.state.clone())
            .layer(axum_middleware::from_fn_with_state(
                self.state.clone(),
                middleware::require_session,
            ));

        let router = Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api_doc))
            .merge(public_router)
            .merge(protected_router);

        // Cookie-credentialed CORS for local frontends, dev mode only
        let cors = if self.config.dev {
            use tower_http::cors::AllowOrigin;

            Some(
                CorsLayer::new()
                    .allow_methods([
                        Method::GET,
                        Method::POST,
                        Method::PUT,
                        Method::DELETE,
                    ])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
                    .allow_credentials(true)
                    .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
                        let origin = origin.to_str().unwrap_or("");
                        origin.starts_with("http://localhost:")
                            || origin.starts_with("http://127.0.0.1:")
                    })),
            )
        } else {
            None
        };

        let mut router = router.layer(TraceLayer::new_for_http());
        if let Some(cors) = cors {
            router = router.layer(cors);
        }

        router
    }

    /// Start the API server
    pub async fn start(self) -> Result<(), anyhow::Error> {
        let bind_addr = self.config.bind_addr;
        let router = self.build_router();

        info!("Starting API server on {}", bind_addr);
        info!("OpenAPI spec: http://{}/api-docs/openapi.json", bind_addr);
        info!("Swagger UI: http://{}/swagger-ui", bind_addr);

        let listener = tokio::net::TcpListener::bind(bind_addr).await?;

        axum::serve(listener, router)
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        // Ensure OpenAPI spec can be generated without panics
        let _api_doc = ApiDoc::openapi();
    }
}
