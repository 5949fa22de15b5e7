//! HTTP and WebSocket gateway for Joi.
//!
//! Exposes a health check and the `/ws/{client_id}` chat socket. Each
//! socket gets its own session; the session lives as long as the socket.
//!
//! Built on Axum.

pub mod ws;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{Router, extract::State, response::Json, routing::get};
use serde::Serialize;
use std::collections::BTreeMap;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use joi_agent::TurnRunner;
use joi_config::{AppConfig, GatewayConfig};
use joi_core::session::SessionStore;
use joi_providers::AdapterRouter;

/// Shared application state for the gateway.
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub runner: Arc<TurnRunner>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(sessions: Arc<SessionStore>, runner: Arc<TurnRunner>) -> Self {
        Self { sessions, runner }
    }

    /// Build adapters, tools, the system prompt and the session store once.
    pub fn from_config(config: &AppConfig) -> Self {
        let adapters = Arc::new(joi_providers::build_from_config(config));
        let tools = Arc::new(joi_tools::default_registry(&config.tools));

        let system_prompt = config
            .system_prompt_override
            .clone()
            .unwrap_or_else(|| joi_core::prompt::system_prompt(&tools));
        let sessions = Arc::new(SessionStore::new(system_prompt, &config.default_model));
        let runner = Arc::new(TurnRunner::from_config(adapters, tools, config));

        Self::new(sessions, runner)
    }

    pub fn adapters(&self) -> &AdapterRouter {
        self.runner.adapters()
    }
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, gateway: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws/{client_id}", get(ws::ws_handler))
        .layer(cors_layer(&gateway.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS restricted to the configured origins. Unparseable origins are
/// skipped with a warning.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = Arc::new(AppState::from_config(&config));

    for (model, configured) in state.adapters().availability() {
        if !configured {
            warn!(model = %model, "No API key configured; requests to this model will fail");
        }
    }

    let app = build_router(state, &config.gateway);

    info!(addr = %addr, default_model = %config.default_model, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    models: BTreeMap<String, bool>,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        models: state.adapters().availability(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        let mut config = AppConfig::default();
        config.tools.workspace_dir = Some(std::env::temp_dir().join("joi-gateway-tests"));
        config.tools.enable_app_launcher = false;
        Arc::new(AppState::from_config(&config))
    }

    #[tokio::test]
    async fn health_endpoint_reports_models() {
        let app = build_router(test_state(), &GatewayConfig::default());

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["models"]["openai"].is_boolean());
        assert!(json["models"]["gemini"].is_boolean());
    }

    #[tokio::test]
    async fn ws_route_exists() {
        let app = build_router(test_state(), &GatewayConfig::default());

        // Without upgrade headers the extractor rejects the request, but the
        // route must exist.
        let req = Request::builder().uri("/ws/web").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_ne!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_allows_configured_origin_only() {
        let app = build_router(test_state(), &GatewayConfig::default());

        let req = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://localhost:5174")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:5174"
        );

        let req = Request::builder()
            .uri("/health")
            .header(header::ORIGIN, "http://evil.example")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[test]
    fn custom_system_prompt_replaces_builtin() {
        let mut config = AppConfig::default();
        config.system_prompt_override = Some("Be terse.".into());
        config.tools.enable_app_launcher = false;
        let state = AppState::from_config(&config);
        assert_eq!(state.sessions.system_prompt(), "Be terse.");
        assert_eq!(state.sessions.default_model(), "openai");
    }
}
