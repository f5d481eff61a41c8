//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the relay endpoint
//! - Wire up middleware (request ID, tracing)
//! - Bind server to listener with graceful shutdown
//! - Hand each call to its own relay task and stream the output back

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, RawQuery, State},
    http::HeaderMap,
    response::Response,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::config::RelayConfig;
use crate::http::params::RelayParams;
use crate::http::{request, response};
use crate::lifecycle::signals::shutdown_signal;
use crate::relay::{RelayEngine, ScriptWriter, SetupError};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RelayEngine>,
    pub channel_capacity: usize,
}

/// HTTP server for the relay.
pub struct RelayServer {
    router: Router,
    config: RelayConfig,
}

impl RelayServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RelayConfig) -> Result<Self, SetupError> {
        let engine = Arc::new(RelayEngine::from_config(&config)?);
        let state = AppState {
            engine,
            channel_capacity: config.relay.channel_capacity,
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        Router::new()
            .route(&config.relay.path, get(relay_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(request::set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(request::propagate_request_id_layer()),
            )
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            path = %self.config.relay.path,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// Relay endpoint.
/// Parses the call, starts the relay task and returns the statement stream.
async fn relay_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let request_id = request::request_id(&headers).to_string();

    let params = match RelayParams::from_query(query.as_deref().unwrap_or_default()) {
        Ok(p) => p.with_client(request::client_identity(peer, &headers)),
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Rejecting relay call");
            return response::bad_request(e);
        }
    };

    let span = tracing::info_span!(
        "relay",
        request_id = %request_id,
        object = %params.object,
        client = %peer.ip(),
    );
    let (mut writer, statements) = ScriptWriter::channel(params.object, state.channel_capacity);
    let engine = state.engine.clone();
    let candidate = params.candidate;

    tokio::spawn(
        async move {
            engine.relay(candidate, &mut writer).await;
        }
        .instrument(span),
    );

    response::script_response(statements)
}
