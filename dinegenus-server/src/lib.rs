mod auth;
mod config;
mod context;
mod docs;
mod errors;
pub mod logging;
mod rooms;
mod schemas;
mod serialized;
mod sse;

use std::{
    io,
    net::{Ipv6Addr, SocketAddr},
};

use axum::routing::get;
use log::info;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use config::*;
pub use context::ServerContext;

pub type Router = axum::Router<ServerContext>;

#[derive(Debug, Error)]
pub enum ServerStartError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Could not listen on port {port}: {source}")]
    Listen { port: u16, source: io::Error },
    #[error("Server stopped unexpectedly: {0}")]
    Serve(io::Error),
}

impl ServerStartError {
    pub fn hint(&self) -> String {
        match self {
            Self::Config(_) => "Check the DINEGENUS_* environment variables.".to_string(),
            Self::Listen { .. } => {
                "Another process may be using the port. Set DINEGENUS_SERVER_PORT to use another one."
                    .to_string()
            }
            Self::Serve(_) => "This error is fatal, and should not happen.".to_string(),
        }
    }
}

/// Builds the http surface of the server
pub fn router(context: ServerContext) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let rooms_router = rooms::router().merge(sse::router());

    Router::new()
        .nest("/v1/rooms", rooms_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context)
}

/// Starts the dinegenus server
pub async fn run_server(config: ServerConfig) -> Result<(), ServerStartError> {
    let context = ServerContext::new(&config)?;
    let collab = context.collab.clone();

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, config.port).into();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerStartError::Listen {
            port: config.port,
            source,
        })?;

    info!("Listening on port {}", config.port);

    let result = axum::serve(listener, router(context).into_make_service()).await;

    collab.dispose();
    result.map_err(ServerStartError::Serve)
}
