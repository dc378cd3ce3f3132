//! HTTP API built on axum.
//!
//! [`router`] wires every route to its handler. Public routes are `/health` and
//! `/auth/login`; everything else sits behind the session middleware, and the
//! user, role and menu administration additionally behind the admin check.

pub mod error;
pub mod handlers;
pub mod session;

use crate::{config::server::ServerConfig, errors::Result};
use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{get, post, put},
};
use handlers::{auth, dashboard, invoices, menus, orders, roles, tracking, users};
use sea_orm::DatabaseConnection;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// `DatabaseConnection` is not `Clone` with sea-orm's `mock` feature
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(db: DatabaseConnection, config: ServerConfig) -> Self {
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
        }
    }
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                error!(%origin, error = %e, "Ignoring invalid CORS origin");
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
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60))
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/users", get(users::list).post(users::create))
        .route(
            "/users/:id",
            get(users::get).put(users::update).delete(users::delete),
        )
        .route("/roles", get(roles::list).post(roles::create))
        .route("/roles/:id", put(roles::update).delete(roles::delete))
        .route(
            "/roles/:id/menus",
            get(roles::menus).put(roles::assign_menus),
        )
        .route("/menus", get(menus::list).post(menus::create))
        .route("/menus/:id", put(menus::update).delete(menus::delete))
        .route_layer(middleware::from_fn(session::require_admin));

    let protected = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/session", get(auth::session))
        .route("/navigation", get(auth::navigation))
        .route("/submit-rs1", post(orders::submit_rs1))
        .route("/submit-rs2", post(orders::submit_rs2))
        .route("/orders", get(orders::list))
        .route(
            "/orders/:id",
            get(orders::get).put(orders::update).delete(orders::delete),
        )
        .route("/tracking-samples", get(tracking::list))
        .route("/tracking-samples/:id", get(tracking::get))
        .route("/tracking-samples/step1", post(tracking::sent))
        .route("/tracking-samples/step2", post(tracking::received))
        .route("/tracking-samples/step3", post(tracking::preparation))
        .route("/tracking-samples/step4", post(tracking::analysis))
        .route("/tracking-samples/step5", post(tracking::roa_issued))
        .route("/tracking-samples/step6", post(tracking::coa_issued))
        .route(
            "/pi-hantaran",
            get(invoices::list_hantaran).post(invoices::create_hantaran),
        )
        .route(
            "/pi-hantaran/next-number",
            get(invoices::next_hantaran_number),
        )
        .route(
            "/pi-hantaran/:id",
            get(invoices::get_hantaran).delete(invoices::delete_hantaran),
        )
        .route("/pi-hantaran/:id/pdf", get(invoices::hantaran_pdf))
        .route(
            "/pi-shipment",
            get(invoices::list_shipments).post(invoices::create_shipment),
        )
        .route(
            "/pi-shipment/next-number",
            get(invoices::next_shipment_number),
        )
        .route(
            "/pi-shipment/:id",
            get(invoices::get_shipment).delete(invoices::delete_shipment),
        )
        .route("/pi-shipment/:id/pdf", get(invoices::shipment_pdf))
        .route("/dashboard/summary", get(dashboard::summary))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ));

    Router::new()
        .route("/health", get(auth::health))
        .route("/auth/login", post(auth::login))
        .merge(protected)
        .layer(middleware::map_response_with_state(
            state.clone(),
            error::mask_server_errors,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .with_state(state)
}

/// Binds the listener and serves until Ctrl+C or SIGTERM.
pub async fn serve(config: ServerConfig, db: DatabaseConnection) -> Result<()> {
    let address = config.bind_addr.clone();
    let app = router(AppState::new(db, config));

    let listener = TcpListener::bind(address.as_str()).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
