pub mod envelope;
pub mod health;
pub mod portfolio;
pub mod trades;

use crate::ledger::LedgerCoordinator;
use crate::reporting::Reporter;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<LedgerCoordinator>,
    pub reporter: Arc<Reporter>,
}

impl AppState {
    pub fn new(coordinator: Arc<LedgerCoordinator>, reporter: Arc<Reporter>) -> Self {
        Self {
            coordinator,
            reporter,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/trades",
            get(trades::list_trades).post(trades::create_trade),
        )
        .route(
            "/api/trades/:id",
            get(trades::get_trade)
                .patch(trades::update_trade)
                .delete(trades::delete_trade),
        )
        .route("/api/portfolio", get(portfolio::get_portfolio))
        .route("/api/portfolio/returns", get(portfolio::get_returns))
        .layer(cors)
        .with_state(state)
}
