use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tradebook::ledger::LedgerCoordinator;
use tradebook::reporting::Reporter;
use tradebook::store::{SqliteLedgerStore, SqlitePositionStore};
use tradebook::{api, config::Config, store::init_db};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let op_timeout = Duration::from_millis(config.store_timeout_ms);
    let trades = Arc::new(SqliteLedgerStore::new(pool.clone(), op_timeout));
    let positions = Arc::new(SqlitePositionStore::new(pool, op_timeout));

    let coordinator = Arc::new(LedgerCoordinator::new(trades, positions.clone()));
    let reporter = Arc::new(Reporter::new(positions, config.reference_price));

    // Create router
    let app = api::create_router(api::AppState::new(coordinator, reporter));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
