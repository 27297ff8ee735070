// Casino Ledger - Web Server
// REST API with Axum over the same SQLite ledger the terminal UI uses

use anyhow::{Context, Result};
use casino_ledger::api::{router, AppState};
use casino_ledger::{Config, Database};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "0.0.0.0:3000";

// One thread: requests are handled one after another
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;
    let db = Database::from_config(&config);
    db.init()
        .with_context(|| format!("opening database {:?}", config.database_path))?;

    let app = router(AppState::new(db));

    let addr = std::env::var("LEDGER_SERVER_ADDR")
        .ok()
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    info!("Server running on http://{}", addr);
    info!("API: http://{}/api/casinos", addr);

    axum::serve(listener, app).await.context("server stopped")?;
    Ok(())
}
