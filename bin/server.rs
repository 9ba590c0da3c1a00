// Cattle Weighing - Web Server
// REST API with Axum over the SQLite store

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

use cattle_weighing::api::{router, AppState, TokenIssuer};
use cattle_weighing::config::{init_tracing, ServerArgs};
use cattle_weighing::SqliteStore;

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = ServerArgs::parse();
    init_tracing(&args.log_level);

    if let Err(message) = args.validate() {
        bail!("Invalid configuration: {}", message);
    }
    if args.dev_mode {
        warn!("Dev mode: tokens are signed with a public secret");
    }

    println!("🌐 Cattle Weighing - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let store = SqliteStore::open(&args.database_path)
        .with_context(|| format!("Failed to open database {:?}", args.database_path))?;
    println!("✓ Database opened: {:?}", args.database_path);

    let tokens = TokenIssuer::new(args.signing_secret(), args.jwt_expiry_seconds)?;
    let state = AppState::new(Arc::new(store), tokens);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", args.listen))?;

    info!("Listening on {}", args.listen);
    println!("\n🚀 Server running on http://{}", args.listen);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
