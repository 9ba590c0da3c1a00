// ⚙️ Configuration - CLI arguments with environment fallbacks
// The binaries load a `.env` file before parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Development-only signing secret, long enough to pass validation
pub const DEV_JWT_SECRET: &str = "dev-mode-secret-not-for-production-use-123456";

/// Seven days
pub const DEFAULT_JWT_EXPIRY_SECONDS: u64 = 7 * 24 * 60 * 60;

/// REST server for cattle weighing sheets
#[derive(Parser, Debug, Clone)]
#[command(name = "cattle-server")]
#[command(about = "REST API for cattle weighing sheets")]
pub struct ServerArgs {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: std::net::SocketAddr,

    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "cattle.db")]
    pub database_path: PathBuf,

    /// Secret for signing bearer tokens (required unless --dev-mode)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Token lifetime in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value_t = DEFAULT_JWT_EXPIRY_SECONDS)]
    pub jwt_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Development mode: signs tokens with a fixed, public secret
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,
}

impl ServerArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.dev_mode {
            return Ok(());
        }

        match self.jwt_secret.as_deref() {
            None | Some("") => Err("JWT_SECRET is required outside dev mode".to_string()),
            Some(secret) if secret.len() < 32 => {
                Err("JWT_SECRET must be at least 32 characters".to_string())
            }
            Some(_) => Ok(()),
        }
    }

    /// The secret tokens are signed with
    pub fn signing_secret(&self) -> String {
        match (&self.jwt_secret, self.dev_mode) {
            (Some(secret), _) if !secret.is_empty() => secret.clone(),
            _ => DEV_JWT_SECRET.to_string(),
        }
    }
}

/// Maintenance tool for the weighing database
#[derive(Parser, Debug)]
#[command(name = "cattle-weighing")]
#[command(about = "Maintenance commands for the cattle weighing database")]
pub struct CliArgs {
    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "cattle.db")]
    pub database_path: PathBuf,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Create the schema
    InitDb,

    /// Create an ADMIN account if the email is not registered yet
    CreateAdmin {
        #[arg(long)]
        email: String,

        #[arg(long, env = "ADMIN_PASSWORD")]
        password: String,

        /// Legal id of the admin's person record
        #[arg(long, default_value = "0000000000")]
        legal_id: String,

        #[arg(long, default_value = "Admin")]
        name: String,
    },

    /// Intake persons from a CSV with headers legal_id,name,phone
    ImportPersons { path: PathBuf },

    /// Recompute every person's name key from the display name
    BackfillNameKeys,
}

/// Install the global subscriber. `RUST_LOG` wins over `log_level`.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "cattle_weighing={level},cattle_server={level},tower_http={level},info",
            level = log_level
        ))
    });

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
