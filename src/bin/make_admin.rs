//! Grants or revokes the admin flag for an existing user.
//!
//! ```bash
//! cargo run --bin make-admin -- ada@example.com
//! cargo run --bin make-admin -- ada@example.com --revoke
//! ```

use clap::Parser;
use tracing_subscriber::EnvFilter;

use quotebook::config::AppConfig;
use quotebook::db::{self, queries};
use quotebook::services::validation::normalize_email;

#[derive(Parser)]
#[command(name = "make-admin", about = "Grant or revoke admin access for a user")]
struct Args {
    /// Email of an existing, verified user
    email: String,

    /// Remove the admin flag instead of granting it
    #[arg(long)]
    revoke: bool,

    /// Database path override (defaults to DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let database_url = args
        .database_url
        .unwrap_or_else(|| AppConfig::from_env().database_url);
    let email = normalize_email(&args.email).map_err(|e| anyhow::anyhow!("{e}"))?;

    let conn = db::init_db(&database_url)?;
    let grant = !args.revoke;
    anyhow::ensure!(
        queries::set_admin_by_email(&conn, &email, grant)?,
        "no user registered with {email}"
    );

    if grant {
        tracing::info!(email = %email, "admin access granted");
    } else {
        tracing::info!(email = %email, "admin access revoked");
    }
    Ok(())
}
