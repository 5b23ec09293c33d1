use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use quotebook::config::AppConfig;
use quotebook::db;
use quotebook::routes;
use quotebook::services::email::dev::LogEmailProvider;
use quotebook::services::email::smtp::SmtpEmailProvider;
use quotebook::services::email::EmailProvider;
use quotebook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    if config.jwt_secret == "changeme" {
        tracing::warn!("JWT_SECRET is not set, using the development default");
    }

    let conn = db::init_db(&config.database_url)?;

    let email: Arc<dyn EmailProvider> = if config.smtp_host.is_empty() {
        tracing::info!("SMTP_HOST not set, emails will only be logged");
        Arc::new(LogEmailProvider)
    } else {
        tracing::info!(host = %config.smtp_host, port = config.smtp_port, "using SMTP email provider");
        Arc::new(SmtpEmailProvider::new(
            &config.smtp_host,
            config.smtp_port,
            config.smtp_username.clone(),
            config.smtp_password.clone(),
            &config.mail_from,
            &config.mail_from_name,
        )?)
    };

    let addr = format!("0.0.0.0:{}", config.port);
    let state = Arc::new(AppState::new(conn, config, email));
    let app = routes::router(state);

    tracing::info!("starting server on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
