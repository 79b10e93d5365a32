use std::net::SocketAddr;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pesquisa_eleitoral::api::{self, AppState};
use pesquisa_eleitoral::auth::password;
use pesquisa_eleitoral::config::AppConfig;
use pesquisa_eleitoral::database::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pesquisa_eleitoral=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting pesquisa-eleitoral API");

    // Load configuration
    let config = AppConfig::load()?;
    if config.uses_dev_secret() {
        warn!("JWT_SECRET is not set; using the development secret");
    }
    info!("Configuration loaded");

    // Initialize database
    let database = Database::new(&config.database_url).await?;
    info!("Database connected");

    database.run_migrations().await?;
    info!("Database migrations completed");

    // Bootstrap admin
    if let (Some(email), Some(senha)) = (&config.admin_email, &config.admin_password) {
        let senha_hash = password::hash_password(senha)?;
        if database.ensure_admin(email, &senha_hash).await? {
            info!("Created bootstrap admin {}", email);
        }
    }

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    let state = AppState::new(config, database);
    if state.whatsapp.is_none() {
        info!("WhatsApp sending disabled (no phone number id or access token)");
    }

    let app = api::router(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
