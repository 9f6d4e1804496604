//! Storefront Catalog service

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_catalog::config::Config;
use storefront_catalog::http::{router, AppState};
use storefront_catalog::publisher::EventPublisher;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let db = PgPoolOptions::new().max_connections(config.db_max_connections).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let events = match config.nats_url.as_deref() {
        Some(url) => match async_nats::connect(url).await {
            Ok(client) => EventPublisher::new(Some(client)),
            Err(e) => {
                tracing::warn!(%url, error = %e, "NATS unavailable, domain events will not be published");
                EventPublisher::disabled()
            }
        },
        None => EventPublisher::disabled(),
    };

    let port = config.port;
    let app = router(AppState::new(db, events, config));
    tracing::info!(port, "Storefront catalog listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(("0.0.0.0", port)).await?, app).await?;
    Ok(())
}
