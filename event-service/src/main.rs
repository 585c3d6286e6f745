//! Event service binary.

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tixie_broker::Broker;
use tixie_event_service::config::Config;
use tixie_event_service::handlers::AppState;
use tixie_event_service::repo::EventRepository;
use tixie_event_service::{consumer, routes};
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let repo = EventRepository::new(pool);

    let broker = match &config.rabbitmq_url {
        Some(url) => match Broker::open(url.clone(), config.exchange.clone()).await {
            Ok(broker) => Some(Arc::new(broker)),
            Err(error) => {
                tracing::warn!(error = %error, "broker unavailable, event.created consumer disabled");
                None
            }
        },
        None => None,
    };

    let (shutdown_tx, _) = broadcast::channel(1);
    let consumer_handle = broker.as_ref().map(|broker| {
        tokio::spawn(consumer::run(
            Arc::clone(broker),
            repo.clone(),
            shutdown_tx.clone(),
        ))
    });

    let app = routes::build_router(AppState { repo });
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "event service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(tixie_web::shutdown::wait_for_signal())
        .await?;

    let _ = shutdown_tx.send(());
    if let Some(handle) = consumer_handle {
        let _ = handle.await;
    }
    if let Some(broker) = broker {
        if let Err(error) = broker.close().await {
            tracing::warn!(error = %error, "broker close failed");
        }
    }

    Ok(())
}
