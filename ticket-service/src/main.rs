//! Ticket service binary.

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tixie_broker::Broker;
use tixie_ticket_service::clients::{
    EventServiceClient, ReservationServiceClient, UserServiceClient,
};
use tixie_ticket_service::config::Config;
use tixie_ticket_service::consumer::{self, Issuer};
use tixie_ticket_service::handlers::AppState;
use tixie_ticket_service::repo::TicketRepository;
use tixie_ticket_service::routes;
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

    let config = Arc::new(Config::from_env());

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?;

    let repo = TicketRepository::new(pool);
    let events = EventServiceClient::new(http.clone(), config.event_service_url.clone());
    let users = UserServiceClient::new(http.clone(), config.user_service_url.clone());
    let reservations =
        ReservationServiceClient::new(http, config.reservation_service_url.clone());

    let broker = match &config.rabbitmq_url {
        Some(url) => match Broker::open(url.clone(), config.exchange.clone()).await {
            Ok(broker) => Some(Arc::new(broker)),
            Err(error) => {
                tracing::warn!(error = %error, "broker unavailable, ticket issuance consumer disabled");
                None
            }
        },
        None => None,
    };

    let (shutdown_tx, _) = broadcast::channel(1);
    let consumer_handle = broker.as_ref().map(|broker| {
        let issuer = Arc::new(Issuer {
            repo: repo.clone(),
            reservations,
            users: users.clone(),
            broker: Arc::clone(broker),
        });
        tokio::spawn(consumer::run(issuer, shutdown_tx.clone()))
    });

    let state = AppState {
        repo,
        events,
        users,
        broker: broker.clone(),
        config: Arc::clone(&config),
        shutdown: shutdown_tx.clone(),
    };

    let app = routes::build_router(state);
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "ticket service listening");

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
