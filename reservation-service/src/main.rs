//! Reservation service binary.

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tixie_broker::Broker;
use tixie_reservation_service::clients::{
    EventServiceClient, TicketServiceClient, UserServiceClient,
};
use tixie_reservation_service::config::Config;
use tixie_reservation_service::expiry::Expirer;
use tixie_reservation_service::handlers::AppState;
use tixie_reservation_service::qr::QrClient;
use tixie_reservation_service::repo::ReservationRepository;
use tixie_reservation_service::{consumer, routes};
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

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?;

    let repo = ReservationRepository::new(pool);
    let events = EventServiceClient::new(http.clone(), config.event_service_url.clone());
    let users = UserServiceClient::new(http.clone(), config.user_service_url.clone());
    let tickets = TicketServiceClient::new(http.clone(), config.ticket_service_url.clone());
    let qr = QrClient::new(http, config.qr_decoder_url.clone());

    let broker = match &config.rabbitmq_url {
        Some(url) => match Broker::open(url.clone(), config.exchange.clone()).await {
            Ok(broker) => Some(Arc::new(broker)),
            Err(error) => {
                tracing::warn!(error = %error, "broker unavailable, publishing disabled");
                None
            }
        },
        None => None,
    };

    let (shutdown_tx, _) = broadcast::channel(1);
    let expirer = Expirer::new(
        repo.clone(),
        events.clone(),
        broker.clone(),
        shutdown_tx.clone(),
    );

    let sweeper_handle = tokio::spawn(
        expirer
            .clone()
            .run_sweeper(Duration::from_secs(config.sweep_interval_secs)),
    );
    let consumer_handle = broker
        .as_ref()
        .map(|broker| tokio::spawn(consumer::run(Arc::clone(broker), shutdown_tx.clone())));

    let state = AppState {
        repo,
        events,
        users,
        tickets,
        qr,
        expirer,
        broker: broker.clone(),
    };

    let app = routes::build_router(state);
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "reservation service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(tixie_web::shutdown::wait_for_signal())
        .await?;

    let _ = shutdown_tx.send(());
    let _ = sweeper_handle.await;
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
