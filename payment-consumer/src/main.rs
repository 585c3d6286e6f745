//! Payment consumer binary.

use std::sync::Arc;
use std::time::Duration;
use tixie_broker::Broker;
use tixie_payment_consumer::config::Config;
use tixie_payment_consumer::payment::PaymentClient;
use tixie_payment_consumer::worker::{self, Context};
use tokio::sync::broadcast;

/// Grace window for in-flight deliveries after shutdown is signalled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let broker = Arc::new(Broker::open(config.rabbitmq_url.clone(), config.exchange.clone()).await?);

    let call_timeout = Duration::from_secs(config.payment_timeout_secs);
    let http = reqwest::Client::builder().timeout(call_timeout).build()?;
    let payments = PaymentClient::new(
        http,
        config.payment_provider_url.clone(),
        config.secret_key.clone(),
        call_timeout,
    );

    let (shutdown_tx, _) = broadcast::channel(1);
    let ctx = Arc::new(Context {
        broker: Arc::clone(&broker),
        payments,
    });

    let pool = tokio::spawn(worker::run(
        ctx,
        config.num_workers,
        config.prefetch_count,
        shutdown_tx.clone(),
    ));

    tracing::info!(
        workers = config.num_workers,
        prefetch = config.prefetch_count,
        "payment consumer started, waiting for reservation completions"
    );

    tixie_web::shutdown::wait_for_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(SHUTDOWN_GRACE, pool).await {
        Ok(_) => tracing::info!("all workers completed gracefully"),
        Err(_) => tracing::warn!("shutdown timed out waiting for workers"),
    }

    // Unacked in-flight deliveries are redelivered on reconnect.
    if let Err(error) = broker.close().await {
        tracing::warn!(error = %error, "broker close failed");
    }

    Ok(())
}
