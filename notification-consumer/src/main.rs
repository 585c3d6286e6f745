//! Notification consumer binary.

use std::sync::Arc;
use std::time::Duration;
use tixie_broker::Broker;
use tixie_notification_consumer::config::Config;
use tixie_notification_consumer::consumer;
use tixie_notification_consumer::mailer::Mailer;
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

    let config = Config::from_env()?;
    let broker = Arc::new(Broker::open(config.rabbitmq_url.clone(), config.exchange.clone()).await?);

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;
    let mailer = Arc::new(Mailer::new(
        http,
        config.mailersend_api_url.clone(),
        config.mailersend_api_key.clone(),
        config.mailersend_email.clone(),
        config.from_name.clone(),
        config.mailersend_template_id.clone(),
    ));

    let (shutdown_tx, _) = broadcast::channel(1);
    let handle = tokio::spawn(consumer::run(
        Arc::clone(&broker),
        mailer,
        shutdown_tx.clone(),
    ));

    tracing::info!("notification consumer started, waiting for messages");

    tixie_web::shutdown::wait_for_signal().await;
    let _ = shutdown_tx.send(());
    let _ = handle.await;

    if let Err(error) = broker.close().await {
        tracing::warn!(error = %error, "broker close failed");
    }

    Ok(())
}
