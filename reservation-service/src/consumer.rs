//! Consumer for `payment.failed` messages.
//!
//! By the time a payment fails, the reserved unit has already been converted
//! to a sale and the reservation marked completed; the status DAG has no
//! legal transition out of `completed` and the event service exposes no
//! sold-ticket decrement. The failure is therefore recorded for operator
//! reconciliation rather than unwound automatically.

use std::sync::Arc;
use tixie_broker::{Broker, Delivery, QueueConsumer};
use tixie_messages::{topics, PaymentFailed};
use tokio::sync::broadcast;

const QUEUE: &str = "reservation.payment_failed";

/// Run the consumer until shutdown.
pub async fn run(broker: Arc<Broker>, shutdown: broadcast::Sender<()>) {
    let consumer = QueueConsumer::builder()
        .name("payment-failed")
        .queue(QUEUE)
        .bind(topics::PAYMENT_FAILED)
        .broker(broker)
        .build();

    consumer
        .run(shutdown, |delivery| async move { process(delivery).await })
        .await;
}

async fn process(delivery: Delivery) {
    match serde_json::from_slice::<PaymentFailed>(&delivery.body) {
        Ok(message) => {
            tracing::error!(
                reservation_id = message.reservation_id,
                reason = %message.reason,
                "payment failed for completed reservation; manual reconciliation required"
            );
            if let Err(error) = delivery.ack().await {
                tracing::error!(error = %error, "failed to ack payment.failed message");
            }
        }
        Err(error) => {
            tracing::error!(error = %error, "poison payment.failed message, dropping");
            if let Err(error) = delivery.reject(false).await {
                tracing::error!(error = %error, "failed to reject poison message");
            }
        }
    }
}
