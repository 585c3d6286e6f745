//! The per-message state machine and the worker pool that drives it.
//!
//! | Outcome | Control action | Compensating publish |
//! |---|---|---|
//! | decode error | reject, no requeue | none (poison) |
//! | payment success | ack | `payment.processed` |
//! | provider rejection | reject, no requeue | `payment.failed` |
//! | breaker open / timeout / transport | reject, requeue | none |
//! | outcome publish failed | reject, requeue | none |

use crate::payment::{PaymentClient, PaymentError, PaymentIntent};
use std::sync::Arc;
use tixie_broker::{Broker, Delivery, QueueConsumer};
use tixie_messages::{topics, PaymentFailed, PaymentProcessed, ReservationCompleted};
use tokio::sync::broadcast;

const QUEUE: &str = "payment_reservation_completed";

/// What to do with a delivery once the charge attempt resolved.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    /// Charge went through: publish `payment.processed`, then ack.
    PublishProcessed,
    /// Provider said no: publish `payment.failed`, then drop the message.
    PublishFailed,
    /// Transient trouble: requeue for a later attempt.
    Requeue,
}

/// Classify a charge attempt into its control action.
#[must_use]
pub fn classify(result: &Result<PaymentIntent, PaymentError>) -> Action {
    match result {
        Ok(_) => Action::PublishProcessed,
        Err(error) if error.is_retryable() => Action::Requeue,
        Err(_) => Action::PublishFailed,
    }
}

/// Shared worker context.
pub struct Context {
    /// Bus handle for consuming and for outcome publishes.
    pub broker: Arc<Broker>,
    /// Payment provider client.
    pub payments: PaymentClient,
}

/// Run the worker pool until shutdown.
pub async fn run(
    ctx: Arc<Context>,
    workers: usize,
    prefetch: u16,
    shutdown: broadcast::Sender<()>,
) {
    let consumer = QueueConsumer::builder()
        .name("payment")
        .queue(QUEUE)
        .bind(topics::RESERVATION_COMPLETED)
        .workers(workers)
        .prefetch(prefetch)
        .broker(Arc::clone(&ctx.broker))
        .build();

    consumer
        .run(shutdown, move |delivery| {
            let ctx = Arc::clone(&ctx);
            async move { process(&ctx, delivery).await }
        })
        .await;
}

async fn process(ctx: &Context, delivery: Delivery) {
    let reservation: ReservationCompleted = match serde_json::from_slice(&delivery.body) {
        Ok(message) => message,
        Err(error) => {
            tracing::error!(error = %error, "poison reservation.completed message, dropping");
            reject(&delivery, false).await;
            return;
        }
    };

    tracing::debug!(
        reservation_id = reservation.reservation_id,
        amount = reservation.amount,
        "processing payment"
    );

    let result = ctx.payments.create_intent(&reservation).await;
    match classify(&result) {
        Action::PublishProcessed => {
            // classify() only returns this for Ok results.
            let Ok(intent) = result else { return };
            let message = PaymentProcessed {
                reservation_id: reservation.reservation_id,
                amount: reservation.amount,
                payment_id: intent.id,
            };
            if let Err(error) = ctx.broker.publish(&message, topics::PAYMENT_PROCESSED).await {
                // Retried on redelivery; the idempotency key prevents a
                // second charge.
                tracing::error!(
                    reservation_id = reservation.reservation_id,
                    error = %error,
                    "failed to publish payment.processed, requeueing"
                );
                reject(&delivery, true).await;
                return;
            }
            tracing::info!(
                reservation_id = reservation.reservation_id,
                payment_id = %message.payment_id,
                "payment processed"
            );
            if let Err(error) = delivery.ack().await {
                tracing::error!(error = %error, "failed to ack delivery");
            }
        }
        Action::PublishFailed => {
            let reason = result
                .err()
                .map_or_else(|| "unknown failure".to_string(), |e| e.to_string());
            tracing::warn!(
                reservation_id = reservation.reservation_id,
                reason = %reason,
                "payment rejected by provider"
            );
            let message = PaymentFailed {
                reservation_id: reservation.reservation_id,
                reason,
            };
            if let Err(error) = ctx.broker.publish(&message, topics::PAYMENT_FAILED).await {
                tracing::error!(
                    reservation_id = reservation.reservation_id,
                    error = %error,
                    "failed to publish payment.failed, requeueing"
                );
                reject(&delivery, true).await;
                return;
            }
            reject(&delivery, false).await;
        }
        Action::Requeue => {
            let error = result.err().map_or_else(String::new, |e| e.to_string());
            tracing::warn!(
                reservation_id = reservation.reservation_id,
                error = %error,
                "transient payment failure, requeueing"
            );
            reject(&delivery, true).await;
        }
    }
}

async fn reject(delivery: &Delivery, requeue: bool) {
    if let Err(error) = delivery.reject(requeue).await {
        tracing::error!(error = %error, "failed to reject delivery");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_publishes_processed() {
        let result = Ok(PaymentIntent {
            id: "pi_123".to_string(),
            client_secret: "cs_123".to_string(),
        });
        assert_eq!(classify(&result), Action::PublishProcessed);
    }

    #[test]
    fn rejection_publishes_failed_without_requeue() {
        let result = Err(PaymentError::Rejected("card declined".to_string()));
        assert_eq!(classify(&result), Action::PublishFailed);
    }

    #[test]
    fn breaker_open_and_timeout_requeue() {
        assert_eq!(classify(&Err(PaymentError::Unavailable)), Action::Requeue);
        assert_eq!(classify(&Err(PaymentError::Timeout)), Action::Requeue);
        assert_eq!(classify(&Err(PaymentError::RateLimited)), Action::Requeue);
        assert_eq!(
            classify(&Err(PaymentError::Transport("503".to_string()))),
            Action::Requeue
        );
    }
}
