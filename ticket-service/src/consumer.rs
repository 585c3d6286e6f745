//! Consumer for `payment.processed`: materializes the ticket and announces
//! it on `ticket.issued`.
//!
//! Delivery is at-least-once, so issuance must be idempotent: the unique
//! `reservation_id` column guarantees at most one ticket per reservation,
//! and a redelivered message re-publishes `ticket.issued` for the existing
//! ticket instead of minting another.

use crate::clients::{ReservationServiceClient, UserServiceClient};
use crate::error::TicketError;
use crate::models::Ticket;
use crate::repo::TicketRepository;
use std::sync::Arc;
use tixie_broker::{Broker, Delivery, QueueConsumer};
use tixie_messages::{topics, PaymentProcessed, TicketIssued};
use tokio::sync::broadcast;
use uuid::Uuid;

const QUEUE: &str = "ticket.payment_processed";

/// Everything ticket issuance needs; shared across deliveries.
pub struct Issuer {
    /// Ticket records.
    pub repo: TicketRepository,
    /// Resolves reservation IDs into event/user pairs.
    pub reservations: ReservationServiceClient,
    /// Resolves recipient emails.
    pub users: UserServiceClient,
    /// Bus handle for `ticket.issued`.
    pub broker: Arc<Broker>,
}

/// Run the consumer until shutdown.
pub async fn run(issuer: Arc<Issuer>, shutdown: broadcast::Sender<()>) {
    let consumer = QueueConsumer::builder()
        .name("ticket-issuer")
        .queue(QUEUE)
        .bind(topics::PAYMENT_PROCESSED)
        .broker(Arc::clone(&issuer.broker))
        .build();

    consumer
        .run(shutdown, move |delivery| {
            let issuer = Arc::clone(&issuer);
            async move { process(&issuer, delivery).await }
        })
        .await;
}

async fn process(issuer: &Issuer, delivery: Delivery) {
    let message: PaymentProcessed = match serde_json::from_slice(&delivery.body) {
        Ok(message) => message,
        Err(error) => {
            tracing::error!(error = %error, "poison payment.processed message, dropping");
            reject(&delivery, false).await;
            return;
        }
    };

    let reservation = match issuer.reservations.get(message.reservation_id).await {
        Ok(reservation) => reservation,
        Err(TicketError::NotFound) => {
            tracing::error!(
                reservation_id = message.reservation_id,
                "payment.processed for unknown reservation, dropping"
            );
            reject(&delivery, false).await;
            return;
        }
        Err(error) => {
            tracing::warn!(
                reservation_id = message.reservation_id,
                error = %error,
                "could not resolve reservation, requeueing"
            );
            reject(&delivery, true).await;
            return;
        }
    };

    let ticket = match issue(issuer, &message, reservation.event_id, reservation.user_id).await {
        Ok(ticket) => ticket,
        Err(error) => {
            tracing::error!(
                reservation_id = message.reservation_id,
                error = %error,
                "failed to issue ticket, requeueing"
            );
            reject(&delivery, true).await;
            return;
        }
    };

    let recipient_email = issuer.users.email(ticket.user_id).await.unwrap_or_default();
    let issued = TicketIssued {
        ticket_id: ticket.id,
        ticket_code: ticket.ticket_code.clone(),
        reservation_id: message.reservation_id,
        user_id: ticket.user_id,
        event_id: ticket.event_id,
        recipient_email,
    };

    if let Err(error) = issuer.broker.publish(&issued, topics::TICKET_ISSUED).await {
        // The ticket row exists; redelivery takes the already-issued path
        // and re-publishes.
        tracing::error!(
            ticket_id = ticket.id,
            error = %error,
            "failed to publish ticket.issued, requeueing"
        );
        reject(&delivery, true).await;
        return;
    }

    tracing::info!(
        ticket_id = ticket.id,
        reservation_id = message.reservation_id,
        "ticket issued"
    );
    if let Err(error) = delivery.ack().await {
        tracing::error!(error = %error, "failed to ack payment.processed message");
    }
}

/// Create the ticket, or fetch the one a previous delivery already created.
async fn issue(
    issuer: &Issuer,
    message: &PaymentProcessed,
    event_id: i32,
    user_id: i32,
) -> Result<Ticket, TicketError> {
    let code = Uuid::new_v4().to_string();
    match issuer
        .repo
        .create(event_id, user_id, &code, Some(message.reservation_id))
        .await
    {
        Ok(ticket) => Ok(ticket),
        Err(TicketError::AlreadyIssued) => issuer
            .repo
            .get_by_reservation(message.reservation_id)
            .await?
            .ok_or(TicketError::AlreadyIssued),
        Err(error) => Err(error),
    }
}

async fn reject(delivery: &Delivery, requeue: bool) {
    if let Err(error) = delivery.reject(requeue).await {
        tracing::error!(error = %error, "failed to reject delivery");
    }
}
