//! The notification queue consumer.
//!
//! One queue, three payload shapes: the canonical [`EmailNotification`],
//! [`TicketIssued`] announcements, and the legacy `{recipient_email,
//! ticket_id}` form still published on the `email` routing key. Send
//! failures are logged and the delivery acked; email is fire-and-forget.

use crate::mailer::Mailer;
use serde::Deserialize;
use std::sync::Arc;
use tixie_broker::{Broker, Delivery, QueueConsumer};
use tixie_messages::{topics, EmailNotification, LegacyEmailNotification, TicketIssued};
use tokio::sync::broadcast;

const QUEUE: &str = "email_notifications";

/// Any payload this queue can carry. Untagged: the shapes are mutually
/// distinguishable by their required fields.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Incoming {
    /// Canonical `notification.email` payload.
    Full(EmailNotification),
    /// A `ticket.issued` announcement.
    Issued(TicketIssued),
    /// Legacy `email` payload.
    Legacy(LegacyEmailNotification),
}

/// Run the consumer until shutdown.
pub async fn run(broker: Arc<Broker>, mailer: Arc<Mailer>, shutdown: broadcast::Sender<()>) {
    let consumer = QueueConsumer::builder()
        .name("notification")
        .queue(QUEUE)
        .bind(topics::NOTIFICATION_EMAIL)
        .bind(topics::NOTIFICATION_EMAIL_LEGACY)
        .bind(topics::TICKET_ISSUED)
        .broker(broker)
        .build();

    consumer
        .run(shutdown, move |delivery| {
            let mailer = Arc::clone(&mailer);
            async move { process(&mailer, delivery).await }
        })
        .await;
}

async fn process(mailer: &Mailer, delivery: Delivery) {
    let incoming: Incoming = match serde_json::from_slice(&delivery.body) {
        Ok(incoming) => incoming,
        Err(error) => {
            tracing::error!(error = %error, "poison notification message, dropping");
            if let Err(error) = delivery.reject(false).await {
                tracing::error!(error = %error, "failed to reject poison message");
            }
            return;
        }
    };

    match send(mailer, incoming).await {
        Ok(Some(recipient)) => {
            tracing::info!(recipient = %recipient, "notification processed");
        }
        Ok(None) => {}
        Err(error) => {
            // Dropped, not requeued: nothing upstream retries email.
            tracing::error!(error = %error, "failed to send email, dropping");
        }
    }

    if let Err(error) = delivery.ack().await {
        tracing::error!(error = %error, "failed to ack notification message");
    }
}

async fn send(mailer: &Mailer, incoming: Incoming) -> Result<Option<String>, crate::mailer::MailError> {
    match incoming {
        Incoming::Full(message) => {
            mailer
                .send(
                    &message.recipient_email,
                    &message.subject,
                    &message.template_id,
                    &message.template_data,
                )
                .await?;
            Ok(Some(message.recipient_email))
        }
        Incoming::Issued(message) => {
            if message.recipient_email.is_empty() {
                tracing::warn!(
                    ticket_id = message.ticket_id,
                    "ticket issued without a recipient email, skipping"
                );
                return Ok(None);
            }
            mailer
                .send_ticket_email(&message.recipient_email, &message.ticket_code)
                .await?;
            Ok(Some(message.recipient_email))
        }
        Incoming::Legacy(message) => {
            mailer
                .send_ticket_email(&message.recipient_email, &message.ticket_id)
                .await?;
            Ok(Some(message.recipient_email))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_payload_decodes_as_full() {
        let body = r#"{
            "recipient_email": "a@b.c",
            "subject": "hello",
            "template_id": "tpl-1",
            "template_data": {"ticket_id": "xyz"}
        }"#;
        let incoming: Incoming = serde_json::from_str(body).unwrap();
        assert!(matches!(incoming, Incoming::Full(_)));
    }

    #[test]
    fn ticket_issued_payload_decodes_as_issued() {
        let body = r#"{
            "ticket_id": 7,
            "ticket_code": "550e8400-e29b-41d4-a716-446655440000",
            "reservation_id": 3,
            "user_id": 42,
            "event_id": 1,
            "recipient_email": "a@b.c"
        }"#;
        let incoming: Incoming = serde_json::from_str(body).unwrap();
        assert!(matches!(incoming, Incoming::Issued(_)));
    }

    #[test]
    fn legacy_payload_decodes_as_legacy() {
        let body = r#"{"recipient_email": "a@b.c", "ticket_id": "550e8400"}"#;
        let incoming: Incoming = serde_json::from_str(body).unwrap();
        assert!(matches!(incoming, Incoming::Legacy(_)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(serde_json::from_str::<Incoming>(r#"{"foo": 1}"#).is_err());
    }
}
