//! Consumer for `event.created` messages from the vendor service.
//!
//! The vendor service owns vendor records and publishes new events onto the
//! bus; this consumer materializes them as inventory rows. Decode failures
//! are poison messages and are dropped; database failures requeue the
//! delivery for a later attempt.

use crate::models::CreateEventRequest;
use crate::repo::EventRepository;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tixie_broker::{Broker, Delivery, QueueConsumer};
use tixie_messages::{topics, EventCreated};
use tokio::sync::broadcast;

const QUEUE: &str = "event.event_created";

/// Run the consumer until shutdown.
pub async fn run(broker: Arc<Broker>, repo: EventRepository, shutdown: broadcast::Sender<()>) {
    let consumer = QueueConsumer::builder()
        .name("event-created")
        .queue(QUEUE)
        .bind(topics::EVENT_CREATED)
        .broker(broker)
        .build();

    consumer
        .run(shutdown, move |delivery| {
            let repo = repo.clone();
            async move { process(&repo, delivery).await }
        })
        .await;
}

async fn process(repo: &EventRepository, delivery: Delivery) {
    let message: EventCreated = match serde_json::from_slice(&delivery.body) {
        Ok(message) => message,
        Err(error) => {
            tracing::error!(error = %error, "poison event.created message, dropping");
            if let Err(error) = delivery.reject(false).await {
                tracing::error!(error = %error, "failed to reject poison message");
            }
            return;
        }
    };

    let request = match to_create_request(&message) {
        Ok(request) => request,
        Err(reason) => {
            tracing::error!(reason = %reason, "invalid event.created payload, dropping");
            if let Err(error) = delivery.reject(false).await {
                tracing::error!(error = %error, "failed to reject invalid message");
            }
            return;
        }
    };

    match repo.create(&request).await {
        Ok(event) => {
            tracing::info!(event_id = event.id, name = %event.name, "event materialized from bus");
            if let Err(error) = delivery.ack().await {
                tracing::error!(error = %error, "failed to ack event.created message");
            }
        }
        Err(error) => {
            tracing::error!(error = %error, "failed to persist event, requeueing");
            if let Err(error) = delivery.reject(true).await {
                tracing::error!(error = %error, "failed to requeue event.created message");
            }
        }
    }
}

fn to_create_request(message: &EventCreated) -> Result<CreateEventRequest, String> {
    let price = Decimal::from_str(&message.price)
        .map_err(|e| format!("unparseable price {:?}: {e}", message.price))?;

    let request = CreateEventRequest {
        name: message.name.clone(),
        date: message.date.clone(),
        venue: message.venue.clone(),
        total_tickets: message.total_tickets,
        vendor_id: message.vendor_id,
        price,
        reservation_timeout: message.reservation_timeout,
    };
    request.validate()?;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EventCreated {
        EventCreated {
            name: "RustConf".to_string(),
            date: "2026-09-01".to_string(),
            venue: "Main Hall".to_string(),
            total_tickets: 100,
            vendor_id: 1,
            price: "25.00".to_string(),
            reservation_timeout: None,
        }
    }

    #[test]
    fn bus_payload_converts_to_create_request() {
        let request = to_create_request(&message()).unwrap();
        assert_eq!(request.price, Decimal::new(2500, 2));
        assert_eq!(request.timeout(), 600);
    }

    #[test]
    fn garbage_price_is_rejected() {
        let mut bad = message();
        bad.price = "twenty five".to_string();
        assert!(to_create_request(&bad).is_err());
    }
}
