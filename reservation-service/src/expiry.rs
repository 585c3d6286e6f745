//! Reservation expiry: per-reservation timers plus the periodic sweeper.
//!
//! Timers give low-latency release while the process is up; the sweeper
//! guarantees eventual release after a crash loses the timers. Both paths
//! funnel through [`Expirer::expire_if_pending`], which only acts on rows
//! still `pending`, and the event service refuses to release when nothing is
//! reserved, so retries from either path are safe.

use crate::clients::EventServiceClient;
use crate::error::ReservationError;
use crate::models::{Reservation, ReservationStatus};
use crate::repo::ReservationRepository;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tixie_broker::Broker;
use tixie_messages::{topics, ReservationExpired};
use tokio::sync::broadcast;

/// Outcome of one sweeper run.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SweepSummary {
    /// Reservations actually expired this run.
    pub processed: usize,
    /// Expired-but-pending reservations found.
    pub total: usize,
}

/// Shared expiry machinery for timers, the sweeper and the cleanup endpoint.
#[derive(Clone)]
pub struct Expirer {
    repo: ReservationRepository,
    events: EventServiceClient,
    broker: Option<Arc<Broker>>,
    shutdown: broadcast::Sender<()>,
}

impl Expirer {
    /// Wire up the expirer.
    #[must_use]
    pub fn new(
        repo: ReservationRepository,
        events: EventServiceClient,
        broker: Option<Arc<Broker>>,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            repo,
            events,
            broker,
            shutdown,
        }
    }

    /// Arm a single-shot timer that expires the reservation at its
    /// `expiration_time`. The task exits early on shutdown; the sweeper
    /// picks up anything a lost timer leaves behind.
    pub fn schedule(&self, reservation: &Reservation) {
        let expirer = self.clone();
        let reservation_id = reservation.id;
        let event_id = reservation.event_id;
        let expires_at = reservation.expiration_time;
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let delay = (expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tracing::debug!(reservation_id, delay_secs = delay.as_secs(), "expiry timer armed");

            tokio::select! {
                _ = shutdown.recv() => return,
                () = tokio::time::sleep(delay) => {}
            }

            match expirer.expire_if_pending(reservation_id, event_id).await {
                Ok(true) => tracing::info!(reservation_id, "reservation expired by timer"),
                Ok(false) => {}
                Err(error) => tracing::warn!(
                    reservation_id,
                    error = %error,
                    "timer expiry failed; the sweeper will retry"
                ),
            }
        });
    }

    /// Expire the reservation if it is still pending: release the hold on
    /// the event service, then flip the local row.
    ///
    /// Inventory is released before the local mark on purpose. A crash
    /// between the two leaves a pending row past its expiry, which the next
    /// sweep retries; the event service's refusal to release below zero
    /// keeps that retry harmless.
    ///
    /// # Errors
    ///
    /// Returns the first repository or event-service error; callers log and
    /// move on, relying on the next sweep.
    pub async fn expire_if_pending(
        &self,
        reservation_id: i32,
        event_id: i32,
    ) -> Result<bool, ReservationError> {
        let reservation = match self.repo.get(reservation_id).await {
            Ok(reservation) => reservation,
            Err(ReservationError::NotFound) => return Ok(false),
            Err(error) => return Err(error),
        };
        if reservation.status != ReservationStatus::Pending {
            return Ok(false);
        }

        match self.events.release_reservation(event_id).await {
            Ok(()) => {}
            Err(ReservationError::NothingReserved) => {
                tracing::debug!(reservation_id, event_id, "no hold left to release");
            }
            Err(error) => return Err(error),
        }

        let expired = self.repo.expire(reservation_id).await?;
        if expired {
            self.publish_expired(reservation_id, event_id).await;
        }
        Ok(expired)
    }

    /// One sweeper pass: expire everything pending past its expiration,
    /// continuing over per-item failures.
    ///
    /// # Errors
    ///
    /// Returns an error only when the work list itself cannot be read.
    pub async fn sweep(&self) -> Result<SweepSummary, ReservationError> {
        let reservations = self.repo.expired_pending().await?;
        let total = reservations.len();
        let mut processed = 0;

        for reservation in &reservations {
            match self
                .expire_if_pending(reservation.id, reservation.event_id)
                .await
            {
                Ok(true) => processed += 1,
                Ok(false) => {}
                Err(error) => {
                    tracing::error!(
                        reservation_id = reservation.id,
                        error = %error,
                        "failed to expire reservation, will retry next sweep"
                    );
                }
            }
        }

        if total > 0 {
            tracing::info!(processed, total, "expiry sweep finished");
        }
        Ok(SweepSummary { processed, total })
    }

    /// Run the sweeper loop until shutdown.
    pub async fn run_sweeper(self, interval: Duration) {
        let mut shutdown = self.shutdown.subscribe();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(interval_secs = interval.as_secs(), "expiry sweeper started");
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    if let Err(error) = self.sweep().await {
                        tracing::error!(error = %error, "expiry sweep failed");
                    }
                }
            }
        }
        tracing::info!("expiry sweeper stopped");
    }

    async fn publish_expired(&self, reservation_id: i32, event_id: i32) {
        let Some(broker) = &self.broker else { return };
        let message = ReservationExpired {
            reservation_id,
            event_id,
        };
        if let Err(error) = broker.publish(&message, topics::RESERVATION_EXPIRED).await {
            tracing::warn!(reservation_id, error = %error, "failed to publish reservation.expired");
        }
    }
}
