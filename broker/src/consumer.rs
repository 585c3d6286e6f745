//! Generic queue consumer with a worker pool and automatic reconnection.
//!
//! Every consumer in the platform follows the same resilient pattern:
//!
//! ```text
//! loop {
//!     declare queue, bind routing keys, set prefetch, start consuming
//!     workers: receive -> handle -> (handler acks or rejects)
//!     if connection lost: wait and redial
//!     if shutdown signalled: drain and exit
//! }
//! ```
//!
//! `QueueConsumer` owns that boilerplate so individual consumers are just a
//! queue name, its bindings and a handler. The handler owns the delivery and
//! is responsible for acking or rejecting it; the pool never acks on a
//! handler's behalf.

use crate::{Broker, BrokerError, Delivery};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex};

/// A durable queue consumer with `workers` concurrent handlers.
///
/// Built via [`QueueConsumer::builder`]; run to completion with
/// [`QueueConsumer::run`], which returns once shutdown is signalled and all
/// in-flight handlers have finished.
pub struct QueueConsumer {
    name: String,
    queue: String,
    bindings: Vec<String>,
    prefetch: Option<u16>,
    workers: usize,
    retry_delay: Duration,
    broker: Arc<Broker>,
}

impl QueueConsumer {
    /// Start building a consumer.
    #[must_use]
    pub fn builder() -> QueueConsumerBuilder {
        QueueConsumerBuilder::default()
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<Delivery>, BrokerError> {
        for routing_key in &self.bindings {
            self.broker.declare_and_bind(&self.queue, routing_key).await?;
        }
        if let Some(prefetch) = self.prefetch {
            self.broker.set_qos(prefetch).await?;
        }
        self.broker.consume(&self.queue).await
    }

    /// Run until shutdown. Reconnects with `retry_delay` backoff whenever
    /// the broker connection drops.
    ///
    /// `handler` is called once per delivery, concurrently from up to
    /// `workers` tasks, and must ack or reject the delivery itself.
    pub async fn run<H, Fut>(self, shutdown: broadcast::Sender<()>, handler: H)
    where
        H: Fn(Delivery) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown_rx = shutdown.subscribe();
        tracing::info!(consumer = %self.name, queue = %self.queue, workers = self.workers, "consumer started");

        loop {
            let deliveries = tokio::select! {
                _ = shutdown_rx.recv() => break,
                result = self.subscribe() => match result {
                    Ok(rx) => rx,
                    Err(error) => {
                        tracing::error!(
                            consumer = %self.name,
                            error = %error,
                            "failed to subscribe, retrying in {:?}",
                            self.retry_delay
                        );
                        tokio::select! {
                            _ = shutdown_rx.recv() => break,
                            () = tokio::time::sleep(self.retry_delay) => continue,
                        }
                    }
                },
            };

            let deliveries = Arc::new(Mutex::new(deliveries));
            let mut worker_handles = Vec::with_capacity(self.workers);
            for worker_id in 1..=self.workers {
                let deliveries = Arc::clone(&deliveries);
                let handler = handler.clone();
                let mut shutdown_rx = shutdown.subscribe();
                let name = self.name.clone();

                worker_handles.push(tokio::spawn(async move {
                    loop {
                        let delivery = tokio::select! {
                            _ = shutdown_rx.recv() => {
                                tracing::debug!(consumer = %name, worker_id, "worker shutting down");
                                return;
                            }
                            delivery = async { deliveries.lock().await.recv().await } => delivery,
                        };

                        match delivery {
                            Some(delivery) => handler(delivery).await,
                            None => {
                                tracing::debug!(consumer = %name, worker_id, "delivery stream ended");
                                return;
                            }
                        }
                    }
                }));
            }

            for handle in worker_handles {
                let _ = handle.await;
            }

            // Workers exited: either shutdown fired or the stream ended.
            match shutdown_rx.try_recv() {
                Ok(()) | Err(broadcast::error::TryRecvError::Lagged(_)) => break,
                Err(_) => {
                    tracing::warn!(
                        consumer = %self.name,
                        "delivery stream ended, reconnecting in {:?}",
                        self.retry_delay
                    );
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        () = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }

        tracing::info!(consumer = %self.name, "consumer stopped");
    }
}

/// Builder for [`QueueConsumer`].
#[derive(Default)]
pub struct QueueConsumerBuilder {
    name: Option<String>,
    queue: Option<String>,
    bindings: Vec<String>,
    prefetch: Option<u16>,
    workers: Option<usize>,
    retry_delay: Option<Duration>,
    broker: Option<Arc<Broker>>,
}

impl QueueConsumerBuilder {
    /// Consumer name for logging.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Durable queue to consume from.
    #[must_use]
    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Bind the queue to a routing key. May be called repeatedly.
    #[must_use]
    pub fn bind(mut self, routing_key: impl Into<String>) -> Self {
        self.bindings.push(routing_key.into());
        self
    }

    /// Channel prefetch (un-acked delivery cap).
    #[must_use]
    pub const fn prefetch(mut self, prefetch: u16) -> Self {
        self.prefetch = Some(prefetch);
        self
    }

    /// Concurrent worker count (default 1).
    #[must_use]
    pub const fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Delay before redialing after a lost connection (default 5 s).
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Broker to consume through.
    #[must_use]
    pub fn broker(mut self, broker: Arc<Broker>) -> Self {
        self.broker = Some(broker);
        self
    }

    /// Build the consumer.
    ///
    /// # Panics
    ///
    /// Panics when `name`, `queue`, a binding, or `broker` is missing; these
    /// are wiring mistakes caught at startup, not runtime conditions.
    #[must_use]
    pub fn build(self) -> QueueConsumer {
        assert!(!self.bindings.is_empty(), "at least one binding is required");
        QueueConsumer {
            name: self.name.expect("name is required"),
            queue: self.queue.expect("queue is required"),
            bindings: self.bindings,
            prefetch: self.prefetch,
            workers: self.workers.unwrap_or(1).max(1),
            retry_delay: self.retry_delay.unwrap_or(Duration::from_secs(5)),
            broker: self.broker.expect("broker is required"),
        }
    }
}
