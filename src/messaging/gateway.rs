//! # Message Gateway
//!
//! Request/reply and fire-and-forget primitives over pgmq queues.
//!
//! `emit` applies a fixed delivery timeout and a bounded retry count and
//! surfaces the transport error when retries are exhausted - it never drops
//! silently. `request` blocks the calling flow (not the process) until a
//! correlated reply arrives; it applies no deadline of its own, so callers
//! needing one must wrap the call.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use pgmq::PGMQueue;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MessagingConfig;
use crate::messaging::errors::MessagingError;
use crate::messaging::messages::{ReplyEnvelope, RequestEnvelope};

/// Queue transport seam. The orchestrator talks to the solver only through
/// this trait, which keeps the broker substitutable in tests.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Fire-and-forget delivery with at-least-once semantics.
    async fn emit(&self, pattern: &str, data: Value) -> Result<(), MessagingError>;

    /// Send and await the correlated reply on `{pattern}_replies`.
    async fn request(&self, pattern: &str, data: Value) -> Result<Value, MessagingError>;
}

/// pgmq-backed gateway. The broker, not this type, guarantees message
/// durability across restarts.
#[derive(Clone, Debug)]
pub struct PgmqGateway {
    pgmq: PGMQueue,
    config: MessagingConfig,
}

impl PgmqGateway {
    /// Connect using a database URL.
    pub async fn new(database_url: &str, config: MessagingConfig) -> Result<Self, MessagingError> {
        info!("Connecting message gateway to pgmq broker");

        let pgmq = PGMQueue::new(database_url.to_string())
            .await
            .map_err(|e| MessagingError::Connection {
                message: e.to_string(),
            })?;

        Ok(Self { pgmq, config })
    }

    /// Build on an existing connection pool.
    pub async fn new_with_pool(pool: sqlx::PgPool, config: MessagingConfig) -> Self {
        let pgmq = PGMQueue::new_with_pool(pool).await;
        Self { pgmq, config }
    }

    /// Create the request and reply queues for each pattern if absent.
    pub async fn ensure_queues(&self, patterns: &[&str]) -> Result<(), MessagingError> {
        for pattern in patterns {
            let reply_queue = reply_queue_name(pattern);
            for queue in [*pattern, reply_queue.as_str()] {
                self.pgmq.create(queue).await.map_err(|e| {
                    MessagingError::queue_operation(queue, "create", e.to_string())
                })?;
            }
            debug!(pattern, "queues ready");
        }
        Ok(())
    }
}

/// Reply queue naming convention shared with the solver.
pub(crate) fn reply_queue_name(pattern: &str) -> String {
    format!("{pattern}_replies")
}

/// Bounded delivery loop behind `emit`: every attempt gets the full timeout,
/// and the terminal error carries the attempt count and the last underlying
/// failure.
async fn deliver_with_retries<F, Fut>(
    queue_name: &str,
    attempts: u32,
    timeout: Duration,
    mut send: F,
) -> Result<(), MessagingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<i64, MessagingError>>,
{
    let mut last_error = None;

    for attempt in 1..=attempts {
        match tokio::time::timeout(timeout, send()).await {
            Ok(Ok(message_id)) => {
                debug!(queue_name, message_id, attempt, "event emitted");
                return Ok(());
            }
            Ok(Err(e)) => {
                warn!(queue_name, attempt, error = %e, "emit attempt failed");
                last_error = Some(e);
            }
            Err(_) => {
                warn!(queue_name, attempt, "emit attempt timed out");
                last_error = Some(MessagingError::Timeout {
                    operation: format!("emit {queue_name}"),
                    timeout_seconds: timeout.as_secs(),
                });
            }
        }
    }

    Err(MessagingError::RetriesExhausted {
        queue_name: queue_name.to_string(),
        attempts,
        message: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no delivery attempt made".to_string()),
    })
}

#[async_trait]
impl MessageGateway for PgmqGateway {
    async fn emit(&self, pattern: &str, data: Value) -> Result<(), MessagingError> {
        let envelope = RequestEnvelope {
            correlation_id: Uuid::new_v4().to_string(),
            reply_to: None,
            pattern: pattern.to_string(),
            data,
        };

        let timeout = Duration::from_secs(self.config.emit_timeout_secs);
        let envelope = &envelope;
        let pgmq = &self.pgmq;

        deliver_with_retries(pattern, self.config.emit_attempts, timeout, move || {
            async move {
                pgmq.send(pattern, envelope)
                    .await
                    .map_err(|e| MessagingError::queue_operation(pattern, "send", e.to_string()))
            }
        })
        .await
    }

    async fn request(&self, pattern: &str, data: Value) -> Result<Value, MessagingError> {
        let correlation_id = Uuid::new_v4().to_string();
        let reply_queue = reply_queue_name(pattern);

        let envelope = RequestEnvelope {
            correlation_id: correlation_id.clone(),
            reply_to: Some(reply_queue.clone()),
            pattern: pattern.to_string(),
            data,
        };

        let message_id = self
            .pgmq
            .send(pattern, &envelope)
            .await
            .map_err(|e| MessagingError::queue_operation(pattern, "send", e.to_string()))?;

        debug!(pattern, message_id, correlation_id, "request sent, awaiting reply");

        let poll_interval = Duration::from_millis(self.config.reply_poll_interval_ms);

        loop {
            let read = self
                .pgmq
                .read::<Value>(&reply_queue, Some(self.config.reply_visibility_timeout_secs))
                .await
                .map_err(|e| {
                    MessagingError::queue_operation(&reply_queue, "read", e.to_string())
                })?;

            match read {
                Some(message) => {
                    match serde_json::from_value::<ReplyEnvelope>(message.message.clone()) {
                        Ok(reply) if reply.correlation_id == correlation_id => {
                            self.pgmq
                                .archive(&reply_queue, message.msg_id)
                                .await
                                .map_err(|e| {
                                    MessagingError::queue_operation(
                                        &reply_queue,
                                        "archive",
                                        e.to_string(),
                                    )
                                })?;
                            debug!(pattern, correlation_id, "correlated reply received");
                            return Ok(reply.data);
                        }
                        // Someone else's reply, or an unreadable message;
                        // it becomes visible again after the visibility
                        // timeout elapses.
                        _ => tokio::time::sleep(poll_interval).await,
                    }
                }
                None => tokio::time::sleep(poll_interval).await,
            }
        }
    }
}
