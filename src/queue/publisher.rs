use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::client::QueueClient;
use crate::config::BrokerConfig;
use crate::observation::Observation;

/// Errors from publishing one Observation.
#[derive(Debug)]
pub enum PublishError {
    /// Broker unreachable; retried with linear backoff
    Connect(String),
    /// Broker accepted the connection but refused the stream or message
    Rejected(String),
    /// Observation could not be serialized
    Serialize(serde_json::Error),
    /// Every retry attempt failed
    Exhausted { attempts: u32, last: String },
}

impl PublishError {
    /// Only connection failures are worth retrying; everything past the
    /// connect step is treated as non-transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, PublishError::Connect(_))
    }
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Connect(msg) => write!(f, "broker connection failed: {}", msg),
            PublishError::Rejected(msg) => write!(f, "broker rejected publish: {}", msg),
            PublishError::Serialize(e) => write!(f, "observation serialization failed: {}", e),
            PublishError::Exhausted { attempts, last } => {
                write!(f, "publish abandoned after {} attempts: {}", attempts, last)
            }
        }
    }
}

impl std::error::Error for PublishError {}

/// Bounded linear-backoff retry policy.
///
/// Waits `attempt * backoff_unit` between attempts: 2s, 4s, 6s, 8s with
/// the defaults. No sleep follows the final attempt.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_unit: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit * attempt
    }
}

/// Drive `attempt` under the retry policy.
///
/// Transient errors are retried up to `max_attempts` with linear backoff;
/// anything else aborts immediately. Exhaustion reports the attempt count
/// and the last connection error.
pub async fn publish_with_retry<F, Fut>(policy: &RetryPolicy, mut attempt: F) -> Result<(), PublishError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<(), PublishError>>,
{
    let mut last = String::new();

    for number in 1..=policy.max_attempts {
        match attempt(number).await {
            Ok(()) => return Ok(()),
            Err(error) if error.is_transient() => {
                last = error.to_string();
                if number < policy.max_attempts {
                    let wait = policy.backoff(number);
                    warn!(
                        attempt = number,
                        max_attempts = policy.max_attempts,
                        wait_secs = wait.as_secs(),
                        error = %error,
                        "Broker unreachable, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
            Err(error) => return Err(error),
        }
    }

    Err(PublishError::Exhausted {
        attempts: policy.max_attempts,
        last,
    })
}

/// Destination for normalized observations.
#[async_trait]
pub trait ObservationSink: Send + Sync {
    async fn publish(&self, observation: &Observation) -> Result<(), PublishError>;
}

/// Publishes observations to the durable queue, one isolated connection
/// per publish.
pub struct QueuePublisher {
    config: BrokerConfig,
    retry: RetryPolicy,
}

impl QueuePublisher {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            retry: RetryPolicy::default(),
        }
    }

    /// Connect, declare, publish, disconnect: one atomic attempt.
    async fn attempt(&self, payload: &[u8]) -> Result<(), PublishError> {
        let client = QueueClient::connect(&self.config).await?;
        let result = client.publish(&self.config.subject, payload.to_vec()).await;
        client.close().await;
        result
    }
}

#[async_trait]
impl ObservationSink for QueuePublisher {
    async fn publish(&self, observation: &Observation) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(observation).map_err(PublishError::Serialize)?;

        publish_with_retry(&self.retry, |_| self.attempt(&payload)).await?;

        debug!(
            subject = %self.config.subject,
            bytes = payload.len(),
            "Observation published"
        );
        Ok(())
    }
}
