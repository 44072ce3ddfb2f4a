use async_nats::jetstream::{self, stream};
use tracing::debug;

use super::publisher::PublishError;
use crate::config::BrokerConfig;

/// One short-lived broker connection.
///
/// Opened fresh for every publish and dropped right after: nothing is
/// pooled across cycles, so there is no stale-connection state to manage.
pub struct QueueClient {
    client: async_nats::Client,
    jetstream: jetstream::Context,
}

impl QueueClient {
    /// Connect to the broker and ensure the durable stream exists.
    ///
    /// Stream creation is idempotent and repeated every cycle; the first
    /// successful publish creates the queue if it was missing.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, PublishError> {
        let client = async_nats::connect(&config.url)
            .await
            .map_err(|e| PublishError::Connect(e.to_string()))?;

        let jetstream = jetstream::new(client.clone());

        jetstream
            .get_or_create_stream(stream::Config {
                name: config.stream_name.clone(),
                subjects: vec![config.subject.clone()],
                storage: stream::StorageType::File,
                retention: stream::RetentionPolicy::Limits,
                ..Default::default()
            })
            .await
            .map_err(|e| PublishError::Rejected(e.to_string()))?;

        Ok(Self { client, jetstream })
    }

    /// Publish one message and wait for the broker's durable-storage ack.
    pub async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let mut headers = async_nats::HeaderMap::new();
        headers.insert("Content-Type", "application/json");

        self.jetstream
            .publish_with_headers(subject.to_string(), headers, payload.into())
            .await
            .map_err(|e| PublishError::Rejected(e.to_string()))?
            .await
            .map_err(|e| PublishError::Rejected(e.to_string()))?;

        Ok(())
    }

    /// Flush outstanding writes and drop the connection.
    pub async fn close(self) {
        if let Err(e) = self.client.flush().await {
            debug!(error = %e, "Flush on close failed");
        }
    }
}
