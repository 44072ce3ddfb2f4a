// NATS JetStream queue integration

mod client;
mod publisher;

pub use client::QueueClient;
pub use publisher::{
    publish_with_retry, ObservationSink, PublishError, QueuePublisher, RetryPolicy,
};
