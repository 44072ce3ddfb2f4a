// Startup configuration
pub mod config;

// Weather provider fetch client
pub mod fetch;

// Observation model and normalization
pub mod observation;

// NATS JetStream queue integration
pub mod queue;

// Collection scheduler
pub mod scheduler;
