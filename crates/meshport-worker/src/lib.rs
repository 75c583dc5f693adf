//! Event delivery for Meshport.
//!
//! This crate provides:
//! - Event sources that normalize queue messages and push-event payloads
//! - SQS and in-memory message queues
//! - The job runner that drives deliveries through the conversion pipeline
//! - Batch reports and the handler response contract
//! - The push-event webhook server

pub mod queue;
pub mod report;
pub mod runner;
pub mod server;
pub mod source;

#[cfg(test)]
mod test_support;

pub use report::{BatchReport, HandlerResponse, RecordOutcome};
pub use runner::JobRunner;
pub use server::{ServerState, build_router};
pub use source::{Delivery, EventSource, PushEventSource, QueueEventSource};
