//! Durable SMS dispatch queue and workers

pub mod queue;
pub mod worker;

pub use queue::{SmsJob, SmsQueue, SmsQueueConfig};
pub use worker::SmsWorker;
