//! Shared state and messaging between the coordinator and worker threads
//!
//! This module provides the thread-safe result store, the occurrence
//! counter, and the per-job reports workers send back.

pub mod messages;
pub mod state;

pub use messages::{JobReport, JobStatus};
pub use state::{AggregateStore, OccurrenceCounter, ResultMap};
