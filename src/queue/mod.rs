pub mod coordinator;
pub mod deferred;
pub mod job;
pub mod keys;
pub mod reconstruct;
pub mod reservation;
pub mod service;

pub use job::{Collation, EnqueueOutcome, GradingJob, GradingJobConfig};
pub use service::GradingQueue;
