pub mod config;
pub mod error;
pub mod queue;
pub mod store;

// Re-export the service facade and core job types
pub use config::QueueConfig;
pub use error::{QueueError, Result};
pub use queue::{Collation, EnqueueOutcome, GradingJob, GradingJobConfig, GradingQueue};
