//! Tuning knobs for the resolution pipeline.

use std::time::Duration;

/// Configuration for capabilities retrieval.
#[derive(Debug, Clone)]
pub struct ResolutionConfig {
    /// TCP connect timeout for the capabilities request
    pub connect_timeout: Duration,
    /// Total request timeout, connect included
    pub fetch_timeout: Duration,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// Bounds for the background task service.
#[derive(Debug, Clone)]
pub struct TaskServiceConfig {
    /// Maximum number of resolution tasks running at once
    pub workers: usize,
    /// Admission queue depth; submissions beyond running + queued are
    /// rejected, never blocked on
    pub queue_depth: usize,
}

impl Default for TaskServiceConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_depth: 16,
        }
    }
}
