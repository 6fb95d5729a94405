/// Tunables for the grading queue core.
///
/// All timestamps in the queue are Unix epoch values: seconds for scores
/// and TTLs, milliseconds for arrival times and deferred nonces.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Seconds added to a job's release timestamp to form its record TTL.
    /// A resubmission never shortens a previously promised retention window.
    pub lifetime_buffer_secs: i64,
    /// Seconds an admitted immediate slot stays occupied before it is
    /// considered released, even if never explicitly released.
    pub slot_lifetime_secs: i64,
    /// Upper bound on concurrently admitted immediate jobs.
    pub immediate_capacity: usize,
    /// Length of generated reservation nonces.
    pub nonce_length: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            lifetime_buffer_secs: 86_400, // 1 day
            slot_lifetime_secs: 300,
            immediate_capacity: 10,
            nonce_length: 16,
        }
    }
}

impl QueueConfig {
    pub fn with_lifetime_buffer_secs(mut self, secs: i64) -> Self {
        self.lifetime_buffer_secs = secs;
        self
    }

    pub fn with_slot_lifetime_secs(mut self, secs: i64) -> Self {
        self.slot_lifetime_secs = secs;
        self
    }

    pub fn with_immediate_capacity(mut self, capacity: usize) -> Self {
        self.immediate_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_config_default() {
        let cfg = QueueConfig::default();
        assert_eq!(cfg.lifetime_buffer_secs, 86_400);
        assert_eq!(cfg.slot_lifetime_secs, 300);
        assert_eq!(cfg.immediate_capacity, 10);
        assert_eq!(cfg.nonce_length, 16);
    }

    #[test]
    fn queue_config_builders() {
        let cfg = QueueConfig::default()
            .with_lifetime_buffer_secs(3_600)
            .with_slot_lifetime_secs(60)
            .with_immediate_capacity(2);
        assert_eq!(cfg.lifetime_buffer_secs, 3_600);
        assert_eq!(cfg.slot_lifetime_secs, 60);
        assert_eq!(cfg.immediate_capacity, 2);
    }
}
