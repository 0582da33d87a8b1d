//! # Time-Bounded Delivery Cache
//!
//! Remembers acknowledged push message IDs so a redelivery inside the
//! retention window is acknowledged without running its handler again.
//!
//! ## Design
//!
//! - Only successful acknowledgements are recorded; failed deliveries must
//!   stay retryable.
//! - Entries are garbage-collected after the retention window, bounding
//!   memory. Redeliveries older than the window fall through to the
//!   handler's own applied-effect check.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct DeliveryCache {
    /// Map of message ID -> timestamp of acknowledgement.
    cache: HashMap<String, u64>,

    /// Retention window in seconds.
    retention_secs: u64,

    /// Last garbage collection timestamp.
    last_gc: u64,

    /// Garbage collection interval in seconds.
    gc_interval_secs: u64,
}

impl DeliveryCache {
    /// Default retention: the push service's maximum ack deadline is 10
    /// minutes, and redeliveries cluster well inside it.
    pub const DEFAULT_RETENTION: u64 = 600;

    pub const DEFAULT_GC_INTERVAL: u64 = 30;

    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Self::DEFAULT_RETENTION, Self::DEFAULT_GC_INTERVAL)
    }

    #[must_use]
    pub fn with_config(retention_secs: u64, gc_interval_secs: u64) -> Self {
        Self {
            cache: HashMap::new(),
            retention_secs,
            last_gc: Self::current_timestamp(),
            gc_interval_secs,
        }
    }

    /// Whether `message_id` was acknowledged within the retention window.
    pub fn is_acknowledged(&mut self, message_id: &str) -> bool {
        self.is_acknowledged_at(message_id, Self::current_timestamp())
    }

    /// Records a successful acknowledgement.
    pub fn acknowledge(&mut self, message_id: &str) {
        self.acknowledge_at(message_id, Self::current_timestamp());
    }

    fn is_acknowledged_at(&mut self, message_id: &str, now: u64) -> bool {
        if now.saturating_sub(self.last_gc) > self.gc_interval_secs {
            self.garbage_collect(now);
            self.last_gc = now;
        }
        match self.cache.get(message_id) {
            Some(&acked_at) => now.saturating_sub(acked_at) <= self.retention_secs,
            None => false,
        }
    }

    fn acknowledge_at(&mut self, message_id: &str, now: u64) {
        if message_id.is_empty() {
            return;
        }
        self.cache.insert(message_id.to_string(), now);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn garbage_collect(&mut self, now: u64) {
        let threshold = now.saturating_sub(self.retention_secs);
        self.cache.retain(|_, &mut ts| ts >= threshold);
    }

    fn current_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

impl Default for DeliveryCache {
    fn default() -> Self {
        Self::new()
    }
}
