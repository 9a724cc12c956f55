//! Configuration types for buffering and merging

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long a background producer waits for room in a full buffer before
/// re-checking the cancellation signal
pub const DEFAULT_OFFER_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a consumer waits on an empty buffer before re-checking the
/// cancellation signal
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Default target buffer size per buffered sequence
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// Shortest offer or poll timeout honoured. Zero would turn the timed
/// waits into busy loops.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Buffer configuration for a buffered sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Target number of elements held per sequence, including the one being
    /// handed off. Values below 1 are treated as 1.
    pub buffer_size: usize,
    #[serde(with = "millis")]
    pub offer_timeout: Duration,
    #[serde(with = "millis")]
    pub poll_timeout: Duration,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            offer_timeout: DEFAULT_OFFER_TIMEOUT,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl BufferConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target buffer size
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set the producer-side offer timeout
    pub fn offer_timeout(mut self, timeout: Duration) -> Self {
        self.offer_timeout = timeout;
        self
    }

    /// Set the consumer-side poll timeout
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Buffer size floored at 1
    pub fn effective_buffer_size(&self) -> usize {
        self.buffer_size.max(1)
    }

    /// Offer timeout floored at [`MIN_TIMEOUT`]
    pub fn effective_offer_timeout(&self) -> Duration {
        self.offer_timeout.max(MIN_TIMEOUT)
    }

    /// Poll timeout floored at [`MIN_TIMEOUT`]
    pub fn effective_poll_timeout(&self) -> Duration {
        self.poll_timeout.max(MIN_TIMEOUT)
    }

    /// Capacity of the handoff queue: one slot is the element in flight
    /// between producer and queue
    pub fn queue_capacity(&self) -> usize {
        self.effective_buffer_size().saturating_sub(1).max(1)
    }
}

/// Configuration for a buffered merge
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub buffer: BufferConfig,
    /// Stop the whole fan-out once this many elements have been delivered
    pub limit: Option<u64>,
}

impl MergeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(mut self, buffer: BufferConfig) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer.buffer_size = buffer_size;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
