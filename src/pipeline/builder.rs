use futures_core::Stream;
use std::cmp::Ordering;
use std::error::Error;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use crate::error::{SequenceError, SequenceResult};
use crate::sequence::{merge_by, BufferedSequence, Cancellable, Gated, OrderedMerge};
use crate::signal::CancelSignal;
use crate::stream_configuration::{BufferConfig, MergeConfig};

/// Result of a buffered merge: gated, buffered sources merged in order,
/// behind one cancellable wrapper sharing a fresh signal.
///
/// The value must be drained or dropped (closing also works) or the
/// background producers keep prefetching until their buffers fill.
pub type BufferedMerge<T, F> = Cancellable<OrderedMerge<BufferedSequence<T>, F>>;

/// Merge `sources`, each sorted under `comparator`, into one sorted stream.
///
/// Every source is gated on `gate`, then buffered on `executor` with a
/// signal shared by this call only, then merged. Prefetching starts
/// immediately for every source.
pub fn merge_buffered<S, T, E, F>(
    sources: Vec<S>,
    comparator: F,
    executor: &Handle,
    gate: Arc<Semaphore>,
    buffer_size: usize,
) -> BufferedMerge<T, F>
where
    S: Stream<Item = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Error + Send + Sync + 'static,
    F: Fn(&T, &T) -> Ordering,
{
    let buffer = BufferConfig::new().buffer_size(buffer_size);
    let signal = CancelSignal::new();
    let merged = spawn_merged(sources, comparator, executor, gate, &buffer, &signal);
    Cancellable::new(merged, signal)
}

/// Like [`merge_buffered`], with timeouts and an optional delivery limit
/// taken from `config`.
pub fn merge_buffered_with_config<S, T, E, F>(
    sources: Vec<S>,
    comparator: F,
    executor: &Handle,
    gate: Arc<Semaphore>,
    config: &MergeConfig,
) -> SequenceResult<BufferedMerge<T, F>>
where
    S: Stream<Item = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Error + Send + Sync + 'static,
    F: Fn(&T, &T) -> Ordering,
{
    // Validate before anything is spawned
    if config.limit == Some(0) {
        return Err(SequenceError::invalid("Delivery limit must be >= 1"));
    }

    let signal = CancelSignal::new();
    let merged = spawn_merged(sources, comparator, executor, gate, &config.buffer, &signal);
    match config.limit {
        Some(limit) => Cancellable::with_limit(merged, signal, limit),
        None => Ok(Cancellable::new(merged, signal)),
    }
}

fn spawn_merged<S, T, E, F>(
    sources: Vec<S>,
    comparator: F,
    executor: &Handle,
    gate: Arc<Semaphore>,
    buffer: &BufferConfig,
    signal: &CancelSignal,
) -> OrderedMerge<BufferedSequence<T>, F>
where
    S: Stream<Item = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Error + Send + Sync + 'static,
    F: Fn(&T, &T) -> Ordering,
{
    log::debug!(
        "Merging {} sources with buffer size {}",
        sources.len(),
        buffer.effective_buffer_size()
    );

    let buffered: Vec<BufferedSequence<T>> = sources
        .into_iter()
        .map(|source| Gated::new(source, Arc::clone(&gate)))
        .map(|gated| BufferedSequence::spawn_with_config(gated, executor, buffer, signal.clone()))
        .collect();

    merge_by(buffered, comparator)
}

/// Builder for a buffered merge
pub struct MergePipeline<S> {
    sources: Vec<S>,
    gate: Option<Arc<Semaphore>>,
    config: MergeConfig,
}

impl<S> Default for MergePipeline<S> {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            gate: None,
            config: MergeConfig::default(),
        }
    }
}

impl<S, T, E> MergePipeline<S>
where
    S: Stream<Item = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Error + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: S) -> Self {
        self.sources.push(source);
        self
    }

    pub fn sources<I>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        self.sources.extend(sources);
        self
    }

    /// Permit pool shared with other pipelines. Defaults to
    /// [`GLOBAL_GATE`](crate::sequence::GLOBAL_GATE).
    pub fn gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_config(mut self, config: MergeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.config.buffer.buffer_size = buffer_size;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.config.limit = Some(limit);
        self
    }

    /// Spawn the producers on `executor` and merge under `comparator`
    pub fn build_by<F>(self, executor: &Handle, comparator: F) -> SequenceResult<BufferedMerge<T, F>>
    where
        F: Fn(&T, &T) -> Ordering,
    {
        let gate = self.gate.unwrap_or_else(crate::sequence::get_global_gate);
        merge_buffered_with_config(self.sources, comparator, executor, gate, &self.config)
    }

    /// Spawn the producers on `executor` and merge in natural order
    pub fn build(
        self,
        executor: &Handle,
    ) -> SequenceResult<BufferedMerge<T, fn(&T, &T) -> Ordering>>
    where
        T: Ord,
    {
        self.build_by(executor, Ord::cmp as fn(&T, &T) -> Ordering)
    }
}
