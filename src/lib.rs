//! shardflow - ordered, buffered and cancellable merging of shard streams
//!
//! A search query that fans out to several index shards gets back one
//! locally ordered stream per shard. This crate turns those into a single
//! globally ordered stream while bounding concurrent load on the shards and
//! letting the consumer stop early without leaking background work.
//!
//! ```
//! use futures_util::stream::{self, StreamExt};
//! use shardflow::prelude::*;
//! use std::sync::Arc;
//! use tokio::sync::Semaphore;
//!
//! # async fn example() {
//! let shards = vec![
//!     stream::iter(vec![1, 4, 7]).fallible_seq(),
//!     stream::iter(vec![2, 5, 8]).fallible_seq(),
//!     stream::iter(vec![3, 6, 9]).fallible_seq(),
//! ];
//! let gate = Arc::new(Semaphore::new(2));
//! let merged = merge_buffered(
//!     shards,
//!     |a: &i32, b: &i32| a.cmp(b),
//!     &tokio::runtime::Handle::current(),
//!     gate,
//!     10,
//! );
//! let all: Vec<i32> = merged.collect().await;
//! assert_eq!(all, (1..=9).collect::<Vec<_>>());
//! # }
//! ```

pub mod error;
pub mod pipeline;
pub mod queue;
pub mod sequence;
pub mod signal;
pub mod stream_configuration;

pub use error::{OfferError, SequenceError, SequenceResult};
pub use pipeline::{merge_buffered, merge_buffered_with_config, BufferedMerge, MergePipeline};
pub use signal::CancelSignal;
pub use stream_configuration::{BufferConfig, MergeConfig};

/// Everything needed to build and consume pipelines
pub mod prelude {
    pub use crate::error::{SequenceError, SequenceResult};
    pub use crate::pipeline::{merge_buffered, merge_buffered_with_config, BufferedMerge, MergePipeline};
    pub use crate::sequence::{
        fallible, interleave, interleave_with_ratios, merge, merge_by, merge_by_key, partition,
        partition_streams, single, single_with_limit, get_global_gate, BufferedSequence, Cancellable, CancellableStream, Gated,
        OrderedMerge, Peekable, PeekableStream, PeekableStreamExt, SequenceExt, GLOBAL_GATE,
    };
    pub use crate::signal::CancelSignal;
    pub use crate::stream_configuration::{BufferConfig, MergeConfig};
}
