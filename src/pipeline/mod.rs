//! Buffered-merge orchestration
//!
//! Wires gating, buffering, merging and cancellation into one entry point
//! for fan-out queries over shards.

pub mod builder;

pub use builder::{merge_buffered, merge_buffered_with_config, BufferedMerge, MergePipeline};
