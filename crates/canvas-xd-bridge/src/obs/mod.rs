//! Lightweight in-process metrics.
//!
//! Counters and histograms are stored as atomics behind `DashMap` label
//! sets and can be rendered in Prometheus text format by the embedder.

pub mod metrics;

pub use metrics::BridgeMetrics;
