//! Metrics are the unit of aggregation in pointbatch.
//!
//! Any type implementing `Metric` may be handed to a `batcher::Batcher`. The
//! metric decides its own identity, how it absorbs another point of the same
//! identity and how it renders itself into emission-ready records. `Telemetry`
//! is the implementation shipped with this crate and is what the statsd
//! protocol produces.

use chrono::{DateTime, Utc};
use std::fmt;

mod api;
pub mod key;
mod telemetry;

pub use self::api::{ApiMetric, MetricType, Points};
pub use self::key::BatchKey;
pub use self::telemetry::Telemetry;

/// The kinds of metric understood by pointbatch.
///
/// The kind is part of a metric's identity: a counter and a gauge that share
/// a name and tags never aggregate together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricKind {
    /// Monotonic sum of observations within the bucket.
    Counter,
    /// Most recent observation within the bucket.
    Gauge,
    /// Summary statistics computed locally from observations.
    Histogram,
    /// Every observation, forwarded for server-side aggregation.
    Distribution,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match *self {
            MetricKind::Counter => "count",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
            MetricKind::Distribution => "distribution",
        };
        f.write_str(s)
    }
}

/// The capability a value must have to be aggregated by a `Batcher`.
///
/// Implementations must make `join` commutative and associative. The batcher
/// merges points in call order, not time order, and the final aggregate may
/// not depend on that order.
pub trait Metric {
    /// The emission-ready record produced at flush.
    type Record;

    /// Identity of this metric for aggregation purposes, independent of time.
    fn batch_key(&self) -> BatchKey;

    /// Absorb the observations of `other` into `self`.
    ///
    /// The batcher only ever joins metrics whose batch keys are equal, so
    /// `other` is of the same kind as `self`.
    fn join(&mut self, other: Self);

    /// Render into zero or more records stamped with `timestamp`. `interval`
    /// is the bucket width in whole seconds.
    fn to_api_metrics(&self, timestamp: DateTime<Utc>, interval: u64) -> Vec<Self::Record>;
}
