//! The batcher is the primary internal storage type.
//!
//! It holds one aggregated metric per bucket identity, merging every point
//! that shares a `BatchKey` within the same epoch-aligned time bucket. The
//! batcher never decides when to flush and never clears itself on
//! extraction; rotation belongs to whoever owns it, see `flush`.
//!
//! A `Batcher` does no locking. Callers that ingest from several threads
//! must serialize access themselves.

use chrono::{DateTime, Utc};
use metric::key::{self, BatchKey};
use metric::Metric;
use seahash::SeaHasher;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::error;
use std::fmt;
use std::hash::BuildHasherDefault;
use std::time::Duration;

/// A `HashMap` keyed through `SeaHasher`.
pub type HashMapSea<K, V> = HashMap<K, V, BuildHasherDefault<SeaHasher>>;

/// Errors raised when constructing a `Batcher`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The bucket width was zero.
    ZeroWidth,
    /// The bucket width was positive but under one second. Widths are
    /// truncated to whole seconds, so this would produce a zero interval.
    SubSecondWidth(Duration),
    /// The bucket width, in whole seconds, does not fit a signed 64-bit
    /// timestamp.
    WidthTooLarge(Duration),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::ZeroWidth => write!(f, "bucket width must be positive"),
            Error::SubSecondWidth(d) => {
                write!(f, "bucket width {:?} is shorter than one second", d)
            }
            Error::WidthTooLarge(d) => write!(f, "bucket width {:?} is too large", d),
        }
    }
}

impl error::Error for Error {}

/// Batcher stores all metrics until they are flushed.
#[derive(Debug)]
pub struct Batcher<M> {
    metrics: HashMapSea<String, M>,
    batch_interval: Duration,
}

impl<M> Batcher<M>
where
    M: Metric,
{
    /// Create a new, empty `Batcher` with buckets `batch_interval` wide.
    ///
    /// The width is truncated to whole seconds and must lie between one
    /// second and `i64::max_value()` seconds.
    ///
    /// # Examples
    ///
    /// ```
    /// use pointbatch::batcher::Batcher;
    /// use pointbatch::metric::Telemetry;
    /// use std::time::Duration;
    ///
    /// let batcher = Batcher::<Telemetry>::new(Duration::from_secs(10)).unwrap();
    /// assert!(batcher.is_empty());
    /// assert_eq!(10, batcher.interval());
    ///
    /// assert!(Batcher::<Telemetry>::new(Duration::from_secs(0)).is_err());
    /// ```
    pub fn new(batch_interval: Duration) -> Result<Batcher<M>, Error> {
        if batch_interval == Duration::new(0, 0) {
            return Err(Error::ZeroWidth);
        }
        if batch_interval.as_secs() == 0 {
            return Err(Error::SubSecondWidth(batch_interval));
        }
        if batch_interval.as_secs() > i64::max_value() as u64 {
            return Err(Error::WidthTooLarge(batch_interval));
        }
        Ok(Batcher {
            metrics: HashMapSea::default(),
            batch_interval: batch_interval,
        })
    }

    /// Adds a metric to the batcher storage.
    ///
    /// If a metric with the same identity already lives in the bucket that
    /// `timestamp` falls in, `metric` is joined into it. Otherwise `metric`
    /// becomes the initial value of that bucket.
    ///
    /// # Examples
    ///
    /// ```
    /// extern crate chrono;
    /// extern crate pointbatch;
    ///
    /// use chrono::{TimeZone, Utc};
    /// use pointbatch::batcher::Batcher;
    /// use pointbatch::metric::Telemetry;
    /// use std::time::Duration;
    ///
    /// fn main() {
    ///     let mut batcher = Batcher::new(Duration::from_secs(10)).unwrap();
    ///     batcher.add_metric(Utc.timestamp(1000, 0), Telemetry::counter("foo", 1.0));
    ///     batcher.add_metric(Utc.timestamp(1009, 0), Telemetry::counter("foo", 1.0));
    ///     assert_eq!(1, batcher.len());
    ///
    ///     batcher.add_metric(Utc.timestamp(1010, 0), Telemetry::counter("foo", 1.0));
    ///     assert_eq!(2, batcher.len());
    /// }
    /// ```
    pub fn add_metric(&mut self, timestamp: DateTime<Utc>, metric: M) {
        let sk = self.string_key(&timestamp, &metric.batch_key());
        match self.metrics.entry(sk) {
            Entry::Occupied(mut entry) => {
                trace!("joining into {}", entry.key());
                entry.get_mut().join(metric);
            }
            Entry::Vacant(entry) => {
                trace!("opening {}", entry.key());
                entry.insert(metric);
            }
        }
    }

    /// Convert every stored bucket into emission-ready records stamped with
    /// `timestamp`.
    ///
    /// Storage is left untouched: calling this twice without ingesting in
    /// between renders the same state twice. The order of records across
    /// distinct buckets is unspecified.
    pub fn to_api_metrics(&self, timestamp: DateTime<Utc>) -> Vec<M::Record> {
        let interval = self.interval();
        let records: Vec<M::Record> = self
            .metrics
            .values()
            .flat_map(|metric| metric.to_api_metrics(timestamp, interval))
            .collect();
        trace!(
            "rendered {} buckets into {} records",
            self.metrics.len(),
            records.len()
        );
        records
    }

    /// Look up the aggregate for `key` in the bucket `timestamp` falls in.
    pub fn get(&self, timestamp: &DateTime<Utc>, key: &BatchKey) -> Option<&M> {
        self.metrics.get(&self.string_key(timestamp, key))
    }

    /// Drop all stored buckets.
    ///
    /// Extraction never calls this. It is here for the owner of the batcher
    /// to rotate between flushes without reallocating.
    pub fn reset(&mut self) {
        self.metrics.clear();
    }
}

impl<M> Batcher<M> {
    /// The configured bucket width.
    pub fn batch_interval(&self) -> Duration {
        self.batch_interval
    }

    /// The bucket width in whole seconds, sub-second remainder discarded.
    pub fn interval(&self) -> u64 {
        self.batch_interval.as_secs()
    }

    /// Number of distinct buckets currently held.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Whether no bucket is held.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// The epoch-aligned bucket index `timestamp` falls in.
    pub fn bucket_index(&self, timestamp: &DateTime<Utc>) -> i64 {
        key::bucket_index(timestamp.timestamp(), self.interval())
    }

    fn string_key(&self, timestamp: &DateTime<Utc>, bk: &BatchKey) -> String {
        key::string_key(self.bucket_index(timestamp), bk)
    }
}
