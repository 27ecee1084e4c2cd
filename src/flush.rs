//! The flush scheduler decides when a batch is complete.
//!
//! A `FlushScheduler` owns the active `Batcher` and a `Sink`. Points are
//! ingested as they arrive; on every `tick` the scheduler checks whether the
//! flush interval has elapsed and, if so, extracts the batch, delivers it to
//! the sink and starts an empty batch. The scheduler is driven by its caller
//! and spawns no threads.

use batcher::{self, Batcher};
use chrono::{DateTime, Utc};
use metric::Telemetry;
use sink::Sink;
use std::time::Duration;

/// The source of flushes. See `FlushScheduler::tick` for more details.
pub struct FlushScheduler<S> {
    batcher: Batcher<Telemetry>,
    sink: S,
    flush_interval: i64,
    last_flush: DateTime<Utc>,
    flushes: u64,
}

impl<S> FlushScheduler<S>
where
    S: Sink,
{
    /// Create a new FlushScheduler
    ///
    /// `bucket_width` configures the batcher, `flush_interval` how often it
    /// is extracted. The first flush is due `flush_interval` after `now`. A
    /// `flush_interval` under one second flushes on every tick.
    pub fn new(
        bucket_width: Duration,
        flush_interval: Duration,
        sink: S,
        now: DateTime<Utc>,
    ) -> Result<FlushScheduler<S>, batcher::Error> {
        Ok(FlushScheduler {
            batcher: Batcher::new(bucket_width)?,
            sink: sink,
            flush_interval: flush_interval.as_secs().min(i64::max_value() as u64) as i64,
            last_flush: now,
            flushes: 0,
        })
    }

    /// Hand a point observed at `timestamp` to the active batch.
    pub fn ingest(&mut self, timestamp: DateTime<Utc>, metric: Telemetry) {
        self.batcher.add_metric(timestamp, metric);
    }

    /// Flush if the flush interval has elapsed since the last flush.
    ///
    /// Returns whether a flush happened.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        let elapsed = now.timestamp() - self.last_flush.timestamp();
        if elapsed >= self.flush_interval {
            self.flush(now);
            true
        } else {
            false
        }
    }

    /// Extract the active batch into the sink and rotate to an empty batch,
    /// regardless of the interval.
    pub fn flush(&mut self, now: DateTime<Utc>) {
        let buckets = self.batcher.len();
        let records = self.batcher.to_api_metrics(now);
        debug!(
            "flush {}: {} buckets, {} records",
            self.flushes,
            buckets,
            records.len()
        );
        self.sink.deliver(records);
        self.sink.flush();
        self.batcher.reset();
        self.last_flush = now;
        self.flushes += 1;
    }

    /// The active batch.
    pub fn batcher(&self) -> &Batcher<Telemetry> {
        &self.batcher
    }

    /// The sink flushed into.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the scheduler, returning its sink. Unflushed points are lost.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Number of flushes performed.
    pub fn flushes(&self) -> u64 {
        self.flushes
    }
}
