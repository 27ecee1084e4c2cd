//! The input protocols that pointbatch must parse. These modules turn wire
//! text into `metric::Telemetry` ready for a batcher.

pub mod statsd;
