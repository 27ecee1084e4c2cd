//! pointbatch aggregates telemetry points into fixed-width time buckets
//! before they are emitted to a reporting backend. Points that share an
//! identity -- name, kind, tag set and optional host -- within the same
//! bucket are merged into one, cutting the number of records a backend has to
//! ingest.
//!
//! The heart of the crate is `batcher::Batcher`, which decides how points
//! combine and how they are keyed. It does not decide when to flush nor how
//! to transmit; `flush::FlushScheduler` and the `sink` module do that for the
//! `pointbatch` executable.
#![allow(unknown_lints)]
#![deny(trivial_numeric_casts, missing_docs, unstable_features, unused_import_braces)]
extern crate chrono;
extern crate clap;
extern crate quantiles;
extern crate seahash;
extern crate serde;
#[macro_use]
extern crate serde_json;
extern crate toml;

#[macro_use]
extern crate log;

#[macro_use]
extern crate serde_derive;

#[cfg(test)]
extern crate quickcheck;

pub mod batcher;
pub mod config;
pub mod flush;
pub mod metric;
pub mod protocols;
pub mod sink;
