//! A 'sink' is the transport seam for emission-ready records.
//!
//! The flush scheduler hands every extracted batch to a sink with `deliver`
//! and then calls `flush`. What a sink does with records is its own business;
//! the batcher does not know sinks exist.

use metric::ApiMetric;

mod console;
mod null;

pub use self::console::{Console, ConsoleConfig};
pub use self::null::{Null, NullConfig};

/// A sink for emission-ready records.
pub trait Sink {
    /// Accept the records of one flush.
    fn deliver(&mut self, records: Vec<ApiMetric>) -> ();
    /// Push delivered records onward.
    fn flush(&mut self) -> ();
}
