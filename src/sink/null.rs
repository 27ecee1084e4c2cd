use metric::ApiMetric;
use sink::Sink;

/// Null sink
///
/// This sink is intended for testing and demonstration. Every record it
/// receives will be deallocated.
pub struct Null {
    delivered: usize,
}

impl Null {
    /// Create a new Null sink
    pub fn new(_config: &NullConfig) -> Null {
        Null { delivered: 0 }
    }

    /// Total records received since creation.
    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

/// Configuration for the `Null` sink
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NullConfig {}

impl Sink for Null {
    fn deliver(&mut self, records: Vec<ApiMetric>) -> () {
        // discard records
        self.delivered += records.len();
    }

    fn flush(&mut self) {
        // do nothing
    }
}
