use metric::ApiMetric;
use serde_json;
use sink::Sink;
use std::io::{self, Write};

/// Console sink
///
/// Writes every delivered record as one line of JSON. Records are buffered
/// between `deliver` and `flush`.
pub struct Console<W> {
    writer: W,
    pretty: bool,
    buffer: Vec<ApiMetric>,
}

/// Configuration for the `Console` sink
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsoleConfig {
    /// Indent JSON output. Records then span several lines each.
    #[serde(default)]
    pub pretty: bool,
}

impl Console<io::Stdout> {
    /// Create a new Console sink writing to stdout.
    pub fn new(config: &ConsoleConfig) -> Console<io::Stdout> {
        Console::with_writer(config, io::stdout())
    }
}

impl<W> Console<W>
where
    W: Write,
{
    /// Create a new Console sink writing to `writer`.
    pub fn with_writer(config: &ConsoleConfig, writer: W) -> Console<W> {
        Console {
            writer: writer,
            pretty: config.pretty,
            buffer: Vec::new(),
        }
    }

    /// Consume the sink, returning its writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record(&mut self, record: &ApiMetric) -> io::Result<()> {
        let res = if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, record)
        } else {
            serde_json::to_writer(&mut self.writer, record)
        };
        res.map_err(io::Error::from)?;
        self.writer.write_all(b"\n")
    }
}

impl<W> Sink for Console<W>
where
    W: Write,
{
    fn deliver(&mut self, records: Vec<ApiMetric>) -> () {
        self.buffer.extend(records);
    }

    fn flush(&mut self) {
        let records: Vec<ApiMetric> = self.buffer.drain(..).collect();
        let mut failed = 0;
        for record in &records {
            if let Err(e) = self.write_record(record) {
                error!("unable to write record {}: {}", record.name, e);
                failed += 1;
            }
        }
        if let Err(e) = self.writer.flush() {
            error!("unable to flush console: {}", e);
        }
        debug!(
            "console wrote {} records, {} failed",
            records.len() - failed,
            failed
        );
    }
}
