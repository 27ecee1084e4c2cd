//! Provides the CLI option parser
//!
//! Used to parse the argv/config file into a struct that
//! the server can consume and use as configuration data.

use clap::{App, Arg};
use sink::{ConsoleConfig, NullConfig};
use std::error;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::time::Duration;
use toml;

const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

fn default_version() -> String {
    VERSION.unwrap_or("unknown").to_string()
}

/// Errors raised while loading configuration.
#[derive(Debug)]
pub enum Error {
    /// The configuration file could not be read.
    Io(String, io::Error),
    /// The configuration file is not valid TOML or has unknown keys.
    Parse(toml::de::Error),
    /// A key held a value outside its allowed range.
    InvalidValue(&'static str, String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref path, ref e) => write!(f, "could not read {}: {}", path, e),
            Error::Parse(ref e) => write!(f, "could not parse config file: {}", e),
            Error::InvalidValue(key, ref reason) => write!(f, "invalid {}: {}", key, reason),
        }
    }
}

impl error::Error for Error {}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Error {
        Error::Parse(e)
    }
}

/// Where flushed records go.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkConfig {
    /// See `sink::Console` for more.
    Console(ConsoleConfig),
    /// See `sink::Null` for more.
    Null(NullConfig),
}

/// Big configuration struct for the pointbatch executable
///
/// This struct is what we construct from parsing the configuration. It is
/// not intended to be created by external clients. Please see documentation
/// on `parse_args` in this module for more details.
#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    /// Width of an aggregation bucket, whole seconds.
    pub bucket_width: Duration,
    /// How often the batch is extracted and sent to the sink.
    pub flush_interval: Duration,
    /// Host attached to every ingested point, if set.
    pub host: Option<String>,
    /// Tags attached to every ingested point.
    pub tags: Vec<String>,
    /// The sink flushed into.
    pub sink: SinkConfig,
    /// The verbosity setting. The higher the value the more chatty
    /// pointbatch gets.
    pub verbose: u64,
    /// Version string. This is set automatically.
    pub version: String,
}

impl Default for Args {
    fn default() -> Self {
        Args {
            bucket_width: Duration::from_secs(10),
            flush_interval: Duration::from_secs(10),
            host: None,
            tags: Vec::new(),
            sink: SinkConfig::Console(ConsoleConfig::default()),
            verbose: 0,
            version: default_version(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ConfigFile {
    bucket_width: Option<u64>,
    flush_interval: Option<u64>,
    host: Option<String>,
    tags: Option<Vec<String>>,
    sinks: Option<SinksTable>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SinksTable {
    console: Option<ConsoleConfig>,
    null: Option<NullConfig>,
}

/// Parse the pointbatch configuration arguments
///
/// This function will read the environment arguments and construct an
/// `Args`. Most configuration will be stored in an on-disk file. See
/// `pointbatch --help` for more information.
pub fn parse_args() -> Result<Args, Error> {
    let args = App::new("pointbatch")
        .version(VERSION.unwrap_or("unknown"))
        .about("batches statsd points into time buckets ahead of emission")
        .arg(
            Arg::with_name("config-file")
                .long("config")
                .short("C")
                .value_name("config")
                .required(true)
                .help("The config file to feed in.")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Turn on verbose output."),
        )
        .get_matches();

    let verb = args.occurrences_of("verbose");

    // required(true) guarantees presence
    let filename = args.value_of("config-file").unwrap_or_default();
    let mut buffer = String::new();
    File::open(filename)
        .and_then(|mut fp| fp.read_to_string(&mut buffer))
        .map_err(|e| Error::Io(filename.to_string(), e))?;
    parse_config_file(&buffer, verb)
}

/// Parse the pointbatch configuration file.
///
/// Recognized keys:
///
/// ```toml
/// bucket-width = 10      # seconds, must be positive
/// flush-interval = 10    # seconds, must be positive
/// host = "web-1"         # optional
/// tags = ["env:prod"]    # optional
///
/// [sinks.console]        # or [sinks.null], console when neither is given
/// pretty = false
/// ```
pub fn parse_config_file(buffer: &str, verbosity: u64) -> Result<Args, Error> {
    let mut args = Args::default();
    let file: ConfigFile = toml::from_str(buffer)?;

    args.verbose = verbosity;

    if let Some(width) = file.bucket_width {
        if width == 0 {
            return Err(Error::InvalidValue(
                "bucket-width",
                "must be at least one second".to_string(),
            ));
        }
        args.bucket_width = Duration::from_secs(width);
    }

    if let Some(interval) = file.flush_interval {
        if interval == 0 {
            return Err(Error::InvalidValue(
                "flush-interval",
                "must be at least one second".to_string(),
            ));
        }
        args.flush_interval = Duration::from_secs(interval);
    }

    args.host = file.host;
    args.tags = file.tags.unwrap_or_default();

    if let Some(sinks) = file.sinks {
        match (sinks.console, sinks.null) {
            (Some(_), Some(_)) => {
                return Err(Error::InvalidValue(
                    "sinks",
                    "only one sink may be configured".to_string(),
                ))
            }
            (Some(console), None) => args.sink = SinkConfig::Console(console),
            (None, Some(null)) => args.sink = SinkConfig::Null(null),
            (None, None) => {}
        }
    }

    Ok(args)
}
