//! Emission-ready records.
//!
//! An `ApiMetric` is what a `Telemetry` becomes at flush. It serializes into
//! the JSON shape commonly accepted by time-series intake APIs and is handed
//! to a `sink::Sink` untouched.

use std::fmt;

/// The type an `ApiMetric` is reported as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// Sum over the interval.
    Count,
    /// Point-in-time value.
    Gauge,
    /// Per-second rate over the interval.
    Rate,
    /// Raw observations for server-side aggregation.
    Distribution,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match *self {
            MetricType::Count => "count",
            MetricType::Gauge => "gauge",
            MetricType::Rate => "rate",
            MetricType::Distribution => "distribution",
        };
        f.write_str(s)
    }
}

/// The points carried by an `ApiMetric`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Points {
    /// `[[timestamp, value], ...]`
    Scalar(Vec<(i64, f64)>),
    /// `[[timestamp, [value, ...]], ...]`
    Distribution(Vec<(i64, Vec<f64>)>),
}

/// A single emission-ready record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiMetric {
    /// Name the record is reported under.
    #[serde(rename = "metric")]
    pub name: String,
    /// Originating host, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Canonical tag set.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// How the backend should interpret `points`.
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    /// Width of the aggregation bucket in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    /// The data.
    pub points: Points,
}

impl ApiMetric {
    /// The first scalar value of this record, if it has one.
    ///
    /// Distribution records return `None`.
    pub fn value(&self) -> Option<f64> {
        match self.points {
            Points::Scalar(ref pts) => pts.first().map(|&(_, v)| v),
            Points::Distribution(_) => None,
        }
    }

    /// All values of this record, in point order.
    pub fn values(&self) -> Vec<f64> {
        match self.points {
            Points::Scalar(ref pts) => pts.iter().map(|&(_, v)| v).collect(),
            Points::Distribution(ref pts) => {
                pts.iter().flat_map(|&(_, ref vs)| vs.iter().cloned()).collect()
            }
        }
    }
}
