use chrono::{DateTime, Utc};
use metric::key::{self, BatchKey};
use metric::{ApiMetric, Metric, MetricKind, MetricType, Points};
use quantiles::ckms::CKMS;
use std::cmp::Ordering;

/// Error bound of the quantile summary kept by histograms.
const HISTOGRAM_ERROR: f64 = 0.001;

#[derive(Debug, Clone, PartialEq)]
struct Summary {
    count: usize,
    sum: f64,
    min: f64,
    max: f64,
    ckms: CKMS<f64>,
}

impl Summary {
    fn new(value: f64) -> Summary {
        let mut ckms = CKMS::new(HISTOGRAM_ERROR);
        ckms.insert(value);
        Summary {
            count: 1,
            sum: value,
            min: value,
            max: value,
            ckms: ckms,
        }
    }

    fn merge(&mut self, other: Summary) {
        self.count += other.count;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.ckms += other.ckms;
    }

    fn quantile(&self, q: f64) -> Option<f64> {
        self.ckms.query(q).map(|(_, v)| v)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Sum(f64),
    Last { time: i64, value: f64 },
    Summary(Summary),
    Samples(Vec<(i64, f64)>),
}

/// A named, tagged point that aggregates according to its kind.
///
/// Tags are free-form strings, conventionally `key:value`. The host is
/// optional and distinguishes otherwise identical metrics reported on behalf
/// of different machines.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    /// The name of the metric.
    pub name: String,
    /// Tags as supplied. Order is not significant.
    pub tags: Vec<String>,
    /// Originating host, if any.
    pub host: Option<String>,
    value: Value,
}

impl Telemetry {
    /// Create a new `Telemetry` of the given kind.
    ///
    /// `time` is the instant, in seconds since the Unix epoch, the observation
    /// was made. Gauges and distributions keep it; counters and histograms do
    /// not.
    pub fn new<S>(kind: MetricKind, name: S, time: i64, value: f64) -> Telemetry
    where
        S: Into<String>,
    {
        let value = match kind {
            MetricKind::Counter => Value::Sum(value),
            MetricKind::Gauge => Value::Last {
                time: time,
                value: value,
            },
            MetricKind::Histogram => Value::Summary(Summary::new(value)),
            MetricKind::Distribution => Value::Samples(vec![(time, value)]),
        };
        Telemetry {
            name: name.into(),
            tags: Vec::new(),
            host: None,
            value: value,
        }
    }

    /// Create a counter
    ///
    /// # Examples
    ///
    /// ```
    /// use pointbatch::metric::{Metric, MetricKind, Telemetry};
    ///
    /// let mut m = Telemetry::counter("requests", 1.0).overlay_tag("env:prod");
    /// m.join(Telemetry::counter("requests", 2.0).overlay_tag("env:prod"));
    ///
    /// assert_eq!(MetricKind::Counter, m.kind());
    /// assert_eq!(Some(3.0), m.value());
    /// ```
    pub fn counter<S>(name: S, value: f64) -> Telemetry
    where
        S: Into<String>,
    {
        Telemetry::new(MetricKind::Counter, name, 0, value)
    }

    /// Create a gauge observed at `time`.
    pub fn gauge<S>(name: S, time: i64, value: f64) -> Telemetry
    where
        S: Into<String>,
    {
        Telemetry::new(MetricKind::Gauge, name, time, value)
    }

    /// Create a histogram.
    pub fn histogram<S>(name: S, value: f64) -> Telemetry
    where
        S: Into<String>,
    {
        Telemetry::new(MetricKind::Histogram, name, 0, value)
    }

    /// Create a distribution observed at `time`.
    pub fn distribution<S>(name: S, time: i64, value: f64) -> Telemetry
    where
        S: Into<String>,
    {
        Telemetry::new(MetricKind::Distribution, name, time, value)
    }

    /// Add a tag
    pub fn overlay_tag<S>(mut self, tag: S) -> Telemetry
    where
        S: Into<String>,
    {
        self.tags.push(tag.into());
        self
    }

    /// Add every tag in `tags`.
    pub fn overlay_tags(mut self, tags: &[String]) -> Telemetry {
        self.tags.extend(tags.iter().cloned());
        self
    }

    /// Set the host
    pub fn host<S>(mut self, host: S) -> Telemetry
    where
        S: Into<String>,
    {
        self.host = Some(host.into());
        self
    }

    /// The kind of this metric.
    pub fn kind(&self) -> MetricKind {
        kind_of(&self.value)
    }

    /// The headline value of this metric.
    ///
    /// Counters return their sum, gauges their latest observation and
    /// histograms their mean. Distributions have no single value and return
    /// the sum of their samples.
    pub fn value(&self) -> Option<f64> {
        match self.value {
            Value::Sum(x) => Some(x),
            Value::Last { value, .. } => Some(value),
            Value::Summary(ref s) => Some(s.sum / s.count as f64),
            Value::Samples(ref samples) => Some(samples.iter().map(|&(_, v)| v).sum()),
        }
    }

    /// Number of observations folded into this metric.
    pub fn count(&self) -> usize {
        match self.value {
            Value::Sum(_) | Value::Last { .. } => 1,
            Value::Summary(ref s) => s.count,
            Value::Samples(ref samples) => samples.len(),
        }
    }

    /// Query the `q` quantile of a histogram or distribution.
    pub fn query(&self, q: f64) -> Option<f64> {
        match self.value {
            Value::Summary(ref s) => s.quantile(q),
            Value::Samples(ref samples) => {
                if samples.is_empty() {
                    return None;
                }
                let mut vs: Vec<f64> = samples.iter().map(|&(_, v)| v).collect();
                vs.sort_by(|a, b| a.total_cmp(b));
                let idx = ((vs.len() - 1) as f64 * q).round() as usize;
                vs.get(idx).cloned()
            }
            _ => None,
        }
    }

    fn record(&self, metric_type: MetricType, suffix: &str, interval: Option<u64>, points: Points) -> ApiMetric {
        ApiMetric {
            name: format!("{}{}", self.name, suffix),
            host: self.host.clone(),
            tags: key::canonical_tags(&self.tags),
            metric_type: metric_type,
            interval: interval,
            points: points,
        }
    }
}

impl Metric for Telemetry {
    type Record = ApiMetric;

    fn batch_key(&self) -> BatchKey {
        BatchKey::new(
            self.kind(),
            self.name.as_str(),
            &self.tags,
            self.host.as_ref().map(|h| h.as_str()),
        )
    }

    fn join(&mut self, other: Telemetry) {
        let current = self.kind();
        match (&mut self.value, other.value) {
            (&mut Value::Sum(ref mut x), Value::Sum(y)) => *x += y,
            (
                &mut Value::Last {
                    ref mut time,
                    ref mut value,
                },
                Value::Last { time: t, value: v },
            ) => {
                // Latest observation wins; ties go to the larger value under
                // the IEEE total order, NaN included.
                if t > *time || (t == *time && v.total_cmp(value) == Ordering::Greater) {
                    *time = t;
                    *value = v;
                }
            }
            (&mut Value::Summary(ref mut x), Value::Summary(y)) => x.merge(y),
            (&mut Value::Samples(ref mut x), Value::Samples(y)) => x.extend(y),
            (_, y) => {
                // Kind is part of the batch key, so reaching this arm means the
                // caller joined across identities.
                error!(
                    "refusing to join {} into {} metric {:?}",
                    kind_of(&y),
                    current,
                    self.name
                );
            }
        }
    }

    fn to_api_metrics(&self, timestamp: DateTime<Utc>, interval: u64) -> Vec<ApiMetric> {
        let ts = timestamp.timestamp();
        match self.value {
            Value::Sum(x) => vec![
                self.record(MetricType::Count, "", Some(interval), Points::Scalar(vec![(ts, x)])),
            ],
            Value::Last { value, .. } => vec![
                self.record(MetricType::Gauge, "", Some(interval), Points::Scalar(vec![(ts, value)])),
            ],
            Value::Summary(ref s) => {
                let mut records = Vec::with_capacity(6);
                let gauge = |suffix: &str, v: f64| {
                    self.record(MetricType::Gauge, suffix, Some(interval), Points::Scalar(vec![(ts, v)]))
                };
                records.push(gauge(".min", s.min));
                records.push(gauge(".max", s.max));
                records.push(gauge(".avg", s.sum / s.count as f64));
                if let Some(median) = s.quantile(0.5) {
                    records.push(gauge(".median", median));
                }
                if let Some(p95) = s.quantile(0.95) {
                    records.push(gauge(".95percentile", p95));
                }
                let rate = if interval > 0 {
                    s.count as f64 / interval as f64
                } else {
                    s.count as f64
                };
                records.push(self.record(
                    MetricType::Rate,
                    ".count",
                    Some(interval),
                    Points::Scalar(vec![(ts, rate)]),
                ));
                records
            }
            Value::Samples(ref samples) => {
                let mut samples = samples.clone();
                samples.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.total_cmp(&b.1)));
                let values = samples.into_iter().map(|(_, v)| v).collect();
                vec![
                    self.record(
                        MetricType::Distribution,
                        "",
                        None,
                        Points::Distribution(vec![(ts, values)]),
                    ),
                ]
            }
        }
    }
}

fn kind_of(value: &Value) -> MetricKind {
    match *value {
        Value::Sum(_) => MetricKind::Counter,
        Value::Last { .. } => MetricKind::Gauge,
        Value::Summary(_) => MetricKind::Histogram,
        Value::Samples(_) => MetricKind::Distribution,
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use quickcheck::{QuickCheck, TestResult};

    fn at(ts: i64) -> DateTime<Utc> {
        Utc.timestamp(ts, 0)
    }

    fn same_identity(m: &Telemetry, time: i64, value: f64) -> Telemetry {
        let mut tags = m.tags.clone();
        tags.reverse();
        let mut other = Telemetry::new(m.kind(), m.name.clone(), time, value).overlay_tags(&tags);
        other.host = m.host.clone();
        other
    }

    #[test]
    fn counter_sums() {
        let mut m = Telemetry::counter("requests", 1.0);
        m.join(Telemetry::counter("requests", 2.0));
        m.join(Telemetry::counter("requests", 4.5));
        assert_eq!(Some(7.5), m.value());

        let records = m.to_api_metrics(at(1010), 10);
        assert_eq!(1, records.len());
        assert_eq!(MetricType::Count, records[0].metric_type);
        assert_eq!(Some(10), records[0].interval);
        assert_eq!(Points::Scalar(vec![(1010, 7.5)]), records[0].points);
    }

    #[test]
    fn gauge_keeps_latest_observation() {
        let mut m = Telemetry::gauge("temp", 12, 1.0);
        m.join(Telemetry::gauge("temp", 15, 3.0));
        m.join(Telemetry::gauge("temp", 13, 8.0));
        assert_eq!(Some(3.0), m.value());

        let records = m.to_api_metrics(at(20), 10);
        assert_eq!(1, records.len());
        assert_eq!(MetricType::Gauge, records[0].metric_type);
        assert_eq!(Some(3.0), records[0].value());
    }

    #[test]
    fn gauge_tie_is_order_independent() {
        let mut m0 = Telemetry::gauge("temp", 12, 1.0);
        m0.join(Telemetry::gauge("temp", 12, 2.0));
        let mut m1 = Telemetry::gauge("temp", 12, 2.0);
        m1.join(Telemetry::gauge("temp", 12, 1.0));
        assert_eq!(m0, m1);
        assert_eq!(Some(2.0), m0.value());
    }

    #[test]
    fn histogram_summarizes() {
        let mut m = Telemetry::histogram("latency", 1.0);
        for v in &[2.0, 3.0, 4.0] {
            m.join(Telemetry::histogram("latency", *v));
        }
        assert_eq!(4, m.count());
        assert_eq!(Some(2.5), m.value());

        let records = m.to_api_metrics(at(100), 2);
        let find = |name: &str| {
            records
                .iter()
                .find(|r| r.name == name)
                .and_then(|r| r.value())
        };
        assert_eq!(Some(1.0), find("latency.min"));
        assert_eq!(Some(4.0), find("latency.max"));
        assert_eq!(Some(2.5), find("latency.avg"));
        assert!(find("latency.median").is_some());
        assert!(find("latency.95percentile").is_some());
        assert_eq!(Some(2.0), find("latency.count"));

        let count = records.iter().find(|r| r.name == "latency.count").unwrap();
        assert_eq!(MetricType::Rate, count.metric_type);
    }

    #[test]
    fn distribution_keeps_every_sample() {
        let mut m = Telemetry::distribution("payload", 3, 9.0);
        m.join(Telemetry::distribution("payload", 1, 4.0));
        m.join(Telemetry::distribution("payload", 2, 4.0));
        assert_eq!(3, m.count());

        let records = m.to_api_metrics(at(10), 10);
        assert_eq!(1, records.len());
        assert_eq!(MetricType::Distribution, records[0].metric_type);
        assert_eq!(None, records[0].interval);
        assert_eq!(Points::Distribution(vec![(10, vec![4.0, 4.0, 9.0])]), records[0].points);
    }

    fn bits(records: &[ApiMetric]) -> Vec<Vec<u64>> {
        records
            .iter()
            .map(|r| r.values().into_iter().map(f64::to_bits).collect())
            .collect()
    }

    #[test]
    fn gauge_tie_with_non_finite_values_is_order_independent() {
        let specials = [::std::f64::NAN, ::std::f64::INFINITY, ::std::f64::NEG_INFINITY, -0.0, 0.0, 1.0];
        for a in &specials {
            for b in &specials {
                let mut lhs = Telemetry::gauge("temp", 5, *a);
                lhs.join(Telemetry::gauge("temp", 5, *b));
                let mut rhs = Telemetry::gauge("temp", 5, *b);
                rhs.join(Telemetry::gauge("temp", 5, *a));
                assert_eq!(
                    lhs.value().map(f64::to_bits),
                    rhs.value().map(f64::to_bits),
                    "{} vs {}",
                    a,
                    b
                );
            }
        }

        let mut m = Telemetry::gauge("temp", 5, ::std::f64::NAN);
        m.join(Telemetry::gauge("temp", 5, 1.0));
        assert!(m.value().map_or(false, f64::is_nan));
    }

    #[test]
    fn distribution_order_with_non_finite_values_is_order_independent() {
        let samples = [1.0, ::std::f64::NAN, -0.0, ::std::f64::INFINITY, 0.0, 1.0];
        let mut fwd = Telemetry::distribution("payload", 1, samples[0]);
        for v in &samples[1..] {
            fwd.join(Telemetry::distribution("payload", 1, *v));
        }
        let mut rev = Telemetry::distribution("payload", 1, samples[samples.len() - 1]);
        for v in samples[..samples.len() - 1].iter().rev() {
            rev.join(Telemetry::distribution("payload", 1, *v));
        }
        let fwd = fwd.to_api_metrics(at(10), 10);
        let rev = rev.to_api_metrics(at(10), 10);
        assert_eq!(bits(&fwd), bits(&rev));
        assert_eq!(
            vec![(-0.0f64).to_bits(), 0.0f64.to_bits(), 1.0f64.to_bits(), 1.0f64.to_bits()],
            bits(&fwd)[0][..4].to_vec()
        );
    }

    #[test]
    fn mismatched_join_is_refused() {
        let mut m = Telemetry::counter("requests", 1.0);
        m.join(Telemetry::gauge("requests", 0, 100.0));
        assert_eq!(MetricKind::Counter, m.kind());
        assert_eq!(Some(1.0), m.value());
    }

    #[test]
    fn records_carry_canonical_tags_and_host() {
        let m = Telemetry::counter("requests", 1.0)
            .overlay_tag("region:us")
            .overlay_tag("env:prod")
            .overlay_tag("env:prod")
            .host("web-1");
        let records = m.to_api_metrics(at(0), 1);
        assert_eq!(
            vec!["env:prod".to_string(), "region:us".to_string()],
            records[0].tags
        );
        assert_eq!(Some("web-1".to_string()), records[0].host);
    }

    #[test]
    fn batch_key_ignores_tag_order() {
        fn inner(m: Telemetry) -> TestResult {
            let other = same_identity(&m, 0, 1.0);
            assert_eq!(m.batch_key(), other.batch_key());
            TestResult::passed()
        }
        QuickCheck::new()
            .tests(1000)
            .max_tests(10000)
            .quickcheck(inner as fn(Telemetry) -> TestResult);
    }

    #[test]
    fn join_is_commutative() {
        fn inner(m: Telemetry, time: i64, value: i64, special: Option<u8>) -> TestResult {
            let value = match special {
                None => value as f64,
                Some(_) if m.kind() == MetricKind::Histogram => return TestResult::discard(),
                Some(n) => match n % 4 {
                    0 => ::std::f64::NAN,
                    1 => ::std::f64::INFINITY,
                    2 => ::std::f64::NEG_INFINITY,
                    _ => -0.0,
                },
            };
            let other = same_identity(&m, time, value);

            let mut lhs = m.clone();
            lhs.join(other.clone());
            let mut rhs = other;
            rhs.join(m);

            let mut l_recs = lhs.to_api_metrics(Utc.timestamp(1000, 0), 10);
            let mut r_recs = rhs.to_api_metrics(Utc.timestamp(1000, 0), 10);
            l_recs.sort_by(|a, b| a.name.cmp(&b.name));
            r_recs.sort_by(|a, b| a.name.cmp(&b.name));
            let names = |rs: &[ApiMetric]| rs.iter().map(|r| r.name.clone()).collect::<Vec<_>>();
            assert_eq!(names(&l_recs), names(&r_recs));
            assert_eq!(bits(&l_recs), bits(&r_recs));
            assert_eq!(lhs.count(), rhs.count());
            TestResult::passed()
        }
        QuickCheck::new()
            .tests(1000)
            .max_tests(10000)
            .quickcheck(inner as fn(Telemetry, i64, i64, Option<u8>) -> TestResult);
    }
}
