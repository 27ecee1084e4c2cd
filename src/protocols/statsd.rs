//! Parsing of the statsd line protocol, with the DogStatsD tag and
//! distribution extensions.

use metric::{MetricKind, Telemetry};
use std::str::FromStr;

/// Valid message formats are:
///
/// - `<str:metric_name>:<f64:value>|<str:type>`
/// - `<str:metric_name>:<f64:value>|<str:type>|@<f64:sample_rate>`
/// - `<str:metric_name>:<f64:value>|<str:type>|#<str:tag>,<str:tag>`
///
/// where `type` is one of `c`, `g`, `h`, `ms` or `d`. The sample rate and tag
/// sections may appear together, in either order. Counter values are scaled
/// up by the inverse of their sample rate. Values and sample rates must be
/// finite; `NaN` and infinities make the line malformed.
///
/// Multiple metrics can be sent in a single packet separated by newlines.
/// `now` stamps gauges and distributions. Parsing stops at the first
/// malformed line and `false` is returned; metrics parsed before it remain in
/// `res`.
///
/// # Examples
///
/// ```
/// use pointbatch::metric::MetricKind;
/// use pointbatch::protocols::statsd::parse_statsd;
///
/// let mut res = Vec::new();
/// assert!(parse_statsd("requests:1|c|#env:prod,region:us", 1000, &mut res));
/// assert_eq!(1, res.len());
/// assert_eq!(MetricKind::Counter, res[0].kind());
/// assert_eq!(vec!["env:prod", "region:us"], res[0].tags);
/// ```
pub fn parse_statsd(source: &str, now: i64, res: &mut Vec<Telemetry>) -> bool {
    for src in source.lines() {
        if src.trim().is_empty() {
            continue;
        }
        match parse_line(src, now) {
            Some(metric) => res.push(metric),
            None => return false,
        }
    }
    !res.is_empty()
}

fn parse_line(src: &str, now: i64) -> Option<Telemetry> {
    let mut sections = src.trim_end().split('|');

    let head = sections.next()?;
    let colon_idx = head.find(':')?;
    let name = &head[..colon_idx];
    if name.is_empty() {
        return None;
    }
    let val = f64::from_str(&head[(colon_idx + 1)..]).ok()?;
    if !val.is_finite() {
        return None;
    }

    let kind = match sections.next()? {
        "c" => MetricKind::Counter,
        "g" => MetricKind::Gauge,
        "h" | "ms" => MetricKind::Histogram,
        "d" => MetricKind::Distribution,
        _ => return None,
    };

    let mut sample_rate = 1.0;
    let mut tags: Vec<String> = Vec::new();
    for section in sections {
        if section.starts_with('@') {
            sample_rate = f64::from_str(&section[1..]).ok()?;
            if !(sample_rate > 0.0) || !sample_rate.is_finite() {
                return None;
            }
        } else if section.starts_with('#') {
            tags.extend(
                section[1..]
                    .split(',')
                    .filter(|t| !t.is_empty())
                    .map(|t| t.to_string()),
            );
        } else {
            return None;
        }
    }

    let val = match kind {
        MetricKind::Counter => val * (1.0 / sample_rate),
        _ => val,
    };
    if !val.is_finite() {
        return None;
    }
    Some(Telemetry::new(kind, name, now, val).overlay_tags(&tags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use metric::Metric;

    #[test]
    fn test_parse_statsd_counter() {
        let mut res = Vec::new();
        assert!(parse_statsd("fst:1|c", 10, &mut res));
        assert_eq!(1, res.len());
        assert_eq!("fst", res[0].name);
        assert_eq!(MetricKind::Counter, res[0].kind());
        assert_eq!(Some(1.0), res[0].value());
        assert!(res[0].tags.is_empty());
    }

    #[test]
    fn test_parse_statsd_counter_sample_rate() {
        let mut res = Vec::new();
        assert!(parse_statsd("fst:2|c|@0.5", 10, &mut res));
        assert_eq!(Some(4.0), res[0].value());
    }

    #[test]
    fn test_parse_statsd_sample_rate_only_scales_counters() {
        let mut res = Vec::new();
        assert!(parse_statsd("fst:2|h|@0.5", 10, &mut res));
        assert_eq!(Some(2.0), res[0].value());
    }

    #[test]
    fn test_parse_statsd_kinds() {
        let mut res = Vec::new();
        assert!(parse_statsd(
            "a:1|c\nb:2|g\nc:3|h\nd:4|ms\ne:5|d\n",
            10,
            &mut res
        ));
        let kinds: Vec<MetricKind> = res.iter().map(|m| m.kind()).collect();
        assert_eq!(
            vec![
                MetricKind::Counter,
                MetricKind::Gauge,
                MetricKind::Histogram,
                MetricKind::Histogram,
                MetricKind::Distribution,
            ],
            kinds
        );
    }

    #[test]
    fn test_parse_statsd_tags_and_rate_any_order() {
        let mut res = Vec::new();
        assert!(parse_statsd("fst:1|c|#a:b,c|@0.25", 10, &mut res));
        assert!(parse_statsd("fst:1|c|@0.25|#a:b,c", 10, &mut res));
        assert_eq!(2, res.len());
        assert_eq!(res[0], res[1]);
        assert_eq!(vec!["a:b", "c"], res[0].tags);
        assert_eq!(Some(4.0), res[0].value());
    }

    #[test]
    fn test_parse_statsd_negative_gauge() {
        let mut res = Vec::new();
        assert!(parse_statsd("temp:-12.5|g", 10, &mut res));
        assert_eq!(Some(-12.5), res[0].value());
    }

    #[test]
    fn test_parse_statsd_blank_lines_skipped() {
        let mut res = Vec::new();
        assert!(parse_statsd("\nfst:1|c\n\n", 10, &mut res));
        assert_eq!(1, res.len());
    }

    #[test]
    fn test_parse_statsd_malformed() {
        for src in &[
            "",
            "fst",
            ":1|c",
            "fst:1",
            "fst:one|c",
            "fst:1|x",
            "fst:1|c|@",
            "fst:1|c|@0",
            "fst:1|c|@-1",
            "fst:1|c|bogus",
            "fst:NaN|g",
            "fst:nan|d",
            "fst:inf|c",
            "fst:-inf|h",
            "fst:infinity|g",
            "fst:1|c|@inf",
            "fst:1|c|@NaN",
            "fst:1e308|c|@1e-10",
        ] {
            let mut res = Vec::new();
            assert!(!parse_statsd(src, 10, &mut res), "accepted {:?}", src);
        }
    }

    #[test]
    fn test_parse_statsd_non_finite_gauge_does_not_reach_join() {
        let mut res = Vec::new();
        assert!(!parse_statsd("temp:NaN|g\ntemp:1|g", 5, &mut res));
        assert!(res.is_empty());

        assert!(parse_statsd("temp:2|g\ntemp:1|g", 5, &mut res));
        let mut lhs = res[0].clone();
        lhs.join(res[1].clone());
        let mut rhs = res[1].clone();
        rhs.join(res[0].clone());
        assert_eq!(lhs, rhs);
        assert_eq!(Some(2.0), lhs.value());
    }

    #[test]
    fn test_parse_statsd_stops_at_first_bad_line() {
        let mut res = Vec::new();
        assert!(!parse_statsd("a:1|c\nb:nope|c\nc:1|c", 10, &mut res));
        assert_eq!(1, res.len());
        assert_eq!("a", res[0].name);
    }
}
