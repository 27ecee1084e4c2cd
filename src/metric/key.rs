//! Batch identity and the derivation of bucket-identity strings.
//!
//! A `BatchKey` says which points aggregate together regardless of time. The
//! batcher qualifies it with a time-bucket index and serializes the pair into
//! a single string, the lookup key of its aggregation map.
//!
//! Key format:
//!
//! ```text
//! (<bucket index>)-(<kind>)-(<name>)-(<tag count>[:<tag>:<tag>...])[-(<host>)]
//! ```
//!
//! Inside every field the characters `\`, `(`, `)` and `:` are escaped with a
//! backslash, so an unescaped `)` always closes a field and an unescaped `:`
//! always separates two tags. The leading tag count keeps the empty tag set
//! apart from a set holding only the empty tag. The host segment is present
//! exactly when a host is, which keeps "no host" apart from "empty host".

use metric::MetricKind;
use std::fmt::Write;

const TAG_DELIMITER: char = ':';

/// Identity of a metric for aggregation: kind, name, tag set and optional
/// host.
///
/// Tags are held in canonical form, sorted with duplicates removed, so two
/// keys built from permutations of the same tags compare and
/// hash equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchKey {
    kind: MetricKind,
    name: String,
    tags: Vec<String>,
    host: Option<String>,
}

impl BatchKey {
    /// Create a new `BatchKey`
    ///
    /// # Examples
    ///
    /// ```
    /// use pointbatch::metric::{BatchKey, MetricKind};
    ///
    /// let tags0 = vec!["env:prod".to_string(), "region:us".to_string()];
    /// let tags1 = vec!["region:us".to_string(), "env:prod".to_string()];
    ///
    /// let k0 = BatchKey::new(MetricKind::Counter, "requests", &tags0, None);
    /// let k1 = BatchKey::new(MetricKind::Counter, "requests", &tags1, None);
    /// assert_eq!(k0, k1);
    /// ```
    pub fn new<S>(kind: MetricKind, name: S, tags: &[String], host: Option<&str>) -> BatchKey
    where
        S: Into<String>,
    {
        BatchKey {
            kind: kind,
            name: name.into(),
            tags: canonical_tags(tags),
            host: host.map(|h| h.to_string()),
        }
    }

    /// The kind of the keyed metric.
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// The name of the keyed metric.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The canonical tag set: sorted, without duplicates.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// The host, if the metric carries one.
    pub fn host(&self) -> Option<&str> {
        self.host.as_ref().map(|h| h.as_str())
    }
}

/// Sort tags lexicographically, dropping duplicates.
///
/// The empty string is a tag like any other.
pub fn canonical_tags(tags: &[String]) -> Vec<String> {
    let mut sorted: Vec<String> = tags.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted
}

/// Produce the canonical signature of a tag collection.
///
/// The order of `tags` does not matter. The signature alone does not tell
/// `[]` from `[""]`; `string_key` prefixes it with the tag count.
///
/// # Examples
///
/// ```
/// use pointbatch::metric::key::tag_signature;
///
/// let tags = vec!["b".to_string(), "a".to_string()];
/// assert_eq!("a:b", tag_signature(&tags));
///
/// let tags = vec!["region:us".to_string()];
/// assert_eq!("region\\:us", tag_signature(&tags));
/// ```
pub fn tag_signature(tags: &[String]) -> String {
    let mut out = String::new();
    write_tags(&canonical_tags(tags), &mut out);
    out
}

/// Align `seconds` to the start of its `width` second bucket.
///
/// Buckets are anchored at the Unix epoch, not at process start, so that
/// independent batchers agree on window boundaries. `width` must be positive
/// and no larger than `i64::max_value()`, which `Batcher::new` enforces.
pub fn bucket_index(seconds: i64, width: u64) -> i64 {
    debug_assert!(width > 0 && width <= i64::max_value() as u64);
    let width = width as i64;
    seconds - (seconds % width)
}

/// Compose the bucket-identity string for `key` in the bucket `index`.
///
/// Two calls return the same string if and only if their indices are equal
/// and their keys are equal.
pub fn string_key(index: i64, key: &BatchKey) -> String {
    let mut out = String::with_capacity(32 + key.name.len());
    let _ = write!(out, "({})-({})-(", index, key.kind);
    escape_into(&key.name, &mut out);
    let _ = write!(out, ")-({}", key.tags.len());
    if !key.tags.is_empty() {
        out.push(TAG_DELIMITER);
        write_tags(&key.tags, &mut out);
    }
    out.push(')');
    if let Some(ref host) = key.host {
        out.push_str("-(");
        escape_into(host, &mut out);
        out.push(')');
    }
    out
}

// tags must already be canonical
fn write_tags(tags: &[String], out: &mut String) {
    for (idx, tag) in tags.iter().enumerate() {
        if idx > 0 {
            out.push(TAG_DELIMITER);
        }
        escape_into(tag, out);
    }
}

fn escape_into(field: &str, out: &mut String) {
    for c in field.chars() {
        match c {
            '\\' | '(' | ')' | TAG_DELIMITER => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
}
