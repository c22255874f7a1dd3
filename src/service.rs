use crate::ScanError;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

lazy_static! {
    static ref VERSION_TOKEN: Regex = Regex::new(r"^\d[0-9A-Za-z.\-_+~]*").unwrap();
}

/// Words that show up in tool output next to version-looking numbers but
/// never name a service.
pub const NOISE_WORDS: &[&str] = &[
    "tcp", "udp", "sctp", "port", "ports", "the", "and", "com", "or", "on", "of",
    "for", "to", "in", "is", "at", "by", "with", "from", "not", "open", "closed",
    "filtered", "unfiltered", "host", "hosts", "up", "down", "service", "services",
    "version", "unknown", "nmap", "scan", "syn", "ack", "shown", "done", "address",
    "addresses", "latency", "ttl", "org", "net", "www", "discovered", "warning",
    "stats", "completed", "elapsed",
];

pub fn is_noise_word(word: &str) -> bool {
    NOISE_WORDS.contains(&word)
}

/// Deduplicated, sorted collection of services.
pub type ServiceSet = BTreeSet<ServiceRecord>;

/// A normalized `name version` pair.
///
/// `name` is lower-case, contains no whitespace and is never a noise word;
/// `version` always starts with an ASCII digit. Ordering by the
/// `(name, version)` pair matches ordering of the rendered strings because
/// the space separator sorts below every printable character of a name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceRecord {
    name: String,
    version: String,
}

impl ServiceRecord {
    pub fn new(name: &str, version: &str) -> Option<Self> {
        let name = normalize_name(name)?;
        let version = normalize_version(version)?;
        Some(Self { name, version })
    }

    /// Parse an already rendered `name version` string.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (name, rest) = raw.split_once(char::is_whitespace)?;
        Self::new(name, rest.trim_start())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Dot-separated pieces of the version, e.g. `2.4.52` -> `2`, `4`, `52`.
    pub fn version_components(&self) -> Vec<&str> {
        self.version.split('.').filter(|c| !c.is_empty()).collect()
    }
}

impl fmt::Display for ServiceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

impl FromStr for ServiceRecord {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ScanError::Parse(format!("not a 'name version' service: '{}'", s)))
    }
}

impl TryFrom<String> for ServiceRecord {
    type Error = ScanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ServiceRecord> for String {
    fn from(record: ServiceRecord) -> Self {
        record.to_string()
    }
}

/// Lower-case a candidate service name; `None` if it cannot be one.
pub fn normalize_name(raw: &str) -> Option<String> {
    let name = raw
        .trim()
        .trim_matches(|c: char| matches!(c, '-' | '_' | '.' | ':' | ',' | ';'))
        .to_lowercase();

    if name.is_empty()
        || name.chars().any(char::is_whitespace)
        || !name.chars().any(|c| c.is_ascii_alphabetic())
        || is_noise_word(&name)
    {
        return None;
    }
    Some(name)
}

/// Cut the leading version token out of `raw`; `None` unless it starts with a digit.
pub fn normalize_version(raw: &str) -> Option<String> {
    let token = VERSION_TOKEN.find(raw.trim())?.as_str();
    let token = token.trim_end_matches(|c: char| matches!(c, '.' | '-' | '_' | '+' | '~'));
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Turns one regex match into a record, or rejects it.
pub type Extractor = fn(&Captures<'_>) -> Option<ServiceRecord>;

/// One entry of an ordered extraction table.
pub struct LinePattern {
    pub label: &'static str,
    regex: Regex,
    extract: Extractor,
}

impl LinePattern {
    /// `pattern` is a compile-time constant, so a bad one is a programming error.
    pub fn new(label: &'static str, pattern: &str, extract: Extractor) -> Self {
        Self {
            label,
            regex: Regex::new(pattern).unwrap(),
            extract,
        }
    }

    /// First match in `text` that the extractor accepts.
    pub fn first_record(&self, text: &str) -> Option<ServiceRecord> {
        self.regex
            .captures_iter(text)
            .find_map(|caps| (self.extract)(&caps))
    }

    /// Every accepted match in `text`.
    pub fn records<'a>(&'a self, text: &'a str) -> impl Iterator<Item = ServiceRecord> + 'a {
        self.regex
            .captures_iter(text)
            .filter_map(move |caps| (self.extract)(&caps))
    }
}

/// Extractor for patterns whose groups 1 and 2 are name and version.
pub fn name_version(caps: &Captures<'_>) -> Option<ServiceRecord> {
    ServiceRecord::new(caps.get(1)?.as_str(), caps.get(2)?.as_str())
}
