//! Sovereign - reconnaissance and vulnerability correlation pipeline
//!
//! Runs nmap against a single target, fingerprints the web services it finds
//! with whatweb, extracts `name version` service records from both outputs and
//! correlates every record with the exploit database through searchsploit.
//! Everything lands in timestamped text files under `scan_results/`.
//!
//! # Warning
//! This tool is intended for authorized penetration testing and lab work only.
//! Users are responsible for ensuring they have permission to scan a target.

pub mod cli;
pub mod config;
pub mod runner;
pub mod scanner;
pub mod fingerprint;
pub mod service;
pub mod nmap_parser;
pub mod whatweb_parser;
pub mod correlator;
pub mod enumeration;
pub mod hosts;
pub mod reporting;
pub mod pipeline;
pub mod display;
pub mod platform;
pub mod utils;
pub mod error;

pub use error::{Result, ScanError};

/// Common types shared across the pipeline stages
pub mod types {
    use crate::{Result, ScanError};
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use std::net::IpAddr;

    pub use crate::service::ServiceRecord;

    /// Host handed to every external tool. Validated once at startup.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ScanTarget(String);

    impl ScanTarget {
        pub fn parse(raw: &str) -> Result<Self> {
            let target = raw.trim();
            if target.is_empty() {
                return Err(ScanError::InvalidTarget("target must not be empty".to_string()));
            }
            if target.chars().any(char::is_whitespace) {
                return Err(ScanError::InvalidTarget(format!("'{}' contains whitespace", target)));
            }
            // Would be read as an option by nmap/whatweb
            if target.starts_with('-') {
                return Err(ScanError::InvalidTarget(format!("'{}' looks like a command-line flag", target)));
            }
            Ok(Self(target.to_string()))
        }

        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn ip(&self) -> Option<IpAddr> {
            self.0.parse().ok()
        }

        /// Host part for building URLs (IPv6 literals need brackets).
        pub fn url_host(&self) -> String {
            match self.ip() {
                Some(IpAddr::V6(v6)) => format!("[{}]", v6),
                _ => self.0.clone(),
            }
        }
    }

    impl fmt::Display for ScanTarget {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    /// Which searchsploit query produced a correlation result.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum QueryTier {
        Exact,
        Fuzzy,
        Text,
    }

    impl fmt::Display for QueryTier {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                QueryTier::Exact => write!(f, "exact"),
                QueryTier::Fuzzy => write!(f, "fuzzy"),
                QueryTier::Text => write!(f, "text"),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ExploitMatch {
        pub title: String,
        pub path: String,
        pub edb_id: Option<String>,
        pub kind: Option<String>,
        pub platform: Option<String>,
        pub tier: QueryTier,
    }

    /// Outcome of correlating one service with the exploit database.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Correlation {
        pub service: ServiceRecord,
        pub tier: Option<QueryTier>,
        pub matches: Vec<ExploitMatch>,
    }

    impl Correlation {
        pub fn empty(service: ServiceRecord) -> Self {
            Self { service, tier: None, matches: Vec::new() }
        }

        pub fn found(&self) -> bool {
            !self.matches.is_empty()
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum PrivilegeMode {
        Privileged,
        Restricted,
    }
}
