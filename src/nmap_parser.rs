//! Service extraction from nmap's normal (stdout) output.

use crate::service::{name_version, LinePattern, ServiceSet};
use crate::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

lazy_static! {
    static ref PORT_LINE: Regex =
        Regex::new(r"^\s*(\d+)/(tcp|udp|sctp)\s+(open(?:\|filtered)?)\s+(\S+)\s*(.*)$").unwrap();
    static ref PARENTHESISED: Regex = Regex::new(r"\([^()]*\)").unwrap();

    /// Tried in order; the first one yielding an accepted record wins.
    static ref NMAP_PATTERNS: Vec<LinePattern> = vec![
        LinePattern::new(
            "service/version",
            r"\b([A-Za-z][\w.\-]*)/v?(\d[\w.\-]*)",
            name_version,
        ),
        LinePattern::new(
            "service version",
            r"\b([A-Za-z][\w.\-]*)(?:\s+[A-Za-z][\w.\-]*){0,2}?\s+v?(\d[\w.\-]*)",
            name_version,
        ),
        LinePattern::new(
            "service_version",
            r"\b([A-Za-z][A-Za-z\-]*)_v?(\d[\w.\-]*)",
            name_version,
        ),
    ];
}

/// One row of nmap's port table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPort {
    pub port: u16,
    pub protocol: String,
    pub state: String,
    pub service: String,
    pub version_info: String,
}

impl OpenPort {
    pub fn is_web(&self) -> bool {
        self.protocol == "tcp" && self.state == "open" && self.service.to_lowercase().contains("http")
    }
}

fn parse_port_line(line: &str) -> Option<OpenPort> {
    let caps = PORT_LINE.captures(line)?;
    Some(OpenPort {
        port: caps[1].parse().ok()?,
        protocol: caps[2].to_string(),
        state: caps[3].to_string(),
        service: caps[4].to_string(),
        version_info: caps[5].trim().to_string(),
    })
}

/// All open (or open|filtered) rows of the port table, in output order.
pub fn open_ports(raw: &str) -> Vec<OpenPort> {
    raw.lines().filter_map(parse_port_line).collect()
}

/// Open TCP ports whose service column mentions http, deduplicated.
pub fn web_ports(raw: &str) -> Vec<u16> {
    let mut ports: Vec<u16> = Vec::new();
    for port in open_ports(raw).into_iter().filter(OpenPort::is_web) {
        if !ports.contains(&port.port) {
            ports.push(port.port);
        }
    }
    ports
}

fn is_candidate(line: &str) -> bool {
    line.contains("open") && (line.contains("tcp") || line.contains("udp"))
}

/// `Apache httpd 2.4.52 ((Ubuntu))` -> `Apache httpd 2.4.52`
fn strip_parenthesised(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = PARENTHESISED.replace_all(&current, " ").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// The part of a candidate line the extraction patterns look at.
fn extraction_text(line: &str) -> String {
    match parse_port_line(line) {
        Some(port) => strip_parenthesised(&port.version_info),
        None => strip_parenthesised(line),
    }
}

/// Extract `name version` records from raw nmap output.
///
/// At most one record is taken from each line.
pub fn parse_nmap_output(raw: &str) -> ServiceSet {
    let mut services = ServiceSet::new();

    for line in raw.lines().filter(|l| is_candidate(l)) {
        let text = extraction_text(line);
        if text.trim().is_empty() {
            continue;
        }
        if let Some(record) = NMAP_PATTERNS.iter().find_map(|p| p.first_record(&text)) {
            log::trace!("nmap line {:?} -> {}", line.trim(), record);
            services.insert(record);
        }
    }

    services
}

/// File variant of [`parse_nmap_output`]; the caller decides how to degrade
/// on a read failure.
pub async fn parse_nmap_file(path: &Path) -> Result<ServiceSet> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(parse_nmap_output(&raw))
}
