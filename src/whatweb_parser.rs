//! Service and redirect extraction from whatweb's console output.

use crate::service::{name_version, LinePattern, ServiceRecord, ServiceSet};
use crate::Result;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Plugins that describe the response rather than a product.
pub const WHATWEB_NOISE: &[&str] = &[
    "ip", "country", "title", "httpserver", "x-powered-by", "redirectlocation",
    "uncommonheaders", "cookies", "httponly", "email", "script", "meta-author",
    "metagenerator", "meta-refresh-redirect", "passwordfield", "x-frame-options",
    "x-xss-protection", "strict-transport-security", "via-proxy", "html5", "frame",
    "probably", "content-language", "open-graph-protocol", "x-ua-compatible",
    "status", "found", "poweredby", "object", "iframe", "google-analytics",
];

lazy_static! {
    static ref CHUNK_START: Regex = Regex::new(r"(?m)^[ \t]*https?://").unwrap();
    static ref URL: Regex = Regex::new(r"[A-Za-z][A-Za-z0-9+.\-]*://[^\s\],]*").unwrap();
    static ref REDIRECT: Regex = Regex::new(r"RedirectLocation\[([^\]]+)\]").unwrap();
    static ref PURE_NUMERIC: Regex = Regex::new(r"^\d+(\.\d+)*$").unwrap();
    static ref DOTTED_NUMERIC: Regex = Regex::new(r"\d+(\.\d+)+").unwrap();

    static ref WHATWEB_PATTERNS: Vec<LinePattern> = vec![
        LinePattern::new("Name[Version]", r"\b([A-Za-z][\w.\-]*)\[([^\]]*)\]", bracket_annotation),
        LinePattern::new("Name/Version", r"\b([A-Za-z][\w.\-]*)/v?(\d[\w.\-]*)", plugin_version),
        LinePattern::new("Name: Version", r"\b([A-Za-z][\w.\-]*):\s+v?(\d[\w.\-]*)", plugin_version),
    ];
}

pub fn is_whatweb_noise(name: &str) -> bool {
    WHATWEB_NOISE.contains(&name.to_lowercase().as_str())
}

fn plugin_version(caps: &Captures<'_>) -> Option<ServiceRecord> {
    if is_whatweb_noise(caps.get(1)?.as_str()) {
        return None;
    }
    name_version(caps)
}

/// `Apache[2.4.52]` as-is; `JQuery[3.5.1,3.6.0]` keeps the first dotted number.
fn bracket_annotation(caps: &Captures<'_>) -> Option<ServiceRecord> {
    let name = caps.get(1)?.as_str();
    if is_whatweb_noise(name) {
        return None;
    }

    let content = caps.get(2)?.as_str().trim();
    let version = if PURE_NUMERIC.is_match(content) {
        content
    } else {
        DOTTED_NUMERIC.find(content)?.as_str()
    };
    ServiceRecord::new(name, version)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhatwebFindings {
    pub services: ServiceSet,
    pub redirects: BTreeSet<String>,
}

impl WhatwebFindings {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.redirects.is_empty()
    }
}

/// One slice per probed URL; text before the first URL forms its own chunk.
fn chunks(raw: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = CHUNK_START.find_iter(raw).map(|m| m.start()).collect();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(raw.len());
            &raw[start..end]
        })
        .filter(|chunk| !chunk.trim().is_empty())
        .collect()
}

pub fn parse_whatweb_output(raw: &str) -> WhatwebFindings {
    let mut findings = WhatwebFindings::default();

    for chunk in chunks(raw) {
        for caps in REDIRECT.captures_iter(chunk) {
            findings.redirects.insert(caps[1].trim().to_string());
        }

        // URLs carry host:port and path digits that look like versions
        let text = URL.replace_all(chunk, " ");
        for pattern in WHATWEB_PATTERNS.iter() {
            findings.services.extend(pattern.records(&text));
        }
    }

    findings
}

/// File variant of [`parse_whatweb_output`].
pub async fn parse_whatweb_file(path: &Path) -> Result<WhatwebFindings> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(parse_whatweb_output(&raw))
}
