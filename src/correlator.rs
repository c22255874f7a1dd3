//! searchsploit correlation for identified services.
//!
//! Each service goes through at most three queries, in this order:
//!
//! 1. `exact`: `searchsploit --json --exact "<name> <version>"`
//! 2. `fuzzy`: `searchsploit --json <name>`, only when `exact` kept nothing
//! 3. `text`: `searchsploit <name> <version>`, only when a JSON query printed
//!    something that is not JSON
//!
//! Whatever comes back is filtered with [`ExploitFilter`] so only titles that
//! name the service (and one of its version components) survive.

use crate::config::Config;
use crate::runner::{Invocation, ToolOutput, ToolRunner};
use crate::service::ServiceRecord;
use crate::types::{Correlation, ExploitMatch, QueryTier};
use crate::{Result, ScanError};
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;

lazy_static! {
    static ref ANSI_ESCAPE: Regex = Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap();
    static ref EDB_ID: Regex = Regex::new(r"(\d+)\.[A-Za-z0-9]+$").unwrap();
}

#[derive(Debug, Deserialize)]
struct SearchsploitJson {
    #[serde(rename = "RESULTS_EXPLOIT", default)]
    results_exploit: Vec<SearchsploitEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchsploitEntry {
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Path", default)]
    path: String,
    #[serde(rename = "EDB-ID", default)]
    edb_id: Option<String>,
    #[serde(rename = "Type", default)]
    kind: Option<String>,
    #[serde(rename = "Platform", default)]
    platform: Option<String>,
}

impl SearchsploitEntry {
    fn into_match(self, tier: QueryTier) -> ExploitMatch {
        ExploitMatch {
            title: self.title.trim().to_string(),
            path: self.path,
            edb_id: self.edb_id.filter(|id| !id.is_empty()),
            kind: self.kind.filter(|k| !k.is_empty()),
            platform: self.platform.filter(|p| !p.is_empty()),
            tier,
        }
    }
}

/// Decides whether an exploit title is about a given service.
#[derive(Debug, Clone)]
pub struct ExploitFilter {
    name: Regex,
    components: Vec<Regex>,
}

impl ExploitFilter {
    pub fn for_service(service: &ServiceRecord) -> Result<Self> {
        let name = Regex::new(&format!(
            r"(?i)(?:^|[^a-z0-9]){}(?:$|[^a-z0-9])",
            regex::escape(service.name())
        ))
        .map_err(|e| ScanError::Parse(format!("bad name filter for {}: {}", service, e)))?;

        // a component must not sit inside a longer run of digits
        let components = service
            .version_components()
            .into_iter()
            .map(|c| Regex::new(&format!(r"(?i)(?:^|[^0-9]){}(?:$|[^0-9])", regex::escape(c))))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ScanError::Parse(format!("bad version filter for {}: {}", service, e)))?;

        Ok(Self { name, components })
    }

    pub fn retains(&self, title: &str) -> bool {
        if !self.name.is_match(title) {
            return false;
        }
        self.components.is_empty() || self.components.iter().any(|c| c.is_match(title))
    }
}

/// Outcome of evaluating one query tier.
enum TierOutcome {
    Parsed(Vec<ExploitMatch>),
    Malformed,
}

pub struct ExploitCorrelator {
    config: Config,
    runner: Arc<dyn ToolRunner>,
}

impl ExploitCorrelator {
    pub fn new(config: Config, runner: Arc<dyn ToolRunner>) -> Self {
        Self { config, runner }
    }

    pub fn exact_invocation(&self, service: &ServiceRecord) -> Invocation {
        self.invocation(vec!["--json".to_string(), "--exact".to_string(), service.to_string()])
    }

    pub fn fuzzy_invocation(&self, service: &ServiceRecord) -> Invocation {
        self.invocation(vec!["--json".to_string(), service.name().to_string()])
    }

    pub fn text_invocation(&self, service: &ServiceRecord) -> Invocation {
        self.invocation(vec![service.name().to_string(), service.version().to_string()])
    }

    fn invocation(&self, args: Vec<String>) -> Invocation {
        Invocation::new(&self.config.tools.searchsploit, args).with_timeout(self.config.correlation_timeout())
    }

    /// Query searchsploit for `service`. An error means the tool could not
    /// be used at all and the service should be reported as skipped.
    pub async fn correlate(&self, service: &ServiceRecord) -> Result<Correlation> {
        let filter = ExploitFilter::for_service(service)?;
        info!("Correlating {}", service);

        match self.json_tier(&self.exact_invocation(service), QueryTier::Exact, &filter).await? {
            TierOutcome::Parsed(matches) if !matches.is_empty() => {
                return Ok(Correlation { service: service.clone(), tier: Some(QueryTier::Exact), matches });
            }
            TierOutcome::Parsed(_) => debug!("exact query for {} kept nothing", service),
            TierOutcome::Malformed => return self.text_tier(service, &filter).await,
        }

        match self.json_tier(&self.fuzzy_invocation(service), QueryTier::Fuzzy, &filter).await? {
            TierOutcome::Parsed(matches) if matches.is_empty() => Ok(Correlation::empty(service.clone())),
            TierOutcome::Parsed(matches) => {
                Ok(Correlation { service: service.clone(), tier: Some(QueryTier::Fuzzy), matches })
            }
            TierOutcome::Malformed => self.text_tier(service, &filter).await,
        }
    }

    async fn json_tier(&self, invocation: &Invocation, tier: QueryTier, filter: &ExploitFilter) -> Result<TierOutcome> {
        let output = self.execute(invocation).await?;

        match serde_json::from_str::<SearchsploitJson>(&output.stdout) {
            Ok(parsed) => {
                let matches: Vec<ExploitMatch> = parsed
                    .results_exploit
                    .into_iter()
                    .map(|entry| entry.into_match(tier))
                    .filter(|m| filter.retains(&m.title))
                    .collect();
                debug!("{} query kept {} matches", tier, matches.len());
                Ok(TierOutcome::Parsed(matches))
            }
            Err(e) => {
                warn!("searchsploit {} query returned malformed JSON: {}", tier, e);
                Ok(TierOutcome::Malformed)
            }
        }
    }

    async fn text_tier(&self, service: &ServiceRecord, filter: &ExploitFilter) -> Result<Correlation> {
        let output = self.execute(&self.text_invocation(service)).await?;
        let matches: Vec<ExploitMatch> = parse_text_results(&output.stdout)
            .into_iter()
            .filter(|m| filter.retains(&m.title))
            .collect();

        if matches.is_empty() {
            Ok(Correlation::empty(service.clone()))
        } else {
            Ok(Correlation { service: service.clone(), tier: Some(QueryTier::Text), matches })
        }
    }

    /// Run one query; a non-zero exit only counts as failure when nothing was printed.
    async fn execute(&self, invocation: &Invocation) -> Result<ToolOutput> {
        debug!("searchsploit command: {}", invocation.command_line());
        let output = self.runner.run(invocation).await?;
        if !output.success() && output.stdout.trim().is_empty() {
            return Err(ScanError::tool_failed(&invocation.tool, output.exit_code, &output.stderr));
        }
        Ok(output)
    }
}

/// Parse searchsploit's table output into `title | path` rows.
pub fn parse_text_results(raw: &str) -> Vec<ExploitMatch> {
    let clean = ANSI_ESCAPE.replace_all(raw, "");
    let mut matches = Vec::new();

    for line in clean.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('-') {
            continue;
        }
        let Some((title, path)) = trimmed.rsplit_once('|') else {
            continue;
        };
        let (title, path) = (title.trim(), path.trim());
        if title.is_empty() || title.eq_ignore_ascii_case("Exploit Title") || title.eq_ignore_ascii_case("Shellcode Title") {
            continue;
        }

        matches.push(ExploitMatch {
            title: title.to_string(),
            path: path.to_string(),
            edb_id: EDB_ID.captures(path).map(|c| c[1].to_string()),
            kind: None,
            platform: path.split('/').next().filter(|p| !p.is_empty() && path.contains('/')).map(str::to_string),
            tier: QueryTier::Text,
        });
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(raw: &str) -> ServiceRecord {
        ServiceRecord::parse(raw).unwrap()
    }

    #[test]
    fn filter_needs_name_and_version_component() {
        let filter = ExploitFilter::for_service(&service("apache 2.4.49")).unwrap();
        assert!(filter.retains("Apache HTTP Server 2.4.49 - Path Traversal"));
        assert!(!filter.retains("Nginx 1.18 - Buffer Overflow"));
        assert!(!filter.retains("Apache Tomcat 9.0.30 - RCE"));
    }

    #[test]
    fn version_component_must_stand_alone() {
        let filter = ExploitFilter::for_service(&service("apache 4")).unwrap();
        assert!(filter.retains("Apache 2.4.49 - Path Traversal"));
        assert!(!filter.retains("Apache 1.3.42 - Denial of Service"));
    }

    #[test]
    fn name_must_be_a_whole_word() {
        let filter = ExploitFilter::for_service(&service("php 7.4")).unwrap();
        assert!(!filter.retains("phpMyAdmin 4.7 - CSRF"));
        assert!(filter.retains("PHP 7.4 < 7.4.27 - Memory Corruption"));
    }

    #[test]
    fn text_rows_skip_banners() {
        let raw = "\
------------------------------------------------ ---------------------------------
 Exploit Title                                  |  Path
------------------------------------------------ ---------------------------------
Apache HTTP Server 2.4.49 - Path Traversal & RCE | multiple/webapps/50383.sh
------------------------------------------------ ---------------------------------
Shellcodes: No Results
";
        let rows = parse_text_results(raw);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, "multiple/webapps/50383.sh");
        assert_eq!(rows[0].edb_id.as_deref(), Some("50383"));
        assert_eq!(rows[0].platform.as_deref(), Some("multiple"));
    }
}
