use crate::platform;
use crate::service::ServiceSet;
use crate::types::{Correlation, PrivilegeMode};
use crate::{Result, ScanError};
use chrono::{DateTime, Local};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub const SHORT_BANNER_WIDTH: usize = 30;
pub const SECTION_BANNER_WIDTH: usize = 50;

/// The `potential_vulns_<ts>.txt` file: created once, appended per service,
/// then finalized.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    /// Write the report shell, replacing any file already at `path`.
    pub async fn create(
        path: &Path,
        generated: &str,
        redirects: &BTreeSet<String>,
        services: &ServiceSet,
    ) -> Result<Self> {
        let header = render_header(generated, redirects, services);
        fs::write(path, header)
            .await
            .map_err(|e| ScanError::Reporting(format!("Failed to create report {}: {}", path.display(), e)))?;

        debug!("Report shell written to {}", path.display());
        Ok(Self { path: path.to_path_buf() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one service's exploit section. Services without matches add nothing.
    pub async fn append_section(&self, correlation: &Correlation) -> Result<()> {
        if !correlation.found() {
            return Ok(());
        }

        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| ScanError::Reporting(format!("Failed to open report {}: {}", self.path.display(), e)))?;
        file.write_all(render_section(correlation).as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    pub async fn finalize(&self, world_readable: bool) -> Result<()> {
        if world_readable {
            platform::set_world_readable(&self.path)?;
        }
        info!("Vulnerability report finalized: {}", self.path.display());
        Ok(())
    }
}

pub fn render_header(generated: &str, redirects: &BTreeSet<String>, services: &ServiceSet) -> String {
    let mut text = String::new();
    text.push_str("Vulnerability Scan Report\n");
    text.push_str(&format!("Generated: {}\n\n", generated));

    if !redirects.is_empty() {
        text.push_str("Suggested Hosts File Entries:\n");
        text.push_str(&"=".repeat(SHORT_BANNER_WIDTH));
        text.push('\n');
        for location in redirects {
            text.push_str(&format!("Found redirect to: {}\n", location));
        }
        text.push('\n');
    }

    text.push_str("Identified Services:\n");
    text.push_str(&"=".repeat(SHORT_BANNER_WIDTH));
    text.push('\n');
    for service in services {
        text.push_str(&format!("{}\n", service));
    }
    text.push('\n');
    text
}

pub fn render_section(correlation: &Correlation) -> String {
    let banner = "=".repeat(SECTION_BANNER_WIDTH);
    let mut text = format!("\n{}\nPotential exploits for {}:\n{}\n", banner, correlation.service, banner);

    if let Some(tier) = correlation.tier {
        text.push_str(&format!("(searchsploit {} query)\n", tier));
    }

    let width = correlation
        .matches
        .iter()
        .map(|m| m.title.chars().count())
        .max()
        .unwrap_or(0);
    for exploit in &correlation.matches {
        text.push_str(&format!("{:<width$} | {}\n", exploit.title, exploit.path, width = width));
    }
    text.push('\n');
    text
}

/// Per-service line of the run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationCount {
    pub service: String,
    pub tier: Option<crate::types::QueryTier>,
    pub matches: usize,
}

/// Everything one run produced, written as `scan_summary_<ts>.txt`/`.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub scan_id: String,
    pub target: String,
    pub scanning_host: String,
    pub privilege: PrivilegeMode,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub web_ports: Vec<u16>,
    pub fingerprints: usize,
    pub services: ServiceSet,
    pub correlations: Vec<CorrelationCount>,
    pub services_with_exploits: usize,
    pub exploit_matches: usize,
    pub skipped_services: Vec<String>,
    pub redirects: BTreeSet<String>,
    pub hosts_entries: Vec<String>,
    pub discovered_paths: Vec<String>,
    pub discovered_vhosts: Vec<String>,
    pub files: Vec<PathBuf>,
}

impl ScanSummary {
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at).to_std().unwrap_or_default()
    }

    pub fn record_correlation(&mut self, correlation: &Correlation) {
        if correlation.found() {
            self.services_with_exploits += 1;
            self.exploit_matches += correlation.matches.len();
        }
        self.correlations.push(CorrelationCount {
            service: correlation.service.to_string(),
            tier: correlation.tier,
            matches: correlation.matches.len(),
        });
    }

    pub fn render_text(&self) -> String {
        let mut text = String::new();
        text.push_str("Scan Summary\n");
        text.push_str(&"=".repeat(SHORT_BANNER_WIDTH));
        text.push('\n');
        text.push_str(&format!("Scan ID: {}\n", self.scan_id));
        text.push_str(&format!("Target: {}\n", self.target));
        text.push_str(&format!("Scanned from: {}\n", self.scanning_host));
        text.push_str(&format!("Mode: {:?}\n", self.privilege));
        text.push_str(&format!("Started: {}\n", crate::utils::time::report_timestamp(&self.started_at)));
        text.push_str(&format!("Finished: {}\n", crate::utils::time::report_timestamp(&self.finished_at)));
        text.push_str(&format!("Duration: {}\n\n", crate::utils::time::format_duration(self.duration())));

        let ports: Vec<String> = self.web_ports.iter().map(|p| p.to_string()).collect();
        text.push_str(&format!("Web ports: {}\n", if ports.is_empty() { "none".to_string() } else { ports.join(", ") }));
        text.push_str(&format!("Fingerprints: {}\n", self.fingerprints));
        text.push_str(&format!(
            "Services: {} ({} with exploits, {} matches)\n",
            self.services.len(),
            self.services_with_exploits,
            self.exploit_matches
        ));

        push_list(&mut text, "Exploit matches per service", self.correlations.iter().map(|c| match c.tier {
            Some(tier) => format!("{}: {} [{}]", c.service, c.matches, tier),
            None => format!("{}: {}", c.service, c.matches),
        }));
        push_list(&mut text, "Skipped services", self.skipped_services.iter().cloned());
        push_list(&mut text, "Redirects", self.redirects.iter().cloned());
        push_list(&mut text, "Hosts entries", self.hosts_entries.iter().cloned());
        push_list(&mut text, "Discovered paths", self.discovered_paths.iter().cloned());
        push_list(&mut text, "Discovered vhosts", self.discovered_vhosts.iter().cloned());
        push_list(&mut text, "Files", self.files.iter().map(|f| f.display().to_string()));
        text
    }

    pub async fn write_text(&self, path: &Path) -> Result<()> {
        debug!("Writing text summary: {}", path.display());
        fs::write(path, self.render_text())
            .await
            .map_err(|e| ScanError::Reporting(format!("Failed to write summary {}: {}", path.display(), e)))
    }

    pub async fn write_json(&self, path: &Path) -> Result<()> {
        debug!("Writing JSON summary: {}", path.display());
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .await
            .map_err(|e| ScanError::Reporting(format!("Failed to write summary {}: {}", path.display(), e)))
    }
}

fn push_list<I: Iterator<Item = String>>(text: &mut String, title: &str, items: I) {
    let items: Vec<String> = items.collect();
    if items.is_empty() {
        return;
    }
    text.push_str(&format!("\n{}:\n", title));
    for item in items {
        text.push_str(&format!("  {}\n", item));
    }
}
