//! Wordlist-driven content and virtual-host discovery with ffuf.
//!
//! Both stages are best-effort: a failed ffuf run costs its port, never the scan.

use crate::config::Config;
use crate::display::DisplayManager;
use crate::runner::{Invocation, ToolRunner};
use crate::types::ScanTarget;
use crate::{Result, ScanError};
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

lazy_static! {
    static ref ANSI_ESCAPE: Regex = Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap();
}

pub struct Enumerator {
    config: Config,
    runner: Arc<dyn ToolRunner>,
    display: DisplayManager,
}

impl Enumerator {
    pub fn new(config: Config, runner: Arc<dyn ToolRunner>, display: DisplayManager) -> Self {
        Self { config, runner, display }
    }

    pub fn scheme_for(&self, port: u16) -> &'static str {
        if self.config.enumeration.tls_ports.contains(&port) {
            "https"
        } else {
            "http"
        }
    }

    fn base_url(&self, target: &ScanTarget, port: u16) -> String {
        format!("{}://{}:{}", self.scheme_for(port), target.url_host(), port)
    }

    pub fn directory_invocation(&self, target: &ScanTarget, port: u16, wordlist: &Path) -> Invocation {
        let enumeration = &self.config.enumeration;
        let args = vec![
            "-u".to_string(),
            format!("{}/FUZZ", self.base_url(target, port)),
            "-w".to_string(),
            wordlist.display().to_string(),
            "-mc".to_string(),
            enumeration.match_codes.clone(),
            "-t".to_string(),
            enumeration.threads.to_string(),
            "-s".to_string(),
        ];
        Invocation::new(&self.config.tools.ffuf, args).with_timeout(self.config.enumeration_timeout())
    }

    pub fn vhost_invocation(&self, target: &ScanTarget, port: u16, domain: &str, wordlist: &Path) -> Invocation {
        let enumeration = &self.config.enumeration;
        let args = vec![
            "-u".to_string(),
            format!("{}/", self.base_url(target, port)),
            "-H".to_string(),
            format!("Host: FUZZ.{}", domain),
            "-w".to_string(),
            wordlist.display().to_string(),
            "-ac".to_string(),
            "-mc".to_string(),
            enumeration.match_codes.clone(),
            "-t".to_string(),
            enumeration.threads.to_string(),
            "-s".to_string(),
        ];
        Invocation::new(&self.config.tools.ffuf, args).with_timeout(self.config.enumeration_timeout())
    }

    /// Fuzz paths on every web port; returns the full URLs found.
    pub async fn enumerate_directories(
        &self,
        target: &ScanTarget,
        ports: &[u16],
        wordlist: &Path,
        output: &Path,
    ) -> Result<Vec<String>> {
        let mut found = Vec::new();

        for &port in ports {
            let base = self.base_url(target, port);
            self.display.print_info(&format!("Fuzzing directories on {}", base));
            match self.fuzz(&self.directory_invocation(target, port, wordlist)).await {
                Ok(words) => {
                    info!("{} paths found on {}", words.len(), base);
                    found.extend(words.into_iter().map(|w| format!("{}/{}", base, w.trim_start_matches('/'))));
                }
                Err(e) => {
                    warn!("ffuf directory run on {} failed: {}", base, e);
                    self.display.print_warning(&format!("Directory fuzzing on {} failed: {}", base, e));
                }
            }
        }

        write_lines(output, &found).await?;
        Ok(found)
    }

    /// Fuzz `FUZZ.<domain>` host headers per domain and web port; returns
    /// the distinct host names that answered.
    pub async fn enumerate_vhosts(
        &self,
        target: &ScanTarget,
        ports: &[u16],
        domains: &[String],
        wordlist: &Path,
        output: &Path,
    ) -> Result<Vec<String>> {
        let mut found = BTreeSet::new();

        for domain in domains {
            for &port in ports {
                self.display.print_info(&format!("Fuzzing virtual hosts of {} on port {}", domain, port));
                match self.fuzz(&self.vhost_invocation(target, port, domain, wordlist)).await {
                    Ok(words) => {
                        info!("{} vhosts of {} found on port {}", words.len(), domain, port);
                        found.extend(words.into_iter().map(|w| format!("{}.{}", w.to_lowercase(), domain)));
                    }
                    Err(e) => {
                        warn!("ffuf vhost run for {} on {} failed: {}", domain, port, e);
                        self.display.print_warning(&format!("Vhost fuzzing of {} on port {} failed: {}", domain, port, e));
                    }
                }
            }
        }

        let found: Vec<String> = found.into_iter().collect();
        write_lines(output, &found).await?;
        Ok(found)
    }

    async fn fuzz(&self, invocation: &Invocation) -> Result<Vec<String>> {
        debug!("ffuf command: {}", invocation.command_line());
        let output = self.runner.run(invocation).await?;
        if !output.success() {
            return Err(ScanError::tool_failed(&self.config.tools.ffuf, output.exit_code, &output.stderr));
        }
        Ok(parse_silent_output(&output.stdout))
    }
}

/// With `-s` ffuf prints one matched FUZZ value per line.
pub fn parse_silent_output(raw: &str) -> Vec<String> {
    let clean = ANSI_ESCAPE.replace_all(raw, "");
    let mut seen = BTreeSet::new();
    clean
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|word| !word.starts_with('[') && !word.starts_with(':'))
        .filter(|word| seen.insert(word.to_string()))
        .map(str::to_string)
        .collect()
}

async fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut text = lines.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    tokio::fs::write(path, text)
        .await
        .map_err(|e| ScanError::Reporting(format!("Failed to write {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_output_is_deduplicated() {
        let raw = "admin\n\x1b[2Kadmin\nlogin\n\n";
        assert_eq!(parse_silent_output(raw), vec!["admin", "login"]);
    }
}
