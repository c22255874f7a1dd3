//! Linear orchestration of one scan run.
//!
//! scan -> web ports -> fingerprint -> parse -> report shell -> correlate
//! -> finalize -> optional ffuf stages -> summary. Every stage is awaited
//! before the next starts.

use crate::config::{Config, OutputFormat};
use crate::correlator::ExploitCorrelator;
use crate::display::DisplayManager;
use crate::enumeration::Enumerator;
use crate::fingerprint::WhatwebFingerprinter;
use crate::reporting::{ReportWriter, ScanSummary};
use crate::runner::ToolRunner;
use crate::scanner::NmapScanner;
use crate::service::ServiceSet;
use crate::types::{PrivilegeMode, ScanTarget};
use crate::utils::{progress, time};
use crate::whatweb_parser::WhatwebFindings;
use crate::{hosts, nmap_parser, platform, whatweb_parser};
use crate::{Result, ScanError};
use chrono::{DateTime, Local};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity and file layout of one run. All files share one timestamp.
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub scan_id: String,
    pub started_at: DateTime<Local>,
    pub timestamp: String,
    pub output_dir: PathBuf,
}

impl ScanSession {
    pub fn new(output_dir: &Path) -> Self {
        Self::at(output_dir, Local::now())
    }

    pub fn at(output_dir: &Path, started_at: DateTime<Local>) -> Self {
        Self {
            scan_id: uuid::Uuid::new_v4().to_string(),
            timestamp: time::file_timestamp(&started_at),
            started_at,
            output_dir: output_dir.to_path_buf(),
        }
    }

    fn file(&self, stem: &str, extension: &str) -> PathBuf {
        self.output_dir.join(format!("{}_{}.{}", stem, self.timestamp, extension))
    }

    pub fn nmap_path(&self) -> PathBuf {
        self.file("nmap_scan", "txt")
    }

    pub fn whatweb_path(&self) -> PathBuf {
        self.file("whatweb_scan", "txt")
    }

    pub fn report_path(&self) -> PathBuf {
        self.file("potential_vulns", "txt")
    }

    pub fn summary_text_path(&self) -> PathBuf {
        self.file("scan_summary", "txt")
    }

    pub fn summary_json_path(&self) -> PathBuf {
        self.file("scan_summary", "json")
    }

    pub fn ffuf_dirs_path(&self) -> PathBuf {
        self.file("ffuf_dirs", "txt")
    }

    pub fn ffuf_vhosts_path(&self) -> PathBuf {
        self.file("ffuf_vhosts", "txt")
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub privilege: PrivilegeMode,
    pub dir_wordlist: Option<PathBuf>,
    pub sub_wordlist: Option<PathBuf>,
    pub hosts_suggestions: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            privilege: PrivilegeMode::Restricted,
            dir_wordlist: None,
            sub_wordlist: None,
            hosts_suggestions: true,
        }
    }
}

pub struct ScanPipeline {
    config: Config,
    runner: Arc<dyn ToolRunner>,
    display: DisplayManager,
}

impl ScanPipeline {
    pub fn new(config: Config, runner: Arc<dyn ToolRunner>, display: DisplayManager) -> Self {
        Self { config, runner, display }
    }

    pub async fn run(&self, target: &ScanTarget, options: &PipelineOptions) -> Result<ScanSummary> {
        let session = ScanSession::new(&self.config.reporting.output_dir);
        self.run_session(&session, target, options).await
    }

    /// Run every stage for `target`, writing into `session`'s files. Only a
    /// failed nmap stage or an unwritable report is an error.
    pub async fn run_session(
        &self,
        session: &ScanSession,
        target: &ScanTarget,
        options: &PipelineOptions,
    ) -> Result<ScanSummary> {
        tokio::fs::create_dir_all(&session.output_dir).await.map_err(|e| {
            ScanError::Reporting(format!(
                "Failed to create output directory {}: {}",
                session.output_dir.display(),
                platform::platform_error_message(&e.to_string())
            ))
        })?;

        let mut summary = self.empty_summary(session, target, options.privilege);

        // Port scan
        self.display.print_section_header("🔍 PORT SCAN");
        let scanner = NmapScanner::new(self.config.clone(), self.runner.clone(), self.display.clone());
        let nmap_path = session.nmap_path();
        if !scanner.scan(target, options.privilege, &nmap_path).await {
            return Err(ScanError::ToolFailed {
                tool: self.config.tools.nmap.clone(),
                code: None,
                stderr: "port scan did not complete".to_string(),
            });
        }
        summary.files.push(nmap_path.clone());

        let raw_scan = match tokio::fs::read_to_string(&nmap_path).await {
            Ok(raw) => raw,
            Err(e) => {
                self.display.print_error(&format!("Cannot read {}: {}", nmap_path.display(), e));
                String::new()
            }
        };
        self.display.print_port_results(target.as_str(), &nmap_parser::open_ports(&raw_scan));
        summary.web_ports = nmap_parser::web_ports(&raw_scan);

        // Fingerprinting
        self.display.print_section_header("🌐 WEB FINGERPRINTING");
        if summary.web_ports.is_empty() {
            self.display.print_info("No web ports found, skipping whatweb");
        }
        let whatweb_path = session.whatweb_path();
        let fingerprinter = WhatwebFingerprinter::new(self.config.clone(), self.runner.clone(), self.display.clone());
        match fingerprinter.fingerprint(target, &summary.web_ports, &whatweb_path).await {
            Ok(count) => {
                summary.fingerprints = count;
                summary.files.push(whatweb_path.clone());
            }
            Err(e) => self.display.print_warning(&format!("Web fingerprinting failed: {}", e)),
        }

        // Parsing
        self.display.print_section_header("🧩 SERVICE IDENTIFICATION");
        let services = self.collect_services(&raw_scan, &whatweb_path).await;
        summary.services = services.services.clone();
        summary.redirects = services.redirects.clone();
        self.display.print_services(&summary.services);
        for location in &summary.redirects {
            self.display.print_info(&format!("Found redirect to: {}", location));
        }

        // Correlation
        self.display.print_section_header("💥 EXPLOIT CORRELATION");
        let report = ReportWriter::create(
            &session.report_path(),
            &time::report_timestamp(&session.started_at),
            &summary.redirects,
            &summary.services,
        )
        .await?;
        summary.files.push(report.path().to_path_buf());
        self.correlate_all(&report, &mut summary).await;

        if let Err(e) = report.finalize(self.config.reporting.world_readable).await {
            self.display.print_warning(&format!("Could not set report permissions: {}", e));
        }

        // Optional enumeration
        let vhosts = self.enumerate(session, target, options, &mut summary).await;

        if options.hosts_suggestions {
            summary.hosts_entries = hosts::hosts_entries(target, &summary.redirects, &vhosts);
        }
        summary.discovered_vhosts = vhosts;

        summary.finished_at = Local::now();
        self.write_summary(session, &mut summary).await;
        info!("Scan {} of {} finished", summary.scan_id, target);
        Ok(summary)
    }

    fn empty_summary(&self, session: &ScanSession, target: &ScanTarget, privilege: PrivilegeMode) -> ScanSummary {
        ScanSummary {
            scan_id: session.scan_id.clone(),
            target: target.to_string(),
            scanning_host: platform::scanning_host(),
            privilege,
            started_at: session.started_at,
            finished_at: session.started_at,
            web_ports: Vec::new(),
            fingerprints: 0,
            services: ServiceSet::new(),
            correlations: Vec::new(),
            services_with_exploits: 0,
            exploit_matches: 0,
            skipped_services: Vec::new(),
            redirects: Default::default(),
            hosts_entries: Vec::new(),
            discovered_paths: Vec::new(),
            discovered_vhosts: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Union of both parsers; an unreadable whatweb file contributes nothing.
    async fn collect_services(&self, raw_scan: &str, whatweb_path: &Path) -> WhatwebFindings {
        let mut findings = match whatweb_parser::parse_whatweb_file(whatweb_path).await {
            Ok(findings) => findings,
            Err(e) => {
                self.display.print_error(&format!("Whatweb output file {} unreadable: {}", whatweb_path.display(), e));
                WhatwebFindings::default()
            }
        };
        findings.services.extend(nmap_parser::parse_nmap_output(raw_scan));

        info!("{} services and {} redirects identified", findings.services.len(), findings.redirects.len());
        findings
    }

    async fn correlate_all(&self, report: &ReportWriter, summary: &mut ScanSummary) {
        let correlator = ExploitCorrelator::new(self.config.clone(), self.runner.clone());
        let services: Vec<_> = summary.services.iter().cloned().collect();

        let bar = if self.display.is_quiet() {
            progress::hidden()
        } else {
            progress::create_progress_bar(services.len() as u64, "searchsploit")
        };

        for service in &services {
            bar.set_message(service.to_string());
            match correlator.correlate(service).await {
                Ok(correlation) => {
                    if let Err(e) = report.append_section(&correlation).await {
                        warn!("Report append for {} failed: {}", service, e);
                        bar.suspend(|| self.display.print_warning(&format!("Could not record {}: {}", service, e)));
                    }
                    bar.suspend(|| self.display.print_correlation(&correlation));
                    summary.record_correlation(&correlation);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", service, e);
                    bar.suspend(|| self.display.print_warning(&format!("Skipping {}: {}", service, e)));
                    summary.skipped_services.push(service.to_string());
                }
            }
            bar.inc(1);
        }

        bar.finish_and_clear();
        if services.is_empty() {
            self.display.print_info("No services to correlate");
        } else {
            self.display.print_success(&format!(
                "{} of {} services have potential exploits",
                summary.services_with_exploits,
                services.len()
            ));
        }
    }

    /// Directory and vhost fuzzing; returns the discovered virtual hosts.
    async fn enumerate(
        &self,
        session: &ScanSession,
        target: &ScanTarget,
        options: &PipelineOptions,
        summary: &mut ScanSummary,
    ) -> Vec<String> {
        if options.dir_wordlist.is_none() && options.sub_wordlist.is_none() {
            return Vec::new();
        }

        self.display.print_section_header("📂 ENUMERATION");
        if summary.web_ports.is_empty() {
            self.display.print_info("No web ports found, skipping ffuf");
            return Vec::new();
        }

        let enumerator = Enumerator::new(self.config.clone(), self.runner.clone(), self.display.clone());

        if let Some(wordlist) = &options.dir_wordlist {
            let output = session.ffuf_dirs_path();
            match enumerator.enumerate_directories(target, &summary.web_ports, wordlist, &output).await {
                Ok(paths) => {
                    self.display.print_success(&format!("{} paths discovered", paths.len()));
                    summary.discovered_paths = paths;
                    summary.files.push(output);
                }
                Err(e) => self.display.print_warning(&format!("Directory fuzzing failed: {}", e)),
            }
        }

        let Some(wordlist) = &options.sub_wordlist else {
            return Vec::new();
        };

        let domains = hosts::base_domains(target, &summary.redirects);
        if domains.is_empty() {
            self.display.print_info("No redirect domains found, skipping vhost fuzzing");
            return Vec::new();
        }

        let output = session.ffuf_vhosts_path();
        match enumerator.enumerate_vhosts(target, &summary.web_ports, &domains, wordlist, &output).await {
            Ok(vhosts) => {
                self.display.print_success(&format!("{} virtual hosts discovered", vhosts.len()));
                summary.files.push(output);
                vhosts
            }
            Err(e) => {
                self.display.print_warning(&format!("Vhost fuzzing failed: {}", e));
                Vec::new()
            }
        }
    }

    async fn write_summary(&self, session: &ScanSession, summary: &mut ScanSummary) {
        let text_path = session.summary_text_path();
        let json_path = session.summary_json_path();
        let with_json = self.config.reporting.format == OutputFormat::Json;

        summary.files.push(text_path.clone());
        if with_json {
            summary.files.push(json_path.clone());
        }

        let mut written = Vec::new();
        match summary.write_text(&text_path).await {
            Ok(()) => written.push(text_path),
            Err(e) => self.display.print_warning(&format!("Summary not written: {}", e)),
        }
        if with_json {
            match summary.write_json(&json_path).await {
                Ok(()) => written.push(json_path),
                Err(e) => self.display.print_warning(&format!("JSON summary not written: {}", e)),
            }
        }

        if self.config.reporting.world_readable {
            for path in &written {
                if let Err(e) = platform::set_world_readable(path) {
                    warn!("Could not set permissions on {}: {}", path.display(), e);
                }
            }
        }
    }
}
