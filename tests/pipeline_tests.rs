mod common;

use chrono::{Local, TimeZone};
use common::{failed, ok, search_json, test_config, ScriptedRunner, EMPTY_SEARCH, NMAP_SAMPLE};
use sovereign::config::OutputFormat;
use sovereign::display::DisplayManager;
use sovereign::fingerprint::WhatwebFingerprinter;
use sovereign::pipeline::{PipelineOptions, ScanPipeline, ScanSession};
use sovereign::reporting::ScanSummary;
use sovereign::scanner::NmapScanner;
use sovereign::types::{PrivilegeMode, ScanTarget};
use sovereign::Result;
use std::path::Path;

const PORT80_FINGERPRINT: &str = "http://10.10.11.20:80 [302 Found] Apache[2.4.52], HTTPServer[Ubuntu Linux][Apache/2.4.52 (Ubuntu)], IP[10.10.11.20], RedirectLocation[http://board.htb/], Title[302 Found]\n";

fn target() -> ScanTarget {
    ScanTarget::parse("10.10.11.20").unwrap()
}

fn quiet() -> DisplayManager {
    DisplayManager::with_quiet(true)
}

fn session(dir: &Path) -> ScanSession {
    let started = Local.with_ymd_and_hms(2024, 1, 31, 14, 25, 1).unwrap();
    ScanSession::at(dir, started)
}

/// nmap finds ports 80 and 8080; only http on 80 fingerprints; searchsploit
/// knows apache 2.4.52 and openssh 8.9p1.
fn scripted_lab() -> ScriptedRunner {
    let apache = search_json(&[("Apache HTTP Server 2.4.52 - mod_lua Denial of Service", "multiple/dos/51234.txt")]);
    let openssh = search_json(&[("OpenSSH 8.9p1 - Username Enumeration", "linux/remote/45233.py")]);

    ScriptedRunner::new()
        .on("nmap", &[], ok(NMAP_SAMPLE))
        .on("whatweb", &["http://10.10.11.20:80"], ok(PORT80_FINGERPRINT))
        .on("searchsploit", &["--exact", "apache 2.4.52"], ok(&apache))
        .on("searchsploit", &["--exact", "openssh 8.9p1"], ok(&openssh))
        .on("searchsploit", &["--json"], ok(EMPTY_SEARCH))
}

async fn run_lab(dir: &Path, runner: &ScriptedRunner, options: &PipelineOptions) -> Result<ScanSummary> {
    let pipeline = ScanPipeline::new(test_config(dir), runner.shared(), quiet());
    pipeline.run_session(&session(dir), &target(), options).await
}

#[tokio::test]
async fn test_full_pipeline_report() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let runner = scripted_lab();

    let summary = run_lab(dir.path(), &runner, &PipelineOptions::default()).await?;

    assert_eq!(summary.web_ports, vec![80, 8080]);
    assert_eq!(summary.fingerprints, 1);
    assert_eq!(summary.services_with_exploits, 2);
    assert_eq!(summary.exploit_matches, 2);
    assert!(summary.skipped_services.is_empty());
    assert_eq!(summary.hosts_entries, vec!["10.10.11.20 board.htb"]);

    let report = std::fs::read_to_string(dir.path().join("potential_vulns_20240131_142501.txt")).unwrap();
    assert!(report.starts_with("Vulnerability Scan Report\nGenerated: 2024-01-31 14:25:01\n\n"));
    assert!(report.contains("Suggested Hosts File Entries:\n==============================\nFound redirect to: http://board.htb/\n"));
    assert!(report.contains(
        "Identified Services:\n==============================\napache 2.4.52\nmysql 8.0.35-0ubuntu0.22.04.1\nopenssh 8.9p1\n"
    ));

    let banner = "=".repeat(50);
    let apache = report.find(&format!("{}\nPotential exploits for apache 2.4.52:\n{}", banner, banner)).unwrap();
    let openssh = report.find("Potential exploits for openssh 8.9p1:").unwrap();
    assert!(apache < openssh);
    assert!(!report.contains("Potential exploits for mysql"));
    assert!(report.contains("multiple/dos/51234.txt"));
    Ok(())
}

#[tokio::test]
async fn test_pipeline_output_files() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let runner = scripted_lab();

    run_lab(dir.path(), &runner, &PipelineOptions::default()).await?;

    for name in [
        "nmap_scan_20240131_142501.txt",
        "whatweb_scan_20240131_142501.txt",
        "potential_vulns_20240131_142501.txt",
        "scan_summary_20240131_142501.txt",
    ] {
        assert!(dir.path().join(name).is_file(), "{} missing", name);
    }
    assert!(!dir.path().join("scan_summary_20240131_142501.json").exists());

    let nmap = std::fs::read_to_string(dir.path().join("nmap_scan_20240131_142501.txt")).unwrap();
    assert_eq!(nmap, NMAP_SAMPLE);
    let whatweb = std::fs::read_to_string(dir.path().join("whatweb_scan_20240131_142501.txt")).unwrap();
    assert_eq!(whatweb, PORT80_FINGERPRINT);
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_report_is_world_readable() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    run_lab(dir.path(), &scripted_lab(), &PipelineOptions::default()).await?;

    let mode = std::fs::metadata(dir.path().join("potential_vulns_20240131_142501.txt"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o644);
    Ok(())
}

#[tokio::test]
async fn test_every_probe_attempted() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let runner = scripted_lab();

    run_lab(dir.path(), &runner, &PipelineOptions::default()).await?;

    let urls: Vec<String> = runner
        .calls_to("whatweb")
        .iter()
        .map(|c| c.args.last().cloned().unwrap_or_default())
        .collect();
    assert_eq!(
        urls,
        vec![
            "http://10.10.11.20:80",
            "https://10.10.11.20:80",
            "http://10.10.11.20:8080",
            "https://10.10.11.20:8080",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_nmap_failure_stops_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new().on("nmap", &[], failed(1, "Failed to resolve \"nosuchhost\""));

    let result = run_lab(dir.path(), &runner, &PipelineOptions::default()).await;

    assert!(result.is_err());
    assert!(runner.calls_to("whatweb").is_empty());
    assert!(runner.calls_to("searchsploit").is_empty());
    assert!(!dir.path().join("potential_vulns_20240131_142501.txt").exists());
}

#[tokio::test]
async fn test_missing_searchsploit_does_not_fail_run() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new()
        .on("nmap", &[], ok(NMAP_SAMPLE))
        .on("searchsploit", &[], common::Reply::Missing);

    let summary = run_lab(dir.path(), &runner, &PipelineOptions::default()).await?;

    assert_eq!(summary.skipped_services.len(), 3);
    assert_eq!(summary.services_with_exploits, 0);
    assert!(dir.path().join("potential_vulns_20240131_142501.txt").is_file());
    Ok(())
}

#[tokio::test]
async fn test_no_web_ports_still_reports() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new()
        .on("nmap", &[], ok("22/tcp open ssh OpenSSH 8.9p1 Ubuntu 3ubuntu0.4\n"))
        .on("searchsploit", &["--json"], ok(EMPTY_SEARCH));

    let summary = run_lab(dir.path(), &runner, &PipelineOptions::default()).await?;

    assert!(summary.web_ports.is_empty());
    assert!(runner.calls_to("whatweb").is_empty());
    assert_eq!(summary.services.len(), 1);
    let whatweb = std::fs::read_to_string(dir.path().join("whatweb_scan_20240131_142501.txt")).unwrap();
    assert!(whatweb.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_hosts_suggestions_can_be_disabled() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let options = PipelineOptions { hosts_suggestions: false, ..PipelineOptions::default() };

    let summary = run_lab(dir.path(), &scripted_lab(), &options).await?;

    assert!(summary.hosts_entries.is_empty());
    assert_eq!(summary.redirects.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_json_summary() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.reporting.format = OutputFormat::Json;
    let pipeline = ScanPipeline::new(config, scripted_lab().shared(), quiet());

    pipeline.run_session(&session(dir.path()), &target(), &PipelineOptions::default()).await?;

    let json = std::fs::read_to_string(dir.path().join("scan_summary_20240131_142501.json")).unwrap();
    let summary: ScanSummary = serde_json::from_str(&json)?;
    assert_eq!(summary.target, "10.10.11.20");
    assert!(summary.services.iter().any(|s| s.to_string() == "apache 2.4.52"));
    Ok(())
}

#[tokio::test]
async fn test_ffuf_enumeration() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let wordlist = dir.path().join("words.txt");
    std::fs::write(&wordlist, "admin\ndev\nlogin\n").unwrap();

    let runner = scripted_lab()
        .on("ffuf", &["http://10.10.11.20:80/FUZZ"], ok("admin\nlogin\n"))
        .on("ffuf", &["Host: FUZZ.board.htb", "http://10.10.11.20:80/"], ok("dev\n"))
        .on("ffuf", &[], ok(""));
    let options = PipelineOptions {
        dir_wordlist: Some(wordlist.clone()),
        sub_wordlist: Some(wordlist),
        ..PipelineOptions::default()
    };

    let summary = run_lab(dir.path(), &runner, &options).await?;

    assert_eq!(
        summary.discovered_paths,
        vec!["http://10.10.11.20:80/admin", "http://10.10.11.20:80/login"]
    );
    assert_eq!(summary.discovered_vhosts, vec!["dev.board.htb"]);
    assert_eq!(summary.hosts_entries, vec!["10.10.11.20 board.htb", "10.10.11.20 dev.board.htb"]);

    let vhosts = std::fs::read_to_string(dir.path().join("ffuf_vhosts_20240131_142501.txt")).unwrap();
    assert_eq!(vhosts, "dev.board.htb\n");
    assert_eq!(runner.calls_to("ffuf").len(), 4);
    Ok(())
}

#[test]
fn test_restricted_scan_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = NmapScanner::new(test_config(dir.path()), ScriptedRunner::new().shared(), quiet());

    let restricted = scanner.build_args(&target(), PrivilegeMode::Restricted);
    assert!(!restricted.iter().any(|a| a == "-sV" || a == "-p-"));
    assert!(restricted.contains(&"-sT".to_string()));
    assert_eq!(restricted.last().map(String::as_str), Some("10.10.11.20"));
    let ports = restricted.iter().position(|a| a == "-p").unwrap();
    assert_eq!(restricted[ports + 1], "80,443,3000,5000,8000,8008,8080,8443,8888");

    let privileged = scanner.build_args(&target(), PrivilegeMode::Privileged);
    for flag in ["-sS", "-sV", "-p-", "--script"] {
        assert!(privileged.contains(&flag.to_string()));
    }
}

#[tokio::test]
async fn test_fingerprint_output_created_when_all_probes_fail() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new().on("whatweb", &[], failed(1, "connection refused"));
    let fingerprinter = WhatwebFingerprinter::new(test_config(dir.path()), runner.shared(), quiet());
    let output = dir.path().join("whatweb.txt");

    let produced = fingerprinter.fingerprint(&target(), &[80, 443], &output).await?;

    assert_eq!(produced, 0);
    assert_eq!(runner.calls_to("whatweb").len(), 4);
    assert!(std::fs::read_to_string(&output).unwrap().is_empty());
    Ok(())
}
