use crate::nmap_parser::OpenPort;
use crate::reporting::ScanSummary;
use crate::service::ServiceSet;
use crate::types::{Correlation, QueryTier};
use colored::*;

/// Colored console output for every pipeline stage
#[derive(Debug, Clone)]
pub struct DisplayManager {
    use_colors: bool,
    quiet_mode: bool,
}

impl DisplayManager {
    pub fn new() -> Self {
        Self::with_quiet(false)
    }

    pub fn with_quiet(quiet: bool) -> Self {
        let use_colors = std::env::var("NO_COLOR").is_err() &&
                        std::env::var("TERM").map_or(true, |term| term != "dumb");

        Self {
            use_colors,
            quiet_mode: quiet,
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet_mode
    }

    /// Print a clean section header
    pub fn print_section_header(&self, title: &str) {
        if self.quiet_mode { return; }

        println!();
        if self.use_colors {
            println!("{}", title.bright_cyan().bold());
            println!("{}", "─".repeat(title.chars().count()).bright_cyan());
        } else {
            println!("{}", title);
            println!("{}", "=".repeat(title.len()));
        }
    }

    pub fn print_success(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "✓".bright_green().bold(), message.green());
        } else {
            println!("[✓] {}", message);
        }
    }

    pub fn print_warning(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "!".bright_yellow().bold(), message.yellow());
        } else {
            println!("[!] {}", message);
        }
    }

    /// Errors are printed even in quiet mode
    pub fn print_error(&self, message: &str) {
        if self.use_colors {
            eprintln!("  {} {}", "✗".bright_red().bold(), message.red().bold());
        } else {
            eprintln!("[✗] {}", message);
        }
    }

    pub fn print_info(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "i".bright_blue().bold(), message.blue());
        } else {
            println!("[i] {}", message);
        }
    }

    /// Open ports from the nmap stage, web ports highlighted
    pub fn print_port_results(&self, target: &str, open_ports: &[OpenPort]) {
        if self.quiet_mode { return; }

        if open_ports.is_empty() {
            if self.use_colors {
                println!("  {} {} - {}",
                    "•".bright_black(),
                    target.cyan(),
                    "No open ports".bright_black()
                );
            } else {
                println!("  • {} - No open ports", target);
            }
            return;
        }

        if self.use_colors {
            println!("  {} {} → {} ports",
                "•".bright_green().bold(),
                target.cyan().bold(),
                open_ports.len().to_string().yellow().bold()
            );

            for port in open_ports {
                let label = format!("{}/{}", port.port, port.protocol);
                let detail = if port.version_info.is_empty() {
                    format!(" ({})", port.service)
                } else {
                    format!(" ({}, {})", port.service, port.version_info)
                };
                let marker = if port.is_web() { "→".bright_green() } else { "→".bright_black() };
                println!("    {} {}{}",
                    marker,
                    label.yellow(),
                    detail.truncate_with_ellipsis(70).bright_black()
                );
            }
        } else {
            println!("  • {} → {} ports", target, open_ports.len());
            for port in open_ports {
                println!("    → {}/{} ({}) {}", port.port, port.protocol, port.service, port.version_info);
            }
        }
    }

    pub fn print_services(&self, services: &ServiceSet) {
        if self.quiet_mode { return; }

        if services.is_empty() {
            self.print_warning("No versioned services identified");
            return;
        }

        for service in services {
            if self.use_colors {
                println!("    {} {} {}",
                    "→".bright_green(),
                    service.name().bright_white().bold(),
                    service.version().cyan()
                );
            } else {
                println!("    → {}", service);
            }
        }
    }

    /// One service's searchsploit outcome
    pub fn print_correlation(&self, correlation: &Correlation) {
        if self.quiet_mode { return; }

        let service = correlation.service.to_string();
        if !correlation.found() {
            if self.use_colors {
                println!("  {} {} - {}", "•".bright_black(), service.cyan(), "no matching exploits".bright_black());
            } else {
                println!("  • {} - no matching exploits", service);
            }
            return;
        }

        let tier = correlation.tier.map(tier_label).unwrap_or("");
        if self.use_colors {
            println!("  {} {} → {} exploits {}",
                "🔥".bright_red(),
                service.bright_white().bold(),
                correlation.matches.len().to_string().red().bold(),
                format!("[{}]", tier).bright_black()
            );
            for exploit in correlation.matches.iter().take(5) {
                println!("    └─ {}", exploit.title.truncate_with_ellipsis(90).white());
            }
            if correlation.matches.len() > 5 {
                println!("    {} {} more in the report...", "...".bright_black(), correlation.matches.len() - 5);
            }
        } else {
            println!("  [!] {} -> {} exploits [{}]", service, correlation.matches.len(), tier);
            for exploit in correlation.matches.iter().take(5) {
                println!("    - {}", exploit.title);
            }
            if correlation.matches.len() > 5 {
                println!("    ... {} more in the report", correlation.matches.len() - 5);
            }
        }
    }

    /// Lines ready to paste into /etc/hosts
    pub fn print_hosts_suggestions(&self, entries: &[String]) {
        if self.quiet_mode || entries.is_empty() { return; }

        self.print_section_header("Suggested /etc/hosts entries");
        for entry in entries {
            if self.use_colors {
                println!("    {}", entry.bright_yellow());
            } else {
                println!("    {}", entry);
            }
        }
    }

    pub fn print_run_summary(&self, summary: &ScanSummary) {
        if self.quiet_mode { return; }

        self.print_section_header("📊 SCAN SUMMARY");
        let rows = [
            ("Target", summary.target.clone()),
            ("Web ports", join_ports(&summary.web_ports)),
            ("Services", summary.services.len().to_string()),
            ("With exploits", summary.services_with_exploits.to_string()),
            ("Exploit matches", summary.exploit_matches.to_string()),
            ("Skipped", summary.skipped_services.len().to_string()),
            ("Duration", crate::utils::time::format_duration(summary.duration())),
        ];

        for (label, value) in rows {
            if self.use_colors {
                println!("  {:<16} {}", format!("{}:", label).bright_white().bold(), value.cyan());
            } else {
                println!("  {:<16} {}", format!("{}:", label), value);
            }
        }

        for file in &summary.files {
            if self.use_colors {
                println!("    {} {}", "→".bright_green(), file.display().to_string().bright_black());
            } else {
                println!("    → {}", file.display());
            }
        }
    }

    pub fn print_banner(&self, title: &str, subtitle: Option<&str>) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!();
            println!("  {}", "┌─".bright_cyan().to_string() + &"─".repeat(title.len() + 2) + "─┐");
            println!("  {} {} {}",
                "│".bright_cyan(),
                title.bright_white().bold(),
                "│".bright_cyan()
            );
            if let Some(sub) = subtitle {
                println!("  {} {} {}",
                    "│".bright_cyan(),
                    format!("{:^width$}", sub, width = title.len()).bright_black(),
                    "│".bright_cyan()
                );
            }
            println!("  {}", "└─".bright_cyan().to_string() + &"─".repeat(title.len() + 2) + "─┘");
            println!();
        } else {
            let border = "=".repeat(title.len() + 4);
            println!("\n{}", border);
            println!("  {}  ", title);
            if let Some(sub) = subtitle {
                println!("  {}  ", sub);
            }
            println!("{}\n", border);
        }
    }
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}

fn tier_label(tier: QueryTier) -> &'static str {
    match tier {
        QueryTier::Exact => "exact match",
        QueryTier::Fuzzy => "name match",
        QueryTier::Text => "text search",
    }
}

fn join_ports(ports: &[u16]) -> String {
    if ports.is_empty() {
        return "none".to_string();
    }
    ports.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
}

trait StringExt {
    fn truncate_with_ellipsis(&self, max_len: usize) -> String;
}

impl StringExt for str {
    fn truncate_with_ellipsis(&self, max_len: usize) -> String {
        if self.chars().count() <= max_len {
            self.to_string()
        } else {
            let kept: String = self.chars().take(max_len.saturating_sub(3)).collect();
            format!("{}...", kept)
        }
    }
}
