use clap::Parser;
use env_logger::Env;
use sovereign::{
    cli::{Cli, SummaryFormat},
    config::{Config, OutputFormat},
    display::DisplayManager,
    pipeline::{PipelineOptions, ScanPipeline},
    platform,
    runner::{NixShellRunner, SystemRunner, ToolRunner},
    types::{PrivilegeMode, ScanTarget},
    utils::{time::format_duration, wordlist::check_wordlist},
};
use std::process;
use std::sync::Arc;
use std::time::Instant;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    let display = DisplayManager::with_quiet(cli.quiet);

    if !cli.quiet {
        display.print_banner(
            "🛡  SOVEREIGN - Recon & Exploit Correlation",
            Some("Authorized Testing Only"),
        );
        display.print_warning("Ensure you have proper permission before scanning any target.");
    }

    let target = match ScanTarget::parse(&cli.target) {
        Ok(target) => target,
        Err(e) => {
            display.print_error(&e.to_string());
            process::exit(1);
        }
    };

    let mut config = load_config(&cli, &display);
    apply_overrides(&cli, &mut config);

    for wordlist in [&cli.dir_wordlist, &cli.sub_wordlist].into_iter().flatten() {
        if let Err(e) = check_wordlist(wordlist).await {
            display.print_error(&e.to_string());
            process::exit(1);
        }
    }

    let privilege = match cli.privilege_override() {
        Some(true) => PrivilegeMode::Privileged,
        Some(false) => PrivilegeMode::Restricted,
        None if platform::has_admin_privileges() => PrivilegeMode::Privileged,
        None => {
            display.print_warning("Not running as root: connect scan of common web ports, no version detection");
            PrivilegeMode::Restricted
        }
    };

    let runner: Arc<dyn ToolRunner> = if config.tools.use_nix_shell {
        display.print_info("Running tools through `nix shell`");
        Arc::new(NixShellRunner::new(SystemRunner::new()))
    } else {
        Arc::new(SystemRunner::new())
    };

    let options = PipelineOptions {
        privilege,
        dir_wordlist: cli.dir_wordlist.clone(),
        sub_wordlist: cli.sub_wordlist.clone(),
        hosts_suggestions: config.reporting.hosts_suggestions,
    };

    display.print_info(&format!("Target: {}", target));
    let start_time = Instant::now();
    let pipeline = ScanPipeline::new(config, runner, display.clone());

    match pipeline.run(&target, &options).await {
        Ok(summary) => {
            display.print_hosts_suggestions(&summary.hosts_entries);
            display.print_run_summary(&summary);
            display.print_success(&format!("Scan completed in {}", format_duration(start_time.elapsed())));
        }
        Err(e) => {
            display.print_error(&format!("Scan failed: {}", platform::platform_error_message(&e.to_string())));
            process::exit(1);
        }
    }
}

fn load_config(cli: &Cli, display: &DisplayManager) -> Config {
    if let Some(config_path) = &cli.config {
        match Config::load_from_file(&config_path.to_string_lossy()) {
            Ok(config) => {
                display.print_success(&format!("Loaded configuration from {}", config_path.display()));
                return config;
            }
            Err(e) => {
                display.print_warning(&format!("Failed to load configuration: {}, using defaults", e));
            }
        }
    }

    Config::from_env().unwrap_or_else(|e| {
        display.print_warning(&format!("Ignoring environment configuration: {}", e));
        Config::default()
    })
}

/// Command-line flags win over the config file.
fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(output) = &cli.output {
        config.reporting.output_dir = output.clone();
    }
    if let Some(format) = cli.format {
        config.reporting.format = match format {
            SummaryFormat::Text => OutputFormat::Text,
            SummaryFormat::Json => OutputFormat::Json,
        };
    }
    if let Some(secs) = cli.searchsploit_timeout {
        config.correlation.timeout = secs;
    }
    if cli.nixos {
        config.tools.use_nix_shell = true;
    }
    if cli.no_hosts {
        config.reporting.hosts_suggestions = false;
    }
    if cli.no_stream {
        config.scan.echo_output = false;
    }
}
