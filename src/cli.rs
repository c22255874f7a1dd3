use clap::{ArgGroup, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sovereign")]
#[command(about = "Port scan, web fingerprinting and exploit correlation for a single target")]
#[command(long_about = r#"
Sovereign runs nmap against a target, fingerprints every web port it finds
with whatweb, extracts service versions from both outputs and looks each one
up with searchsploit. Results are written to timestamped files under
scan_results/.

WARNING: Only scan systems you own or have explicit permission to test.

Usage Examples:
  sovereign 10.10.11.20                               # Scan, fingerprint, correlate
  sovereign 10.10.11.20 --dir-wordlist common.txt     # Also fuzz directories with ffuf
  sovereign 10.10.11.20 --sub-wordlist subs.txt       # Also fuzz vhosts of redirect domains
  sovereign 10.10.11.20 --nixos                       # Run every tool through `nix shell`
  sovereign 10.10.11.20 --no-hosts --format json      # No /etc/hosts hints, JSON summary
"#)]
#[command(version)]
#[command(author)]
#[command(group(ArgGroup::new("privilege").args(["privileged", "unprivileged"])))]
pub struct Cli {
    /// Target IP address or hostname
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Wordlist for ffuf directory discovery on every web port
    #[arg(long, value_name = "PATH")]
    pub dir_wordlist: Option<PathBuf>,

    /// Wordlist for ffuf virtual-host discovery on redirect domains
    #[arg(long, value_name = "PATH")]
    pub sub_wordlist: Option<PathBuf>,

    /// Run external tools through `nix shell nixpkgs#<pkg>`
    #[arg(long)]
    pub nixos: bool,

    /// Do not print /etc/hosts suggestions for discovered hostnames
    #[arg(long)]
    pub no_hosts: bool,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Summary format; json also writes scan_summary_<ts>.json
    #[arg(long, value_enum)]
    pub format: Option<SummaryFormat>,

    /// Use the full privileged nmap argument set even without root
    #[arg(long)]
    pub privileged: bool,

    /// Use the restricted nmap argument set even when running as root
    #[arg(long)]
    pub unprivileged: bool,

    /// Do not stream nmap output to the console while it runs
    #[arg(long)]
    pub no_stream: bool,

    /// Timeout for each searchsploit query in seconds (0 = none)
    #[arg(long, value_name = "SECS")]
    pub searchsploit_timeout: Option<u64>,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress output)
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SummaryFormat {
    Text,
    Json,
}

impl Cli {
    /// Explicit privilege override from the command line, if any.
    pub fn privilege_override(&self) -> Option<bool> {
        if self.privileged {
            Some(true)
        } else if self.unprivileged {
            Some(false)
        } else {
            None
        }
    }
}
