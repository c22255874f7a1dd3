use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub tools: ToolConfig,
    pub scan: ScanConfig,
    pub fingerprint: FingerprintConfig,
    pub correlation: CorrelationConfig,
    pub enumeration: EnumerationConfig,
    pub reporting: ReportingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub nmap: String,
    pub whatweb: String,
    pub searchsploit: String,
    pub ffuf: String,
    pub use_nix_shell: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub privileged_args: Vec<String>,
    pub restricted_args: Vec<String>,
    pub web_ports: Vec<u16>,
    pub timeout: u64, // seconds, 0 = wait forever
    pub echo_output: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintConfig {
    pub schemes: Vec<String>,
    pub extra_args: Vec<String>,
    pub timeout: u64, // seconds, 0 = wait forever
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationConfig {
    pub timeout: u64, // seconds, 0 = wait forever
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumerationConfig {
    pub threads: u32,
    pub match_codes: String,
    pub tls_ports: Vec<u16>,
    pub timeout: u64, // seconds, 0 = wait forever
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportingConfig {
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub world_readable: bool,
    pub hosts_suggestions: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools: ToolConfig {
                nmap: "nmap".to_string(),
                whatweb: "whatweb".to_string(),
                searchsploit: "searchsploit".to_string(),
                ffuf: "ffuf".to_string(),
                use_nix_shell: false,
            },
            scan: ScanConfig {
                privileged_args: strings(&[
                    "-sS", "-sV", "-p-", "-T4",
                    "--script", "http-title,http-enum,http-headers",
                ]),
                restricted_args: strings(&["-sT", "-T4"]),
                web_ports: vec![80, 443, 3000, 5000, 8000, 8008, 8080, 8443, 8888],
                timeout: 0,
                echo_output: true,
            },
            fingerprint: FingerprintConfig {
                schemes: strings(&["http", "https"]),
                extra_args: strings(&["--color=never"]),
                timeout: 0,
            },
            correlation: CorrelationConfig {
                timeout: 120,
            },
            enumeration: EnumerationConfig {
                threads: 40,
                match_codes: "200,204,301,302,307,401,403".to_string(),
                tls_ports: vec![443, 8443],
                timeout: 1800,
            },
            reporting: ReportingConfig {
                output_dir: PathBuf::from("scan_results"),
                format: OutputFormat::Text,
                world_readable: true,
                hosts_suggestions: true,
            },
        }
    }
}

/// Zero means "no limit" for every tool timeout in the config file.
fn optional_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

/// `SOVEREIGN__SCAN__TIMEOUT=600` overrides `scan.timeout`, and so on.
fn environment() -> config::Environment {
    config::Environment::with_prefix("SOVEREIGN").separator("__")
}

impl Config {
    pub fn load_from_file(path: &str) -> crate::Result<Self> {
        let defaults = config::Config::try_from(&Config::default())?;
        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name(path))
            .add_source(environment())
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Defaults with environment overrides only.
    pub fn from_env() -> crate::Result<Self> {
        let defaults = config::Config::try_from(&Config::default())?;
        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(environment())
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn save_to_file(&self, path: &str) -> crate::Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| crate::ScanError::Unknown(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn scan_timeout(&self) -> Option<Duration> {
        optional_secs(self.scan.timeout)
    }

    pub fn fingerprint_timeout(&self) -> Option<Duration> {
        optional_secs(self.fingerprint.timeout)
    }

    pub fn correlation_timeout(&self) -> Option<Duration> {
        optional_secs(self.correlation.timeout)
    }

    pub fn enumeration_timeout(&self) -> Option<Duration> {
        optional_secs(self.enumeration.timeout)
    }
}
