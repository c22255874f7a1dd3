use crate::config::Config;
use crate::display::DisplayManager;
use crate::runner::{Invocation, ToolRunner};
use crate::types::ScanTarget;
use crate::utils::progress;
use crate::{Result, ScanError};
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Probes web ports with whatweb, collecting all output in one file.
pub struct WhatwebFingerprinter {
    config: Config,
    runner: Arc<dyn ToolRunner>,
    display: DisplayManager,
}

impl WhatwebFingerprinter {
    pub fn new(config: Config, runner: Arc<dyn ToolRunner>, display: DisplayManager) -> Self {
        Self { config, runner, display }
    }

    /// Every `scheme://target:port` to probe, ports outermost.
    pub fn probe_urls(&self, target: &ScanTarget, ports: &[u16]) -> Vec<String> {
        let host = target.url_host();
        ports
            .iter()
            .flat_map(|port| {
                let host = host.clone();
                self.config
                    .fingerprint
                    .schemes
                    .iter()
                    .map(move |scheme| format!("{}://{}:{}", scheme, host, port))
            })
            .collect()
    }

    fn invocation(&self, url: &str) -> Invocation {
        let mut args = self.config.fingerprint.extra_args.clone();
        args.push(url.to_string());
        Invocation::new(&self.config.tools.whatweb, args).with_timeout(self.config.fingerprint_timeout())
    }

    /// Probe every URL; returns how many produced output. The output file is
    /// created even when nothing does.
    pub async fn fingerprint(&self, target: &ScanTarget, ports: &[u16], output: &Path) -> Result<usize> {
        let mut file = tokio::fs::File::create(output).await.map_err(|e| {
            ScanError::Reporting(format!("Failed to create {}: {}", output.display(), e))
        })?;

        let urls = self.probe_urls(target, ports);
        let spinner = if self.display.is_quiet() {
            progress::hidden()
        } else {
            progress::create_spinner("Fingerprinting web services")
        };

        let mut produced = 0;
        for url in &urls {
            spinner.set_message(format!("whatweb {}", url));
            match self.probe(url).await {
                Ok(stdout) => {
                    file.write_all(stdout.as_bytes()).await?;
                    if !stdout.ends_with('\n') {
                        file.write_all(b"\n").await?;
                    }
                    produced += 1;
                }
                Err(e) => {
                    warn!("whatweb probe of {} failed: {}", url, e);
                    spinner.suspend(|| self.display.print_warning(&format!("No fingerprint for {}: {}", url, e)));
                }
            }
        }

        spinner.finish_and_clear();
        file.flush().await?;
        info!("{} of {} whatweb probes produced output", produced, urls.len());
        Ok(produced)
    }

    async fn probe(&self, url: &str) -> Result<String> {
        let invocation = self.invocation(url);
        debug!("whatweb command: {}", invocation.command_line());

        let result = self.runner.run(&invocation).await?;
        if !result.success() {
            return Err(ScanError::tool_failed(&self.config.tools.whatweb, result.exit_code, &result.stderr));
        }
        if result.stdout.trim().is_empty() {
            return Err(ScanError::Parse("whatweb printed nothing".to_string()));
        }
        Ok(result.stdout)
    }
}
