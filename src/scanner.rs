use crate::config::Config;
use crate::display::DisplayManager;
use crate::runner::{Invocation, ToolRunner};
use crate::types::{PrivilegeMode, ScanTarget};
use crate::{Result, ScanError};
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;

/// Runs the port/service scan and stores its normal output.
pub struct NmapScanner {
    config: Config,
    runner: Arc<dyn ToolRunner>,
    display: DisplayManager,
}

impl NmapScanner {
    pub fn new(config: Config, runner: Arc<dyn ToolRunner>, display: DisplayManager) -> Self {
        Self { config, runner, display }
    }

    /// Full argument list, target last.
    pub fn build_args(&self, target: &ScanTarget, mode: PrivilegeMode) -> Vec<String> {
        let scan = &self.config.scan;
        let mut args = match mode {
            PrivilegeMode::Privileged => scan.privileged_args.clone(),
            PrivilegeMode::Restricted => {
                let mut args = scan.restricted_args.clone();
                if !scan.web_ports.is_empty() {
                    let ports: Vec<String> = scan.web_ports.iter().map(|p| p.to_string()).collect();
                    args.push("-p".to_string());
                    args.push(ports.join(","));
                }
                args
            }
        };
        args.push(target.as_str().to_string());
        args
    }

    pub fn invocation(&self, target: &ScanTarget, mode: PrivilegeMode) -> Invocation {
        Invocation::new(&self.config.tools.nmap, self.build_args(target, mode))
            .with_timeout(self.config.scan_timeout())
            .with_echo(self.config.scan.echo_output && !self.display.is_quiet())
    }

    /// Run nmap and write its stdout to `output`. Failure is reported on the
    /// console and as `false`.
    pub async fn scan(&self, target: &ScanTarget, mode: PrivilegeMode, output: &Path) -> bool {
        match self.run(target, mode, output).await {
            Ok(()) => true,
            Err(e) => {
                self.display.print_error(&format!("nmap scan of {} failed: {}", target, e));
                false
            }
        }
    }

    async fn run(&self, target: &ScanTarget, mode: PrivilegeMode, output: &Path) -> Result<()> {
        let invocation = self.invocation(target, mode);
        info!("Starting {:?} nmap scan of {}", mode, target);
        debug!("nmap command: {}", invocation.command_line());

        let result = self.runner.run(&invocation).await?;
        if !result.success() {
            return Err(ScanError::tool_failed(&self.config.tools.nmap, result.exit_code, &result.stderr));
        }

        tokio::fs::write(output, &result.stdout).await.map_err(|e| {
            ScanError::Reporting(format!("Failed to write {}: {}", output.display(), e))
        })?;
        info!("nmap output saved to {}", output.display());
        Ok(())
    }
}
