//! Process boundary for every external tool.
//!
//! Stages never spawn processes themselves; they build an [`Invocation`] and
//! hand it to a [`ToolRunner`]. The real implementation is [`SystemRunner`];
//! [`NixShellRunner`] wraps any runner so the tools come from nixpkgs.

use crate::{Result, ScanError};
use async_trait::async_trait;
use log::{debug, warn};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub tool: String,
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
    /// Print output lines to the console as they arrive.
    pub echo: bool,
}

impl Invocation {
    pub fn new<I, S>(tool: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tool: tool.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: None,
            echo: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn command_line(&self) -> String {
        let mut line = self.tool.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput>;
}

/// Spawns the tool as a child process of this one.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        debug!("Executing: {}", invocation.command_line());

        let mut child = Command::new(&invocation.tool)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ScanError::ToolNotFound {
                    tool: invocation.tool.clone(),
                },
                _ => ScanError::Io(e),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ScanError::Unknown("child stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ScanError::Unknown("child stderr was not captured".to_string()))?;

        let stdout_task = tokio::spawn(drain(stdout, invocation.echo, false));
        let stderr_task = tokio::spawn(drain(stderr, invocation.echo, true));

        let status = match invocation.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!("{} exceeded {}s, killing it", invocation.tool, limit.as_secs());
                    if let Err(e) = child.kill().await {
                        debug!("kill failed for {}: {}", invocation.tool, e);
                    }
                    return Err(ScanError::Timeout {
                        operation: invocation.command_line(),
                    });
                }
            },
            None => child.wait().await?,
        };

        let stdout = stdout_task
            .await
            .map_err(|e| ScanError::Unknown(format!("stdout reader failed: {}", e)))?;
        let stderr = stderr_task
            .await
            .map_err(|e| ScanError::Unknown(format!("stderr reader failed: {}", e)))?;

        debug!("{} exited with {:?}", invocation.tool, status.code());

        Ok(ToolOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        })
    }
}

/// Read a pipe to EOF, optionally echoing each line as it arrives.
async fn drain<R>(reader: R, echo: bool, is_stderr: bool) -> String
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut collected = String::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                if echo {
                    if is_stderr {
                        eprint!("{}", line);
                    } else {
                        print!("{}", line);
                    }
                }
                collected.push_str(&line);
            }
            Err(e) => {
                debug!("pipe read error: {}", e);
                break;
            }
        }
    }

    collected
}

/// nixpkgs attribute providing a tool binary.
pub fn nix_package_for(tool: &str) -> &str {
    let binary = tool.rsplit('/').next().unwrap_or(tool);
    match binary {
        "searchsploit" => "exploitdb",
        other => other,
    }
}

/// Runs each tool from nixpkgs via `nix shell nixpkgs#<package> --command`.
/// Flakes are enabled per call so a stock NixOS install works.
pub struct NixShellRunner<R> {
    inner: R,
    nix: String,
}

impl<R: ToolRunner> NixShellRunner<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            nix: "nix".to_string(),
        }
    }

    pub fn wrap(&self, invocation: &Invocation) -> Invocation {
        let mut args = vec![
            "--extra-experimental-features".to_string(),
            "nix-command flakes".to_string(),
            "shell".to_string(),
            format!("nixpkgs#{}", nix_package_for(&invocation.tool)),
            "--command".to_string(),
            invocation.tool.clone(),
        ];
        args.extend(invocation.args.iter().cloned());

        Invocation {
            tool: self.nix.clone(),
            args,
            timeout: invocation.timeout,
            echo: invocation.echo,
        }
    }
}

#[async_trait]
impl<R: ToolRunner> ToolRunner for NixShellRunner<R> {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        let wrapped = self.wrap(invocation);
        match self.inner.run(&wrapped).await {
            // nix itself missing is the actionable error, not the wrapped tool
            Err(ScanError::ToolNotFound { .. }) => Err(ScanError::ToolNotFound {
                tool: format!("{} (needed for --nixos)", self.nix),
            }),
            other => other,
        }
    }
}
