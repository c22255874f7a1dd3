#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sovereign::config::Config;
use sovereign::runner::{Invocation, ToolOutput, ToolRunner};
use sovereign::{Result, ScanError};
use std::path::Path;
use std::sync::Arc;

pub const NMAP_SAMPLE: &str = "\
Starting Nmap 7.94 ( https://nmap.org ) at 2024-01-31 14:25 UTC
Nmap scan report for 10.10.11.20
Host is up (0.031s latency).
Not shown: 65531 closed tcp ports (reset)
PORT     STATE SERVICE    VERSION
22/tcp   open  ssh        OpenSSH 8.9p1 Ubuntu 3ubuntu0.4 (Ubuntu Linux; protocol 2.0)
80/tcp   open  http       Apache httpd 2.4.52 ((Ubuntu))
|_http-title: Did not follow redirect to http://board.htb/
|_http-server-header: Apache/2.4.52 (Ubuntu)
3306/tcp open  mysql      MySQL 8.0.35-0ubuntu0.22.04.1
8080/tcp open  http-proxy
Service Info: OS: Linux; CPE: cpe:/o:linux:linux_kernel

Service detection performed. Please report any incorrect results at https://nmap.org/submit/ .
Nmap done: 1 IP address (1 host up) scanned in 35.12 seconds
";

pub const WHATWEB_SAMPLE: &str = "\
http://10.10.11.20:80 [302 Found] Apache[2.4.52], Country[RESERVED][ZZ], HTTPServer[Ubuntu Linux][Apache/2.4.52 (Ubuntu)], IP[10.10.11.20], RedirectLocation[http://board.htb/], Title[302 Found]
http://board.htb/ [200 OK] Apache[2.4.52], Bootstrap, Country[RESERVED][ZZ], HTML5, HTTPServer[Ubuntu Linux][Apache/2.4.52 (Ubuntu)], IP[10.10.11.20], JQuery[3.4.1], Script, Title[Board.htb], X-UA-Compatible[IE=edge]
https://10.10.11.20:443 [200 OK] nginx[1.18.0], PHP[7.4.3], X-Powered-By[PHP/7.4.3], Cookies[PHPSESSID], Email[admin@board.htb]
";

pub const EMPTY_SEARCH: &str = r#"{"SEARCH":"x","DB_PATH_EXPLOIT":"/opt/exploitdb","RESULTS_EXPLOIT":[],"DB_PATH_SHELLCODE":"/opt/exploitdb","RESULTS_SHELLCODE":[]}"#;

/// searchsploit `--json` output listing the given `(title, path)` rows.
pub fn search_json(rows: &[(&str, &str)]) -> String {
    let results: Vec<serde_json::Value> = rows
        .iter()
        .enumerate()
        .map(|(i, (title, path))| {
            serde_json::json!({
                "Title": title,
                "EDB-ID": format!("{}", 50000 + i),
                "Date_Published": "2021-10-06",
                "Type": "webapps",
                "Platform": "multiple",
                "Path": path,
            })
        })
        .collect();
    serde_json::json!({ "SEARCH": "x", "RESULTS_EXPLOIT": results, "RESULTS_SHELLCODE": [] }).to_string()
}

#[derive(Debug, Clone)]
pub enum Reply {
    Output(ToolOutput),
    Missing,
    TimedOut,
}

pub fn ok(stdout: &str) -> Reply {
    Reply::Output(ToolOutput {
        exit_code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    })
}

pub fn failed(code: i32, stderr: &str) -> Reply {
    Reply::Output(ToolOutput {
        exit_code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    })
}

struct Rule {
    tool: String,
    args: Vec<String>,
    reply: Reply,
}

/// Fake runner answering from a rule table; the first rule whose tool
/// matches and whose args all appear in the invocation wins. Unmatched
/// invocations exit 1. Clones share rules and the call log.
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    rules: Arc<Mutex<Vec<Rule>>>,
    calls: Arc<Mutex<Vec<Invocation>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, tool: &str, args: &[&str], reply: Reply) -> Self {
        self.rules.lock().push(Rule {
            tool: tool.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            reply,
        });
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, tool: &str) -> Vec<Invocation> {
        self.calls().into_iter().filter(|c| c.tool == tool).collect()
    }

    pub fn shared(&self) -> Arc<dyn ToolRunner> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl ToolRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        self.calls.lock().push(invocation.clone());

        let reply = self
            .rules
            .lock()
            .iter()
            .find(|rule| rule.tool == invocation.tool && rule.args.iter().all(|a| invocation.args.contains(a)))
            .map(|rule| rule.reply.clone());

        match reply {
            Some(Reply::Output(output)) => Ok(output),
            Some(Reply::Missing) => Err(ScanError::ToolNotFound { tool: invocation.tool.clone() }),
            Some(Reply::TimedOut) => Err(ScanError::Timeout { operation: invocation.command_line() }),
            None => Ok(ToolOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "no scripted reply".to_string(),
            }),
        }
    }
}

/// Defaults writing into `dir`, with console echo off.
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.reporting.output_dir = dir.to_path_buf();
    config.scan.echo_output = false;
    config
}
