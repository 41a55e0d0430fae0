//! External command execution
//!
//! Every process the tool starts goes through [`CommandRunner`], so the
//! deploy flow can be dry-run and tested without a Supabase CLI installed.

use crate::error::CoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// A command line to execute, with a redacted form for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    args: Vec<String>,
    shown: Vec<String>,
    /// Inherit the terminal (browser login, prompts)
    pub interactive: bool,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            shown: Vec::new(),
            interactive: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        let arg = arg.into();
        self.shown.push(arg.clone());
        self.args.push(arg);
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// `KEY=VALUE` argument that displays as `KEY=<masked>`
    pub fn secret_assignment(mut self, key: &str, value: &str) -> Self {
        self.args.push(format!("{}={}", key, value));
        self.shown.push(format!("{}=<masked>", key));
        self
    }

    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    /// Real arguments, secrets included. Only the runner should read these.
    pub fn argv(&self) -> &[String] {
        &self.args
    }

    /// True when the leading arguments equal `prefix`
    pub fn starts_with(&self, prefix: &[&str]) -> bool {
        self.args.len() >= prefix.len() && self.args.iter().zip(prefix).all(|(a, p)| a == p)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.shown {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code as the shell would report it
    pub fn exit_code(&self) -> i32 {
        self.code.unwrap_or(1)
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. A missing program maps to `CliNotFound`.
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CoreError>;

    /// `<program> --version`; `None` if missing or it exits non-zero
    async fn probe(&self, program: &str) -> Option<String> {
        let invocation = Invocation::new(program).arg("--version");
        match self.run(&invocation).await {
            Ok(output) if output.success() => Some(output.stdout.trim().to_string()),
            Ok(output) => {
                debug!(program, code = ?output.code, "Version probe exited non-zero");
                None
            }
            Err(e) => {
                debug!(program, error = %e, "Version probe failed");
                None
            }
        }
    }
}

/// Runs commands for real via `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CoreError> {
        debug!(command = %invocation, interactive = invocation.interactive, "Running");

        let mut cmd = Command::new(&invocation.program);
        cmd.args(invocation.argv());

        if invocation.interactive {
            let status = cmd
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await
                .map_err(|e| spawn_error(&invocation.program, e))?;
            return Ok(CommandOutput {
                code: status.code(),
                ..Default::default()
            });
        }

        let output = cmd
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error(&invocation.program, e))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn spawn_error(program: &str, e: std::io::Error) -> CoreError {
    if e.kind() == std::io::ErrorKind::NotFound {
        CoreError::CliNotFound {
            program: program.to_string(),
        }
    } else {
        CoreError::Spawn {
            program: program.to_string(),
            source: e,
        }
    }
}

/// Records invocations instead of executing them.
///
/// Backs `--dry-run`. Programs can be marked missing, and invocations whose
/// display text contains a pattern can be made to exit with a given code.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Invocation>>,
    missing: HashSet<String>,
    failures: Vec<(String, i32)>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Behave as if `program` is not installed
    pub fn without_program(mut self, program: impl Into<String>) -> Self {
        self.missing.insert(program.into());
        self
    }

    /// Invocations whose display text contains `pattern` exit with `code`
    pub fn failing_on(mut self, pattern: impl Into<String>, code: i32) -> Self {
        self.failures.push((pattern.into(), code));
        self
    }

    /// Everything run so far, in order
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CoreError> {
        if self.missing.contains(&invocation.program) {
            return Err(CoreError::CliNotFound {
                program: invocation.program.clone(),
            });
        }

        self.calls.lock().push(invocation.clone());

        let shown = invocation.to_string();
        if let Some((_, code)) = self.failures.iter().find(|(p, _)| shown.contains(p.as_str())) {
            return Ok(CommandOutput {
                code: Some(*code),
                stdout: String::new(),
                stderr: format!("simulated failure: {}", shown),
            });
        }

        let stdout = if invocation.starts_with(&["--version"]) {
            "dry-run".to_string()
        } else {
            String::new()
        };

        Ok(CommandOutput {
            code: Some(0),
            stdout,
            stderr: String::new(),
        })
    }
}
