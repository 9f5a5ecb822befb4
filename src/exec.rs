//! External command execution and privilege elevation.
//!
//! Every step talks to the host through the [`Executor`] trait so that the
//! pipelines can be exercised in tests without running `apt-get` or
//! `kubeadm`. [`Elevated`] wraps any executor and prefixes `sudo` when the
//! process is not already running as root.
use anyhow::{Context, Result, bail};
use std::io::Write as _;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;

use crate::logging::Log;

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Exit code, if the process was not killed by a signal.
    pub code: Option<i32>,
}

impl ExecResult {
    /// A successful result with the given stdout and no stderr.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
            code: Some(0),
        }
    }
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Render `program args…` for log and error messages.
#[must_use]
pub fn command_line(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", args.join(" "))
    }
}

/// Abstraction over process execution.
///
/// Implementations must be safe to share between the steps of a pipeline;
/// tests substitute a recording executor.
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Run a command, failing if it exits non-zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exits non-zero.
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        self.run_with_env(program, args, &[])
    }

    /// Run a command with extra environment variables, failing on non-zero exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exits non-zero.
    fn run_with_env(&self, program: &str, args: &[&str], env: &[(&str, &str)])
    -> Result<ExecResult>;

    /// Run a command feeding `input` on its standard input, failing on non-zero exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned, the input cannot be
    /// written, or the process exits non-zero.
    fn run_with_input(&self, program: &str, args: &[&str], input: &[u8]) -> Result<ExecResult>;

    /// Run a command, allowing failure (returns the result without bailing).
    ///
    /// # Errors
    ///
    /// Returns an error only if the process cannot be spawned.
    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Check if a program is available on `PATH`.
    fn which(&self, program: &str) -> bool;

    /// Resolve a program name to its absolute path on `PATH`.
    fn resolve(&self, program: &str) -> Option<PathBuf>;
}

/// Production executor backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl SystemExecutor {
    fn execute_checked(mut cmd: Command, label: &str) -> Result<ExecResult> {
        tracing::debug!("$ {label}");
        let output = cmd
            .output()
            .with_context(|| format!("failed to execute: {label}"))?;
        let result = ExecResult::from(output);
        for line in result.stdout.lines() {
            tracing::debug!("  {line}");
        }
        if !result.success {
            bail!(
                "{label} failed (exit {}): {}",
                result.code.unwrap_or(-1),
                result.stderr.trim()
            );
        }
        Ok(result)
    }
}

impl Executor for SystemExecutor {
    fn run_with_env(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
    ) -> Result<ExecResult> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        for (k, v) in env {
            cmd.env(k, v);
        }
        Self::execute_checked(cmd, &command_line(program, args))
    }

    fn run_with_input(&self, program: &str, args: &[&str], input: &[u8]) -> Result<ExecResult> {
        let label = command_line(program, args);
        tracing::debug!("$ {label} (with stdin)");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to execute: {label}"))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input)
                .with_context(|| format!("writing stdin of {label}"))?;
        }
        let result = ExecResult::from(
            child
                .wait_with_output()
                .with_context(|| format!("waiting for {label}"))?,
        );
        if !result.success {
            bail!(
                "{label} failed (exit {}): {}",
                result.code.unwrap_or(-1),
                result.stderr.trim()
            );
        }
        Ok(result)
    }

    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let label = command_line(program, args);
        tracing::debug!("$ {label}");
        let output = Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("failed to execute: {label}"))?;
        Ok(ExecResult::from(output))
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    fn resolve(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

/// Executor used by `--dry-run`: logs each command and reports success
/// without touching the system.
#[derive(Debug)]
pub struct DryRunExecutor {
    log: Arc<dyn Log>,
}

impl DryRunExecutor {
    /// Create a dry-run executor that reports through `log`.
    #[must_use]
    pub fn new(log: Arc<dyn Log>) -> Self {
        Self { log }
    }
}

impl Executor for DryRunExecutor {
    fn run_with_env(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
    ) -> Result<ExecResult> {
        let prefix: String = env.iter().map(|(k, v)| format!("{k}={v} ")).collect();
        self.log
            .dry_run(&format!("would run: {prefix}{}", command_line(program, args)));
        Ok(ExecResult::ok(""))
    }

    fn run_with_input(&self, program: &str, args: &[&str], input: &[u8]) -> Result<ExecResult> {
        self.log.dry_run(&format!(
            "would run: {} ({} bytes on stdin)",
            command_line(program, args),
            input.len()
        ));
        Ok(ExecResult::ok(""))
    }

    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        self.run(program, args)
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    fn resolve(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

/// A command after privilege elevation has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to spawn.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Environment set directly on the spawned process.
    pub env: Vec<(String, String)>,
}

impl Invocation {
    /// Borrow the arguments as string slices.
    #[must_use]
    pub fn arg_refs(&self) -> Vec<&str> {
        self.args.iter().map(String::as_str).collect()
    }

    /// Borrow the environment as string-slice pairs.
    #[must_use]
    pub fn env_refs(&self) -> Vec<(&str, &str)> {
        self.env
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Rewrite a command so it runs with root privileges.
///
/// When `privileged` is true the command is returned unchanged. Otherwise it
/// becomes `sudo [env K=V…] <path> args…`, where `<path>` is `resolved` if
/// known and the bare program name if not. `sudo` resets the environment,
/// so variables are passed through `env` on the elevated side.
#[must_use]
pub fn elevate(
    program: &str,
    args: &[&str],
    env: &[(&str, &str)],
    privileged: bool,
    resolved: Option<PathBuf>,
) -> Invocation {
    if privileged {
        return Invocation {
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
            env: env
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        };
    }

    let mut sudo_args = Vec::with_capacity(args.len() + env.len() + 2);
    if !env.is_empty() {
        sudo_args.push("env".to_string());
        sudo_args.extend(env.iter().map(|(k, v)| format!("{k}={v}")));
    }
    sudo_args.push(resolved.map_or_else(
        || program.to_string(),
        |p| p.to_string_lossy().into_owned(),
    ));
    sudo_args.extend(args.iter().map(ToString::to_string));

    Invocation {
        program: "sudo".to_string(),
        args: sudo_args,
        env: Vec::new(),
    }
}

/// Executor decorator that elevates every command via [`elevate`].
#[derive(Debug, Clone, Copy)]
pub struct Elevated<'a> {
    inner: &'a dyn Executor,
    privileged: bool,
}

impl<'a> Elevated<'a> {
    /// Wrap `inner`; `privileged` is whether the process already runs as root.
    #[must_use]
    pub const fn new(inner: &'a dyn Executor, privileged: bool) -> Self {
        Self { inner, privileged }
    }

    fn wrap(&self, program: &str, args: &[&str], env: &[(&str, &str)]) -> Invocation {
        let resolved = if self.privileged {
            None
        } else {
            self.inner.resolve(program)
        };
        elevate(program, args, env, self.privileged, resolved)
    }
}

impl Executor for Elevated<'_> {
    fn run_with_env(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
    ) -> Result<ExecResult> {
        let inv = self.wrap(program, args, env);
        self.inner
            .run_with_env(&inv.program, &inv.arg_refs(), &inv.env_refs())
    }

    fn run_with_input(&self, program: &str, args: &[&str], input: &[u8]) -> Result<ExecResult> {
        let inv = self.wrap(program, args, &[]);
        self.inner
            .run_with_input(&inv.program, &inv.arg_refs(), input)
    }

    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let inv = self.wrap(program, args, &[]);
        self.inner.run_unchecked(&inv.program, &inv.arg_refs())
    }

    fn which(&self, program: &str) -> bool {
        self.inner.which(program)
    }

    fn resolve(&self, program: &str) -> Option<PathBuf> {
        self.inner.resolve(program)
    }
}
