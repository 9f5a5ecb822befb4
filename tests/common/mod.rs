// Shared helpers for integration tests.
//
// Provides an executor that fails every command and a context factory with a
// temporary home directory, so the real step lists can be driven end to end
// without touching the host.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::bail;

use nucleus_cli::config::Config;
use nucleus_cli::exec::{ExecResult, Executor, command_line};
use nucleus_cli::logging::{Log, Logger};
use nucleus_cli::platform::Platform;
use nucleus_cli::tasks::Context;

/// Executor on which every command exits non-zero. Commands are recorded.
#[derive(Debug, Default)]
pub struct FailingExecutor {
    lines: Mutex<Vec<String>>,
}

impl FailingExecutor {
    /// Every command line seen so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|g| g.clone()).unwrap_or_default()
    }

    fn record(&self, program: &str, args: &[&str]) -> String {
        let line = command_line(program, args);
        self.lines.lock().expect("lock").push(line.clone());
        line
    }
}

impl Executor for FailingExecutor {
    fn run_with_env(
        &self,
        program: &str,
        args: &[&str],
        _env: &[(&str, &str)],
    ) -> anyhow::Result<ExecResult> {
        let line = self.record(program, args);
        bail!("{line} failed (exit 1): simulated")
    }

    fn run_with_input(&self, program: &str, args: &[&str], _: &[u8]) -> anyhow::Result<ExecResult> {
        let line = self.record(program, args);
        bail!("{line} failed (exit 1): simulated")
    }

    fn run_unchecked(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
        self.record(program, args);
        Ok(ExecResult {
            stdout: String::new(),
            stderr: "simulated".to_string(),
            success: false,
            code: Some(1),
        })
    }

    fn which(&self, _: &str) -> bool {
        true
    }

    fn resolve(&self, _: &str) -> Option<PathBuf> {
        None
    }
}

/// Settings with no settle delays.
pub fn quick_config() -> Config {
    Config {
        containerd_settle_secs: 0,
        kubelet_settle_secs: 0,
        ..Config::default()
    }
}

/// Build a root, non-WSL [`Context`] whose invoking user lives in `home`.
pub fn context(
    executor: Arc<dyn Executor>,
    home: &Path,
    dry_run: bool,
) -> (Context, Arc<Logger>) {
    let log = Arc::new(Logger::without_file());
    let env = HashMap::from([
        ("HOME".to_string(), home.to_string_lossy().into_owned()),
        ("USER".to_string(), "tester".to_string()),
    ]);
    let ctx = Context::new(
        Arc::new(quick_config()),
        Platform::new(false, true),
        Arc::clone(&log) as Arc<dyn Log>,
        executor,
        env,
        dry_run,
    );
    (ctx, log)
}
