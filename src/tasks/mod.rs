//! Named, strictly ordered steps that provision or tear down the node.
pub mod cilium;
pub mod containerd;
pub mod containers;
mod context;
pub mod helpers;
pub mod kubectl;
pub mod kubernetes;
pub mod prerequisites;
pub mod repositories;
pub mod swap;
pub mod systemd;

pub use context::{Context, InvokingUser};

use anyhow::Result;

use crate::error::ProvisionError;
use crate::logging::TaskStatus;

/// Outcome of a successful step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    /// The step made its changes.
    Ok,
    /// The step had nothing to do on this host.
    Skipped(String),
    /// The step only logged what it would do.
    DryRun,
}

/// A named, executable step.
pub trait Task: Send + Sync {
    /// Human-readable step name, shown as the stage header.
    fn name(&self) -> &str;

    /// Execute the step.
    ///
    /// # Errors
    ///
    /// Returns an error if a command the step depends on fails.
    fn run(&self, ctx: &Context) -> Result<TaskResult>;
}

/// How [`run_steps`] reacts to a failing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Stop at the first failure and return it.
    FailFast,
    /// Log the failure as a warning and carry on with the next step.
    BestEffort,
}

/// The steps run by `nucleus install`, in execution order.
#[must_use]
pub fn all_install_tasks() -> Vec<Box<dyn Task>> {
    vec![
        Box::new(systemd::EnableSystemd),
        Box::new(prerequisites::InstallPrerequisites),
        Box::new(containerd::InstallContainerd),
        Box::new(kubernetes::InstallKubernetesTools),
        Box::new(containerd::ConfigureContainerd),
        Box::new(swap::DisableSwap),
        Box::new(kubernetes::InitControlPlane),
        Box::new(kubectl::ConfigureKubectl),
        Box::new(cilium::InstallCilium),
        Box::new(containerd::RestartContainerRuntime),
        Box::new(kubernetes::UntaintControlPlane),
    ]
}

/// The steps run by `nucleus cleanup`, in execution order.
#[must_use]
pub fn all_cleanup_tasks() -> Vec<Box<dyn Task>> {
    vec![
        Box::new(kubernetes::ResetKubeadm),
        Box::new(kubectl::RemoveKubectlConfig),
        Box::new(containers::StopContainers),
        Box::new(kubernetes::RemoveKubernetesPackages),
        Box::new(kubernetes::CleanupDirectories),
        Box::new(repositories::RemoveRepositorySources),
        Box::new(swap::EnableSwap),
    ]
}

/// Execute a single step, recording its outcome in the logger.
///
/// # Errors
///
/// Returns the step's error unchanged after recording it as failed.
pub fn execute(task: &dyn Task, ctx: &Context) -> Result<()> {
    ctx.log.stage(task.name());

    match task.run(ctx) {
        Ok(TaskResult::Ok) if ctx.dry_run => {
            ctx.log.record_task(task.name(), TaskStatus::DryRun, None);
        }
        Ok(TaskResult::Ok) => {
            ctx.log.record_task(task.name(), TaskStatus::Ok, None);
        }
        Ok(TaskResult::Skipped(reason)) => {
            ctx.log.info(&format!("skipped: {reason}"));
            ctx.log
                .record_task(task.name(), TaskStatus::Skipped, Some(&reason));
        }
        Ok(TaskResult::DryRun) => {
            ctx.log.record_task(task.name(), TaskStatus::DryRun, None);
        }
        Err(e) => {
            ctx.log
                .record_task(task.name(), TaskStatus::Failed, Some(&format!("{e:#}")));
            return Err(e);
        }
    }
    Ok(())
}

/// Run `tasks` in order under `policy`.
///
/// # Errors
///
/// Under [`Policy::FailFast`], returns [`ProvisionError::StepFailed`] naming
/// the first failing step and carrying its error chain. Under [`Policy::BestEffort`] this never fails.
pub fn run_steps(
    tasks: &[Box<dyn Task>],
    ctx: &Context,
    policy: Policy,
) -> Result<(), ProvisionError> {
    for (index, task) in tasks.iter().enumerate() {
        let Err(e) = execute(task.as_ref(), ctx) else {
            continue;
        };
        match policy {
            Policy::FailFast => {
                let remaining = tasks.len() - index - 1;
                if remaining > 0 {
                    ctx.log
                        .debug(&format!("aborting: {remaining} step(s) not run"));
                }
                return Err(ProvisionError::StepFailed {
                    step: task.name().to_string(),
                    reason: format!("{e:#}"),
                });
            }
            Policy::BestEffort => {
                ctx.log.warn(&format!("{}: {e:#}", task.name()));
            }
        }
    }
    Ok(())
}

/// Shared helpers for task unit tests.
///
/// Provides a recording executor and a context factory so each task test
/// module does not have to duplicate boilerplate.
#[cfg(test)]
#[allow(clippy::panic)]
pub mod test_helpers {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use anyhow::bail;

    use crate::config::Config;
    use crate::exec::{ExecResult, Executor, command_line};
    use crate::logging::{Log, Logger};
    use crate::operations::{FileSystemOps, MockFileSystemOps};
    use crate::platform::Platform;

    use super::Context;

    /// One command seen by [`RecordingExecutor`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Call {
        /// Program name.
        pub program: String,
        /// Arguments.
        pub args: Vec<String>,
        /// Extra environment set on the process.
        pub env: Vec<(String, String)>,
        /// Bytes written to stdin, if any.
        pub input: Option<Vec<u8>>,
    }

    impl Call {
        /// The command rendered as `program args…`.
        #[must_use]
        pub fn line(&self) -> String {
            let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
            command_line(&self.program, &args)
        }

        /// Stdin as text.
        #[must_use]
        pub fn input_text(&self) -> String {
            self.input
                .as_deref()
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default()
        }
    }

    /// Executor that records every command and answers from canned output.
    ///
    /// Responses and failures are matched by substring against the rendered
    /// command line, so they also match after `sudo` wrapping.
    #[derive(Debug, Default)]
    pub struct RecordingExecutor {
        calls: Mutex<Vec<Call>>,
        outputs: Vec<(String, String)>,
        failures: Vec<String>,
    }

    impl RecordingExecutor {
        /// An executor where every command succeeds with empty output.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer commands containing `pattern` with `stdout`.
        #[must_use]
        pub fn with_output(mut self, pattern: &str, stdout: &str) -> Self {
            self.outputs.push((pattern.to_string(), stdout.to_string()));
            self
        }

        /// Fail commands containing `pattern`.
        #[must_use]
        pub fn failing_on(mut self, pattern: &str) -> Self {
            self.failures.push(pattern.to_string());
            self
        }

        /// Every recorded call, in order.
        #[must_use]
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().map_or_else(|_| Vec::new(), |g| g.clone())
        }

        /// Every recorded command line, in order.
        #[must_use]
        pub fn lines(&self) -> Vec<String> {
            self.calls().iter().map(Call::line).collect()
        }

        /// Whether any recorded command line contains `pattern`.
        #[must_use]
        pub fn ran(&self, pattern: &str) -> bool {
            self.lines().iter().any(|l| l.contains(pattern))
        }

        fn respond(&self, call: Call) -> ExecResult {
            let line = call.line();
            if let Ok(mut guard) = self.calls.lock() {
                guard.push(call);
            }
            if self.failures.iter().any(|p| line.contains(p.as_str())) {
                return ExecResult {
                    stdout: String::new(),
                    stderr: "forced failure".to_string(),
                    success: false,
                    code: Some(1),
                };
            }
            let stdout = self
                .outputs
                .iter()
                .find(|(p, _)| line.contains(p.as_str()))
                .map(|(_, out)| out.clone())
                .unwrap_or_default();
            ExecResult::ok(stdout)
        }

        fn checked(&self, call: Call) -> anyhow::Result<ExecResult> {
            let line = call.line();
            let result = self.respond(call);
            if !result.success {
                bail!("{line} failed (exit 1): {}", result.stderr);
            }
            Ok(result)
        }
    }

    impl Executor for RecordingExecutor {
        fn run_with_env(
            &self,
            program: &str,
            args: &[&str],
            env: &[(&str, &str)],
        ) -> anyhow::Result<ExecResult> {
            self.checked(Call {
                program: program.to_string(),
                args: args.iter().map(ToString::to_string).collect(),
                env: env
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
                input: None,
            })
        }

        fn run_with_input(
            &self,
            program: &str,
            args: &[&str],
            input: &[u8],
        ) -> anyhow::Result<ExecResult> {
            self.checked(Call {
                program: program.to_string(),
                args: args.iter().map(ToString::to_string).collect(),
                env: Vec::new(),
                input: Some(input.to_vec()),
            })
        }

        fn run_unchecked(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
            Ok(self.respond(Call {
                program: program.to_string(),
                args: args.iter().map(ToString::to_string).collect(),
                env: Vec::new(),
                input: None,
            }))
        }

        fn which(&self, _: &str) -> bool {
            true
        }

        fn resolve(&self, _: &str) -> Option<PathBuf> {
            None
        }
    }

    /// Config with zero settle times and a fixed download directory.
    #[must_use]
    pub fn test_config() -> Config {
        Config {
            containerd_settle_secs: 0,
            kubelet_settle_secs: 0,
            download_dir: Some(PathBuf::from("/tmp/nucleus-test")),
            ..Config::default()
        }
    }

    /// Build a [`Context`] for `platform` backed by `executor`, a
    /// [`MockFileSystemOps`], and an environment of `HOME=/home/test`,
    /// `USER=test` plus `extra_env`. Also returns the [`Logger`] so tests can
    /// inspect recorded step state.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn make_context(
        platform: Platform,
        executor: Arc<dyn Executor>,
        extra_env: &[(&str, &str)],
    ) -> (Context, Arc<Logger>) {
        let mut env = HashMap::from([
            ("HOME".to_string(), "/home/test".to_string()),
            ("USER".to_string(), "test".to_string()),
        ]);
        for (k, v) in extra_env {
            env.insert((*k).to_string(), (*v).to_string());
        }
        env.retain(|_, v| !v.is_empty());
        let log = Arc::new(Logger::without_file());
        let ctx = Context {
            config: Arc::new(test_config()),
            platform,
            log: Arc::clone(&log) as Arc<dyn Log>,
            executor,
            fs_ops: Arc::new(MockFileSystemOps::new()) as Arc<dyn FileSystemOps>,
            env,
            uid: 1000,
            gid: 1000,
            dry_run: false,
        };
        (ctx, log)
    }

    /// A root, non-WSL context over a fresh [`RecordingExecutor`].
    #[must_use]
    pub fn root_context() -> (Context, Arc<RecordingExecutor>, Arc<Logger>) {
        let exec = Arc::new(RecordingExecutor::new());
        let (ctx, log) = make_context(
            Platform::new(false, true),
            Arc::clone(&exec) as Arc<dyn Executor>,
            &[],
        );
        (ctx, exec, log)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::logging::TaskStatus;
    use test_helpers::root_context;

    /// A mock step for testing `execute()` and `run_steps()`.
    struct MockTask {
        name: &'static str,
        result: Result<TaskResult, String>,
        runs: Arc<AtomicUsize>,
    }

    impl MockTask {
        fn new(name: &'static str, result: Result<TaskResult, String>) -> (Self, Arc<AtomicUsize>) {
            let runs = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    name,
                    result,
                    runs: Arc::clone(&runs),
                },
                runs,
            )
        }
    }

    impl Task for MockTask {
        fn name(&self) -> &str {
            self.name
        }
        fn run(&self, _ctx: &Context) -> Result<TaskResult> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.result.clone().map_err(|s| anyhow::anyhow!("{s}"))
        }
    }

    #[test]
    fn execute_records_ok_task() {
        let (ctx, _, log) = root_context();
        let (task, _) = MockTask::new("ok-task", Ok(TaskResult::Ok));
        execute(&task, &ctx).unwrap();
        let entries = log.task_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, TaskStatus::Ok);
    }

    #[test]
    fn execute_records_ok_as_dry_run_in_dry_run_mode() {
        let (mut ctx, _, log) = root_context();
        ctx.dry_run = true;
        let (task, _) = MockTask::new("ok-task", Ok(TaskResult::Ok));
        execute(&task, &ctx).unwrap();
        assert_eq!(log.task_entries()[0].status, TaskStatus::DryRun);
    }

    #[test]
    fn execute_records_skipped_reason() {
        let (ctx, _, log) = root_context();
        let (task, _) = MockTask::new("skip", Ok(TaskResult::Skipped("not WSL".into())));
        execute(&task, &ctx).unwrap();
        let entries = log.task_entries();
        assert_eq!(entries[0].status, TaskStatus::Skipped);
        assert_eq!(entries[0].message.as_deref(), Some("not WSL"));
    }

    #[test]
    fn execute_records_failed_task() {
        let (ctx, _, log) = root_context();
        let (task, _) = MockTask::new("bad", Err("boom".into()));
        assert!(execute(&task, &ctx).is_err());
        assert_eq!(log.failure_count(), 1);
    }

    #[test]
    fn fail_fast_stops_after_first_failure() {
        let (ctx, _, log) = root_context();
        let (a, a_runs) = MockTask::new("first", Ok(TaskResult::Ok));
        let (b, b_runs) = MockTask::new("second", Err("exploded".into()));
        let (c, c_runs) = MockTask::new("third", Ok(TaskResult::Ok));
        let tasks: Vec<Box<dyn Task>> = vec![Box::new(a), Box::new(b), Box::new(c)];

        let err = run_steps(&tasks, &ctx, Policy::FailFast).unwrap_err();

        assert_eq!(err.to_string(), "second failed: exploded");
        assert_eq!(a_runs.load(Ordering::SeqCst), 1);
        assert_eq!(b_runs.load(Ordering::SeqCst), 1);
        assert_eq!(c_runs.load(Ordering::SeqCst), 0);
        assert_eq!(log.task_entries().len(), 2);
    }

    #[test]
    fn best_effort_runs_every_step() {
        let (ctx, _, log) = root_context();
        let (a, a_runs) = MockTask::new("first", Err("no kubeadm".into()));
        let (b, b_runs) = MockTask::new("second", Err("no docker".into()));
        let (c, c_runs) = MockTask::new("third", Ok(TaskResult::Ok));
        let tasks: Vec<Box<dyn Task>> = vec![Box::new(a), Box::new(b), Box::new(c)];

        run_steps(&tasks, &ctx, Policy::BestEffort).unwrap();

        assert_eq!(a_runs.load(Ordering::SeqCst), 1);
        assert_eq!(b_runs.load(Ordering::SeqCst), 1);
        assert_eq!(c_runs.load(Ordering::SeqCst), 1);
        assert_eq!(log.failure_count(), 2);
    }

    struct NeedsRestart;

    impl Task for NeedsRestart {
        fn name(&self) -> &str {
            "Enable systemd in WSL"
        }
        fn run(&self, _ctx: &Context) -> Result<TaskResult> {
            Err(ProvisionError::WslRestartRequired.into())
        }
    }

    #[test]
    fn fail_fast_names_the_step_requesting_wsl_restart() {
        let (ctx, _, _) = root_context();
        let tasks: Vec<Box<dyn Task>> = vec![Box::new(NeedsRestart)];
        let err = run_steps(&tasks, &ctx, Policy::FailFast).unwrap_err();
        assert!(matches!(err, ProvisionError::StepFailed { .. }));
        let message = err.to_string();
        assert!(message.contains("Enable systemd in WSL"));
        assert!(message.contains("wsl --shutdown"));
    }

    #[test]
    fn install_has_eleven_steps_starting_with_systemd() {
        let tasks = all_install_tasks();
        assert_eq!(tasks.len(), 11);
        assert_eq!(tasks[0].name(), "Enable systemd in WSL");
        assert_eq!(tasks[10].name(), "Untaint control-plane node");
    }

    #[test]
    fn cleanup_has_seven_steps() {
        let tasks = all_cleanup_tasks();
        assert_eq!(tasks.len(), 7);
        assert_eq!(tasks[0].name(), "Reset kubeadm");
        assert_eq!(tasks[6].name(), "Re-enable swap");
    }
}
