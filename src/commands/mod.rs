//! Top-level subcommand orchestration.
pub mod cleanup;
pub mod install;
pub mod version;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::cli::GlobalOpts;
use crate::config::{CONFIG_ENV, Config};
use crate::exec::{DryRunExecutor, Executor, SystemExecutor};
use crate::logging::{Log, Logger};
use crate::platform::Platform;
use crate::tasks::Context;

/// Version string embedded at build time.
#[must_use]
pub fn version() -> &'static str {
    option_env!("NUCLEUS_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Snapshot the process environment, dropping entries that are not UTF-8.
fn environment() -> HashMap<String, String> {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// The config file named by `--config`, or else by `NUCLEUS_CONFIG`.
fn config_path(global: &GlobalOpts, env: &HashMap<String, String>) -> Option<PathBuf> {
    global.config.clone().or_else(|| {
        env.get(CONFIG_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    })
}

/// Detect the platform, load settings, and build the execution context
/// shared by every step.
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded.
pub fn setup(global: &GlobalOpts, log: &Arc<Logger>) -> Result<Context> {
    let platform = Platform::detect();
    let env = environment();

    let path = config_path(global, &env);
    let config = Config::load(path.as_deref())?;
    if let Some(path) = &path {
        log.info(&format!("config: {}", path.display()));
    }
    log.debug(&format!(
        "kubernetes {}, cilium {}, pod network {}",
        config.kubernetes_version, config.cilium_version, config.pod_network_cidr
    ));
    log.debug(&format!(
        "wsl: {}, root: {}",
        platform.is_wsl, platform.privileged
    ));
    if !platform.privileged {
        log.info("not running as root, privileged commands will use sudo");
    }

    let executor: Arc<dyn Executor> = if global.dry_run {
        Arc::new(DryRunExecutor::new(Arc::clone(log) as Arc<dyn Log>))
    } else {
        Arc::new(SystemExecutor)
    };

    Ok(Context::new(
        Arc::new(config),
        platform,
        Arc::clone(log) as Arc<dyn Log>,
        executor,
        env,
        global.dry_run,
    ))
}
