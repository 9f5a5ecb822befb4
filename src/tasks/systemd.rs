use std::path::Path;

use anyhow::Result;

use super::helpers::write_root_file;
use super::{Context, Task, TaskResult};
use crate::error::ProvisionError;

/// WSL distribution settings.
const WSL_CONF: &str = "/etc/wsl.conf";

/// Turn on systemd as the WSL init process.
#[derive(Debug)]
pub struct EnableSystemd;

impl Task for EnableSystemd {
    fn name(&self) -> &str {
        "Enable systemd in WSL"
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        if !ctx.platform.is_wsl {
            return Ok(TaskResult::Skipped("not running in WSL".to_string()));
        }

        let path = Path::new(WSL_CONF);
        let current = if ctx.fs_ops.exists(path) {
            ctx.fs_ops.read_to_string(path)?
        } else {
            String::new()
        };

        if systemd_enabled(&current) {
            ctx.log.info("systemd is already enabled");
            return Ok(TaskResult::Ok);
        }

        write_root_file(ctx, WSL_CONF, &with_systemd_enabled(&current))?;
        ctx.log
            .warn("systemd configuration updated, WSL needs to be restarted");
        ctx.log.info(
            "run 'wsl --shutdown' from Windows PowerShell, restart WSL, then run install again",
        );

        if ctx.dry_run {
            return Ok(TaskResult::DryRun);
        }
        Err(ProvisionError::WslRestartRequired.into())
    }
}

fn section_name(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .map(str::trim)
}

fn is_systemd_key(line: &str) -> bool {
    line.split_once('=')
        .is_some_and(|(key, _)| key.trim() == "systemd")
}

/// Whether the `[boot]` section of a `wsl.conf` sets `systemd=true`.
#[must_use]
pub fn systemd_enabled(conf: &str) -> bool {
    let mut in_boot = false;
    for line in conf.lines() {
        if let Some(name) = section_name(line) {
            in_boot = name == "boot";
            continue;
        }
        if in_boot
            && let Some((key, value)) = line.split_once('=')
            && key.trim() == "systemd"
        {
            return value.trim().eq_ignore_ascii_case("true");
        }
    }
    false
}

/// Return `conf` with `systemd=true` in its `[boot]` section.
///
/// Other sections and keys are kept as they are. A `[boot]` section is
/// appended if the file has none.
#[must_use]
pub fn with_systemd_enabled(conf: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_boot = false;
    let mut done = false;

    for line in conf.lines() {
        if let Some(name) = section_name(line) {
            if in_boot && !done {
                insert_before_blank_tail(&mut out, "systemd=true");
                done = true;
            }
            in_boot = name == "boot";
            out.push(line.to_string());
            continue;
        }
        if in_boot && is_systemd_key(line) {
            if !done {
                out.push("systemd=true".to_string());
                done = true;
            }
            continue;
        }
        out.push(line.to_string());
    }

    if in_boot && !done {
        insert_before_blank_tail(&mut out, "systemd=true");
        done = true;
    }
    if !done {
        if out.last().is_some_and(|l| !l.trim().is_empty()) {
            out.push(String::new());
        }
        out.push("[boot]".to_string());
        out.push("systemd=true".to_string());
    }

    let mut result = out.join("\n");
    result.push('\n');
    result
}

/// Insert `line` after the last non-blank line, keeping trailing blank lines
/// that separate sections.
fn insert_before_blank_tail(out: &mut Vec<String>, line: &str) {
    let at = out
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(out.len(), |i| i + 1);
    out.insert(at, line.to_string());
}
