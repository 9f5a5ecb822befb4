//! Helpers shared by the provisioning steps.
use anyhow::{Result, bail};

use super::Context;
use crate::error::ProvisionError;
use crate::exec::{Executor, command_line};

/// Run `commands` in order through `exec`, stopping at the first failure.
///
/// # Errors
///
/// Returns the error of the first command that fails.
pub fn run_commands(exec: &dyn Executor, commands: &[&[&str]]) -> Result<()> {
    for command in commands {
        let Some((program, args)) = command.split_first() else {
            continue;
        };
        exec.run(program, args)?;
    }
    Ok(())
}

/// Run every command in `commands`, even after one fails.
///
/// # Errors
///
/// Returns one error listing every command that failed.
pub fn run_each(exec: &dyn Executor, commands: &[&[&str]]) -> Result<()> {
    let mut failed = Vec::new();
    for command in commands {
        let Some((program, args)) = command.split_first() else {
            continue;
        };
        if let Err(e) = exec.run(program, args) {
            tracing::debug!("{e:#}");
            failed.push(command_line(program, args));
        }
    }
    if !failed.is_empty() {
        bail!(
            "{} of {} commands failed: {}",
            failed.len(),
            commands.len(),
            failed.join("; ")
        );
    }
    Ok(())
}

/// Run a query command and return its trimmed output.
///
/// In dry-run the query is not executed, so a `<what>` placeholder stands in
/// for the answer.
///
/// # Errors
///
/// Returns [`ProvisionError::EmptyLookup`] if the command prints nothing, or
/// the command's own error if it fails.
pub fn lookup(ctx: &Context, what: &'static str, program: &str, args: &[&str]) -> Result<String> {
    let value = ctx.executor.run(program, args)?.stdout.trim().to_string();
    if !value.is_empty() {
        return Ok(value);
    }
    if ctx.dry_run {
        return Ok(format!("<{what}>"));
    }
    Err(ProvisionError::EmptyLookup(what).into())
}

/// The Debian package architecture, e.g. `amd64`.
///
/// # Errors
///
/// Returns an error if `dpkg --print-architecture` fails or prints nothing.
pub fn package_architecture(ctx: &Context) -> Result<String> {
    lookup(ctx, "package architecture", "dpkg", &["--print-architecture"])
}

/// The distribution codename, e.g. `noble`.
///
/// # Errors
///
/// Returns an error if `lsb_release -cs` fails or prints nothing.
pub fn os_codename(ctx: &Context) -> Result<String> {
    lookup(ctx, "OS codename", "lsb_release", &["-cs"])
}

/// Write `contents` to a root-owned `path` through elevated `tee`.
///
/// # Errors
///
/// Returns an error if `tee` fails.
pub fn write_root_file(ctx: &Context, path: &str, contents: &str) -> Result<()> {
    ctx.sudo()
        .run_with_input("tee", &[path], contents.as_bytes())?;
    Ok(())
}
