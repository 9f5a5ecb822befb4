use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, anyhow};
use tempfile::TempDir;

use super::helpers::lookup;
use super::kubernetes::ADMIN_KUBECONFIG;
use super::{Context, Task, TaskResult};
use crate::error::ProvisionError;
use crate::exec::Executor as _;

const RELEASES_URL: &str = "https://github.com/cilium/cilium-cli/releases/download";

/// Install the Cilium CLI and use it to deploy the Cilium CNI.
#[derive(Debug)]
pub struct InstallCilium;

impl Task for InstallCilium {
    fn name(&self) -> &str {
        "Install Cilium CNI"
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let machine = ctx.executor.run_unchecked("uname", &["-m"])?.stdout;
        let arch = cilium_arch(&machine);
        let version = lookup(
            ctx,
            "Cilium CLI version",
            "curl",
            &["-fsSL", &ctx.config.cilium_cli_stable_url],
        )?;

        let file_name = format!("cilium-linux-{arch}.tar.gz");
        let url = format!("{RELEASES_URL}/{version}/{file_name}");
        let (dir, _scratch) = download_dir(ctx)?;
        let tarball = dir.join(&file_name);
        let checksum = dir.join(format!("{file_name}.sha256sum"));

        ctx.log
            .info(&format!("installing Cilium CLI {version} ({arch})"));
        ctx.executor.run(
            "curl",
            &["-L", "--fail", "-o", &tarball.to_string_lossy(), &url],
        )?;
        ctx.executor.run(
            "curl",
            &[
                "-L",
                "--fail",
                "-o",
                &checksum.to_string_lossy(),
                &format!("{url}.sha256sum"),
            ],
        )?;

        let installed = verify_download(ctx, &tarball, &checksum, &file_name).and_then(|()| {
            ctx.sudo().run(
                "tar",
                &[
                    "xzvfC",
                    &tarball.to_string_lossy(),
                    &ctx.config.binary_dir.to_string_lossy(),
                ],
            )
        });
        if !ctx.dry_run {
            for path in [&tarball, &checksum] {
                if let Err(e) = ctx.fs_ops.remove_file(path) {
                    ctx.log.warn(&format!("{e:#}"));
                }
            }
        }
        installed?;

        ctx.log.info(&format!(
            "installing Cilium {}",
            ctx.config.cilium_version
        ));
        ctx.executor.run_with_env(
            "cilium",
            &["install", "--version", &ctx.config.cilium_version],
            &[("KUBECONFIG", ADMIN_KUBECONFIG)],
        )?;
        Ok(TaskResult::Ok)
    }
}

/// Where the release is downloaded.
///
/// A configured directory is used as is. Otherwise a private temp directory
/// is created and removed when the returned guard drops; dry-run only names
/// one.
fn download_dir(ctx: &Context) -> Result<(PathBuf, Option<TempDir>)> {
    if let Some(dir) = &ctx.config.download_dir {
        return Ok((dir.clone(), None));
    }
    if ctx.dry_run {
        return Ok((std::env::temp_dir().join("nucleus-cilium"), None));
    }
    let scratch = tempfile::Builder::new()
        .prefix("nucleus-cilium-")
        .tempdir()
        .context("failed to create download directory")?;
    Ok((scratch.path().to_path_buf(), Some(scratch)))
}

/// Check `tarball` against the digest published in `checksum`.
fn verify_download(ctx: &Context, tarball: &Path, checksum: &Path, file_name: &str) -> Result<()> {
    if ctx.dry_run {
        ctx.log
            .dry_run(&format!("would verify {file_name} against its sha256sum"));
        return Ok(());
    }

    let published = ctx.fs_ops.read_to_string(checksum)?;
    let expected = expected_digest(&published, file_name)
        .ok_or_else(|| anyhow!("no digest for {file_name} in {}", checksum.display()))?;
    let actual = sha256_hex(&ctx.fs_ops.read(tarball)?);
    if !expected.eq_ignore_ascii_case(&actual) {
        return Err(ProvisionError::ChecksumMismatch {
            file: file_name.to_string(),
            expected,
            actual,
        }
        .into());
    }
    ctx.log.debug(&format!("{file_name}: checksum OK"));
    Ok(())
}

/// Release architecture for a `uname -m` machine name.
#[must_use]
pub fn cilium_arch(machine: &str) -> &'static str {
    if machine.contains("aarch64") {
        "arm64"
    } else {
        "amd64"
    }
}

/// The digest for `file_name` in `sha256sum` output.
///
/// Accepts a line naming the file, or a bare digest when the file lists only
/// one entry.
#[must_use]
pub fn expected_digest(sha256sum: &str, file_name: &str) -> Option<String> {
    let mut lines = sha256sum.lines().filter(|l| !l.trim().is_empty());
    let first = lines.next()?;
    std::iter::once(first)
        .chain(lines)
        .find(|line| {
            line.split_whitespace()
                .nth(1)
                .is_some_and(|name| name.trim_start_matches('*') == file_name)
        })
        .or_else(|| (first.split_whitespace().count() == 1).then_some(first))
        .and_then(|line| line.split_whitespace().next())
        .map(str::to_owned)
}

/// Lowercase hex SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write as _;

    let digest = Sha256::digest(bytes);
    let mut hex = String::with_capacity(64);
    for b in &digest {
        write!(hex, "{b:02x}").unwrap_or(());
    }
    hex
}
