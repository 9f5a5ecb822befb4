use anyhow::Result;

use super::helpers::run_commands;
use super::{Context, Task, TaskResult};

/// Packages needed to fetch and verify the third-party apt repositories.
const PACKAGES: &[&str] = &[
    "apt-transport-https",
    "ca-certificates",
    "curl",
    "gnupg",
    "lsb-release",
];

/// Install the base packages used by later steps.
#[derive(Debug)]
pub struct InstallPrerequisites;

impl Task for InstallPrerequisites {
    fn name(&self) -> &str {
        "Install prerequisites"
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let mut install = vec!["apt-get", "install", "-y"];
        install.extend_from_slice(PACKAGES);
        let commands: [&[&str]; 2] = [&["apt-get", "update"], &install];
        run_commands(&ctx.sudo(), &commands)?;
        Ok(TaskResult::Ok)
    }
}
