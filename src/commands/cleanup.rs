use std::sync::Arc;

use anyhow::Result;

use crate::cli::GlobalOpts;
use crate::logging::Logger;
use crate::tasks::{self, Policy};

/// Run the cleanup command.
///
/// Every step is attempted; failures are reported as warnings.
///
/// # Errors
///
/// Returns an error only if setup fails.
pub fn run(global: &GlobalOpts, log: &Arc<Logger>) -> Result<()> {
    log.info(&format!("nucleus {}", super::version()));
    let ctx = super::setup(global, log)?;

    tasks::run_steps(&tasks::all_cleanup_tasks(), &ctx, Policy::BestEffort)?;
    log.print_summary();

    if ctx.dry_run {
        log.info("dry run complete, no changes were made");
    } else {
        log.info("✓ Cleanup complete! Kubernetes has been removed from the system.");
    }
    Ok(())
}
