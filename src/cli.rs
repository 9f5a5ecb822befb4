use clap::{Parser, Subcommand};

/// Top-level CLI entry point for the node installer.
#[derive(Parser, Debug)]
#[command(
    name = "nucleus",
    about = "Nucleus - Kubernetes master node installer with Cilium CNI",
    version = crate::commands::version(),
    arg_required_else_help = true
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Print the commands that would run without running them
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// TOML settings file (defaults to $NUCLEUS_CONFIG when set)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<std::path::PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Install Kubernetes master node
    Install,
    /// Remove Kubernetes installation
    Cleanup,
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Cleanup => "cleanup",
            Self::Version => "version",
        }
    }
}
