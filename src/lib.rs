//! Single-node Kubernetes control plane installer.
//!
//! Provisions a Linux or WSL host as a Kubernetes control-plane node running
//! containerd and the Cilium CNI, and tears it down again. Both commands are
//! fixed, ordered lists of steps that shell out to the system's package
//! manager and the Kubernetes tooling.
//!
//! The public API is organised into four layers:
//!
//! - **[`config`]**: optional TOML settings with stock defaults
//! - **[`exec`]**: command execution, dry-run and `sudo` elevation
//! - **[`tasks`]**: the named install and cleanup steps and their runner
//! - **[`commands`]**: top-level subcommand orchestration (`install`, `cleanup`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod operations;
pub mod platform;
pub mod tasks;
