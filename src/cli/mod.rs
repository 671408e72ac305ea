//! Command-line interface definitions for the `machinist` binary.
//!
//! This module centralises the clap parser structures so both the main
//! binary and the build script can reuse them when generating the
//! manual page.

use clap::Parser;

/// Top-level CLI for the `machinist` binary.
#[derive(Debug, Parser)]
#[command(
    name = "machinist",
    about = "Provision and decommission cluster machines on Linode",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Launch a bootstrap host and initialise the environment on it.
    #[command(
        name = "bootstrap",
        about = "Launch a bootstrap host and initialise the environment"
    )]
    Bootstrap(BootstrapCommand),
    /// Provision and register machines with the environment.
    #[command(name = "add-machines", about = "Provision and register machines")]
    AddMachines(AddMachinesCommand),
    /// List the account's instances.
    #[command(name = "list-machines", about = "List the account's instances")]
    ListMachines(ListMachinesCommand),
    /// Terminate machines and their instances.
    #[command(
        name = "terminate-machines",
        about = "Terminate machines and their instances"
    )]
    TerminateMachines(TerminateMachinesCommand),
    /// Destroy the environment and every machine it manages.
    #[command(
        name = "destroy-environment",
        about = "Destroy the environment and every machine it manages"
    )]
    DestroyEnvironment(DestroyEnvironmentCommand),
}

/// Arguments for the `machinist bootstrap` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct BootstrapCommand {
    /// Plan/region constraints, for example `plan=1024,region=dallas`.
    #[arg(long, default_value = "", value_name = "CONSTRAINTS")]
    pub(crate) constraints: String,
}

/// Arguments for the `machinist add-machines` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct AddMachinesCommand {
    /// Number of machines to provision.
    #[arg(short = 'n', long, default_value_t = 1, value_name = "COUNT")]
    pub(crate) count: usize,
    /// Plan/region constraints, for example `plan=1024,region=dallas`.
    #[arg(long, default_value = "", value_name = "CONSTRAINTS")]
    pub(crate) constraints: String,
}

/// Arguments for the `machinist list-machines` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ListMachinesCommand {}

/// Arguments for the `machinist terminate-machines` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct TerminateMachinesCommand {
    /// Machine identifiers to terminate (machine 0 is never touched).
    #[arg(required = true, value_name = "MACHINE")]
    pub(crate) machines: Vec<String>,
}

/// Arguments for the `machinist destroy-environment` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct DestroyEnvironmentCommand {
    /// Sweep provider instances even when the environment is
    /// unreachable.
    #[arg(long)]
    pub(crate) force: bool,
}
