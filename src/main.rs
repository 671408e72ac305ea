//! Binary entry point for the machinist CLI.

use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use machinist::{
    CliEnv, CommandError, Commands, ConfigError, DnsConfig, EnvConfig, LinodeClient, OpReport,
    Provider, ProviderConfig, commands,
};

mod cli;

use cli::Cli;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("{failed} of {total} operations failed")]
    PartialFailure { failed: usize, total: usize },
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };
    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let commands = build_commands().await?;
    let mut stdout = io::stdout();

    match cli {
        Cli::Bootstrap(command) => {
            let instance = commands.bootstrap(&command.constraints).await?;
            writeln!(stdout, "bootstrapped on {}", instance.remote_access_name)?;
            Ok(())
        }
        Cli::AddMachines(command) => {
            let reports = commands
                .add_machines(command.count, &command.constraints)
                .await?;
            report_ops(&reports, &mut stdout)
        }
        Cli::ListMachines(_) => {
            commands.list_machines(&mut stdout).await?;
            Ok(())
        }
        Cli::TerminateMachines(command) => {
            let reports = commands.terminate_machines(&command.machines).await?;
            report_ops(&reports, &mut stdout)
        }
        Cli::DestroyEnvironment(command) => {
            let reports = commands.destroy_environment(command.force).await?;
            report_ops(&reports, &mut stdout)
        }
    }
}

async fn build_commands() -> Result<Commands<LinodeClient, CliEnv>, CliError> {
    let provider_config = ProviderConfig::load_without_cli_args()?;
    let env_config = EnvConfig::load_without_cli_args()?;
    let dns_config = DnsConfig::load_without_cli_args()?;

    let client = LinodeClient::new(provider_config.api_key.clone());
    let catalog = commands::load_catalog(&client).await?;

    let mut provider = Provider::new(client, &provider_config)?;
    if let Some(alias) = dns_config.to_alias()? {
        provider = provider.with_dns(alias);
    }
    let env = CliEnv::new(&env_config)?;

    Ok(Commands::new(Arc::new(provider), Arc::new(env), catalog))
}

/// Writes one line per operation and fails when any operation failed.
fn report_ops(reports: &[OpReport], out: &mut impl Write) -> Result<(), CliError> {
    let mut failed = 0usize;
    for report in reports {
        match &report.outcome {
            Ok(_) => writeln!(out, "ok      {}", report.label)?,
            Err(err) => {
                failed += 1;
                writeln!(out, "failed  {}: {err}", report.label)?;
            }
        }
    }
    if failed > 0 {
        return Err(CliError::PartialFailure {
            failed,
            total: reports.len(),
        });
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
