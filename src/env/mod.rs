//! Interface to the external cluster-management tool.
//!
//! The tool is an opaque collaborator: machines are registered and
//! removed by shelling out to its command-line client and parsing its
//! JSON status output. Command execution sits behind a small trait so
//! tests can script outputs without spawning processes.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::process::Command;

use serde::Deserialize;
use thiserror::Error;

use crate::config::{ConfigError, EnvConfig};

/// Errors raised while driving the cluster tool.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum EnvError {
    /// The tool binary could not be started.
    #[error("failed to launch {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// OS error message.
        message: String,
    },
    /// The tool exited with a non-zero status.
    #[error("{program} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Program that failed.
        program: String,
        /// Exit status reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the command.
        stderr: String,
    },
    /// Output from the tool could not be interpreted.
    #[error("failed to parse cluster tool output: {0}")]
    Parse(String),
}

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with the given arguments, capturing stdout and
    /// stderr.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::Spawn`] if the command cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, EnvError>;
}

/// Command runner backed by real processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, EnvError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| EnvError::Spawn {
                program: program.to_owned(),
                message: err.to_string(),
            })?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Status entry for one machine known to the environment.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct MachineInfo {
    /// Provider instance identifier, when the environment recorded one.
    #[serde(rename = "instance-id", default)]
    pub instance_id: Option<String>,
    /// Address the environment reaches the machine at.
    #[serde(rename = "dns-name", default)]
    pub dns_name: Option<String>,
}

/// Environment status: machine identifier to machine details.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct EnvStatus {
    /// Machines currently registered with the environment.
    #[serde(default)]
    pub machines: BTreeMap<String, MachineInfo>,
}

/// Interface to the cluster-management tool.
pub trait ClusterEnv: Send + Sync {
    /// Registers a machine reachable at `ssh_target` and returns the
    /// machine identifier the environment assigned.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError`] when the tool fails or its output cannot be
    /// parsed.
    fn add_machine(&self, ssh_target: &str) -> Result<String, EnvError>;

    /// Removes machines from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError`] when the tool fails.
    fn terminate_machines(&self, machine_ids: &[String]) -> Result<(), EnvError>;

    /// Fetches the environment's machine status.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError`] when the tool fails or its output cannot be
    /// parsed.
    fn status(&self) -> Result<EnvStatus, EnvError>;

    /// Returns `true` when the environment is bootstrapped and
    /// reachable.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::Spawn`] when the tool cannot be started at
    /// all.
    fn is_running(&self) -> Result<bool, EnvError>;

    /// Bootstraps the environment onto the given host.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError`] when the tool fails.
    fn bootstrap(&self, host: &str) -> Result<(), EnvError>;

    /// Destroys the environment's own state.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError`] when the tool fails.
    fn destroy_environment(&self) -> Result<(), EnvError>;
}

/// [`ClusterEnv`] implementation shelling out to the tool's CLI.
#[derive(Clone, Debug)]
pub struct CliEnv<R: CommandRunner = ProcessCommandRunner> {
    bin: String,
    env_name: String,
    runner: R,
}

impl CliEnv {
    /// Creates an environment client wired to the real process runner.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration fails validation.
    pub fn new(config: &EnvConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_runner(
            config.bin.clone(),
            config.name.clone(),
            ProcessCommandRunner,
        ))
    }
}

impl<R: CommandRunner> CliEnv<R> {
    /// Creates an environment client using the provided runner.
    #[must_use]
    pub const fn with_runner(bin: String, env_name: String, runner: R) -> Self {
        Self {
            bin,
            env_name,
            runner,
        }
    }

    fn run_tool(&self, args: Vec<OsString>) -> Result<CommandOutput, EnvError> {
        let output = self.runner.run(&self.bin, &args)?;
        if output.is_success() {
            return Ok(output);
        }
        let status_text = output
            .code
            .map_or_else(|| String::from("unknown"), |code| code.to_string());
        Err(EnvError::CommandFailure {
            program: self.bin.clone(),
            status: output.code,
            status_text,
            stderr: output.stderr,
        })
    }

    fn scoped(&self, parts: &[&str]) -> Vec<OsString> {
        let mut args: Vec<OsString> = parts.iter().map(OsString::from).collect();
        args.push(OsString::from("-e"));
        args.push(OsString::from(&self.env_name));
        args
    }
}

impl<R: CommandRunner> ClusterEnv for CliEnv<R> {
    fn add_machine(&self, ssh_target: &str) -> Result<String, EnvError> {
        let output = self.run_tool(self.scoped(&["add-machine", ssh_target]))?;
        // The tool reports `created machine <id>`; the identifier is the
        // final token.
        let combined = if output.stdout.trim().is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        combined
            .split_whitespace()
            .last()
            .map(str::to_owned)
            .ok_or_else(|| {
                EnvError::Parse(String::from("add-machine reported no machine identifier"))
            })
    }

    fn terminate_machines(&self, machine_ids: &[String]) -> Result<(), EnvError> {
        let mut parts = vec!["destroy-machine"];
        parts.extend(machine_ids.iter().map(String::as_str));
        self.run_tool(self.scoped(&parts))?;
        Ok(())
    }

    fn status(&self) -> Result<EnvStatus, EnvError> {
        let output = self.run_tool(self.scoped(&["status", "--format", "json"]))?;
        serde_json::from_str(&output.stdout).map_err(|err| EnvError::Parse(err.to_string()))
    }

    fn is_running(&self) -> Result<bool, EnvError> {
        match self.run_tool(self.scoped(&["status", "--format", "json"])) {
            Ok(_) => Ok(true),
            Err(EnvError::CommandFailure { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn bootstrap(&self, host: &str) -> Result<(), EnvError> {
        self.run_tool(self.scoped(&["bootstrap", "--to", host]))?;
        Ok(())
    }

    fn destroy_environment(&self) -> Result<(), EnvError> {
        let args = vec![
            OsString::from("destroy-environment"),
            OsString::from("-y"),
            OsString::from(&self.env_name),
        ];
        self.run_tool(args)?;
        Ok(())
    }
}
