//! Command orchestrations tying the solver, pipelines, runner, and
//! environment together.
//!
//! Each command checks its preconditions before issuing any provider
//! call, resolves constraints against the immutable catalog, queues the
//! machine operations it needs, and drains the runner's result stream.
//! Aggregate success policy is the caller's: bulk adds are best effort,
//! while bootstrap treats any failure as fatal.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::api::{ProviderApi, ProviderApiError};
use crate::config::ConfigError;
use crate::constraints::{Catalog, ConstraintError};
use crate::env::{ClusterEnv, EnvError, EnvStatus, MachineInfo};
use crate::model::Instance;
use crate::ops::{DestroyOptions, MachineDestroy, MachineRegister};
use crate::provider::{LaunchParams, Provider, ProviderError};
use crate::runner::{DEFAULT_PARALLELISM, OpReport, Runner};

/// Pause after terminating machines before destroying the environment;
/// the tool marks machines dead asynchronously.
const ENV_SETTLE_DELAY: Duration = Duration::from_secs(10);

/// A precondition for an orchestration run was violated. Raised before
/// any provider call is made.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("precondition failed: {0}")]
pub struct PrecheckError(pub String);

/// Errors surfaced by command orchestrations.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A precondition check failed before any provider call.
    #[error(transparent)]
    Precheck(#[from] PrecheckError),
    /// Static configuration was bad or missing.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Constraint text could not be resolved.
    #[error(transparent)]
    Constraint(#[from] ConstraintError),
    /// A reference-data fetch failed.
    #[error(transparent)]
    Api(#[from] ProviderApiError),
    /// A lifecycle pipeline failed outside the runner.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// The cluster tool failed outside the runner.
    #[error(transparent)]
    Env(#[from] EnvError),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Fetches reference data and builds the immutable catalog.
///
/// # Errors
///
/// Returns [`CommandError::Api`] when a listing fails and
/// [`CommandError::Constraint`] when the expected defaults are absent.
pub async fn load_catalog<A: ProviderApi>(api: &A) -> Result<Catalog, CommandError> {
    let plans = api.plans().await?;
    let regions = api.regions().await?;
    Ok(Catalog::new(plans, regions)?)
}

/// Command orchestrations over a provider and a cluster environment.
pub struct Commands<A, E> {
    provider: Arc<Provider<A>>,
    env: Arc<E>,
    catalog: Catalog,
    parallelism: usize,
    env_settle_delay: Duration,
}

impl<A: ProviderApi + 'static, E: ClusterEnv + 'static> Commands<A, E> {
    /// Creates the command layer.
    #[must_use]
    pub fn new(provider: Arc<Provider<A>>, env: Arc<E>, catalog: Catalog) -> Self {
        Self {
            provider,
            env,
            catalog,
            parallelism: DEFAULT_PARALLELISM,
            env_settle_delay: ENV_SETTLE_DELAY,
        }
    }

    /// Overrides the runner's worker limit.
    #[must_use]
    pub const fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Overrides the post-terminate settle delay.
    ///
    /// This is primarily used by tests to keep scenarios fast.
    #[must_use]
    pub const fn with_env_settle_delay(mut self, delay: Duration) -> Self {
        self.env_settle_delay = delay;
        self
    }

    fn solve(&self, constraints: &str) -> Result<LaunchParams, CommandError> {
        let (plan_id, region_id) = self.catalog.solve(constraints)?;
        Ok(LaunchParams { plan_id, region_id })
    }

    /// Launches a bootstrap host and initialises the environment on it.
    ///
    /// A bootstrap failure after the host exists terminates the host
    /// before the error is surfaced.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Precheck`] when the environment is
    /// already bootstrapped, and the underlying error when any stage
    /// fails.
    pub async fn bootstrap(&self, constraints: &str) -> Result<Instance, CommandError> {
        if self.env.is_running()? {
            return Err(PrecheckError(String::from(
                "environment is already bootstrapped",
            ))
            .into());
        }
        let params = self.solve(constraints)?;

        info!("launching bootstrap host");
        let instance = self.provider.launch_instance(&params).await?;

        info!(instance = %instance.label, "bootstrapping environment");
        if let Err(err) = self.env.bootstrap(&instance.remote_access_name) {
            warn!(error = %err, "bootstrap failed, terminating bootstrap host");
            if let Err(teardown_err) = self.provider.terminate_instance(instance.id).await {
                warn!(
                    error = %teardown_err,
                    "teardown after failed bootstrap also failed"
                );
            }
            return Err(err.into());
        }
        info!("bootstrap complete");
        Ok(instance)
    }

    /// Provisions and registers `count` machines in parallel.
    ///
    /// Returns one report per machine, in completion order; individual
    /// failures do not abort the batch.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Precheck`] when the environment is not
    /// bootstrapped, and [`CommandError::Constraint`] for bad
    /// constraint text.
    pub async fn add_machines(
        &self,
        count: usize,
        constraints: &str,
    ) -> Result<Vec<OpReport>, CommandError> {
        if !self.env.is_running()? {
            return Err(PrecheckError(String::from("environment is not bootstrapped")).into());
        }
        let params = self.solve(constraints)?;

        info!(count, "launching instances");
        let mut runner = Runner::new(self.parallelism);
        for _ in 0..count.max(1) {
            runner.queue_op(MachineRegister::new(
                Arc::clone(&self.provider),
                Arc::clone(&self.env),
                params,
            ));
        }
        Ok(runner.drain().await)
    }

    /// Writes a table of the account's instances to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Provider`] when the listing fails and
    /// [`CommandError::Io`] when writing fails.
    pub async fn list_machines(&self, out: &mut impl Write) -> Result<(), CommandError> {
        let instances = self.provider.instances().await?;
        render_machines(&self.catalog, &instances, out)?;
        Ok(())
    }

    /// Terminates the named machines and their instances.
    ///
    /// Machines whose address cannot be resolved to an instance are
    /// removed from the environment only. Machine `0` (the state
    /// server) is never terminated by this command.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Precheck`] when the environment is not
    /// bootstrapped.
    pub async fn terminate_machines(
        &self,
        machine_ids: &[String],
    ) -> Result<Vec<OpReport>, CommandError> {
        if !self.env.is_running()? {
            return Err(PrecheckError(String::from("environment is not bootstrapped")).into());
        }
        let (reports, _, _) = self
            .terminate_filtered(|machine_id, _| {
                machine_id != "0" && machine_ids.iter().any(|wanted| wanted == machine_id)
            })
            .await?;
        Ok(reports)
    }

    /// Destroys the environment and every machine it manages.
    ///
    /// The normal path terminates all machines except the state server,
    /// waits out the tool's asynchronous bookkeeping, destroys the
    /// environment, and finally terminates the state server's instance.
    /// The forced path skips the environment where it can and sweeps
    /// instances directly.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Precheck`] when the environment is not
    /// bootstrapped and force was not requested.
    pub async fn destroy_environment(&self, force: bool) -> Result<Vec<OpReport>, CommandError> {
        if force {
            return self.force_destroy().await;
        }
        if !self.env.is_running()? {
            return Err(PrecheckError(String::from("environment is not bootstrapped")).into());
        }

        let (reports, status, address_map) =
            self.terminate_filtered(|machine_id, _| machine_id != "0").await?;

        // The tool marks machines dead asynchronously.
        sleep(self.env_settle_delay).await;

        info!("destroying environment");
        self.env.destroy_environment()?;

        if let Some(zero) = status.machines.get("0")
            && let Some(address) = zero.dns_name.as_deref()
            && let Some(instance) = address_map.get(address)
        {
            info!("terminating state server");
            self.provider.terminate_instance(instance.id).await?;
        }
        info!("environment destroyed");
        Ok(reports)
    }

    async fn force_destroy(&self) -> Result<Vec<OpReport>, CommandError> {
        info!("force destroying environment");
        let status = self.env.status().unwrap_or_default();
        let address_map = self.address_map().await?;

        let mut runner = Runner::new(self.parallelism);
        for info in status.machines.values() {
            if let Some(instance) = resolve_instance(info, &address_map) {
                runner.queue_op(MachineDestroy::new(
                    Arc::clone(&self.provider),
                    Arc::clone(&self.env),
                    None,
                    Some(instance.id),
                    DestroyOptions {
                        env_only: false,
                        iaas_only: true,
                    },
                ));
            }
        }
        let reports = runner.drain().await;

        if let Err(err) = self.env.destroy_environment() {
            warn!(error = %err, "environment state could not be destroyed");
        }
        info!("environment destroyed");
        Ok(reports)
    }

    /// Terminates every status machine matching `filter`, resolving
    /// each machine's address to its provider instance.
    async fn terminate_filtered(
        &self,
        filter: impl Fn(&str, &MachineInfo) -> bool,
    ) -> Result<(Vec<OpReport>, EnvStatus, HashMap<String, Instance>), CommandError> {
        let status = self.env.status()?;
        let address_map = self.address_map().await?;

        let mut runner = Runner::new(self.parallelism);
        let mut queued = 0usize;
        for (machine_id, info) in &status.machines {
            if !filter(machine_id, info) {
                continue;
            }
            let instance = resolve_instance(info, &address_map);
            if instance.is_none() {
                // A machine in environment state with no matching
                // instance: remove it from state so destroy can proceed.
                warn!(
                    machine = %machine_id,
                    address = ?info.dns_name,
                    "could not resolve machine to an instance"
                );
            }
            runner.queue_op(MachineDestroy::new(
                Arc::clone(&self.provider),
                Arc::clone(&self.env),
                Some(machine_id.clone()),
                instance.map(|found| found.id),
                DestroyOptions {
                    env_only: instance.is_none(),
                    iaas_only: false,
                },
            ));
            queued += 1;
        }

        if queued > 0 {
            info!(count = queued, "terminating machines");
        }
        let reports = runner.drain().await;
        Ok((reports, status, address_map))
    }

    async fn address_map(&self) -> Result<HashMap<String, Instance>, CommandError> {
        let mut map = HashMap::new();
        for instance in self.provider.instances().await? {
            if let Some(address) = instance.primary_ip() {
                map.insert(address.to_owned(), instance.clone());
            }
        }
        Ok(map)
    }
}

/// Resolves a status machine to a provider instance, by address first
/// and by recorded instance label as a fallback.
fn resolve_instance<'a>(
    info: &MachineInfo,
    address_map: &'a HashMap<String, Instance>,
) -> Option<&'a Instance> {
    if let Some(address) = info.dns_name.as_deref()
        && let Some(instance) = address_map.get(address)
    {
        return Some(instance);
    }
    info.instance_id.as_deref().and_then(|recorded| {
        address_map
            .values()
            .find(|instance| instance.label == recorded)
    })
}

/// Writes the machine listing table.
fn render_machines(
    catalog: &Catalog,
    instances: &[Instance],
    out: &mut impl Write,
) -> std::io::Result<()> {
    if instances.is_empty() {
        return Ok(());
    }
    writeln!(
        out,
        "{:<10} {:<18} {:<6} {:<10} {:<20}",
        "Id", "Label", "RAM", "Region", "Address"
    )?;
    for instance in instances {
        let mut label = instance.label.clone();
        if label.len() > 18 {
            label.truncate(15);
            label.push_str("...");
        }
        let region = catalog
            .region_abbr(instance.region_id)
            .map_or_else(|| instance.region_id.to_string(), str::to_owned);
        writeln!(
            out,
            "{:<10} {:<18} {:<6} {:<10} {:<20}",
            instance.id.to_string(),
            label,
            instance.total_ram,
            region,
            instance.ip_addresses.join(",")
        )?;
    }
    Ok(())
}
