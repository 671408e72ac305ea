//! Instance lifecycle orchestration.
//!
//! [`Provider`] drives the ordered provision and teardown pipelines on
//! top of a [`ProviderApi`] implementation. Each pipeline is strictly
//! sequential: every step's success is a precondition for the next, and
//! the only suspension points are the pending-job poll loop and the
//! fixed settle/propagation delays. Running many pipelines in parallel
//! is the operation runner's job, not this module's.

mod launch;
mod teardown;
mod wait;

use std::time::Duration;

use thiserror::Error;

use crate::api::{ProviderApi, ProviderApiError};
use crate::config::{ConfigError, ProviderConfig};
use crate::dns::{DnsError, DomainManager};
use crate::model::{Instance, InstanceId, PlanId, RegionId};

/// Megabytes of boot disk provisioned per plan identifier unit.
pub const BOOT_DISK_MB_PER_PLAN: u64 = 24_320;

/// Megabytes of swap provisioned per plan identifier unit.
pub const SWAP_MB_PER_PLAN: u64 = 256;

/// TTL for registered instance records.
const RECORD_TTL: u32 = 60;

const JOB_POLL_INTERVAL: Duration = Duration::from_secs(10);
const JOB_POLL_ATTEMPTS: u32 = 60;
const BOOT_SETTLE_DELAY: Duration = Duration::from_secs(10);
const DNS_PROPAGATION_DELAY: Duration = Duration::from_secs(30);
const DELETE_RETRY_DELAY: Duration = Duration::from_secs(6);

/// Errors raised while driving a lifecycle pipeline.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProviderError {
    /// The provider rejected or failed a remote call.
    #[error(transparent)]
    Api(#[from] ProviderApiError),
    /// The pending-job queue did not drain within the attempt bound.
    #[error(
        "timed out waiting on instance {label}: {pending} jobs still queued after {attempts} polls"
    )]
    WaitTimeout {
        /// Label of the instance being waited on.
        label: String,
        /// Pending jobs observed on the final poll.
        pending: usize,
        /// Polls performed before giving up.
        attempts: u32,
    },
    /// The provider never assigned the instance an address.
    #[error("instance {id} has no IP address")]
    MissingAddress {
        /// Instance lacking an address.
        id: InstanceId,
    },
    /// Registering the instance's domain records failed.
    #[error(transparent)]
    Dns(#[from] DnsError),
}

/// Parameters for a provision pipeline, already resolved by the
/// constraint solver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LaunchParams {
    /// Plan to create the instance from.
    pub plan_id: PlanId,
    /// Region to create the instance in.
    pub region_id: RegionId,
}

/// Optional domain-alias step configuration.
///
/// When present, provisioning registers a subdomain A record for the
/// instance and a weighted alias under the shared parent name, and the
/// instance's remote access name becomes the registered subdomain.
#[derive(Clone, Debug)]
pub struct DnsAlias {
    /// Client for the domain-record service.
    pub manager: DomainManager,
    /// Parent domain new subdomains are registered under.
    pub parent_domain: String,
    /// Shared alias name that balances across registered instances.
    pub alias_name: String,
}

/// Orchestrates instance lifecycles against a provider API.
#[derive(Clone, Debug)]
pub struct Provider<A> {
    api: A,
    stack_script_id: u64,
    distribution_id: u64,
    kernel_id: u64,
    root_ssh_key: Option<String>,
    dns: Option<DnsAlias>,
    job_poll_interval: Duration,
    job_poll_attempts: u32,
    settle_delay: Duration,
    dns_propagation_delay: Duration,
    delete_retry_delay: Duration,
}

impl<A: ProviderApi> Provider<A> {
    /// Creates a provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the provided configuration fails
    /// validation.
    pub fn new(api: A, config: &ProviderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            api,
            stack_script_id: config.resolved_stack_script_id(),
            distribution_id: config.resolved_distribution_id(),
            kernel_id: config.resolved_kernel_id(),
            root_ssh_key: config.root_ssh_key.clone(),
            dns: None,
            job_poll_interval: JOB_POLL_INTERVAL,
            job_poll_attempts: JOB_POLL_ATTEMPTS,
            settle_delay: BOOT_SETTLE_DELAY,
            dns_propagation_delay: DNS_PROPAGATION_DELAY,
            delete_retry_delay: DELETE_RETRY_DELAY,
        })
    }

    /// Enables the domain-alias step during provisioning.
    #[must_use]
    pub fn with_dns(mut self, dns: DnsAlias) -> Self {
        self.dns = Some(dns);
        self
    }

    /// Overrides the pending-job poll interval.
    ///
    /// This is primarily used by tests to keep timeout scenarios fast.
    #[must_use]
    pub const fn with_job_poll_interval(mut self, interval: Duration) -> Self {
        self.job_poll_interval = interval;
        self
    }

    /// Overrides the pending-job attempt bound.
    ///
    /// This is primarily used by tests to keep timeout scenarios fast.
    #[must_use]
    pub const fn with_job_poll_attempts(mut self, attempts: u32) -> Self {
        self.job_poll_attempts = attempts;
        self
    }

    /// Overrides the post-boot settle delay.
    ///
    /// This is primarily used by tests to keep scenarios fast.
    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Overrides the DNS propagation pause.
    ///
    /// This is primarily used by tests to keep scenarios fast.
    #[must_use]
    pub const fn with_dns_propagation_delay(mut self, delay: Duration) -> Self {
        self.dns_propagation_delay = delay;
        self
    }

    /// Overrides the delete retry interval.
    ///
    /// This is primarily used by tests to keep retry scenarios fast.
    #[must_use]
    pub const fn with_delete_retry_delay(mut self, delay: Duration) -> Self {
        self.delete_retry_delay = delay;
        self
    }

    /// Lists all instances on the account.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Api`] when the listing fails.
    pub async fn instances(&self) -> Result<Vec<Instance>, ProviderError> {
        Ok(self.api.instances().await?)
    }

    /// Fetches one instance.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Api`] when the lookup fails.
    pub async fn instance(&self, id: InstanceId) -> Result<Instance, ProviderError> {
        Ok(self.api.instance(id).await?)
    }
}

#[cfg(test)]
mod tests;
