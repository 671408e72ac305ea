//! Provider API abstraction.
//!
//! The lifecycle pipeline drives the provider through this trait so
//! behavioural tests can substitute a scripted double for the real
//! transport. Implementations are stateless request/response mappers:
//! they perform no retries and no waiting, and the error they raise
//! carries the provider's raw error payload so callers can classify
//! transient conditions.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::model::{
    ConfigRef, Disk, DiskId, DiskRef, Instance, InstanceId, Job, JobRef, Plan, PlanId, Region,
    RegionId,
};

/// Future returned by provider API operations.
pub type ApiFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ProviderApiError>> + Send + 'a>>;

/// One entry from the provider's error array.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct ApiFault {
    /// Machine-readable error code. The legacy API emits both numeric
    /// and symbolic codes; both are normalised to a string here.
    #[serde(rename = "ERRORCODE", deserialize_with = "code_as_string")]
    pub code: String,
    /// Human-readable message.
    #[serde(rename = "ERRORMESSAGE", default)]
    pub message: String,
}

impl ApiFault {
    /// Code reported when an instance has an unprocessable pending
    /// action and cannot be mutated yet.
    pub const PENDING_ACTION: &'static str = "unprocessable_entity";
    /// Code reported when the addressed resource does not exist.
    pub const NOT_FOUND: &'static str = "not_found";
}

fn code_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Int(code) => code.to_string(),
        Raw::Str(code) => code,
    })
}

fn summarize(faults: &[ApiFault]) -> String {
    let parts: Vec<String> = faults
        .iter()
        .map(|fault| format!("{} ({})", fault.message, fault.code))
        .collect();
    parts.join("; ")
}

/// Errors raised by provider API implementations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProviderApiError {
    /// The request never produced a response.
    #[error("provider request failed: {0}")]
    Transport(String),
    /// The response carried no JSON payload.
    #[error("provider returned no JSON payload")]
    EmptyResponse,
    /// The payload did not match the expected record shape.
    #[error("provider response did not match the expected shape: {0}")]
    Decode(String),
    /// The provider answered with a non-empty error array.
    #[error("provider rejected {action}: {}", summarize(.faults))]
    Api {
        /// Action that was rejected.
        action: String,
        /// Raw error payload, kept for retry classification.
        faults: Vec<ApiFault>,
    },
}

impl ProviderApiError {
    /// Builds an API rejection for `action` from its raw faults.
    #[must_use]
    pub fn rejection(action: impl Into<String>, faults: Vec<ApiFault>) -> Self {
        Self::Api {
            action: action.into(),
            faults,
        }
    }

    /// Returns `true` when the provider refused the call because the
    /// instance has an unprocessable pending action. This is the only
    /// condition the teardown pipeline retries.
    #[must_use]
    pub fn is_pending_action(&self) -> bool {
        self.has_code(ApiFault::PENDING_ACTION)
    }

    /// Returns `true` when the addressed resource no longer exists.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.has_code(ApiFault::NOT_FOUND)
    }

    fn has_code(&self, code: &str) -> bool {
        match self {
            Self::Api { faults, .. } => faults.iter().any(|fault| fault.code == code),
            _ => false,
        }
    }
}

/// Parameters for creating a boot disk from the bootstrap stack script.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BootDiskRequest {
    /// Instance receiving the disk.
    pub instance_id: InstanceId,
    /// Stack script that seeds the filesystem.
    pub stack_script_id: u64,
    /// Display label for the disk.
    pub label: String,
    /// Size in megabytes, already resolved by the caller.
    pub size_mb: u64,
    /// Distribution image the stack script runs against.
    pub distribution_id: u64,
    /// Root password; a random one is generated when absent.
    pub root_pass: Option<String>,
    /// Optional SSH public key installed for root.
    pub root_ssh_key: Option<String>,
}

/// Parameters for creating a boot configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigRequest {
    /// Instance receiving the configuration.
    pub instance_id: InstanceId,
    /// Display label for the configuration.
    pub label: String,
    /// Kernel the configuration boots.
    pub kernel_id: u64,
    /// Ordered disk list; the first entry is the boot disk.
    pub disks: Vec<DiskId>,
}

/// Typed interface to the provider's remote API.
///
/// Every method maps to exactly one remote action, except instance
/// reads, which compose the secondary address lookup so callers always
/// receive instances with their IP addresses populated.
pub trait ProviderApi: Send + Sync {
    /// Lists the provider's regions.
    fn regions(&self) -> ApiFuture<'_, Vec<Region>>;

    /// Lists the provider's plans.
    fn plans(&self) -> ApiFuture<'_, Vec<Plan>>;

    /// Lists all instances on the account, addresses included.
    fn instances(&self) -> ApiFuture<'_, Vec<Instance>>;

    /// Fetches one instance, addresses included.
    fn instance(&self, id: InstanceId) -> ApiFuture<'_, Instance>;

    /// Creates a new instance and returns its full record.
    fn create_instance(&self, region: RegionId, plan: PlanId) -> ApiFuture<'_, Instance>;

    /// Creates the boot disk from the bootstrap stack script.
    fn create_boot_disk<'a>(&'a self, request: &'a BootDiskRequest) -> ApiFuture<'a, DiskRef>;

    /// Creates a swap disk of `size_mb` megabytes.
    fn create_swap_disk(&self, instance_id: InstanceId, size_mb: u64) -> ApiFuture<'_, DiskRef>;

    /// Creates a boot configuration binding disks to a kernel.
    fn create_config<'a>(&'a self, request: &'a ConfigRequest) -> ApiFuture<'a, ConfigRef>;

    /// Lists the disks belonging to an instance.
    fn disks(&self, instance_id: InstanceId) -> ApiFuture<'_, Vec<Disk>>;

    /// Deletes one disk.
    fn delete_disk(&self, instance_id: InstanceId, disk_id: DiskId) -> ApiFuture<'_, JobRef>;

    /// Boots an instance using its most recent configuration.
    fn boot(&self, id: InstanceId) -> ApiFuture<'_, JobRef>;

    /// Shuts an instance down.
    fn shutdown(&self, id: InstanceId) -> ApiFuture<'_, JobRef>;

    /// Deletes an instance.
    fn destroy_instance(&self, id: InstanceId) -> ApiFuture<'_, ()>;

    /// Lists the jobs still pending against an instance.
    fn pending_jobs(&self, id: InstanceId) -> ApiFuture<'_, Vec<Job>>;
}
