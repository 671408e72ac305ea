//! Core library for the machinist provisioning tool.
//!
//! The crate orchestrates virtual-machine lifecycles on a provider with
//! an asynchronous job queue, on behalf of an external
//! cluster-management tool: resolve plan/region constraints, drive the
//! ordered provision pipeline (create → disks → config → wait → boot →
//! wait → settle) and its teardown mirror, and run many such pipelines
//! in parallel under a bounded-concurrency operation runner.

pub mod api;
pub mod commands;
pub mod config;
pub mod constraints;
pub mod dns;
pub mod env;
pub mod linode;
pub mod model;
pub mod ops;
pub mod provider;
pub mod runner;
#[cfg(test)]
pub mod test_helpers;

pub use api::{ApiFault, BootDiskRequest, ConfigRequest, ProviderApi, ProviderApiError};
pub use commands::{CommandError, Commands, PrecheckError};
pub use config::{ConfigError, DnsConfig, EnvConfig, ProviderConfig};
pub use constraints::{Catalog, ConstraintError};
pub use dns::{DnsError, DomainManager};
pub use env::{CliEnv, ClusterEnv, CommandRunner, EnvStatus, MachineInfo, ProcessCommandRunner};
pub use linode::LinodeClient;
pub use model::{
    Disk, DiskKind, Instance, InstanceId, InstanceStatus, Job, Plan, PlanId, Region, RegionId,
};
pub use ops::{
    DestroyOptions, MachineAdd, MachineDestroy, MachineRegister, OpError, OpKind, OpOutput,
    Operation,
};
pub use provider::{DnsAlias, LaunchParams, Provider, ProviderError};
pub use runner::{OpReport, Runner};
