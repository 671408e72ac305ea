//! Shared scripted doubles for behavioural tests.
//!
//! [`StubApi`] is a stateful in-memory provider: it records every call,
//! replays scripted failures and pending-job counts, and otherwise
//! behaves like a well-behaved backend so whole pipelines can run
//! against it. [`StubEnv`] plays the cluster tool.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::api::{
    ApiFault, ApiFuture, BootDiskRequest, ConfigRequest, ProviderApi, ProviderApiError,
};
use crate::config::ProviderConfig;
use crate::env::{ClusterEnv, EnvError, EnvStatus};
use crate::model::{
    ConfigId, ConfigRef, Disk, DiskId, DiskKind, DiskRef, Instance, InstanceId, InstanceStatus,
    Job, JobId, JobRef, Plan, PlanId, Region, RegionId,
};

/// Builds a valid provider configuration for tests.
pub fn provider_config() -> ProviderConfig {
    ProviderConfig {
        api_key: String::from("test-key"),
        stack_script_id: Some(10_097),
        distribution_id: None,
        kernel_id: None,
        root_ssh_key: None,
    }
}

/// Builds a plan record.
pub fn plan(id: u64, label: &str, ram: u64) -> Plan {
    Plan {
        id: PlanId(id),
        label: label.to_owned(),
        ram,
        disk: 24,
        xfer: 2000,
        cores: 1,
        price: 10.0,
        hourly: 0.015,
    }
}

/// Builds a region record.
pub fn region(id: u64, abbr: &str) -> Region {
    Region {
        id: RegionId(id),
        location: format!("{abbr}, somewhere"),
        abbr: abbr.to_owned(),
    }
}

/// Builds an API rejection with a single fault carrying `code`.
pub fn api_rejection(action: &str, code: &str) -> ProviderApiError {
    ProviderApiError::rejection(
        action,
        vec![ApiFault {
            code: code.to_owned(),
            message: format!("{action} rejected"),
        }],
    )
}

#[derive(Default)]
pub struct StubState {
    pub plans: Vec<Plan>,
    pub regions: Vec<Region>,
    pub instances: Vec<Instance>,
    pub disks: Vec<Disk>,
    pub configs: Vec<(ConfigId, ConfigRequest)>,
    pub pending_polls: HashMap<InstanceId, VecDeque<usize>>,
    pub failures: HashMap<String, VecDeque<ProviderApiError>>,
    pub calls: Vec<String>,
    next_id: u64,
}

impl StubState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        9000 + self.next_id
    }

    fn record(&mut self, call: impl Into<String>) {
        self.calls.push(call.into());
    }

    fn take_failure(&mut self, action: &str) -> Result<(), ProviderApiError> {
        if let Some(queue) = self.failures.get_mut(action)
            && let Some(err) = queue.pop_front()
        {
            return Err(err);
        }
        Ok(())
    }
}

/// Scripted in-memory provider API.
#[derive(Clone, Default)]
pub struct StubApi {
    state: Arc<Mutex<StubState>>,
}

impl StubApi {
    /// Creates a stub with the default plan and region present.
    pub fn with_default_catalog() -> Self {
        let stub = Self::default();
        {
            let mut state = stub.lock();
            state.plans = vec![plan(1, "Linode 1024", 1024), plan(2, "Linode 2048", 2048)];
            state.regions = vec![region(2, "dallas"), region(3, "fremont")];
        }
        stub
    }

    /// Locks the stub state for inspection or scripting.
    pub fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().expect("stub state poisoned")
    }

    /// Queues `err` as the response to the next `action` call.
    pub fn fail_next(&self, action: &str, err: ProviderApiError) {
        self.lock()
            .failures
            .entry(action.to_owned())
            .or_default()
            .push_back(err);
    }

    /// Scripts the pending-job counts returned for an instance, one per
    /// poll. Exhausted scripts report zero pending jobs.
    pub fn script_pending(&self, id: InstanceId, counts: &[usize]) {
        self.lock()
            .pending_polls
            .insert(id, counts.iter().copied().collect());
    }

    /// Returns the recorded calls.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Counts recorded calls beginning with `prefix`.
    pub fn call_count(&self, prefix: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    /// Returns the instance with the given id, when it still exists.
    pub fn instance_named(&self, id: InstanceId) -> Option<Instance> {
        self.lock()
            .instances
            .iter()
            .find(|instance| instance.id == id)
            .cloned()
    }

    /// Returns the disks currently attached to an instance.
    pub fn disks_for(&self, id: InstanceId) -> Vec<Disk> {
        self.lock()
            .disks
            .iter()
            .filter(|disk| disk.instance_id == id)
            .cloned()
            .collect()
    }

    /// Returns the recorded boot configurations for an instance.
    pub fn configs_for(&self, id: InstanceId) -> Vec<ConfigRequest> {
        self.lock()
            .configs
            .iter()
            .filter(|(_, request)| request.instance_id == id)
            .map(|(_, request)| request.clone())
            .collect()
    }

    fn pending_jobs_now(&self, id: InstanceId) -> Vec<Job> {
        let mut state = self.lock();
        let count = state
            .pending_polls
            .get_mut(&id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(0);
        (0..count)
            .map(|n| Job {
                id: JobId(n as u64 + 1),
                instance_id: id,
                action: String::from("linode.create"),
                label: String::from("pending job"),
                entered_at: Some(String::from("2014-01-01 10:00:00.0")),
                started_at: None,
                finished_at: None,
                duration: None,
                message: None,
                succeeded: None,
            })
            .collect()
    }
}

impl ProviderApi for StubApi {
    fn regions(&self) -> ApiFuture<'_, Vec<Region>> {
        let stub = self.clone();
        Box::pin(async move { Ok(stub.lock().regions.clone()) })
    }

    fn plans(&self) -> ApiFuture<'_, Vec<Plan>> {
        let stub = self.clone();
        Box::pin(async move { Ok(stub.lock().plans.clone()) })
    }

    fn instances(&self) -> ApiFuture<'_, Vec<Instance>> {
        let stub = self.clone();
        Box::pin(async move {
            let mut state = stub.lock();
            state.record("instances");
            state.take_failure("instances")?;
            Ok(state.instances.clone())
        })
    }

    fn instance(&self, id: InstanceId) -> ApiFuture<'_, Instance> {
        let stub = self.clone();
        Box::pin(async move {
            let mut state = stub.lock();
            state.record(format!("instance:{id}"));
            state.take_failure("instance")?;
            state
                .instances
                .iter()
                .find(|instance| instance.id == id)
                .cloned()
                .ok_or_else(|| {
                    ProviderApiError::Decode(format!("instance {id} missing from listing"))
                })
        })
    }

    fn create_instance(&self, region: RegionId, plan: PlanId) -> ApiFuture<'_, Instance> {
        let stub = self.clone();
        Box::pin(async move {
            let mut state = stub.lock();
            state.record("create_instance");
            state.take_failure("create_instance")?;
            let id = state.next_id();
            let ram = state
                .plans
                .iter()
                .find(|entry| entry.id == plan)
                .map_or(1024, |entry| entry.ram);
            let address = format!("192.0.2.{}", id % 250);
            let instance = Instance {
                id: InstanceId(id),
                label: format!("linode{id}"),
                total_ram: ram,
                total_hd: 24,
                total_xfer: 2000,
                status: InstanceStatus::BrandNew,
                region_id: region,
                plan_id: plan,
                ip_addresses: vec![address.clone()],
                remote_access_name: address,
            };
            state.instances.push(instance.clone());
            Ok(instance)
        })
    }

    fn create_boot_disk<'a>(&'a self, request: &'a BootDiskRequest) -> ApiFuture<'a, DiskRef> {
        let stub = self.clone();
        let request = request.clone();
        Box::pin(async move {
            let mut state = stub.lock();
            state.record(format!("create_boot_disk:{}", request.instance_id));
            state.take_failure("create_boot_disk")?;
            let id = state.next_id();
            state.disks.push(Disk {
                id: DiskId(id),
                instance_id: request.instance_id,
                label: request.label.clone(),
                kind: DiskKind::Ext4,
                size: request.size_mb,
                read_only: false,
                created_at: None,
                updated_at: None,
            });
            Ok(DiskRef {
                id: DiskId(id),
                job_id: JobId(id),
            })
        })
    }

    fn create_swap_disk(&self, instance_id: InstanceId, size_mb: u64) -> ApiFuture<'_, DiskRef> {
        let stub = self.clone();
        Box::pin(async move {
            let mut state = stub.lock();
            state.record(format!("create_swap_disk:{instance_id}"));
            state.take_failure("create_swap_disk")?;
            let id = state.next_id();
            state.disks.push(Disk {
                id: DiskId(id),
                instance_id,
                label: String::from("swap"),
                kind: DiskKind::Swap,
                size: size_mb,
                read_only: false,
                created_at: None,
                updated_at: None,
            });
            Ok(DiskRef {
                id: DiskId(id),
                job_id: JobId(id),
            })
        })
    }

    fn create_config<'a>(&'a self, request: &'a ConfigRequest) -> ApiFuture<'a, ConfigRef> {
        let stub = self.clone();
        let request = request.clone();
        Box::pin(async move {
            let mut state = stub.lock();
            state.record(format!("create_config:{}", request.instance_id));
            state.take_failure("create_config")?;
            let id = state.next_id();
            state.configs.push((ConfigId(id), request));
            Ok(ConfigRef { id: ConfigId(id) })
        })
    }

    fn disks(&self, instance_id: InstanceId) -> ApiFuture<'_, Vec<Disk>> {
        let stub = self.clone();
        Box::pin(async move {
            let mut state = stub.lock();
            state.record(format!("disks:{instance_id}"));
            state.take_failure("disks")?;
            Ok(state
                .disks
                .iter()
                .filter(|disk| disk.instance_id == instance_id)
                .cloned()
                .collect())
        })
    }

    fn delete_disk(&self, instance_id: InstanceId, disk_id: DiskId) -> ApiFuture<'_, JobRef> {
        let stub = self.clone();
        Box::pin(async move {
            let mut state = stub.lock();
            state.record(format!("delete_disk:{instance_id}:{disk_id}"));
            state.take_failure("delete_disk")?;
            state.disks.retain(|disk| disk.id != disk_id);
            let id = state.next_id();
            Ok(JobRef { job_id: JobId(id) })
        })
    }

    fn boot(&self, id: InstanceId) -> ApiFuture<'_, JobRef> {
        let stub = self.clone();
        Box::pin(async move {
            let mut state = stub.lock();
            state.record(format!("boot:{id}"));
            state.take_failure("boot")?;
            if let Some(instance) = state.instances.iter_mut().find(|entry| entry.id == id) {
                instance.status = InstanceStatus::Running;
            }
            let job = state.next_id();
            Ok(JobRef { job_id: JobId(job) })
        })
    }

    fn shutdown(&self, id: InstanceId) -> ApiFuture<'_, JobRef> {
        let stub = self.clone();
        Box::pin(async move {
            let mut state = stub.lock();
            state.record(format!("shutdown:{id}"));
            state.take_failure("shutdown")?;
            if let Some(instance) = state.instances.iter_mut().find(|entry| entry.id == id) {
                instance.status = InstanceStatus::PoweredOff;
            }
            let job = state.next_id();
            Ok(JobRef { job_id: JobId(job) })
        })
    }

    fn destroy_instance(&self, id: InstanceId) -> ApiFuture<'_, ()> {
        let stub = self.clone();
        Box::pin(async move {
            let mut state = stub.lock();
            state.record(format!("destroy_instance:{id}"));
            state.take_failure("destroy_instance")?;
            state.instances.retain(|instance| instance.id != id);
            state.disks.retain(|disk| disk.instance_id != id);
            Ok(())
        })
    }

    fn pending_jobs(&self, id: InstanceId) -> ApiFuture<'_, Vec<Job>> {
        let stub = self.clone();
        Box::pin(async move {
            {
                let mut state = stub.lock();
                state.record(format!("pending_jobs:{id}"));
                state.take_failure("pending_jobs")?;
            }
            Ok(stub.pending_jobs_now(id))
        })
    }
}

#[derive(Default)]
pub struct EnvState {
    pub running: bool,
    pub next_machine: u64,
    pub added: Vec<String>,
    pub terminated: Vec<String>,
    pub bootstrapped: Vec<String>,
    pub destroyed: bool,
    pub status: EnvStatus,
    pub fail_add: Option<EnvError>,
    pub fail_bootstrap: Option<EnvError>,
}

/// Scripted in-memory cluster environment.
#[derive(Clone, Default)]
pub struct StubEnv {
    state: Arc<Mutex<EnvState>>,
}

impl StubEnv {
    /// Creates a stub reporting a bootstrapped environment.
    pub fn running() -> Self {
        let stub = Self::default();
        stub.lock().running = true;
        stub
    }

    /// Locks the stub state for inspection or scripting.
    pub fn lock(&self) -> MutexGuard<'_, EnvState> {
        self.state.lock().expect("env state poisoned")
    }
}

impl ClusterEnv for StubEnv {
    fn add_machine(&self, ssh_target: &str) -> Result<String, EnvError> {
        let mut state = self.lock();
        if let Some(err) = state.fail_add.take() {
            return Err(err);
        }
        state.next_machine += 1;
        state.added.push(ssh_target.to_owned());
        Ok(state.next_machine.to_string())
    }

    fn terminate_machines(&self, machine_ids: &[String]) -> Result<(), EnvError> {
        self.lock().terminated.extend_from_slice(machine_ids);
        Ok(())
    }

    fn status(&self) -> Result<EnvStatus, EnvError> {
        Ok(self.lock().status.clone())
    }

    fn is_running(&self) -> Result<bool, EnvError> {
        Ok(self.lock().running)
    }

    fn bootstrap(&self, host: &str) -> Result<(), EnvError> {
        let mut state = self.lock();
        if let Some(err) = state.fail_bootstrap.take() {
            return Err(err);
        }
        state.bootstrapped.push(host.to_owned());
        state.running = true;
        Ok(())
    }

    fn destroy_environment(&self) -> Result<(), EnvError> {
        let mut state = self.lock();
        state.destroyed = true;
        state.running = false;
        Ok(())
    }
}
