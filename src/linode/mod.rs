//! Client for the provider's legacy remote API.
//!
//! The protocol is a single authenticated endpoint keyed by an action
//! name and a flat parameter mapping. Responses wrap every payload in an
//! envelope carrying a `DATA` member and an `ERRORARRAY`; a non-empty
//! error array is surfaced as [`ProviderApiError::Api`] with the raw
//! faults attached. Blank parameters are omitted from the outgoing
//! request because the endpoint rejects unknown-null fields.

use std::sync::LazyLock;
use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::api::{ApiFault, ApiFuture, BootDiskRequest, ConfigRequest, ProviderApi, ProviderApiError};
use crate::model::{
    ConfigRef, Disk, DiskId, DiskRef, Instance, InstanceId, InstanceRef, Job, JobRef, Plan, PlanId,
    Region, RegionId,
};

/// Default endpoint for the provider's legacy API.
pub const DEFAULT_API_URL: &str = "https://api.linode.com/";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("machinist/", env!("CARGO_PKG_VERSION"));

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "ERRORARRAY", default)]
    errors: Vec<ApiFault>,
    #[serde(rename = "DATA", default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct IpRecord {
    #[serde(rename = "IPADDRESS")]
    address: String,
}

/// Stateless client for the provider's legacy API.
#[derive(Clone, Debug)]
pub struct LinodeClient {
    api_key: String,
    base_url: String,
}

impl LinodeClient {
    /// Creates a client against the production endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: String::from(DEFAULT_API_URL),
        }
    }

    /// Overrides the endpoint, used for stub servers in tests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn request(
        &self,
        action: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, ProviderApiError> {
        let query = build_query(action, &self.api_key, params);

        let response = HTTP_CLIENT
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(|err| ProviderApiError::Transport(err.to_string()))?;

        let body = response
            .bytes()
            .await
            .map_err(|err| ProviderApiError::Transport(err.to_string()))?;
        if body.is_empty() {
            return Err(ProviderApiError::EmptyResponse);
        }

        let envelope: Envelope = serde_json::from_slice(&body)
            .map_err(|err| ProviderApiError::Decode(err.to_string()))?;
        if !envelope.errors.is_empty() {
            return Err(ProviderApiError::rejection(action, envelope.errors));
        }
        Ok(envelope.data)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        action: &str,
        params: &[(&str, String)],
    ) -> Result<T, ProviderApiError> {
        let data = self.request(action, params).await?;
        serde_json::from_value(data).map_err(|err| ProviderApiError::Decode(err.to_string()))
    }

    /// Fetches the addresses assigned to an instance, primary first.
    async fn addresses(&self, id: InstanceId) -> Result<Vec<String>, ProviderApiError> {
        let records: Vec<IpRecord> = self
            .fetch("linode.ip.list", &[("LinodeID", id.to_string())])
            .await?;
        Ok(records.into_iter().map(|record| record.address).collect())
    }

    /// Attaches the secondary address lookup to a bare instance record.
    async fn hydrate(&self, mut instance: Instance) -> Result<Instance, ProviderApiError> {
        instance.ip_addresses = self.addresses(instance.id).await?;
        instance.remote_access_name = instance
            .primary_ip()
            .map(str::to_owned)
            .unwrap_or_default();
        Ok(instance)
    }

    async fn fetch_instance(&self, id: InstanceId) -> Result<Instance, ProviderApiError> {
        let rows: Vec<Instance> = self
            .fetch("linode.list", &[("LinodeID", id.to_string())])
            .await?;
        let instance = rows.into_iter().next().ok_or_else(|| {
            ProviderApiError::Decode(format!("instance {id} missing from listing"))
        })?;
        self.hydrate(instance).await
    }
}

impl ProviderApi for LinodeClient {
    fn regions(&self) -> ApiFuture<'_, Vec<Region>> {
        Box::pin(self.fetch("avail.datacenters", &[]))
    }

    fn plans(&self) -> ApiFuture<'_, Vec<Plan>> {
        Box::pin(self.fetch("avail.linodeplans", &[]))
    }

    fn instances(&self) -> ApiFuture<'_, Vec<Instance>> {
        Box::pin(async move {
            let rows: Vec<Instance> = self.fetch("linode.list", &[]).await?;
            let mut hydrated = Vec::with_capacity(rows.len());
            for row in rows {
                hydrated.push(self.hydrate(row).await?);
            }
            Ok(hydrated)
        })
    }

    fn instance(&self, id: InstanceId) -> ApiFuture<'_, Instance> {
        Box::pin(self.fetch_instance(id))
    }

    fn create_instance(&self, region: RegionId, plan: PlanId) -> ApiFuture<'_, Instance> {
        Box::pin(async move {
            let created: InstanceRef = self
                .fetch(
                    "linode.create",
                    &[
                        ("DatacenterID", region.to_string()),
                        ("PlanID", plan.to_string()),
                    ],
                )
                .await?;
            self.fetch_instance(created.id).await
        })
    }

    fn create_boot_disk<'a>(&'a self, request: &'a BootDiskRequest) -> ApiFuture<'a, DiskRef> {
        Box::pin(async move {
            let root_pass = request
                .root_pass
                .clone()
                .unwrap_or_else(random_root_pass);
            self.fetch(
                "linode.disk.createfromstackscript",
                &[
                    ("LinodeID", request.instance_id.to_string()),
                    ("StackScriptID", request.stack_script_id.to_string()),
                    ("Label", request.label.clone()),
                    ("Size", request.size_mb.to_string()),
                    ("StackScriptUDFResponses", String::from("{}")),
                    ("DistributionID", request.distribution_id.to_string()),
                    ("rootPass", root_pass),
                    (
                        "rootSSHKey",
                        request.root_ssh_key.clone().unwrap_or_default(),
                    ),
                ],
            )
            .await
        })
    }

    fn create_swap_disk(&self, instance_id: InstanceId, size_mb: u64) -> ApiFuture<'_, DiskRef> {
        Box::pin(async move {
            self.fetch(
                "linode.disk.create",
                &[
                    ("LinodeID", instance_id.to_string()),
                    ("Type", String::from("swap")),
                    ("Label", String::from("swap")),
                    ("Size", size_mb.to_string()),
                ],
            )
            .await
        })
    }

    fn create_config<'a>(&'a self, request: &'a ConfigRequest) -> ApiFuture<'a, ConfigRef> {
        Box::pin(async move {
            self.fetch(
                "linode.config.create",
                &[
                    ("LinodeID", request.instance_id.to_string()),
                    ("Label", request.label.clone()),
                    ("DiskList", disk_list(&request.disks)),
                    ("KernelID", request.kernel_id.to_string()),
                ],
            )
            .await
        })
    }

    fn disks(&self, instance_id: InstanceId) -> ApiFuture<'_, Vec<Disk>> {
        Box::pin(async move {
            self.fetch("linode.disk.list", &[("LinodeID", instance_id.to_string())])
                .await
        })
    }

    fn delete_disk(&self, instance_id: InstanceId, disk_id: DiskId) -> ApiFuture<'_, JobRef> {
        Box::pin(async move {
            self.fetch(
                "linode.disk.delete",
                &[
                    ("LinodeID", instance_id.to_string()),
                    ("DiskID", disk_id.to_string()),
                ],
            )
            .await
        })
    }

    fn boot(&self, id: InstanceId) -> ApiFuture<'_, JobRef> {
        Box::pin(async move {
            self.fetch("linode.boot", &[("LinodeID", id.to_string())])
                .await
        })
    }

    fn shutdown(&self, id: InstanceId) -> ApiFuture<'_, JobRef> {
        Box::pin(async move {
            self.fetch("linode.shutdown", &[("LinodeID", id.to_string())])
                .await
        })
    }

    fn destroy_instance(&self, id: InstanceId) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.request("linode.delete", &[("LinodeID", id.to_string())])
                .await?;
            Ok(())
        })
    }

    fn pending_jobs(&self, id: InstanceId) -> ApiFuture<'_, Vec<Job>> {
        Box::pin(async move {
            self.fetch(
                "linode.job.list",
                &[
                    ("LinodeID", id.to_string()),
                    ("pendingOnly", String::from("1")),
                ],
            )
            .await
        })
    }
}

/// Assembles the outgoing query, dropping blank parameters.
fn build_query(action: &str, api_key: &str, params: &[(&str, String)]) -> Vec<(String, String)> {
    let mut query: Vec<(String, String)> = params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| ((*key).to_owned(), value.clone()))
        .collect();
    query.push((String::from("api_key"), api_key.to_owned()));
    query.push((String::from("api_action"), action.to_owned()));
    query
}

/// Renders an ordered disk list as the comma-separated form the
/// provider expects; the first entry is the boot disk.
fn disk_list(disks: &[DiskId]) -> String {
    let parts: Vec<String> = disks.iter().map(ToString::to_string).collect();
    parts.join(",")
}

/// Generates a root password with guaranteed character-class coverage.
fn random_root_pass() -> String {
    const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
    const DIGITS: &[u8] = b"0123456789";
    const SYMBOLS: &[u8] = b"!@#$%^&*";

    let mut rng = rand::thread_rng();
    let mut password: Vec<char> = Vec::with_capacity(12);
    for set in [UPPER, LOWER, DIGITS, SYMBOLS] {
        for _ in 0..3 {
            let index = rng.gen_range(0..set.len());
            password.push(char::from(set[index]));
        }
    }
    password.shuffle(&mut rng);
    password.into_iter().collect()
}
