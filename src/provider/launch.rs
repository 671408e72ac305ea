//! Provision pipeline: bring an instance from requested to reachable.

use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::{BootDiskRequest, ConfigRequest, ProviderApi};
use crate::dns::DEFAULT_ALIAS_WEIGHT;
use crate::model::Instance;

use super::{
    BOOT_DISK_MB_PER_PLAN, DnsAlias, LaunchParams, Provider, ProviderError, RECORD_TTL,
    SWAP_MB_PER_PLAN,
};

impl<A: ProviderApi> Provider<A> {
    /// Provisions a new instance and returns it once it is reachable.
    ///
    /// The pipeline is a strict sequence: create the instance, register
    /// domain records when configured, build the boot and swap disks,
    /// attach the boot configuration, wait for the provider's job queue
    /// to drain, boot, wait again, and hold for a fixed settle interval
    /// so the remote login service comes up. Any failure after the
    /// instance exists triggers a compensating destroy; the original
    /// error is the one surfaced.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when any pipeline step fails.
    pub async fn launch_instance(
        &self,
        params: &LaunchParams,
    ) -> Result<Instance, ProviderError> {
        let instance = self
            .api
            .create_instance(params.region_id, params.plan_id)
            .await?;
        info!(instance = %instance.label, id = %instance.id, "created instance");

        match self.finish_launch(&instance).await {
            Ok(ready) => Ok(ready),
            Err(err) => {
                self.compensate(&instance, &err).await;
                Err(err)
            }
        }
    }

    async fn finish_launch(&self, instance: &Instance) -> Result<Instance, ProviderError> {
        let access_name = match &self.dns {
            Some(dns) => Some(self.register_domain(instance, dns).await?),
            None => None,
        };

        let plan_units = instance.plan_id.0;
        let boot = self
            .api
            .create_boot_disk(&BootDiskRequest {
                instance_id: instance.id,
                stack_script_id: self.stack_script_id,
                label: format!("boot-{}", Uuid::new_v4().simple()),
                size_mb: plan_units * BOOT_DISK_MB_PER_PLAN,
                distribution_id: self.distribution_id,
                root_pass: None,
                root_ssh_key: self.root_ssh_key.clone(),
            })
            .await?;
        let swap = self
            .api
            .create_swap_disk(instance.id, plan_units * SWAP_MB_PER_PLAN)
            .await?;
        self.api
            .create_config(&ConfigRequest {
                instance_id: instance.id,
                label: format!("config-{}", Uuid::new_v4().simple()),
                kernel_id: self.kernel_id,
                disks: vec![boot.id, swap.id],
            })
            .await?;

        self.wait_on(instance).await?;

        self.api.boot(instance.id).await?;
        info!(instance = %instance.label, "booting instance");
        self.wait_on(instance).await?;

        // Hold until the remote login service is reachable.
        sleep(self.settle_delay).await;

        let mut ready = self.api.instance(instance.id).await?;
        if let Some(name) = access_name {
            ready.remote_access_name = name;
        }
        info!(
            instance = %ready.label,
            address = %ready.remote_access_name,
            "instance ready"
        );
        Ok(ready)
    }

    /// Registers the instance's subdomain and the shared weighted alias,
    /// then pauses for propagation. Returns the registered subdomain.
    async fn register_domain(
        &self,
        instance: &Instance,
        dns: &DnsAlias,
    ) -> Result<String, ProviderError> {
        let address = instance
            .primary_ip()
            .ok_or(ProviderError::MissingAddress { id: instance.id })?;
        let subdomain = format!("{}.{}", instance.label, dns.parent_domain);

        dns.manager
            .create_record(&subdomain, "A", address, RECORD_TTL)
            .await?;
        dns.manager
            .create_weighted_alias(
                &dns.alias_name,
                &subdomain,
                &instance.label,
                DEFAULT_ALIAS_WEIGHT,
            )
            .await?;
        info!(instance = %instance.label, domain = %subdomain, "registered domain records");

        sleep(self.dns_propagation_delay).await;
        Ok(subdomain)
    }

    /// Destroys a partially provisioned instance after a pipeline
    /// failure. The cause is only logged; the caller re-raises it.
    async fn compensate(&self, instance: &Instance, cause: &ProviderError) {
        warn!(
            instance = %instance.label,
            error = %cause,
            "provisioning failed, destroying partially created instance"
        );
        if let Err(teardown_err) = self.api.destroy_instance(instance.id).await {
            warn!(
                instance = %instance.label,
                error = %teardown_err,
                "compensating destroy failed; instance may need manual cleanup"
            );
        }
    }
}
