//! Teardown pipeline: shut down, strip disks, delete.

use tokio::time::sleep;
use tracing::{debug, info};

use crate::api::ProviderApi;
use crate::model::InstanceId;

use super::{Provider, ProviderError};

impl<A: ProviderApi> Provider<A> {
    /// Tears an instance down and deletes it provider-side.
    ///
    /// Mirrors the provision pipeline: shut the instance down, wait for
    /// pending jobs, delete every disk it owns, wait again, then delete
    /// the instance itself. The final delete tolerates the provider's
    /// unprocessable-pending-action condition by sleeping a fixed
    /// interval and retrying; every other rejection is fatal. Resources
    /// the provider reports as already gone are treated as deleted, so
    /// a failed teardown can safely be re-attempted.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when a step fails for any reason other
    /// than the retried pending-action condition.
    pub async fn terminate_instance(&self, id: InstanceId) -> Result<(), ProviderError> {
        let instance = self.api.instance(id).await?;
        info!(instance = %instance.label, "shutting down instance");

        self.api.shutdown(instance.id).await?;
        self.wait_on(&instance).await?;

        for disk in self.api.disks(instance.id).await? {
            match self.api.delete_disk(instance.id, disk.id).await {
                Ok(_) => debug!(instance = %instance.label, disk = %disk.id, "deleted disk"),
                Err(err) if err.is_not_found() => {
                    debug!(instance = %instance.label, disk = %disk.id, "disk already gone");
                }
                Err(err) => return Err(err.into()),
            }
        }
        self.wait_on(&instance).await?;

        self.delete_instance(&instance.label, instance.id).await
    }

    async fn delete_instance(&self, label: &str, id: InstanceId) -> Result<(), ProviderError> {
        loop {
            match self.api.destroy_instance(id).await {
                Ok(()) => {
                    info!(instance = %label, "deleted instance");
                    return Ok(());
                }
                Err(err) if err.is_pending_action() => {
                    debug!(
                        instance = %label,
                        "waiting for pending instance action to complete"
                    );
                    sleep(self.delete_retry_delay).await;
                }
                Err(err) if err.is_not_found() => {
                    debug!(instance = %label, "instance already gone");
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
