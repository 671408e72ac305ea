//! Pending-job wait monitor.
//!
//! The provider offers no push notification for job completion, so the
//! only way to know an instance is safe to mutate further is to poll its
//! pending-job list. The loop is bounded: an instance that never drains
//! its queue would otherwise hang the whole runner.

use tokio::time::sleep;
use tracing::debug;

use crate::api::ProviderApi;
use crate::model::Instance;

use super::{Provider, ProviderError};

impl<A: ProviderApi> Provider<A> {
    /// Blocks until the instance's pending-job list is empty.
    ///
    /// Polls immediately, then sleeps a fixed interval between re-polls.
    /// Every iteration's pending count is logged at debug level.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::WaitTimeout`] once the attempt bound is
    /// exceeded, and [`ProviderError::Api`] when a poll itself fails.
    pub(crate) async fn wait_on(&self, instance: &Instance) -> Result<(), ProviderError> {
        let mut attempts = 0u32;
        loop {
            let pending = self.api.pending_jobs(instance.id).await?;
            debug!(
                instance = %instance.label,
                pending = pending.len(),
                attempts,
                "polled pending jobs"
            );
            if pending.is_empty() {
                debug!(instance = %instance.label, "instance ready");
                return Ok(());
            }
            if attempts >= self.job_poll_attempts {
                return Err(ProviderError::WaitTimeout {
                    label: instance.label.clone(),
                    pending: pending.len(),
                    attempts,
                });
            }
            attempts += 1;
            sleep(self.job_poll_interval).await;
        }
    }
}
