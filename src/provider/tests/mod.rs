//! Behavioural tests for the lifecycle pipelines.


use std::time::Duration;

use crate::test_helpers::{StubApi, provider_config};

use super::Provider;

/// Builds a provider over the stub with all delays shrunk for tests.
fn fast_provider(api: &StubApi) -> Provider<StubApi> {
    Provider::new(api.clone(), &provider_config())
        .expect("test config should validate")
        .with_job_poll_interval(Duration::from_millis(1))
        .with_settle_delay(Duration::from_millis(1))
        .with_dns_propagation_delay(Duration::from_millis(1))
        .with_delete_retry_delay(Duration::from_millis(1))
}
