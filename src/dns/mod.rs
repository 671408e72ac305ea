//! Domain record management for registered instance names.
//!
//! The manager talks to a change-batch endpoint: every call posts a JSON
//! body containing a list of `create` changes and must come back with an
//! HTTP success status. Both operations are fire-and-forget creates; the
//! caller is responsible for waiting out propagation.

use serde_json::json;
use thiserror::Error;

/// Weight assigned to newly registered aliases unless the caller picks
/// another.
pub const DEFAULT_ALIAS_WEIGHT: u32 = 10;

/// Errors raised by the domain manager.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DnsError {
    /// The request never produced a response.
    #[error("domain request failed: {0}")]
    Transport(String),
    /// The endpoint answered with a non-success status.
    #[error("domain change for '{name}' rejected with status {status}")]
    Rejected {
        /// Record name the change was for.
        name: String,
        /// HTTP status code returned.
        status: u16,
    },
}

/// Client for the external domain-record service.
#[derive(Clone, Debug)]
pub struct DomainManager {
    api_url: String,
    username: String,
    password: String,
}

impl DomainManager {
    /// Creates a manager for the given endpoint and credentials.
    #[must_use]
    pub fn new(
        api_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    async fn submit(&self, name: &str, payload: serde_json::Value) -> Result<(), DnsError> {
        let response = reqwest::Client::new()
            .post(&self.api_url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&payload)
            .send()
            .await
            .map_err(|err| DnsError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DnsError::Rejected {
                name: name.to_owned(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Creates a plain record, typically an A record for an instance.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError`] when the endpoint is unreachable or rejects
    /// the change.
    pub async fn create_record(
        &self,
        name: &str,
        record_type: &str,
        data: &str,
        ttl: u32,
    ) -> Result<(), DnsError> {
        self.submit(name, record_change(name, record_type, data, ttl))
            .await
    }

    /// Creates a weighted alias under a shared parent name.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError`] when the endpoint is unreachable or rejects
    /// the change.
    pub async fn create_weighted_alias(
        &self,
        name: &str,
        target: &str,
        set_name: &str,
        weight: u32,
    ) -> Result<(), DnsError> {
        self.submit(name, alias_change(name, target, set_name, weight))
            .await
    }
}

fn record_change(name: &str, record_type: &str, data: &str, ttl: u32) -> serde_json::Value {
    json!({
        "changes": [["create", {
            "name": name,
            "type": record_type,
            "data": data,
            "ttl": ttl,
        }]]
    })
}

fn alias_change(name: &str, target: &str, set_name: &str, weight: u32) -> serde_json::Value {
    json!({
        "changes": [["create", {
            "name": name,
            "type": "A",
            "alias_target": target,
            "check_target_health": false,
            "policy": "weighted",
            "set": set_name,
            "weight": weight,
        }]]
    })
}
