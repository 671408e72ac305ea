//! Configuration loading via `ortho-config`.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::dns::DomainManager;
use crate::provider::DnsAlias;

/// Distribution image used for stack-script boot disks when not
/// overridden.
pub const DEFAULT_DISTRIBUTION_ID: u64 = 124;

/// Kernel used for boot configurations when not overridden.
pub const DEFAULT_KERNEL_ID: u64 = 199;

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

/// Metadata for a configuration field, used to generate actionable error
/// messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
    section: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
        section: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
            section,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to [{}] in machinist.toml",
            self.description, self.env_var, self.toml_key, self.section
        ))
    }
}

fn require_str(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(metadata.missing());
    }
    Ok(())
}

/// Provider credentials and provisioning parameters, derived from
/// environment variables and configuration files.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "LINODE")]
pub struct ProviderConfig {
    /// API key used to authenticate every provider call.
    pub api_key: String,
    /// Stack script that seeds new boot disks. This value is required.
    pub stack_script_id: Option<u64>,
    /// Distribution image for stack-script disks.
    pub distribution_id: Option<u64>,
    /// Kernel bound into boot configurations.
    pub kernel_id: Option<u64>,
    /// SSH public key installed for root on new instances.
    pub root_ssh_key: Option<String>,
}

impl ProviderConfig {
    /// Loads configuration without attempting to parse CLI arguments.
    /// Values merge defaults, configuration files, and environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("machinist")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is
    /// empty or missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_str(
            &self.api_key,
            &FieldMetadata::new("provider API key", "LINODE_API_KEY", "api_key", "provider"),
        )?;
        if self.stack_script_id.is_none() {
            return Err(FieldMetadata::new(
                "bootstrap stack script id",
                "LINODE_STACK_SCRIPT_ID",
                "stack_script_id",
                "provider",
            )
            .missing());
        }
        Ok(())
    }

    /// Returns the stack script id; zero only when validation was
    /// skipped.
    #[must_use]
    pub fn resolved_stack_script_id(&self) -> u64 {
        self.stack_script_id.unwrap_or_default()
    }

    /// Returns the distribution image, falling back to the default.
    #[must_use]
    pub fn resolved_distribution_id(&self) -> u64 {
        self.distribution_id.unwrap_or(DEFAULT_DISTRIBUTION_ID)
    }

    /// Returns the kernel, falling back to the default.
    #[must_use]
    pub fn resolved_kernel_id(&self) -> u64 {
        self.kernel_id.unwrap_or(DEFAULT_KERNEL_ID)
    }
}

/// Settings for the external cluster-management tool.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "MACHINIST_ENV")]
pub struct EnvConfig {
    /// Path to the cluster tool binary.
    #[ortho_config(default = "juju".to_owned())]
    pub bin: String,
    /// Name of the environment machines are registered with.
    pub name: String,
}

impl EnvConfig {
    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("machinist")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is
    /// empty or missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_str(
            &self.bin,
            &FieldMetadata::new("cluster tool binary", "MACHINIST_ENV_BIN", "bin", "env"),
        )?;
        require_str(
            &self.name,
            &FieldMetadata::new("environment name", "MACHINIST_ENV_NAME", "name", "env"),
        )
    }
}

/// Optional domain-record service settings. Leaving the endpoint unset
/// disables the domain-alias step entirely.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "MACHINIST_DNS")]
pub struct DnsConfig {
    /// Endpoint accepting domain change batches.
    pub api_url: Option<String>,
    /// Basic-auth username.
    pub username: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
    /// Parent domain new subdomains are registered under.
    pub parent_domain: Option<String>,
    /// Shared alias name balancing across registered instances.
    pub alias_name: Option<String>,
}

impl DnsConfig {
    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("machinist")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Builds the domain-alias step configuration.
    ///
    /// Returns `Ok(None)` when no endpoint is configured. A configured
    /// endpoint makes the remaining fields mandatory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the endpoint is set
    /// but credentials or domain names are missing.
    pub fn to_alias(&self) -> Result<Option<DnsAlias>, ConfigError> {
        let Some(api_url) = self.api_url.as_deref().filter(|url| !url.trim().is_empty())
        else {
            return Ok(None);
        };

        let field = |value: &Option<String>, metadata: FieldMetadata| {
            value
                .as_deref()
                .filter(|inner| !inner.trim().is_empty())
                .map(str::to_owned)
                .ok_or_else(|| metadata.missing())
        };

        let username = field(
            &self.username,
            FieldMetadata::new("domain username", "MACHINIST_DNS_USERNAME", "username", "dns"),
        )?;
        let password = field(
            &self.password,
            FieldMetadata::new("domain password", "MACHINIST_DNS_PASSWORD", "password", "dns"),
        )?;
        let parent_domain = field(
            &self.parent_domain,
            FieldMetadata::new(
                "parent domain",
                "MACHINIST_DNS_PARENT_DOMAIN",
                "parent_domain",
                "dns",
            ),
        )?;
        let alias_name = field(
            &self.alias_name,
            FieldMetadata::new(
                "alias name",
                "MACHINIST_DNS_ALIAS_NAME",
                "alias_name",
                "dns",
            ),
        )?;

        Ok(Some(DnsAlias {
            manager: DomainManager::new(api_url, username, password),
            parent_domain,
            alias_name,
        }))
    }
}
