//! Typed records for the provider's data model.
//!
//! The legacy remote API reports records as flat JSON objects with
//! upper-case field names and a handful of loosely typed encodings
//! (`""` standing in for null, `0`/`1` standing in for booleans). The
//! types here perform the validated mapping once, at the wire boundary,
//! so the rest of the crate never touches raw dictionaries.

use std::fmt;

use serde::{Deserialize, Deserializer};

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(
    /// Provider identifier for a virtual machine instance.
    InstanceId
);
id_newtype!(
    /// Provider identifier for a disk.
    DiskId
);
id_newtype!(
    /// Provider identifier for a boot configuration.
    ConfigId
);
id_newtype!(
    /// Provider identifier for an asynchronous job.
    JobId
);
id_newtype!(
    /// Provider identifier for a plan (size tier).
    PlanId
);
id_newtype!(
    /// Provider identifier for a region.
    RegionId
);

/// Lifecycle status reported by the provider for an instance.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InstanceStatus {
    /// The provider is still assembling the instance.
    BeingCreated,
    /// Created but never booted.
    BrandNew,
    /// Booted and running.
    Running,
    /// Shut down.
    PoweredOff,
    /// A status code this crate does not recognise.
    Unknown(i64),
}

impl InstanceStatus {
    /// Maps the provider's numeric status code to a variant.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            -1 => Self::BeingCreated,
            0 => Self::BrandNew,
            1 => Self::Running,
            2 => Self::PoweredOff,
            other => Self::Unknown(other),
        }
    }

    /// Returns `true` when the provider reports the instance as running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeingCreated => write!(f, "being created"),
            Self::BrandNew => write!(f, "brand new"),
            Self::Running => write!(f, "running"),
            Self::PoweredOff => write!(f, "powered off"),
            Self::Unknown(code) => write!(f, "unknown ({code})"),
        }
    }
}

impl<'de> Deserialize<'de> for InstanceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        Ok(Self::from_code(code))
    }
}

/// A provider-managed virtual machine.
///
/// `ip_addresses` and `remote_access_name` are not part of the provider's
/// instance record; the client fills them from a secondary address lookup
/// and the lifecycle pipeline may later swap the access name for a
/// registered domain.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Instance {
    /// Provider identifier.
    #[serde(rename = "LINODEID")]
    pub id: InstanceId,
    /// Display label assigned by the provider.
    #[serde(rename = "LABEL")]
    pub label: String,
    /// Total RAM in megabytes.
    #[serde(rename = "TOTALRAM")]
    pub total_ram: u64,
    /// Total disk in gigabytes.
    #[serde(rename = "TOTALHD")]
    pub total_hd: u64,
    /// Total monthly transfer in gigabytes.
    #[serde(rename = "TOTALXFER")]
    pub total_xfer: u64,
    /// Lifecycle status reported by the provider.
    #[serde(rename = "STATUS")]
    pub status: InstanceStatus,
    /// Region the instance lives in.
    #[serde(rename = "DATACENTERID")]
    pub region_id: RegionId,
    /// Plan the instance was created from.
    #[serde(rename = "PLANID")]
    pub plan_id: PlanId,
    /// Addresses assigned to the instance, primary first.
    #[serde(skip)]
    pub ip_addresses: Vec<String>,
    /// Name callers use to reach the instance: the primary IP, or a
    /// registered domain once one exists.
    #[serde(skip)]
    pub remote_access_name: String,
}

impl Instance {
    /// Returns the primary IP address, when the provider assigned one.
    #[must_use]
    pub fn primary_ip(&self) -> Option<&str> {
        self.ip_addresses.first().map(String::as_str)
    }
}

/// Kind of disk as reported by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DiskKind {
    /// Standard data filesystem.
    Ext4,
    /// Swap space.
    Swap,
    /// Raw, unformatted disk.
    Raw,
    /// A type string this crate does not recognise.
    Other(String),
}

impl DiskKind {
    /// Returns `true` for swap disks.
    #[must_use]
    pub const fn is_swap(&self) -> bool {
        matches!(self, Self::Swap)
    }
}

impl<'de> Deserialize<'de> for DiskKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_ascii_lowercase().as_str() {
            "ext4" | "ext3" => Self::Ext4,
            "swap" => Self::Swap,
            "raw" => Self::Raw,
            _ => Self::Other(raw),
        })
    }
}

/// A disk belonging to exactly one instance.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Disk {
    /// Provider identifier.
    #[serde(rename = "DISKID")]
    pub id: DiskId,
    /// Owning instance.
    #[serde(rename = "LINODEID")]
    pub instance_id: InstanceId,
    /// Display label.
    #[serde(rename = "LABEL")]
    pub label: String,
    /// Disk kind (data vs swap).
    #[serde(rename = "TYPE")]
    pub kind: DiskKind,
    /// Size in megabytes.
    #[serde(rename = "SIZE")]
    pub size: u64,
    /// Whether the disk is mounted read-only.
    #[serde(rename = "ISREADONLY", default, deserialize_with = "flag")]
    pub read_only: bool,
    /// Creation timestamp, verbatim from the provider.
    #[serde(rename = "CREATE_DT", default, deserialize_with = "empty_as_none")]
    pub created_at: Option<String>,
    /// Last-update timestamp, verbatim from the provider.
    #[serde(rename = "UPDATE_DT", default, deserialize_with = "empty_as_none")]
    pub updated_at: Option<String>,
}

/// One asynchronous provider-side action.
///
/// Jobs are only ever queried; the provider creates them as a side effect
/// of mutating calls. A job with no finish timestamp is still pending and
/// gates dependent mutations on its instance.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Job {
    /// Provider identifier.
    #[serde(rename = "JOBID")]
    pub id: JobId,
    /// Instance the job acts on.
    #[serde(rename = "LINODEID")]
    pub instance_id: InstanceId,
    /// Action kind, for example `linode.boot`.
    #[serde(rename = "ACTION")]
    pub action: String,
    /// Display label.
    #[serde(rename = "LABEL", default)]
    pub label: String,
    /// When the job entered the queue.
    #[serde(rename = "ENTERED_DT", default, deserialize_with = "empty_as_none")]
    pub entered_at: Option<String>,
    /// When the host started processing the job.
    #[serde(rename = "HOST_START_DT", default, deserialize_with = "empty_as_none")]
    pub started_at: Option<String>,
    /// When the host finished the job; absent while pending.
    #[serde(rename = "HOST_FINISH_DT", default, deserialize_with = "empty_as_none")]
    pub finished_at: Option<String>,
    /// Processing duration in seconds, once finished.
    #[serde(rename = "DURATION", default, deserialize_with = "opt_u64")]
    pub duration: Option<u64>,
    /// Host message, usually only set on failure.
    #[serde(rename = "HOST_MESSAGE", default, deserialize_with = "empty_as_none")]
    pub message: Option<String>,
    /// Success indicator, absent while pending.
    #[serde(rename = "HOST_SUCCESS", default, deserialize_with = "opt_flag")]
    pub succeeded: Option<bool>,
}

impl Job {
    /// Returns `true` while the host has not finished the job.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.finished_at.is_none()
    }
}

/// A size tier offered by the provider. Reference data, immutable once
/// loaded.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Plan {
    /// Provider identifier.
    #[serde(rename = "PLANID")]
    pub id: PlanId,
    /// Display label, for example `Linode 1024`.
    #[serde(rename = "LABEL")]
    pub label: String,
    /// RAM in megabytes.
    #[serde(rename = "RAM")]
    pub ram: u64,
    /// Disk in gigabytes.
    #[serde(rename = "DISK")]
    pub disk: u64,
    /// Monthly transfer in gigabytes.
    #[serde(rename = "XFER")]
    pub xfer: u64,
    /// CPU cores.
    #[serde(rename = "CORES", default)]
    pub cores: u64,
    /// Monthly price in dollars.
    #[serde(rename = "PRICE", default)]
    pub price: f64,
    /// Hourly price in dollars.
    #[serde(rename = "HOURLY", default)]
    pub hourly: f64,
}

/// A region offered by the provider. Reference data, immutable once
/// loaded.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Region {
    /// Provider identifier.
    #[serde(rename = "DATACENTERID")]
    pub id: RegionId,
    /// Human-readable location, for example `Dallas, TX, USA`.
    #[serde(rename = "LOCATION")]
    pub location: String,
    /// Short abbreviation used in constraints, for example `dallas`.
    #[serde(rename = "ABBR")]
    pub abbr: String,
}

/// Reference to a freshly created instance. Creation responses use
/// mixed-case field names, unlike list responses.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct InstanceRef {
    /// Identifier of the created instance.
    #[serde(rename = "LinodeID")]
    pub id: InstanceId,
}

/// Reference to a freshly created disk and the job building it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct DiskRef {
    /// Identifier of the created disk.
    #[serde(rename = "DiskID")]
    pub id: DiskId,
    /// Job the provider queued to build the disk.
    #[serde(rename = "JobID")]
    pub job_id: JobId,
}

/// Reference to a freshly created boot configuration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct ConfigRef {
    /// Identifier of the created configuration.
    #[serde(rename = "ConfigID")]
    pub id: ConfigId,
}

/// Reference to a job queued by a mutating call.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct JobRef {
    /// Identifier of the queued job.
    #[serde(rename = "JobID")]
    pub job_id: JobId,
}

fn empty_as_none<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|value| !value.is_empty()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Int(i64),
    Bool(bool),
    Str(String),
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Int(n)) => n != 0,
        Some(Loose::Bool(b)) => b,
        Some(Loose::Str(s)) => !(s.is_empty() || s == "0"),
        None => false,
    })
}

fn opt_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Int(n)) => Some(n != 0),
        Some(Loose::Bool(b)) => Some(b),
        Some(Loose::Str(s)) if !s.is_empty() => Some(s != "0"),
        _ => None,
    })
}

fn opt_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(match Option::<Loose>::deserialize(deserializer)? {
        Some(Loose::Int(n)) => u64::try_from(n).ok(),
        Some(Loose::Str(s)) => s.parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests;
