//! Machine operations: the units of work the runner executes.
//!
//! Each operation wraps one full lifecycle pipeline invocation and
//! produces its result exactly once. Operations own their instance for
//! their whole lifetime, which is what keeps two conflicting mutations
//! from ever racing on the same instance identifier.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::api::ProviderApi;
use crate::env::{ClusterEnv, EnvError};
use crate::model::{Instance, InstanceId};
use crate::provider::{LaunchParams, Provider, ProviderError};

/// Future returned by operations.
pub type OpFuture = Pin<Box<dyn Future<Output = Result<OpOutput, OpError>> + Send>>;

/// Kind of queued operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpKind {
    /// Provision an instance without registering it.
    Add,
    /// Provision an instance and register it with the environment.
    Register,
    /// Remove a machine and tear its instance down.
    Destroy,
}

impl OpKind {
    /// Short name used in labels and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Register => "register",
            Self::Destroy => "destroy",
        }
    }
}

/// Success value produced by an operation.
#[derive(Clone, Debug)]
pub enum OpOutput {
    /// A provisioned instance.
    Launched(Instance),
    /// A provisioned instance registered with the environment.
    Registered {
        /// The provisioned instance.
        instance: Instance,
        /// Machine identifier assigned by the environment.
        machine_id: String,
    },
    /// A removed machine and/or destroyed instance.
    Destroyed {
        /// Machine removed from the environment, when one was.
        machine_id: Option<String>,
        /// Instance destroyed provider-side, when one was.
        instance_id: Option<InstanceId>,
    },
}

/// Errors captured from a failed operation.
#[derive(Debug, Error)]
pub enum OpError {
    /// The lifecycle pipeline failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// The cluster tool failed.
    #[error(transparent)]
    Env(#[from] EnvError),
    /// The operation's task never produced a result.
    #[error("operation aborted: {0}")]
    Aborted(String),
}

/// A unit of work the runner can execute.
pub trait Operation: Send + 'static {
    /// Kind of operation, used in reports.
    fn kind(&self) -> OpKind;

    /// Human-readable label, used in reports and logs.
    fn label(&self) -> String;

    /// Consumes the operation and runs it to completion.
    fn run(self) -> OpFuture;
}

/// Provisions a new instance.
pub struct MachineAdd<A> {
    provider: Arc<Provider<A>>,
    params: LaunchParams,
}

impl<A: ProviderApi + 'static> MachineAdd<A> {
    /// Creates an add operation.
    #[must_use]
    pub fn new(provider: Arc<Provider<A>>, params: LaunchParams) -> Self {
        Self { provider, params }
    }
}

impl<A: ProviderApi + 'static> Operation for MachineAdd<A> {
    fn kind(&self) -> OpKind {
        OpKind::Add
    }

    fn label(&self) -> String {
        format!(
            "add plan {} region {}",
            self.params.plan_id, self.params.region_id
        )
    }

    fn run(self) -> OpFuture {
        Box::pin(async move {
            let instance = self.provider.launch_instance(&self.params).await?;
            Ok(OpOutput::Launched(instance))
        })
    }
}

/// Provisions a new instance and registers it with the environment.
///
/// When registration fails the freshly provisioned instance is torn
/// down before the error is surfaced, so a failed register never leaves
/// an orphaned, billed instance behind.
pub struct MachineRegister<A, E> {
    provider: Arc<Provider<A>>,
    env: Arc<E>,
    params: LaunchParams,
}

impl<A: ProviderApi + 'static, E: ClusterEnv + 'static> MachineRegister<A, E> {
    /// Creates a register operation.
    #[must_use]
    pub fn new(provider: Arc<Provider<A>>, env: Arc<E>, params: LaunchParams) -> Self {
        Self {
            provider,
            env,
            params,
        }
    }
}

impl<A: ProviderApi + 'static, E: ClusterEnv + 'static> Operation for MachineRegister<A, E> {
    fn kind(&self) -> OpKind {
        OpKind::Register
    }

    fn label(&self) -> String {
        format!(
            "register plan {} region {}",
            self.params.plan_id, self.params.region_id
        )
    }

    fn run(self) -> OpFuture {
        Box::pin(async move {
            let instance = self.provider.launch_instance(&self.params).await?;
            let target = format!("ssh:ubuntu@{}", instance.remote_access_name);
            match self.env.add_machine(&target) {
                Ok(machine_id) => Ok(OpOutput::Registered {
                    instance,
                    machine_id,
                }),
                Err(err) => {
                    warn!(
                        instance = %instance.label,
                        error = %err,
                        "registration failed, terminating instance"
                    );
                    if let Err(teardown_err) =
                        self.provider.terminate_instance(instance.id).await
                    {
                        warn!(
                            instance = %instance.label,
                            error = %teardown_err,
                            "teardown after failed registration also failed"
                        );
                    }
                    Err(err.into())
                }
            }
        })
    }
}

/// Options controlling how far a destroy operation reaches.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DestroyOptions {
    /// Only remove the machine from the environment; leave the provider
    /// instance alone. Used when no instance could be resolved.
    pub env_only: bool,
    /// Only destroy the provider instance; skip the environment. Used
    /// for forced sweeps when the environment is unreachable.
    pub iaas_only: bool,
}

/// Removes a machine from the environment and tears its instance down.
pub struct MachineDestroy<A, E> {
    provider: Arc<Provider<A>>,
    env: Arc<E>,
    machine_id: Option<String>,
    instance_id: Option<InstanceId>,
    options: DestroyOptions,
}

impl<A: ProviderApi + 'static, E: ClusterEnv + 'static> MachineDestroy<A, E> {
    /// Creates a destroy operation.
    #[must_use]
    pub fn new(
        provider: Arc<Provider<A>>,
        env: Arc<E>,
        machine_id: Option<String>,
        instance_id: Option<InstanceId>,
        options: DestroyOptions,
    ) -> Self {
        Self {
            provider,
            env,
            machine_id,
            instance_id,
            options,
        }
    }
}

impl<A: ProviderApi + 'static, E: ClusterEnv + 'static> Operation for MachineDestroy<A, E> {
    fn kind(&self) -> OpKind {
        OpKind::Destroy
    }

    fn label(&self) -> String {
        match (&self.machine_id, self.instance_id) {
            (Some(machine), _) => format!("destroy machine {machine}"),
            (None, Some(instance)) => format!("destroy instance {instance}"),
            (None, None) => String::from("destroy"),
        }
    }

    fn run(self) -> OpFuture {
        Box::pin(async move {
            if !self.options.iaas_only
                && let Some(machine_id) = &self.machine_id
            {
                self.env.terminate_machines(std::slice::from_ref(machine_id))?;
            }
            if self.options.env_only {
                return Ok(OpOutput::Destroyed {
                    machine_id: self.machine_id,
                    instance_id: None,
                });
            }
            if let Some(instance_id) = self.instance_id {
                self.provider.terminate_instance(instance_id).await?;
            }
            Ok(OpOutput::Destroyed {
                machine_id: self.machine_id,
                instance_id: self.instance_id,
            })
        })
    }
}
