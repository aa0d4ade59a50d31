//! Service lifecycle and description types for the procyon supervisor
//!
//! This module contains the core data structures for describing services,
//! their dependency relations and their lifecycle states.
//!
//! ## Service Lifecycle
//!
//! Services progress through the following states:
//! - `Stopped`: service is not running
//! - `Starting`: service is coming up (waiting for dependencies, the
//!   console, or its own payload)
//! - `Started`: service is running
//! - `Stopping`: service is going down (waiting for dependents or its own
//!   payload)
//!
//! ## Dependency Types
//!
//! A dependency is *hard* (the dependent cannot run without it) or *soft*
//! (the dependent waits for it to start but survives its loss):
//! - `Regular`: hard
//! - `Milestone`: hard until the dependency first reaches `Started`, then
//!   degrades to soft
//! - `WaitsFor`, `Soft`: soft

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Current state of a service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ServiceState {
    /// Service is not running
    Stopped,
    /// Service is coming up
    Starting,
    /// Service is running
    Started,
    /// Service is going down
    Stopping,
}

impl ServiceState {
    /// Check if the service is fully stopped
    pub fn is_stopped(&self) -> bool {
        matches!(self, ServiceState::Stopped)
    }

    /// Check if the service counts towards the active-service total
    /// (any state other than `Stopped`)
    pub fn is_active(&self) -> bool {
        !matches!(self, ServiceState::Stopped)
    }

    /// Check if the service is transitioning between rest states
    pub fn is_transitional(&self) -> bool {
        matches!(self, ServiceState::Starting | ServiceState::Stopping)
    }
}

/// The state a service should settle in, as last requested
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TargetState {
    /// Service should end up stopped
    Stopped,
    /// Service should end up started
    Started,
}

/// Relation between a dependent service and one of its dependencies
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum DependencyType {
    /// Hard: dependent cannot start without it and stops when it stops
    Regular,
    /// Hard until the dependency first starts, soft afterwards
    Milestone,
    /// Soft: dependent waits for start but survives loss
    WaitsFor,
    /// Soft, without the start-ordering wait semantics of `WaitsFor`
    Soft,
}

impl DependencyType {
    /// Whether this type is soft from the outset
    pub fn is_soft(&self) -> bool {
        matches!(self, DependencyType::WaitsFor | DependencyType::Soft)
    }
}

/// Why a service most recently stopped (or is stopping)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// Ordinary stop request
    Normal,
    /// A dependency failed to start
    DepFailed,
    /// The service's own start attempt failed
    Failed,
    /// The payload terminated of its own accord
    Terminated,
}

impl Default for StopReason {
    fn default() -> Self {
        StopReason::Normal
    }
}

impl StopReason {
    /// Whether the stop was a self-termination of the payload rather than
    /// an externally driven stop
    pub fn is_self_termination(&self) -> bool {
        matches!(self, StopReason::Terminated)
    }
}

/// On-start behaviour flags for a service
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceFlags {
    /// Service must hold the console while starting
    pub starts_on_console: bool,
    /// Service keeps the console after it has started
    pub runs_on_console: bool,
    /// When this service starts, the root filesystem is writable
    pub rw_ready: bool,
    /// When this service starts, the external log facility is available
    pub log_ready: bool,
}

/// Declarative description of a service, as produced by a loader
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Unique name of the service within its set
    pub name: String,

    /// Dependencies of this service, in declaration order
    #[serde(default)]
    pub depends: Vec<DependencySpec>,

    /// Restart the service when its payload terminates unexpectedly
    #[serde(default)]
    pub auto_restart: bool,

    /// On unexpected termination, restart the payload without leaving the
    /// started state (dependents are not bounced). Only meaningful with
    /// `auto_restart`.
    #[serde(default)]
    pub smooth_recovery: bool,

    /// On-start behaviour flags
    #[serde(default)]
    pub flags: ServiceFlags,

    /// Service to load and start after this one self-terminates cleanly
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_to: Option<String>,
}

impl ServiceSpec {
    /// Create a description with the given name and no dependencies
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depends: Vec::new(),
            auto_restart: false,
            smooth_recovery: false,
            flags: ServiceFlags::default(),
            chain_to: None,
        }
    }

    /// Add a dependency to the description
    #[must_use]
    pub fn with_dependency(mut self, service: impl Into<String>, dep_type: DependencyType) -> Self {
        self.depends.push(DependencySpec {
            service: service.into(),
            dep_type,
        });
        self
    }

    /// Set the auto-restart flag
    #[must_use]
    pub fn with_auto_restart(mut self, auto_restart: bool) -> Self {
        self.auto_restart = auto_restart;
        self
    }

    /// Set the smooth-recovery flag
    #[must_use]
    pub fn with_smooth_recovery(mut self, smooth_recovery: bool) -> Self {
        self.smooth_recovery = smooth_recovery;
        self
    }

    /// Set the on-start flags
    #[must_use]
    pub fn with_flags(mut self, flags: ServiceFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the chained service name
    #[must_use]
    pub fn with_chain_to(mut self, chain_to: impl Into<String>) -> Self {
        self.chain_to = Some(chain_to.into());
        self
    }
}

/// One dependency declaration inside a [`ServiceSpec`]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DependencySpec {
    /// Name of the service depended upon
    pub service: String,

    /// Kind of dependency
    #[serde(rename = "type")]
    pub dep_type: DependencyType,
}
