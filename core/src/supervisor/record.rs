//! Per-service record data
//!
//! A [`ServiceRecord`] holds one service's state machine fields, its
//! outgoing dependency links and the back-references from its dependents.
//! Records live in the arena owned by [`super::ServiceSet`] and are
//! addressed by [`ServiceId`]; links never own the records they point to.

use super::adapters::{ServiceListener, ServiceModel};
use schema::{DependencyType, ServiceFlags, ServiceSpec, ServiceState, StopReason, TargetState};
use std::rc::Rc;

/// Stable handle to a service record within its [`super::ServiceSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceId(pub(crate) usize);

/// Outgoing dependency link, owned by the depending service
#[derive(Debug)]
pub(crate) struct DepLink {
    /// Target of the dependency
    pub(crate) to: ServiceId,
    /// Kind of dependency
    pub(crate) dep_type: DependencyType,
    /// The owner is currently blocked on this dependency starting
    pub(crate) waiting_on: bool,
    /// This link currently contributes an activation to the target
    pub(crate) holding_acq: bool,
}

impl DepLink {
    pub(crate) fn new(to: ServiceId, dep_type: DependencyType) -> Self {
        Self {
            to,
            dep_type,
            waiting_on: false,
            holding_acq: false,
        }
    }

    /// A link is hard while it can veto the target stopping: always for
    /// `Regular`, and for `Milestone` only until the milestone has been
    /// passed (`waiting_on` cleared).
    pub(crate) fn is_hard(&self) -> bool {
        match self.dep_type {
            DependencyType::Regular => true,
            DependencyType::Milestone => self.waiting_on,
            DependencyType::WaitsFor | DependencyType::Soft => false,
        }
    }
}

/// One service's in-memory record
pub struct ServiceRecord {
    pub(crate) name: String,
    pub(crate) state: ServiceState,
    pub(crate) desired_state: TargetState,

    pub(crate) depends_on: Vec<DepLink>,
    /// Services holding a link to this record (back-references only)
    pub(crate) dependents: Vec<ServiceId>,

    /// Number of reasons this service should be running
    pub(crate) required_by: u32,
    /// The service was explicitly started and contributes 1 to `required_by`
    pub(crate) start_explicit: bool,

    pub(crate) pinned_started: bool,
    pub(crate) pinned_stopped: bool,

    /// Restart when the payload terminates unexpectedly
    pub(crate) auto_restart: bool,
    /// Recover from payload termination without leaving the started state
    pub(crate) smooth_recovery: bool,
    /// An intentional stop-to-start cycle is in progress
    pub(crate) restarting: bool,
    /// The service must end up stopped regardless of desired state
    pub(crate) force_stop: bool,

    pub(crate) waiting_for_deps: bool,
    pub(crate) waiting_for_console: bool,
    pub(crate) have_console: bool,

    pub(crate) start_failed: bool,
    pub(crate) start_skipped: bool,
    pub(crate) stop_reason: StopReason,
    /// Exit status of the payload's last self-termination
    pub(crate) exit_status: Option<i32>,

    /// Service to load and start after a clean self-termination
    pub(crate) start_on_completion: Option<String>,
    pub(crate) flags: ServiceFlags,

    // One-shot propagation bits, consumed by the reactor
    pub(crate) prop_require: bool,
    pub(crate) prop_release: bool,
    pub(crate) prop_failure: bool,
    pub(crate) prop_start: bool,
    pub(crate) prop_stop: bool,

    pub(crate) in_prop_queue: bool,
    pub(crate) in_transition_queue: bool,

    pub(crate) model: Box<dyn ServiceModel>,
    pub(crate) listeners: Vec<Rc<dyn ServiceListener>>,
}

impl ServiceRecord {
    pub(crate) fn new(spec: &ServiceSpec, depends_on: Vec<DepLink>, model: Box<dyn ServiceModel>) -> Self {
        Self {
            name: spec.name.clone(),
            state: ServiceState::Stopped,
            desired_state: TargetState::Stopped,
            depends_on,
            dependents: Vec::new(),
            required_by: 0,
            start_explicit: false,
            pinned_started: false,
            pinned_stopped: false,
            auto_restart: spec.auto_restart,
            smooth_recovery: spec.smooth_recovery,
            restarting: false,
            force_stop: false,
            waiting_for_deps: false,
            waiting_for_console: false,
            have_console: false,
            start_failed: false,
            start_skipped: false,
            stop_reason: StopReason::default(),
            exit_status: None,
            start_on_completion: spec.chain_to.clone(),
            flags: spec.flags,
            prop_require: false,
            prop_release: false,
            prop_failure: false,
            prop_start: false,
            prop_stop: false,
            in_prop_queue: false,
            in_transition_queue: false,
            model,
            listeners: Vec::new(),
        }
    }

    /// Service name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state
    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// The state the service should settle in, as last requested
    pub fn target_state(&self) -> TargetState {
        self.desired_state
    }

    /// Current activation count
    pub fn required_by(&self) -> u32 {
        self.required_by
    }

    /// Whether the service holds an explicit activation
    pub fn is_explicitly_started(&self) -> bool {
        self.start_explicit
    }

    /// Whether the last start attempt failed
    pub fn start_failed(&self) -> bool {
        self.start_failed
    }

    /// Whether the last start attempt was skipped
    pub fn start_skipped(&self) -> bool {
        self.start_skipped
    }

    /// Why the service most recently stopped (or is stopping)
    pub fn stop_reason(&self) -> StopReason {
        self.stop_reason
    }

    /// Whether the service currently owns the console
    pub fn has_console(&self) -> bool {
        self.have_console
    }

    /// Whether the service is pinned in the started state
    pub fn is_pinned_started(&self) -> bool {
        self.pinned_started
    }

    /// Whether the service is pinned in the stopped state
    pub fn is_pinned_stopped(&self) -> bool {
        self.pinned_stopped
    }

    /// This record's dependencies, in declaration order
    pub fn dependencies(&self) -> impl Iterator<Item = ServiceId> + '_ {
        self.depends_on.iter().map(|dep| dep.to)
    }

    /// Services holding a link to this record
    pub fn dependents(&self) -> impl Iterator<Item = ServiceId> + '_ {
        self.dependents.iter().copied()
    }
}
