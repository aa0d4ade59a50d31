//! Service dependency and state-transition engine
//!
//! This module provides the core of the supervisor: a set of service
//! records forming a directed dependency graph, driven through the
//! stopped → starting → started → stopping → stopped state machine while
//! respecting dependency types, activation counts, user pins, restart
//! intents and the shared console.
//!
//! ## Architecture
//!
//! The engine is a single-threaded cooperative reactor. External events
//! (a user command, a payload finishing startup, a console grant) call
//! into a record; the record updates local state and marks one-shot
//! propagation bits on itself or its neighbours, enqueueing the affected
//! records on the set's work queues. [`ServiceSet::process_queues`] then
//! drains both queues to fixed point. Work is always deferred through the
//! queues rather than recursed, so large fan-outs and near-cycles cannot
//! grow the stack.
//!
//! ## Components
//!
//! - [`ServiceSet`]: owns all records, the work queues and the console
//!   arbiter
//! - [`ServiceRecord`] / [`ServiceId`]: per-service state, arena handle
//! - [`ServiceModel`]: per-service payload policy hooks
//! - [`ServiceLoader`] / [`PlatformHooks`] / [`ServiceListener`]: external
//!   collaborators

use crate::error::{CoreError, LoadError, Result};
use schema::ServiceSpec;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use tracing::debug;

pub mod adapters;
pub mod record;

mod lifecycle;

#[cfg(test)]
mod softdep_tests;
#[cfg(test)]
pub(crate) mod test_support;

pub use adapters::*;
pub use record::{ServiceId, ServiceRecord};

/// Owner of all service records and host of the reactor
pub struct ServiceSet {
    slots: Vec<Option<ServiceRecord>>,
    free_slots: Vec<usize>,
    by_name: HashMap<String, ServiceId>,

    prop_queue: VecDeque<ServiceId>,
    transition_queue: VecDeque<ServiceId>,

    console_queue: VecDeque<ServiceId>,
    console_holder: Option<ServiceId>,

    active_services: usize,
    shutting_down: bool,

    pub(crate) loader: Box<dyn ServiceLoader>,
    pub(crate) platform: Box<dyn PlatformHooks>,
}

impl Default for ServiceSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceSet {
    /// Create an empty set with a [`NullLoader`] and [`NullPlatform`]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
            by_name: HashMap::new(),
            prop_queue: VecDeque::new(),
            transition_queue: VecDeque::new(),
            console_queue: VecDeque::new(),
            console_holder: None,
            active_services: 0,
            shutting_down: false,
            loader: Box::new(NullLoader),
            platform: Box::new(NullPlatform),
        }
    }

    /// Replace the service loader
    pub fn set_loader(&mut self, loader: Box<dyn ServiceLoader>) {
        self.loader = loader;
    }

    /// Replace the platform hooks
    pub fn set_platform(&mut self, platform: Box<dyn PlatformHooks>) {
        self.platform = platform;
    }

    pub(crate) fn rec(&self, id: ServiceId) -> &ServiceRecord {
        self.slots[id.0].as_ref().expect("stale service id")
    }

    pub(crate) fn rec_mut(&mut self, id: ServiceId) -> &mut ServiceRecord {
        self.slots[id.0].as_mut().expect("stale service id")
    }

    /// Borrow a record for inspection
    pub fn service(&self, id: ServiceId) -> &ServiceRecord {
        self.rec(id)
    }

    /// Find a service by name
    pub fn find_service(&self, name: &str) -> Option<ServiceId> {
        self.by_name.get(name).copied()
    }

    /// Add a service built from a description, with the given payload model
    ///
    /// Dependency names are resolved against services already in the set.
    pub fn add_service(&mut self, spec: &ServiceSpec, model: Box<dyn ServiceModel>) -> Result<ServiceId> {
        if self.by_name.contains_key(&spec.name) {
            return Err(CoreError::ServiceExists(spec.name.clone()));
        }

        let mut links = Vec::with_capacity(spec.depends.len());
        for dep in &spec.depends {
            let to = self
                .find_service(&dep.service)
                .ok_or_else(|| CoreError::DependencyNotFound {
                    service: spec.name.clone(),
                    dependency: dep.service.clone(),
                })?;
            links.push(record::DepLink::new(to, dep.dep_type));
        }

        let record = ServiceRecord::new(spec, links, model);

        let id = match self.free_slots.pop() {
            Some(idx) => {
                self.slots[idx] = Some(record);
                ServiceId(idx)
            }
            None => {
                self.slots.push(Some(record));
                ServiceId(self.slots.len() - 1)
            }
        };

        // register back-references, one per link
        let targets: Vec<ServiceId> = self.rec(id).depends_on.iter().map(|l| l.to).collect();
        for to in targets {
            self.rec_mut(to).dependents.push(id);
        }

        self.by_name.insert(spec.name.clone(), id);
        debug!("Added service '{}'", spec.name);
        Ok(id)
    }

    /// Find the named service, loading it (and transitively its
    /// dependencies) through the configured loader if necessary
    pub fn load_service(&mut self, name: &str) -> Result<ServiceId> {
        let mut loading = Vec::new();
        self.load_service_inner(name, &mut loading)
    }

    fn load_service_inner(&mut self, name: &str, loading: &mut Vec<String>) -> Result<ServiceId> {
        if let Some(id) = self.find_service(name) {
            return Ok(id);
        }
        if loading.iter().any(|n| n == name) {
            return Err(LoadError::DependencyCycle(name.to_string()).into());
        }

        let spec = self.loader.load(name)?;
        if spec.name != name {
            return Err(LoadError::Validation {
                service: name.to_string(),
                detail: format!("description carries mismatched name '{}'", spec.name),
            }
            .into());
        }

        loading.push(name.to_string());
        for dep in &spec.depends {
            self.load_service_inner(&dep.service, loading)?;
        }
        loading.pop();

        self.add_service(&spec, Box::new(InternalModel))
    }

    /// Remove a stopped, unreferenced service from the set
    ///
    /// Fails while the record is active, activated, queued, or referenced
    /// by any incoming link. Outgoing links are severed on success.
    pub fn remove_service(&mut self, id: ServiceId) -> Result<()> {
        let rec = self.rec(id);
        let removable = rec.state.is_stopped()
            && rec.required_by == 0
            && rec.dependents.is_empty()
            && !rec.in_prop_queue
            && !rec.in_transition_queue;
        if !removable {
            return Err(CoreError::ServiceInUse(rec.name.clone()));
        }

        let name = rec.name.clone();
        let targets: Vec<ServiceId> = rec.depends_on.iter().map(|l| l.to).collect();
        for to in targets {
            // one back-reference per link
            let dependents = &mut self.rec_mut(to).dependents;
            if let Some(pos) = dependents.iter().position(|&d| d == id) {
                dependents.remove(pos);
            }
        }

        self.by_name.remove(&name);
        self.slots[id.0] = None;
        self.free_slots.push(id.0);
        debug!("Removed service '{}'", name);
        Ok(())
    }

    /// Register an event listener on a service
    pub fn add_listener(&mut self, id: ServiceId, listener: Rc<dyn ServiceListener>) {
        self.rec_mut(id).listeners.push(listener);
    }

    /// Remove a previously registered listener (compared by identity)
    pub fn remove_listener(&mut self, id: ServiceId, listener: &Rc<dyn ServiceListener>) {
        self.rec_mut(id)
            .listeners
            .retain(|l| !Rc::ptr_eq(l, listener));
    }

    /// Number of services not in the stopped state
    pub fn active_count(&self) -> usize {
        self.active_services
    }

    /// Latch the shutdown flag; chained starts are suppressed from now on
    pub fn start_shutdown(&mut self) {
        self.shutting_down = true;
    }

    /// Whether a shutdown is in progress
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Change a service's auto-restart setting
    pub fn set_auto_restart(&mut self, id: ServiceId, auto_restart: bool) {
        self.rec_mut(id).auto_restart = auto_restart;
    }

    pub(crate) fn service_active(&mut self, _id: ServiceId) {
        self.active_services += 1;
    }

    pub(crate) fn service_inactive(&mut self, _id: ServiceId) {
        self.active_services -= 1;
    }

    pub(crate) fn add_prop_queue(&mut self, id: ServiceId) {
        let rec = self.rec_mut(id);
        if !rec.in_prop_queue {
            rec.in_prop_queue = true;
            self.prop_queue.push_back(id);
        }
    }

    pub(crate) fn add_transition_queue(&mut self, id: ServiceId) {
        let rec = self.rec_mut(id);
        if !rec.in_transition_queue {
            rec.in_transition_queue = true;
            self.transition_queue.push_back(id);
        }
    }

    /// Drain the propagation and transition queues to fixed point
    ///
    /// The propagation queue is drained to empty before each transition
    /// step, so transitions always observe settled activation counts.
    pub fn process_queues(&mut self) {
        loop {
            if let Some(id) = self.prop_queue.pop_front() {
                self.rec_mut(id).in_prop_queue = false;
                self.do_propagation(id);
                continue;
            }
            if let Some(id) = self.transition_queue.pop_front() {
                self.rec_mut(id).in_transition_queue = false;
                self.execute_transition(id);
                continue;
            }
            break;
        }
    }

    /// Issue a start request and run the reactor to fixed point
    pub fn start_service(&mut self, id: ServiceId) {
        self.start(id);
        self.process_queues();
    }

    /// Issue a stop request (with bring-down) and run the reactor to
    /// fixed point
    pub fn stop_service(&mut self, id: ServiceId) {
        self.stop(id, true);
        self.process_queues();
    }

    // ---- console arbiter ----

    /// Whether the service is waiting in the console queue
    pub fn is_queued_for_console(&self, id: ServiceId) -> bool {
        self.console_queue.contains(&id)
    }

    /// Whether no service is waiting for the console
    pub fn is_console_queue_empty(&self) -> bool {
        self.console_queue.is_empty()
    }

    pub(crate) fn append_console_queue(&mut self, id: ServiceId) {
        if self.console_holder.is_none() && self.console_queue.is_empty() {
            self.grant_console(id);
        } else {
            self.console_queue.push_back(id);
        }
    }

    pub(crate) fn unqueue_console(&mut self, id: ServiceId) {
        self.console_queue.retain(|&queued| queued != id);
    }

    pub(crate) fn pull_console_queue(&mut self) {
        if let Some(next) = self.console_queue.pop_front() {
            self.grant_console(next);
        }
    }

    fn grant_console(&mut self, id: ServiceId) {
        debug_assert!(self.console_holder.is_none());
        self.console_holder = Some(id);
        let rec = self.rec_mut(id);
        rec.waiting_for_console = false;
        rec.have_console = true;
        self.acquired_console(id);
    }

    pub(crate) fn release_console(&mut self, id: ServiceId) {
        debug_assert_eq!(self.console_holder, Some(id));
        self.rec_mut(id).have_console = false;
        self.console_holder = None;
        self.pull_console_queue();
    }
}
