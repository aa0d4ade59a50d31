//! Shared helpers for the supervisor test suites

use super::adapters::{InternalModel, MockModel, MockModelHandle, ServiceListener, ServiceLoader};
use super::{ServiceId, ServiceSet};
use crate::error::LoadError;
use schema::{DependencyType, ServiceEvent, ServiceSpec, ServiceState};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub(crate) const REG: DependencyType = DependencyType::Regular;
pub(crate) const MS: DependencyType = DependencyType::Milestone;
pub(crate) const WAITS: DependencyType = DependencyType::WaitsFor;

pub(crate) fn spec_with_deps(name: &str, deps: &[(&str, DependencyType)]) -> ServiceSpec {
    let mut spec = ServiceSpec::named(name);
    for (service, dep_type) in deps {
        spec = spec.with_dependency(*service, *dep_type);
    }
    spec
}

/// Add a service with the default internal model (synchronous transitions)
pub(crate) fn add_internal(
    set: &mut ServiceSet,
    name: &str,
    deps: &[(&str, DependencyType)],
) -> ServiceId {
    set.add_service(&spec_with_deps(name, deps), Box::new(InternalModel))
        .unwrap()
}

/// Add a service with a mock model (startup completes only when the test
/// calls `started`)
pub(crate) fn add_mock(
    set: &mut ServiceSet,
    name: &str,
    deps: &[(&str, DependencyType)],
) -> (ServiceId, Rc<MockModelHandle>) {
    add_mock_spec(set, spec_with_deps(name, deps))
}

/// Add a mock-model service from a full description
pub(crate) fn add_mock_spec(
    set: &mut ServiceSet,
    spec: schema::ServiceSpec,
) -> (ServiceId, Rc<MockModelHandle>) {
    let (model, handle) = MockModel::new();
    let id = set.add_service(&spec, Box::new(model)).unwrap();
    (id, handle)
}

pub(crate) fn state(set: &ServiceSet, id: ServiceId) -> ServiceState {
    set.service(id).state()
}

/// Listener recording every event in delivery order; attach one instance
/// to several services to observe cross-service ordering
#[derive(Default)]
pub(crate) struct EventLog {
    pub(crate) events: RefCell<Vec<(ServiceId, ServiceEvent)>>,
}

impl EventLog {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn order_of(&self, wanted: ServiceEvent) -> Vec<ServiceId> {
        self.events
            .borrow()
            .iter()
            .filter(|(_, ev)| *ev == wanted)
            .map(|(id, _)| *id)
            .collect()
    }
}

impl ServiceListener for EventLog {
    fn service_event(&self, service: ServiceId, event: ServiceEvent) {
        self.events.borrow_mut().push((service, event));
    }
}

/// In-memory loader backed by a name → description map
pub(crate) struct MapLoader {
    specs: HashMap<String, ServiceSpec>,
}

impl MapLoader {
    pub(crate) fn new(specs: Vec<ServiceSpec>) -> Self {
        Self {
            specs: specs.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }
}

impl ServiceLoader for MapLoader {
    fn load(&mut self, name: &str) -> Result<ServiceSpec, LoadError> {
        self.specs
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(name.to_string()))
    }
}

/// Check the structural invariants over the given services, which must be
/// every service in the set:
///
/// - activation accounting: `required_by` equals the explicit activation
///   plus the incoming holds
/// - a started service has every hard dependency started and unblocked
/// - the pins are mutually exclusive
/// - the active count matches the number of non-stopped records
/// - at a fixed point, both queues are empty and no propagation bit is set
pub(crate) fn check_invariants(set: &ServiceSet, ids: &[ServiceId]) {
    for &id in ids {
        let rec = set.service(id);

        let mut holds = 0u32;
        for &other in ids {
            for link in &set.service(other).depends_on {
                if link.to == id && link.holding_acq {
                    holds += 1;
                }
            }
        }
        let explicit = if rec.start_explicit { 1 } else { 0 };
        assert_eq!(
            rec.required_by,
            explicit + holds,
            "activation count mismatch for '{}'",
            rec.name()
        );

        if rec.state() == ServiceState::Started {
            for link in &rec.depends_on {
                if link.is_hard() {
                    assert_eq!(
                        set.service(link.to).state(),
                        ServiceState::Started,
                        "'{}' started with hard dependency '{}' not started",
                        rec.name(),
                        set.service(link.to).name()
                    );
                    assert!(!link.waiting_on);
                }
            }
        }

        assert!(!(rec.pinned_started && rec.pinned_stopped));
    }

    let active = ids
        .iter()
        .filter(|&&id| set.service(id).state().is_active())
        .count();
    assert_eq!(set.active_count(), active, "active count mismatch");
}

/// Check reactor quiescence: queues drained and no propagation bit left
pub(crate) fn check_quiescent(set: &ServiceSet, ids: &[ServiceId]) {
    assert!(set.prop_queue.is_empty());
    assert!(set.transition_queue.is_empty());
    for &id in ids {
        let rec = set.service(id);
        assert!(
            !rec.prop_require
                && !rec.prop_release
                && !rec.prop_failure
                && !rec.prop_start
                && !rec.prop_stop,
            "propagation bit left set on '{}'",
            rec.name()
        );
        assert!(!rec.in_prop_queue && !rec.in_transition_queue);
    }
}
