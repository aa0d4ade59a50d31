//! Hook surfaces between the engine and its collaborators
//!
//! The engine never spawns processes, touches the terminal or reads
//! configuration itself; it delegates through the traits in this module.
//! Each trait ships a default or null implementation plus a recording
//! implementation for tests.

use super::record::ServiceId;
use crate::error::LoadError;
use schema::{ServiceEvent, ServiceSpec};
use std::cell::Cell;
use std::rc::Rc;

/// Result of asking a payload to come up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringUpOutcome {
    /// The payload is up; the engine completes the start immediately
    Complete,
    /// Startup is underway; the owner will call [`super::ServiceSet::started`]
    /// when it finishes
    InProgress,
    /// The payload refused to come up
    Failed,
}

/// Result of asking a payload to go down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringDownOutcome {
    /// The payload is down; the engine completes the stop immediately
    Complete,
    /// Shutdown is underway; the owner will call [`super::ServiceSet::stopped`]
    /// when it finishes
    InProgress,
}

/// Per-service payload policy
///
/// One boxed instance is attached to each record. The defaults describe an
/// internal service: both transitions complete synchronously and a start in
/// flight cannot be interrupted (there is never a start in flight to
/// interrupt).
pub trait ServiceModel {
    /// Attempt to bring the payload up
    fn bring_up(&mut self) -> BringUpOutcome {
        BringUpOutcome::Complete
    }

    /// Bring the payload down; called once no hard dependent holds the service
    fn bring_down(&mut self) -> BringDownOutcome {
        BringDownOutcome::Complete
    }

    /// Last-moment veto before `bring_up`; a refusal leaves the service
    /// waiting and it will be re-checked on the next transition pass
    fn can_proceed_to_start(&self) -> bool {
        true
    }

    /// Whether a payload startup in flight may be cancelled
    fn can_interrupt_start(&self) -> bool {
        false
    }

    /// Attempt to cancel a payload startup in flight. Returning `false`
    /// means startup will still run to completion and the stop is deferred.
    fn interrupt_start(&mut self) -> bool {
        true
    }

    /// Whether a payload shutdown in flight may be cancelled
    fn can_interrupt_stop(&self) -> bool {
        false
    }

    /// The service has stopped and is no longer activated
    fn becoming_inactive(&mut self) {}
}

/// Model for internal services: no payload, transitions are immediate
#[derive(Debug, Clone, Copy, Default)]
pub struct InternalModel;

impl ServiceModel for InternalModel {}

/// Process-wide hooks fired by the engine
pub trait PlatformHooks {
    /// A service flagged `rw_ready` has started: the root filesystem is
    /// writable from now on
    fn rootfs_is_rw(&mut self) {}

    /// A service flagged `log_ready` has started: the external log
    /// facility is available from now on
    fn setup_external_log(&mut self) {}

    /// Return the controlling terminal's foreground process group to the
    /// supervisor; fired whenever a service that ran on the console gives
    /// it up
    fn restore_terminal(&mut self) {}
}

/// Platform hooks that do nothing; the default for embedded and test use
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPlatform;

impl PlatformHooks for NullPlatform {}

/// Unix platform hooks operating on the real controlling terminal
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixPlatform;

#[cfg(unix)]
impl PlatformHooks for UnixPlatform {
    fn restore_terminal(&mut self) {
        // SAFETY: tcsetpgrp/getpgrp are async-signal-safe POSIX calls; fd 0
        // is the controlling terminal for a supervisor running on one.
        #[allow(unsafe_code)]
        unsafe {
            let pgrp = libc::getpgrp();
            if libc::tcsetpgrp(0, pgrp) != 0 {
                tracing::debug!("tcsetpgrp failed: {}", std::io::Error::last_os_error());
            }
        }
    }
}

/// Source of service descriptions, consulted by
/// [`super::ServiceSet::load_service`]
pub trait ServiceLoader {
    /// Produce the description for the named service
    fn load(&mut self, name: &str) -> Result<ServiceSpec, LoadError>;
}

/// Loader that knows no services
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLoader;

impl ServiceLoader for NullLoader {
    fn load(&mut self, name: &str) -> Result<ServiceSpec, LoadError> {
        Err(LoadError::NotFound(name.to_string()))
    }
}

/// Receiver of lifecycle events for a single service
///
/// Listeners are invoked synchronously, in registration order, from within
/// the engine call that produced the event. They must not call back into
/// the service set.
pub trait ServiceListener {
    /// An event occurred on the service this listener is registered with
    fn service_event(&self, service: ServiceId, event: ServiceEvent);
}

/// Mock payload model for tests, driven through a shared [`MockModelHandle`]
///
/// The default behaviour matches an asynchronous process payload: `bring_up`
/// reports [`BringUpOutcome::InProgress`] (the test calls
/// [`super::ServiceSet::started`] itself) while `bring_down` completes
/// immediately.
#[derive(Debug, Clone)]
pub struct MockModel {
    handle: Rc<MockModelHandle>,
}

/// Shared control and observation state for a [`MockModel`]
#[derive(Debug)]
pub struct MockModelHandle {
    /// Outcome the next `bring_up` reports
    pub bring_up_outcome: Cell<BringUpOutcome>,
    /// Outcome the next `bring_down` reports
    pub bring_down_outcome: Cell<BringDownOutcome>,
    /// Answer for `can_proceed_to_start`
    pub proceed_to_start: Cell<bool>,
    /// Answer for `can_interrupt_start`
    pub interruptible_start: Cell<bool>,
    /// Result of `interrupt_start` when permitted
    pub interrupt_start_result: Cell<bool>,
    /// Answer for `can_interrupt_stop`
    pub interruptible_stop: Cell<bool>,
    /// Number of `bring_up` calls observed
    pub bring_up_calls: Cell<u32>,
    /// Number of `bring_down` calls observed
    pub bring_down_calls: Cell<u32>,
    /// Number of `becoming_inactive` calls observed
    pub inactive_calls: Cell<u32>,
}

impl Default for MockModelHandle {
    fn default() -> Self {
        Self {
            bring_up_outcome: Cell::new(BringUpOutcome::InProgress),
            bring_down_outcome: Cell::new(BringDownOutcome::Complete),
            proceed_to_start: Cell::new(true),
            interruptible_start: Cell::new(false),
            interrupt_start_result: Cell::new(true),
            interruptible_stop: Cell::new(false),
            bring_up_calls: Cell::new(0),
            bring_down_calls: Cell::new(0),
            inactive_calls: Cell::new(0),
        }
    }
}

impl MockModel {
    /// Create a mock model plus the handle that controls it
    pub fn new() -> (Self, Rc<MockModelHandle>) {
        let handle = Rc::new(MockModelHandle::default());
        (
            Self {
                handle: Rc::clone(&handle),
            },
            handle,
        )
    }
}

impl ServiceModel for MockModel {
    fn bring_up(&mut self) -> BringUpOutcome {
        self.handle.bring_up_calls.set(self.handle.bring_up_calls.get() + 1);
        self.handle.bring_up_outcome.get()
    }

    fn bring_down(&mut self) -> BringDownOutcome {
        self.handle
            .bring_down_calls
            .set(self.handle.bring_down_calls.get() + 1);
        self.handle.bring_down_outcome.get()
    }

    fn can_proceed_to_start(&self) -> bool {
        self.handle.proceed_to_start.get()
    }

    fn can_interrupt_start(&self) -> bool {
        self.handle.interruptible_start.get()
    }

    fn interrupt_start(&mut self) -> bool {
        self.handle.interrupt_start_result.get()
    }

    fn can_interrupt_stop(&self) -> bool {
        self.handle.interruptible_stop.get()
    }

    fn becoming_inactive(&mut self) {
        self.handle.inactive_calls.set(self.handle.inactive_calls.get() + 1);
    }
}

/// Listener recording which events it has seen, for tests
#[derive(Debug, Default)]
pub struct RecordingListener {
    /// A `Started` event was delivered
    pub got_started: Cell<bool>,
    /// A `Stopped` event was delivered
    pub got_stopped: Cell<bool>,
    /// A `FailedStart` event was delivered
    pub failed_start: Cell<bool>,
    /// A `StartCancelled` event was delivered
    pub start_cancelled: Cell<bool>,
    /// A `StopCancelled` event was delivered
    pub stop_cancelled: Cell<bool>,
}

impl ServiceListener for RecordingListener {
    fn service_event(&self, _service: ServiceId, event: ServiceEvent) {
        match event {
            ServiceEvent::Started => self.got_started.set(true),
            ServiceEvent::Stopped => self.got_stopped.set(true),
            ServiceEvent::FailedStart => self.failed_start.set(true),
            ServiceEvent::StartCancelled => self.start_cancelled.set(true),
            ServiceEvent::StopCancelled => self.stop_cancelled.set(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_model_defaults() {
        let mut model = InternalModel;
        assert_eq!(model.bring_up(), BringUpOutcome::Complete);
        assert_eq!(model.bring_down(), BringDownOutcome::Complete);
        assert!(model.can_proceed_to_start());
        assert!(!model.can_interrupt_start());
        assert!(!model.can_interrupt_stop());
    }

    #[test]
    fn test_mock_model_records_calls() {
        let (mut model, handle) = MockModel::new();

        assert_eq!(model.bring_up(), BringUpOutcome::InProgress);
        assert_eq!(handle.bring_up_calls.get(), 1);

        handle.bring_up_outcome.set(BringUpOutcome::Failed);
        assert_eq!(model.bring_up(), BringUpOutcome::Failed);
        assert_eq!(handle.bring_up_calls.get(), 2);

        assert_eq!(model.bring_down(), BringDownOutcome::Complete);
        handle.bring_down_outcome.set(BringDownOutcome::InProgress);
        assert_eq!(model.bring_down(), BringDownOutcome::InProgress);
        assert_eq!(handle.bring_down_calls.get(), 2);
    }

    #[test]
    fn test_null_loader_reports_not_found() {
        let mut loader = NullLoader;
        assert!(matches!(loader.load("ghost"), Err(LoadError::NotFound(n)) if n == "ghost"));
    }
}
