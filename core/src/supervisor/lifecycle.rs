//! The service state machine
//!
//! All state transitions, activation accounting and propagation live here,
//! as methods on [`ServiceSet`] keyed by [`ServiceId`]. External events
//! enter through the public operations (`start`, `stop`, `restart`,
//! `forced_stop`, `started`, `stopped`, `payload_terminated`, the pin
//! operations); everything else is reactor machinery.
//!
//! Cascading work is never recursed into neighbours directly. A method
//! marks a one-shot propagation bit on the affected record and enqueues it;
//! [`ServiceSet::process_queues`] drains the queues to fixed point. The
//! propagation bits are consumed in a fixed order (require, release,
//! failure, start, stop) so activation counts settle before start/stop
//! decisions read them.

use super::adapters::{BringDownOutcome, BringUpOutcome};
use super::record::ServiceId;
use super::ServiceSet;
use schema::{DependencyType, ServiceEvent, ServiceState, StopReason, TargetState};
use tracing::{debug, error, info, warn};

impl ServiceSet {
    // ---- public operations ----

    /// User intent "run". A no-op for a stopped service pinned stopped.
    pub fn start(&mut self, id: ServiceId) {
        {
            let rec = self.rec_mut(id);
            if rec.state == ServiceState::Stopped && rec.pinned_stopped {
                return;
            }
            if !rec.start_explicit {
                rec.start_explicit = true;
                rec.required_by += 1;
            }
        }
        self.do_start(id);
    }

    /// User intent "don't run". Clears the explicit activation; if the
    /// service is no longer required at all the stop is escalated to a
    /// bring-down and the dependency releases are scheduled.
    pub fn stop(&mut self, id: ServiceId, mut bring_down: bool) {
        {
            // The explicit activation is surrendered even when the service
            // is pinned started; the pin only defers the transition itself.
            let rec = self.rec_mut(id);
            if rec.start_explicit {
                rec.start_explicit = false;
                rec.required_by -= 1;
            }

            rec.desired_state = TargetState::Stopped;

            if rec.pinned_started {
                return;
            }
        }

        if self.rec(id).required_by == 0 {
            // No dependent needs us at all: treat as a full manual stop.
            bring_down = true;
            let schedule_release = {
                let rec = self.rec_mut(id);
                rec.prop_release = !rec.prop_require;
                rec.prop_release
            };
            if schedule_release {
                self.add_prop_queue(id);
            }
        }

        let state = self.rec(id).state;
        if bring_down && state != ServiceState::Stopped && state != ServiceState::Stopping {
            self.rec_mut(id).stop_reason = StopReason::Normal;
            self.do_stop(id);
        }
    }

    /// Stop and start again without touching activation links. Returns
    /// false unless the service is currently started.
    pub fn restart(&mut self, id: ServiceId) -> bool {
        let rec = self.rec_mut(id);
        if rec.state == ServiceState::Started {
            rec.restarting = true;
            rec.stop_reason = StopReason::Normal;
            self.do_stop(id);
            return true;
        }
        false
    }

    /// Mark this service to be brought down regardless of desired state;
    /// hard dependents are force-stopped through propagation.
    pub fn forced_stop(&mut self, id: ServiceId) {
        let rec = self.rec_mut(id);
        if rec.state != ServiceState::Stopped {
            rec.force_stop = true;
            if !rec.pinned_started {
                rec.prop_stop = true;
                self.add_prop_queue(id);
            }
        }
    }

    /// Payload-completion callback: the payload finished coming up.
    pub fn started(&mut self, id: ServiceId) {
        let state = self.rec(id).state;
        if state == ServiceState::Stopped || state == ServiceState::Stopping {
            warn!(
                "Ignoring started notification for service '{}' in state {:?}",
                self.rec(id).name,
                state
            );
            return;
        }

        {
            let rec = self.rec(id);
            if rec.have_console && !rec.flags.runs_on_console {
                self.platform.restore_terminal();
                self.release_console(id);
            }
        }

        info!("Service '{}' started", self.rec(id).name);
        self.rec_mut(id).state = ServiceState::Started;
        self.notify_listeners(id, ServiceEvent::Started);

        let flags = self.rec(id).flags;
        if flags.rw_ready {
            self.platform.rootfs_is_rw();
        }
        if flags.log_ready {
            self.platform.setup_external_log();
        }

        {
            let rec = self.rec(id);
            if rec.force_stop || rec.desired_state == TargetState::Stopped {
                self.do_stop(id);
                return;
            }
        }

        // Wake dependents that were waiting on us
        let dependents = self.rec(id).dependents.clone();
        for from in dependents {
            let n = self.rec(from).depends_on.len();
            for di in 0..n {
                let link = &mut self.rec_mut(from).depends_on[di];
                if link.to == id {
                    link.waiting_on = false;
                }
            }
            self.dependency_started(from);
        }
    }

    /// Payload-completion callback: the payload (or the record itself, for
    /// internal services) has finished going down.
    ///
    /// Runs the terminal protocol: release the console, break soft
    /// incoming activations unless a restart is due, notify dependencies,
    /// then either re-enter the start path (restart) or settle inactive,
    /// chaining to `start_on_completion` after a clean self-termination.
    pub fn stopped(&mut self, id: ServiceId) {
        if self.rec(id).state == ServiceState::Stopped {
            warn!(
                "Ignoring stopped notification for already-stopped service '{}'",
                self.rec(id).name
            );
            return;
        }

        if self.rec(id).have_console {
            self.platform.restore_terminal();
            self.release_console(id);
        }

        self.rec_mut(id).force_stop = false;

        // A restart was arranged if our desired state is still STARTED. (It
        // may have been cancelled by a separately issued stop, including a
        // shutdown.)
        let will_restart = {
            let rec = self.rec(id);
            rec.desired_state == TargetState::Started && !rec.pinned_stopped
        };
        self.rec_mut(id).restarting = false;

        if !will_restart {
            // No restart due: soft dependents must not keep us activated
            let dependents = self.rec(id).dependents.clone();
            for from in dependents {
                let n = self.rec(from).depends_on.len();
                for di in 0..n {
                    let link = &self.rec(from).depends_on[di];
                    if link.to != id || link.is_hard() {
                        continue;
                    }
                    if link.waiting_on {
                        self.rec_mut(from).depends_on[di].waiting_on = false;
                        self.dependency_started(from);
                    }
                    if self.rec(from).depends_on[di].holding_acq {
                        self.rec_mut(from).depends_on[di].holding_acq = false;
                        // release without issuing a stop; we are already
                        // stopped/stopping
                        self.release(id, false);
                    }
                }
            }
        }

        // Dependencies may be waiting for us to stop
        let targets: Vec<ServiceId> = self.rec(id).depends_on.iter().map(|l| l.to).collect();
        for to in targets {
            self.dependent_stopped(to);
        }

        self.rec_mut(id).state = ServiceState::Stopped;

        if will_restart {
            self.rec_mut(id).restarting = true;
            self.initiate_start(id);
        } else {
            self.rec_mut(id).model.becoming_inactive();
            if self.rec(id).start_explicit {
                self.rec_mut(id).start_explicit = false;
                self.release(id, false);
            }
            if self.rec(id).required_by == 0 {
                self.service_inactive(id);
            }
        }

        // A start failure was already logged; only log ordinary stops, and
        // only chain when the service finished cleanly on its own.
        if !self.rec(id).start_failed {
            info!("Service '{}' stopped", self.rec(id).name);

            let chain = {
                let rec = self.rec(id);
                if rec.stop_reason.is_self_termination()
                    && rec.exit_status == Some(0)
                    && !will_restart
                    && !self.shutting_down
                {
                    rec.start_on_completion.clone()
                } else {
                    None
                }
            };
            if let Some(chain_name) = chain {
                match self.load_service(&chain_name) {
                    Ok(chain_id) => self.start(chain_id),
                    Err(e) => error!(
                        "Couldn't chain to service '{}' from '{}': {}",
                        chain_name,
                        self.rec(id).name,
                        e
                    ),
                }
            }
        }

        self.notify_listeners(id, ServiceEvent::Stopped);
    }

    /// Payload-failure callback: the payload refused to come up.
    pub fn failed_to_start(&mut self, id: ServiceId) {
        self.rec_mut(id).stop_reason = StopReason::Failed;
        self.fail_start(id, false, true);
    }

    /// Payload-termination callback: the payload exited of its own accord.
    pub fn payload_terminated(&mut self, id: ServiceId, exit_status: i32) {
        self.rec_mut(id).exit_status = Some(exit_status);
        match self.rec(id).state {
            ServiceState::Starting => {
                self.rec_mut(id).stop_reason = StopReason::Failed;
                self.fail_start(id, false, true);
            }
            ServiceState::Started => {
                self.rec_mut(id).stop_reason = StopReason::Terminated;
                let smooth = {
                    let rec = self.rec(id);
                    rec.auto_restart
                        && rec.smooth_recovery
                        && rec.desired_state == TargetState::Started
                        && !self.shutting_down
                };
                if smooth {
                    self.do_smooth_recovery(id);
                } else {
                    self.forced_stop(id);
                }
            }
            ServiceState::Stopping => {
                self.rec_mut(id).stop_reason = StopReason::Terminated;
                if !self.rec(id).waiting_for_deps {
                    self.stopped(id);
                }
            }
            ServiceState::Stopped => {}
        }
    }

    /// Pin the service in the started state. Ignored while pinned stopped.
    pub fn pin_started(&mut self, id: ServiceId) {
        let rec = self.rec_mut(id);
        if !rec.pinned_stopped {
            rec.pinned_started = true;
        }
    }

    /// Pin the service in the stopped state. Ignored while pinned started.
    pub fn pin_stopped(&mut self, id: ServiceId) {
        let rec = self.rec_mut(id);
        if !rec.pinned_started {
            rec.pinned_stopped = true;
        }
    }

    /// Lift any pin and immediately issue the transition that was deferred
    /// while the pin was in place, running the reactor.
    pub fn unpin(&mut self, id: ServiceId) {
        if self.rec(id).pinned_started {
            self.rec_mut(id).pinned_started = false;
            if self.rec(id).state == ServiceState::Started {
                // If we reached zero activation under the pin, the release
                // propagation was suppressed; issue it now.
                if self.rec(id).required_by == 0 {
                    self.rec_mut(id).prop_release = true;
                    self.add_prop_queue(id);
                }
                let rec = self.rec(id);
                if rec.desired_state == TargetState::Stopped || rec.force_stop {
                    self.do_stop(id);
                    self.process_queues();
                }
            }
        }
        if self.rec(id).pinned_stopped {
            self.rec_mut(id).pinned_stopped = false;
            let rec = self.rec(id);
            if rec.state == ServiceState::Stopped && rec.desired_state == TargetState::Started {
                self.rec_mut(id).prop_start = true;
                self.add_prop_queue(id);
                self.process_queues();
            }
        }
    }

    // ---- activation accounting ----

    /// Another service (or an explicit request) requires this one.
    pub(crate) fn require(&mut self, id: ServiceId) {
        let rec = self.rec_mut(id);
        let was_idle = rec.required_by == 0;
        rec.required_by += 1;
        if was_idle
            && rec.state != ServiceState::Starting
            && rec.state != ServiceState::Started
        {
            // Start lazily through the queue; our own dependencies are
            // required when the start propagates. The pin is checked in
            // do_start.
            rec.prop_start = true;
            self.add_prop_queue(id);
        }
    }

    /// Drop one activation. On reaching zero the service's desired state
    /// becomes stopped, dependency releases are scheduled, and (unless
    /// `issue_stop` is false or a pin intervenes) the service is stopped.
    pub(crate) fn release(&mut self, id: ServiceId, issue_stop: bool) {
        let rec = self.rec_mut(id);
        debug_assert!(rec.required_by > 0, "release without matching require");
        rec.required_by -= 1;
        if rec.required_by != 0 {
            return;
        }

        if rec.state == ServiceState::Stopping && rec.desired_state == TargetState::Started {
            // A pending restart is being cancelled; other start-cancelled
            // cases are handled by do_stop.
            self.notify_listeners(id, ServiceEvent::StartCancelled);
        }
        let rec = self.rec_mut(id);
        rec.desired_state = TargetState::Stopped;

        if rec.pinned_started {
            return;
        }

        // No release needs to be issued if a require is still pending.
        rec.prop_release = !rec.prop_require;
        rec.prop_require = false;
        if rec.prop_release && rec.state != ServiceState::Stopped {
            self.add_prop_queue(id);
        }

        let state = self.rec(id).state;
        if state != ServiceState::Stopped && state != ServiceState::Stopping && issue_stop {
            self.rec_mut(id).stop_reason = StopReason::Normal;
            self.do_stop(id);
        }
    }

    fn release_dependencies(&mut self, id: ServiceId) {
        let n = self.rec(id).depends_on.len();
        for di in 0..n {
            let (to, holding) = {
                let link = &self.rec(id).depends_on[di];
                (link.to, link.holding_acq)
            };
            if holding {
                // Clear the hold before releasing, otherwise the target may
                // decide to stop, re-examine this link and release a second
                // time.
                self.rec_mut(id).depends_on[di].holding_acq = false;
                self.release(to, true);
            }
        }
    }

    // ---- start path ----

    fn do_start(&mut self, id: ServiceId) {
        let was_active = self.rec(id).state != ServiceState::Stopped;
        self.rec_mut(id).desired_state = TargetState::Started;

        if self.rec(id).pinned_stopped {
            if !was_active {
                self.fail_start(id, false, false);
            }
            return;
        }

        if was_active {
            // Already starting or started; or stopping, which we may be
            // able to interrupt.
            if self.rec(id).state != ServiceState::Stopping {
                return;
            }

            if !self.can_interrupt_stop(id) {
                // The stop must run to completion; stopped() will re-enter
                // the start path.
                self.rec_mut(id).restarting = true;
                return;
            }

            // Our dependencies might be stopping too, but if so they are
            // waiting for us, so they can return to starting the same way.
            self.notify_listeners(id, ServiceEvent::StopCancelled);
        } else {
            self.service_active(id);
            let rec = self.rec_mut(id);
            rec.prop_require = !rec.prop_release;
            rec.prop_release = false;
            if rec.prop_require {
                self.add_prop_queue(id);
            }
        }

        self.initiate_start(id);
    }

    fn can_interrupt_stop(&self, id: ServiceId) -> bool {
        let rec = self.rec(id);
        rec.waiting_for_deps || rec.model.can_interrupt_stop()
    }

    pub(crate) fn initiate_start(&mut self, id: ServiceId) {
        debug!("Service '{}' starting", self.rec(id).name);
        let rec = self.rec_mut(id);
        rec.start_failed = false;
        rec.start_skipped = false;
        rec.state = ServiceState::Starting;
        rec.waiting_for_deps = true;

        if self.start_check_dependencies(id) {
            self.add_transition_queue(id);
        }
    }

    /// Flag a start on every dependency not yet started. Returns true iff
    /// all dependencies were already started.
    fn start_check_dependencies(&mut self, id: ServiceId) -> bool {
        let mut all_started = true;
        let n = self.rec(id).depends_on.len();
        for di in 0..n {
            let to = self.rec(id).depends_on[di].to;
            let to_state = self.rec(to).state;
            if to_state != ServiceState::Started {
                if to_state != ServiceState::Starting {
                    self.rec_mut(to).prop_start = true;
                    self.add_prop_queue(to);
                }
                self.rec_mut(id).depends_on[di].waiting_on = true;
                all_started = false;
            }
        }
        all_started
    }

    fn check_deps_started(&self, id: ServiceId) -> bool {
        self.rec(id).depends_on.iter().all(|dep| !dep.waiting_on)
    }

    /// Every dependency is started: acquire the console if required, run
    /// the payload's final veto, then bring it up.
    fn all_deps_started(&mut self, id: ServiceId) {
        {
            let rec = self.rec(id);
            if rec.flags.starts_on_console && !rec.have_console {
                self.queue_for_console(id);
                return;
            }
        }

        self.rec_mut(id).waiting_for_deps = false;

        if !self.rec(id).model.can_proceed_to_start() {
            self.rec_mut(id).waiting_for_deps = true;
            return;
        }

        let outcome = self.rec_mut(id).model.bring_up();
        self.rec_mut(id).restarting = false;
        match outcome {
            BringUpOutcome::Complete => {
                self.started(id);
                self.reattach_soft_dependents(id);
            }
            BringUpOutcome::InProgress => {
                self.reattach_soft_dependents(id);
            }
            BringUpOutcome::Failed => {
                self.rec_mut(id).stop_reason = StopReason::Failed;
                self.fail_start(id, false, true);
            }
        }
    }

    /// Soft dependents that kept running while we were down re-acquire
    /// their hold now that we are coming back up.
    fn reattach_soft_dependents(&mut self, id: ServiceId) {
        let dependents = self.rec(id).dependents.clone();
        for from in dependents {
            let from_state = self.rec(from).state;
            if from_state != ServiceState::Started && from_state != ServiceState::Starting {
                continue;
            }
            let n = self.rec(from).depends_on.len();
            for di in 0..n {
                let link = &self.rec(from).depends_on[di];
                if link.to != id || link.is_hard() || link.holding_acq {
                    continue;
                }
                self.rec_mut(from).depends_on[di].holding_acq = true;
                self.rec_mut(id).required_by += 1;
            }
        }
    }

    /// A dependency of this service has started; re-check on the next
    /// transition pass. The started state is included for a service in
    /// smooth recovery, which waits for its dependencies before relaunching
    /// its payload.
    fn dependency_started(&mut self, id: ServiceId) {
        let rec = self.rec(id);
        if (rec.state == ServiceState::Starting || rec.state == ServiceState::Started)
            && rec.waiting_for_deps
        {
            self.add_transition_queue(id);
        }
    }

    // ---- failure path ----

    fn fail_start(&mut self, id: ServiceId, dep_failed: bool, immediate_stop: bool) {
        if self.rec(id).waiting_for_console {
            self.unqueue_console(id);
            self.rec_mut(id).waiting_for_console = false;
        }

        if self.rec(id).start_explicit {
            self.rec_mut(id).start_explicit = false;
            self.release(id, false);
        }

        // Cancel the start of dependents, and drop their holds so our
        // desired state settles to stopped before stopped() runs below;
        // otherwise it would arrange a restart.
        let dependents = self.rec(id).dependents.clone();
        for from in dependents {
            let n = self.rec(from).depends_on.len();
            for di in 0..n {
                if self.rec(from).depends_on[di].to != id {
                    continue;
                }
                match self.rec(from).depends_on[di].dep_type {
                    DependencyType::Regular | DependencyType::Milestone => {
                        // A started hard dependent implies we are started,
                        // so only the starting case needs failure
                        // propagation.
                        if self.rec(from).state == ServiceState::Starting {
                            self.rec_mut(from).prop_failure = true;
                            self.add_prop_queue(from);
                        }
                    }
                    DependencyType::WaitsFor | DependencyType::Soft => {
                        if self.rec(from).depends_on[di].waiting_on {
                            self.rec_mut(from).depends_on[di].waiting_on = false;
                            self.dependency_started(from);
                        }
                    }
                }
                if self.rec(from).depends_on[di].holding_acq {
                    self.rec_mut(from).depends_on[di].holding_acq = false;
                    self.release(id, false);
                }
            }
        }

        self.rec_mut(id).start_failed = true;
        {
            let rec = self.rec(id);
            if rec.pinned_stopped && rec.state == ServiceState::Stopped {
                info!("Service '{}' cannot start: pinned stopped", rec.name);
            } else if dep_failed {
                error!("Service '{}' failed to start: dependency failed", rec.name);
            } else {
                error!("Service '{}' failed to start", rec.name);
            }
        }
        self.notify_listeners(id, ServiceEvent::FailedStart);

        if immediate_stop {
            self.stopped(id);
        }
    }

    // ---- stop path ----

    fn do_stop(&mut self, id: ServiceId) {
        if self.rec(id).pinned_started {
            return;
        }

        let all_deps_stopped = self.stop_dependents(id);

        if self.rec(id).state != ServiceState::Started {
            if self.rec(id).state == ServiceState::Starting {
                let (waiting_for_deps, waiting_for_console) = {
                    let rec = self.rec(id);
                    (rec.waiting_for_deps, rec.waiting_for_console)
                };
                if !waiting_for_deps && !waiting_for_console {
                    // The payload is coming up; ask its policy whether the
                    // start can be abandoned.
                    if !self.rec(id).model.can_interrupt_start() {
                        // We have to continue starting; we can stop once
                        // the started state is reached.
                        return;
                    }
                    if !self.rec_mut(id).model.interrupt_start() {
                        // Startup will still end by itself.
                        self.notify_listeners(id, ServiceEvent::StartCancelled);
                        return;
                    }
                } else if waiting_for_console {
                    self.unqueue_console(id);
                    self.rec_mut(id).waiting_for_console = false;
                }

                self.notify_listeners(id, ServiceEvent::StartCancelled);
                // Start was interruptible; stop now by falling through.
            } else {
                // Already stopping or stopped.
                return;
            }
        }

        debug!("Service '{}' stopping", self.rec(id).name);
        let rec = self.rec_mut(id);
        rec.state = ServiceState::Stopping;
        rec.waiting_for_deps = true;
        if all_deps_stopped {
            self.add_transition_queue(id);
        }
    }

    /// Propagate the stop to dependents: hard holders are stopped (and
    /// force-stopped if we are), soft holders are detached unless a restart
    /// will follow. Returns true iff no hard dependent still blocks us.
    fn stop_dependents(&mut self, id: ServiceId) -> bool {
        let mut all_deps_stopped = true;
        let (force, keep_soft) = {
            let rec = self.rec(id);
            (rec.force_stop, rec.auto_restart || rec.restarting)
        };

        let dependents = self.rec(id).dependents.clone();
        for from in dependents {
            let n = self.rec(from).depends_on.len();
            for di in 0..n {
                let (to, is_hard, holding, waiting) = {
                    let link = &self.rec(from).depends_on[di];
                    (link.to, link.is_hard(), link.holding_acq, link.waiting_on)
                };
                if to != id || !holding {
                    continue;
                }
                if is_hard {
                    if !self.rec(from).state.is_stopped() {
                        // The dependent will be issued a stop and notifies
                        // us when it is down; stop_check_dependents runs
                        // then.
                        all_deps_stopped = false;
                    }
                    if force {
                        self.forced_stop(from);
                    }
                    self.rec_mut(from).prop_stop = true;
                    self.add_prop_queue(from);
                } else if !keep_soft {
                    // Soft holds are retained across a restart, broken
                    // otherwise.
                    if waiting {
                        self.rec_mut(from).depends_on[di].waiting_on = false;
                        self.dependency_started(from);
                    }
                    self.rec_mut(from).depends_on[di].holding_acq = false;
                    self.release(id, false);
                }
            }
        }

        all_deps_stopped
    }

    fn stop_check_dependents(&self, id: ServiceId) -> bool {
        let rec = self.rec(id);
        for &from in &rec.dependents {
            for link in &self.rec(from).depends_on {
                if link.to == id && link.is_hard() && link.holding_acq {
                    return false;
                }
            }
        }
        true
    }

    /// A dependent of this service has stopped; re-check on the next
    /// transition pass.
    fn dependent_stopped(&mut self, id: ServiceId) {
        let rec = self.rec(id);
        if rec.state == ServiceState::Stopping && rec.waiting_for_deps {
            self.add_transition_queue(id);
        }
    }

    fn initiate_bring_down(&mut self, id: ServiceId) {
        match self.rec_mut(id).model.bring_down() {
            BringDownOutcome::Complete => self.stopped(id),
            BringDownOutcome::InProgress => {}
        }
    }

    // ---- smooth recovery ----

    fn do_smooth_recovery(&mut self, id: ServiceId) {
        debug!("Service '{}' entering smooth recovery", self.rec(id).name);
        let rec = self.rec_mut(id);
        rec.restarting = true;
        rec.waiting_for_deps = true;
        if self.start_check_dependencies(id) {
            self.add_transition_queue(id);
        }
    }

    // ---- reactor steps ----

    /// Consume this record's propagation bits, in fixed order: activation
    /// changes settle before the start/stop decisions that read them.
    pub(crate) fn do_propagation(&mut self, id: ServiceId) {
        if self.rec(id).prop_require {
            let n = self.rec(id).depends_on.len();
            for di in 0..n {
                let to = self.rec(id).depends_on[di].to;
                self.rec_mut(id).depends_on[di].holding_acq = true;
                self.require(to);
            }
            self.rec_mut(id).prop_require = false;
        }

        if self.rec(id).prop_release {
            self.release_dependencies(id);
            self.rec_mut(id).prop_release = false;
        }

        if self.rec(id).prop_failure {
            self.rec_mut(id).prop_failure = false;
            self.rec_mut(id).stop_reason = StopReason::DepFailed;
            self.fail_start(id, true, true);
        }

        if self.rec(id).prop_start {
            self.rec_mut(id).prop_start = false;
            self.do_start(id);
        }

        if self.rec(id).prop_stop {
            self.rec_mut(id).prop_stop = false;
            self.do_stop(id);
        }
    }

    /// One transition step for a queued record.
    pub(crate) fn execute_transition(&mut self, id: ServiceId) {
        let (state, restarting) = {
            let rec = self.rec(id);
            (rec.state, rec.restarting)
        };

        if state == ServiceState::Starting || (state == ServiceState::Started && restarting) {
            if self.check_deps_started(id) {
                self.all_deps_started(id);
            }
        } else if state == ServiceState::Stopping && self.stop_check_dependents(id) {
            self.rec_mut(id).waiting_for_deps = false;

            // A service actually stopping has its explicit activation
            // released, unless it will restart.
            let release_explicit = {
                let rec = self.rec(id);
                rec.start_explicit && !rec.auto_restart && !rec.restarting
            };
            if release_explicit {
                self.rec_mut(id).start_explicit = false;
                self.release(id, false);
            }

            self.initiate_bring_down(id);
        }
    }

    // ---- console ----

    fn queue_for_console(&mut self, id: ServiceId) {
        self.rec_mut(id).waiting_for_console = true;
        self.append_console_queue(id);
    }

    /// The console has been granted to this service.
    pub(crate) fn acquired_console(&mut self, id: ServiceId) {
        if self.rec(id).state != ServiceState::Starting {
            // Granted, but no longer wanted.
            self.release_console(id);
        } else if self.check_deps_started(id) {
            self.all_deps_started(id);
        } else {
            // Granted, but not usable yet.
            self.release_console(id);
        }
    }

    // ---- listeners ----

    pub(crate) fn notify_listeners(&mut self, id: ServiceId, event: ServiceEvent) {
        let listeners = self.rec(id).listeners.clone();
        for listener in listeners {
            listener.service_event(id, event);
        }
    }
}
