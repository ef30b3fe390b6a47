//! Activation Controller
//!
//! The controller turns visibility notifications into one-shot activations.
//!
//! # How It Works
//!
//! 1. `register` stores a `Pending` latch together with the caller's
//!    activation closure and starts watching the region.
//!
//! 2. The first `visible = true` notification flips the latch to
//!    `Activated`, runs the closure, and releases the watcher handle. Any
//!    notification still in flight afterwards is ignored.
//!
//! 3. `reset` re-arms an activated latch; `unregister` disconnects it for
//!    good and drops the closure.
//!
//! # Re-entrancy
//!
//! The controller lock is never held while user code runs. Activation
//! closures may register, reset or unregister anything, themselves
//! included.
//!
//! # Errors
//!
//! Activation errors are not swallowed. They come back as
//! [`ViewportError::Activation`] from whichever call delivered the
//! triggering notification: [`poll`] normally, or [`register`] when the
//! platform cannot observe and the region activates on the spot. The latch
//! still counts as activated and observation is still released.
//!
//! [`poll`]: ActivationController::poll
//! [`register`]: ActivationController::register

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::guard::ActivationGuard;
use super::latch::{LatchState, RegistrationId};
use crate::config::ActivationConfig;
use crate::error::{CallbackError, Result, ViewportError};
use crate::observe::{
    IntersectionPlatform, ViewportWatcher, VisibilityCallback, WatchRegion, WatcherHandle, WeakWatcher,
};

/// Caller-supplied activation action.
pub type ActivateFn = Box<dyn FnMut() -> std::result::Result<(), CallbackError> + Send>;

struct Registration {
    region: WatchRegion,
    /// Only `Pending` or `Activated`; disconnected registrations are removed.
    latch: LatchState,
    handle: Option<WatcherHandle>,
    /// `None` while the activation runs.
    activate: Option<ActivateFn>,
    /// Re-armed and seen visible while its own activation was running.
    refire: bool,
    activations: u32,
}

struct ControllerState {
    registrations: IndexMap<RegistrationId, Registration>,
    /// Activations owed from a previous turn, fired at the start of `poll`.
    deferred: Vec<RegistrationId>,
    next_id: u64,
}

impl ControllerState {
    fn count(&self, latch: LatchState) -> usize {
        self.registrations
            .values()
            .filter(|reg| reg.latch == latch)
            .count()
    }
}

/// Fires a one-shot activation per registered region.
///
/// # Example
///
/// ```rust,ignore
/// let viewport = SimulatedViewport::new(1280.0, 720.0);
/// let controller = ActivationController::new(viewport.clone());
///
/// let hero = RegionId::new();
/// viewport.place(hero, Rect::new(0.0, 2000.0, 400.0, 300.0));
/// controller.register(ActivationConfig::default().region(hero), || {
///     println!("start loading hero image");
///     Ok(())
/// })?;
///
/// viewport.scroll_to(0.0, 1600.0);
/// controller.poll()?; // prints once
/// ```
pub struct ActivationController<P> {
    watcher: ViewportWatcher<P>,
    state: Arc<Mutex<ControllerState>>,
}

impl<P> Clone for ActivationController<P> {
    fn clone(&self) -> Self {
        Self {
            watcher: self.watcher.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<P: IntersectionPlatform + 'static> ActivationController<P> {
    pub fn new(platform: P) -> Self {
        Self::from_watcher(ViewportWatcher::new(platform))
    }

    pub fn with_config(platform: P, config: &ActivationConfig) -> Self {
        Self::from_watcher(ViewportWatcher::with_config(platform, config))
    }

    /// Build a controller on an existing watcher. The controller only
    /// touches handles it created itself.
    pub fn from_watcher(watcher: ViewportWatcher<P>) -> Self {
        Self {
            watcher,
            state: Arc::new(Mutex::new(ControllerState {
                registrations: IndexMap::new(),
                deferred: Vec::new(),
                next_id: 0,
            })),
        }
    }

    pub fn watcher(&self) -> &ViewportWatcher<P> {
        &self.watcher
    }

    /// Register `activate` to run once `region` first becomes visible.
    ///
    /// If the region activates during this call (fail-open) and the
    /// activation fails, the error names the new registration so the caller
    /// can still unregister it.
    pub fn register<F>(&self, region: WatchRegion, activate: F) -> Result<RegistrationId>
    where
        F: FnMut() -> std::result::Result<(), CallbackError> + Send + 'static,
    {
        region.validate()?;

        let id = {
            let mut state = self.state.lock();
            let id = RegistrationId(state.next_id);
            state.next_id += 1;
            state.registrations.insert(
                id,
                Registration {
                    region,
                    latch: LatchState::Pending,
                    handle: None,
                    activate: Some(Box::new(activate)),
                    refire: false,
                    activations: 0,
                },
            );
            id
        };
        debug!(registration = %id, region = %region.id, "registered region");

        match self.arm(id, region) {
            Ok(()) => Ok(id),
            Err(err @ ViewportError::Activation { .. }) => Err(err),
            Err(err) => {
                let removed = self.state.lock().registrations.shift_remove(&id);
                drop(removed);
                Err(err)
            }
        }
    }

    /// Like [`register`](Self::register), but unregisters when the returned
    /// guard is dropped.
    pub fn register_scoped<F>(&self, region: WatchRegion, activate: F) -> Result<ActivationGuard<P>>
    where
        F: FnMut() -> std::result::Result<(), CallbackError> + Send + 'static,
    {
        let id = self.register(region, activate)?;
        Ok(ActivationGuard::new(self.clone(), id))
    }

    /// Return an activated latch to `Pending` and resume observation.
    ///
    /// A pending latch is left alone. Disconnected registrations cannot be
    /// revived.
    pub fn reset(&self, id: RegistrationId) -> Result<()> {
        let region = {
            let mut state = self.state.lock();
            let Some(reg) = state.registrations.get_mut(&id) else {
                return Err(ViewportError::Disconnected(id));
            };
            match reg.latch {
                LatchState::Pending => return Ok(()),
                LatchState::Activated => {
                    reg.latch = LatchState::Pending;
                    reg.region
                }
                LatchState::Disconnected => return Err(ViewportError::Disconnected(id)),
            }
        };

        debug!(registration = %id, "reset latch");
        self.arm(id, region)
    }

    /// Disconnect a registration and drop its activation closure.
    ///
    /// Returns `false` if it was already disconnected.
    pub fn unregister(&self, id: RegistrationId) -> bool {
        let removed = self.state.lock().registrations.shift_remove(&id);
        let Some(reg) = removed else {
            trace!(registration = %id, "unregister of disconnected registration");
            return false;
        };

        if let Some(handle) = reg.handle {
            self.watcher.unobserve(handle);
        }
        debug!(registration = %id, region = %reg.region.id, "unregistered region");
        true
    }

    /// Run one event-loop turn. Returns the number of deferred activations
    /// and visibility notifications delivered.
    ///
    /// A registration re-armed from inside its own activation and found
    /// visible straight away fires here, one turn later.
    pub fn poll(&self) -> Result<usize> {
        let deferred = std::mem::take(&mut self.state.lock().deferred);
        let state = Arc::downgrade(&self.state);
        let watcher = self.watcher.downgrade();

        let mut delivered = 0;
        for (index, &id) in deferred.iter().enumerate() {
            if let Err(err) = activate_once(&state, &watcher, id) {
                let rest = deferred[index + 1..].iter().copied();
                self.state.lock().deferred.splice(0..0, rest);
                return Err(err);
            }
            delivered += 1;
        }

        Ok(delivered + self.watcher.poll()?)
    }

    /// Latch state, or `None` for ids this controller never issued.
    pub fn latch(&self, id: RegistrationId) -> Option<LatchState> {
        let state = self.state.lock();
        match state.registrations.get(&id) {
            Some(reg) => Some(reg.latch),
            None if id.0 < state.next_id => Some(LatchState::Disconnected),
            None => None,
        }
    }

    /// How many times a registration has activated across resets.
    pub fn activations(&self, id: RegistrationId) -> Option<u32> {
        self.state
            .lock()
            .registrations
            .get(&id)
            .map(|reg| reg.activations)
    }

    /// Number of live (not disconnected) registrations.
    pub fn len(&self) -> usize {
        self.state.lock().registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().count(LatchState::Pending)
    }

    pub fn activated_count(&self) -> usize {
        self.state.lock().count(LatchState::Activated)
    }

    /// Start observing for a pending registration.
    fn arm(&self, id: RegistrationId, region: WatchRegion) -> Result<()> {
        let handle = self.watcher.observe_with(region, self.visibility_callback(id))?;

        let stale = {
            let mut state = self.state.lock();
            match state.registrations.get_mut(&id) {
                Some(reg) if reg.latch == LatchState::Pending && reg.handle.is_none() => {
                    reg.handle = Some(handle);
                    false
                }
                // Activated on the spot, or unregistered meanwhile.
                _ => true,
            }
        };

        if stale {
            self.watcher.unobserve(handle);
        }
        Ok(())
    }

    fn visibility_callback(&self, id: RegistrationId) -> VisibilityCallback {
        let state = Arc::downgrade(&self.state);
        let watcher = self.watcher.downgrade();
        Box::new(move |_handle: WatcherHandle, visible: bool| {
            if !visible {
                return Ok(());
            }
            activate_once(&state, &watcher, id)
        })
    }
}

/// Fire the activation for `id` if its latch is still pending.
fn activate_once<P: IntersectionPlatform>(
    state: &Weak<Mutex<ControllerState>>,
    watcher: &WeakWatcher<P>,
    id: RegistrationId,
) -> Result<()> {
    let Some(state) = state.upgrade() else {
        return Ok(());
    };

    let (mut activate, handle) = {
        let mut guard = state.lock();
        let Some(reg) = guard.registrations.get_mut(&id) else {
            return Ok(());
        };
        if reg.latch != LatchState::Pending {
            trace!(registration = %id, latch = %reg.latch, "ignoring visibility after activation");
            return Ok(());
        }
        let Some(activate) = reg.activate.take() else {
            // Reset from inside its own activation; fire again next turn.
            trace!(registration = %id, "visible again while activating");
            reg.refire = true;
            return Ok(());
        };
        reg.latch = LatchState::Activated;
        reg.activations += 1;
        (activate, reg.handle.take())
    };

    debug!(registration = %id, "activating region");
    let result = activate();

    if let (Some(handle), Some(watcher)) = (handle, watcher.upgrade()) {
        watcher.unobserve(handle);
    }

    let orphaned = {
        let mut guard = state.lock();
        let inner = &mut *guard;
        match inner.registrations.get_mut(&id) {
            Some(reg) => {
                reg.activate = Some(activate);
                if std::mem::take(&mut reg.refire) {
                    inner.deferred.push(id);
                }
                None
            }
            // Unregistered from inside its own activation.
            None => Some(activate),
        }
    };
    drop(orphaned);

    result.map_err(|source| ViewportError::Activation {
        registration: id,
        source,
    })
}

impl<P> fmt::Debug for ActivationController<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ActivationController")
            .field("registrations", &state.registrations.len())
            .field("pending", &state.count(LatchState::Pending))
            .field("activated", &state.count(LatchState::Activated))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::{NoObservation, Rect, RegionId, RootMargin, SimulatedViewport};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() -> std::result::Result<(), CallbackError> + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn setup() -> (SimulatedViewport, ActivationController<SimulatedViewport>) {
        let viewport = SimulatedViewport::new(800.0, 600.0);
        let controller = ActivationController::new(viewport.clone());
        (viewport, controller)
    }

    #[test]
    fn activates_once_when_visible() {
        let (viewport, controller) = setup();
        let region = RegionId::new();
        viewport.place(region, Rect::new(0.0, 1000.0, 200.0, 200.0));

        let (count, activate) = counter();
        let id = controller
            .register(WatchRegion::new(region).with_threshold(0.1), activate)
            .unwrap();
        controller.poll().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(controller.latch(id), Some(LatchState::Pending));

        viewport.scroll_to(0.0, 700.0);
        controller.poll().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(controller.latch(id), Some(LatchState::Activated));

        // Observation was released.
        assert_eq!(viewport.observer_count(), 0);
        assert!(controller.watcher().is_empty());

        viewport.scroll_to(0.0, 0.0);
        viewport.scroll_to(0.0, 700.0);
        controller.poll().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn never_visible_never_activates() {
        let (viewport, controller) = setup();
        let region = RegionId::new();
        viewport.place(region, Rect::new(0.0, 5000.0, 200.0, 200.0));

        let (count, activate) = counter();
        controller
            .register(
                WatchRegion::new(region)
                    .with_threshold(0.1)
                    .with_margin(RootMargin::px(50)),
                activate,
            )
            .unwrap();

        for step in 0..20 {
            viewport.scroll_to(0.0, f64::from(step) * 100.0);
            controller.poll().unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(controller.pending_count(), 1);
    }

    #[test]
    fn reset_rearms_for_exactly_one_more_activation() {
        let (viewport, controller) = setup();
        let region = RegionId::new();
        viewport.place(region, Rect::new(0.0, 0.0, 100.0, 100.0));

        let (count, activate) = counter();
        let id = controller.register(WatchRegion::new(region), activate).unwrap();
        controller.poll().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        controller.reset(id).unwrap();
        assert_eq!(controller.latch(id), Some(LatchState::Pending));
        controller.poll().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(controller.activations(id), Some(2));

        controller.poll().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reset_of_pending_is_a_no_op() {
        let (_viewport, controller) = setup();
        let id = controller
            .register(WatchRegion::new(RegionId::new()), || Ok(()))
            .unwrap();
        controller.reset(id).unwrap();
        assert_eq!(controller.watcher().len(), 1);
    }

    #[test]
    fn unregister_is_idempotent_and_terminal() {
        let (viewport, controller) = setup();
        let region = RegionId::new();
        viewport.place(region, Rect::new(0.0, 0.0, 100.0, 100.0));

        let (count, activate) = counter();
        let id = controller.register(WatchRegion::new(region), activate).unwrap();

        assert!(controller.unregister(id));
        assert!(!controller.unregister(id));
        assert_eq!(controller.latch(id), Some(LatchState::Disconnected));
        assert!(matches!(controller.reset(id), Err(ViewportError::Disconnected(_))));

        controller.poll().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(viewport.observer_count(), 0);
    }

    #[test]
    fn unregister_releases_activation_closure() {
        let (_viewport, controller) = setup();
        let payload = Arc::new(());
        let held = Arc::clone(&payload);
        let id = controller
            .register(WatchRegion::new(RegionId::new()), move || {
                drop(Arc::clone(&held));
                Ok(())
            })
            .unwrap();
        assert_eq!(Arc::strong_count(&payload), 2);

        controller.unregister(id);
        assert_eq!(Arc::strong_count(&payload), 1);
    }

    #[test]
    fn fail_open_activates_during_register() {
        let controller = ActivationController::new(NoObservation);
        let (count, activate) = counter();
        let id = controller
            .register(WatchRegion::new(RegionId::new()), activate)
            .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(controller.latch(id), Some(LatchState::Activated));
        controller.poll().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn activation_error_propagates_from_poll() {
        let (viewport, controller) = setup();
        let region = RegionId::new();
        viewport.place(region, Rect::new(0.0, 0.0, 100.0, 100.0));

        let id = controller
            .register(WatchRegion::new(region), || Err("404 for avatar.webp".into()))
            .unwrap();

        match controller.poll() {
            Err(ViewportError::Activation { registration, source }) => {
                assert_eq!(registration, id);
                assert_eq!(source.to_string(), "404 for avatar.webp");
            }
            other => panic!("expected activation error, got {other:?}"),
        }
        assert_eq!(controller.latch(id), Some(LatchState::Activated));
        assert_eq!(viewport.observer_count(), 0);
    }

    #[test]
    fn fail_open_activation_error_names_registration() {
        let controller = ActivationController::new(NoObservation);
        let err = controller
            .register(WatchRegion::new(RegionId::new()), || Err("boom".into()))
            .unwrap_err();
        let ViewportError::Activation { registration, .. } = err else {
            panic!("expected activation error");
        };
        assert_eq!(controller.latch(registration), Some(LatchState::Activated));
        assert!(controller.unregister(registration));
    }

    /// Runs `activate` and calls `reset` on itself during its `nth` run.
    fn resetting_on_run(
        controller: &ActivationController<impl IntersectionPlatform + 'static>,
        nth: usize,
    ) -> (Arc<AtomicUsize>, Arc<Mutex<Option<RegistrationId>>>, impl FnMut() -> std::result::Result<(), CallbackError> + Send + 'static) {
        let runs = Arc::new(AtomicUsize::new(0));
        let own_id = Arc::new(Mutex::new(None));
        let (counter, cell, handle) = (Arc::clone(&runs), Arc::clone(&own_id), controller.clone());
        (runs, own_id, move || {
            let run = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if run == nth {
                if let Some(id) = *cell.lock() {
                    handle.reset(id)?;
                }
            }
            Ok(())
        })
    }

    #[test]
    fn reset_inside_activation_fires_next_turn_when_failing_open() {
        let controller = ActivationController::new(NoObservation);
        let (runs, own_id, activate) = resetting_on_run(&controller, 2);
        let id = controller
            .register(WatchRegion::new(RegionId::new()), activate)
            .unwrap();
        *own_id.lock() = Some(id);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // Second run re-arms itself while still running.
        controller.reset(id).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(controller.latch(id), Some(LatchState::Pending));

        assert_eq!(controller.poll().unwrap(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(controller.latch(id), Some(LatchState::Activated));

        controller.poll().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn reset_inside_activation_fires_next_turn_when_observing() {
        let (viewport, controller) = setup();
        let region = RegionId::new();
        viewport.place(region, Rect::new(0.0, 0.0, 100.0, 100.0));

        let (runs, own_id, activate) = resetting_on_run(&controller, 1);
        let id = controller.register(WatchRegion::new(region), activate).unwrap();
        *own_id.lock() = Some(id);

        controller.poll().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(controller.latch(id), Some(LatchState::Pending));

        controller.poll().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(controller.latch(id), Some(LatchState::Activated));
        assert_eq!(viewport.observer_count(), 0);

        controller.poll().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn invalid_region_is_not_registered() {
        let (_viewport, controller) = setup();
        let result = controller.register(WatchRegion::new(RegionId::new()).with_threshold(1.2), || Ok(()));
        assert!(matches!(result, Err(ViewportError::InvalidThreshold(_))));
        assert!(controller.is_empty());
    }

    #[test]
    fn fail_closed_unavailable_is_not_registered() {
        let config = ActivationConfig {
            fail_open: false,
            ..ActivationConfig::default()
        };
        let controller = ActivationController::with_config(NoObservation, &config);
        let result = controller.register(WatchRegion::new(RegionId::new()), || Ok(()));
        assert!(matches!(result, Err(ViewportError::ObservationUnavailable)));
        assert!(controller.is_empty());
    }

    #[test]
    fn counts_by_latch() {
        let (viewport, controller) = setup();
        let near = RegionId::new();
        let far = RegionId::new();
        viewport.place(near, Rect::new(0.0, 0.0, 10.0, 10.0));
        viewport.place(far, Rect::new(0.0, 9000.0, 10.0, 10.0));

        controller.register(WatchRegion::new(near), || Ok(())).unwrap();
        controller.register(WatchRegion::new(far), || Ok(())).unwrap();
        controller.poll().unwrap();

        assert_eq!(controller.len(), 2);
        assert_eq!(controller.activated_count(), 1);
        assert_eq!(controller.pending_count(), 1);
    }
}
