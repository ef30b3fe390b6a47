//! Viewport Watcher
//!
//! The watcher turns raw platform intersection records into per-region
//! boolean visibility notifications.
//!
//! # How It Works
//!
//! 1. `observe` validates the region and attaches it to a platform
//!    observer. Observers are pooled: every distinct
//!    `(threshold, margin, root)` tuple shares one platform observer.
//!
//! 2. `poll` runs one event-loop turn. It drains the platform's queued
//!    records, folds each into the owning handles' visibility, drops
//!    repeats, and delivers the remaining notifications oldest first.
//!
//!    Notifications raised while the turn runs wait for the next one.
//!
//! 3. `unobserve` detaches a handle. The platform observer is disconnected
//!    once its last handle is gone.
//!
//! # Re-entrancy
//!
//! Callbacks are always invoked with the internal lock released, and a
//! callback is taken out of its slot while it runs. Any watcher method,
//! including `unobserve` on the handle currently being notified, may be
//! called from inside a callback.
//!
//! # Fail-open
//!
//! When the platform cannot observe at all, `observe` reports
//! `visible = true` immediately and exactly once, then forgets the
//! callback. Content in degraded environments still renders.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::geometry::Intersection;
use super::margin::RootMargin;
use super::platform::{IntersectionEntry, IntersectionPlatform, ObserverId, ObserverOptions};
use super::region::{RootId, WatchRegion};
use crate::config::ActivationConfig;
use crate::error::{CallbackError, Result, ViewportError};

/// Handle returned by [`ViewportWatcher::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatcherHandle(u64);

impl fmt::Display for WatcherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch#{}", self.0)
    }
}

/// Internal callback form. Receives its own handle so errors can name it.
pub(crate) type VisibilityCallback = Box<dyn FnMut(WatcherHandle, bool) -> Result<()> + Send>;

/// Pooling key: regions sharing all three share a platform observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ObserverKey {
    threshold_bits: u64,
    margin: RootMargin,
    root: Option<RootId>,
}

impl From<&WatchRegion> for ObserverKey {
    fn from(region: &WatchRegion) -> Self {
        Self {
            threshold_bits: region.threshold.to_bits(),
            margin: region.margin,
            root: region.root,
        }
    }
}

#[derive(Debug)]
struct PooledObserver {
    id: ObserverId,
    handles: SmallVec<[WatcherHandle; 4]>,
}

struct Slot {
    region: WatchRegion,
    key: ObserverKey,
    /// Last visibility queued for delivery.
    last: Option<bool>,
    /// `None` while the callback is running.
    callback: Option<VisibilityCallback>,
}

struct WatcherState<P> {
    platform: P,
    fail_open: bool,
    pool: IndexMap<ObserverKey, PooledObserver>,
    slots: IndexMap<WatcherHandle, Slot>,
    /// Notifications waiting to be delivered, oldest first.
    backlog: VecDeque<(WatcherHandle, bool)>,
    next_handle: u64,
}

impl<P: IntersectionPlatform> WatcherState<P> {
    fn fold_entry(&mut self, entry: IntersectionEntry) {
        let Some(group) = self.pool.values().find(|group| group.id == entry.observer) else {
            trace!(observer = %entry.observer, "dropping record for released observer");
            return;
        };

        let hit = Intersection {
            is_intersecting: entry.is_intersecting,
            ratio: entry.ratio,
        };
        for handle in &group.handles {
            let Some(slot) = self.slots.get_mut(handle) else {
                continue;
            };
            if slot.region.id != entry.target {
                continue;
            }
            let visible = hit.meets(slot.region.threshold);
            if slot.last == Some(visible) {
                continue;
            }
            slot.last = Some(visible);
            self.backlog.push_back((*handle, visible));
        }
    }
}

/// Reports per-region visibility changes on top of an
/// [`IntersectionPlatform`].
///
/// Cloning is cheap; clones share state.
pub struct ViewportWatcher<P> {
    state: Arc<Mutex<WatcherState<P>>>,
}

/// Non-owning watcher reference, held by callbacks that live inside the
/// watcher itself.
pub(crate) struct WeakWatcher<P> {
    state: Weak<Mutex<WatcherState<P>>>,
}

impl<P> WeakWatcher<P> {
    pub(crate) fn upgrade(&self) -> Option<ViewportWatcher<P>> {
        self.state.upgrade().map(|state| ViewportWatcher { state })
    }
}

impl<P> Clone for ViewportWatcher<P> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<P: IntersectionPlatform> ViewportWatcher<P> {
    /// Create a watcher with the default (fail-open) configuration.
    pub fn new(platform: P) -> Self {
        Self::with_config(platform, &ActivationConfig::default())
    }

    pub fn with_config(platform: P, config: &ActivationConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(WatcherState {
                platform,
                fail_open: config.fail_open,
                pool: IndexMap::new(),
                slots: IndexMap::new(),
                backlog: VecDeque::new(),
                next_handle: 0,
            })),
        }
    }

    /// Start watching `region`.
    ///
    /// `on_change` receives the initial visibility on the next [`poll`]
    /// and then once per threshold crossing in either direction. Errors it
    /// returns surface as [`ViewportError::Callback`].
    ///
    /// [`poll`]: ViewportWatcher::poll
    pub fn observe<F>(&self, region: WatchRegion, mut on_change: F) -> Result<WatcherHandle>
    where
        F: FnMut(bool) -> std::result::Result<(), CallbackError> + Send + 'static,
    {
        self.observe_with(
            region,
            Box::new(move |handle: WatcherHandle, visible: bool| {
                on_change(visible).map_err(|source| ViewportError::Callback { handle, source })
            }),
        )
    }

    pub(crate) fn observe_with(
        &self,
        region: WatchRegion,
        mut callback: VisibilityCallback,
    ) -> Result<WatcherHandle> {
        region.validate()?;

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let handle = WatcherHandle(state.next_handle);
        state.next_handle += 1;

        // Records queued before this call predate the new handle, even when
        // they name the same element. Fold them now so none can pass for its
        // initial entry.
        for entry in state.platform.take_records() {
            state.fold_entry(entry);
        }

        let key = ObserverKey::from(&region);
        let observer = match state.pool.get(&key) {
            Some(group) => Ok(group.id),
            None => state.platform.create_observer(ObserverOptions::from(&region)),
        };

        let observer = match observer {
            Ok(observer) => observer,
            Err(ViewportError::ObservationUnavailable) if state.fail_open => {
                drop(guard);
                warn!(region = %region.id, %handle, "intersection observation unavailable, activating immediately");
                callback(handle, true)?;
                return Ok(handle);
            }
            Err(err) => return Err(err),
        };

        let group = state.pool.entry(key).or_insert_with(|| PooledObserver {
            id: observer,
            handles: SmallVec::new(),
        });

        // A sibling already watching the same element means the platform
        // will not queue a fresh initial record; reuse the sibling's state.
        let sibling = group
            .handles
            .iter()
            .filter_map(|h| state.slots.get(h))
            .find(|slot| slot.region.id == region.id)
            .map(|slot| slot.last);

        let mut last = None;
        match sibling {
            None => state.platform.observe(observer, region.id),
            Some(Some(visible)) => {
                last = Some(visible);
                state.backlog.push_back((handle, visible));
            }
            // The sibling's initial record is still queued and will reach
            // both handles.
            Some(None) => {}
        }

        group.handles.push(handle);
        state.slots.insert(
            handle,
            Slot {
                region,
                key,
                last,
                callback: Some(callback),
            },
        );

        debug!(region = %region.id, %handle, %observer, threshold = region.threshold, margin = %region.margin, "observing region");
        Ok(handle)
    }

    /// Stop watching. Returns `false` if the handle was already released.
    pub fn unobserve(&self, handle: WatcherHandle) -> bool {
        let removed = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(slot) = state.slots.shift_remove(&handle) else {
                return false;
            };
            state.backlog.retain(|(queued, _)| *queued != handle);

            if let Some(group) = state.pool.get_mut(&slot.key) {
                group.handles.retain(|h| *h != handle);
                let still_watched = group
                    .handles
                    .iter()
                    .filter_map(|h| state.slots.get(h))
                    .any(|other| other.region.id == slot.region.id);

                if group.handles.is_empty() {
                    let observer = group.id;
                    state.pool.shift_remove(&slot.key);
                    state.platform.disconnect(observer);
                    debug!(%observer, "disconnected idle observer");
                } else if !still_watched {
                    state.platform.unobserve(group.id, slot.region.id);
                }
            }
            slot
        };

        debug!(region = %removed.region.id, %handle, "unobserved region");
        // The callback may own arbitrary state; drop it with the lock released.
        drop(removed);
        true
    }

    /// Run one event-loop turn and return the number of notifications
    /// delivered.
    ///
    /// Only notifications queued when the turn starts are delivered.
    /// Anything a callback causes (a new observation, a re-arm) waits for
    /// the next turn. If a callback fails its error is returned immediately;
    /// notifications that were not yet delivered stay queued.
    pub fn poll(&self) -> Result<usize> {
        let mut remaining = {
            let mut state = self.state.lock();
            let records = state.platform.take_records();
            for entry in records {
                state.fold_entry(entry);
            }
            state.backlog.len()
        };

        let mut delivered = 0;
        while remaining > 0 {
            remaining -= 1;
            let (handle, visible, mut callback) = {
                let mut state = self.state.lock();
                let Some((handle, visible)) = state.backlog.pop_front() else {
                    break;
                };
                let Some(slot) = state.slots.get_mut(&handle) else {
                    continue;
                };
                let Some(callback) = slot.callback.take() else {
                    // Re-entrant poll from inside this handle's own callback;
                    // the outer turn delivers it.
                    state.backlog.push_front((handle, visible));
                    break;
                };
                (handle, visible, callback)
            };

            trace!(%handle, visible, "delivering visibility");
            let result = callback(handle, visible);

            let orphaned = {
                let mut state = self.state.lock();
                match state.slots.get_mut(&handle) {
                    Some(slot) => {
                        slot.callback = Some(callback);
                        None
                    }
                    None => Some(callback),
                }
            };
            drop(orphaned);

            result?;
            delivered += 1;
        }

        Ok(delivered)
    }

    pub(crate) fn downgrade(&self) -> WeakWatcher<P> {
        WeakWatcher {
            state: Arc::downgrade(&self.state),
        }
    }

    pub fn is_observing(&self, handle: WatcherHandle) -> bool {
        self.state.lock().slots.contains_key(&handle)
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of pooled platform observers.
    pub fn observer_count(&self) -> usize {
        self.state.lock().pool.len()
    }

    /// Notifications folded but not yet delivered.
    pub fn backlog_len(&self) -> usize {
        self.state.lock().backlog.len()
    }
}

impl<P> fmt::Debug for ViewportWatcher<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ViewportWatcher")
            .field("handles", &state.slots.len())
            .field("observers", &state.pool.len())
            .field("backlog", &state.backlog.len())
            .field("fail_open", &state.fail_open)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::{NoObservation, Rect, RegionId, SimulatedViewport};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder() -> (Arc<Mutex<Vec<bool>>>, impl FnMut(bool) -> std::result::Result<(), CallbackError> + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |visible| {
            sink.lock().push(visible);
            Ok(())
        })
    }

    #[test]
    fn initial_state_arrives_on_next_poll() {
        let viewport = SimulatedViewport::new(800.0, 600.0);
        let id = RegionId::new();
        viewport.place(id, Rect::new(0.0, 0.0, 100.0, 100.0));

        let watcher = ViewportWatcher::new(viewport.clone());
        let (seen, on_change) = recorder();
        watcher.observe(WatchRegion::new(id), on_change).unwrap();

        assert!(seen.lock().is_empty());
        assert_eq!(watcher.poll().unwrap(), 1);
        assert_eq!(*seen.lock(), vec![true]);
    }

    #[test]
    fn reports_each_crossing() {
        let viewport = SimulatedViewport::new(800.0, 600.0);
        let id = RegionId::new();
        viewport.place(id, Rect::new(0.0, 1000.0, 100.0, 100.0));

        let watcher = ViewportWatcher::new(viewport.clone());
        let (seen, on_change) = recorder();
        watcher
            .observe(WatchRegion::new(id).with_threshold(0.5), on_change)
            .unwrap();
        watcher.poll().unwrap();

        viewport.scroll_to(0.0, 800.0);
        watcher.poll().unwrap();
        viewport.scroll_to(0.0, 0.0);
        watcher.poll().unwrap();

        assert_eq!(*seen.lock(), vec![false, true, false]);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let watcher = ViewportWatcher::new(SimulatedViewport::new(800.0, 600.0));
        let result = watcher.observe(WatchRegion::new(RegionId::new()).with_threshold(2.0), |_| Ok(()));
        assert!(matches!(result, Err(ViewportError::InvalidThreshold(_))));
        assert!(watcher.is_empty());
    }

    #[test]
    fn unobserve_is_idempotent_and_stops_delivery() {
        let viewport = SimulatedViewport::new(800.0, 600.0);
        let id = RegionId::new();
        viewport.place(id, Rect::new(0.0, 0.0, 100.0, 100.0));

        let watcher = ViewportWatcher::new(viewport.clone());
        let (seen, on_change) = recorder();
        let handle = watcher.observe(WatchRegion::new(id), on_change).unwrap();

        assert!(watcher.unobserve(handle));
        assert!(!watcher.unobserve(handle));
        assert_eq!(watcher.poll().unwrap(), 0);
        assert!(seen.lock().is_empty());
        assert_eq!(viewport.observer_count(), 0);
    }

    #[test]
    fn pools_observers_by_options() {
        let viewport = SimulatedViewport::new(800.0, 600.0);
        let watcher = ViewportWatcher::new(viewport.clone());
        let lazy = |id| WatchRegion::new(id).with_threshold(0.1).with_margin(RootMargin::px(50));

        let a = watcher.observe(lazy(RegionId::new()), |_| Ok(())).unwrap();
        let b = watcher.observe(lazy(RegionId::new()), |_| Ok(())).unwrap();
        let c = watcher
            .observe(WatchRegion::new(RegionId::new()), |_| Ok(()))
            .unwrap();

        assert_eq!(watcher.observer_count(), 2);
        assert_eq!(viewport.observer_count(), 2);

        watcher.unobserve(a);
        assert_eq!(viewport.observer_count(), 2);
        assert_eq!(viewport.observed_target_count(), 2);
        watcher.unobserve(b);
        assert_eq!(viewport.observer_count(), 1);
        watcher.unobserve(c);
        assert_eq!(viewport.observer_count(), 0);
    }

    #[test]
    fn two_handles_on_one_element_both_get_initial_state() {
        let viewport = SimulatedViewport::new(800.0, 600.0);
        let id = RegionId::new();
        viewport.place(id, Rect::new(0.0, 0.0, 100.0, 100.0));
        let watcher = ViewportWatcher::new(viewport.clone());

        let (first, on_first) = recorder();
        watcher.observe(WatchRegion::new(id), on_first).unwrap();
        watcher.poll().unwrap();

        let (second, on_second) = recorder();
        let late = watcher.observe(WatchRegion::new(id), on_second).unwrap();
        watcher.poll().unwrap();

        assert_eq!(*first.lock(), vec![true]);
        assert_eq!(*second.lock(), vec![true]);

        // Releasing one handle keeps the element observed for the other.
        watcher.unobserve(late);
        assert_eq!(viewport.observed_target_count(), 1);
    }

    #[test]
    fn fail_open_reports_visible_once_immediately() {
        let watcher = ViewportWatcher::new(NoObservation);
        let (seen, on_change) = recorder();
        let handle = watcher
            .observe(WatchRegion::new(RegionId::new()), on_change)
            .unwrap();

        assert_eq!(*seen.lock(), vec![true]);
        assert!(!watcher.is_observing(handle));
        assert_eq!(watcher.poll().unwrap(), 0);
        assert_eq!(*seen.lock(), vec![true]);
        assert!(!watcher.unobserve(handle));
    }

    #[test]
    fn fail_closed_config_surfaces_unavailability() {
        let config = ActivationConfig {
            fail_open: false,
            ..ActivationConfig::default()
        };
        let watcher = ViewportWatcher::with_config(NoObservation, &config);
        let result = watcher.observe(WatchRegion::new(RegionId::new()), |_| Ok(()));
        assert!(matches!(result, Err(ViewportError::ObservationUnavailable)));
    }

    #[test]
    fn callback_error_keeps_remaining_notifications() {
        let viewport = SimulatedViewport::new(800.0, 600.0);
        let (a, b) = (RegionId::new(), RegionId::new());
        viewport.place(a, Rect::new(0.0, 0.0, 10.0, 10.0));
        viewport.place(b, Rect::new(0.0, 20.0, 10.0, 10.0));
        let watcher = ViewportWatcher::new(viewport.clone());

        watcher
            .observe(WatchRegion::new(a), |_| Err("image decode failed".into()))
            .unwrap();
        let (seen, on_change) = recorder();
        watcher.observe(WatchRegion::new(b), on_change).unwrap();

        let err = watcher.poll().unwrap_err();
        assert!(matches!(err, ViewportError::Callback { .. }));
        assert!(seen.lock().is_empty());
        assert_eq!(watcher.backlog_len(), 1);

        assert_eq!(watcher.poll().unwrap(), 1);
        assert_eq!(*seen.lock(), vec![true]);
    }

    #[test]
    fn remount_ignores_records_queued_for_the_previous_handle() {
        let viewport = SimulatedViewport::new(800.0, 600.0);
        let (keeper, image) = (RegionId::new(), RegionId::new());
        viewport.place(keeper, Rect::new(0.0, 9000.0, 100.0, 100.0));
        viewport.place(image, Rect::new(0.0, 1000.0, 100.0, 100.0));
        let watcher = ViewportWatcher::new(viewport.clone());

        watcher.observe(WatchRegion::new(keeper), |_| Ok(())).unwrap();
        let first = watcher.observe(WatchRegion::new(image), |_| Ok(())).unwrap();
        watcher.poll().unwrap();

        // In and back out between two turns, then unmounted.
        viewport.scroll_to(0.0, 800.0);
        viewport.scroll_to(0.0, 0.0);
        watcher.unobserve(first);
        assert_eq!(viewport.observer_count(), 1);

        let (seen, on_change) = recorder();
        watcher.observe(WatchRegion::new(image), on_change).unwrap();
        watcher.poll().unwrap();
        watcher.poll().unwrap();

        assert_eq!(*seen.lock(), vec![false]);
    }

    #[test]
    fn observation_started_inside_a_turn_reports_next_turn() {
        let viewport = SimulatedViewport::new(800.0, 600.0);
        let (a, b) = (RegionId::new(), RegionId::new());
        viewport.place(a, Rect::new(0.0, 0.0, 10.0, 10.0));
        viewport.place(b, Rect::new(0.0, 20.0, 10.0, 10.0));
        let watcher = ViewportWatcher::new(viewport.clone());

        let (seen, on_change) = recorder();
        let follow_up = Mutex::new(Some(on_change));
        let inner = watcher.clone();
        watcher
            .observe(WatchRegion::new(a), move |_| {
                if let Some(on_change) = follow_up.lock().take() {
                    inner.observe(WatchRegion::new(b), on_change)?;
                }
                Ok(())
            })
            .unwrap();

        assert_eq!(watcher.poll().unwrap(), 1);
        assert!(seen.lock().is_empty());
        assert_eq!(watcher.poll().unwrap(), 1);
        assert_eq!(*seen.lock(), vec![true]);
    }

    #[test]
    fn unobserve_from_inside_callback() {
        let viewport = SimulatedViewport::new(800.0, 600.0);
        let id = RegionId::new();
        viewport.place(id, Rect::new(0.0, 0.0, 100.0, 100.0));
        let watcher = ViewportWatcher::new(viewport.clone());

        let calls = Arc::new(AtomicUsize::new(0));
        let handle_cell = Arc::new(Mutex::new(None));
        let (inner, cell, counter) = (watcher.clone(), Arc::clone(&handle_cell), Arc::clone(&calls));
        let handle = watcher
            .observe(WatchRegion::new(id), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                if let Some(handle) = *cell.lock() {
                    inner.unobserve(handle);
                }
                Ok(())
            })
            .unwrap();
        *handle_cell.lock() = Some(handle);

        watcher.poll().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!watcher.is_observing(handle));

        viewport.scroll_to(0.0, 5000.0);
        viewport.scroll_to(0.0, 0.0);
        watcher.poll().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
