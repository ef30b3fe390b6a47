//! Headless intersection platform.
//!
//! `SimulatedViewport` lays out element rectangles in document
//! coordinates, keeps a scrollable viewport over them, and produces
//! intersection entries the way a browser does: one when a target is first
//! observed, then one each time the target's
//! `(is_intersecting, ratio >= threshold)` state flips. Entries pile up
//! until [`take_records`](IntersectionPlatform::take_records) drains them,
//! so several flips between two event-loop turns are all delivered in the
//! same batch.
//!
//! The handle is cheap to clone; every clone drives the same scene.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::geometry::{Intersection, Rect};
use super::platform::{IntersectionEntry, IntersectionPlatform, ObserverId, ObserverOptions};
use super::region::{RegionId, RootId};
use crate::error::Result;

#[derive(Debug)]
struct SimObserver {
    options: ObserverOptions,
    /// Last reported `(is_intersecting, meets_threshold)` per target.
    targets: IndexMap<RegionId, (bool, bool)>,
}

#[derive(Debug)]
struct Scene {
    viewport: Rect,
    roots: HashMap<RootId, Rect>,
    elements: HashMap<RegionId, Rect>,
    observers: IndexMap<ObserverId, SimObserver>,
    records: Vec<IntersectionEntry>,
    next_observer: u64,
    next_root: u64,
}

impl Scene {
    fn measure(&self, options: &ObserverOptions, target: RegionId) -> Intersection {
        let root = match options.root {
            Some(root) => self.roots.get(&root).copied(),
            None => Some(self.viewport),
        };
        match (root, self.elements.get(&target)) {
            (Some(root), Some(rect)) => Intersection::compute(rect, &root, &options.margin),
            // Detached targets and unknown roots never intersect.
            _ => Intersection {
                is_intersecting: false,
                ratio: 0.0,
            },
        }
    }

    /// Recompute every observed target and queue entries for state flips.
    fn refresh(&mut self) {
        let mut queued = Vec::new();
        for (&observer_id, observer) in &self.observers {
            for (&target, &last) in &observer.targets {
                let hit = self.measure(&observer.options, target);
                let state = (hit.is_intersecting, hit.meets(observer.options.threshold));
                if state != last {
                    queued.push((observer_id, target, state, hit));
                }
            }
        }

        for (observer_id, target, state, hit) in queued {
            if let Some(observer) = self.observers.get_mut(&observer_id) {
                observer.targets.insert(target, state);
            }
            self.records.push(IntersectionEntry {
                observer: observer_id,
                target,
                is_intersecting: hit.is_intersecting,
                ratio: hit.ratio,
            });
        }
    }
}

/// Geometry-backed [`IntersectionPlatform`] for tests and headless hosts.
#[derive(Debug, Clone)]
pub struct SimulatedViewport {
    scene: Arc<Mutex<Scene>>,
}

impl SimulatedViewport {
    /// A viewport of the given size, scrolled to the top of the document.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            scene: Arc::new(Mutex::new(Scene {
                viewport: Rect::new(0.0, 0.0, width, height),
                roots: HashMap::new(),
                elements: HashMap::new(),
                observers: IndexMap::new(),
                records: Vec::new(),
                next_observer: 0,
                next_root: 0,
            })),
        }
    }

    /// Current viewport rectangle in document coordinates.
    pub fn viewport(&self) -> Rect {
        self.scene.lock().viewport
    }

    /// Place (or move) an element, in document coordinates.
    pub fn place(&self, id: RegionId, rect: Rect) {
        let mut scene = self.scene.lock();
        scene.elements.insert(id, rect);
        scene.refresh();
    }

    /// Remove an element from the document.
    pub fn detach(&self, id: RegionId) {
        let mut scene = self.scene.lock();
        scene.elements.remove(&id);
        scene.refresh();
    }

    pub fn scroll_to(&self, x: f64, y: f64) {
        let mut scene = self.scene.lock();
        scene.viewport.x = x;
        scene.viewport.y = y;
        scene.refresh();
    }

    pub fn scroll_by(&self, dx: f64, dy: f64) {
        let mut scene = self.scene.lock();
        scene.viewport = scene.viewport.translate(dx, dy);
        scene.refresh();
    }

    pub fn resize(&self, width: f64, height: f64) {
        let mut scene = self.scene.lock();
        scene.viewport.width = width;
        scene.viewport.height = height;
        scene.refresh();
    }

    /// Register a scrolling ancestor whose visible box is `rect`.
    pub fn add_root(&self, rect: Rect) -> RootId {
        let mut scene = self.scene.lock();
        let id = RootId(scene.next_root);
        scene.next_root += 1;
        scene.roots.insert(id, rect);
        id
    }

    pub fn move_root(&self, root: RootId, rect: Rect) {
        let mut scene = self.scene.lock();
        scene.roots.insert(root, rect);
        scene.refresh();
    }

    /// Number of live platform observers.
    pub fn observer_count(&self) -> usize {
        self.scene.lock().observers.len()
    }

    /// Number of targets observed across all observers.
    pub fn observed_target_count(&self) -> usize {
        self.scene
            .lock()
            .observers
            .values()
            .map(|observer| observer.targets.len())
            .sum()
    }

    /// Number of entries waiting for the next `take_records`.
    pub fn pending_records(&self) -> usize {
        self.scene.lock().records.len()
    }
}

impl IntersectionPlatform for SimulatedViewport {
    fn create_observer(&mut self, options: ObserverOptions) -> Result<ObserverId> {
        let mut scene = self.scene.lock();
        let id = ObserverId(scene.next_observer);
        scene.next_observer += 1;
        scene.observers.insert(
            id,
            SimObserver {
                options,
                targets: IndexMap::new(),
            },
        );
        Ok(id)
    }

    fn observe(&mut self, observer: ObserverId, target: RegionId) {
        let mut scene = self.scene.lock();
        let Some(options) = scene.observers.get(&observer).map(|o| o.options) else {
            return;
        };
        if scene.observers[&observer].targets.contains_key(&target) {
            return;
        }

        // Observing always queues an initial entry.
        let hit = scene.measure(&options, target);
        let state = (hit.is_intersecting, hit.meets(options.threshold));
        if let Some(entry) = scene.observers.get_mut(&observer) {
            entry.targets.insert(target, state);
        }
        scene.records.push(IntersectionEntry {
            observer,
            target,
            is_intersecting: hit.is_intersecting,
            ratio: hit.ratio,
        });
    }

    fn unobserve(&mut self, observer: ObserverId, target: RegionId) {
        if let Some(entry) = self.scene.lock().observers.get_mut(&observer) {
            entry.targets.shift_remove(&target);
        }
    }

    fn disconnect(&mut self, observer: ObserverId) {
        self.scene.lock().observers.shift_remove(&observer);
    }

    fn take_records(&mut self) -> Vec<IntersectionEntry> {
        std::mem::take(&mut self.scene.lock().records)
    }
}
