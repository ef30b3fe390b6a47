//! Viewport Observation
//!
//! This module reports whether regions of a page are visible in (or near)
//! the viewport.
//!
//! # Concepts
//!
//! ## Regions
//!
//! A [`WatchRegion`] names an element and the conditions under which it
//! counts as visible: a threshold (fraction of the element on screen) and
//! a root margin that widens the viewport so activation can begin a little
//! early.
//!
//! ## Platforms
//!
//! The actual intersection measurements come from an
//! [`IntersectionPlatform`]. [`SimulatedViewport`] computes them from
//! rectangles for headless use; [`NoObservation`] stands in for
//! environments without the capability.
//!
//! ## Watcher
//!
//! [`ViewportWatcher`] sits on top of a platform and delivers boolean
//! visibility changes per region, one event-loop turn at a time.

mod geometry;
mod margin;
mod platform;
mod region;
mod simulated;
mod watcher;

pub use geometry::{Intersection, Rect};
pub use margin::{Length, RootMargin};
pub use platform::{IntersectionEntry, IntersectionPlatform, NoObservation, ObserverId, ObserverOptions};
pub use region::{RegionId, RootId, WatchRegion};
pub use simulated::SimulatedViewport;
pub use watcher::{ViewportWatcher, WatcherHandle};

pub(crate) use watcher::{VisibilityCallback, WeakWatcher};
