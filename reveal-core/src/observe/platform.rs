//! The platform intersection primitive.
//!
//! This is the one external capability the core consumes: "given an
//! element, a threshold and a margin, report intersection-ratio crossings".
//! The trait mirrors the browser `IntersectionObserver` API closely enough
//! that a `web-sys` backed implementation is a thin shim, while headless
//! environments plug in [`SimulatedViewport`](super::SimulatedViewport) or
//! [`NoObservation`].

use std::fmt;

use super::margin::RootMargin;
use super::region::{RegionId, RootId, WatchRegion};
use crate::error::{Result, ViewportError};

/// Identifier of one platform-level observer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// Options a platform observer is created with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverOptions {
    pub threshold: f64,
    pub margin: RootMargin,
    pub root: Option<RootId>,
}

impl From<&WatchRegion> for ObserverOptions {
    fn from(region: &WatchRegion) -> Self {
        Self {
            threshold: region.threshold,
            margin: region.margin,
            root: region.root,
        }
    }
}

/// One intersection record, as queued by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    pub observer: ObserverId,
    pub target: RegionId,
    pub is_intersecting: bool,
    pub ratio: f64,
}

/// Platform intersection primitive.
///
/// Implementations queue an entry when a target is first observed and
/// whenever it crosses the observer's threshold; [`take_records`] drains
/// the queue in chronological order.
///
/// [`take_records`]: IntersectionPlatform::take_records
pub trait IntersectionPlatform: Send {
    /// Create an observer. Returns [`ViewportError::ObservationUnavailable`]
    /// when the platform has no observation support at all.
    fn create_observer(&mut self, options: ObserverOptions) -> Result<ObserverId>;

    fn observe(&mut self, observer: ObserverId, target: RegionId);

    fn unobserve(&mut self, observer: ObserverId, target: RegionId);

    /// Stop observing every target of `observer` and release it.
    fn disconnect(&mut self, observer: ObserverId);

    /// Drain queued entries, oldest first.
    fn take_records(&mut self) -> Vec<IntersectionEntry>;
}

impl<P: IntersectionPlatform + ?Sized> IntersectionPlatform for Box<P> {
    fn create_observer(&mut self, options: ObserverOptions) -> Result<ObserverId> {
        (**self).create_observer(options)
    }

    fn observe(&mut self, observer: ObserverId, target: RegionId) {
        (**self).observe(observer, target)
    }

    fn unobserve(&mut self, observer: ObserverId, target: RegionId) {
        (**self).unobserve(observer, target)
    }

    fn disconnect(&mut self, observer: ObserverId) {
        (**self).disconnect(observer)
    }

    fn take_records(&mut self) -> Vec<IntersectionEntry> {
        (**self).take_records()
    }
}

/// A platform without any observation capability, e.g. server-side
/// rendering or a headless test runner.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObservation;

impl IntersectionPlatform for NoObservation {
    fn create_observer(&mut self, _options: ObserverOptions) -> Result<ObserverId> {
        Err(ViewportError::ObservationUnavailable)
    }

    fn observe(&mut self, _observer: ObserverId, _target: RegionId) {}

    fn unobserve(&mut self, _observer: ObserverId, _target: RegionId) {}

    fn disconnect(&mut self, _observer: ObserverId) {}

    fn take_records(&mut self) -> Vec<IntersectionEntry> {
        Vec::new()
    }
}
