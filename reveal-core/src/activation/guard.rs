//! Scoped registrations.

use std::fmt;

use super::controller::ActivationController;
use super::latch::{LatchState, RegistrationId};
use crate::error::Result;
use crate::observe::IntersectionPlatform;

/// A registration that is unregistered when dropped.
///
/// This is the mount/unmount pairing of a view: acquire on mount, and the
/// teardown path releases observation and the activation closure even on
/// early return.
pub struct ActivationGuard<P: IntersectionPlatform + 'static> {
    controller: ActivationController<P>,
    id: RegistrationId,
}

impl<P: IntersectionPlatform + 'static> ActivationGuard<P> {
    pub(crate) fn new(controller: ActivationController<P>, id: RegistrationId) -> Self {
        Self { controller, id }
    }

    pub fn id(&self) -> RegistrationId {
        self.id
    }

    pub fn latch(&self) -> LatchState {
        self.controller
            .latch(self.id)
            .unwrap_or(LatchState::Disconnected)
    }

    pub fn is_activated(&self) -> bool {
        self.latch().is_activated()
    }

    pub fn reset(&self) -> Result<()> {
        self.controller.reset(self.id)
    }
}

impl<P: IntersectionPlatform + 'static> Drop for ActivationGuard<P> {
    fn drop(&mut self) {
        self.controller.unregister(self.id);
    }
}

impl<P: IntersectionPlatform + 'static> fmt::Debug for ActivationGuard<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationGuard")
            .field("id", &self.id)
            .field("latch", &self.latch())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::{Rect, RegionId, SimulatedViewport, WatchRegion};

    #[test]
    fn drop_unregisters() {
        let viewport = SimulatedViewport::new(800.0, 600.0);
        let controller = ActivationController::new(viewport.clone());

        let guard = controller
            .register_scoped(WatchRegion::new(RegionId::new()), || Ok(()))
            .unwrap();
        let id = guard.id();
        assert_eq!(guard.latch(), LatchState::Pending);
        assert_eq!(viewport.observer_count(), 1);

        drop(guard);
        assert_eq!(controller.latch(id), Some(LatchState::Disconnected));
        assert_eq!(viewport.observer_count(), 0);
    }

    #[test]
    fn guard_reports_activation() {
        let viewport = SimulatedViewport::new(800.0, 600.0);
        let region = RegionId::new();
        viewport.place(region, Rect::new(0.0, 0.0, 50.0, 50.0));
        let controller = ActivationController::new(viewport.clone());

        let guard = controller
            .register_scoped(WatchRegion::new(region), || Ok(()))
            .unwrap();
        controller.poll().unwrap();
        assert!(guard.is_activated());

        guard.reset().unwrap();
        assert_eq!(guard.latch(), LatchState::Pending);
    }
}
