//! Registration ids and latch states.

use std::fmt;

/// Identifier handed out by [`ActivationController::register`].
///
/// Ids are sequential per controller and never reused.
///
/// [`ActivationController::register`]: super::ActivationController::register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(pub(crate) u64);

impl RegistrationId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "registration#{}", self.0)
    }
}

/// One-shot latch guarding a region's activation.
///
/// ```text
/// Pending --(visible)--> Activated --(reset)--> Pending
/// Pending | Activated --(unregister)--> Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LatchState {
    /// Not yet visible.
    Pending,
    /// Visibility crossed at least once; the activation has fired.
    Activated,
    /// Observation stopped for good. Terminal.
    Disconnected,
}

impl LatchState {
    pub fn is_pending(&self) -> bool {
        matches!(self, LatchState::Pending)
    }

    pub fn is_activated(&self) -> bool {
        matches!(self, LatchState::Activated)
    }
}

impl fmt::Display for LatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LatchState::Pending => "pending",
            LatchState::Activated => "activated",
            LatchState::Disconnected => "disconnected",
        })
    }
}
