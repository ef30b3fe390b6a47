//! Error types for the activation core.
//!
//! The taxonomy is deliberately narrow. Missing platform support is
//! recovered locally (fail-open), double unregistration is a no-op, and
//! anything raised by a caller-supplied callback is handed straight back to
//! whoever triggered the delivery.

use thiserror::Error;

use crate::activation::RegistrationId;
use crate::observe::WatcherHandle;

/// Boxed error returned by caller-supplied callbacks.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias used throughout the crate.
pub type Result<T, E = ViewportError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ViewportError {
    /// The platform has no intersection observation primitive.
    #[error("intersection observation is unavailable on this platform")]
    ObservationUnavailable,

    #[error("threshold {0} is outside 0.0..=1.0")]
    InvalidThreshold(f64),

    #[error("invalid root margin {input:?}: {reason}")]
    InvalidMargin { input: String, reason: String },

    /// A visibility callback passed to `ViewportWatcher::observe` failed.
    #[error("visibility callback for {handle} failed")]
    Callback {
        handle: WatcherHandle,
        #[source]
        source: CallbackError,
    },

    /// An activation callback failed. The latch still counts as activated.
    #[error("activation of {registration} failed")]
    Activation {
        registration: RegistrationId,
        #[source]
        source: CallbackError,
    },

    #[error("{0} is disconnected")]
    Disconnected(RegistrationId),

    #[error("invalid activation config: {0}")]
    Config(#[from] serde_json::Error),
}

impl ViewportError {
    pub(crate) fn invalid_margin(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidMargin {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
