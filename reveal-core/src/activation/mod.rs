//! One-shot Activation
//!
//! This module converts visibility into actions that should happen once:
//! assigning an image source, starting an entrance animation, flipping a
//! card into place.
//!
//! # Latches
//!
//! Every registration owns a [`LatchState`]. The latch moves from
//! `Pending` to `Activated` on the first visible notification and then
//! ignores everything else until the owner calls `reset`. `unregister`
//! moves it to the terminal `Disconnected` state and drops the activation
//! closure so removed elements do not keep captured state alive.
//!
//! # Scoped registrations
//!
//! [`ActivationGuard`] ties a registration to a Rust scope, the same way a
//! view registers on mount and cleans up on unmount.

mod controller;
mod guard;
mod latch;

pub use controller::{ActivateFn, ActivationController};
pub use guard::ActivationGuard;
pub use latch::{LatchState, RegistrationId};
