//! Reveal Core
//!
//! This crate decides when off-screen content becomes active. It
//! implements:
//!
//! - Viewport observation with thresholds and pre-trigger margins
//! - One-shot activation latches with reset and scoped cleanup
//! - Lazy images, staggered reveal animations and flip-card state on top
//!
//! The crate is designed to be used both as a native Rust library and,
//! with the `python` feature, as a Python extension module via PyO3.
//!
//! # Architecture
//!
//! - `observe`: platform intersection primitive, regions, and the
//!   [`ViewportWatcher`](observe::ViewportWatcher)
//! - `activation`: the [`ActivationController`](activation::ActivationController)
//!   and its latches
//! - `present`: callers that turn activations into view state
//!
//! Data flows one way: platform intersection records feed the watcher,
//! the watcher reports boolean visibility per region, and the controller
//! fires each region's activation at most once.
//!
//! # Example
//!
//! ```rust,ignore
//! use reveal_core::activation::ActivationController;
//! use reveal_core::observe::{Rect, RegionId, SimulatedViewport, WatchRegion};
//!
//! let viewport = SimulatedViewport::new(1280.0, 720.0);
//! let controller = ActivationController::new(viewport.clone());
//!
//! let avatar = RegionId::new();
//! viewport.place(avatar, Rect::new(0.0, 1500.0, 320.0, 320.0));
//! controller.register(WatchRegion::new(avatar).with_threshold(0.1), || {
//!     println!("fetch avatar");
//!     Ok(())
//! })?;
//!
//! viewport.scroll_to(0.0, 1000.0);
//! controller.poll()?; // prints "fetch avatar" once
//! ```

pub mod activation;
pub mod config;
pub mod error;
pub mod observe;
pub mod present;

#[cfg(feature = "python")]
mod python;

pub use config::ActivationConfig;
pub use error::{CallbackError, Result, ViewportError};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Python module definition.
///
/// This function is called by Python when importing the module.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyViewport>()?;
    m.add_class::<python::PyWatchRegion>()?;
    m.add_class::<python::PyActivationController>()?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
