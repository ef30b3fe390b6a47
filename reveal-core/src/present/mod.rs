//! Presentation Callers
//!
//! Building blocks for views that sit on top of the activation core:
//!
//! - [`LazyImage`]: withholds an image source until it scrolls near view
//! - [`Reveal`] and [`RevealSequencer`]: staggered entrance animations that
//!   start when a section scrolls past 80% of the viewport
//! - [`Timeline`] and [`Yoyo`]: the hero intro sequence and the looping
//!   scroll indicator
//! - [`FlipState`]: hover/click state of a flip card
//!
//! The image and the sequencer carry no observation logic of their own.
//! Each holds an [`ActivationGuard`](crate::activation::ActivationGuard)
//! and reacts to its one-shot activation.

mod flip;
mod lazy_image;
mod reveal;

pub use flip::FlipState;
pub use lazy_image::{ImageState, LazyImage};
pub use reveal::{Ease, Reveal, RevealSequencer, SlideFrom, Style, Timeline, Yoyo};
