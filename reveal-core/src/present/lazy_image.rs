//! Lazily loaded images.
//!
//! The image source is withheld until the element comes within 50px of the
//! viewport with at least 10% of it showing. Until the image reports
//! `load`, a placeholder is shown and the real image stays transparent.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::activation::{ActivationController, ActivationGuard};
use crate::config::ActivationConfig;
use crate::error::Result;
use crate::observe::{IntersectionPlatform, RegionId, WatchRegion};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    /// Off screen; no source assigned yet.
    Placeholder,
    /// Source assigned, fetch in flight.
    InView,
    Loaded,
    Failed,
}

/// An image whose fetch starts the first time it scrolls into view.
pub struct LazyImage<P: IntersectionPlatform + 'static> {
    src: String,
    alt: String,
    placeholder: Option<String>,
    state: Arc<Mutex<ImageState>>,
    guard: ActivationGuard<P>,
}

impl<P: IntersectionPlatform + 'static> LazyImage<P> {
    /// Mount with the default lazy-loading region (10% threshold, 50px
    /// margin).
    pub fn mount(
        controller: &ActivationController<P>,
        id: RegionId,
        src: impl Into<String>,
        alt: impl Into<String>,
    ) -> Result<Self> {
        Self::mount_in(controller, ActivationConfig::default().region(id), src, alt)
    }

    pub fn mount_in(
        controller: &ActivationController<P>,
        region: WatchRegion,
        src: impl Into<String>,
        alt: impl Into<String>,
    ) -> Result<Self> {
        let state = Arc::new(Mutex::new(ImageState::Placeholder));
        let target = Arc::clone(&state);
        let guard = controller.register_scoped(region, move || {
            let mut state = target.lock();
            if *state == ImageState::Placeholder {
                *state = ImageState::InView;
            }
            Ok(())
        })?;

        Ok(Self {
            src: src.into(),
            alt: alt.into(),
            placeholder: None,
            state,
            guard,
        })
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn state(&self) -> ImageState {
        *self.state.lock()
    }

    /// The source to put on the element; `None` until the image is in view.
    pub fn src(&self) -> Option<&str> {
        match self.state() {
            ImageState::Placeholder => None,
            _ => Some(self.src.as_str()),
        }
    }

    pub fn alt(&self) -> &str {
        &self.alt
    }

    /// Placeholder image, if any, while the real image has not loaded.
    pub fn placeholder(&self) -> Option<&str> {
        if self.shows_placeholder() {
            self.placeholder.as_deref()
        } else {
            None
        }
    }

    pub fn shows_placeholder(&self) -> bool {
        self.state() != ImageState::Loaded
    }

    pub fn opacity(&self) -> f64 {
        if self.state() == ImageState::Loaded {
            1.0
        } else {
            0.0
        }
    }

    /// Record the element's `load` event. Ignored unless a fetch is in flight.
    pub fn mark_loaded(&self) -> bool {
        self.settle(ImageState::Loaded)
    }

    /// Record the element's `error` event. Ignored unless a fetch is in flight.
    pub fn mark_failed(&self) -> bool {
        self.settle(ImageState::Failed)
    }

    fn settle(&self, outcome: ImageState) -> bool {
        let mut state = self.state.lock();
        if *state != ImageState::InView {
            return false;
        }
        *state = outcome;
        debug!(src = %self.src, state = ?outcome, registration = %self.guard.id(), "image settled");
        true
    }

    /// Drop the loaded image and wait for it to scroll into view again,
    /// e.g. after the content was swapped out.
    pub fn reload(&self) -> Result<()> {
        *self.state.lock() = ImageState::Placeholder;
        self.guard.reset()
    }
}
