//! Watch regions.
//!
//! A `WatchRegion` describes one observable element: which element, how
//! much of it has to be on screen, and how far ahead of the viewport edge
//! activation may begin.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::margin::RootMargin;
use crate::error::{Result, ViewportError};

/// Opaque handle for an observable element.
///
/// The presentation layer decides what it maps to (a DOM node, a widget
/// id). Fresh ids can be minted with [`RegionId::new`], or wrapped from an
/// existing integer with `From<u64>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(u64);

impl RegionId {
    /// Generate a new unique region ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1 << 32);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for RegionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for RegionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region#{}", self.0)
    }
}

/// A scrolling ancestor used as the intersection root instead of the
/// top-level viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootId(pub(crate) u64);

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root#{}", self.0)
    }
}

/// One observable element and the conditions under which it counts as
/// visible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchRegion {
    pub id: RegionId,
    /// Fraction of the region that must be on screen, `0.0..=1.0`.
    pub threshold: f64,
    pub margin: RootMargin,
    /// `None` observes against the top-level viewport.
    pub root: Option<RootId>,
}

impl WatchRegion {
    /// A region that counts as visible as soon as any part of it touches
    /// the viewport.
    pub fn new(id: RegionId) -> Self {
        Self {
            id,
            threshold: 0.0,
            margin: RootMargin::ZERO,
            root: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_margin(mut self, margin: RootMargin) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_root(mut self, root: RootId) -> Self {
        self.root = Some(root);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ViewportError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }
}
