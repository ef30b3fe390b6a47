//! Activation configuration.
//!
//! Defaults follow the lazy-loading setup the site used everywhere: a 10%
//! visibility threshold with a 50px pre-trigger margin, failing open when
//! the platform cannot observe.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewportError};
use crate::observe::{RegionId, RootMargin, WatchRegion};

fn default_threshold() -> f64 {
    0.1
}

fn default_root_margin() -> RootMargin {
    RootMargin::px(50)
}

fn default_fail_open() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivationConfig {
    /// Threshold applied by [`ActivationConfig::region`].
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// CSS margin shorthand, e.g. `"50px"`.
    #[serde(default = "default_root_margin")]
    pub root_margin: RootMargin,

    /// Report regions visible at once when the platform cannot observe.
    #[serde(default = "default_fail_open")]
    pub fail_open: bool,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            root_margin: default_root_margin(),
            fail_open: default_fail_open(),
        }
    }
}

impl ActivationConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        if !(0.0..=1.0).contains(&config.threshold) {
            return Err(ViewportError::InvalidThreshold(config.threshold));
        }
        Ok(config)
    }

    /// A region for `id` carrying the configured threshold and margin.
    pub fn region(&self, id: RegionId) -> WatchRegion {
        WatchRegion::new(id)
            .with_threshold(self.threshold)
            .with_margin(self.root_margin)
    }
}
