//! Root margins.
//!
//! A root margin grows (or, with negative offsets, shrinks) the root's
//! bounding box before intersections are computed, so a region can count as
//! visible slightly before it actually scrolls on screen. The textual form
//! follows CSS `margin` shorthand: one to four components, each `<n>px`,
//! `<n>%` or a bare `0`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewportError};

/// A single margin offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Length {
    /// Absolute offset in CSS pixels.
    Px(i32),
    /// Percentage of the root's width (left/right) or height (top/bottom).
    Percent(i32),
}

impl Length {
    pub const ZERO: Length = Length::Px(0);

    /// Resolve against the root extent along the same axis.
    pub fn resolve(self, extent: f64) -> f64 {
        match self {
            Length::Px(px) => f64::from(px),
            Length::Percent(pct) => extent * f64::from(pct) / 100.0,
        }
    }

    fn parse(token: &str, input: &str) -> Result<Self> {
        let (number, ctor): (&str, fn(i32) -> Length) = if let Some(n) = token.strip_suffix("px") {
            (n, Length::Px)
        } else if let Some(n) = token.strip_suffix('%') {
            (n, Length::Percent)
        } else if token == "0" {
            return Ok(Length::ZERO);
        } else {
            return Err(ViewportError::invalid_margin(
                input,
                format!("{token:?} must be in pixels or percent"),
            ));
        };

        number
            .parse::<i32>()
            .map(ctor)
            .map_err(|_| ViewportError::invalid_margin(input, format!("{token:?} is not an integer offset")))
    }
}

impl Default for Length {
    fn default() -> Self {
        Length::ZERO
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Length::Px(px) => write!(f, "{px}px"),
            Length::Percent(pct) => write!(f, "{pct}%"),
        }
    }
}

/// Offsets applied to each edge of the root, in CSS order.
///
/// Serializes as its CSS shorthand string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RootMargin {
    pub top: Length,
    pub right: Length,
    pub bottom: Length,
    pub left: Length,
}

impl RootMargin {
    pub const ZERO: RootMargin = RootMargin::uniform(Length::ZERO);

    pub const fn uniform(len: Length) -> Self {
        Self {
            top: len,
            right: len,
            bottom: len,
            left: len,
        }
    }

    /// Uniform pixel margin on every edge.
    pub const fn px(px: i32) -> Self {
        Self::uniform(Length::Px(px))
    }

    /// Parse CSS margin shorthand such as `"50px"` or `"0px 0px -20% 0px"`.
    pub fn parse(input: &str) -> Result<Self> {
        let tokens = input
            .split_whitespace()
            .map(|token| Length::parse(token, input))
            .collect::<Result<Vec<_>>>()?;

        let margin = match tokens.as_slice() {
            [all] => Self::uniform(*all),
            [vertical, horizontal] => Self {
                top: *vertical,
                right: *horizontal,
                bottom: *vertical,
                left: *horizontal,
            },
            [top, horizontal, bottom] => Self {
                top: *top,
                right: *horizontal,
                bottom: *bottom,
                left: *horizontal,
            },
            [top, right, bottom, left] => Self {
                top: *top,
                right: *right,
                bottom: *bottom,
                left: *left,
            },
            [] => return Err(ViewportError::invalid_margin(input, "empty margin")),
            _ => return Err(ViewportError::invalid_margin(input, "more than four components")),
        };

        Ok(margin)
    }

    pub fn is_zero(&self) -> bool {
        [self.top, self.right, self.bottom, self.left]
            .iter()
            .all(|len| matches!(len, Length::Px(0) | Length::Percent(0)))
    }
}

impl FromStr for RootMargin {
    type Err = ViewportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RootMargin {
    type Error = ViewportError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<RootMargin> for String {
    fn from(margin: RootMargin) -> Self {
        margin.to_string()
    }
}

impl fmt::Display for RootMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.top, self.right, self.bottom, self.left)
    }
}
