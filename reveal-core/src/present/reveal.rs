//! Scroll-triggered entrance animations.
//!
//! A [`Reveal`] describes how a group of elements animates in: the style
//! they start from, the duration, the easing curve, and the stagger
//! between consecutive items. The presets match the site's section titles,
//! card grids and side-sliding panels.
//!
//! Animations start when the trigger element's top edge passes 80% of the
//! viewport height, expressed as a zero-threshold region whose root is cut
//! 20% short at the bottom.
//!
//! A [`Timeline`] chains several reveals one after another, each free to
//! overlap the previous one, and a [`Yoyo`] loops between two styles for
//! idle cues such as the scroll indicator.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::activation::{ActivationController, ActivationGuard};
use crate::error::Result;
use crate::observe::{IntersectionPlatform, Length, RegionId, RootMargin, WatchRegion};

/// Easing curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ease {
    Linear,
    /// Symmetric quadratic ease in/out.
    Power2InOut,
    /// Cubic deceleration.
    Power3Out,
}

impl Ease {
    /// Map linear progress `t` in `0..=1` onto the curve.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Ease::Linear => t,
            Ease::Power2InOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Ease::Power3Out => 1.0 - (1.0 - t).powi(3),
        }
    }
}

/// Animatable properties of one element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Style {
    pub opacity: f64,
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl Style {
    /// Fully shown, untransformed.
    pub const SHOWN: Style = Style {
        opacity: 1.0,
        x: 0.0,
        y: 0.0,
        scale: 1.0,
    };

    fn lerp(from: Style, to: Style, k: f64) -> Style {
        let mix = |a: f64, b: f64| a + (b - a) * k;
        Style {
            opacity: mix(from.opacity, to.opacity),
            x: mix(from.x, to.x),
            y: mix(from.y, to.y),
            scale: mix(from.scale, to.scale),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideFrom {
    Left,
    Right,
}

/// An entrance animation for one or more staggered items.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reveal {
    pub from: Style,
    /// Seconds.
    pub duration: f64,
    pub ease: Ease,
    /// Seconds between consecutive items.
    pub stagger: f64,
}

impl Reveal {
    /// Section title fade-up.
    pub fn title() -> Self {
        Self {
            from: Style {
                opacity: 0.0,
                y: 50.0,
                ..Style::SHOWN
            },
            duration: 0.8,
            ease: Ease::Power3Out,
            stagger: 0.0,
        }
    }

    /// Card grid: fade up with a slight zoom, 0.1s apart.
    pub fn cards() -> Self {
        Self {
            from: Style {
                opacity: 0.0,
                y: 30.0,
                scale: 0.95,
                ..Style::SHOWN
            },
            duration: 0.6,
            ease: Ease::Power3Out,
            stagger: 0.1,
        }
    }

    pub fn slide(from: SlideFrom) -> Self {
        let x = match from {
            SlideFrom::Left => -50.0,
            SlideFrom::Right => 50.0,
        };
        Self {
            from: Style {
                opacity: 0.0,
                x,
                ..Style::SHOWN
            },
            duration: 0.8,
            ease: Ease::Power3Out,
            stagger: 0.0,
        }
    }

    pub fn with_stagger(mut self, stagger: f64) -> Self {
        self.stagger = stagger;
        self
    }

    /// Start delay of item `index`.
    pub fn delay(&self, index: usize) -> f64 {
        self.stagger * index as f64
    }

    /// Time until the last of `count` items has settled.
    pub fn total_duration(&self, count: usize) -> f64 {
        match count {
            0 => 0.0,
            n => self.delay(n - 1) + self.duration,
        }
    }

    /// Style of item `index`, `elapsed` seconds after the animation started.
    pub fn sample(&self, index: usize, elapsed: f64) -> Style {
        let local = elapsed - self.delay(index);
        if local <= 0.0 {
            return self.from;
        }
        if self.duration <= 0.0 || local >= self.duration {
            return Style::SHOWN;
        }
        Style::lerp(self.from, Style::SHOWN, self.ease.apply(local / self.duration))
    }

    /// Region that fires once the trigger's top edge is above 80% of the
    /// viewport height.
    pub fn trigger_region(trigger: RegionId) -> WatchRegion {
        WatchRegion::new(trigger).with_margin(RootMargin {
            bottom: Length::Percent(-20),
            ..RootMargin::ZERO
        })
    }

    /// Fade up from `distance` pixels below over `duration` seconds.
    pub fn fade_up(distance: f64, duration: f64) -> Self {
        Self {
            from: Style {
                opacity: 0.0,
                y: distance,
                ..Style::SHOWN
            },
            duration,
            ease: Ease::Power3Out,
            stagger: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Step {
    reveal: Reveal,
    start: f64,
}

/// Reveals played in sequence, one item per step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    steps: Vec<Step>,
    end: f64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step starting `offset` seconds after the current end of the
    /// timeline. A negative offset overlaps the previous steps.
    pub fn then(mut self, reveal: Reveal, offset: f64) -> Self {
        let start = (self.end + offset).max(0.0);
        self.end = self.end.max(start + reveal.duration);
        self.steps.push(Step { reveal, start });
        self
    }

    /// Hero section: title, subtitle, description and scroll indicator,
    /// each overlapping the previous one.
    pub fn hero() -> Self {
        Self::new()
            .then(Reveal::fade_up(30.0, 0.8), 0.0)
            .then(Reveal::fade_up(30.0, 0.6), -0.4)
            .then(Reveal::fade_up(30.0, 0.6), -0.3)
            .then(Reveal::fade_up(30.0, 0.5), -0.2)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Start time of step `index`.
    pub fn start_of(&self, index: usize) -> Option<f64> {
        self.steps.get(index).map(|step| step.start)
    }

    /// Time until the last step has settled.
    pub fn duration(&self) -> f64 {
        self.end
    }

    /// Style of step `index`, `elapsed` seconds into the timeline.
    pub fn sample(&self, index: usize, elapsed: f64) -> Option<Style> {
        self.steps
            .get(index)
            .map(|step| step.reveal.sample(0, elapsed - step.start))
    }

    pub fn styles_at(&self, elapsed: f64) -> Vec<Style> {
        self.steps
            .iter()
            .map(|step| step.reveal.sample(0, elapsed - step.start))
            .collect()
    }
}

/// Endless back-and-forth between two styles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Yoyo {
    pub from: Style,
    pub to: Style,
    /// Seconds for one leg.
    pub duration: f64,
    pub ease: Ease,
}

impl Yoyo {
    /// Scroll indicator bob: 10px down and back, 2s each way.
    pub fn scroll_indicator() -> Self {
        Self {
            from: Style::SHOWN,
            to: Style {
                y: 10.0,
                ..Style::SHOWN
            },
            duration: 2.0,
            ease: Ease::Power2InOut,
        }
    }

    /// Style `elapsed` seconds after the loop started. Odd legs play the
    /// forward leg in reverse.
    pub fn sample(&self, elapsed: f64) -> Style {
        if elapsed <= 0.0 || self.duration <= 0.0 {
            return self.from;
        }
        let legs = elapsed / self.duration;
        let mut t = legs.fract();
        if legs.floor() as u64 % 2 == 1 {
            t = 1.0 - t;
        }
        Style::lerp(self.from, self.to, self.ease.apply(t))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Waiting,
    Triggered,
    Running { started_at: f64 },
}

/// Plays a [`Reveal`] over `count` items once their trigger scrolls in.
///
/// Time is supplied by the caller (`now`, in seconds); the clock starts at
/// the first sample taken after the trigger fired.
pub struct RevealSequencer<P: IntersectionPlatform + 'static> {
    reveal: Reveal,
    count: usize,
    phase: Arc<Mutex<Phase>>,
    guard: ActivationGuard<P>,
}

impl<P: IntersectionPlatform + 'static> RevealSequencer<P> {
    pub fn mount(
        controller: &ActivationController<P>,
        trigger: RegionId,
        reveal: Reveal,
        count: usize,
    ) -> Result<Self> {
        let phase = Arc::new(Mutex::new(Phase::Waiting));
        let target = Arc::clone(&phase);
        let guard = controller.register_scoped(Reveal::trigger_region(trigger), move || {
            *target.lock() = Phase::Triggered;
            Ok(())
        })?;

        Ok(Self {
            reveal,
            count,
            phase,
            guard,
        })
    }

    pub fn reveal(&self) -> &Reveal {
        &self.reveal
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_triggered(&self) -> bool {
        !matches!(*self.phase.lock(), Phase::Waiting)
    }

    /// Style of item `index` at time `now`.
    pub fn style_at(&self, index: usize, now: f64) -> Style {
        let mut phase = self.phase.lock();
        let elapsed = match *phase {
            Phase::Waiting => return self.reveal.from,
            Phase::Triggered => {
                *phase = Phase::Running { started_at: now };
                0.0
            }
            Phase::Running { started_at } => now - started_at,
        };
        self.reveal.sample(index, elapsed)
    }

    /// All item styles at time `now`.
    pub fn styles_at(&self, now: f64) -> Vec<Style> {
        (0..self.count).map(|index| self.style_at(index, now)).collect()
    }

    pub fn is_finished(&self, now: f64) -> bool {
        match *self.phase.lock() {
            Phase::Running { started_at } => now - started_at >= self.reveal.total_duration(self.count),
            _ => false,
        }
    }

    /// Hide the items again and replay once the trigger next scrolls in.
    pub fn rewind(&self) -> Result<()> {
        *self.phase.lock() = Phase::Waiting;
        self.guard.reset()
    }
}
