//! Flip-card state.
//!
//! Cards turn over on hover, and a click (or Enter/Space) pins them turned
//! over until clicked again. Hover never overrides a pinned card.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlipState {
    #[default]
    Front,
    FlippedByHover,
    FlippedByClick,
}

impl FlipState {
    pub fn pointer_enter(self) -> Self {
        match self {
            FlipState::Front => FlipState::FlippedByHover,
            pinned_or_hovered => pinned_or_hovered,
        }
    }

    pub fn pointer_leave(self) -> Self {
        match self {
            FlipState::FlippedByHover => FlipState::Front,
            other => other,
        }
    }

    /// Click on the card body. Clicks that land on a nested button or link
    /// belong to that control and leave the card alone.
    pub fn click(self, on_control: bool) -> Self {
        if on_control {
            self
        } else {
            self.toggle()
        }
    }

    /// Keyboard activation: Enter and Space toggle like a click.
    pub fn key(self, key: &str) -> Self {
        match key {
            "Enter" | " " => self.toggle(),
            _ => self,
        }
    }

    /// Toggle the pin. Any hover flip is cleared in the process.
    pub fn toggle(self) -> Self {
        match self {
            FlipState::FlippedByClick => FlipState::Front,
            FlipState::Front | FlipState::FlippedByHover => FlipState::FlippedByClick,
        }
    }

    pub fn is_flipped(self) -> bool {
        self != FlipState::Front
    }

    /// Rotation around the Y axis.
    pub fn rotation_degrees(self) -> f64 {
        if self.is_flipped() {
            180.0
        } else {
            0.0
        }
    }
}
