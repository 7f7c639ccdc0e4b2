use serde::Serialize;

use crate::pattern::{Finger, FingerPattern};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ZoomIntent {
    #[default]
    None,
    ZoomIn,
    ZoomOut,
}

impl ZoomIntent {
    pub fn label(self) -> &'static str {
        match self {
            ZoomIntent::None => "",
            ZoomIntent::ZoomIn => "ZOOM IN",
            ZoomIntent::ZoomOut => "ZOOM OUT",
        }
    }
}

/// Frame-local classifier of the left hand's pose into scroll steps.
#[derive(Debug, Clone, Copy)]
pub struct ZoomGestureDetector {
    scroll_step: i32,
}

impl ZoomGestureDetector {
    pub fn new(scroll_step: i32) -> Self {
        Self { scroll_step }
    }

    pub fn classify(&self, pattern: FingerPattern) -> ZoomIntent {
        match (pattern.is_up(Finger::Index), pattern.is_up(Finger::Middle)) {
            (true, false) => ZoomIntent::ZoomIn,
            (true, true) => ZoomIntent::ZoomOut,
            _ => ZoomIntent::None,
        }
    }

    /// Scroll amount to issue for this frame, if any.
    pub fn scroll_amount(&self, intent: ZoomIntent) -> Option<i32> {
        match intent {
            ZoomIntent::None => None,
            ZoomIntent::ZoomIn => Some(self.scroll_step),
            ZoomIntent::ZoomOut => Some(-self.scroll_step),
        }
    }
}
