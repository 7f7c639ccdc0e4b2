use anyhow::Result;
use log::{error, warn};
use serde::Serialize;

use crate::actions::PointerDriver;
use crate::combo::{ComboRegistry, ComboState, ComboStateMachine, GestureFramePair};
use crate::config::PointerSettings;
use crate::cursor::{CursorMapper, CursorState};
use crate::hand::{HandLabel, HandObservation, landmarks};
use crate::pattern::{self, Finger, FingerPattern};
use crate::pinch::{PinchDetector, PinchState};
use crate::zoom::{ZoomGestureDetector, ZoomIntent};

/// Everything the host hands over for one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameInput {
    pub hands: Vec<HandObservation>,
    pub paused: bool,
}

/// Presentation summary of one processed frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameResult {
    pub cursor_x: i32,
    pub cursor_y: i32,
    pub drag: bool,
    pub click: bool,
    pub zoom: ZoomIntent,
    pub zoom_text: String,
    pub combo_text: String,
    pub left_pattern: FingerPattern,
    pub right_pattern: FingerPattern,
}

pub const PAUSED_TEXT: &str = "Paused";

/// Owns all cross-frame gesture state. `process` must not be called
/// concurrently with itself; frames are strictly sequential.
pub struct GestureFrameProcessor<D: PointerDriver> {
    cursor: CursorMapper,
    pinch: PinchDetector,
    zoom: ZoomGestureDetector,
    combos: ComboStateMachine,
    driver: D,
}

struct Side<'a> {
    pattern: FingerPattern,
    hand: Option<&'a HandObservation>,
}

impl<D: PointerDriver> GestureFrameProcessor<D> {
    pub fn new(settings: &PointerSettings, registry: ComboRegistry, driver: D) -> Self {
        Self {
            cursor: CursorMapper::new(
                settings.screen_w,
                settings.screen_h,
                settings.smooth_factor,
                settings.drag_smooth_factor,
            ),
            pinch: PinchDetector::new(settings.tap_threshold),
            zoom: ZoomGestureDetector::new(settings.scroll_step),
            combos: ComboStateMachine::new(registry),
            driver,
        }
    }

    pub fn cursor_state(&self) -> CursorState {
        self.cursor.state()
    }

    pub fn pinch_state(&self) -> PinchState {
        self.pinch.state()
    }

    pub fn combo_state(&self) -> ComboState {
        self.combos.state()
    }

    pub fn combo_sequence(&self) -> &[GestureFramePair] {
        self.combos.sequence()
    }

    pub fn combo_count(&self) -> usize {
        self.combos.registry().len()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn process(&mut self, input: &FrameInput) -> Result<FrameResult> {
        let left = pick_side(&input.hands, HandLabel::Left);
        let right = pick_side(&input.hands, HandLabel::Right);

        let cursor = self.cursor.state();
        let mut out = FrameResult {
            cursor_x: cursor.prev_x,
            cursor_y: cursor.prev_y,
            left_pattern: left.pattern,
            right_pattern: right.pattern,
            ..FrameResult::default()
        };

        if input.paused {
            out.combo_text = PAUSED_TEXT.to_string();
            return Ok(out);
        }

        // right hand points; left hand zooms
        if let Some(hand) = right.hand {
            let drag = right.pattern.is_up(Finger::Index) && right.pattern.is_up(Finger::Middle);
            let tip = hand.point(landmarks::INDEX_TIP);
            let (x, y) = self.cursor.update(tip.x, tip.y, drag, &mut self.driver);
            out.cursor_x = x;
            out.cursor_y = y;
            out.drag = drag;

            let dist = hand
                .point(landmarks::MIDDLE_TIP)
                .distance(&hand.point(landmarks::THUMB_TIP));
            let pinch = self.pinch.update(dist);
            out.click = pinch.click_started;
            if pinch.should_click(drag) {
                if let Err(e) = self.driver.click() {
                    error!("pointer click failed: {e}");
                }
            }
        }

        if left.hand.is_some() {
            let intent = self.zoom.classify(left.pattern);
            if let Some(amount) = self.zoom.scroll_amount(intent) {
                if let Err(e) = self.driver.scroll(amount) {
                    error!("scroll emit failed: {e}");
                }
            }
            out.zoom = intent;
            out.zoom_text = intent.label().to_string();
        }

        let outcome = self
            .combos
            .step(GestureFramePair::new(left.pattern, right.pattern))?;
        out.combo_text = outcome.to_string();
        Ok(out)
    }
}

/// Last valid observation for `label`; missing or malformed hands read as
/// fully closed with no geometry.
fn pick_side(hands: &[HandObservation], label: HandLabel) -> Side<'_> {
    let mut side = Side {
        pattern: FingerPattern::ALL_DOWN,
        hand: None,
    };
    for hand in hands.iter().filter(|h| h.label == label) {
        match pattern::encode(hand) {
            Ok(p) => {
                side.pattern = p;
                side.hand = Some(hand);
            }
            Err(e) => warn!("dropping observation: {e}"),
        }
    }
    side
}
