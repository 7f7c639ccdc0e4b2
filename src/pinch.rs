//! Thumb/middle pinch latch used for clicks.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinchState {
    pub pinching: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinchUpdate {
    pub click_started: bool,
    pub click_released: bool,
    pub is_pinching: bool,
}

impl PinchUpdate {
    /// A release emits a click only if no drag is active at that moment.
    pub fn should_click(&self, dragging: bool) -> bool {
        self.click_released && !dragging
    }
}

#[derive(Debug)]
pub struct PinchDetector {
    tap_threshold: f32,
    state: PinchState,
}

impl PinchDetector {
    pub fn new(tap_threshold: f32) -> Self {
        Self {
            tap_threshold,
            state: PinchState::default(),
        }
    }

    pub fn state(&self) -> PinchState {
        self.state
    }

    pub fn update(&mut self, dist: f32) -> PinchUpdate {
        let mut out = PinchUpdate::default();
        if dist < self.tap_threshold {
            if !self.state.pinching {
                self.state.pinching = true;
                out.click_started = true;
            }
        } else if self.state.pinching {
            self.state.pinching = false;
            out.click_released = true;
        }
        out.is_pinching = self.state.pinching;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(dists: &[f32], dragging: bool) -> (usize, usize, usize) {
        let mut p = PinchDetector::new(0.03);
        let (mut started, mut released, mut clicks) = (0, 0, 0);
        for &d in dists {
            let u = p.update(d);
            started += u.click_started as usize;
            released += u.click_released as usize;
            clicks += u.should_click(dragging) as usize;
        }
        (started, released, clicks)
    }

    #[test]
    fn one_press_one_release() {
        assert_eq!(run(&[0.1, 0.01, 0.1], false), (1, 1, 1));
    }

    #[test]
    fn drag_suppresses_click() {
        assert_eq!(run(&[0.1, 0.01, 0.1], true), (1, 1, 0));
    }

    #[test]
    fn held_pinch_latches_once() {
        assert_eq!(run(&[0.01, 0.02, 0.0, 0.029, 0.5, 0.6], false), (1, 1, 1));
    }

    #[test]
    fn threshold_itself_is_not_a_pinch() {
        let mut p = PinchDetector::new(0.03);
        assert!(!p.update(0.03).is_pinching);
        assert!(p.update(0.0299).is_pinching);
        assert_eq!(p.state(), PinchState { pinching: true });
    }

    #[test]
    fn release_without_press_is_quiet() {
        let mut p = PinchDetector::new(0.03);
        assert_eq!(p.update(0.5), PinchUpdate::default());
    }
}
