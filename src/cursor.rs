//! Normalized hand position -> smoothed screen pointer.

use log::error;

use crate::actions::PointerDriver;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorState {
    pub prev_x: i32,
    pub prev_y: i32,
}

#[derive(Debug)]
pub struct CursorMapper {
    screen_w: i32,
    screen_h: i32,
    smooth_factor: f32,
    drag_smooth_factor: f32,
    state: CursorState,
}

impl CursorMapper {
    pub fn new(screen_w: i32, screen_h: i32, smooth_factor: f32, drag_smooth_factor: f32) -> Self {
        Self {
            screen_w: screen_w.max(1),
            screen_h: screen_h.max(1),
            smooth_factor,
            drag_smooth_factor,
            state: CursorState::default(),
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// `round(norm * dim)` clamped into `[0, dim-1]`.
    pub fn to_screen(&self, nx: f32, ny: f32) -> (i32, i32) {
        (map_axis(nx, self.screen_w), map_axis(ny, self.screen_h))
    }

    /// Advance the cursor towards the mapped target and drive the pointer:
    /// button down/up every frame according to `drag`, then a move.
    pub fn update(
        &mut self,
        nx: f32,
        ny: f32,
        drag: bool,
        driver: &mut dyn PointerDriver,
    ) -> (i32, i32) {
        let (tx, ty) = self.to_screen(nx, ny);
        let factor = if drag {
            if let Err(e) = driver.mouse_down() {
                error!("pointer down failed: {e}");
            }
            self.drag_smooth_factor
        } else {
            if let Err(e) = driver.mouse_up() {
                error!("pointer up failed: {e}");
            }
            self.smooth_factor
        };

        let x = smooth(self.state.prev_x, tx, factor).clamp(0, self.screen_w - 1);
        let y = smooth(self.state.prev_y, ty, factor).clamp(0, self.screen_h - 1);
        if let Err(e) = driver.move_to(x, y) {
            error!("pointer move failed: {e}");
        }

        self.state = CursorState {
            prev_x: x,
            prev_y: y,
        };
        (x, y)
    }
}

fn map_axis(norm: f32, dim: i32) -> i32 {
    let v = (norm * dim as f32).round();
    // `as` saturates and maps NaN to 0
    (v as i32).clamp(0, dim - 1)
}

fn smooth(prev: i32, target: i32, factor: f32) -> i32 {
    (prev as f32 + (target - prev) as f32 * factor) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::tests::{Cmd, RecordingDriver};

    fn mapper() -> CursorMapper {
        CursorMapper::new(1920, 1080, 0.5, 0.2)
    }

    #[test]
    fn maps_and_clamps_to_screen() {
        let m = mapper();
        assert_eq!(m.to_screen(0.5, 0.5), (960, 540));
        assert_eq!(m.to_screen(1.0, 1.0), (1919, 1079));
        assert_eq!(m.to_screen(-0.3, 2.5), (0, 1079));
        assert_eq!(m.to_screen(f32::NAN, 0.0), (0, 0));
    }

    #[test]
    fn free_move_halves_the_gap() {
        let mut m = mapper();
        let mut d = RecordingDriver::default();
        assert_eq!(m.update(0.5, 0.5, false, &mut d), (480, 270));
        assert_eq!(d.cmds, vec![Cmd::Up, Cmd::Move(480, 270)]);
        assert_eq!(
            m.state(),
            CursorState {
                prev_x: 480,
                prev_y: 270
            }
        );
    }

    #[test]
    fn drag_move_is_damped() {
        let mut m = mapper();
        let mut d = RecordingDriver::default();
        assert_eq!(m.update(0.5, 0.5, true, &mut d), (192, 108));
        assert_eq!(d.cmds, vec![Cmd::Down, Cmd::Move(192, 108)]);
    }

    #[test]
    fn no_drift_at_rest() {
        let mut m = mapper();
        let mut d = RecordingDriver::default();
        for _ in 0..50 {
            m.update(0.25, 0.75, false, &mut d);
        }
        let settled = m.state();
        let (nx, ny) = (
            settled.prev_x as f32 / 1920.0,
            settled.prev_y as f32 / 1080.0,
        );
        assert_eq!(m.to_screen(nx, ny), (settled.prev_x, settled.prev_y));
        for drag in [false, true] {
            m.update(nx, ny, drag, &mut d);
            assert_eq!(m.state(), settled);
        }
    }

    #[test]
    fn stays_on_screen_for_wild_input() {
        let mut m = mapper();
        let mut d = RecordingDriver::default();
        for (x, y) in [(5.0, 5.0), (-4.0, -4.0), (1e9, -1e9), (0.999, 1.001)] {
            let (sx, sy) = m.update(x, y, false, &mut d);
            assert!((0..1920).contains(&sx));
            assert!((0..1080).contains(&sy));
        }
    }
}
