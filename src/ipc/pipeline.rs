use anyhow::Result;
use log::{error, info, warn};
use serde::Serialize;
use std::{
    cell::RefCell,
    io::{self, BufRead, Write},
    rc::Rc,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc::Receiver,
    },
};

use crate::actions::UinputSink;
use crate::combo::ComboState;
use crate::config::Profile;
use crate::gestures::{FrameInput, FrameResult, GestureFrameProcessor};
use crate::source::{self, FrameReader};

use super::dispatch::build_registry;

type Processor = GestureFrameProcessor<Rc<RefCell<UinputSink>>>;

/// State visible to the control socket while the pipeline thread runs.
#[derive(Debug, Default)]
pub struct PipelineShared {
    pub paused: Arc<AtomicBool>,
    pub status: Mutex<PipelineStatus>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStatus {
    pub frames: u64,
    pub source_open: bool,
    pub live_pointer: bool,
    pub combos: usize,
    pub recording: bool,
    pub recorded_steps: usize,
    pub pinching: bool,
    pub cursor: (i32, i32),
    pub last_combo_text: Option<String>,
    pub last_error: Option<String>,
}

impl PipelineShared {
    pub fn snapshot(&self) -> PipelineStatus {
        self.status.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn with_status(&self, f: impl FnOnce(&mut PipelineStatus)) {
        if let Ok(mut s) = self.status.lock() {
            f(&mut s);
        }
    }
}

/// One session: fresh sink, registry and gesture state.
fn build_session(profile: &Profile, paused: &Arc<AtomicBool>, live: bool) -> Result<Processor> {
    let ptr = &profile.pointer;
    let sink = if live {
        UinputSink::new(ptr.screen_w, ptr.screen_h).unwrap_or_else(|e| {
            warn!("uinput unavailable ({e}); pointer output disabled");
            UinputSink::noop()
        })
    } else {
        UinputSink::noop()
    };
    let sink = Rc::new(RefCell::new(sink));
    let registry = build_registry(profile, &sink, paused)?;
    info!(
        "session: {} combo(s), screen {}x{}",
        registry.len(),
        ptr.screen_w,
        ptr.screen_h
    );
    Ok(GestureFrameProcessor::new(ptr, registry, sink))
}

pub fn run_pipeline(
    profile: Profile,
    source_path: Option<String>,
    rx_profile: Receiver<Profile>,
    shared: Arc<PipelineShared>,
) -> Result<()> {
    let mut processor = build_session(&profile, &shared.paused, true)?;
    let reader = source::open(source_path.as_deref())?;
    info!(
        "pipeline: reading frames from {}",
        source_path.as_deref().unwrap_or("stdin")
    );
    shared.with_status(|s| {
        s.source_open = true;
        s.live_pointer = processor.driver().borrow().is_live();
        s.combos = processor.combo_count();
    });

    drive(&mut processor, reader, &shared, |p| {
        // new profile -> new session, applied between frames
        let mut latest = None;
        while let Ok(next) = rx_profile.try_recv() {
            latest = Some(next);
        }
        if let Some(next) = latest {
            match build_session(&next, &shared.paused, true) {
                Ok(fresh) => {
                    *p = fresh;
                    info!("pipeline: profile applied, gesture state reset");
                }
                Err(e) => error!("pipeline: keeping previous session: {e}"),
            }
        }
    });

    shared.with_status(|s| s.source_open = false);
    info!("pipeline: frame source closed");
    Ok(())
}

fn drive<R: BufRead>(
    processor: &mut Processor,
    reader: FrameReader<R>,
    shared: &PipelineShared,
    mut between_frames: impl FnMut(&mut Processor),
) {
    for hands in reader {
        between_frames(processor);
        let input = FrameInput {
            hands,
            paused: shared.paused.load(Ordering::SeqCst),
        };
        let outcome = processor.process(&input);
        let recording = processor.combo_state() == ComboState::Recording;
        let recorded_steps = processor.combo_sequence().len();
        let pinching = processor.pinch_state().pinching;
        let cursor = processor.cursor_state();
        let combos = processor.combo_count();
        shared.with_status(|s| {
            s.frames += 1;
            s.recording = recording;
            s.recorded_steps = recorded_steps;
            s.pinching = pinching;
            s.cursor = (cursor.prev_x, cursor.prev_y);
            s.combos = combos;
            match &outcome {
                Ok(r) => {
                    if !r.combo_text.is_empty() {
                        s.last_combo_text = Some(r.combo_text.clone());
                    }
                }
                Err(e) => s.last_error = Some(e.to_string()),
            }
        });
        if let Err(e) = outcome {
            error!("combo action failed: {e}");
        }
    }
}

/// Feed a recorded frame file through a fresh session and print one
/// `FrameResult` per frame as JSON.
pub fn replay(profile: &Profile, path: &str, live: bool) -> Result<()> {
    let paused = Arc::new(AtomicBool::new(false));
    let mut processor = build_session(profile, &paused, live)?;
    let reader = source::open(Some(path))?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    replay_into(&mut processor, reader, &paused, &mut out)
}

fn replay_into<R: BufRead>(
    processor: &mut Processor,
    reader: FrameReader<R>,
    paused: &AtomicBool,
    out: &mut dyn Write,
) -> Result<()> {
    for hands in reader {
        let input = FrameInput {
            hands,
            paused: paused.load(Ordering::SeqCst),
        };
        match processor.process(&input) {
            Ok(r) => print_result(out, &r)?,
            Err(e) => {
                error!("combo action failed: {e}");
                writeln!(out, "{}", serde_json::json!({ "error": e.to_string() }))?;
            }
        }
    }
    Ok(())
}

fn print_result(out: &mut dyn Write, r: &FrameResult) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string(r)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand_line(label: &str, pattern: &str) -> String {
        let mut pts = vec![(0.5f32, 0.5f32); 21];
        let tips = [4, 8, 12, 16, 20];
        let joints = [3, 6, 10, 14, 18];
        for (i, ch) in pattern.chars().enumerate() {
            pts[joints[i]] = (0.5, 0.5);
            pts[tips[i]] = (0.2 * i as f32, if ch == '1' { 0.4 } else { 0.6 });
        }
        let pts: Vec<String> = pts
            .iter()
            .map(|(x, y)| format!(r#"{{"x":{x},"y":{y}}}"#))
            .collect();
        format!(r#"{{"label":"{label}","landmarks":[{}]}}"#, pts.join(","))
    }

    fn frame_line(left: &str, right: &str) -> String {
        format!(
            r#"{{"hands":[{},{}]}}"#,
            hand_line("Left", left),
            hand_line("Right", right)
        )
    }

    #[test]
    fn replay_prints_one_result_per_frame() {
        let profile = Profile::builtin_default().unwrap();
        let paused = Arc::new(AtomicBool::new(false));
        let mut processor = build_session(&profile, &paused, false).unwrap();

        let text = [
            frame_line("11111", "11111"),
            frame_line("01000", "01000"),
            frame_line("11111", "01000"),
            "{\"hands\":[]}".to_string(),
        ]
        .join("\n");
        let mut out = Vec::new();
        replay_into(&mut processor, FrameReader::new(text.as_bytes()), &paused, &mut out).unwrap();

        let lines: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["combo_text"], "Combo Recording: ON");
        assert_eq!(lines[1]["left_pattern"], "01000");
        assert_eq!(lines[3]["combo_text"], "Combo Triggered: combo1");
    }

    #[test]
    fn drive_tracks_status() {
        let profile = Profile::builtin_default().unwrap();
        let shared = PipelineShared::default();
        let mut processor = build_session(&profile, &shared.paused, false).unwrap();
        let text = [frame_line("11111", "11111"), frame_line("01000", "00000")].join("\n");

        drive(&mut processor, FrameReader::new(text.as_bytes()), &shared, |_| {});
        let s = shared.snapshot();
        assert_eq!(s.frames, 2);
        assert!(s.recording);
        assert_eq!(s.recorded_steps, 1);
        assert_eq!(s.combos, 2);
        assert_eq!(s.last_combo_text.as_deref(), Some("Combo Step: 1"));

        shared.paused.store(true, Ordering::SeqCst);
        drive(
            &mut processor,
            FrameReader::new(frame_line("00000", "00000").as_bytes()),
            &shared,
            |_| {},
        );
        let s = shared.snapshot();
        assert!(s.recording, "paused frames must not stop recording");
        assert_eq!(s.last_combo_text.as_deref(), Some("Paused"));
    }
}
