use crate::actions::{MouseButton, UinputSink, validate_chord};
use crate::combo::{ComboAction, ComboRegistry};
use crate::config::Profile;
use anyhow::{Result, anyhow};
use log::{info, warn};
use std::{
    cell::RefCell,
    io,
    process::{Command, ExitStatus},
    rc::Rc,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};

/// Turn the profile's combo table into callable actions sharing `sink`.
pub fn build_registry(
    profile: &Profile,
    sink: &Rc<RefCell<UinputSink>>,
    paused: &Arc<AtomicBool>,
) -> Result<ComboRegistry> {
    let mut reg = ComboRegistry::new();
    for c in &profile.combos {
        let action = bind_action(
            &c.name,
            &c.action,
            sink.clone(),
            paused.clone(),
            profile.meta.allow_commands,
        )?;
        if !reg.register(c.name.clone(), c.sequence(), action) {
            warn!("combo '{}' shadowed by an earlier combo", c.name);
        }
    }
    Ok(reg)
}

pub fn bind_action(
    name: &str,
    action: &str,
    sink: Rc<RefCell<UinputSink>>,
    paused: Arc<AtomicBool>,
    allow_commands: bool,
) -> Result<ComboAction> {
    let name = name.to_string();

    if let Some(rest) = action.strip_prefix("log:") {
        let text = rest.trim().to_string();
        return Ok(Box::new(move || {
            info!("combo '{name}': {text}");
            Ok(())
        }));
    }
    if action == "toggle" {
        return Ok(Box::new(move || {
            let was = paused.fetch_xor(true, Ordering::SeqCst);
            info!("combo '{name}': gestures {}", if was { "resumed" } else { "paused" });
            Ok(())
        }));
    }
    if let Some(rest) = action.strip_prefix("mouse:") {
        let button = rest.trim().to_string();
        MouseButton::parse(&button)?;
        return Ok(Box::new(move || sink.borrow_mut().click_mouse(&button)));
    }
    if let Some(rest) = action.strip_prefix("scroll:") {
        let steps = parse_scroll(rest)?;
        return Ok(Box::new(move || sink.borrow_mut().scroll_vertical(steps)));
    }
    if let Some(rest) = action.strip_prefix("key:") {
        let chord = rest.trim().to_string();
        validate_chord(&chord)?;
        return Ok(Box::new(move || sink.borrow_mut().key_chord(&chord)));
    }
    if let Some(rest) = action.strip_prefix("cmd:") {
        if !allow_commands {
            return Err(anyhow!("combo '{name}' uses cmd: but allow_commands=false"));
        }
        let cmdline = rest.trim().to_string();
        return Ok(Box::new(move || {
            let (pid, _reaper) = spawn_reaped(&cmdline)?;
            info!("combo '{name}': spawned '{cmdline}' (pid={pid})");
            Ok(())
        }));
    }

    Err(anyhow!("unknown action mapping for {} -> '{}'", name, action))
}

/// Runs `cmdline` under `sh -c`; a detached thread waits on the child so it
/// never lingers as a zombie.
fn spawn_reaped(cmdline: &str) -> Result<(u32, JoinHandle<io::Result<ExitStatus>>)> {
    let mut child = Command::new("sh").arg("-c").arg(cmdline).spawn()?;
    let pid = child.id();
    let cmdline = cmdline.to_string();
    let reaper = thread::Builder::new()
        .name("cmd-reaper".into())
        .spawn(move || {
            let status = child.wait();
            match &status {
                Ok(st) if !st.success() => warn!("'{cmdline}' (pid={pid}) exited with {st}"),
                Err(e) => warn!("failed to wait on '{cmdline}' (pid={pid}): {e}"),
                Ok(_) => {}
            }
            status
        })?;
    Ok((pid, reaper))
}

/// `vertical@<steps>`; a bare step count is accepted as vertical.
fn parse_scroll(rest: &str) -> Result<i32> {
    let parts: Vec<_> = rest.split('@').collect();
    let (axis, steps_str) = match parts.as_slice() {
        [steps] => ("vertical", *steps),
        [axis, steps] => (axis.trim(), *steps),
        _ => return Err(anyhow!("bad scroll action '{rest}'")),
    };
    if !axis.eq_ignore_ascii_case("vertical") {
        return Err(anyhow!("unsupported scroll axis '{axis}'"));
    }
    steps_str
        .trim()
        .parse()
        .map_err(|_| anyhow!("bad scroll steps '{steps_str}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts() -> (Rc<RefCell<UinputSink>>, Arc<AtomicBool>) {
        (
            Rc::new(RefCell::new(UinputSink::noop())),
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[test]
    fn scroll_actions_parse() {
        assert_eq!(parse_scroll("vertical@+3").unwrap(), 3);
        assert_eq!(parse_scroll("vertical@-2").unwrap(), -2);
        assert_eq!(parse_scroll("5").unwrap(), 5);
        assert!(parse_scroll("horizontal@1").is_err());
        assert!(parse_scroll("vertical@lots").is_err());
    }

    #[test]
    fn toggle_flips_pause_flag() {
        let (sink, paused) = parts();
        let mut a = bind_action("t", "toggle", sink, paused.clone(), false).unwrap();
        a().unwrap();
        assert!(paused.load(Ordering::SeqCst));
        a().unwrap();
        assert!(!paused.load(Ordering::SeqCst));
    }

    #[test]
    fn sink_actions_run_against_noop_sink() {
        for action in ["mouse:right", "scroll:vertical@-1", "key:CTRL+EQUAL", "log:hi"] {
            let (sink, paused) = parts();
            let mut a = bind_action("x", action, sink, paused, false).unwrap();
            a().unwrap();
        }
    }

    #[test]
    fn bad_actions_fail_at_bind_time() {
        for action in ["mouse:fourth", "key:CTRL+Q", "cmd:true", "beep"] {
            let (sink, paused) = parts();
            assert!(bind_action("x", action, sink, paused, false).is_err(), "{action}");
        }
    }

    #[test]
    fn default_profile_builds() {
        let (sink, paused) = parts();
        let profile = Profile::builtin_default().unwrap();
        let reg = build_registry(&profile, &sink, &paused).unwrap();
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn spawned_commands_are_waited_on() {
        let reapers: Vec<_> = (0..5)
            .map(|i| spawn_reaped(&format!("exit {}", i % 2)).unwrap())
            .collect();
        for (i, (pid, reaper)) in reapers.into_iter().enumerate() {
            let status = reaper.join().unwrap().unwrap();
            assert_eq!(status.code(), Some((i % 2) as i32));
            // a reaped child leaves no /proc entry behind
            assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
        }
    }

    #[test]
    fn cmd_action_runs_when_allowed() {
        let (sink, paused) = parts();
        let mut a = bind_action("c", "cmd:true", sink, paused, true).unwrap();
        for _ in 0..5 {
            a().unwrap();
        }
    }
}
