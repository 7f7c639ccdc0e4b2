use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, process::Command};

use crate::actions::{PointerDriver, UinputSink};
use crate::config::{DaemonConfigState, Profile};
use crate::ipc;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        let input: Option<String> = pargs.opt_value_from_str("--input")?;
        return ipc::run_daemon(input);
    }

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    // Flags-based help (-h/--help)
    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("start") => {
            let input: Option<String> = pargs.opt_value_from_str("--input")?;
            let exe = std::env::current_exe()?;
            let mut cmd = Command::new(exe);
            cmd.arg("--daemon");
            if let Some(path) = &input {
                cmd.arg("--input").arg(path);
            }
            let child = cmd.spawn()?;
            println!("gesturectl: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("run") => {
            let input: Option<String> = pargs.opt_value_from_str("--input")?;
            ipc::run_daemon(input)
        }

        Some("replay") => {
            let live = pargs.contains("--live");
            let path: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: gesturectl replay <frames.jsonl> [--live]"))?;
            let profile = DaemonConfigState::load_or_install_default()
                .map(|c| c.profile)
                .or_else(|e| {
                    log::warn!("falling back to built-in profile: {e}");
                    Profile::builtin_default()
                })?;
            ipc::replay(&profile, &path, live)
        }

        Some(op @ ("stop" | "status" | "reload" | "list" | "doctor" | "pause" | "resume"
        | "toggle")) => {
            let op = if op == "stop" { "shutdown" } else { op };
            let r = ipc::client_request(serde_json::json!({ "op": op }))?;
            print_response(&r);
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: gesturectl use <profile_name>"))?;
            let r = ipc::client_request(serde_json::json!({"op":"use","profile":name}))?;
            print_response(&r);
            Ok(())
        }

        Some("emit") => {
            // usage:
            //   gesturectl emit move 640 400
            //   gesturectl emit click right
            //   gesturectl emit scroll 3
            //   gesturectl emit key CTRL+EQUAL
            let what: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: gesturectl emit <move|click|scroll|key> ..."))?;
            let ptr = DaemonConfigState::load_or_install_default()
                .map(|c| c.profile.pointer)
                .unwrap_or_default();
            let mut sink = UinputSink::new(ptr.screen_w, ptr.screen_h)?;
            match what.as_str() {
                "move" => {
                    let x: i32 = pargs
                        .free_from_str()
                        .map_err(|_| anyhow!("usage: gesturectl emit move <x> <y>"))?;
                    let y: i32 = pargs
                        .free_from_str()
                        .map_err(|_| anyhow!("usage: gesturectl emit move <x> <y>"))?;
                    sink.move_to(x, y)?;
                    println!("ok: moved pointer to {x},{y}");
                }
                "click" => {
                    let btn: String = pargs
                        .free_from_str()
                        .map_err(|_| anyhow!("usage: gesturectl emit click <left|right|middle>"))?;
                    sink.click_mouse(&btn)?;
                    println!("ok: clicked {btn}");
                }
                "scroll" => {
                    let steps: i32 = pargs
                        .free_from_str()
                        .map_err(|_| anyhow!("usage: gesturectl emit scroll <steps>"))?;
                    sink.scroll_vertical(steps)?;
                    println!("ok: scrolled vertical {steps}");
                }
                "key" => {
                    let chord: String = pargs
                        .free_from_str()
                        .map_err(|_| anyhow!("usage: gesturectl emit key CTRL+EQUAL"))?;
                    sink.key_chord(&chord)?;
                    println!("ok: sent key chord {chord}");
                }
                other => return Err(anyhow!("unknown emit kind: {other}")),
            }
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!(
        r#"gesturectl — hand-gesture pointer and combo daemon

USAGE:
  gesturectl help [command]                 Show general or command-specific help
  gesturectl start [--input PATH]           Start the daemon (frames from PATH, default stdin)
  gesturectl run [--input PATH]             Run the daemon in the foreground
  gesturectl stop                           Stop the daemon
  gesturectl status                         Show daemon and pipeline state
  gesturectl reload                         Reload active profile (resets gesture state)
  gesturectl use <name>                     Switch active profile
  gesturectl list                           List profiles
  gesturectl doctor                         Diagnose permissions and configuration
  gesturectl pause | resume | toggle        Freeze or unfreeze gesture effects
  gesturectl replay <file> [--live]         Feed recorded frames, print results as JSON
  gesturectl emit move <x> <y>              Move the pointer
  gesturectl emit click <left|right|middle> Emit a mouse click
  gesturectl emit scroll <steps>            Emit vertical scroll (+/- steps)
  gesturectl emit key CTRL+EQUAL            Emit a key or chord

TIPS:
  - Frames: one JSON object per line, {{"hands":[{{"label":"Right","landmarks":[...21 points]}}]}}
  - Profiles: ~/.config/gesturectl/profiles
  - Active profile pointer: ~/.config/gesturectl/active
  - SIGUSR1 toggles pause, SIGINT/SIGTERM stop the daemon
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!(
            "usage: gesturectl start [--input PATH]\nStarts the background daemon reading hand frames from PATH (file or FIFO)."
        ),
        "run" => println!(
            "usage: gesturectl run [--input PATH]\nRuns the daemon in the foreground; frames default to stdin."
        ),
        "stop" => println!("usage: gesturectl stop\nStops the running daemon."),
        "status" => println!(
            "usage: gesturectl status\nShows paused flag, active profile, frame count, combo recording state."
        ),
        "reload" => println!(
            "usage: gesturectl reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: gesturectl use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => println!("usage: gesturectl list\nLists available profiles."),
        "doctor" => println!(
            "usage: gesturectl doctor\nChecks uinput permissions and the active profile."
        ),
        "pause" | "resume" | "toggle" => println!(
            "usage: gesturectl {cmd}\nWhile paused, frames are read but move nothing and record no combos."
        ),
        "replay" => println!(
            "usage: gesturectl replay <file> [--live]\nRuns recorded frames through the active profile; --live drives the real pointer."
        ),
        "emit" => println!(
            "usage:\n  gesturectl emit move <x> <y>\n  gesturectl emit click <left|right|middle>\n  gesturectl emit scroll <steps>\n  gesturectl emit key CTRL+EQUAL"
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
