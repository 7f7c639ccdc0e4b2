use anyhow::Result;
use log::{error, info, warn};
use signal_hook::{
    consts::{SIGINT, SIGTERM, SIGUSR1},
    iterator::Signals,
};
use std::{
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    sync::{
        Arc,
        atomic::Ordering,
        mpsc::{self, Sender},
    },
    thread,
    time::Duration,
};

use super::pipeline::{PipelineShared, run_pipeline};
use super::runtime::socket_path;
use crate::config::{DaemonConfigState, Profile};

pub fn run_daemon(source: Option<String>) -> Result<()> {
    // socket
    let sock = socket_path();
    if sock.exists() {
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    // state
    let mut state = DaemonState::new()?;
    info!("daemon: active profile '{}'", state.cfg.active_name);

    // channels
    let (tx_req, rx_req) = mpsc::channel::<IpcMsg>();
    spawn_signal_thread(tx_req.clone())?;

    // gesture thread
    let shared = Arc::new(PipelineShared::default());
    let gesture_thread = GestureThread::start(state.cfg.profile.clone(), source, shared.clone());

    // accept loop
    listener.set_nonblocking(true)?;
    loop {
        if let Ok((stream, _)) = listener.accept() {
            // accepted sockets inherit non-blocking mode on some platforms
            let _ = stream.set_nonblocking(false);
            let tx = tx_req.clone();
            let st_snapshot = state.clone_shallow();
            let shared = shared.clone();
            thread::spawn(move || {
                if let Err(e) = handle_client(stream, st_snapshot, tx, shared) {
                    error!("ipc client error: {e}");
                }
            });
        }

        while let Ok(msg) = rx_req.try_recv() {
            match msg {
                IpcMsg::Reload => {
                    if let Err(e) = state.cfg.reload() {
                        error!("reload failed: {e}");
                    } else {
                        gesture_thread.update_profile(state.cfg.profile.clone());
                        info!("profile reloaded");
                    }
                }
                IpcMsg::UseProfile(name) => {
                    if let Err(e) = state.cfg.set_active(&name) {
                        error!("use profile failed: {e}");
                    } else {
                        gesture_thread.update_profile(state.cfg.profile.clone());
                        info!("switched active profile to {}", state.cfg.active_name);
                    }
                }
                IpcMsg::Pause(op) => {
                    let now = op.apply(&shared);
                    info!("gestures {}", if now { "paused" } else { "resumed" });
                }
                IpcMsg::Shutdown => {
                    let _ = std::fs::remove_file(&sock);
                    info!("daemon: shutting down");
                    return Ok(());
                }
            }
        }

        thread::sleep(Duration::from_millis(5));
    }
}

fn spawn_signal_thread(tx: Sender<IpcMsg>) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGUSR1])?;
    thread::spawn(move || {
        for sig in signals.forever() {
            let msg = match sig {
                SIGUSR1 => IpcMsg::Pause(PauseOp::Toggle),
                _ => IpcMsg::Shutdown,
            };
            if tx.send(msg).is_err() {
                break;
            }
        }
    });
    Ok(())
}

fn handle_client(
    mut stream: UnixStream,
    st: DaemonState,
    tx_req: Sender<IpcMsg>,
    shared: Arc<PipelineShared>,
) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let req: serde_json::Value = serde_json::from_str(&line)?;
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");

    let resp = match op {
        "status" => serde_json::json!({"ok": true, "data": {
            "paused": shared.paused.load(Ordering::SeqCst),
            "active_profile": st.cfg.active_name,
            "socket": socket_path(),
            "pipeline": shared.snapshot(),
        }}),
        "reload" => {
            let _ = tx_req.send(IpcMsg::Reload);
            serde_json::json!({"ok": true, "data": {"active_profile": st.cfg.active_name}})
        }
        "use" => {
            let name = req.get("profile").and_then(|v| v.as_str()).unwrap_or("");
            let _ = tx_req.send(IpcMsg::UseProfile(name.to_string()));
            serde_json::json!({"ok": true, "data": {"active_profile": name}})
        }
        "list" => {
            let list = st.cfg.list_profiles();
            serde_json::json!({"ok": true, "data": {"profiles": list, "active": st.cfg.active_name}})
        }
        "doctor" => {
            let report = st.cfg.doctor_report();
            serde_json::json!({"ok": true, "data": report})
        }
        "pause" | "resume" | "toggle" => {
            let pause_op = match op {
                "pause" => PauseOp::Set(true),
                "resume" => PauseOp::Set(false),
                _ => PauseOp::Toggle,
            };
            let _ = tx_req.send(IpcMsg::Pause(pause_op));
            serde_json::json!({"ok": true, "data": {"requested": op}})
        }
        "shutdown" => {
            let _ = tx_req.send(IpcMsg::Shutdown);
            serde_json::json!({"ok": true, "data": "shutting down"})
        }
        _ => serde_json::json!({"ok": false, "error": format!("unknown op: {op}")}),
    };

    writeln!(stream, "{}", resp)?;
    Ok(())
}

struct DaemonState {
    pub cfg: DaemonConfigState,
}

impl DaemonState {
    fn new() -> Result<Self> {
        let cfg = DaemonConfigState::load_or_install_default()?;
        Ok(Self { cfg })
    }
    fn clone_shallow(&self) -> Self {
        Self {
            cfg: self.cfg.clone(),
        }
    }
}

enum IpcMsg {
    Reload,
    UseProfile(String),
    Pause(PauseOp),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PauseOp {
    Set(bool),
    Toggle,
}

impl PauseOp {
    /// Returns the resulting paused flag.
    fn apply(self, shared: &PipelineShared) -> bool {
        match self {
            PauseOp::Set(v) => {
                shared.paused.store(v, Ordering::SeqCst);
                v
            }
            PauseOp::Toggle => !shared.paused.fetch_xor(true, Ordering::SeqCst),
        }
    }
}

struct GestureThread {
    tx_profile: Sender<Profile>,
    _thread: thread::JoinHandle<()>,
}

impl GestureThread {
    fn start(profile: Profile, source: Option<String>, shared: Arc<PipelineShared>) -> Self {
        let (tx_profile, rx_profile) = mpsc::channel();
        let handle = thread::spawn(move || {
            if let Err(e) = run_pipeline(profile, source, rx_profile, shared) {
                error!("gesture pipeline failed: {e}");
            }
        });
        Self {
            tx_profile,
            _thread: handle,
        }
    }

    fn update_profile(&self, new_profile: Profile) {
        if self.tx_profile.send(new_profile).is_err() {
            warn!("gesture pipeline is not running; profile change not applied");
        }
    }
}

// client helper
pub fn client_request(req: serde_json::Value) -> Result<serde_json::Value> {
    let sock = socket_path();
    if !sock.exists() {
        return Err(anyhow::anyhow!(
            "gesturectl daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}
