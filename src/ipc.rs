//! Daemon side: control socket, frame pipeline and combo action binding.

pub mod dispatch;
pub mod pipeline;
pub mod runtime;
pub mod server;

pub use pipeline::replay;
pub use server::{client_request, run_daemon};
