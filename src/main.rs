mod actions;
mod cli;
mod combo;
mod config;
mod cursor;
mod gestures;
mod hand;
mod ipc;
mod logging;
mod pattern;
mod pinch;
mod source;
mod zoom;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
