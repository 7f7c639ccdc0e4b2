use std::{fs, path::PathBuf};

use crate::config::home_dir;

pub fn runtime_dir() -> PathBuf {
    let dir = home_dir().join(".local").join("run");
    let _ = fs::create_dir_all(&dir);
    dir
}

pub fn socket_path() -> PathBuf {
    runtime_dir().join("gesturectl.sock")
}
