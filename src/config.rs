use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::Deserialize;
use std::{
    collections::HashSet,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::combo::{ComboSequence, GestureFramePair};
use crate::pattern::FingerPattern;

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
    #[serde(default)]
    pub allow_commands: bool,
}

/// Construction-time constants of the pointer pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PointerSettings {
    pub screen_w: i32,
    pub screen_h: i32,
    pub smooth_factor: f32,
    pub drag_smooth_factor: f32,
    pub tap_threshold: f32,
    pub scroll_step: i32,
}

impl Default for PointerSettings {
    fn default() -> Self {
        Self {
            screen_w: 1920,
            screen_h: 1080,
            smooth_factor: 0.5,
            drag_smooth_factor: 0.2,
            tap_threshold: 0.03,
            scroll_step: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComboConfig {
    pub name: String,
    /// `[left, right]` pattern strings, one entry per step.
    pub steps: Vec<[FingerPattern; 2]>,
    pub action: String,
}

impl ComboConfig {
    pub fn sequence(&self) -> ComboSequence {
        self.steps
            .iter()
            .map(|[l, r]| GestureFramePair::new(*l, *r))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    #[serde(default)]
    pub pointer: PointerSettings,
    #[serde(default)]
    pub combos: Vec<ComboConfig>,
}

impl Profile {
    pub fn from_toml_str(txt: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn builtin_default() -> Result<Self> {
        Self::from_toml_str(default_profile_text())
    }
}

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

pub(crate) fn home_dir() -> PathBuf {
    UserDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn config_dir() -> PathBuf {
    home_dir().join(".config").join("gesturectl")
}

fn profiles_dir() -> PathBuf {
    config_dir().join("profiles")
}

fn active_ptr_path() -> PathBuf {
    config_dir().join("active")
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir();
        let profdir = profiles_dir();
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = active_ptr_path();
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = Self::load_profile(&active_name)?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    pub fn reload(&mut self) -> Result<()> {
        self.profile = Self::load_profile(&self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        // validate before switching the pointer
        let profile = Self::load_profile(name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                if let Some(ext) = e.path().extension() {
                    if ext == "toml" {
                        if let Some(stem) = e.path().file_stem().and_then(|s| s.to_str()) {
                            v.push(stem.to_string());
                        }
                    }
                }
            }
        }
        v.sort();
        v
    }

    fn load_profile(name: &str) -> Result<Profile> {
        let path = profiles_dir().join(format!("{name}.toml"));
        let txt = fs::read_to_string(&path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        Profile::from_toml_str(&txt).map_err(|e| anyhow!("failed to load {}: {e}", path.display()))
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let uinput_ok = Path::new("/dev/uinput").exists();
        let in_input_group = check_in_input_group();
        let combos: Vec<&str> = self.profile.combos.iter().map(|c| c.name.as_str()).collect();
        serde_json::json!({
            "uinput_present": uinput_ok,
            "input_group_member": in_input_group,
            "config_dir": self.config_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "profile_name": self.profile.meta.name,
            "screen": [self.profile.pointer.screen_w, self.profile.pointer.screen_h],
            "combos": combos,
            "hints": {
                "udev_rule": "/etc/udev/rules.d/80-uinput.rules",
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input",
                "frame_format": "{\"hands\":[{\"label\":\"Right\",\"landmarks\":[{\"x\":0.5,\"y\":0.5}, ...21]}]}"
            }
        })
    }
}

pub(crate) fn validate_profile(p: &Profile) -> Result<()> {
    let ptr = &p.pointer;
    if ptr.screen_w <= 0 || ptr.screen_h <= 0 {
        return Err(anyhow!("pointer.screen_w/screen_h must be positive"));
    }
    for (name, f) in [
        ("smooth_factor", ptr.smooth_factor),
        ("drag_smooth_factor", ptr.drag_smooth_factor),
    ] {
        if !(f > 0.0 && f <= 1.0) {
            return Err(anyhow!("pointer.{name} must be in (0,1]"));
        }
    }
    if !(ptr.tap_threshold > 0.0 && ptr.tap_threshold < 1.0) {
        return Err(anyhow!(
            "pointer.tap_threshold must be in (0,1) normalized units"
        ));
    }

    let mut seen = HashSet::new();
    for c in &p.combos {
        if c.name.trim().is_empty() {
            return Err(anyhow!("combo with empty name"));
        }
        if c.steps.is_empty() {
            return Err(anyhow!("combo '{}' has no steps", c.name));
        }
        let seq = c.sequence();
        if seq.iter().any(|s| s.both_closed()) {
            return Err(anyhow!(
                "combo '{}' contains the all-closed stop pose ({} / {})",
                c.name,
                FingerPattern::ALL_DOWN,
                FingerPattern::ALL_DOWN
            ));
        }
        if seq.windows(2).any(|w| w[0] == w[1]) {
            return Err(anyhow!(
                "combo '{}' repeats a step back-to-back; held poses record once",
                c.name
            ));
        }
        if !seen.insert(seq) {
            return Err(anyhow!("combo '{}' duplicates another combo's steps", c.name));
        }
        validate_action(&c.name, &c.action, p.meta.allow_commands)?;
    }
    Ok(())
}

fn validate_action(name: &str, v: &str, allow_commands: bool) -> Result<()> {
    if v.trim().is_empty() {
        return Err(anyhow!("combo '{}' has empty action", name));
    }
    let ok = v.starts_with("log:")
        || v.starts_with("mouse:")
        || v.starts_with("scroll:")
        || v.starts_with("key:")
        || v == "toggle"
        || v.starts_with("cmd:");
    if !ok {
        return Err(anyhow!("combo '{}' has invalid action '{}'", name, v));
    }
    if v.starts_with("cmd:") && !allow_commands {
        return Err(anyhow!(
            "combo '{}' uses cmd: but allow_commands=false",
            name
        ));
    }
    Ok(())
}

fn check_in_input_group() -> bool {
    if let Ok(s) = fs::read_to_string("/etc/group") {
        let user = whoami::username();
        for line in s.lines() {
            if line.starts_with("input:") {
                if line
                    .split(':')
                    .nth(3)
                    .unwrap_or("")
                    .split(',')
                    .any(|u| u == user)
                {
                    return true;
                }
            }
        }
    }
    false
}
