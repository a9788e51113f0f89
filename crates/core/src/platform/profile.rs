use std::collections::BTreeMap;
use std::ops::BitOr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One of the three OS-level handle kinds an emulator exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleType {
    Window,
    View,
    Control,
}

impl HandleType {
    pub const ALL: [HandleType; 3] = [HandleType::Window, HandleType::View, HandleType::Control];

    fn bit(self) -> u8 {
        match self {
            HandleType::Window => 1,
            HandleType::View => 2,
            HandleType::Control => 4,
        }
    }
}

/// A subset of handle kinds, so one lookup can ask for several at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleKinds(u8);

impl HandleKinds {
    pub const NONE: HandleKinds = HandleKinds(0);
    pub const WINDOW: HandleKinds = HandleKinds(1);
    pub const VIEW: HandleKinds = HandleKinds(2);
    pub const CONTROL: HandleKinds = HandleKinds(4);
    pub const ALL: HandleKinds = HandleKinds(7);

    pub fn contains(self, kind: HandleType) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = HandleType> {
        HandleType::ALL.into_iter().filter(move |k| self.contains(*k))
    }
}

impl From<HandleType> for HandleKinds {
    fn from(kind: HandleType) -> Self {
        HandleKinds(kind.bit())
    }
}

impl BitOr for HandleKinds {
    type Output = HandleKinds;

    fn bitor(self, rhs: HandleKinds) -> HandleKinds {
        HandleKinds(self.0 | rhs.0)
    }
}

/// Class-name / window-name pair identifying a window, view or control.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleDescriptor {
    #[serde(default)]
    pub class_name: String,
    #[serde(default)]
    pub window_name: String,
}

/// Command templates for one device family.
///
/// Placeholders: `[Adb]`, `[Address]`, `[x]`, `[y]`, `[x1]`, `[y1]`, `[x2]`,
/// `[y2]`, `[duration]`, `[Target]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdbCommands {
    pub path: String,
    pub connect: String,
    pub click: String,
    pub swipe: String,
    pub display: String,
    /// Two capture groups: width, height
    pub display_regex: String,
    pub screencap: String,
    /// Empty when `screencap` already streams the PNG to stdout
    pub pullscreen: String,
    pub display_width: i32,
    pub display_height: i32,
}

impl AdbCommands {
    /// Stock `adb` command set: tap/swipe through `input`, PNG over `exec-out`.
    pub fn standard() -> Self {
        Self {
            path: "adb".into(),
            connect: "[Adb] connect [Address]".into(),
            click: "[Adb] -s [Address] shell input tap [x] [y]".into(),
            swipe: "[Adb] -s [Address] shell input swipe [x1] [y1] [x2] [y2] [duration]".into(),
            display: "[Adb] -s [Address] shell wm size".into(),
            display_regex: r"(\d+)x(\d+)".into(),
            screencap: "[Adb] -s [Address] exec-out screencap -p".into(),
            ..Self::default()
        }
    }

    /// Substitute `[key]` placeholders in `template`.
    pub fn render(template: &str, vars: &[(&str, String)]) -> String {
        let mut out = template.to_string();
        for (key, value) in vars {
            out = out.replace(&format!("[{}]", key), value);
        }
        out
    }
}

/// Device profile: control surface and geometry, independent of the task graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorProfile {
    pub window: Vec<HandleDescriptor>,
    pub view: Vec<HandleDescriptor>,
    pub control: Vec<HandleDescriptor>,
    pub is_adb: bool,
    pub adb: AdbCommands,
    /// Logical resolution that templates and task rects are authored in
    pub width: i32,
    pub height: i32,
    pub x_offset: i32,
    pub y_offset: i32,
    pub right_offset: i32,
    pub bottom_offset: i32,
}

impl Default for EmulatorProfile {
    fn default() -> Self {
        Self {
            window: Vec::new(),
            view: Vec::new(),
            control: Vec::new(),
            is_adb: true,
            adb: AdbCommands::default(),
            width: 1280,
            height: 720,
            x_offset: 0,
            y_offset: 0,
            right_offset: 0,
            bottom_offset: 0,
        }
    }
}

impl EmulatorProfile {
    pub fn descriptors(&self, kind: HandleType) -> &[HandleDescriptor] {
        match kind {
            HandleType::Window => &self.window,
            HandleType::View => &self.view,
            HandleType::Control => &self.control,
        }
    }

    /// Descriptor sets for every kind in `kinds`.
    pub fn lookup(&self, kinds: HandleKinds) -> Vec<(HandleType, &[HandleDescriptor])> {
        kinds.iter().map(|k| (k, self.descriptors(k))).collect()
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        if self.width <= 0 || self.height <= 0 {
            return Err(Error::config(format!(
                "profile {}: logical resolution {}x{} must be positive",
                name, self.width, self.height
            )));
        }
        if self.x_offset < 0 || self.y_offset < 0 || self.right_offset < 0 || self.bottom_offset < 0 {
            return Err(Error::config(format!("profile {}: offsets must not be negative", name)));
        }
        if self.is_adb {
            for (field, value) in [
                ("path", &self.adb.path),
                ("click", &self.adb.click),
                ("swipe", &self.adb.swipe),
                ("screencap", &self.adb.screencap),
            ] {
                if value.is_empty() {
                    return Err(Error::config(format!("profile {}: adb.{} is empty", name, field)));
                }
            }
            if !self.adb.display.is_empty() {
                let re = regex::Regex::new(&self.adb.display_regex)?;
                if re.captures_len() < 3 {
                    return Err(Error::config(format!(
                        "profile {}: adb.display_regex needs two capture groups",
                        name
                    )));
                }
            }
        } else if self.window.is_empty() {
            return Err(Error::config(format!("profile {}: native control needs a window descriptor", name)));
        }
        Ok(())
    }
}

/// Load `profiles.json`: a map of profile name to profile.
pub fn load_profiles(path: &Path) -> Result<BTreeMap<String, EmulatorProfile>> {
    let text = std::fs::read_to_string(path)?;
    let profiles: BTreeMap<String, EmulatorProfile> = serde_json::from_str(&text)?;
    for (name, profile) in &profiles {
        profile.validate(name)?;
    }
    Ok(profiles)
}
