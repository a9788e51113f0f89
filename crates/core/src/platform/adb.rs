use std::process::Command as ProcessCommand;

use image::imageops::{self, FilterType};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::*;
use super::{AdbCommands, Controller, EmulatorProfile};

/// Drives a device through the adb text protocol described by the profile's
/// command set.
pub struct AdbController {
    profile: EmulatorProfile,
    address: String,
    /// Physical resolution reported by the device
    display: Option<(i32, i32)>,
}

impl AdbController {
    pub fn new(profile: EmulatorProfile, address: &str) -> Self {
        Self { profile, address: address.to_string(), display: None }
    }

    fn base_vars(&self) -> Vec<(&'static str, String)> {
        vec![("Adb", self.profile.adb.path.clone()), ("Address", self.address.clone())]
    }

    fn run(&self, template: &str, extra: Vec<(&'static str, String)>) -> Result<Vec<u8>> {
        let mut vars = self.base_vars();
        vars.extend(extra);
        let cmdline = AdbCommands::render(template, &vars);
        let argv = split_command(&cmdline);
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::device("empty adb command"));
        };
        debug!(target: "adb", "{}", cmdline);
        let output = ProcessCommand::new(program)
            .args(args)
            .output()
            .map_err(|e| Error::device(format!("failed to spawn `{}`: {}", program, e)))?;
        if !output.status.success() {
            return Err(Error::device(format!(
                "`{}` exited with {}: {}",
                cmdline,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }

    fn physical(&self) -> (i32, i32) {
        self.display.unwrap_or((self.profile.width, self.profile.height))
    }

    /// Map a logical point onto the device's physical surface.
    fn to_physical(&self, p: Point) -> Point {
        let (pw, ph) = self.physical();
        let prof = &self.profile;
        let surface_w = (pw - prof.x_offset - prof.right_offset) as i64;
        let surface_h = (ph - prof.y_offset - prof.bottom_offset) as i64;
        Point::new(
            prof.x_offset + (p.x as i64 * surface_w / prof.width as i64) as i32,
            prof.y_offset + (p.y as i64 * surface_h / prof.height as i64) as i32,
        )
    }

    fn fetch_png(&self) -> Result<Vec<u8>> {
        let adb = &self.profile.adb;
        let stdout = self.run(&adb.screencap, Vec::new())?;
        if adb.pullscreen.is_empty() {
            return Ok(stdout);
        }
        let target = std::env::temp_dir().join(format!("meo-screencap-{}.png", std::process::id()));
        self.run(&adb.pullscreen, vec![("Target", target.to_string_lossy().into_owned())])?;
        Ok(std::fs::read(&target)?)
    }
}

impl Controller for AdbController {
    fn connect(&mut self) -> Result<()> {
        let adb = self.profile.adb.clone();
        if !adb.connect.is_empty() {
            let out = self.run(&adb.connect, Vec::new())?;
            info!(target: "adb", "connect {}: {}", self.address, String::from_utf8_lossy(&out).trim());
        }

        self.display = if !adb.display.is_empty() {
            let out = self.run(&adb.display, Vec::new())?;
            Some(parse_display(&String::from_utf8_lossy(&out), &adb.display_regex)?)
        } else if adb.display_width > 0 && adb.display_height > 0 {
            Some((adb.display_width, adb.display_height))
        } else {
            None
        };
        let (w, h) = self.physical();
        info!(target: "adb", "device {} physical {}x{}, logical {}x{}", self.address, w, h, self.profile.width, self.profile.height);
        Ok(())
    }

    fn resolution(&self) -> (i32, i32) {
        (self.profile.width, self.profile.height)
    }

    fn screencap(&mut self) -> Result<Capture> {
        let raw = self.fetch_png()?;
        let decoded = match image::load_from_memory(&raw) {
            Ok(img) => img,
            Err(e) => {
                // Some adb builds translate LF to CRLF on the shell pipe.
                warn!(target: "adb", "screencap decode failed ({}), retrying with CRLF fix", e);
                image::load_from_memory(&crlf_to_lf(&raw))?
            }
        };
        let mut rgba = decoded.to_rgba8();

        let prof = &self.profile;
        let (w, h) = (rgba.width() as i32, rgba.height() as i32);
        let surface = Rect::new(
            prof.x_offset,
            prof.y_offset,
            w - prof.x_offset - prof.right_offset,
            h - prof.y_offset - prof.bottom_offset,
        );
        if surface.is_empty() {
            return Err(Error::device(format!("offsets leave nothing of a {}x{} frame", w, h)));
        }
        if surface != Rect::new(0, 0, w, h) {
            rgba = imageops::crop_imm(&rgba, surface.x as u32, surface.y as u32, surface.width as u32, surface.height as u32)
                .to_image();
        }
        if rgba.width() as i32 != prof.width || rgba.height() as i32 != prof.height {
            rgba = imageops::resize(&rgba, prof.width as u32, prof.height as u32, FilterType::Triangle);
        }
        Ok(Capture::new(rgba))
    }

    fn click(&mut self, p: Point) -> Result<()> {
        let pp = self.to_physical(p);
        let template = self.profile.adb.click.clone();
        self.run(&template, vec![("x", pp.x.to_string()), ("y", pp.y.to_string())])?;
        Ok(())
    }

    fn swipe(&mut self, from: Point, to: Point, duration_ms: u32) -> Result<()> {
        let (a, b) = (self.to_physical(from), self.to_physical(to));
        let template = self.profile.adb.swipe.clone();
        self.run(
            &template,
            vec![
                ("x1", a.x.to_string()),
                ("y1", a.y.to_string()),
                ("x2", b.x.to_string()),
                ("y2", b.y.to_string()),
                ("duration", duration_ms.to_string()),
            ],
        )?;
        Ok(())
    }
}

/// Parse the display query output. The result is always landscape.
pub(crate) fn parse_display(output: &str, pattern: &str) -> Result<(i32, i32)> {
    let re = Regex::new(pattern)?;
    let caps = re
        .captures(output)
        .ok_or_else(|| Error::device(format!("display output did not match `{}`: {}", pattern, output.trim())))?;
    let group = |i: usize| -> Result<i32> {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .ok_or_else(|| Error::device(format!("display regex group {} is not a number", i)))
    };
    let (a, b) = (group(1)?, group(2)?);
    Ok((a.max(b), a.min(b)))
}

/// Split a rendered command line on whitespace, honoring double quotes.
pub(crate) fn split_command(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut cur = String::new();
    let mut quoted = false;
    let mut pending = false;
    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            c if c.is_whitespace() && !quoted => {
                if pending {
                    args.push(std::mem::take(&mut cur));
                    pending = false;
                }
            }
            c => {
                cur.push(c);
                pending = true;
            }
        }
    }
    if pending {
        args.push(cur);
    }
    args
}

fn crlf_to_lf(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == b'\r' && data.get(i + 1) == Some(&b'\n') {
            i += 1;
            continue;
        }
        out.push(data[i]);
        i += 1;
    }
    out
}
