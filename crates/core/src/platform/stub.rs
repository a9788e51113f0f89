use tracing::info;

use crate::error::Result;
use crate::types::*;
use super::{Controller, EmulatorProfile};

/// Logs every call and returns blank frames of the profile's size.
pub struct StubController {
    width: i32,
    height: i32,
}

impl StubController {
    pub fn new(profile: &EmulatorProfile) -> Self {
        Self { width: profile.width, height: profile.height }
    }
}

impl Controller for StubController {
    fn connect(&mut self) -> Result<()> {
        info!(target: "stub", "connect()");
        Ok(())
    }

    fn resolution(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    fn screencap(&mut self) -> Result<Capture> {
        info!(target: "stub", "screencap() -> {}x{}", self.width, self.height);
        Ok(Capture::blank(self.width.max(1) as u32, self.height.max(1) as u32))
    }

    fn click(&mut self, p: Point) -> Result<()> {
        info!(target: "stub", "click({}, {})", p.x, p.y);
        Ok(())
    }

    fn swipe(&mut self, from: Point, to: Point, duration_ms: u32) -> Result<()> {
        info!(target: "stub", "swipe(({}, {}) -> ({}, {}), {}ms)", from.x, from.y, to.x, to.y, duration_ms);
        Ok(())
    }
}
