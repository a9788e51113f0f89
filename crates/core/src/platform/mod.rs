pub mod adb;
pub mod profile;
pub mod stub;

use crate::error::Result;
use crate::types::*;

pub use profile::{AdbCommands, EmulatorProfile, HandleDescriptor, HandleKinds, HandleType};

/// Control surface of one device. All coordinates are logical (frame) space.
pub trait Controller: Send {
    fn connect(&mut self) -> Result<()>;
    /// Logical resolution of captured frames
    fn resolution(&self) -> (i32, i32);
    fn screencap(&mut self) -> Result<Capture>;
    fn click(&mut self, p: Point) -> Result<()>;
    fn swipe(&mut self, from: Point, to: Point, duration_ms: u32) -> Result<()>;
}

/// Create the controller for `profile`. Native-handle profiles are not
/// driven on this platform and get the stub.
pub fn create_controller(profile: &EmulatorProfile, address: &str, force_stub: bool) -> Box<dyn Controller> {
    if force_stub {
        return Box::new(stub::StubController::new(profile));
    }
    if profile.is_adb {
        return Box::new(adb::AdbController::new(profile.clone(), address));
    }
    for (kind, descriptors) in profile.lookup(HandleKinds::ALL) {
        for d in descriptors {
            tracing::debug!(?kind, class = %d.class_name, window = %d.window_name, "native handle descriptor");
        }
    }
    tracing::warn!("native handle control is unavailable here, falling back to stub");
    Box::new(stub::StubController::new(profile))
}
