use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::error::Result;
use crate::types::*;

/// Writes diagnostic frames as `<dir>/<timestamp>_<tag>.png`.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    dir: PathBuf,
    crop_offset: u32,
}

impl Diagnostics {
    pub fn new(dir: impl Into<PathBuf>, crop_offset: u32) -> Self {
        Self { dir: dir.into(), crop_offset }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, frame: &Capture, tag: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S-%3f");
        let path = self.dir.join(format!("{}_{}.png", stamp, sanitize(tag)));

        let off = self.crop_offset as i32;
        let inner = Rect::new(off, off, frame.width() as i32 - 2 * off, frame.height() as i32 - 2 * off);
        match frame.crop(inner).filter(|_| off > 0) {
            Some(cropped) => cropped.save(&path)?,
            None => frame.image.save(&path)?,
        }
        info!(path = %path.display(), "diagnostic frame saved");
        Ok(path)
    }
}

fn sanitize(tag: &str) -> String {
    tag.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' }).collect()
}
