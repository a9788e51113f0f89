use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::debug;

use crate::error::{Error, Result};

/// Template images keyed by file name, loaded lazily from one directory.
pub struct TemplateStore {
    dir: PathBuf,
    cache: HashMap<String, RgbaImage>,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), cache: HashMap::new() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Register an in-memory template, shadowing any file of the same name.
    pub fn insert(&mut self, name: impl Into<String>, image: RgbaImage) {
        self.cache.insert(name.into(), image);
    }

    pub fn get(&mut self, name: &str) -> Result<&RgbaImage> {
        if !self.cache.contains_key(name) {
            let path = self.dir.join(name);
            let image = image::open(&path)
                .map_err(|e| Error::config(format!("cannot load template {}: {}", path.display(), e)))?
                .to_rgba8();
            debug!(template = name, w = image.width(), h = image.height(), "loaded template");
            self.cache.insert(name.to_string(), image);
        }
        Ok(&self.cache[name])
    }

    /// Load every named template now so missing files surface before a run.
    pub fn preload<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for name in names {
            self.get(name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_from_dir_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::from_pixel(4, 3, image::Rgba([1, 2, 3, 255]))
            .save(dir.path().join("btn.png"))
            .unwrap();
        let mut store = TemplateStore::new(dir.path());
        assert_eq!(store.get("btn.png").unwrap().dimensions(), (4, 3));
        std::fs::remove_file(dir.path().join("btn.png")).unwrap();
        assert!(store.get("btn.png").is_ok());
    }

    #[test]
    fn missing_template_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TemplateStore::new(dir.path());
        assert!(matches!(store.preload(["nope.png"]), Err(Error::InvalidConfiguration(_))));
    }
}
