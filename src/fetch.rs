//! Download-once cache for pretrained weights and label tables.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::info;

use crate::error::{ClassifyError, Result};

pub const IMAGENET_CLASS_INDEX_URL: &str =
    "https://storage.googleapis.com/download.tensorflow.org/data/imagenet_class_index.json";
pub const IMAGENET_CLASS_INDEX_FILE: &str = "imagenet_class_index.json";

#[derive(Debug, Clone)]
pub struct AssetCache {
    dir: PathBuf,
}

impl AssetCache {
    /// Uses `dir` when given, otherwise the platform cache directory.
    pub fn new(dir: Option<PathBuf>) -> Result<Self> {
        let dir = match dir {
            Some(dir) => dir,
            None => dirs::cache_dir()
                .map(|d| d.join(env!("CARGO_PKG_NAME")))
                .ok_or_else(|| {
                    ClassifyError::Startup("no cache directory available; pass --cache-dir".to_string())
                })?,
        };
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Returns the cached copy of `url`, downloading it first if absent.
    pub fn fetch(&self, url: &str, file_name: &str) -> Result<PathBuf> {
        let target = self.path_for(file_name);
        if target.is_file() {
            return Ok(target);
        }

        fs::create_dir_all(&self.dir).map_err(|e| startup(&self.dir, e))?;
        info!(url = %url, path = %target.display(), "Downloading asset");
        let t = Instant::now();

        let response = ureq::get(url)
            .call()
            .map_err(|e| ClassifyError::Startup(format!("download of {} failed: {}", url, e)))?;

        // An interrupted download leaves only the .part file behind.
        let partial = target.with_extension("part");
        let mut file = File::create(&partial).map_err(|e| startup(&partial, e))?;
        let bytes = io::copy(&mut response.into_reader(), &mut file).map_err(|e| startup(&partial, e))?;
        file.sync_all().map_err(|e| startup(&partial, e))?;
        fs::rename(&partial, &target).map_err(|e| startup(&target, e))?;

        info!(path = %target.display(), bytes, elapsed = ?t.elapsed(), "Asset cached");
        Ok(target)
    }
}

fn startup(path: &Path, e: io::Error) -> ClassifyError {
    ClassifyError::Startup(format!("{}: {}", path.display(), e))
}
