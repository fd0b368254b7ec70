//! Local cache of downloaded images, keyed by the record's external id

use log::debug;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::types::{get_image_extensions_set, IMG_FORMATS};
use crate::utils::{ensure_directory, infer_image_format};

/// A cached image file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedImage {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl CachedImage {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string()
    }
}

#[derive(Debug, Clone)]
pub struct ImageCache {
    dir: PathBuf,
}

impl ImageCache {
    /// Open (creating if needed) the cache directory
    pub fn open(dir: &Path) -> std::io::Result<Self> {
        Ok(Self {
            dir: ensure_directory(dir)?,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Look up a previously stored image
    pub fn load(&self, key: &str) -> std::io::Result<Option<CachedImage>> {
        for path in self.candidates(key) {
            if path.is_file() {
                debug!("Using cached image {}", path.display());
                let bytes = fs::read(&path)?;
                return Ok(Some(CachedImage { path, bytes }));
            }
        }
        Ok(None)
    }

    /// Store freshly fetched bytes; keys without an image extension get one
    /// inferred from the content
    ///
    /// The bytes land in a temporary file first and are renamed into place,
    /// so an interrupted write never leaves a partial image under the key.
    pub fn store(&self, key: &str, bytes: Vec<u8>) -> std::io::Result<CachedImage> {
        let base = self.dir.join(self.slot(key));
        let path = if has_image_extension(&base) {
            base
        } else {
            let extension = infer_image_format(&bytes).unwrap_or("png");
            append_extension(&base, extension)
        };

        let mut file = NamedTempFile::new_in(&self.dir)?;
        file.write_all(&bytes)?;
        file.as_file().sync_all()?;
        file.persist(&path)?;
        debug!("Cached image {}", path.display());
        Ok(CachedImage { path, bytes })
    }

    /// Drop a cached file that turned out to be unusable
    pub fn evict(&self, cached: &CachedImage) -> std::io::Result<()> {
        match fs::remove_file(&cached.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => {
                debug!("Evicted cached image {}", cached.path.display());
                Ok(())
            }
        }
    }

    /// File name a key is stored under, before any inferred extension;
    /// distinct keys can share a slot once sanitized
    pub fn slot(&self, key: &str) -> String {
        sanitize_filename::sanitize(key)
    }

    fn candidates(&self, key: &str) -> Vec<PathBuf> {
        let base = self.dir.join(self.slot(key));
        if has_image_extension(&base) {
            vec![base]
        } else {
            IMG_FORMATS
                .iter()
                .map(|ext| append_extension(&base, ext))
                .collect()
        }
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| get_image_extensions_set().contains(&ext.to_lowercase()))
}

// `with_extension` would clobber dotted keys such as "scan.v2"
fn append_extension(base: &Path, extension: &str) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}
