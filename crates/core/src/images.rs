//! Derivative Image Cache.
//!
//! Originals live under `<base>/<item id>/`. Scaled and cropped derivatives
//! are written next to them on first request and served from disk after
//! that. Derivatives are pure cache entries and may be removed at any time.

use chrono::Utc;
use image::ImageFormat;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::task;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::ImageConfig;
use crate::derivative::{DerivativeName, OriginalName, Size};
use crate::error::{CoreError, Result};
use crate::models::ItemId;
use crate::resize::{ImageResizer, Resizer};

const DEFAULT_SMALL_SIDE: u32 = 200;
const DEFAULT_MAX_SIDE: u32 = 4096;

/// An original image handed in for storage.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Name an upload `<unix seconds>i<index>.<ext>`, sniffing the extension
    /// from the bytes (`bin` if unrecognised).
    pub fn generated(bytes: Vec<u8>, index: usize) -> Self {
        let ext = infer::get(&bytes)
            .map(|kind| kind.extension())
            .unwrap_or("bin");
        let filename = format!("{}i{}.{}", Utc::now().timestamp(), index, ext);
        Self { filename, bytes }
    }
}

pub struct DerivativeCache {
    base: PathBuf,
    small_width: u32,
    small_height: u32,
    max_side: u32,
    resizer: Arc<dyn Resizer>,
    generated: AtomicU64,
    temp_seq: AtomicU64,
}

impl DerivativeCache {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            small_width: DEFAULT_SMALL_SIDE,
            small_height: DEFAULT_SMALL_SIDE,
            max_side: DEFAULT_MAX_SIDE,
            resizer: Arc::new(ImageResizer::default()),
            generated: AtomicU64::new(0),
            temp_seq: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &ImageConfig) -> Self {
        Self::new(&config.base_path)
            .with_small_size(config.small_width, config.small_height)
            .with_max_side(config.max_side)
    }

    /// Dimensions of the derivatives warmed at upload time.
    pub fn with_small_size(mut self, width: u32, height: u32) -> Self {
        self.small_width = width;
        self.small_height = height;
        self
    }

    /// Upper bound on requested derivative dimensions.
    pub fn with_max_side(mut self, max_side: u32) -> Self {
        self.max_side = max_side;
        self
    }

    pub fn with_resizer(mut self, resizer: Arc<dyn Resizer>) -> Self {
        self.resizer = resizer;
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    pub fn item_dir(&self, item: ItemId) -> PathBuf {
        self.base.join(item.to_string())
    }

    /// Number of derivatives this cache has generated.
    pub fn generated(&self) -> u64 {
        self.generated.load(Ordering::Relaxed)
    }

    /// Persist originals and warm the small width-only and small cropped
    /// derivatives for each. Returns the stored file names.
    pub async fn store(&self, item: ItemId, files: Vec<ImageUpload>) -> Result<Vec<String>> {
        // Reject the whole batch before touching disk.
        let named = files
            .into_iter()
            .map(|f| OriginalName::parse(&f.filename).map(|name| (name, f.bytes)))
            .collect::<Result<Vec<_>>>()?;

        let dir = self.item_dir(item);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CoreError::io(&dir, e))?;

        let warm = [
            Size::Width(self.small_width),
            Size::Crop {
                width: self.small_width,
                height: self.small_height,
            },
        ];
        let mut stored = Vec::with_capacity(named.len());
        for (name, bytes) in named {
            // A replaced original invalidates whatever was derived from it.
            self.remove_derivatives(&dir, &name).await?;
            let path = dir.join(name.file_name());
            self.write_atomic(&path, bytes).await?;
            for size in warm {
                self.generate(&path, &dir.join(name.derivative(size)), size)
                    .await?;
            }
            info!(%item, file = %name, "image stored");
            stored.push(name.file_name());
        }
        Ok(stored)
    }

    /// File names of the item's originals, derivatives filtered out.
    pub async fn list_originals(&self, item: ItemId) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .entries(&self.item_dir(item))
            .await?
            .into_iter()
            .filter(|name| DerivativeName::parse(name).is_none())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Path to the original (no width) or to the requested derivative,
    /// generating it on first request. `None` when the original is missing.
    /// Dimensions above the configured maximum are rejected.
    pub async fn resolve(
        &self,
        item: ItemId,
        filename: &str,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<Option<PathBuf>> {
        let name = OriginalName::parse(filename)?;
        if let Some(side) = [width, height].into_iter().flatten().find(|s| *s > self.max_side) {
            return Err(CoreError::Validation(format!(
                "requested size {side} exceeds the {} pixel limit",
                self.max_side
            )));
        }
        let dir = self.item_dir(item);
        let original = dir.join(name.file_name());
        if !exists(&original).await? {
            debug!(%item, file = %name, "original missing");
            return Ok(None);
        }
        let Some(size) = Size::from_request(width, height) else {
            return Ok(Some(original));
        };
        let target = dir.join(name.derivative(size));
        if exists(&target).await? {
            debug!(%item, file = %name, %size, "derivative cache hit");
            return Ok(Some(target));
        }
        if self.generate(&original, &target, size).await? {
            Ok(Some(target))
        } else {
            Ok(None)
        }
    }

    /// Remove an original and every derivative generated from it.
    /// Returns the number of files removed.
    pub async fn delete_one(&self, item: ItemId, filename: &str) -> Result<usize> {
        let name = OriginalName::parse(filename)?;
        let dir = self.item_dir(item);
        let mut removed = 0;
        if remove_file(&dir.join(name.file_name())).await? {
            removed += 1;
        }
        removed += self.remove_derivatives(&dir, &name).await?;
        info!(%item, file = %name, removed, "image deleted");
        Ok(removed)
    }

    /// Remove the item's whole image directory.
    pub async fn delete_all(&self, item: ItemId) -> Result<()> {
        let dir = self.item_dir(item);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(%item, "image directory removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::io(dir, e)),
        }
    }

    async fn remove_derivatives(&self, dir: &Path, original: &OriginalName) -> Result<usize> {
        let mut removed = 0;
        for entry in self.entries(dir).await? {
            let ours = DerivativeName::parse(&entry)
                .map(|d| &d.original == original)
                .unwrap_or(false);
            if ours && remove_file(&dir.join(&entry)).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Visible regular files directly inside `dir`; empty if it does not exist.
    async fn entries(&self, dir: &Path) -> Result<Vec<String>> {
        if !exists(dir).await? {
            return Ok(Vec::new());
        }
        let dir = dir.to_path_buf();
        task::spawn_blocking(move || {
            let mut names = Vec::new();
            for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
                let entry = entry.map_err(|e| CoreError::io(&dir, e.into()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                match entry.file_name().to_str() {
                    Some(name) if !name.starts_with('.') => names.push(name.to_string()),
                    _ => {}
                }
            }
            Ok::<_, CoreError>(names)
        })
        .await?
    }

    /// Build one derivative. Returns `false` if the original vanished.
    async fn generate(&self, original: &Path, target: &Path, size: Size) -> Result<bool> {
        let temp = self.temp_path(target);
        let resizer = Arc::clone(&self.resizer);
        let (original, target) = (original.to_path_buf(), target.to_path_buf());
        let made = task::spawn_blocking(move || {
            render(resizer.as_ref(), &original, &target, &temp, size)
        })
        .await??;
        if made {
            self.generated.fetch_add(1, Ordering::Relaxed);
        }
        Ok(made)
    }

    async fn write_atomic(&self, path: &Path, bytes: Vec<u8>) -> Result<()> {
        let temp = self.temp_path(path);
        fs::write(&temp, bytes)
            .await
            .map_err(|e| CoreError::io(&temp, e))?;
        if let Err(e) = fs::rename(&temp, path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(CoreError::io(path, e));
        }
        Ok(())
    }

    /// Hidden sibling of `target`, unique per process and call.
    fn temp_path(&self, target: &Path) -> PathBuf {
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        target.with_file_name(format!(".{}.{}-{}.tmp", name, std::process::id(), seq))
    }
}

fn render(
    resizer: &dyn Resizer,
    original: &Path,
    target: &Path,
    temp: &Path,
    size: Size,
) -> Result<bool> {
    let reader = match image::io::Reader::open(original) {
        Ok(reader) => reader,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(CoreError::io(original, e)),
    };
    let reader = reader
        .with_guessed_format()
        .map_err(|e| CoreError::io(original, e))?;
    let detected = reader.format();
    let decoded = reader.decode()?;

    let format = ImageFormat::from_path(target)
        .ok()
        .or(detected)
        .unwrap_or(ImageFormat::Png);
    let mut out = resizer.apply(&decoded, size);
    if format == ImageFormat::Jpeg {
        out = image::DynamicImage::ImageRgb8(out.to_rgb8());
    }

    if let Err(e) = out.save_with_format(temp, format) {
        let _ = std::fs::remove_file(temp);
        return Err(e.into());
    }
    if let Err(e) = std::fs::rename(temp, target) {
        let _ = std::fs::remove_file(temp);
        return Err(CoreError::io(target, e));
    }
    debug!(original = %original.display(), %size, "derivative generated");
    Ok(true)
}

async fn exists(path: &Path) -> Result<bool> {
    fs::try_exists(path)
        .await
        .map_err(|e| CoreError::io(path, e))
}

async fn remove_file(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CoreError::io(path, e)),
    }
}
