//! Upload storage with time-based retention.
//!
//! `MemoryImageStore` is the fast path, `DiskImageStore` keeps a copy in the
//! upload folder so uploads survive a restart, and `CachedImageStore` puts
//! the former in front of the latter.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use image::ImageFormat;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("upload storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

// ── Formats and ids ───────────────────────────────────────────────────────────

/// Container formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Png,
    Jpeg,
    WebP,
}

impl UploadFormat {
    pub const ALL: [UploadFormat; 3] = [UploadFormat::Png, UploadFormat::Jpeg, UploadFormat::WebP];

    /// From a filename extension, case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(UploadFormat::Png),
            "jpg" | "jpeg" => Some(UploadFormat::Jpeg),
            "webp" => Some(UploadFormat::WebP),
            _ => None,
        }
    }

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(UploadFormat::Png),
            ImageFormat::Jpeg => Some(UploadFormat::Jpeg),
            ImageFormat::WebP => Some(UploadFormat::WebP),
            _ => None,
        }
    }

    /// Extension used for the on-disk copy.
    pub fn extension(self) -> &'static str {
        match self {
            UploadFormat::Png => "png",
            UploadFormat::Jpeg => "jpg",
            UploadFormat::WebP => "webp",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            UploadFormat::Png => "image/png",
            UploadFormat::Jpeg => "image/jpeg",
            UploadFormat::WebP => "image/webp",
        }
    }
}

/// Fresh upload id: a v4 UUID in 32-char lowercase hex.
pub fn new_image_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Ids double as file stems, so only the generated shape is accepted.
pub fn is_valid_id(id: &str) -> bool {
    id.len() == 32 && id.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// One stored upload.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub id: String,
    pub format: UploadFormat,
    pub bytes: Arc<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

impl StoredImage {
    pub fn new(format: UploadFormat, bytes: Vec<u8>) -> Self {
        Self {
            id: new_image_id(),
            format,
            bytes: Arc::new(bytes),
            created_at: Utc::now(),
        }
    }

    pub fn expires_at(&self, ttl: Duration) -> DateTime<Utc> {
        self.created_at + ttl
    }

    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at(ttl) <= now
    }
}

// ── Store trait ───────────────────────────────────────────────────────────────

pub trait ImageStore: Send + Sync {
    fn insert(&self, image: StoredImage) -> Result<()>;

    /// `None` for unknown or already-expired ids.
    fn get(&self, id: &str) -> Result<Option<StoredImage>>;

    /// True when something was removed.
    fn remove(&self, id: &str) -> Result<bool>;

    /// Drop everything older than the retention window; returns the count.
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

// ── Memory ────────────────────────────────────────────────────────────────────

pub struct MemoryImageStore {
    entries: RwLock<HashMap<String, StoredImage>>,
    ttl: Duration,
}

impl MemoryImageStore {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: RwLock::new(HashMap::new()), ttl }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ImageStore for MemoryImageStore {
    fn insert(&self, image: StoredImage) -> Result<()> {
        self.entries.write().insert(image.id.clone(), image);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<StoredImage>> {
        let entries = self.entries.read();
        Ok(entries
            .get(id)
            .filter(|img| !img.is_expired(self.ttl, Utc::now()))
            .cloned())
    }

    fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.entries.write().remove(id).is_some())
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, img| !img.is_expired(self.ttl, now));
        Ok(before - entries.len())
    }
}

// ── Disk ──────────────────────────────────────────────────────────────────────

/// Files named `<id>.<ext>` in one folder; age comes from the file mtime.
pub struct DiskImageStore {
    dir: PathBuf,
    ttl: Duration,
}

impl DiskImageStore {
    /// Create the folder if needed.
    pub fn open(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, ttl })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str, format: UploadFormat) -> PathBuf {
        self.dir.join(format!("{id}.{}", format.extension()))
    }

    fn modified(path: &Path) -> Result<DateTime<Utc>> {
        Ok(DateTime::<Utc>::from(fs::metadata(path)?.modified()?))
    }
}

impl ImageStore for DiskImageStore {
    fn insert(&self, image: StoredImage) -> Result<()> {
        fs::write(self.path_for(&image.id, image.format), image.bytes.as_slice())?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<StoredImage>> {
        if !is_valid_id(id) {
            return Ok(None);
        }
        for format in UploadFormat::ALL {
            let path = self.path_for(id, format);
            let bytes = match fs::read(&path) {
                Ok(b) => b,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let image = StoredImage {
                id: id.to_string(),
                format,
                bytes: Arc::new(bytes),
                created_at: Self::modified(&path)?,
            };
            if image.is_expired(self.ttl, Utc::now()) {
                return Ok(None);
            }
            return Ok(Some(image));
        }
        Ok(None)
    }

    fn remove(&self, id: &str) -> Result<bool> {
        if !is_valid_id(id) {
            return Ok(false);
        }
        let mut removed = false;
        for format in UploadFormat::ALL {
            match fs::remove_file(self.path_for(id, format)) {
                Ok(()) => removed = true,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut purged = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let known = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(UploadFormat::from_extension)
                .is_some();
            if !known || !path.is_file() {
                continue;
            }
            if Self::modified(&path)? + self.ttl <= now {
                match fs::remove_file(&path) {
                    Ok(()) => purged += 1,
                    Err(e) => warn!(path = %path.display(), error = %e, "could not purge upload"),
                }
            }
        }
        Ok(purged)
    }
}

// ── Cached ────────────────────────────────────────────────────────────────────

/// Memory cache in front of the disk backup.
///
/// Disk fallbacks and removals hold `refill` so a removal cannot land
/// between a fallback's disk read and its cache insert.
pub struct CachedImageStore {
    cache: MemoryImageStore,
    backing: DiskImageStore,
    refill: Mutex<()>,
}

impl CachedImageStore {
    pub fn new(backing: DiskImageStore) -> Self {
        Self {
            cache: MemoryImageStore::new(backing.ttl),
            backing,
            refill: Mutex::new(()),
        }
    }
}

impl ImageStore for CachedImageStore {
    fn insert(&self, image: StoredImage) -> Result<()> {
        self.backing.insert(image.clone())?;
        self.cache.insert(image)
    }

    fn get(&self, id: &str) -> Result<Option<StoredImage>> {
        if let Some(img) = self.cache.get(id)? {
            return Ok(Some(img));
        }
        let _guard = self.refill.lock();
        if let Some(img) = self.cache.get(id)? {
            return Ok(Some(img));
        }
        let found = self.backing.get(id)?;
        if let Some(img) = &found {
            debug!(image_id = id, "upload restored from disk");
            self.cache.insert(img.clone())?;
        }
        Ok(found)
    }

    fn remove(&self, id: &str) -> Result<bool> {
        let _guard = self.refill.lock();
        let on_disk = self.backing.remove(id)?;
        let in_cache = self.cache.remove(id)?;
        Ok(in_cache || on_disk)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let cached = self.cache.purge_expired(now)?;
        let disk = self.backing.purge_expired(now)?;
        Ok(cached.max(disk))
    }
}
