//! File-system image ingestion.
//!
//! Loads a single image file or a directory of images into an [`Item`],
//! normalizing every photo to RGB JPEG: alpha is flattened onto white,
//! oversized images are downscaled, and re-encoding drops any embedded
//! metadata (EXIF included) as a side effect.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use snapattr_core::{ImageSource, IoConfig, Item};

const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("source path does not exist: {0}")]
    NotFound(PathBuf),

    #[error("unsupported image format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("no valid images found in directory: {0}")]
    NoImages(PathBuf),

    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("failed to encode image {path}: {source}")]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Loads product photos from the local file system.
pub struct FsIngestor {
    supported_formats: Vec<String>,
    max_images_per_item: usize,
    max_resolution: u32,
    strip_exif: bool,
}

impl FsIngestor {
    pub fn new(io: &IoConfig, strip_exif: bool) -> Self {
        Self {
            supported_formats: io
                .supported_formats
                .iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
            max_images_per_item: io.max_images_per_item,
            max_resolution: io.max_resolution,
            strip_exif,
        }
    }

    /// Load an item from a single image file or a directory of images.
    pub fn load(&self, source: &Path) -> Result<Item, IngestError> {
        if !source.exists() {
            return Err(IngestError::NotFound(source.to_path_buf()));
        }
        if source.is_file() {
            self.load_file(source)
        } else {
            self.load_directory(source)
        }
    }

    fn load_file(&self, path: &Path) -> Result<Item, IngestError> {
        if !self.has_supported_extension(path) {
            return Err(IngestError::UnsupportedFormat(path.to_path_buf()));
        }
        let bytes = self.process_image(path)?;
        let file_size = std::fs::metadata(path)?.len();

        let mut meta = BTreeMap::new();
        meta.insert(
            "source_path".to_string(),
            serde_json::Value::from(path.display().to_string()),
        );
        meta.insert("file_size".to_string(), serde_json::Value::from(file_size));
        meta.insert("image_count".to_string(), serde_json::Value::from(1));

        Ok(Item {
            item_id: item_id_for(path),
            images: vec![ImageSource::Bytes(bytes)],
            meta,
        })
    }

    fn load_directory(&self, dir: &Path) -> Result<Item, IngestError> {
        let files = self.find_image_files(dir)?;
        if files.is_empty() {
            return Err(IngestError::NoImages(dir.to_path_buf()));
        }
        let total_found = files.len();
        let selected = &files[..files.len().min(self.max_images_per_item)];

        let mut images = Vec::with_capacity(selected.len());
        for path in selected {
            images.push(ImageSource::Bytes(self.process_image(path)?));
        }
        debug!(dir = %dir.display(), loaded = images.len(), total_found, "loaded item images");

        let mut meta = BTreeMap::new();
        meta.insert(
            "source_path".to_string(),
            serde_json::Value::from(dir.display().to_string()),
        );
        meta.insert(
            "image_count".to_string(),
            serde_json::Value::from(images.len()),
        );
        meta.insert(
            "total_files_found".to_string(),
            serde_json::Value::from(total_found),
        );

        Ok(Item {
            item_id: item_id_for(dir),
            images,
            meta,
        })
    }

    /// Supported files in a directory, sorted for deterministic order.
    fn find_image_files(&self, dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.has_supported_extension(path))
            .collect();
        files.sort();
        Ok(files)
    }

    fn has_supported_extension(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let dotted = format!(".{}", ext.to_ascii_lowercase());
        self.supported_formats.contains(&dotted)
    }

    /// Decode, flatten alpha onto white, downscale, and re-encode as
    /// JPEG. Re-encoding from decoded pixels never carries metadata, so
    /// `strip_exif` holds for every re-encoded image; an in-budget JPEG
    /// is passed through unmodified only when stripping is disabled.
    fn process_image(&self, path: &Path) -> Result<Vec<u8>, IngestError> {
        let decoded = image::open(path).map_err(|source| IngestError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        let needs_resize = decoded.width().max(decoded.height()) > self.max_resolution;
        let is_jpeg = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg"));
        if !self.strip_exif && !needs_resize && is_jpeg {
            return Ok(std::fs::read(path)?);
        }

        let rgb = flatten_onto_white(&decoded);
        let mut processed = DynamicImage::ImageRgb8(rgb);
        if needs_resize {
            processed = processed.resize(
                self.max_resolution,
                self.max_resolution,
                FilterType::Lanczos3,
            );
        }

        let mut bytes = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
        encoder
            .encode_image(&processed)
            .map_err(|source| IngestError::Encode {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(bytes)
    }
}

/// Composite translucent pixels onto a white background.
fn flatten_onto_white(decoded: &DynamicImage) -> image::RgbImage {
    let rgba = decoded.to_rgba8();
    let mut flattened = RgbaImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend = |channel: u8| -> u8 {
            (((u16::from(channel) * alpha) + (255 * (255 - alpha))) / 255) as u8
        };
        flattened.put_pixel(
            x,
            y,
            Rgba([blend(pixel[0]), blend(pixel[1]), blend(pixel[2]), 255]),
        );
    }
    DynamicImage::ImageRgba8(flattened).to_rgb8()
}

/// Deterministic item ID from the source path digest.
fn item_id_for(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let digest = Sha256::digest(absolute.display().to_string().as_bytes());
    format!("item_{}", &hex::encode(digest)[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapattr_core::IoConfig;
    use tempfile::TempDir;

    fn ingestor() -> FsIngestor {
        FsIngestor::new(&IoConfig::default(), true)
    }

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([120, 80, 40]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn single_file_loads_as_one_image_item() {
        let dir = TempDir::new().unwrap();
        let path = write_png(dir.path(), "shoe.png", 64, 48);

        let item = ingestor().load(&path).unwrap();
        assert_eq!(item.images.len(), 1);
        assert!(item.item_id.starts_with("item_"));
        assert_eq!(item.item_id.len(), "item_".len() + 8);
        assert_eq!(item.meta["image_count"], serde_json::Value::from(1));
    }

    #[test]
    fn processed_bytes_are_jpeg() {
        let dir = TempDir::new().unwrap();
        let path = write_png(dir.path(), "shoe.png", 64, 48);

        let item = ingestor().load(&path).unwrap();
        let ImageSource::Bytes(bytes) = &item.images[0] else {
            panic!("expected processed bytes");
        };
        // JPEG SOI marker.
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn oversized_images_are_downscaled() {
        let dir = TempDir::new().unwrap();
        let path = write_png(dir.path(), "big.png", 2000, 1000);

        let item = ingestor().load(&path).unwrap();
        let ImageSource::Bytes(bytes) = &item.images[0] else {
            panic!("expected processed bytes");
        };
        let reloaded = image::load_from_memory(bytes).unwrap();
        assert!(reloaded.width().max(reloaded.height()) <= 768);
        // Aspect ratio survives the downscale.
        assert_eq!(reloaded.width(), 768);
        assert_eq!(reloaded.height(), 384);
    }

    #[test]
    fn directory_load_caps_images_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["c.png", "a.png", "b.png", "d.png"] {
            write_png(dir.path(), name, 32, 32);
        }

        let item = ingestor().load(dir.path()).unwrap();
        assert_eq!(item.images.len(), 3);
        assert_eq!(item.meta["total_files_found"], serde_json::Value::from(4));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "not an image").unwrap();

        let err = ingestor().load(&path).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat(_)));
    }

    #[test]
    fn directory_without_images_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("readme.md"), "x").unwrap();

        let err = ingestor().load(dir.path()).unwrap_err();
        assert!(matches!(err, IngestError::NoImages(_)));
    }

    #[test]
    fn missing_path_fails() {
        let err = ingestor().load(Path::new("/no/such/path")).unwrap_err();
        assert!(matches!(err, IngestError::NotFound(_)));
    }

    #[test]
    fn item_ids_are_deterministic_per_path() {
        let dir = TempDir::new().unwrap();
        let path = write_png(dir.path(), "shoe.png", 16, 16);

        let first = ingestor().load(&path).unwrap();
        let second = ingestor().load(&path).unwrap();
        assert_eq!(first.item_id, second.item_id);
    }
}
