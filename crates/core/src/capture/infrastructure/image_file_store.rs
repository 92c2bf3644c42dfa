use std::io::ErrorKind;
use std::path::Path;

use crate::capture::domain::face_image_store::FaceImageStore;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Face crops as image files on disk, encoded by the `image` crate.
///
/// The format follows the file extension.
pub struct ImageFileStore;

impl ImageFileStore {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceImageStore for ImageFileStore {
    fn crop_and_save(
        &self,
        frame: &Frame,
        region: &Region,
        path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let crop = frame.crop(region);
        if crop.is_empty() {
            return Err(format!("face region {region:?} lies outside the frame").into());
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let img = image::RgbImage::from_raw(crop.width(), crop.height(), crop.data().to_vec())
            .ok_or("Failed to create image from crop data")?;
        img.save(path)?;
        log::debug!(
            "Saved {}x{} face crop to {}",
            crop.width(),
            crop.height(),
            path.display()
        );
        Ok(())
    }

    fn load_image(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
        let img = image::open(path)?.to_rgb8();
        let (width, height) = img.dimensions();
        Ok(Frame::new(img.into_raw(), width, height, 3, 0))
    }

    fn delete(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_frame(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 128]);
            }
        }
        Frame::new(data, width, height, 3, 0)
    }

    #[test]
    fn test_crop_and_save_writes_region() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face_0.png");
        let store = ImageFileStore::new();

        store
            .crop_and_save(&make_frame(64, 48), &Region::new(10, 5, 20, 16), &path)
            .unwrap();

        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (20, 16));
        assert_eq!(img.get_pixel(0, 0).0, [10, 5, 128]);
    }

    #[test]
    fn test_crop_is_clamped_to_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face_0.png");
        let store = ImageFileStore::new();

        store
            .crop_and_save(&make_frame(32, 32), &Region::new(-10, 20, 30, 30), &path)
            .unwrap();

        let loaded = store.load_image(&path).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (20, 12));
    }

    #[test]
    fn test_crop_outside_frame_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face_0.png");
        let store = ImageFileStore::new();

        let result = store.crop_and_save(&make_frame(32, 32), &Region::new(100, 100, 10, 10), &path);

        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_saves_jpeg_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("face_1.jpg");
        let store = ImageFileStore::new();

        store
            .crop_and_save(&make_frame(40, 40), &Region::new(0, 0, 40, 40), &path)
            .unwrap();

        let loaded = store.load_image(&path).unwrap();
        assert_eq!((loaded.width(), loaded.height(), loaded.channels()), (40, 40, 3));
    }

    #[test]
    fn test_load_missing_is_error() {
        let store = ImageFileStore::new();
        assert!(store.load_image(Path::new("/nonexistent/face_0.jpg")).is_err());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face_0.png");
        std::fs::write(&path, b"x").unwrap();
        let store = ImageFileStore::new();

        store.delete(&path).unwrap();
        store.delete(&path).unwrap();

        assert!(!path.exists());
    }
}
