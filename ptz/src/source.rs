//! Frame sources

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{info, warn};

/// Pull-style frame acquisition.
pub trait FrameSource {
    /// Next frame, or `None` when none is available right now.
    fn next_frame(&mut self) -> Option<RgbImage>;

    /// True once the source will never produce another frame.
    fn is_exhausted(&self) -> bool {
        false
    }
}

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "ppm"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Image files from a directory, in file name order.
#[derive(Debug, Clone)]
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    next: usize,
    looping: bool,
}

impl ImageSequence {
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            next: 0,
            looping: false,
        }
    }

    pub fn open(dir: &Path) -> std::io::Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| is_image(p))
            .collect();
        paths.sort();
        info!("Found {} frames in {}", paths.len(), dir.display());
        Ok(Self::from_paths(paths))
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Option<RgbImage> {
        if self.next >= self.paths.len() {
            if !self.looping || self.paths.is_empty() {
                return None;
            }
            self.next = 0;
        }
        let path = &self.paths[self.next];
        self.next += 1;
        match image::open(path) {
            Ok(img) => Some(img.to_rgb8()),
            Err(e) => {
                warn!("Skipping unreadable frame {}: {e}", path.display());
                None
            }
        }
    }

    fn is_exhausted(&self) -> bool {
        !self.looping && self.next >= self.paths.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn write_frames(dir: &Path) {
        for (name, shade) in [("b.png", 20u8), ("a.png", 10), ("c.png", 30)] {
            RgbImage::from_pixel(4, 3, Rgb([shade, 0, 0]))
                .save(dir.join(name))
                .unwrap();
        }
        fs::write(dir.join("notes.txt"), "not a frame").unwrap();
        fs::write(dir.join("d.png"), "corrupt").unwrap();
    }

    #[test]
    fn test_sequence_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path());

        let mut seq = ImageSequence::open(dir.path()).unwrap();
        assert_eq!(seq.len(), 4);
        let shades: Vec<u8> = (0..3)
            .map(|_| seq.next_frame().unwrap().get_pixel(0, 0)[0])
            .collect();
        assert_eq!(shades, vec![10, 20, 30]);
        assert!(!seq.is_exhausted());

        // Corrupt file yields no frame, then the sequence ends.
        assert!(seq.next_frame().is_none());
        assert!(seq.is_exhausted());
        assert!(seq.next_frame().is_none());
    }

    #[test]
    fn test_looping_restarts() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path());
        fs::remove_file(dir.path().join("d.png")).unwrap();

        let mut seq = ImageSequence::open(dir.path()).unwrap().looping(true);
        for _ in 0..3 {
            seq.next_frame().unwrap();
        }
        assert!(!seq.is_exhausted());
        assert_eq!(seq.next_frame().unwrap().get_pixel(0, 0)[0], 10);
    }
}
