//! `image`-crate adapters: grayscale views and an image-file frame source.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ar_markers_core::{GrayImage, GrayImageView, ImageError};

use crate::pipeline::{Frame, FrameSource};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

#[derive(thiserror::Error, Debug)]
pub enum FrameLoadError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: ::image::ImageError,
    },
    #[error("timestamp of frame {index} overflows")]
    TimestampOverflow { index: usize },
    #[error("unusable frame {path}")]
    Buffer {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
}

/// Borrow an `image::GrayImage` as a core view.
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Move an `image::GrayImage` into the core owned type.
pub fn into_gray_image(img: ::image::GrayImage) -> Result<GrayImage, ImageError> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    GrayImage::from_raw(w, h, img.into_raw())
}

/// Plays a list of image files as frames at a fixed interval.
///
/// Frame `i` is stamped `i * frame_interval`. Colour images are converted to
/// 8-bit luma.
#[derive(Clone, Debug)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    frame_interval: Duration,
    next: usize,
}

impl ImageSequenceSource {
    pub fn new(paths: Vec<PathBuf>, frame_interval: Duration) -> Self {
        Self {
            paths,
            frame_interval,
            next: 0,
        }
    }

    /// All image files directly inside `dir`, in file-name order.
    pub fn from_dir(
        dir: impl AsRef<Path>,
        frame_interval: Duration,
    ) -> Result<Self, FrameLoadError> {
        let dir = dir.as_ref();
        let io_err = |source| FrameLoadError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_ascii_lowercase)
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()));
            if path.is_file() && is_image {
                paths.push(path);
            }
        }
        paths.sort();
        log::info!("found {} frame(s) in {}", paths.len(), dir.display());
        Ok(Self::new(paths, frame_interval))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Frames not yet produced.
    pub fn remaining(&self) -> usize {
        self.paths.len().saturating_sub(self.next)
    }
}

impl FrameSource for ImageSequenceSource {
    type Error = FrameLoadError;

    fn next_frame(&mut self) -> Result<Option<Frame>, FrameLoadError> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        let timestamp = u32::try_from(self.next)
            .ok()
            .and_then(|i| self.frame_interval.checked_mul(i))
            .ok_or(FrameLoadError::TimestampOverflow { index: self.next })?;
        let decoded = ::image::open(path).map_err(|source| FrameLoadError::Decode {
            path: path.clone(),
            source,
        })?;
        let image = into_gray_image(decoded.to_luma8()).map_err(|source| {
            FrameLoadError::Buffer {
                path: path.clone(),
                source,
            }
        })?;
        log::debug!(
            "frame {} from {} ({}x{})",
            self.next,
            path.display(),
            image.width,
            image.height
        );
        self.next += 1;
        Ok(Some(Frame { image, timestamp }))
    }
}
