use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::Result;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use posecoach_contracts::errors::SessionError;

pub const MAX_FRAME_EDGE: u32 = 1024;
const JPEG_QUALITY: u8 = 90;

/// Source of single still frames, e.g. the front camera.
pub trait CaptureDevice {
    /// Returns one encoded frame. Failures are device errors.
    fn capture_frame(&mut self) -> Result<Vec<u8>>;
}

/// Treats an image file as the camera. The file is re-read on every capture
/// so a changing file behaves like a live preview.
#[derive(Debug, Clone)]
pub struct StillCapture {
    path: PathBuf,
}

impl StillCapture {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        load(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CaptureDevice for StillCapture {
    fn capture_frame(&mut self) -> Result<Vec<u8>> {
        let image = load(&self.path)?;
        encode_frame(image)
    }
}

fn load(path: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(path).map_err(|err| {
        SessionError::device(format!("camera source {} unavailable: {err}", path.display()))
    })?;
    let image = image::load_from_memory(&bytes).map_err(|err| {
        SessionError::device(format!("camera source {} unreadable: {err}", path.display()))
    })?;
    Ok(image)
}

/// Mirrors like a selfie preview, bounds the longest edge and JPEG-encodes.
pub fn encode_frame(image: DynamicImage) -> Result<Vec<u8>> {
    let mut image = image.fliph();
    if image.width() > MAX_FRAME_EDGE || image.height() > MAX_FRAME_EDGE {
        image = image.resize(MAX_FRAME_EDGE, MAX_FRAME_EDGE, FilterType::Triangle);
    }
    let rgb = image.to_rgb8();
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|err| SessionError::device(format!("frame encode failed: {err}")))?;
    Ok(out.into_inner())
}
