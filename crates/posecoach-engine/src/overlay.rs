//! Ghost overlay: the reference pose laid semi-transparently over the live
//! frame, with the landmark skeleton drawn on top.

use std::io::Cursor;

use anyhow::{bail, Context, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use posecoach_contracts::pose::PoseLandmarks;

pub const DEFAULT_GHOST_OPACITY: f32 = 0.4;

pub const SKELETON_COLOR: Rgba<u8> = Rgba([64, 224, 208, 255]);
pub const JOINT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Renders the overlay as PNG bytes.
///
/// The output takes the frame's dimensions; the reference is stretched to
/// fit. Without a frame the reference is blended over black.
pub fn render_ghost(
    frame: Option<&[u8]>,
    reference: Option<&[u8]>,
    landmarks: Option<&PoseLandmarks>,
    opacity: f32,
) -> Result<Vec<u8>> {
    let opacity = if opacity.is_finite() {
        opacity.clamp(0.0, 1.0)
    } else {
        DEFAULT_GHOST_OPACITY
    };
    let reference = reference
        .map(|bytes| decode_rgba(bytes, "reference image"))
        .transpose()?;
    let mut canvas = match (frame, reference.as_ref()) {
        (Some(bytes), _) => decode_rgba(bytes, "frame")?,
        (None, Some(reference)) => {
            RgbaImage::from_pixel(reference.width(), reference.height(), Rgba([0, 0, 0, 255]))
        }
        (None, None) => bail!("ghost overlay needs a frame or a reference image"),
    };

    if let Some(reference) = reference {
        let (width, height) = canvas.dimensions();
        let fitted = if reference.dimensions() == (width, height) {
            reference
        } else {
            imageops::resize(&reference, width, height, FilterType::Triangle)
        };
        blend_over(&mut canvas, &fitted, opacity);
    }

    if let Some(landmarks) = landmarks {
        let thickness = (canvas.width().min(canvas.height()) / 160).max(1);
        draw_skeleton(&mut canvas, landmarks, SKELETON_COLOR, thickness);
    }

    encode_png(&canvas)
}

pub(crate) fn decode_rgba(bytes: &[u8], what: &str) -> Result<RgbaImage> {
    let decoded = image::load_from_memory(bytes).with_context(|| format!("failed to decode {what}"))?;
    Ok(decoded.to_rgba8())
}

pub(crate) fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut out, ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(out.into_inner())
}

fn blend_over(base: &mut RgbaImage, top: &RgbaImage, opacity: f32) {
    for (dst, src) in base.pixels_mut().zip(top.pixels()) {
        let alpha = opacity * f32::from(src[3]) / 255.0;
        for channel in 0..3 {
            let mixed = f32::from(dst[channel]) * (1.0 - alpha) + f32::from(src[channel]) * alpha;
            dst[channel] = mixed.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Draws bones between present landmark pairs, then a dot per joint.
pub(crate) fn draw_skeleton(
    img: &mut RgbaImage,
    landmarks: &PoseLandmarks,
    color: Rgba<u8>,
    thickness: u32,
) {
    let (width, height) = img.dimensions();
    let radius = thickness as i64;
    for (from, to) in landmarks.segments() {
        draw_line(img, from.to_pixels(width, height), to.to_pixels(width, height), color, radius);
    }
    for (_, point) in landmarks.iter() {
        let (x, y) = point.to_pixels(width, height);
        draw_disc(img, x.round() as i64, y.round() as i64, radius + 2, JOINT_COLOR);
    }
}

fn draw_line(img: &mut RgbaImage, from: (f32, f32), to: (f32, f32), color: Rgba<u8>, radius: i64) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
    for step in 0..=steps {
        let t = step as f32 / steps as f32;
        let x = (from.0 + dx * t).round() as i64;
        let y = (from.1 + dy * t).round() as i64;
        draw_disc(img, x, y, radius, color);
    }
}

fn draw_disc(img: &mut RgbaImage, cx: i64, cy: i64, radius: i64, color: Rgba<u8>) {
    let (width, height) = (i64::from(img.width()), i64::from(img.height()));
    for y in (cy - radius)..=(cy + radius) {
        for x in (cx - radius)..=(cx + radius) {
            if x < 0 || y < 0 || x >= width || y >= height {
                continue;
            }
            if (x - cx).pow(2) + (y - cy).pow(2) > radius * radius {
                continue;
            }
            img.put_pixel(x as u32, y as u32, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};
    use posecoach_contracts::pose::{BodyPart, PoseLandmarks};

    use super::{decode_rgba, encode_png, render_ghost, JOINT_COLOR, SKELETON_COLOR};

    fn solid(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        encode_png(&RgbaImage::from_pixel(width, height, Rgba(color))).unwrap()
    }

    #[test]
    fn reference_is_blended_at_opacity_and_fitted_to_frame() -> anyhow::Result<()> {
        let frame = solid(40, 30, [200, 0, 0, 255]);
        let reference = solid(40, 30, [0, 0, 200, 255]);
        let out = decode_rgba(&render_ghost(Some(&frame), Some(&reference), None, 0.5)?, "overlay")?;
        assert_eq!(out.get_pixel(20, 15), &Rgba([100, 0, 100, 255]));

        let small = solid(10, 10, [0, 0, 200, 255]);
        let fitted = decode_rgba(&render_ghost(Some(&frame), Some(&small), None, 0.5)?, "overlay")?;
        assert_eq!(fitted.dimensions(), (40, 30));
        Ok(())
    }

    #[test]
    fn zero_opacity_keeps_frame() -> anyhow::Result<()> {
        let frame = solid(8, 8, [10, 20, 30, 255]);
        let reference = solid(8, 8, [250, 250, 250, 255]);
        let out = decode_rgba(&render_ghost(Some(&frame), Some(&reference), None, 0.0)?, "overlay")?;
        assert_eq!(out.get_pixel(3, 3), &Rgba([10, 20, 30, 255]));
        Ok(())
    }

    #[test]
    fn skeleton_is_drawn_between_present_joints() -> anyhow::Result<()> {
        let frame = solid(101, 101, [0, 0, 0, 255]);
        let landmarks = PoseLandmarks::new()
            .with_point(BodyPart::LeftShoulder, 20.0, 50.0)
            .with_point(BodyPart::RightShoulder, 80.0, 50.0)
            .with_point(BodyPart::Nose, 50.0, 10.0);
        let out = decode_rgba(
            &render_ghost(Some(&frame), None, Some(&landmarks), 0.4)?,
            "overlay",
        )?;
        assert_eq!(out.get_pixel(50, 50), &SKELETON_COLOR);
        assert_eq!(out.get_pixel(20, 50), &JOINT_COLOR);
        assert_eq!(out.get_pixel(50, 10), &JOINT_COLOR);
        // nose has no bone
        assert_eq!(out.get_pixel(50, 30), &Rgba([0, 0, 0, 255]));
        Ok(())
    }

    #[test]
    fn reference_alone_is_blended_over_black() -> anyhow::Result<()> {
        let reference = solid(6, 4, [100, 200, 50, 255]);
        let out = decode_rgba(&render_ghost(None, Some(&reference), None, 1.0)?, "overlay")?;
        assert_eq!(out.dimensions(), (6, 4));
        assert_eq!(out.get_pixel(0, 0), &Rgba([100, 200, 50, 255]));
        Ok(())
    }

    #[test]
    fn missing_or_undecodable_inputs_fail() {
        assert!(render_ghost(None, None, None, 0.4).is_err());
        let err = render_ghost(Some(b"not an image"), None, None, 0.4)
            .err()
            .map(|err| err.to_string());
        assert_eq!(err.as_deref(), Some("failed to decode frame"));
    }
}
