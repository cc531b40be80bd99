//! Annotated screenshot rendering

use anyhow::{anyhow, Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::Path;

use crate::analysis::Annotation;
use crate::storage::ensure_dir;

/// Draws annotation boxes onto a copy of a screenshot.
///
/// Matched fragments get a box; a screenshot with any unmatched entry gets
/// a frame around its border.
pub trait Annotator: Send + Sync {
    fn annotate(&self, input: &Path, output: &Path, annotations: &[Annotation]) -> Result<()>;
}

/// Box renderer backed by `image` / `imageproc`
#[derive(Debug, Clone)]
pub struct ImageAnnotator {
    matched_color: Rgba<u8>,
    unmatched_color: Rgba<u8>,
    stroke_width: u32,
}

impl Default for ImageAnnotator {
    fn default() -> Self {
        Self {
            matched_color: Rgba([0, 200, 0, 255]),
            unmatched_color: Rgba([255, 0, 0, 255]),
            stroke_width: 2,
        }
    }
}

impl ImageAnnotator {
    /// Build from `#RRGGBB` / `#RRGGBBAA` colours
    pub fn new(matched_color: &str, unmatched_color: &str, stroke_width: u32) -> Result<Self> {
        Ok(Self {
            matched_color: parse_color(matched_color)?,
            unmatched_color: parse_color(unmatched_color)?,
            stroke_width: stroke_width.max(1),
        })
    }
}

impl Annotator for ImageAnnotator {
    fn annotate(&self, input: &Path, output: &Path, annotations: &[Annotation]) -> Result<()> {
        let mut canvas = image::open(input)
            .with_context(|| format!("Failed to load screenshot {:?}", input))?
            .to_rgba8();
        let (img_w, img_h) = canvas.dimensions();

        for annotation in annotations {
            let Some((x, y, w, h)) = annotation.bounds else {
                continue;
            };
            let color = if annotation.matched {
                self.matched_color
            } else {
                self.unmatched_color
            };

            // Grow outwards one pixel per stroke step, clipped to the image
            for step in 0..self.stroke_width {
                let left = x.saturating_sub(step);
                let top = y.saturating_sub(step);
                let right = x.saturating_add(w).saturating_add(step).min(img_w);
                let bottom = y.saturating_add(h).saturating_add(step).min(img_h);
                draw_box(&mut canvas, (left, top, right, bottom), color);
            }
        }

        // NG entries have no box of their own
        if annotations.iter().any(|a| !a.matched) {
            for step in 0..self.stroke_width {
                let right = img_w.saturating_sub(step);
                let bottom = img_h.saturating_sub(step);
                draw_box(&mut canvas, (step, step, right, bottom), self.unmatched_color);
            }
        }

        if let Some(parent) = output.parent() {
            ensure_dir(parent)?;
        }
        canvas
            .save(output)
            .with_context(|| format!("Failed to save annotated image {:?}", output))?;

        Ok(())
    }
}

/// Hollow rectangle between two corners; empty boxes are skipped
fn draw_box(canvas: &mut RgbaImage, (left, top, right, bottom): (u32, u32, u32, u32), color: Rgba<u8>) {
    if right <= left || bottom <= top {
        return;
    }
    let (Ok(x), Ok(y)) = (i32::try_from(left), i32::try_from(top)) else {
        return;
    };
    let rect = Rect::at(x, y).of_size(right - left, bottom - top);
    draw_hollow_rect_mut(canvas, rect, color);
}

/// Parse `#RRGGBB` (opaque) or `#RRGGBBAA`
pub fn parse_color(color: &str) -> Result<Rgba<u8>> {
    let hex = color
        .trim()
        .strip_prefix('#')
        .ok_or_else(|| anyhow!("Unsupported color format: {color}"))?;

    let byte = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .ok_or_else(|| anyhow!("Invalid hex color: {color}"))
    };

    match hex.len() {
        6 => Ok(Rgba([byte(0..2)?, byte(2..4)?, byte(4..6)?, 255])),
        8 => Ok(Rgba([byte(0..2)?, byte(2..4)?, byte(4..6)?, byte(6..8)?])),
        _ => Err(anyhow!("Unsupported color format: {color}")),
    }
}
