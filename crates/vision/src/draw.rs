//! Minimal raster primitives for overlays and evidence stills.

use crate::{BoundingBox, Frame};

pub type Rgb = [u8; 3];

pub const RED: Rgb = [255, 0, 0];
pub const GREEN: Rgb = [0, 255, 0];
pub const YELLOW: Rgb = [255, 255, 0];
pub const WHITE: Rgb = [255, 255, 255];

/// Solid rectangle clipped to the frame.
pub fn fill_rect(frame: &mut Frame, x: u32, y: u32, width: u32, height: u32, color: Rgb) {
    let x_end = x.saturating_add(width).min(frame.width());
    let y_end = y.saturating_add(height).min(frame.height());
    for py in y..y_end {
        for px in x..x_end {
            frame.put_pixel(px, py, color);
        }
    }
}

/// Rectangle outline of `thickness` pixels, clipped to the frame.
pub fn draw_rect(frame: &mut Frame, bbox: &BoundingBox, color: Rgb, thickness: u32) {
    let x1 = bbox.x1.max(0.0) as u32;
    let y1 = bbox.y1.max(0.0) as u32;
    let x2 = bbox.x2.max(0.0) as u32;
    let y2 = bbox.y2.max(0.0) as u32;
    if x2 <= x1 || y2 <= y1 {
        return;
    }
    let w = x2 - x1;
    let h = y2 - y1;
    let t = thickness.max(1);

    fill_rect(frame, x1, y1, w, t, color);
    fill_rect(frame, x1, y2.saturating_sub(t), w, t, color);
    fill_rect(frame, x1, y1, t, h, color);
    fill_rect(frame, x2.saturating_sub(t), y1, t, h, color);
}
