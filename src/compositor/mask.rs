use crate::config::BubbleShape;
use image::{Rgba, RgbaImage};

/// Corner radius in pixels for the rounded-rectangle shape. Fixed, not
/// user-configurable.
pub const ROUNDED_CORNER_RADIUS: u32 = 32;

/// Clip the square `image` to `shape` by zeroing every pixel whose center
/// falls outside the shape. Pure function of `(shape, side length)`; cheap
/// enough to run every tick.
pub fn apply_shape_mask(image: &mut RgbaImage, shape: BubbleShape) {
    let size = image.width();
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if !covers(shape, x, y, size) {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }
}

/// Whether the pixel at grid position `(x, y)` is inside the shape, testing
/// the pixel center.
pub fn covers(shape: BubbleShape, x: u32, y: u32, size: u32) -> bool {
    let px = x as f32 + 0.5;
    let py = y as f32 + 0.5;
    let side = size as f32;
    match shape {
        BubbleShape::Circle => {
            let radius = side / 2.0;
            let dx = px - radius;
            let dy = py - radius;
            dx * dx + dy * dy <= radius * radius
        }
        BubbleShape::RoundedRect => {
            let radius = (ROUNDED_CORNER_RADIUS as f32).min(side / 2.0);
            // Inside the cross formed by the two inset rectangles, or within
            // radius of the nearest corner circle center.
            let in_x_band = px >= radius && px <= side - radius;
            let in_y_band = py >= radius && py <= side - radius;
            if in_x_band || in_y_band {
                px >= 0.0 && px <= side && py >= 0.0 && py <= side
            } else {
                let cx = if px < radius { radius } else { side - radius };
                let cy = if py < radius { radius } else { side - radius };
                let dx = px - cx;
                let dy = py - cy;
                dx * dx + dy * dy <= radius * radius
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn opaque(size: u32) -> RgbaImage {
        RgbaImage::from_pixel(size, size, Rgba([200, 100, 50, 255]))
    }

    #[test]
    fn circle_masks_corner_keeps_center() {
        let mut image = opaque(512);
        apply_shape_mask(&mut image, BubbleShape::Circle);
        assert_eq!(image.get_pixel(0, 0)[3], 0, "corner must be masked out");
        assert_eq!(image.get_pixel(256, 256)[3], 255, "center must survive");
    }

    #[test]
    fn circle_keeps_edge_midpoints() {
        let mut image = opaque(512);
        apply_shape_mask(&mut image, BubbleShape::Circle);
        assert_eq!(image.get_pixel(256, 1)[3], 255);
        assert_eq!(image.get_pixel(1, 256)[3], 255);
    }

    #[test]
    fn rounded_rect_masks_corner_keeps_edges() {
        let mut image = opaque(512);
        apply_shape_mask(&mut image, BubbleShape::RoundedRect);
        assert_eq!(image.get_pixel(0, 0)[3], 0, "sharp corner must be rounded off");
        assert_eq!(image.get_pixel(256, 256)[3], 255);
        assert_eq!(image.get_pixel(0, 256)[3], 255, "edge midpoint is inside");
        assert_eq!(image.get_pixel(256, 0)[3], 255);
    }

    #[test]
    fn rounded_rect_corner_arc_boundary() {
        let r = ROUNDED_CORNER_RADIUS;
        let mut image = opaque(512);
        apply_shape_mask(&mut image, BubbleShape::RoundedRect);
        // The corner circle center itself is always inside.
        assert_eq!(image.get_pixel(r, r)[3], 255);
        // Diagonal well outside the arc near (0,0) is masked.
        assert_eq!(image.get_pixel(4, 4)[3], 0);
    }

    #[test]
    fn masks_are_pure_recomputable() {
        assert!(covers(BubbleShape::Circle, 256, 256, 512));
        assert!(!covers(BubbleShape::Circle, 0, 0, 512));
        assert_eq!(
            covers(BubbleShape::RoundedRect, 10, 10, 512),
            covers(BubbleShape::RoundedRect, 10, 10, 512)
        );
    }
}
