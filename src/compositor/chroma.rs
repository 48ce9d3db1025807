use image::RgbaImage;

/// Width in distance units of the linear alpha ramp above `threshold`. The
/// ramp anti-aliases the cutout edge; without it the silhouette is a hard
/// jagged boundary at exactly `threshold`.
pub const SOFT_EDGE_WIDTH: f32 = 20.0;

/// Write a per-pixel alpha matte into `buffer` by Euclidean distance from
/// `key_color` in RGB space. Only the alpha channel is touched:
///
/// - distance < threshold: alpha 0 (pixel is backdrop, remove)
/// - distance < threshold + SOFT_EDGE_WIDTH: linear ramp 0..255
/// - otherwise: alpha left as-is (pixel is subject)
///
/// This is a plain distance threshold, not a statistical keyer: subject
/// pixels that happen to sit near the key color will be keyed out too.
pub fn apply_chroma_key(buffer: &mut RgbaImage, key_color: [u8; 3], threshold: f32) {
    let kr = key_color[0] as f32;
    let kg = key_color[1] as f32;
    let kb = key_color[2] as f32;

    for pixel in buffer.pixels_mut() {
        let dr = pixel[0] as f32 - kr;
        let dg = pixel[1] as f32 - kg;
        let db = pixel[2] as f32 - kb;
        let distance = (dr * dr + dg * dg + db * db).sqrt();

        if distance < threshold {
            pixel[3] = 0;
        } else if distance < threshold + SOFT_EDGE_WIDTH {
            pixel[3] = (255.0 * (distance - threshold) / SOFT_EDGE_WIDTH) as u8;
        }
    }
}
