// ============================================================================
// TRANSFORM OPERATIONS: flip, quarter-turn rotate, resample
// ============================================================================

use image::{RgbaImage, imageops};

/// Normalise a rotation to one of 0/90/180/270 clockwise.
/// Returns `None` for angles that are not a multiple of 90°.
pub fn quarter_turns(degrees: i32) -> Option<u32> {
    if degrees % 90 != 0 {
        return None;
    }
    Some((degrees.rem_euclid(360) / 90) as u32)
}

/// Rotate clockwise by a multiple of 90°. 90/270 swap width and height.
/// Other angles return the image unchanged.
pub fn rotate_image(img: &RgbaImage, degrees: i32) -> RgbaImage {
    match quarter_turns(degrees) {
        Some(1) => imageops::rotate90(img),
        Some(2) => imageops::rotate180(img),
        Some(3) => imageops::rotate270(img),
        _ => img.clone(),
    }
}

/// Mirror left↔right in place.
pub fn flip_horizontal(img: &mut RgbaImage) {
    imageops::flip_horizontal_in_place(img);
}

/// Mirror top↔bottom in place.
pub fn flip_vertical(img: &mut RgbaImage) {
    imageops::flip_vertical_in_place(img);
}

/// Bilinear resample to exactly `new_w × new_h`. Zero sizes are rejected.
pub fn resize_image(img: &RgbaImage, new_w: u32, new_h: u32) -> Option<RgbaImage> {
    if new_w == 0 || new_h == 0 {
        return None;
    }
    if img.dimensions() == (new_w, new_h) {
        return Some(img.clone());
    }
    Some(imageops::resize(img, new_w, new_h, imageops::FilterType::Triangle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn marked(w: u32, h: u32) -> RgbaImage {
        let mut img = RgbaImage::new(w, h);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img
    }

    #[test]
    fn quarter_turn_normalisation() {
        assert_eq!(quarter_turns(0), Some(0));
        assert_eq!(quarter_turns(-90), Some(3));
        assert_eq!(quarter_turns(450), Some(1));
        assert_eq!(quarter_turns(45), None);
    }

    #[test]
    fn rotate_90_swaps_dimensions_and_moves_corner() {
        let rotated = rotate_image(&marked(4, 2), 90);
        assert_eq!(rotated.dimensions(), (2, 4));
        // Top-left goes to top-right under a clockwise turn.
        assert_eq!(rotated.get_pixel(1, 0)[0], 255);
        assert_eq!(rotate_image(&marked(4, 2), 180).get_pixel(3, 1)[0], 255);
    }

    #[test]
    fn flips_move_the_corner() {
        let mut img = marked(3, 3);
        flip_horizontal(&mut img);
        assert_eq!(img.get_pixel(2, 0)[0], 255);
        flip_vertical(&mut img);
        assert_eq!(img.get_pixel(2, 2)[0], 255);
    }

    #[test]
    fn resize_rejects_zero() {
        assert!(resize_image(&marked(4, 4), 0, 3).is_none());
        assert_eq!(
            resize_image(&marked(4, 4), 8, 2).map(|i| i.dimensions()),
            Some((8, 2))
        );
    }
}
