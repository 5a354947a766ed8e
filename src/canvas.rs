use egui::{Pos2, Rect};
use image::{Rgba, RgbaImage, imageops};

// ============================================================================
// RASTER SURFACE
// ============================================================================

/// The single mutable bitmap an editing session draws into.
///
/// Every tool reads and writes this buffer directly; the history manager
/// copies it out and back in whole. Dimensions are always at least 1×1.
#[derive(Clone, Debug)]
pub struct RasterSurface {
    pixels: RgbaImage,
}

impl RasterSurface {
    /// Create a fully transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width.max(1), height.max(1)),
        }
    }

    /// Create a surface filled with a solid colour.
    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width.max(1), height.max(1), color),
        }
    }

    /// Wrap an already-decoded image. Zero-sized images become a 1×1 surface.
    pub fn from_image(pixels: RgbaImage) -> Self {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Self::new(1, 1);
        }
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    /// Raw RGBA bytes, row-major.
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    /// Full copy of the current pixels.
    pub fn snapshot(&self) -> RgbaImage {
        self.pixels.clone()
    }

    /// Overwrite the surface with `image`, adopting its dimensions if they differ.
    pub fn restore(&mut self, image: &RgbaImage) {
        if self.pixels.dimensions() == image.dimensions() {
            let dst: &mut [u8] = &mut self.pixels;
            dst.copy_from_slice(image.as_raw());
        } else {
            self.pixels = image.clone();
        }
    }

    /// Replace the surface wholesale (load, crop, resize, rotate).
    pub fn replace(&mut self, image: RgbaImage) {
        if image.width() == 0 || image.height() == 0 {
            return;
        }
        self.pixels = image;
    }

    /// Copy out a sub-rectangle. The rectangle must lie inside the surface.
    pub fn extract(&self, x: u32, y: u32, width: u32, height: u32) -> RgbaImage {
        imageops::crop_imm(&self.pixels, x, y, width, height).to_image()
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        if x < self.width() && y < self.height() {
            Some(*self.pixels.get_pixel(x, y))
        } else {
            None
        }
    }

    /// Approximate heap footprint of one snapshot of this surface.
    pub fn memory_bytes(&self) -> usize {
        self.pixels.as_raw().len()
    }
}

// ============================================================================
// POINTER → RASTER MAPPING
// ============================================================================

/// Map a pointer position in client (display) space to raster pixel space.
///
/// `displayed` is the on-screen rectangle the surface is drawn into, after any
/// CSS-like scaling. Each axis is scaled independently by
/// `raster_dim / displayed_dim`. A collapsed display rect (not laid out yet,
/// or hidden) has no mapping.
pub fn client_to_raster(client: Pos2, displayed: Rect, raster_w: u32, raster_h: u32) -> Option<Pos2> {
    let dw = displayed.width();
    let dh = displayed.height();
    if !(dw > 0.0 && dh > 0.0) {
        return None;
    }
    let sx = raster_w as f32 / dw;
    let sy = raster_h as f32 / dh;
    Some(Pos2::new(
        (client.x - displayed.min.x) * sx,
        (client.y - displayed.min.y) * sy,
    ))
}
