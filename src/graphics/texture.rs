use super::ledger::{Handle, ResourceLedger};
use super::surface::Surface;

/// Render-ready copy of a surface.
///
/// Copying a texture into a destination rectangle of any size goes through
/// [`Texture::sample`], which scales with nearest-neighbour lookup.
#[derive(Debug)]
pub struct Texture {
    pixels: Vec<[u8; 4]>,
    width: u32,
    height: u32,
    _handle: Handle,
}

impl Texture {
    pub fn from_surface(surface: &Surface<'_>, ledger: &ResourceLedger) -> Self {
        let _span = tracing::debug_span!(
            "texture.from_surface",
            width = surface.width(),
            height = surface.height()
        )
        .entered();

        let width = surface.width() as usize;
        let bpp = surface.format().bytes_per_pixel();
        let mut pixels = Vec::with_capacity(width * surface.height() as usize);
        for row in surface.pixels().chunks(surface.pitch().max(1)).take(surface.height() as usize) {
            pixels.extend(row.chunks_exact(bpp).take(width).map(|px| {
                let mut rgba = [0, 0, 0, 255];
                for (dst, src) in rgba.iter_mut().zip(px) {
                    *dst = *src;
                }
                rgba
            }));
        }

        Texture {
            pixels,
            width: surface.width(),
            height: surface.height(),
            _handle: ledger.track_texture(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Nearest pixel for normalised coordinates in `[0, 1)`; values outside
    /// are clamped to the edge. An empty texture samples as transparent.
    pub fn sample(&self, u: f32, v: f32) -> [u8; 4] {
        if self.width == 0 || self.height == 0 {
            return [0; 4];
        }
        let x = ((u.clamp(0.0, 1.0) * self.width as f32) as u32).min(self.width - 1);
        let y = ((v.clamp(0.0, 1.0) * self.height as f32) as u32).min(self.height - 1);
        self.pixel(x, y).unwrap_or([0; 4])
    }
}
