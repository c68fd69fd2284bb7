use std::borrow::Cow;
use std::io::Cursor;

use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use image::ImageFormat;

use super::ledger::{Handle, ResourceLedger};

/// Upper bound on the pixel bytes a [`StoredSurface`] can rebuild from.
/// Enough for 1024x768 at 3 bytes per pixel.
pub const STORED_CAPACITY: usize = 2_500_000;

/// Channel layout of a surface. Pixels are always RGBA8 in memory order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub bits_per_pixel: u8,
    pub rmask: u32,
    pub gmask: u32,
    pub bmask: u32,
    pub amask: u32,
}

impl PixelFormat {
    pub const RGBA32: PixelFormat = PixelFormat {
        bits_per_pixel: 32,
        rmask: 0x0000_00ff,
        gmask: 0x0000_ff00,
        bmask: 0x00ff_0000,
        amask: 0xff00_0000,
    };

    pub fn bytes_per_pixel(&self) -> usize {
        usize::from(self.bits_per_pixel / 8)
    }
}

/// Decoded pixels plus their geometry.
///
/// A surface either owns its pixels (decoded from PNG bytes) or borrows them
/// from a scratch buffer filled by [`StoredSurface::surface`].
#[derive(Debug)]
pub struct Surface<'a> {
    pixels: Cow<'a, [u8]>,
    width: u32,
    height: u32,
    pitch: usize,
    format: PixelFormat,
    _handle: Handle,
}

impl<'a> Surface<'a> {
    fn new(
        pixels: Cow<'a, [u8]>,
        width: u32,
        height: u32,
        format: PixelFormat,
        ledger: &ResourceLedger,
    ) -> Self {
        let pitch = width as usize * format.bytes_per_pixel();
        Surface {
            pixels,
            width,
            height,
            pitch,
            format,
            _handle: ledger.track_surface(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn is_borrowed(&self) -> bool {
        matches!(self.pixels, Cow::Borrowed(_))
    }

    /// Detach from any scratch buffer so the surface can outlive it.
    pub fn into_owned(self) -> Surface<'static> {
        Surface {
            pixels: Cow::Owned(self.pixels.into_owned()),
            width: self.width,
            height: self.height,
            pitch: self.pitch,
            format: self.format,
            _handle: self._handle,
        }
    }
}

impl Surface<'static> {
    /// Decode PNG bytes through an in-memory reader.
    pub fn decode(bytes: &[u8], ledger: &ResourceLedger) -> Result<Self> {
        let _span = tracing::debug_span!("surface.decode", len = bytes.len()).entered();

        let image = image::load(Cursor::new(bytes), ImageFormat::Png)
            .wrap_err("failed to decode PNG")?
            .into_rgba8();
        let (width, height) = image.dimensions();
        Ok(Surface::new(
            Cow::Owned(image.into_raw()),
            width,
            height,
            PixelFormat::RGBA32,
            ledger,
        ))
    }
}

/// Pixels and geometry captured from one decode, replayed every iteration
/// without touching the decoder again.
#[derive(Debug, Clone)]
pub struct StoredSurface {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl StoredSurface {
    pub fn capture(bytes: &[u8], ledger: &ResourceLedger) -> Result<Self> {
        let surface = Surface::decode(bytes, ledger)?;
        if surface.pixels().len() > STORED_CAPACITY {
            return Err(eyre!(
                "image {}x{} needs {} bytes, stored surfaces hold at most {STORED_CAPACITY}",
                surface.width(),
                surface.height(),
                surface.pixels().len()
            ));
        }
        Ok(StoredSurface {
            pixels: surface.pixels().to_vec(),
            width: surface.width(),
            height: surface.height(),
            format: surface.format(),
        })
    }

    pub fn scratch() -> Box<[u8]> {
        vec![0u8; STORED_CAPACITY].into_boxed_slice()
    }

    /// Copy the stored pixels into `scratch` and wrap them in a surface.
    pub fn surface<'a>(&self, scratch: &'a mut [u8], ledger: &ResourceLedger) -> Result<Surface<'a>> {
        let len = self.pixels.len();
        let scratch_len = scratch.len();
        let dst = scratch.get_mut(..len).ok_or_else(|| {
            eyre!("scratch buffer holds {scratch_len} bytes, surface needs {len}")
        })?;
        dst.copy_from_slice(&self.pixels);
        Ok(Surface::new(
            Cow::Borrowed(&*dst),
            self.width,
            self.height,
            self.format,
            ledger,
        ))
    }
}
