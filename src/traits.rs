//! The pixel source and sink capabilities the core operates over,
//! and an owned in-memory implementation of both.

use crate::{channels, from_channels, Rgba16};

#[cfg(feature = "image")]
use image::RgbaImage;

/// A rectangular source of RGBA pixels.
///
/// The decoded-image representation behind this trait is supplied by the caller;
/// the core only needs dimensions and per-coordinate channel reads.
/// Channel values are in the internal 16-bit range (see [`Rgba16`]).
pub trait PixelSource {
    /// The width of the image in pixels.
    fn width(&self) -> u32;

    /// The height of the image in pixels.
    fn height(&self) -> u32;

    /// Reads the channel values at `(x, y)` in `[R, G, B, A]` order.
    ///
    /// Coordinates are within `0..width` and `0..height`.
    fn rgba(&self, x: u32, y: u32) -> [u16; 4];

    /// The total number of pixels.
    fn num_pixels(&self) -> usize {
        self.width() as usize * self.height() as usize
    }
}

/// A rectangular sink of RGBA pixels.
pub trait PixelSink {
    /// Writes `color` at `(x, y)`.
    ///
    /// Coordinates are within the dimensions of the source the sink is paired with.
    fn put_rgba(&mut self, x: u32, y: u32, color: Rgba16);
}

/// An owned rectangular RGBA pixel buffer in row-major order.
///
/// This is the in-memory representation used by tests and the high-level API;
/// any other decoded-image type can participate by implementing
/// [`PixelSource`] or [`PixelSink`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    /// The width of the buffer in pixels.
    width: u32,
    /// The height of the buffer in pixels.
    height: u32,
    /// The pixels in row-major order, `width * height` in total.
    pixels: Vec<Rgba16>,
}

impl Raster {
    /// Creates a raster of the given dimensions filled with transparent black.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: vec![from_channels([0; 4]); len],
        }
    }

    /// Creates a raster from a row-major pixel buffer.
    ///
    /// Returns `None` if the buffer length is not equal to `width * height`.
    #[must_use]
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Rgba16>) -> Option<Self> {
        if pixels.len() == width as usize * height as usize {
            Some(Self { width, height, pixels })
        } else {
            None
        }
    }

    /// Creates a raster by evaluating `f` at every `(x, y)` coordinate in raster order.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Rgba16) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self { width, height, pixels }
    }

    /// The pixels in row-major order.
    #[must_use]
    pub fn pixels(&self) -> &[Rgba16] {
        &self.pixels
    }

    /// Consumes the raster and returns the pixels in row-major order.
    #[must_use]
    pub fn into_pixels(self) -> Vec<Rgba16> {
        self.pixels
    }

    /// The row-major buffer index for `(x, y)`.
    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

impl PixelSource for Raster {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn rgba(&self, x: u32, y: u32) -> [u16; 4] {
        channels(self.pixels[self.index(x, y)])
    }
}

impl PixelSink for Raster {
    #[inline]
    fn put_rgba(&mut self, x: u32, y: u32, color: Rgba16) {
        let index = self.index(x, y);
        self.pixels[index] = color;
    }
}

/// Widens an 8-bit channel to the 16-bit internal range by byte replication.
#[cfg(feature = "image")]
#[inline]
fn widen(value: u8) -> u16 {
    u16::from(value) * 0x0101
}

/// Narrows a 16-bit internal channel to 8 bits by taking the high byte.
#[cfg(feature = "image")]
#[inline]
fn narrow(value: u16) -> u8 {
    #[allow(clippy::cast_possible_truncation)]
    {
        (value >> 8) as u8
    }
}

#[cfg(feature = "image")]
impl PixelSource for RgbaImage {
    fn width(&self) -> u32 {
        RgbaImage::width(self)
    }

    fn height(&self) -> u32 {
        RgbaImage::height(self)
    }

    #[inline]
    fn rgba(&self, x: u32, y: u32) -> [u16; 4] {
        self.get_pixel(x, y).0.map(widen)
    }
}

#[cfg(feature = "image")]
impl PixelSink for RgbaImage {
    #[inline]
    fn put_rgba(&mut self, x: u32, y: u32, color: Rgba16) {
        self.put_pixel(x, y, image::Rgba(crate::channels(color).map(narrow)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_round_trip() {
        let mut raster = Raster::new(3, 2);
        assert_eq!(raster.num_pixels(), 6);
        raster.put_rgba(2, 1, from_channels([1, 2, 3, 4]));
        assert_eq!(raster.rgba(2, 1), [1, 2, 3, 4]);
        assert_eq!(raster.rgba(0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn from_pixels_validates_length() {
        assert!(Raster::from_pixels(2, 2, vec![from_channels([0; 4]); 3]).is_none());
        assert!(Raster::from_pixels(2, 2, vec![from_channels([0; 4]); 4]).is_some());
    }

    #[test]
    #[allow(clippy::cast_possible_truncation)]
    fn from_fn_is_raster_order() {
        let raster = Raster::from_fn(2, 2, |x, y| from_channels([x as u16, y as u16, 0, 0]));
        assert_eq!(raster.rgba(1, 0), [1, 0, 0, 0]);
        assert_eq!(raster.rgba(0, 1), [0, 1, 0, 0]);
    }

    #[cfg(feature = "image")]
    #[test]
    fn image_channels_widen_and_narrow() {
        let mut img = image::RgbaImage::new(1, 1);
        img.put_pixel(0, 0, image::Rgba([0xAB, 0, 0xFF, 0x80]));
        assert_eq!(PixelSource::rgba(&img, 0, 0), [0xABAB, 0, 0xFFFF, 0x8080]);

        let mut sink = image::RgbaImage::new(1, 1);
        sink.put_rgba(0, 0, from_channels([0xABAB, 0, 0xFFFF, 0x8080]));
        assert_eq!(sink.get_pixel(0, 0).0, [0xAB, 0, 0xFF, 0x80]);
    }
}
