//! Error-diffusion remapping of a pixel source onto a fixed palette.

use crate::{
    matcher::MatchTable, Error, Kernel, PixelSink, PixelSource, Rgba16, MAX_K,
};
use std::array;

/// Propagates and stores the quantization error for every pixel.
///
/// Each pixel's slot accumulates weighted residuals from earlier pixels and
/// is consumed exactly once, when the raster pass visits that pixel.
struct ErrorBuf {
    /// The width of a row of pixels.
    width: usize,
    /// One accumulator per pixel, in row-major order.
    acc: Vec<[f32; 4]>,
}

impl ErrorBuf {
    /// Creates a zeroed accumulator for an image of the given dimensions.
    fn new(width: u32, height: u32) -> Self {
        let width = width as usize;
        Self {
            width,
            acc: vec![[0.0; 4]; width * height as usize],
        }
    }

    /// Takes the accumulated error at `(x, y)`, resetting the slot to zero.
    #[inline]
    fn take(&mut self, x: u32, y: u32) -> [f32; 4] {
        let index = y as usize * self.width + x as usize;
        std::mem::take(&mut self.acc[index])
    }

    /// Adds `weight * residual` to the accumulator at `(x, y)`.
    #[inline]
    fn add(&mut self, x: u32, y: u32, weight: f32, residual: [f32; 4]) {
        let slot = &mut self.acc[y as usize * self.width + x as usize];
        for c in 0..4 {
            slot[c] += weight * residual[c];
        }
    }
}

/// Error-diffusion dithering over an arbitrary diffusion kernel.
///
/// Pixels are processed in a single raster pass, top to bottom and left to
/// right within each row. At each pixel the accumulated error is applied,
/// scaled by the error gain and clamped to the channel range, before the
/// nearest palette entry is chosen; the remaining difference is then diffused
/// forward through the kernel.
///
/// # Examples
/// ```
/// # use dithercut::{Ditherer, KernelRegistry, PaletteSize, Raster};
/// # fn main() -> Result<(), dithercut::Error> {
/// let image = Raster::new(16, 16);
/// let registry = KernelRegistry::builtin();
/// let kernel = registry.resolve("floyd-steinberg")?.clone();
///
/// let output = dithercut::median_cut::palette(&image, PaletteSize::from_clamped(16));
/// let indices = Ditherer::new(kernel).remap(&image, &output.palette)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Ditherer {
    /// The diffusion kernel. Empty disables diffusion entirely.
    kernel: Kernel,
    /// The multiplier applied to accumulated error before it is added to a
    /// pixel.
    error_gain: f32,
}

impl Ditherer {
    /// The default error gain.
    ///
    /// Slightly above `1.0`, so diffused error is amplified a little on
    /// application.
    pub const DEFAULT_ERROR_GAIN: f32 = 1.12;

    /// Creates a ditherer with the given kernel and the default error gain.
    #[must_use]
    pub fn new(kernel: Kernel) -> Self {
        Self { kernel, error_gain: Self::DEFAULT_ERROR_GAIN }
    }

    /// Creates a ditherer with the given kernel and error gain.
    ///
    /// For example, a gain of `0.0` ignores accumulated error entirely while
    /// `1.0` applies it unscaled.
    ///
    /// This will return `None` if `error_gain` is negative or not finite.
    #[must_use]
    pub fn with_error_gain(kernel: Kernel, error_gain: f32) -> Option<Self> {
        if error_gain.is_finite() && error_gain >= 0.0 {
            Some(Self { kernel, error_gain })
        } else {
            None
        }
    }

    /// Gets the error gain for this [`Ditherer`].
    #[must_use]
    pub const fn error_gain(&self) -> f32 {
        self.error_gain
    }

    /// Gets the diffusion kernel for this [`Ditherer`].
    #[must_use]
    pub const fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Runs the raster pass, calling `visit` once per pixel with its
    /// coordinates and the chosen palette index.
    fn run(
        &self,
        source: &impl PixelSource,
        palette: &[Rgba16],
        mut visit: impl FnMut(u32, u32, u8),
    ) -> Result<(), Error> {
        if palette.is_empty() {
            return Err(Error::EmptyPalette);
        }
        if palette.len() > MAX_K {
            return Err(Error::PaletteTooLarge(palette.len()));
        }

        let width = source.width();
        let height = source.height();
        if width == 0 || height == 0 {
            return Ok(());
        }

        let table = MatchTable::new(palette);
        let mut error = (!self.kernel.is_empty()).then(|| ErrorBuf::new(width, height));

        for y in 0..height {
            for x in 0..width {
                let mut point = source.rgba(x, y).map(f32::from);

                if let Some(error) = &mut error {
                    let carried = error.take(x, y);
                    for c in 0..4 {
                        point[c] =
                            (point[c] + self.error_gain * carried[c]).clamp(0.0, 65535.0);
                    }
                }

                let (index, chosen) = table.nearest(point);

                if let Some(error) = &mut error {
                    let residual = array::from_fn(|c| point[c] - chosen[c]);
                    for entry in self.kernel.entries() {
                        let tx = i64::from(x) + i64::from(entry.dx);
                        let ty = i64::from(y) + i64::from(entry.dy);
                        if (0..i64::from(width)).contains(&tx)
                            && (0..i64::from(height)).contains(&ty)
                        {
                            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                            error.add(tx as u32, ty as u32, entry.weight, residual);
                        }
                    }
                }

                visit(x, y, index);
            }
        }

        Ok(())
    }

    /// Remaps every pixel of `source` onto `palette`, returning the chosen
    /// palette index per pixel in row-major order.
    ///
    /// A zero-area source returns an empty vector.
    ///
    /// # Errors
    /// Returns [`Error::EmptyPalette`] or [`Error::PaletteTooLarge`] for an
    /// unusable palette; these are checked before any pixel is read.
    pub fn remap(
        &self,
        source: &impl PixelSource,
        palette: &[Rgba16],
    ) -> Result<Vec<u8>, Error> {
        let mut indices = Vec::with_capacity(source.num_pixels());
        self.run(source, palette, |_, _, index| indices.push(index))?;
        Ok(indices)
    }

    /// Like [`remap`](Self::remap), but additionally writes the chosen
    /// palette color for each pixel into `sink`.
    ///
    /// # Errors
    /// See [`remap`](Self::remap).
    pub fn remap_into(
        &self,
        source: &impl PixelSource,
        sink: &mut impl PixelSink,
        palette: &[Rgba16],
    ) -> Result<Vec<u8>, Error> {
        let mut indices = Vec::with_capacity(source.num_pixels());
        self.run(source, palette, |x, y, index| {
            sink.put_rgba(x, y, palette[usize::from(index)]);
            indices.push(index);
        })?;
        Ok(indices)
    }
}

impl Default for Ditherer {
    fn default() -> Self {
        Self::new(Kernel::none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{test_colors, test_raster};
    use crate::{from_channels, KernelRegistry, Raster};

    fn floyd_steinberg() -> Kernel {
        #[allow(clippy::unwrap_used)]
        {
            KernelRegistry::builtin().resolve("floyd-steinberg").unwrap().clone()
        }
    }

    #[test]
    fn gain_must_be_finite_and_nonnegative() {
        assert!(Ditherer::with_error_gain(Kernel::none(), 0.0).is_some());
        assert!(Ditherer::with_error_gain(Kernel::none(), 1.12).is_some());
        assert!(Ditherer::with_error_gain(Kernel::none(), -0.5).is_none());
        assert!(Ditherer::with_error_gain(Kernel::none(), f32::NAN).is_none());
        assert!(Ditherer::with_error_gain(Kernel::none(), f32::INFINITY).is_none());
    }

    #[test]
    fn empty_palette_is_rejected_before_pixels() {
        let image = test_raster(4, 4);
        let result = Ditherer::new(floyd_steinberg()).remap(&image, &[]);
        assert_eq!(result, Err(Error::EmptyPalette));
    }

    #[test]
    fn zero_area_source_is_a_no_op() {
        let palette = test_colors(4);
        let ditherer = Ditherer::new(floyd_steinberg());
        #[allow(clippy::unwrap_used)]
        {
            assert!(ditherer.remap(&Raster::new(0, 3), &palette).unwrap().is_empty());
            assert!(ditherer.remap(&Raster::new(3, 0), &palette).unwrap().is_empty());
        }
    }

    #[test]
    fn indices_address_the_palette() {
        let image = test_raster(16, 16);
        let palette = test_colors(5);
        #[allow(clippy::unwrap_used)]
        let indices = Ditherer::new(floyd_steinberg()).remap(&image, &palette).unwrap();
        assert_eq!(indices.len(), 256);
        assert!(indices.iter().all(|&i| usize::from(i) < palette.len()));
    }

    #[test]
    fn diffusion_pushes_carried_error_over_the_threshold() {
        // Two mid-gray pixels against a black and white palette. Without
        // diffusion both resolve to black; with diffusion the first pixel's
        // residual carries into the second and tips it to white.
        let gray = from_channels([30000, 0, 0, 0xFFFF]);
        let image = Raster::from_pixels(2, 1, vec![gray, gray]);
        #[allow(clippy::unwrap_used)]
        let image = image.unwrap();
        let palette = [
            from_channels([0, 0, 0, 0xFFFF]),
            from_channels([0xFFFF, 0, 0, 0xFFFF]),
        ];

        #[allow(clippy::unwrap_used)]
        let flat = Ditherer::new(Kernel::none()).remap(&image, &palette).unwrap();
        assert_eq!(flat, vec![0, 0]);

        #[allow(clippy::unwrap_used)]
        let dithered = Ditherer::new(floyd_steinberg()).remap(&image, &palette).unwrap();
        assert_eq!(dithered, vec![0, 1]);
    }

    #[test]
    fn edge_pixels_drop_out_of_bounds_diffusion() {
        let palette = test_colors(3);
        let ditherer = Ditherer::new(floyd_steinberg());
        // Every kernel target of a 1x1 image is out of bounds.
        #[allow(clippy::unwrap_used)]
        let indices = ditherer.remap(&test_raster(1, 1), &palette).unwrap();
        assert_eq!(indices.len(), 1);
        // Bottom and right edges likewise discard part of the kernel.
        #[allow(clippy::unwrap_used)]
        let indices = ditherer.remap(&test_raster(3, 2), &palette).unwrap();
        assert_eq!(indices.len(), 6);
    }

    #[test]
    fn single_entry_palette_covers_all_pixels() {
        let a = from_channels([0xFF, 0, 0, 0]);
        let b = test_colors(1)[0];
        #[allow(clippy::unwrap_used)]
        let image = Raster::from_pixels(1, 2, vec![a, b]).unwrap();

        let output = crate::median_cut::palette(&image, crate::PaletteSize::MIN);
        assert_eq!(output.palette.len(), 1);
        let entry = output.palette[0];

        for &pixel in image.pixels() {
            assert_eq!(crate::matcher::nearest(pixel, &output.palette), Ok((0, entry)));
        }

        #[allow(clippy::unwrap_used)]
        let indices = Ditherer::new(Kernel::none()).remap(&image, &output.palette).unwrap();
        assert_eq!(indices, vec![0, 0]);
    }

    #[test]
    fn residual_is_the_exact_difference_from_the_chosen_entry() {
        // A single-target kernel with weight 1.0 and unit gain hands the
        // first pixel's residual to the second pixel unchanged, making it
        // observable through the second match.
        let black = from_channels([0, 0, 0, 0xFFFF]);
        let red = from_channels([40000, 0, 0, 0xFFFF]);
        let palette = [black, red];
        let pixels = vec![
            from_channels([19000, 0, 0, 0xFFFF]),
            from_channels([2000, 0, 0, 0xFFFF]),
        ];
        #[allow(clippy::unwrap_used)]
        let image = Raster::from_pixels(1, 2, pixels).unwrap();

        #[allow(clippy::unwrap_used)]
        let kernel = Kernel::from_entries(&[(1.0, 0, 1)]).unwrap();
        #[allow(clippy::unwrap_used)]
        let ditherer = Ditherer::with_error_gain(kernel, 1.0).unwrap();

        // 19000 maps to black leaving a residual of exactly 19000; carried
        // into the second pixel it lifts 2000 to 21000, past the midpoint of
        // 20000, so the second pixel flips to red.
        #[allow(clippy::unwrap_used)]
        let indices = ditherer.remap(&image, &palette).unwrap();
        assert_eq!(indices, vec![0, 1]);

        // Without the carried residual the second pixel stays black.
        #[allow(clippy::unwrap_used)]
        let flat = Ditherer::new(Kernel::none()).remap(&image, &palette).unwrap();
        assert_eq!(flat, vec![0, 0]);
    }

    #[test]
    fn exact_palette_image_is_unaffected() {
        let palette = test_colors(8);
        let pixels = (0..64).map(|i| palette[i % 8]).collect::<Vec<_>>();
        #[allow(clippy::unwrap_used)]
        let image = Raster::from_pixels(8, 8, pixels).unwrap();

        #[allow(clippy::unwrap_used)]
        let indices = Ditherer::new(floyd_steinberg()).remap(&image, &palette).unwrap();
        #[allow(clippy::cast_possible_truncation)]
        let expected = (0..64).map(|i| (i % 8) as u8).collect::<Vec<_>>();
        assert_eq!(indices, expected);
    }

    #[test]
    fn remap_into_writes_palette_colors() {
        let image = test_raster(8, 8);
        let palette = test_colors(4);
        let ditherer = Ditherer::new(floyd_steinberg());

        let mut sink = Raster::new(8, 8);
        #[allow(clippy::unwrap_used)]
        let indices = ditherer.remap_into(&image, &mut sink, &palette).unwrap();
        #[allow(clippy::unwrap_used)]
        {
            assert_eq!(indices, ditherer.remap(&image, &palette).unwrap());
        }
        for (pixel, &index) in sink.pixels().iter().zip(&indices) {
            assert_eq!(*pixel, palette[usize::from(index)]);
        }
    }

    #[test]
    fn output_is_deterministic() {
        let image = test_raster(20, 20);
        let palette = test_colors(12);
        let ditherer = Ditherer::new(floyd_steinberg());
        #[allow(clippy::unwrap_used)]
        {
            assert_eq!(
                ditherer.remap(&image, &palette).unwrap(),
                ditherer.remap(&image, &palette).unwrap()
            );
        }
    }
}
