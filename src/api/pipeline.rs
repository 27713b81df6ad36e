//! Contains the builder struct for configuring and running a full
//! quantize-and-dither session.

use crate::{
    median_cut, Ditherer, Error, Kernel, KernelRegistry, PaletteSize, PixelSource, Raster,
    Rgba16, MAX_K,
};

/// A builder for quantizing and dithering a pixel source in one go.
///
/// By default the full pipeline runs: a palette is built with the median-cut
/// quantizer and the source is remapped onto it with Floyd–Steinberg
/// diffusion. Each stage can be reconfigured or turned off:
/// - [`palette`](Self::palette) supplies a fixed palette instead of running
///   the quantizer.
/// - [`dither`](Self::dither) toggles error diffusion; without it pixels are
///   remapped by plain nearest-color matching.
/// - [`kernel`](Self::kernel) and [`registry`](Self::registry) select the
///   diffusion kernel by name. The registry travels with the pipeline; there
///   is no global kernel table.
///
/// All configuration errors are reported before any pixel is processed.
///
/// # Examples
/// ```
/// # use dithercut::{Pipeline, PaletteSize, Raster};
/// # fn main() -> Result<(), dithercut::Error> {
/// let image = Raster::new(32, 32);
/// let (palette, indices) = Pipeline::new(&image)
///     .palette_size(PaletteSize::from_clamped(16))
///     .kernel("atkinson")
///     .indexed()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline<'a, Source: PixelSource> {
    /// The source image.
    source: &'a Source,
    /// The maximum palette size for the quantizer.
    k: PaletteSize,
    /// The name of the diffusion kernel to resolve when dithering.
    kernel: String,
    /// The registry the kernel name is resolved against.
    registry: KernelRegistry,
    /// A caller-supplied palette, if the quantizer is not used.
    palette: Option<Vec<Rgba16>>,
    /// Whether to build the palette with the quantizer.
    quantize: bool,
    /// Whether to diffuse quantization error.
    dither: bool,
    /// The error gain for the dither pass.
    error_gain: f32,
}

impl<'a, Source: PixelSource> Pipeline<'a, Source> {
    /// Creates a pipeline for the given source with default settings:
    /// quantization to at most [`PaletteSize::MAX`] colors and
    /// Floyd–Steinberg dithering.
    pub fn new(source: &'a Source) -> Self {
        Self {
            source,
            k: PaletteSize::default(),
            kernel: String::from("floyd-steinberg"),
            registry: KernelRegistry::builtin(),
            palette: None,
            quantize: true,
            dither: true,
            error_gain: Ditherer::DEFAULT_ERROR_GAIN,
        }
    }

    /// Sets the maximum palette size for the quantizer.
    pub fn palette_size(&mut self, k: PaletteSize) -> &mut Self {
        self.k = k;
        self
    }

    /// Sets the diffusion kernel by name.
    ///
    /// The name is resolved against the pipeline's registry when the pipeline
    /// runs, and only if dithering is enabled.
    pub fn kernel(&mut self, name: impl Into<String>) -> &mut Self {
        self.kernel = name.into();
        self
    }

    /// Sets the registry used to resolve the kernel name.
    pub fn registry(&mut self, registry: KernelRegistry) -> &mut Self {
        self.registry = registry;
        self
    }

    /// Supplies a fixed palette, turning the quantizer off.
    pub fn palette(&mut self, palette: Vec<Rgba16>) -> &mut Self {
        self.palette = Some(palette);
        self.quantize = false;
        self
    }

    /// Sets whether the quantizer builds the palette.
    ///
    /// With quantization off, a palette must be supplied via
    /// [`palette`](Self::palette).
    pub fn quantize(&mut self, quantize: bool) -> &mut Self {
        self.quantize = quantize;
        self
    }

    /// Sets whether quantization error is diffused.
    pub fn dither(&mut self, dither: bool) -> &mut Self {
        self.dither = dither;
        self
    }

    /// Sets the error gain for the dither pass.
    ///
    /// Negative or non-finite values are rejected with
    /// [`Error::InvalidErrorGain`] when the pipeline runs.
    pub fn error_gain(&mut self, error_gain: f32) -> &mut Self {
        self.error_gain = error_gain;
        self
    }

    /// Resolves the kernel for the dither pass.
    fn resolve_kernel(&self) -> Result<Kernel, Error> {
        if self.dither {
            self.registry.resolve(&self.kernel).cloned()
        } else {
            Ok(Kernel::none())
        }
    }

    /// Validates the caller-supplied palette.
    fn supplied_palette(&self) -> Result<Vec<Rgba16>, Error> {
        let palette = self.palette.clone().ok_or(Error::PaletteRequired)?;
        if palette.is_empty() {
            return Err(Error::EmptyPalette);
        }
        if palette.len() > MAX_K {
            return Err(Error::PaletteTooLarge(palette.len()));
        }
        Ok(palette)
    }

    /// Builds the ditherer for the resolved kernel, validating the gain.
    fn ditherer(&self, kernel: Kernel) -> Result<Ditherer, Error> {
        Ditherer::with_error_gain(kernel, self.error_gain)
            .ok_or(Error::InvalidErrorGain(self.error_gain))
    }

    /// Remaps `source` onto `palette`, unless the palette is empty because
    /// the source had zero area.
    fn finish(
        &self,
        palette: Vec<Rgba16>,
        ditherer: &Ditherer,
    ) -> Result<(Vec<Rgba16>, Vec<u8>), Error> {
        if palette.is_empty() {
            return Ok((palette, Vec::new()));
        }
        let indices = ditherer.remap(self.source, &palette)?;
        Ok((palette, indices))
    }

    /// Runs the pipeline, returning the palette and the palette index chosen
    /// for each pixel in row-major order.
    ///
    /// A zero-area source yields an empty palette and no indices.
    ///
    /// # Errors
    /// Returns [`Error::UnknownKernel`] if the kernel name is not in the
    /// registry, [`Error::InvalidErrorGain`] for a negative or non-finite
    /// gain, [`Error::PaletteRequired`] if the quantizer is off and no
    /// palette was supplied, and [`Error::EmptyPalette`] or
    /// [`Error::PaletteTooLarge`] for an unusable supplied palette. All are
    /// raised before any pixel is processed.
    pub fn indexed(&self) -> Result<(Vec<Rgba16>, Vec<u8>), Error> {
        let kernel = self.resolve_kernel()?;
        let ditherer = self.ditherer(kernel)?;
        let palette = if self.quantize {
            median_cut::palette(self.source, self.k).palette
        } else {
            self.supplied_palette()?
        };
        self.finish(palette, &ditherer)
    }

    /// Runs the pipeline and materializes the result as an owned [`Raster`]
    /// of palette colors.
    ///
    /// # Errors
    /// See [`indexed`](Self::indexed).
    pub fn quantized_raster(&self) -> Result<Raster, Error> {
        let kernel = self.resolve_kernel()?;
        let ditherer = self.ditherer(kernel)?;
        let palette = if self.quantize {
            median_cut::palette(self.source, self.k).palette
        } else {
            self.supplied_palette()?
        };

        let mut sink = Raster::new(self.source.width(), self.source.height());
        if !palette.is_empty() {
            ditherer.remap_into(self.source, &mut sink, &palette)?;
        }
        Ok(sink)
    }
}

#[cfg(feature = "threads")]
impl<Source: PixelSource + Sync> Pipeline<'_, Source> {
    /// Like [`indexed`](Self::indexed), but builds the palette with the
    /// parallel quantizer. The result is identical to the sequential run.
    ///
    /// # Errors
    /// See [`indexed`](Self::indexed).
    pub fn indexed_par(&self) -> Result<(Vec<Rgba16>, Vec<u8>), Error> {
        let kernel = self.resolve_kernel()?;
        let ditherer = self.ditherer(kernel)?;
        let palette = if self.quantize {
            median_cut::palette_par(self.source, self.k).palette
        } else {
            self.supplied_palette()?
        };
        self.finish(palette, &ditherer)
    }
}

#[cfg(feature = "image")]
impl<Source: PixelSource> Pipeline<'_, Source> {
    /// Runs the pipeline and materializes the result as an
    /// [`RgbaImage`](image::RgbaImage) of palette colors.
    ///
    /// # Errors
    /// See [`indexed`](Self::indexed).
    pub fn quantized_rgba_image(&self) -> Result<image::RgbaImage, Error> {
        let kernel = self.resolve_kernel()?;
        let ditherer = self.ditherer(kernel)?;
        let palette = if self.quantize {
            median_cut::palette(self.source, self.k).palette
        } else {
            self.supplied_palette()?
        };

        let mut sink = image::RgbaImage::new(self.source.width(), self.source.height());
        if !palette.is_empty() {
            ditherer.remap_into(self.source, &mut sink, &palette)?;
        }
        Ok(sink)
    }
}
