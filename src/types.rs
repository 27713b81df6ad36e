//! Contains various types needed across the crate.

use crate::MAX_COLORS;
use palette::Srgba;
use std::{
    error::Error as StdError,
    fmt::{Debug, Display},
};

/// The RGBA color type used throughout the crate.
///
/// Channels use the full 16-bit range, `0..=0xFFFF`.
/// 8-bit sources are widened by replicating the high byte (`0xAB` becomes `0xABAB`).
pub type Rgba16 = Srgba<u16>;

/// Returns the channel values of a color as an array in `[R, G, B, A]` order.
#[inline]
pub(crate) fn channels(color: Rgba16) -> [u16; 4] {
    [color.color.red, color.color.green, color.color.blue, color.alpha]
}

/// Builds a color from channel values in `[R, G, B, A]` order.
#[inline]
pub(crate) fn from_channels([r, g, b, a]: [u16; 4]) -> Rgba16 {
    Srgba::new(r, g, b, a)
}

/// The error type for rejected configuration and invalid input.
///
/// All variants are detected before any pixel is processed;
/// there is no partial output on failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The requested quantization level was zero or above [`MAX_COLORS`].
    InvalidPaletteSize(u16),
    /// The configured error gain was negative or not finite.
    InvalidErrorGain(f32),
    /// The requested kernel name is not present in the registry.
    UnknownKernel(String),
    /// A kernel entry would diffuse error onto an already finalized pixel.
    InvalidKernelOffset {
        /// The offending column offset.
        dx: i32,
        /// The offending row offset.
        dy: i32,
    },
    /// An empty palette was supplied where a nonempty one is required.
    EmptyPalette,
    /// A supplied palette has more entries than indices can address.
    PaletteTooLarge(usize),
    /// The quantizer was disabled but no palette was supplied.
    PaletteRequired,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidPaletteSize(k) => {
                write!(f, "invalid palette size {k}: must be between 1 and {MAX_COLORS}")
            }
            Error::InvalidErrorGain(gain) => {
                write!(f, "invalid error gain {gain}: must be finite and nonnegative")
            }
            Error::UnknownKernel(name) => write!(f, "unknown diffusion kernel {name:?}"),
            Error::InvalidKernelOffset { dx, dy } => {
                write!(f, "kernel offset ({dx}, {dy}) would revisit an already finalized pixel")
            }
            Error::EmptyPalette => write!(f, "palette is empty"),
            Error::PaletteTooLarge(len) => {
                write!(f, "palette has {len} entries, above the maximum of {MAX_COLORS}")
            }
            Error::PaletteRequired => {
                write!(f, "a palette is required when the quantizer is disabled")
            }
        }
    }
}

impl StdError for Error {}

/// This type specifies the (maximum) number of colors to include in a palette.
///
/// This is a simple new type wrapper around `u16` with the invariant that it must be
/// between `1` and [`MAX_COLORS`] inclusive. The upper bound ensures palette indices
/// fit in a `u8`.
///
/// # Examples
/// Use `try_into` or [`PaletteSize::from_clamped`] to create [`PaletteSize`]s:
/// ```
/// # use dithercut::{PaletteSize, Error};
/// # fn main() -> Result<(), Error> {
/// let size = PaletteSize::try_from(128u16)?;
/// let size: PaletteSize = 128u16.try_into()?;
/// let size = PaletteSize::from_clamped(1024);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PaletteSize(u16);

impl PaletteSize {
    /// The maximum supported palette size (given by [`MAX_COLORS`]).
    pub const MAX: Self = Self(MAX_COLORS);

    /// The minimum supported palette size.
    pub const MIN: Self = Self(1);

    /// Gets the inner `u16` value.
    #[must_use]
    pub const fn into_inner(self) -> u16 {
        self.0
    }

    /// Creates a [`PaletteSize`] by clamping the given `u16` into the supported range.
    #[must_use]
    pub const fn from_clamped(value: u16) -> Self {
        if value == 0 {
            Self(1)
        } else if value <= MAX_COLORS {
            Self(value)
        } else {
            Self(MAX_COLORS)
        }
    }

    /// The inner value as a `usize` for lengths and capacities.
    #[must_use]
    pub(crate) const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Default for PaletteSize {
    fn default() -> Self {
        Self::MAX
    }
}

impl From<PaletteSize> for u16 {
    fn from(val: PaletteSize) -> Self {
        val.into_inner()
    }
}

impl TryFrom<u16> for PaletteSize {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if (1..=MAX_COLORS).contains(&value) {
            Ok(PaletteSize(value))
        } else {
            Err(Error::InvalidPaletteSize(value))
        }
    }
}

impl Display for PaletteSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.into_inner())
    }
}

/// The output struct returned by the median-cut quantizer.
///
/// It contains the color `palette` built for the image, alongside `counts` which has
/// the number of pixels assigned to each palette color. Index positions correspond:
/// `counts[i]` is the population of `palette[i]`.
///
/// Both fields are empty if the source image had zero area.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuantizeOutput {
    /// The computed color palette, in cluster creation order.
    ///
    /// The colors in the palette are not guaranteed to be unique.
    pub palette: Vec<Rgba16>,
    /// The number of pixels that were assigned to each color in `palette`.
    pub counts: Vec<u32>,
}
