//! Nearest palette color lookup under a luma-weighted distance metric.

use crate::{channels, Error, Rgba16, MAX_K};
use ordered_float::OrderedFloat;
use std::array;
use wide::{f32x8, u32x8, CmpLt};

/// Per-channel weights applied to squared channel differences, in
/// `[R, G, B, A]` order.
///
/// The color weights are the Rec. 709 luma coefficients, so perceptually
/// dominant channels dominate the match; alpha differences are weighted at
/// full strength.
pub const CHANNEL_WEIGHTS: [f32; 4] = [0.2126, 0.7152, 0.0722, 1.0];

/// The upper bound of the internal channel range as a float.
const CHANNEL_MAX: f32 = 65535.0;

/// Weighted squared distance between two points, without normalization.
#[inline]
fn weighted_squared_distance(x: [f32; 4], y: [f32; 4]) -> f32 {
    let mut dist = 0.0;
    for c in 0..4 {
        let d = x[c] - y[c];
        dist += CHANNEL_WEIGHTS[c] * d * d;
    }
    dist
}

/// Converts a color to its point in distance space.
#[inline]
pub(crate) fn to_point(color: Rgba16) -> [f32; 4] {
    channels(color).map(f32::from)
}

/// The luma-weighted distance between two colors, normalized to `[0.0, 1.0]`.
///
/// `0.0` means the colors are identical and `1.0` is the distance between
/// opaque white and transparent black, the farthest pair under the metric.
#[must_use]
pub fn distance(a: Rgba16, b: Rgba16) -> f32 {
    let max = CHANNEL_WEIGHTS.iter().sum::<f32>().sqrt() * CHANNEL_MAX;
    weighted_squared_distance(to_point(a), to_point(b)).sqrt() / max
}

/// Finds the palette entry nearest to `color`, returning its index and value.
///
/// Ties are broken toward the lowest index, and the scan stops early on an
/// exact match.
///
/// # Errors
/// Returns [`Error::EmptyPalette`] for an empty palette and
/// [`Error::PaletteTooLarge`] if the palette has more entries than a `u8`
/// index can address.
pub fn nearest(color: Rgba16, palette: &[Rgba16]) -> Result<(u8, Rgba16), Error> {
    if palette.is_empty() {
        return Err(Error::EmptyPalette);
    }
    if palette.len() > MAX_K {
        return Err(Error::PaletteTooLarge(palette.len()));
    }

    let point = to_point(color);
    let mut min_index = 0;
    let mut min_distance = f32::INFINITY;
    for (i, &candidate) in palette.iter().enumerate() {
        let dist = weighted_squared_distance(point, to_point(candidate));
        if dist < min_distance {
            min_distance = dist;
            min_index = i;
            if dist == 0.0 {
                break;
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    let index = min_index as u8;
    Ok((index, palette[min_index]))
}

/// A palette laid out for 8-lane nearest-neighbor scans.
///
/// Results agree exactly with [`nearest`], including the lowest-index
/// tie-break, so the dither pass can use this without changing output.
pub(crate) struct MatchTable {
    /// The palette colors as points in distance space.
    palette: Vec<[f32; 4]>,
    /// The palette in 8-wide chunks: lane indices alongside per-channel
    /// components. Remainder lanes are padded with `f32::INFINITY` so they
    /// never win a comparison.
    chunks: Vec<(u32x8, [f32x8; 4])>,
}

impl MatchTable {
    /// Lays out the given palette for lane-parallel scanning.
    ///
    /// The palette must be nonempty and at most [`MAX_K`](crate::MAX_COLORS)
    /// entries; callers validate before construction.
    pub(crate) fn new(palette: &[Rgba16]) -> Self {
        debug_assert!(!palette.is_empty() && palette.len() <= MAX_K);

        let palette = palette.iter().copied().map(to_point).collect::<Vec<_>>();

        let mut chunks = Vec::with_capacity(palette.len().div_ceil(8));
        let exact = palette.chunks_exact(8);
        let remainder = exact.remainder();

        let mut base = 0;
        for chunk in exact {
            #[allow(clippy::cast_possible_truncation)]
            let indices = u32x8::new(array::from_fn(|i| (base + i) as u32));
            let components = array::from_fn(|c| f32x8::new(array::from_fn(|i| chunk[i][c])));
            chunks.push((indices, components));
            base += 8;
        }

        if !remainder.is_empty() {
            let mut indices = [0; 8];
            let mut components = [[f32::INFINITY; 8]; 4];
            for (i, point) in remainder.iter().enumerate() {
                #[allow(clippy::cast_possible_truncation)]
                {
                    indices[i] = (base + i) as u32;
                }
                for (lanes, &value) in components.iter_mut().zip(point) {
                    lanes[i] = value;
                }
            }
            chunks.push((u32x8::new(indices), components.map(f32x8::new)));
        }

        Self { palette, chunks }
    }

    /// Returns the index and point of the palette entry nearest to `point`.
    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub(crate) fn nearest(&self, point: [f32; 4]) -> (u8, [f32; 4]) {
        let p = point.map(f32x8::splat);
        let weights = CHANNEL_WEIGHTS.map(f32x8::splat);

        let mut min_index = u32x8::splat(0);
        let mut min_distance = f32x8::splat(f32::INFINITY);
        for &(indices, chunk) in &self.chunks {
            let mut distance = f32x8::splat(0.0);
            for c in 0..4 {
                let diff = p[c] - chunk[c];
                distance += weights[c] * diff * diff;
            }

            // A strict comparison keeps the earlier chunk on equal distance,
            // so each lane holds its lowest tying index.
            let mask = u32x8::new(distance.cmp_lt(min_distance).to_array().map(f32::to_bits));
            min_index = mask.blend(indices, min_index);
            min_distance = min_distance.fast_min(distance);

            if min_distance.as_array_ref().contains(&0.0) {
                break;
            }
        }

        // Lexicographic reduction: among lanes with the minimal distance,
        // the lowest index wins.
        let mut best = (OrderedFloat(f32::INFINITY), u32::MAX);
        for (&dist, &index) in min_distance
            .as_array_ref()
            .iter()
            .zip(min_index.as_array_ref())
        {
            best = best.min((OrderedFloat(dist), index));
        }

        #[allow(clippy::cast_possible_truncation)]
        let index = best.1 as u8;
        (index, self.palette[usize::from(index)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::from_channels;
    use crate::tests::test_colors;

    #[test]
    fn empty_palette_is_rejected() {
        let color = from_channels([1, 2, 3, 4]);
        assert_eq!(nearest(color, &[]), Err(Error::EmptyPalette));
    }

    #[test]
    fn oversized_palette_is_rejected() {
        let palette = test_colors(MAX_K + 1);
        let color = from_channels([0; 4]);
        assert_eq!(nearest(color, &palette), Err(Error::PaletteTooLarge(MAX_K + 1)));
    }

    #[test]
    fn exact_entry_has_zero_distance() {
        let palette = test_colors(64);
        for &color in &palette {
            #[allow(clippy::unwrap_used)]
            let (_, found) = nearest(color, &palette).unwrap();
            assert_eq!(found, color);
            assert_eq!(distance(color, found), 0.0);
        }
    }

    #[test]
    fn ties_break_to_lowest_index() {
        let a = from_channels([100, 200, 300, 400]);
        let b = from_channels([500, 600, 700, 800]);
        // Duplicate entries tie exactly; the first occurrence must win.
        let palette = [b, a, b, a];
        #[allow(clippy::unwrap_used)]
        let (index, found) = nearest(a, &palette).unwrap();
        assert_eq!((index, found), (1, a));
        #[allow(clippy::unwrap_used)]
        let (index, _) = nearest(b, &palette).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn distance_is_normalized() {
        let black = from_channels([0, 0, 0, 0]);
        let white = from_channels([0xFFFF; 4]);
        #[allow(clippy::float_cmp)]
        {
            assert_eq!(distance(black, black), 0.0);
            assert_eq!(distance(black, white), 1.0);
        }
        let mid = from_channels([0x8000, 0x1234, 0, 0xFFFF]);
        let d = distance(black, mid);
        assert!(d > 0.0 && d < 1.0);
    }

    #[test]
    fn table_matches_scalar_scan() {
        // A non-multiple of 8 exercises the padded remainder chunk.
        let palette = test_colors(249);
        let points = test_colors(1024);

        let table = MatchTable::new(&palette);
        for &color in &points {
            #[allow(clippy::unwrap_used)]
            let expected = nearest(color, &palette).unwrap();
            let (index, point) = table.nearest(to_point(color));
            assert_eq!(index, expected.0);
            assert_eq!(point, to_point(expected.1));
        }
    }

    #[test]
    fn table_ties_break_to_lowest_index() {
        let colors = test_colors(16);
        // Each color appears twice, 16 apart; matches must report the first copy.
        let palette = [colors.as_slice(), colors.as_slice()].concat();
        let table = MatchTable::new(&palette);
        for (i, &color) in colors.iter().enumerate() {
            let (index, _) = table.nearest(to_point(color));
            #[allow(clippy::cast_possible_truncation)]
            {
                assert_eq!(index, i as u8);
            }
        }
    }
}
