//! Error-diffusion kernel tables and the named-kernel registry.

use crate::Error;
use std::collections::BTreeMap;

/// A single diffusion target: a share of the residual error and the offset,
/// relative to the current pixel, of the neighbor that receives it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelEntry {
    /// The fraction of the residual error diffused to the target pixel.
    pub weight: f32,
    /// The column offset of the target pixel.
    pub dx: i32,
    /// The row offset of the target pixel.
    pub dy: i32,
}

/// An ordered sequence of diffusion targets describing how residual
/// quantization error propagates to neighboring pixels.
///
/// Every entry satisfies `dy > 0`, or `dy == 0` with `dx > 0`, so a kernel can
/// never touch a pixel already finalized by the raster-order pass. The empty
/// kernel ([`Kernel::none`]) diffuses nothing and encodes "no dithering".
///
/// # Weight sums
/// A kernel that conserves error energy has weights summing to `1.0`.
/// The builtin tables all do, with one deliberate exception: Atkinson
/// diffuses only `6/8` of the error, which is part of its look and is kept
/// as published rather than rescaled.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Kernel {
    /// The diffusion targets in application order.
    entries: Vec<KernelEntry>,
}

impl Kernel {
    /// The empty kernel: no error is diffused, reducing the dither pass to
    /// plain nearest-color mapping.
    #[must_use]
    pub fn none() -> Self {
        Self { entries: Vec::new() }
    }

    /// Creates a kernel from `(weight, dx, dy)` triples.
    ///
    /// # Errors
    /// Returns [`Error::InvalidKernelOffset`] if any triple targets a pixel at
    /// or before the current one in raster order.
    pub fn from_entries(triples: &[(f32, i32, i32)]) -> Result<Self, Error> {
        let mut entries = Vec::with_capacity(triples.len());
        for &(weight, dx, dy) in triples {
            if dy < 0 || (dy == 0 && dx <= 0) {
                return Err(Error::InvalidKernelOffset { dx, dy });
            }
            entries.push(KernelEntry { weight, dx, dy });
        }
        Ok(Self { entries })
    }

    /// Creates a kernel from a row-based filter matrix.
    ///
    /// `rows[0]` is the current pixel's row and `origin` is the current pixel's
    /// column within it; each cell's weight diffuses to the pixel at
    /// `(column - origin, row)`. Zero-weight cells are skipped.
    ///
    /// # Errors
    /// Returns [`Error::InvalidKernelOffset`] if a nonzero weight lands on the
    /// current pixel or any pixel before it in raster order.
    pub fn from_matrix<R: AsRef<[f32]>>(rows: &[R], origin: usize) -> Result<Self, Error> {
        let mut triples = Vec::new();
        for (row, cols) in rows.iter().enumerate() {
            for (col, &weight) in cols.as_ref().iter().enumerate() {
                if weight != 0.0 {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                    let dx = col as i32 - origin as i32;
                    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                    let dy = row as i32;
                    triples.push((weight, dx, dy));
                }
            }
        }
        Self::from_entries(&triples)
    }

    /// The diffusion targets in application order.
    #[must_use]
    pub fn entries(&self) -> &[KernelEntry] {
        &self.entries
    }

    /// Whether this kernel diffuses nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The sum of all entry weights.
    ///
    /// For an energy-conserving kernel this is `1.0` (up to rounding).
    #[must_use]
    pub fn weight_sum(&self) -> f32 {
        self.entries.iter().map(|e| e.weight).sum()
    }
}

/// Builds a kernel from triples known to be valid at compile time.
fn table(triples: &[(f32, i32, i32)]) -> Kernel {
    let entries = triples
        .iter()
        .map(|&(weight, dx, dy)| {
            debug_assert!(dy > 0 || (dy == 0 && dx > 0));
            KernelEntry { weight, dx, dy }
        })
        .collect();
    Kernel { entries }
}

/// Floyd–Steinberg: the classic four-target kernel.
fn floyd_steinberg() -> Kernel {
    table(&[
        (7.0 / 16.0, 1, 0),
        (3.0 / 16.0, -1, 1),
        (5.0 / 16.0, 0, 1),
        (1.0 / 16.0, 1, 1),
    ])
}

/// Jarvis, Judice & Ninke: a wide three-row kernel.
fn jarvis_judice_ninke() -> Kernel {
    table(&[
        (7.0 / 48.0, 1, 0),
        (5.0 / 48.0, 2, 0),
        (3.0 / 48.0, -2, 1),
        (5.0 / 48.0, -1, 1),
        (7.0 / 48.0, 0, 1),
        (5.0 / 48.0, 1, 1),
        (3.0 / 48.0, 2, 1),
        (1.0 / 48.0, -2, 2),
        (3.0 / 48.0, -1, 2),
        (5.0 / 48.0, 0, 2),
        (3.0 / 48.0, 1, 2),
        (1.0 / 48.0, 2, 2),
    ])
}

/// Burkes: two rows, power-of-two weights.
fn burkes() -> Kernel {
    table(&[
        (8.0 / 32.0, 1, 0),
        (4.0 / 32.0, 2, 0),
        (2.0 / 32.0, -2, 1),
        (4.0 / 32.0, -1, 1),
        (8.0 / 32.0, 0, 1),
        (4.0 / 32.0, 1, 1),
        (2.0 / 32.0, 2, 1),
    ])
}

/// Stucki: like Jarvis but with power-of-two weights.
fn stucki() -> Kernel {
    table(&[
        (8.0 / 42.0, 1, 0),
        (4.0 / 42.0, 2, 0),
        (2.0 / 42.0, -2, 1),
        (4.0 / 42.0, -1, 1),
        (8.0 / 42.0, 0, 1),
        (4.0 / 42.0, 1, 1),
        (2.0 / 42.0, 2, 1),
        (1.0 / 42.0, -2, 2),
        (2.0 / 42.0, -1, 2),
        (4.0 / 42.0, 0, 2),
        (2.0 / 42.0, 1, 2),
        (1.0 / 42.0, 2, 2),
    ])
}

/// Three-row Sierra.
fn sierra_3() -> Kernel {
    table(&[
        (5.0 / 32.0, 1, 0),
        (3.0 / 32.0, 2, 0),
        (2.0 / 32.0, -2, 1),
        (4.0 / 32.0, -1, 1),
        (5.0 / 32.0, 0, 1),
        (4.0 / 32.0, 1, 1),
        (2.0 / 32.0, 2, 1),
        (2.0 / 32.0, -1, 2),
        (3.0 / 32.0, 0, 2),
        (2.0 / 32.0, 1, 2),
    ])
}

/// Two-row Sierra.
fn sierra_2() -> Kernel {
    table(&[
        (4.0 / 16.0, 1, 0),
        (3.0 / 16.0, 2, 0),
        (1.0 / 16.0, -2, 1),
        (2.0 / 16.0, -1, 1),
        (3.0 / 16.0, 0, 1),
        (2.0 / 16.0, 1, 1),
        (1.0 / 16.0, 2, 1),
    ])
}

/// Sierra Lite: three targets, cheapest of the family.
fn sierra_lite() -> Kernel {
    table(&[(2.0 / 4.0, 1, 0), (1.0 / 4.0, -1, 1), (1.0 / 4.0, 0, 1)])
}

/// Atkinson: six equal shares of `1/8`, diffusing only `6/8` of the error.
fn atkinson() -> Kernel {
    table(&[
        (1.0 / 8.0, 1, 0),
        (1.0 / 8.0, 2, 0),
        (1.0 / 8.0, -1, 1),
        (1.0 / 8.0, 0, 1),
        (1.0 / 8.0, 1, 1),
        (1.0 / 8.0, 0, 2),
    ])
}

/// An immutable mapping from kernel name to diffusion kernel.
///
/// A registry is constructed once and handed to the [`Pipeline`](crate::Pipeline)
/// explicitly; there is no process-wide kernel state. Lookup is
/// case-insensitive and treats `_` and `-` as equivalent.
///
/// # Examples
/// ```
/// # use dithercut::KernelRegistry;
/// let registry = KernelRegistry::builtin();
/// assert!(registry.get("Floyd_Steinberg").is_some());
/// assert!(registry.get("sierra-3").is_some());
/// assert!(registry.get("bayer").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct KernelRegistry {
    /// The registered kernels, keyed by normalized name.
    kernels: BTreeMap<String, Kernel>,
}

/// Normalizes a kernel name for lookup.
fn normalize(name: &str) -> String {
    name.to_ascii_lowercase().replace('_', "-")
}

impl KernelRegistry {
    /// Creates a registry with all builtin kernels registered:
    /// `floyd-steinberg`, `jarvis-judice-ninke`, `burkes`, `stucki`,
    /// `sierra-3`, `sierra-2`, `sierra-lite`, `atkinson`, and `none`
    /// (the empty kernel, which disables diffusion).
    #[must_use]
    pub fn builtin() -> Self {
        let registry = Self { kernels: BTreeMap::new() };
        registry
            .with("floyd-steinberg", floyd_steinberg())
            .with("jarvis-judice-ninke", jarvis_judice_ninke())
            .with("burkes", burkes())
            .with("stucki", stucki())
            .with("sierra-3", sierra_3())
            .with("sierra-2", sierra_2())
            .with("sierra-lite", sierra_lite())
            .with("atkinson", atkinson())
            .with("none", Kernel::none())
    }

    /// Creates a registry with no kernels registered.
    #[must_use]
    pub fn empty() -> Self {
        Self { kernels: BTreeMap::new() }
    }

    /// Returns a registry with `kernel` registered under `name`,
    /// replacing any existing kernel with the same normalized name.
    #[must_use]
    pub fn with(mut self, name: &str, kernel: Kernel) -> Self {
        self.kernels.insert(normalize(name), kernel);
        self
    }

    /// Looks up a kernel by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Kernel> {
        self.kernels.get(&normalize(name))
    }

    /// Looks up a kernel by name, failing with [`Error::UnknownKernel`].
    pub fn resolve(&self, name: &str) -> Result<&Kernel, Error> {
        self.get(name)
            .ok_or_else(|| Error::UnknownKernel(name.to_owned()))
    }

    /// The registered kernel names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kernels.keys().map(String::as_str)
    }
}

impl Default for KernelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Weight-sum tolerance for the energy check.
    const EPSILON: f32 = 1e-3;

    #[test]
    fn builtin_kernels_conserve_energy() {
        let registry = KernelRegistry::builtin();
        for name in registry.names() {
            let sum = registry.get(name).map_or(0.0, Kernel::weight_sum);
            match name {
                // The empty kernel diffuses nothing.
                "none" => assert_eq!(sum, 0.0),
                // Atkinson deliberately diffuses 6/8 of the error.
                "atkinson" => assert!((sum - 0.75).abs() < EPSILON, "{name}: {sum}"),
                _ => assert!((sum - 1.0).abs() < EPSILON, "{name}: {sum}"),
            }
        }
    }

    #[test]
    fn offsets_never_revisit_finalized_pixels() {
        let registry = KernelRegistry::builtin();
        for name in registry.names() {
            let kernel = registry.get(name).cloned().unwrap_or_default();
            for entry in kernel.entries() {
                assert!(
                    entry.dy > 0 || (entry.dy == 0 && entry.dx > 0),
                    "{name}: ({}, {})",
                    entry.dx,
                    entry.dy,
                );
            }
        }
    }

    #[test]
    fn lookup_is_normalized() {
        let registry = KernelRegistry::builtin();
        assert_eq!(registry.get("Floyd_Steinberg"), registry.get("floyd-steinberg"));
        assert!(registry.get("floyd-steinberg").is_some());
        assert_eq!(
            registry.resolve("bayer"),
            Err(Error::UnknownKernel("bayer".to_owned()))
        );
    }

    #[test]
    fn from_entries_rejects_backward_offsets() {
        assert_eq!(
            Kernel::from_entries(&[(0.5, -1, 0)]),
            Err(Error::InvalidKernelOffset { dx: -1, dy: 0 })
        );
        assert_eq!(
            Kernel::from_entries(&[(0.5, 0, 0)]),
            Err(Error::InvalidKernelOffset { dx: 0, dy: 0 })
        );
        assert_eq!(
            Kernel::from_entries(&[(0.5, 1, -1)]),
            Err(Error::InvalidKernelOffset { dx: 1, dy: -1 })
        );
    }

    #[test]
    fn from_matrix_transposes_to_triples() {
        // Floyd–Steinberg as a row-based filter grid with the origin at column 1.
        let rows = [
            vec![0.0, 0.0, 7.0 / 16.0],
            vec![3.0 / 16.0, 5.0 / 16.0, 1.0 / 16.0],
        ];
        #[allow(clippy::unwrap_used)]
        let kernel = Kernel::from_matrix(&rows, 1).unwrap();
        let expected = floyd_steinberg();
        assert_eq!(kernel.entries().len(), expected.entries().len());
        for entry in expected.entries() {
            assert!(
                kernel.entries().contains(entry),
                "missing ({}, {})",
                entry.dx,
                entry.dy,
            );
        }
    }

    #[test]
    fn from_matrix_rejects_weight_on_finalized_pixels() {
        let rows = [vec![0.5, 0.5]];
        assert_eq!(
            Kernel::from_matrix(&rows, 1),
            Err(Error::InvalidKernelOffset { dx: -1, dy: 0 })
        );
    }
}
