//! Palette construction by iterative median-cut partitioning.
//!
//! The color space is carved by repeatedly splitting the cluster with the
//! largest single-channel extent at its median, until the requested number of
//! clusters exists or no cluster can be split further. Each final cluster
//! contributes one palette entry, the per-channel mean of its points, and the
//! palette is emitted in cluster creation order.

use crate::{from_channels, PaletteSize, PixelSource, QuantizeOutput};
#[cfg(feature = "threads")]
use rayon::prelude::*;
use std::{cmp::Ordering, collections::BinaryHeap};

/// A pixel as raw channel values in `[R, G, B, A]` order.
type Point = [u16; 4];

/// Sorts points so each range of identical colors is contiguous.
///
/// The primary key is the given channel; the full point is the secondary key,
/// which both groups identical colors into blocks and makes the order
/// independent of the input permutation within a cluster.
fn sort_points(points: &mut [Point], channel: usize) {
    points.sort_unstable_by_key(|p| (p[channel], *p));
}

/// Parallel [`sort_points`]. The sort key is total, so the result is
/// identical to the sequential sort.
#[cfg(feature = "threads")]
fn par_sort_points(points: &mut [Point], channel: usize) {
    points.par_sort_unstable_by_key(|p| (p[channel], *p));
}

/// A contiguous range of points forming one cluster.
#[derive(Debug, Clone, Copy)]
struct Cluster {
    /// The start of the cluster's range in the shared point buffer.
    start: usize,
    /// The end (exclusive) of the cluster's range.
    end: usize,
    /// The channel with the largest value spread within the range.
    widest: usize,
    /// The value spread of the widest channel. Zero means all points are
    /// identical and the cluster can never be split.
    extent: u16,
    /// The creation sequence number; determines palette emission order.
    seq: u32,
}

impl Cluster {
    /// Measures the given range and records its widest channel.
    fn new(start: usize, end: usize, seq: u32, points: &[Point]) -> Self {
        let mut lo = [u16::MAX; 4];
        let mut hi = [u16::MIN; 4];
        for p in &points[start..end] {
            for c in 0..4 {
                lo[c] = lo[c].min(p[c]);
                hi[c] = hi[c].max(p[c]);
            }
        }

        let mut widest = 0;
        let mut extent = 0;
        for c in 0..4 {
            let spread = hi[c] - lo[c];
            if spread > extent {
                extent = spread;
                widest = c;
            }
        }

        Self { start, end, widest, extent, seq }
    }

    /// The number of points in the cluster.
    fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the cluster spans more than one distinct color.
    fn splittable(&self) -> bool {
        self.extent > 0
    }

    /// The per-channel mean of the cluster's points, rounded to nearest.
    fn representative(&self, points: &[Point]) -> Point {
        let mut sums = [0u64; 4];
        for p in &points[self.start..self.end] {
            for c in 0..4 {
                sums[c] += u64::from(p[c]);
            }
        }
        let n = self.len() as u64;
        #[allow(clippy::cast_possible_truncation)]
        {
            sums.map(|sum| ((sum + n / 2) / n) as u16)
        }
    }
}

/// Clusters are ranked by extent, with ties going to the oldest cluster.
impl Ord for Cluster {
    fn cmp(&self, other: &Self) -> Ordering {
        self.extent
            .cmp(&other.extent)
            .then(other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Cluster {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Cluster {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cluster {}

/// Splits a cluster at its median into two nonempty halves.
///
/// The range is sorted along the widest channel, and the midpoint is then
/// moved to the nearest block boundary so identical colors never straddle the
/// cut. A boundary exists on at least one side because the extent is nonzero.
fn split(
    cluster: Cluster,
    points: &mut [Point],
    seq: u32,
    sort: fn(&mut [Point], usize),
) -> (Cluster, Cluster) {
    let Cluster { start, end, widest, .. } = cluster;
    debug_assert!(cluster.splittable());

    sort(&mut points[start..end], widest);

    let mid = start + cluster.len() / 2;
    let mut lower = mid;
    while lower > start && points[lower - 1] == points[lower] {
        lower -= 1;
    }
    let mut upper = mid;
    while upper < end && points[upper - 1] == points[upper] {
        upper += 1;
    }

    let mid = if lower == start {
        upper
    } else if upper == end || mid - lower <= upper - mid {
        lower
    } else {
        upper
    };
    debug_assert!(start < mid && mid < end);

    (
        Cluster::new(start, mid, seq, points),
        Cluster::new(mid, end, seq + 1, points),
    )
}

/// Runs the worklist loop over a materialized point buffer.
fn build(mut points: Vec<Point>, k: PaletteSize, sort: fn(&mut [Point], usize)) -> QuantizeOutput {
    if points.is_empty() {
        return QuantizeOutput::default();
    }

    let k = k.as_usize();
    let mut heap = BinaryHeap::new();
    let mut leaves = Vec::new();

    let root = Cluster::new(0, points.len(), 0, &points);
    if root.splittable() {
        heap.push(root);
    } else {
        leaves.push(root);
    }

    let mut next_seq = 1;
    while heap.len() + leaves.len() < k {
        let Some(cluster) = heap.pop() else { break };

        let (left, right) = split(cluster, &mut points, next_seq, sort);
        next_seq += 2;
        for child in [left, right] {
            if child.splittable() {
                heap.push(child);
            } else {
                leaves.push(child);
            }
        }
    }

    let mut clusters = leaves;
    clusters.extend(heap);
    clusters.sort_unstable_by_key(|cluster| cluster.seq);

    let palette = clusters
        .iter()
        .map(|cluster| from_channels(cluster.representative(&points)))
        .collect();
    #[allow(clippy::cast_possible_truncation)]
    let counts = clusters.iter().map(|cluster| cluster.len() as u32).collect();
    QuantizeOutput { palette, counts }
}

/// Builds a palette of at most `k` colors for the given source.
///
/// The palette has fewer than `k` entries when the source has fewer than `k`
/// distinct colors; entries are never duplicated to pad the requested size.
/// A zero-area source yields an empty output.
#[must_use]
pub fn palette(source: &impl PixelSource, k: PaletteSize) -> QuantizeOutput {
    let mut points = Vec::with_capacity(source.num_pixels());
    for y in 0..source.height() {
        for x in 0..source.width() {
            points.push(source.rgba(x, y));
        }
    }
    build(points, k, sort_points)
}

/// Parallel version of [`palette`].
///
/// Point collection and intra-cluster sorting run on the rayon thread pool;
/// the split order itself is sequential, so the output is byte-identical to
/// the sequential version.
#[cfg(feature = "threads")]
#[must_use]
pub fn palette_par(source: &(impl PixelSource + Sync), k: PaletteSize) -> QuantizeOutput {
    let width = source.width();
    let points = (0..source.height())
        .into_par_iter()
        .flat_map_iter(|y| (0..width).map(move |x| source.rgba(x, y)))
        .collect();
    build(points, k, par_sort_points)
}
