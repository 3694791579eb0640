use std::ops::Range;

use crate::error::{ChartError, Result};

/// Largest marker size produced by [`normalize_sizes`] for bubble charts.
pub const BUBBLE_SIZE_MAX: f64 = 20.0;

/// Scale values so the largest maps to `k`: `size[i] = v[i] / max(v) * k`.
///
/// A non-positive maximum, or any non-finite value, has no meaningful scale
/// and is rejected rather than producing NaN or infinite sizes.
pub fn normalize_sizes(values: &[f64], k: f64) -> Result<Vec<f64>> {
    if let Some(&bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(ChartError::DegenerateScale { max: bad });
    }
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max <= 0.0 {
        return Err(ChartError::DegenerateScale {
            max: if values.is_empty() { 0.0 } else { max },
        });
    }
    Ok(values.iter().map(|v| v * k / max).collect())
}

/// Min/max of the finite values in a sequence, `None` when there are none.
pub fn extent(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().copied().filter(|v| v.is_finite()).fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Widen a range by 5% on each side, or by one unit around a single value.
pub fn pad_range(min: f64, max: f64) -> Range<f64> {
    if min == max {
        (min - 1.0)..(max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        if !padding.is_finite() {
            return min..max;
        }
        (min - padding)..(max + padding)
    }
}

/// Padded axis range over the finite values of a sequence; `-1..1` when
/// there are none.
pub fn axis_range(values: &[f64]) -> Range<f64> {
    match extent(values) {
        Some((lo, hi)) => pad_range(lo, hi),
        None => -1.0..1.0,
    }
}

/// Position of `v` within `[lo, hi]`, clamped to `0..=1`.
pub fn unit_position(v: f64, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        ((v - lo) / (hi - lo)).clamp(0.0, 1.0)
    } else {
        0.5
    }
}

/// Result of binning (x, y) pairs with Z as weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Bins2d {
    pub x_edges: Vec<f64>,
    pub y_edges: Vec<f64>,
    /// `sums[i][j]` covers `y_edges[i]..y_edges[i+1]` by `x_edges[j]..x_edges[j+1]`.
    pub sums: Vec<Vec<f64>>,
}

fn edges(lo: f64, hi: f64, bins: usize) -> Vec<f64> {
    let (lo, hi) = if lo == hi { (lo - 0.5, hi + 0.5) } else { (lo, hi) };
    let step = (hi - lo) / bins as f64;
    (0..=bins).map(|i| lo + step * i as f64).collect()
}

fn bin_index(v: f64, lo: f64, hi: f64, bins: usize) -> usize {
    let t = unit_position(v, lo, hi);
    ((t * bins as f64) as usize).min(bins - 1)
}

/// Sum Z into an equal-width `bins` x `bins` grid over the X/Y extents.
/// The upper edge is inclusive.
pub fn bin2d(x: &[f64], y: &[f64], z: &[f64], bins: usize) -> Bins2d {
    let bins = bins.max(1);
    let (x_lo, x_hi) = extent(x).unwrap_or((0.0, 1.0));
    let (y_lo, y_hi) = extent(y).unwrap_or((0.0, 1.0));
    let x_edges = edges(x_lo, x_hi, bins);
    let y_edges = edges(y_lo, y_hi, bins);

    let mut sums = vec![vec![0.0; bins]; bins];
    for ((&xv, &yv), &zv) in x.iter().zip(y).zip(z) {
        let col = bin_index(xv, x_edges[0], x_edges[bins], bins);
        let row = bin_index(yv, y_edges[0], y_edges[bins], bins);
        sums[row][col] += zv;
    }

    Bins2d { x_edges, y_edges, sums }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_sizes() {
        let sizes = normalize_sizes(&[2.0, 4.0, 10.0], 20.0).unwrap();
        assert_eq!(sizes, vec![4.0, 8.0, 20.0]);
    }

    #[test]
    fn test_normalize_sizes_all_zero() {
        let err = normalize_sizes(&[0.0, 0.0, 0.0], BUBBLE_SIZE_MAX).unwrap_err();
        assert!(matches!(err, ChartError::DegenerateScale { max } if max == 0.0));
    }

    #[test]
    fn test_normalize_sizes_negative_max() {
        assert!(matches!(
            normalize_sizes(&[-3.0, -1.0], BUBBLE_SIZE_MAX),
            Err(ChartError::DegenerateScale { .. })
        ));
    }

    #[test]
    fn test_normalize_sizes_infinite_max() {
        assert!(matches!(
            normalize_sizes(&[1.0, f64::INFINITY], BUBBLE_SIZE_MAX),
            Err(ChartError::DegenerateScale { .. })
        ));
    }

    #[test]
    fn test_normalize_sizes_rejects_nan() {
        assert!(matches!(
            normalize_sizes(&[f64::NAN, 4.0, 10.0], BUBBLE_SIZE_MAX),
            Err(ChartError::DegenerateScale { .. })
        ));
        assert!(matches!(
            normalize_sizes(&[f64::NEG_INFINITY, 4.0], BUBBLE_SIZE_MAX),
            Err(ChartError::DegenerateScale { .. })
        ));
    }

    #[test]
    fn test_axis_range_skips_non_finite() {
        assert_eq!(axis_range(&[0.0, f64::INFINITY, 10.0]), -0.5..10.5);
        assert_eq!(axis_range(&[f64::NAN, f64::NEG_INFINITY]), -1.0..1.0);
        assert_eq!(extent(&[f64::NAN, 2.0]), Some((2.0, 2.0)));
    }

    #[test]
    fn test_normalize_sizes_empty() {
        assert!(matches!(
            normalize_sizes(&[], BUBBLE_SIZE_MAX),
            Err(ChartError::DegenerateScale { max }) if max == 0.0
        ));
    }

    #[test]
    fn test_extent_and_padding() {
        assert_eq!(extent(&[3.0, -1.0, 2.0]), Some((-1.0, 3.0)));
        assert_eq!(extent(&[]), None);
        assert_eq!(pad_range(5.0, 5.0), 4.0..6.0);
        let r = pad_range(0.0, 10.0);
        assert_eq!(r, -0.5..10.5);
        assert_eq!(axis_range(&[]), -1.0..1.0);
    }

    #[test]
    fn test_unit_position() {
        assert_eq!(unit_position(5.0, 0.0, 10.0), 0.5);
        assert_eq!(unit_position(-5.0, 0.0, 10.0), 0.0);
        assert_eq!(unit_position(3.0, 3.0, 3.0), 0.5);
    }

    #[test]
    fn test_bin2d_sums_weights() {
        let x = [0.0, 0.1, 1.0, 1.0];
        let y = [0.0, 0.1, 1.0, 0.0];
        let z = [1.0, 2.0, 3.0, 4.0];
        let bins = bin2d(&x, &y, &z, 2);
        assert_eq!(bins.x_edges, vec![0.0, 0.5, 1.0]);
        assert_eq!(bins.sums, vec![vec![3.0, 4.0], vec![0.0, 3.0]]);
    }

    #[test]
    fn test_bin2d_single_point() {
        let bins = bin2d(&[2.0], &[2.0], &[7.0], 3);
        let total: f64 = bins.sums.iter().flatten().sum();
        assert_eq!(total, 7.0);
        assert_eq!(bins.x_edges.len(), 4);
    }
}
