use ordered_float::OrderedFloat;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::error::{ChartError, Result};
use crate::ir::Grid;

/// Reshape parallel X, Y, Z sequences into a grid over the sorted distinct
/// X (columns) and Y (rows) values.
///
/// Repeated `(x, y)` pairs are accepted only when their Z agrees. Every
/// cell of the cross product must be covered by some row.
pub fn pivot(x: &[f64], y: &[f64], z: &[f64]) -> Result<Grid> {
    debug_assert!(x.len() == y.len() && y.len() == z.len());

    let mut cells: BTreeMap<(OrderedFloat<f64>, OrderedFloat<f64>), f64> = BTreeMap::new();
    let mut xs = BTreeSet::new();
    let mut ys = BTreeSet::new();

    for ((&xv, &yv), &zv) in x.iter().zip(y).zip(z) {
        let key = (OrderedFloat(xv), OrderedFloat(yv));
        xs.insert(key.0);
        ys.insert(key.1);

        if let Some(&existing) = cells.get(&key) {
            if existing != zv {
                return Err(ChartError::AmbiguousPivot {
                    x: xv,
                    y: yv,
                    first: existing,
                    second: zv,
                });
            }
        } else {
            cells.insert(key, zv);
        }
    }

    let mut grid = Vec::with_capacity(ys.len());
    for &yv in &ys {
        let mut row = Vec::with_capacity(xs.len());
        for &xv in &xs {
            let value = cells.get(&(xv, yv)).ok_or(ChartError::SparsePivot {
                x: xv.into_inner(),
                y: yv.into_inner(),
            })?;
            row.push(*value);
        }
        grid.push(row);
    }

    debug!(rows = ys.len(), cols = xs.len(), "pivoted grid");

    Ok(Grid {
        x: xs.into_iter().map(OrderedFloat::into_inner).collect(),
        y: ys.into_iter().map(OrderedFloat::into_inner).collect(),
        z: grid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pivot_full_grid() {
        // Rows arrive unsorted; output axes are sorted.
        let x = [2.0, 1.0, 2.0, 1.0];
        let y = [10.0, 10.0, 20.0, 20.0];
        let z = [3.0, 1.0, 4.0, 2.0];
        let grid = pivot(&x, &y, &z).unwrap();
        assert_eq!(grid.x, vec![1.0, 2.0]);
        assert_eq!(grid.y, vec![10.0, 20.0]);
        assert_eq!(grid.z, vec![vec![1.0, 3.0], vec![2.0, 4.0]]);
        assert_eq!(grid.shape(), (2, 2));
    }

    #[test]
    fn test_pivot_non_square() {
        let x = [1.0, 2.0, 3.0, 1.0, 2.0, 3.0];
        let y = [0.0, 0.0, 0.0, 5.0, 5.0, 5.0];
        let z = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let grid = pivot(&x, &y, &z).unwrap();
        assert_eq!(grid.shape(), (2, 3));
        assert_eq!(grid.z[1], vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_pivot_conflicting_duplicate() {
        let x = [1.0, 1.0];
        let y = [1.0, 1.0];
        let z = [5.0, 6.0];
        let err = pivot(&x, &y, &z).unwrap_err();
        assert!(matches!(
            err,
            ChartError::AmbiguousPivot { first, second, .. } if first == 5.0 && second == 6.0
        ));
    }

    #[test]
    fn test_pivot_identical_duplicate_is_accepted() {
        let x = [1.0, 1.0, 2.0];
        let y = [1.0, 1.0, 1.0];
        let z = [5.0, 5.0, 7.0];
        let grid = pivot(&x, &y, &z).unwrap();
        assert_eq!(grid.z, vec![vec![5.0, 7.0]]);
    }

    #[test]
    fn test_pivot_missing_cell() {
        let x = [1.0, 2.0, 1.0];
        let y = [1.0, 1.0, 2.0];
        let z = [1.0, 2.0, 3.0];
        let err = pivot(&x, &y, &z).unwrap_err();
        assert!(matches!(err, ChartError::SparsePivot { x, y } if x == 2.0 && y == 2.0));
    }

    #[test]
    fn test_pivot_empty_input() {
        let grid = pivot(&[], &[], &[]).unwrap();
        assert_eq!(grid.shape(), (0, 0));
    }

    proptest! {
        #[test]
        fn pivot_recovers_every_cell(nx in 1usize..6, ny in 1usize..6, seed in 0u64..1000) {
            let mut x = Vec::new();
            let mut y = Vec::new();
            let mut z = Vec::new();
            // Walk the cross product backwards so the input is not pre-sorted.
            for j in (0..ny).rev() {
                for i in (0..nx).rev() {
                    x.push(i as f64 * 1.5);
                    y.push(j as f64 - 2.0);
                    z.push((seed + (j * nx + i) as u64) as f64);
                }
            }
            let grid = pivot(&x, &y, &z).unwrap();
            prop_assert_eq!(grid.shape(), (ny, nx));
            for j in 0..ny {
                for i in 0..nx {
                    prop_assert_eq!(grid.z[j][i], (seed + (j * nx + i) as u64) as f64);
                }
            }
        }

        #[test]
        fn pivot_rejects_any_removed_cell(nx in 2usize..5, ny in 2usize..5, drop in 0usize..25) {
            let drop = drop % (nx * ny);
            let mut x = Vec::new();
            let mut y = Vec::new();
            let mut z = Vec::new();
            for j in 0..ny {
                for i in 0..nx {
                    if j * nx + i == drop {
                        continue;
                    }
                    x.push(i as f64);
                    y.push(j as f64);
                    z.push(1.0);
                }
            }
            let is_sparse = matches!(pivot(&x, &y, &z), Err(ChartError::SparsePivot { .. }));
            prop_assert!(is_sparse);
        }
    }
}
