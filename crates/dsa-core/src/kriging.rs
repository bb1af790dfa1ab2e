//! Ordinary kriging with an exponential variogram.
//!
//! The variogram is fitted from the samples themselves: the sill is the
//! sample variance and the practical range is the largest pairwise distance.
//! That is crude but needs no external fitting step, and the estimate is an
//! exact interpolator at the sample locations.

use crate::geometry::Point;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum KrigingError {
    #[error("kriging needs at least one sample")]
    NoSamples,
    #[error("kriging system is singular")]
    Singular,
    #[error("non-finite sample value")]
    NonFinite,
}

/// Exponential variogram `nugget + sill * (1 - exp(-3h / range))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Variogram {
    pub nugget: f64,
    pub sill: f64,
    pub range: f64,
}

impl Variogram {
    pub fn gamma(&self, h: f64) -> f64 {
        if h <= 0.0 {
            return 0.0;
        }
        self.nugget + self.sill * (1.0 - (-3.0 * h / self.range).exp())
    }

    /// Fit sill and range from the samples.
    pub fn fit(points: &[Point], values: &[f64]) -> Option<Self> {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let sill = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let mut range: f64 = 0.0;
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                range = range.max(a.distance(b));
            }
        }
        // rounding noise around a constant field is treated as constant
        if sill <= f64::EPSILON * mean.abs().max(1.0).powi(2) || range <= 0.0 {
            return None;
        }
        Some(Self {
            nugget: 0.0,
            sill,
            range,
        })
    }
}

/// Ordinary kriging estimate at `target`.
pub fn ordinary_kriging(points: &[Point], values: &[f64], target: Point) -> Result<f64, KrigingError> {
    let n = values.len();
    if n == 0 || points.len() != n {
        return Err(KrigingError::NoSamples);
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(KrigingError::NonFinite);
    }
    if let Some(i) = points.iter().position(|p| *p == target) {
        return Ok(values[i]);
    }
    let variogram = match Variogram::fit(points, values) {
        Some(v) => v,
        // constant field or all samples stacked on one point
        None => return Ok(values.iter().sum::<f64>() / n as f64),
    };

    // [ G  1 ] [w ]   [g0]
    // [ 1' 0 ] [mu] = [1 ]
    let size = n + 1;
    let mut a = vec![vec![0.0; size + 1]; size];
    for i in 0..n {
        for j in 0..n {
            a[i][j] = variogram.gamma(points[i].distance(&points[j]));
        }
        a[i][n] = 1.0;
        a[n][i] = 1.0;
        a[i][size] = variogram.gamma(points[i].distance(&target));
    }
    a[n][size] = 1.0;

    let weights = solve_augmented(a)?;
    Ok(weights[..n].iter().zip(values).map(|(w, v)| w * v).sum())
}

/// Gauss-Jordan elimination with partial pivoting on an augmented matrix.
fn solve_augmented(mut aug: Vec<Vec<f64>>) -> Result<Vec<f64>, KrigingError> {
    let n = aug.len();
    for col in 0..n {
        let mut pivot_row = col;
        let mut max_mag = aug[col][col].abs();
        for row in (col + 1)..n {
            if aug[row][col].abs() > max_mag {
                max_mag = aug[row][col].abs();
                pivot_row = row;
            }
        }
        if max_mag < 1e-12 {
            return Err(KrigingError::Singular);
        }
        aug.swap(col, pivot_row);

        let pivot = aug[col][col];
        for j in col..=n {
            aug[col][j] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = aug[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in col..=n {
                aug[row][j] -= factor * aug[col][j];
            }
        }
    }
    Ok(aug.into_iter().map(|row| row[n]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_at_samples() {
        let pts = [Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(0.0, 10.0)];
        let vals = [1.0, 5.0, 3.0];
        assert_eq!(ordinary_kriging(&pts, &vals, pts[1]).unwrap(), 5.0);
    }

    #[test]
    fn test_weights_sum_to_one_for_constant_shift() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 10.0),
        ];
        let vals = [1.0, 4.0, 2.0, 8.0];
        let target = Point::new(3.0, 6.0);
        let base = ordinary_kriging(&pts, &vals, target).unwrap();
        let shifted: Vec<f64> = vals.iter().map(|v| v + 100.0).collect();
        let moved = ordinary_kriging(&pts, &shifted, target).unwrap();
        assert_relative_eq!(moved - base, 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_symmetric_midpoint() {
        let pts = [Point::new(0.0, 0.0), Point::new(10.0, 0.0)];
        let vals = [2.0, 6.0];
        let est = ordinary_kriging(&pts, &vals, Point::new(5.0, 0.0)).unwrap();
        assert_relative_eq!(est, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_inputs() {
        let pts = [Point::new(0.0, 0.0), Point::new(4.0, 0.0)];
        assert_relative_eq!(ordinary_kriging(&pts, &[3.0, 3.0], Point::new(1.0, 1.0)).unwrap(), 3.0);
        assert_eq!(ordinary_kriging(&pts[..1], &[7.0], Point::new(9.0, 9.0)).unwrap(), 7.0);
        assert_eq!(ordinary_kriging(&[], &[], Point::ORIGIN), Err(KrigingError::NoSamples));
        assert_eq!(
            ordinary_kriging(&pts, &[1.0, f64::INFINITY], Point::new(1.0, 1.0)),
            Err(KrigingError::NonFinite)
        );
    }

    #[test]
    fn test_duplicate_points_singular() {
        let pts = [Point::new(0.0, 0.0), Point::new(0.0, 0.0), Point::new(5.0, 0.0)];
        assert_eq!(
            ordinary_kriging(&pts, &[1.0, 2.0, 3.0], Point::new(2.0, 2.0)),
            Err(KrigingError::Singular)
        );
    }
}
