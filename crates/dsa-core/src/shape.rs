//! Field shapes and random placement inside them.

use crate::error::{DsaError, DsaResult};
use crate::geometry::Point;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Rectangular region of cells anchored at the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Shape {
    Square { length: u32 },
    Rectangle { width: u32, length: u32 },
}

impl Shape {
    /// `(width, length)` in cells.
    pub fn dimensions(&self) -> (u32, u32) {
        match *self {
            Shape::Square { length } => (length, length),
            Shape::Rectangle { width, length } => (width, length),
        }
    }

    pub fn cell_count(&self) -> usize {
        let (w, l) = self.dimensions();
        w as usize * l as usize
    }

    pub fn contains(&self, p: &Point) -> bool {
        let (w, l) = self.dimensions();
        p.x >= 0.0 && p.y >= 0.0 && p.x < w as f64 && p.y < l as f64
    }

    /// Geometric center of the field.
    pub fn center(&self) -> Point {
        let (w, l) = self.dimensions();
        Point::new((w / 2) as f64, (l / 2) as f64)
    }

    /// `n` uniformly random integer cells.
    pub fn points<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<Point> {
        let (w, l) = self.dimensions();
        (0..n)
            .map(|_| {
                Point::new(
                    rng.gen_range(0..w.max(1)) as f64,
                    rng.gen_range(0..l.max(1)) as f64,
                )
            })
            .collect()
    }

    /// `n` cells drawn according to `table`.
    pub fn probability_points<R: Rng + ?Sized>(
        &self,
        table: &WeightTable,
        n: usize,
        rng: &mut R,
    ) -> DsaResult<Vec<Point>> {
        table.check_shape(self)?;
        let cols = table.cols;
        Ok((0..n)
            .map(|_| {
                let idx = table.sampler.sample(rng);
                Point::new((idx / cols) as f64, (idx % cols) as f64)
            })
            .collect())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Square { length } => write!(f, "square{length}"),
            Shape::Rectangle { width, length } => write!(f, "rectangle{width}x{length}"),
        }
    }
}

/// Per-cell placement weights, indexed `[x][y]`.
#[derive(Debug, Clone)]
pub struct WeightTable {
    rows: usize,
    cols: usize,
    sampler: WeightedIndex<f64>,
}

impl WeightTable {
    pub fn new(weights: Vec<Vec<f64>>) -> DsaResult<Self> {
        let rows = weights.len();
        let cols = weights.first().map_or(0, Vec::len);
        if rows == 0 || cols == 0 || weights.iter().any(|r| r.len() != cols) {
            return Err(DsaError::InvalidInput(
                "weight table must be a non-empty rectangle".to_string(),
            ));
        }
        let sampler = WeightedIndex::new(weights.into_iter().flatten())
            .map_err(|e| DsaError::InvalidInput(format!("weight table: {e}")))?;
        Ok(Self { rows, cols, sampler })
    }

    /// Build a table and make sure it covers `shape` exactly.
    pub fn for_shape(weights: Vec<Vec<f64>>, shape: &Shape) -> DsaResult<Self> {
        let table = Self::new(weights)?;
        table.check_shape(shape)?;
        Ok(table)
    }

    /// Load a JSON `[[f64]]` table.
    pub fn load(path: &Path, shape: &Shape) -> DsaResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DsaError::io(path, e))?;
        let weights: Vec<Vec<f64>> = serde_json::from_str(&content)
            .map_err(|e| DsaError::parse(e.line(), e.to_string()))?;
        Self::for_shape(weights, shape)
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn check_shape(&self, shape: &Shape) -> DsaResult<()> {
        let (w, l) = shape.dimensions();
        if self.rows != w as usize || self.cols != l as usize {
            return Err(DsaError::WeightTableMismatch {
                rows: self.rows,
                cols: self.cols,
                expected_rows: w as usize,
                expected_cols: l as usize,
            });
        }
        Ok(())
    }
}
