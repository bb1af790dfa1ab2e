//! Propagation models.
//!
//! Models receive elements already scaled to meters and return a
//! non-negative path loss in dB. They are shared read-only by the managers
//! and must be deterministic for fixed inputs; each worker gets its own
//! instance through [`PropagationModel::clone_for_worker`].

use crate::geometry::{Element, Point};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// A path loss lookup that could not be answered.
///
/// The caller discards the current sample and moves on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropagationError {
    #[error("no path loss entry between {src} and {dst}")]
    MissingEntry { src: Point, dst: Point },

    #[error("invalid distance {0}")]
    InvalidDistance(f64),

    #[error("failed to load path loss map: {0}")]
    Load(String),
}

/// Log-distance model: `10 * alpha * log10(max(d, 1))` plus optional
/// log-normal shadowing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogDistance {
    pub alpha: f64,
    /// Shadowing standard deviation in dB; 0 disables it.
    #[serde(default)]
    pub std: f64,
    #[serde(default)]
    pub seed: u64,
}

impl LogDistance {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            std: 0.0,
            seed: 0,
        }
    }

    pub fn with_shadowing(alpha: f64, std: f64, seed: u64) -> Self {
        Self { alpha, std, seed }
    }

    /// Mean loss at distance `d` meters.
    #[inline]
    pub fn mean_loss(&self, d: f64) -> f64 {
        10.0 * self.alpha * d.max(1.0).log10()
    }

    pub fn path_loss(&self, src: &Element, dst: &Element) -> Result<f64, PropagationError> {
        let d = src.location.distance(&dst.location);
        if !d.is_finite() {
            return Err(PropagationError::InvalidDistance(d));
        }
        let mut loss = self.mean_loss(d);
        if self.std > 0.0 {
            loss += self.shadowing(src, dst);
        }
        Ok(loss.max(0.0))
    }

    // Same endpoints always give the same fade, in either direction.
    fn shadowing(&self, src: &Element, dst: &Element) -> f64 {
        let (a, b) = ordered(src.location, dst.location);
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        for v in [a.x, a.y, b.x, b.y] {
            v.to_bits().hash(&mut hasher);
        }
        let mut rng = StdRng::seed_from_u64(hasher.finish());
        match Normal::new(0.0, self.std) {
            Ok(normal) => normal.sample(&mut rng),
            Err(_) => 0.0,
        }
    }
}

fn ordered(a: Point, b: Point) -> (Point, Point) {
    if (a.x, a.y) <= (b.x, b.y) {
        (a, b)
    } else {
        (b, a)
    }
}

/// One measured or precomputed path loss between two points (meters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathLossEntry {
    pub src: [f64; 2],
    pub dst: [f64; 2],
    pub loss: f64,
}

type PairKey = (i64, i64, i64, i64);

fn pair_key(a: Point, b: Point) -> PairKey {
    let (a, b) = ordered(a, b);
    (
        a.x.round() as i64,
        a.y.round() as i64,
        b.x.round() as i64,
        b.y.round() as i64,
    )
}

/// Precomputed path losses keyed by endpoint pair, e.g. exported from a
/// terrain tool. The table is shared between workers; the fetch counter is
/// per instance.
#[derive(Debug)]
pub struct PathLossMap {
    table: Arc<HashMap<PairKey, f64>>,
    fetches: AtomicU64,
}

impl PathLossMap {
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = PathLossEntry>,
    {
        let table = entries
            .into_iter()
            .map(|e| {
                let key = pair_key(Point::new(e.src[0], e.src[1]), Point::new(e.dst[0], e.dst[1]));
                (key, e.loss)
            })
            .collect();
        Self {
            table: Arc::new(table),
            fetches: AtomicU64::new(0),
        }
    }

    /// Load a JSON array of [`PathLossEntry`].
    pub fn load(path: &Path) -> Result<Self, PropagationError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PropagationError::Load(format!("{}: {}", path.display(), e)))?;
        let entries: Vec<PathLossEntry> = serde_json::from_str(&content)
            .map_err(|e| PropagationError::Load(format!("{}: {}", path.display(), e)))?;
        tracing::info!(path = %path.display(), entries = entries.len(), "loaded path loss map");
        Ok(Self::from_entries(entries))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn path_loss(&self, src: &Element, dst: &Element) -> Result<f64, PropagationError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        if src.location == dst.location {
            return Ok(0.0);
        }
        self.table
            .get(&pair_key(src.location, dst.location))
            .copied()
            .ok_or(PropagationError::MissingEntry {
                src: src.location,
                dst: dst.location,
            })
    }

    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    fn clone_for_worker(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            fetches: AtomicU64::new(0),
        }
    }
}

/// The propagation models the managers can run against.
#[derive(Debug)]
pub enum PropagationModel {
    LogDistance(LogDistance),
    PathLossMap(PathLossMap),
}

impl PropagationModel {
    pub fn log_distance(alpha: f64) -> Self {
        PropagationModel::LogDistance(LogDistance::new(alpha))
    }

    /// Path loss (dB) between two elements already scaled to meters.
    pub fn path_loss(&self, src: &Element, dst: &Element) -> Result<f64, PropagationError> {
        match self {
            PropagationModel::LogDistance(m) => m.path_loss(src, dst),
            PropagationModel::PathLossMap(m) => m.path_loss(src, dst),
        }
    }

    /// An instance a worker can own outright.
    pub fn clone_for_worker(&self) -> Self {
        match self {
            PropagationModel::LogDistance(m) => PropagationModel::LogDistance(*m),
            PropagationModel::PathLossMap(m) => PropagationModel::PathLossMap(m.clone_for_worker()),
        }
    }

    /// Number of table lookups served, zero for analytic models.
    pub fn fetch_count(&self) -> u64 {
        match self {
            PropagationModel::LogDistance(_) => 0,
            PropagationModel::PathLossMap(m) => m.fetch_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn el(x: f64, y: f64) -> Element {
        Element::new(Point::new(x, y), 15.0)
    }

    #[test]
    fn test_log_distance_mean() {
        let model = LogDistance::new(3.0);
        assert_relative_eq!(model.path_loss(&el(0.0, 0.0), &el(100.0, 0.0)).unwrap(), 60.0, epsilon = 1e-9);
        // below one meter the loss is clamped at zero
        assert_eq!(model.path_loss(&el(0.0, 0.0), &el(0.5, 0.0)).unwrap(), 0.0);
        assert_eq!(model.path_loss(&el(3.0, 3.0), &el(3.0, 3.0)).unwrap(), 0.0);
    }

    #[test]
    fn test_shadowing_is_deterministic_and_symmetric() {
        let model = LogDistance::with_shadowing(3.0, 6.0, 42);
        let a = el(10.0, 20.0);
        let b = el(400.0, 130.0);
        let ab = model.path_loss(&a, &b).unwrap();
        assert_eq!(ab, model.path_loss(&a, &b).unwrap());
        assert_eq!(ab, model.path_loss(&b, &a).unwrap());
        let other_seed = LogDistance::with_shadowing(3.0, 6.0, 43);
        assert_ne!(ab, other_seed.path_loss(&a, &b).unwrap());
    }

    #[test]
    fn test_invalid_distance() {
        let model = LogDistance::new(2.0);
        let err = model.path_loss(&el(f64::NAN, 0.0), &el(1.0, 0.0)).unwrap_err();
        assert!(matches!(err, PropagationError::InvalidDistance(_)));
    }

    #[test]
    fn test_path_loss_map_lookup() {
        let map = PathLossMap::from_entries([PathLossEntry {
            src: [0.0, 0.0],
            dst: [100.0, 50.0],
            loss: 87.5,
        }]);
        let model = PropagationModel::PathLossMap(map);
        assert_eq!(model.path_loss(&el(0.0, 0.0), &el(100.0, 50.0)).unwrap(), 87.5);
        assert_eq!(model.path_loss(&el(100.0, 50.0), &el(0.0, 0.0)).unwrap(), 87.5);
        assert!(matches!(
            model.path_loss(&el(0.0, 0.0), &el(10.0, 10.0)),
            Err(PropagationError::MissingEntry { .. })
        ));
        assert_eq!(model.fetch_count(), 3);

        let worker = model.clone_for_worker();
        assert_eq!(worker.fetch_count(), 0);
        assert_eq!(worker.path_loss(&el(0.0, 0.0), &el(100.0, 50.0)).unwrap(), 87.5);
    }

    #[test]
    fn test_path_loss_map_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pl.json");
        std::fs::write(&path, r#"[{"src":[0,0],"dst":[10,0],"loss":40.0}]"#).unwrap();
        let map = PathLossMap::load(&path).unwrap();
        assert_eq!(map.len(), 1);
        assert!(PathLossMap::load(&dir.path().join("missing.json")).is_err());
    }
}
