//! Spatial interpolation methods used by the crowd-sourced manager.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Interpolation method.
///
/// `Idw` and `Ildw` average linear gains; `Ok` krigs path loss in dB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Inverse distance weighting, `1 / (d + eps)^alpha`.
    Idw,
    /// Inverse log-distance weighting, `1 / log10(1 + d + eps)`.
    Ildw,
    /// Ordinary kriging.
    Ok,
}

impl Interpolation {
    /// Weight of a sample at distance `d`. Only meaningful for the inverse
    /// distance variants; kriging derives its own weights.
    pub fn weight(&self, d: f64, alpha: f64) -> f64 {
        let eps = f64::MIN_POSITIVE;
        match self {
            Interpolation::Idw => 1.0 / (d + eps).powf(alpha),
            Interpolation::Ildw => 1.0 / (1.0 + d + eps).log10(),
            Interpolation::Ok => 1.0,
        }
    }

    /// Weighted mean of linear values. Unknown operands count as zero; the
    /// result is unknown only when every operand is. A single sample is
    /// returned as is.
    pub fn weighted_mean(&self, samples: &[(f64, Option<f64>)], alpha: f64) -> Option<f64> {
        if samples.iter().all(|(_, v)| v.is_none()) {
            return None;
        }
        if let [(_, only)] = samples {
            return *only;
        }
        let mut num = 0.0;
        let mut den = 0.0;
        for (d, v) in samples {
            let w = self.weight(*d, alpha);
            num += w * v.unwrap_or(0.0);
            den += w;
        }
        Some(num / den)
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interpolation::Idw => write!(f, "idw"),
            Interpolation::Ildw => write!(f, "ildw"),
            Interpolation::Ok => write!(f, "ok"),
        }
    }
}

impl FromStr for Interpolation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "idw" => Ok(Interpolation::Idw),
            "ildw" => Ok(Interpolation::Ildw),
            "ok" | "kriging" => Ok(Interpolation::Ok),
            other => Err(format!("unknown interpolation '{other}'")),
        }
    }
}
