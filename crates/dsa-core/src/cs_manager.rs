//! Crowd-sourced spectrum manager.
//!
//! Estimates the requesting SU's maximum power from sensor readings and the
//! known PU locations only. Three steps:
//!
//! 1. **Attribution**: split each sensor's reading among its `k_pu` nearest
//!    transmitters (ON PUs and incumbent SUs) in proportion to
//!    `power / d^alpha`, giving a linear path gain per transmitter/sensor.
//! 2. **Interpolation**: carry each transmitter's gains from the `k_ss`
//!    nearest sensors to the requesting SU.
//! 3. **Max power**: move each gain from the PU to its PURs with a
//!    log-distance correction and take the tightest PUR.
//!
//! Propagation is never queried; the log-distance trend used by detrended
//! kriging is analytic.

use crate::geometry::Point;
use crate::interpolation::Interpolation;
use crate::kriging::ordinary_kriging;
use crate::nearest::{k_nearest, Neighbor};
use crate::propagation::LogDistance;
use crate::pu::Pu;
use crate::sensor::SpectrumSensor;
use crate::su::{split_requesting, Su};
use crate::wireless::{to_db, to_linear};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tuning of the crowd-sourced estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CsParams {
    /// Transmitters each sensor reading is split among.
    pub k_pu: usize,
    /// Sensors interpolated at the requesting SU.
    pub k_ss: usize,
    pub interpolation: Interpolation,
    /// Path loss exponent for attribution, weights and distance correction.
    pub alpha: f64,
    /// Meters per cell.
    pub cell_size: f64,
    /// Krig residuals after removing a log-distance trend.
    pub detrended: bool,
}

impl Default for CsParams {
    fn default() -> Self {
        Self {
            k_pu: 3,
            k_ss: 5,
            interpolation: Interpolation::Idw,
            alpha: 3.0,
            cell_size: 10.0,
            detrended: true,
        }
    }
}

/// Crowd-sourced estimate for one sample.
///
/// Transmitter rows are PU `i` at index `i` and incumbent SU `j` at
/// `pus.len() + j`. Gains are linear; `None` means unknown.
#[derive(Debug, Clone)]
pub struct CsSpectrumManager {
    gains: Vec<Vec<Option<f64>>>,
    su_gains: Vec<Option<f64>>,
    su_max_power: f64,
}

impl CsSpectrumManager {
    /// Run all three steps. Sensor readings must already be populated.
    pub fn new(pus: &[Pu], sss: &[SpectrumSensor], sus: &[Su], params: CsParams) -> Self {
        let Some((incumbents, requesting)) = split_requesting(sus) else {
            return Self {
                gains: Vec::new(),
                su_gains: Vec::new(),
                su_max_power: f64::NEG_INFINITY,
            };
        };
        let estimator = Estimator {
            pus,
            sss,
            incumbents,
            params,
        };
        let gains = estimator.attribute();
        let su_gains = estimator.interpolate(&gains, requesting.location());
        let su_max_power = estimator.max_power(&su_gains, requesting.location());
        debug!(su_max_power, interpolation = %params.interpolation, "crowd-sourced estimate");
        Self {
            gains,
            su_gains,
            su_max_power,
        }
    }

    /// Attributed gains, `[transmitter][sensor]`.
    pub fn gains(&self) -> &[Vec<Option<f64>>] {
        &self.gains
    }

    /// Interpolated gain from each transmitter to the requesting SU.
    pub fn su_gains(&self) -> &[Option<f64>] {
        &self.su_gains
    }

    pub fn su_max_power(&self) -> f64 {
        self.su_max_power
    }

    /// False when the estimate is infinite or NaN.
    pub fn is_valid(&self) -> bool {
        self.su_max_power.is_finite()
    }
}

struct Estimator<'a> {
    pus: &'a [Pu],
    sss: &'a [SpectrumSensor],
    incumbents: &'a [Su],
    params: CsParams,
}

impl Estimator<'_> {
    fn meters(&self, p: Point) -> Point {
        p.scale(self.params.cell_size)
    }

    fn rows(&self) -> usize {
        self.pus.len() + self.incumbents.len()
    }

    /// `(row, location in meters, power)` of every attributable transmitter.
    fn transmitters(&self) -> Vec<(usize, Point, f64)> {
        let pus = self
            .pus
            .iter()
            .enumerate()
            .filter(|(_, p)| p.on)
            .map(|(i, p)| (i, self.meters(p.location()), p.tx.power));
        let sus = self
            .incumbents
            .iter()
            .enumerate()
            .map(|(j, s)| (self.pus.len() + j, self.meters(s.location()), s.tx.power));
        pus.chain(sus).collect()
    }

    fn attribute(&self) -> Vec<Vec<Option<f64>>> {
        let alpha = self.params.alpha;
        let transmitters = self.transmitters();
        let mut gains = vec![vec![None; self.sss.len()]; self.rows()];

        for (s, ss) in self.sss.iter().enumerate() {
            let at = self.meters(ss.location());
            let nearest = k_nearest(
                transmitters.iter().enumerate().map(|(n, t)| (n, at.distance(&t.1))),
                self.params.k_pu,
            );
            if let Some(hit) = nearest.iter().find(|n| n.distance == 0.0) {
                gains[transmitters[hit.index].0][s] = Some(1.0);
                continue;
            }
            let received = to_linear(ss.received_power());
            if received <= 0.0 {
                continue;
            }
            let total: f64 = nearest
                .iter()
                .map(|n| to_linear(transmitters[n.index].2) / n.distance.powf(alpha))
                .sum();
            for n in &nearest {
                gains[transmitters[n.index].0][s] = Some(total / (received * n.distance.powf(alpha)));
            }
        }
        gains
    }

    fn interpolate(&self, gains: &[Vec<Option<f64>>], su: Point) -> Vec<Option<f64>> {
        let at = self.meters(su);
        let distances: Vec<f64> = self
            .sss
            .iter()
            .map(|ss| at.distance(&self.meters(ss.location())))
            .collect();
        if let Some(s) = distances.iter().position(|d| *d == 0.0) {
            return gains.iter().map(|row| row[s]).collect();
        }
        let nearest = k_nearest(distances.iter().copied().enumerate(), self.params.k_ss);

        let row_location = |row: usize| -> Option<Point> {
            if row < self.pus.len() {
                self.pus[row].on.then(|| self.meters(self.pus[row].location()))
            } else {
                Some(self.meters(self.incumbents[row - self.pus.len()].location()))
            }
        };

        (0..self.rows())
            .map(|row| {
                let source = row_location(row)?;
                match self.params.interpolation {
                    Interpolation::Idw | Interpolation::Ildw => {
                        let samples: Vec<(f64, Option<f64>)> =
                            nearest.iter().map(|n| (n.distance, gains[row][n.index])).collect();
                        self.params
                            .interpolation
                            .weighted_mean(&samples, self.params.alpha)
                    }
                    Interpolation::Ok => self.krige(&gains[row], &nearest, source, at),
                }
            })
            .collect()
    }

    /// Krige the path loss (dB) of one transmitter at `target`.
    fn krige(
        &self,
        row: &[Option<f64>],
        nearest: &[Neighbor],
        source: Point,
        target: Point,
    ) -> Option<f64> {
        let trend = LogDistance::new(self.params.alpha);
        let mut points = Vec::with_capacity(nearest.len());
        let mut values = Vec::with_capacity(nearest.len());
        for n in nearest {
            let gain = row[n.index]?;
            let location = self.meters(self.sss[n.index].location());
            let mut loss = -to_db(gain);
            if self.params.detrended {
                loss -= trend.mean_loss(source.distance(&location));
            }
            points.push(location);
            values.push(loss);
        }

        let mut loss = match ordinary_kriging(&points, &values, target) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "kriging failed, estimate marked unusable");
                return Some(f64::INFINITY);
            }
        };
        if self.params.detrended {
            loss += trend.mean_loss(source.distance(&target));
        }
        Some(to_linear(-loss))
    }

    fn max_power(&self, su_gains: &[Option<f64>], su: Point) -> f64 {
        let alpha = self.params.alpha;
        let at = self.meters(su);
        let mut best = f64::INFINITY;
        for (i, pu) in self.pus.iter().enumerate() {
            let gain = match su_gains.get(i).copied().flatten() {
                Some(g) if pu.on && g > 0.0 => g,
                _ => continue,
            };
            let pu_su = self.meters(pu.location()).distance(&at).max(1.0);
            for (k, pur) in pu.purs().iter().enumerate() {
                let pur_su = self.meters(pu.pur_element(k).location).distance(&at).max(1.0);
                let gain_db = to_db(gain * (pu_su / pur_su).powf(alpha));
                best = best.min(pur.interference_capacity() - gain_db);
            }
        }
        if best == f64::INFINITY {
            f64::NEG_INFINITY
        } else {
            best
        }
    }
}
