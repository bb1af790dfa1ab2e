//! Primary User Receivers and their interference ledgers.
//!
//! A PUR sits at a location relative to its PU and records, per transmitter
//! id, the interference (dB) that transmitter causes at it. The total `irp`
//! is always recomputed from the ledger, so it never drifts from
//! `dB(sum of linear entries)`.

use crate::error::{DsaError, DsaResult};
use crate::geometry::{Element, Point, PolarPoint, Rx};
use crate::wireless::{to_db, to_linear};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// How a PUR decides how much extra interference it tolerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterferenceMethod {
    /// Signal-to-interference bound: `received / beta - irp`.
    Beta,
    /// Absolute interference bound: `threshold - irp`.
    Threshold,
}

impl fmt::Display for InterferenceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterferenceMethod::Beta => write!(f, "beta"),
            InterferenceMethod::Threshold => write!(f, "threshold"),
        }
    }
}

/// Layout of the PURs created around each PU.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PurLayout {
    pub count: usize,
    pub method: InterferenceMethod,
    pub value: f64,
    pub min_dist: f64,
    pub max_dist: f64,
    pub height: f64,
}

impl PurLayout {
    pub fn validate(&self) -> DsaResult<()> {
        if self.method == InterferenceMethod::Beta && self.value == 0.0 {
            return Err(DsaError::InvalidBeta);
        }
        if self.min_dist > self.max_dist {
            return Err(DsaError::InvalidPurDistance {
                min: self.min_dist,
                max: self.max_dist,
            });
        }
        Ok(())
    }
}

/// Primary User Receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct Pur {
    id: String,
    /// Receiver placed relative to the owning PU.
    pub rx: Rx,
    method: InterferenceMethod,
    value: f64,
    ledger: BTreeMap<String, f64>,
    irp: f64,
}

impl Pur {
    /// Create a PUR at `relative` (offset from its PU).
    pub fn new(
        id: impl Into<String>,
        relative: Element,
        method: InterferenceMethod,
        value: f64,
    ) -> DsaResult<Self> {
        if method == InterferenceMethod::Beta && value == 0.0 {
            return Err(DsaError::InvalidBeta);
        }
        Ok(Self {
            id: id.into(),
            rx: Rx::new(relative),
            method,
            value,
            ledger: BTreeMap::new(),
            irp: f64::NEG_INFINITY,
        })
    }

    /// Create `layout.count` PURs around a PU at evenly spaced angles and a
    /// random radius in `[min_dist, max_dist]`.
    pub fn ring<R: Rng + ?Sized>(
        pu_id: &str,
        layout: &PurLayout,
        rng: &mut R,
    ) -> DsaResult<Vec<Pur>> {
        layout.validate()?;
        let n = layout.count;
        (0..n)
            .map(|i| {
                let r = if layout.max_dist > layout.min_dist {
                    rng.gen_range(layout.min_dist..=layout.max_dist)
                } else {
                    layout.min_dist
                };
                let theta = i as f64 * (2.0 * std::f64::consts::PI / n as f64);
                let relative = Element::new(Point::from(PolarPoint::new(r, theta)), layout.height);
                Pur::new(format!("{pu_id}_PUR{i}"), relative, layout.method, layout.value)
            })
            .collect()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn method(&self) -> InterferenceMethod {
        self.method
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Location relative to the owning PU.
    pub fn relative_location(&self) -> Point {
        self.rx.element.location
    }

    /// Absolute element given the owning PU's location.
    pub fn absolute(&self, pu_location: Point) -> Element {
        self.rx.element.offset(pu_location)
    }

    /// Clear the ledger and the received power.
    pub fn reset(&mut self) {
        self.ledger.clear();
        self.irp = f64::NEG_INFINITY;
        self.rx.reset();
    }

    /// Record interference from `key`. A key already present is left alone.
    pub fn add_interference(&mut self, key: &str, power_db: f64) {
        if self.ledger.contains_key(key) {
            warn!(pur = %self.id, key, "interference from this element already recorded");
            return;
        }
        self.ledger.insert(key.to_string(), power_db);
        self.recompute_irp();
    }

    /// Replace the interference recorded for `key`.
    pub fn update_interference(&mut self, key: &str, power_db: f64) {
        match self.ledger.get_mut(key) {
            Some(v) => *v = power_db,
            None => {
                warn!(pur = %self.id, key, "no interference recorded for this element");
                return;
            }
        }
        self.recompute_irp();
    }

    pub fn remove_interference(&mut self, key: &str) {
        if self.ledger.remove(key).is_none() {
            warn!(pur = %self.id, key, "no interference recorded for this element");
            return;
        }
        self.recompute_irp();
    }

    /// Interference from `key`, `-inf` when nothing is recorded.
    pub fn interference_from(&self, key: &str) -> f64 {
        self.ledger.get(key).copied().unwrap_or(f64::NEG_INFINITY)
    }

    /// Total received interference (dB).
    pub fn interference_power(&self) -> f64 {
        self.irp
    }

    pub fn ledger_len(&self) -> usize {
        self.ledger.len()
    }

    /// Extra interference (dB) this PUR can absorb; `-inf` once violated.
    pub fn interference_capacity(&self) -> f64 {
        self.capacity_with(self.irp)
    }

    pub fn is_violated(&self) -> bool {
        self.interference_capacity() == f64::NEG_INFINITY
    }

    /// Whether the interference from the keys accepted by `include` alone
    /// violates this PUR.
    pub fn is_violated_by<F: Fn(&str) -> bool>(&self, include: F) -> bool {
        let total: f64 = self
            .ledger
            .iter()
            .filter(|(k, _)| include(k.as_str()))
            .map(|(_, v)| to_linear(*v))
            .sum();
        self.capacity_with(to_db(total)) == f64::NEG_INFINITY
    }

    fn capacity_with(&self, irp: f64) -> f64 {
        match self.method {
            InterferenceMethod::Beta => to_db(to_linear(self.rx.received_power) / self.value - to_linear(irp)),
            InterferenceMethod::Threshold => to_db(to_linear(self.value) - to_linear(irp)),
        }
    }

    fn recompute_irp(&mut self) {
        let total: f64 = self.ledger.values().map(|v| to_linear(*v)).sum();
        self.irp = to_db(total);
    }
}

impl fmt::Display for Pur {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let polar = self.relative_location().to_polar();
        write!(
            f,
            "{} at ({:.3}, {:.3}) h={:.3} {}={:.3} rp={:.3} irp={:.3}",
            self.id,
            polar.r,
            polar.theta,
            self.rx.element.height,
            self.method,
            self.value,
            self.rx.received_power,
            self.irp
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn beta_pur(beta: f64) -> Pur {
        Pur::new(
            "PU0_PUR0",
            Element::new(Point::new(2.0, 0.0), 15.0),
            InterferenceMethod::Beta,
            beta,
        )
        .unwrap()
    }

    fn linear_sum(pur: &Pur, keys: &[&str]) -> f64 {
        keys.iter().map(|k| to_linear(pur.interference_from(k))).sum()
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut pur = beta_pur(1.0);
        pur.rx.received_power = 3.0;
        pur.add_interference("PU1", -10.0);
        pur.add_interference("SU4", -20.0);
        pur.reset();
        assert_eq!(pur.interference_power(), f64::NEG_INFINITY);
        assert_eq!(pur.interference_from("PU1"), f64::NEG_INFINITY);
        assert_eq!(pur.interference_from("SU4"), f64::NEG_INFINITY);
        assert_eq!(pur.rx.received_power, f64::NEG_INFINITY);
        assert_eq!(pur.ledger_len(), 0);
    }

    #[test]
    fn test_irp_tracks_ledger() {
        let mut pur = beta_pur(1.0);
        let keys = ["PU1", "PU2", "SU0"];
        pur.add_interference("PU1", -3.0);
        pur.add_interference("PU2", 4.5);
        pur.add_interference("SU0", -30.0);
        assert_relative_eq!(to_linear(pur.interference_power()), linear_sum(&pur, &keys), epsilon = 1e-12);

        pur.update_interference("PU2", -7.0);
        assert_relative_eq!(to_linear(pur.interference_power()), linear_sum(&pur, &keys), epsilon = 1e-12);

        pur.remove_interference("PU1");
        assert_relative_eq!(to_linear(pur.interference_power()), linear_sum(&pur, &keys), epsilon = 1e-12);
    }

    #[test]
    fn test_add_then_remove_restores_state() {
        let mut pur = beta_pur(0.05);
        pur.rx.received_power = -40.0;
        pur.add_interference("PU1", -63.2);
        pur.add_interference("PU7", -71.9);
        let before = pur.clone();

        pur.add_interference("SU3", -55.5);
        assert_ne!(pur, before);
        pur.remove_interference("SU3");

        assert_eq!(pur, before);
        assert_eq!(
            pur.interference_power().to_bits(),
            before.interference_power().to_bits()
        );
    }

    #[test]
    fn test_ledger_misuse_is_noop() {
        let mut pur = beta_pur(1.0);
        pur.add_interference("PU1", -10.0);
        let snapshot = pur.clone();

        pur.add_interference("PU1", 50.0);
        pur.update_interference("missing", 50.0);
        pur.remove_interference("missing");
        assert_eq!(pur, snapshot);
    }

    #[test]
    fn test_beta_capacity_unit_received_power() {
        let mut pur = beta_pur(1.0);
        pur.rx.received_power = 0.0;
        pur.add_interference("PU1", -6.0);
        pur.add_interference("PU2", -9.0);
        // rp = 0 dB and beta = 1: capacity = dB(1 - lin(irp))
        let irp = pur.interference_power();
        assert_relative_eq!(
            pur.interference_capacity(),
            to_db(1.0 - to_linear(irp)),
            epsilon = 1e-12
        );

        // empty ledger leaves the whole 0 dB budget
        pur.reset();
        pur.rx.received_power = 0.0;
        assert_relative_eq!(pur.interference_capacity(), 0.0);
    }

    #[test]
    fn test_violation_by_selected_keys() {
        let mut pur = Pur::new(
            "PU0_PUR0",
            Element::new(Point::ORIGIN, 15.0),
            InterferenceMethod::Threshold,
            -80.0,
        )
        .unwrap();
        pur.add_interference("PU1", -90.0);
        pur.add_interference("SU0", -60.0);
        assert!(pur.is_violated());
        assert!(!pur.is_violated_by(|key| key.starts_with("PU")));
        assert!(pur.is_violated_by(|key| key == "SU0"));
        assert!(!pur.is_violated_by(|_| false));
    }

    #[test]
    fn test_threshold_capacity_and_violation() {
        let mut pur = Pur::new(
            "PU0_PUR0",
            Element::new(Point::ORIGIN, 15.0),
            InterferenceMethod::Threshold,
            -80.0,
        )
        .unwrap();
        assert_relative_eq!(pur.interference_capacity(), -80.0, epsilon = 1e-9);
        pur.add_interference("PU1", -83.0);
        assert!(!pur.is_violated());
        assert!(pur.interference_capacity() < -80.0);

        pur.add_interference("PU2", -70.0);
        assert!(pur.is_violated());
    }

    #[test]
    fn test_invalid_beta_rejected() {
        let err = Pur::new("x", Element::new(Point::ORIGIN, 1.0), InterferenceMethod::Beta, 0.0);
        assert_eq!(err.unwrap_err(), DsaError::InvalidBeta);
    }

    #[test]
    fn test_ring_layout() {
        let mut rng = StdRng::seed_from_u64(7);
        let layout = PurLayout {
            count: 4,
            method: InterferenceMethod::Beta,
            value: 0.05,
            min_dist: 1.0,
            max_dist: 3.0,
            height: 15.0,
        };
        let purs = Pur::ring("PU3", &layout, &mut rng).unwrap();
        assert_eq!(purs.len(), 4);
        for (i, pur) in purs.iter().enumerate() {
            assert_eq!(pur.id(), format!("PU3_PUR{i}"));
            let polar = pur.relative_location().to_polar();
            assert!(polar.r >= 1.0 - 1e-9 && polar.r <= 3.0 + 1e-9);
        }
        let second = purs[1].relative_location();
        assert!(second.x.abs() < 1e-9 && second.y > 0.0);

        let bad = PurLayout { min_dist: 5.0, ..layout };
        assert_eq!(
            Pur::ring("PU3", &bad, &mut rng).unwrap_err(),
            DsaError::InvalidPurDistance { min: 5.0, max: 3.0 }
        );
    }
}
