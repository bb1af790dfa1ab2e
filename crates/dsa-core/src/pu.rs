//! Primary users.

use crate::error::DsaResult;
use crate::geometry::{Element, Point, Tx};
use crate::pur::{Pur, PurLayout};
use rand::Rng;
use std::fmt;

/// A licensed transmitter together with the receivers it protects.
///
/// `Clone` yields an independent copy with its own PUR ledgers, which is
/// what each worker and each joint-maximizer trial operates on.
#[derive(Debug, Clone, PartialEq)]
pub struct Pu {
    id: String,
    pub tx: Tx,
    pub on: bool,
    purs: Vec<Pur>,
}

impl Pu {
    pub fn new(id: impl Into<String>, tx: Tx, purs: Vec<Pur>) -> Self {
        Self {
            id: id.into(),
            tx,
            on: true,
            purs,
        }
    }

    /// Build a PU whose PURs are laid out on a ring around it.
    pub fn with_layout<R: Rng + ?Sized>(
        id: impl Into<String>,
        tx: Tx,
        layout: &PurLayout,
        rng: &mut R,
    ) -> DsaResult<Self> {
        let id = id.into();
        let purs = Pur::ring(&id, layout, rng)?;
        Ok(Self::new(id, tx, purs))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn location(&self) -> Point {
        self.tx.element.location
    }

    pub fn purs(&self) -> &[Pur] {
        &self.purs
    }

    pub fn purs_mut(&mut self) -> &mut [Pur] {
        &mut self.purs
    }

    /// Absolute element of PUR `idx`.
    pub fn pur_element(&self, idx: usize) -> Element {
        self.purs[idx].absolute(self.location())
    }

    pub fn reset_purs(&mut self) {
        for pur in &mut self.purs {
            pur.reset();
        }
    }

    /// True when any PUR has no interference capacity left.
    pub fn any_pur_violated(&self) -> bool {
        self.purs.iter().any(Pur::is_violated)
    }

    /// Whether interference from the elements accepted by `include` alone
    /// violates one of the PURs.
    pub fn any_pur_violated_by<F: Fn(&str) -> bool>(&self, include: F) -> bool {
        self.purs.iter().any(|pur| pur.is_violated_by(&include))
    }
}

impl fmt::Display for Pu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{:.3}", self.location(), self.tx.power)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pur::InterferenceMethod;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn layout() -> PurLayout {
        PurLayout {
            count: 3,
            method: InterferenceMethod::Beta,
            value: 1.0,
            min_dist: 2.0,
            max_dist: 2.0,
            height: 15.0,
        }
    }

    #[test]
    fn test_pur_absolute_location() {
        let mut rng = StdRng::seed_from_u64(1);
        let tx = Tx::new(Element::new(Point::new(10.0, 20.0), 30.0), 0.0);
        let pu = Pu::with_layout("PU0", tx, &layout(), &mut rng).unwrap();
        let first = pu.pur_element(0);
        assert!((first.location.x - 12.0).abs() < 1e-9);
        assert!((first.location.y - 20.0).abs() < 1e-9);
        assert_eq!(first.height, 15.0);
        // relative location stays untouched
        assert!((pu.purs()[0].relative_location().x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_clone_has_independent_ledgers() {
        let mut rng = StdRng::seed_from_u64(1);
        let tx = Tx::new(Element::new(Point::ORIGIN, 30.0), 0.0);
        let pu = Pu::with_layout("PU0", tx, &layout(), &mut rng).unwrap();
        let mut copy = pu.clone();
        copy.purs_mut()[0].add_interference("PU9", -10.0);
        copy.tx.power = 12.0;
        assert_eq!(pu.purs()[0].interference_power(), f64::NEG_INFINITY);
        assert_eq!(pu.tx.power, 0.0);
    }

    #[test]
    fn test_display() {
        let tx = Tx::new(Element::new(Point::new(1.0, 2.0), 30.0), -3.25);
        let pu = Pu::new("PU1", tx, Vec::new());
        assert_eq!(pu.to_string(), "1.000,2.000,-3.250");
    }
}
