//! Synthetic PU samples.
//!
//! A PU farther than the maximum transmission radius from the most
//! restrictive PU cannot be the binding constraint, so lowering its power
//! leaves the requesting SU's answer unchanged. This yields extra labeled
//! samples for free.

use crate::pu::Pu;
use crate::sample::pu_block_sample;
use crate::su::Su;
use rand::Rng;

/// Copies of the ON PUs with some powers lowered.
#[derive(Debug, Clone)]
pub struct SyntheticPus {
    pus: Vec<Pu>,
    changed: usize,
}

impl SyntheticPus {
    /// `max_radius` is in meters, PU locations in cells. Every ON PU farther
    /// than `max_radius` from `pus[most_restrictive]` gets a power drawn
    /// uniformly from `[min_power, power)`.
    pub fn new<R: Rng + ?Sized>(
        pus: &[Pu],
        most_restrictive: usize,
        max_radius: f64,
        min_power: f64,
        cell_size: f64,
        rng: &mut R,
    ) -> Self {
        let Some(anchor) = pus.get(most_restrictive).map(Pu::location) else {
            return Self {
                pus: Vec::new(),
                changed: 0,
            };
        };
        let mut changed = 0;
        let pus = pus
            .iter()
            .filter(|p| p.on)
            .map(|p| {
                let mut copy = p.clone();
                let far = p.location().distance(&anchor) * cell_size > max_radius;
                if far && min_power < p.tx.power {
                    copy.tx.power = rng.gen_range(min_power..p.tx.power);
                    changed += 1;
                }
                copy
            })
            .collect();
        Self { pus, changed }
    }

    /// True when at least one PU power was lowered.
    pub fn is_valid(&self) -> bool {
        self.changed > 0
    }

    pub fn pus(&self) -> &[Pu] {
        &self.pus
    }

    /// PU sample line built from the synthetic PUs.
    pub fn sample(&self, sus: &[Su], is_allowed: bool) -> String {
        pu_block_sample(&self.pus, sus, is_allowed)
    }
}
