//! Sensitivity of the oracle answer to small SU displacements.
//!
//! An SU random-walks from a start cell in steps shorter than `radius`
//! cells, the oracle is asked for its maximum power at every step with all
//! PUs ON, and the population standard deviation of the finite answers is
//! reported. It estimates how much label noise a location error of about
//! one cell introduces.

use crate::geometry::{Element, Point, PolarPoint, Tx};
use crate::manager::{OracleParams, SpectrumManager};
use crate::propagation::PropagationModel;
use crate::pu::Pu;
use crate::sensor::SpectrumSensor;
use crate::su::Su;
use rand::Rng;
use std::f64::consts::TAU;
use tracing::debug;

/// Walk settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Walk {
    pub start: Point,
    pub height: f64,
    pub steps: usize,
    /// Cells; every step is shorter than this.
    pub radius: f64,
}

/// Standard deviation (dB) of the oracle maximum power along `walk`.
///
/// `None` when no step produced a finite answer. Steps the propagation
/// model cannot answer are skipped.
pub fn max_power_spread<R: Rng + ?Sized>(
    pus: &[Pu],
    model: &PropagationModel,
    params: OracleParams,
    walk: Walk,
    rng: &mut R,
) -> Option<f64> {
    let mut pus = pus.to_vec();
    for pu in pus.iter_mut() {
        pu.on = true;
    }
    let mut no_sensors: Vec<SpectrumSensor> = Vec::new();
    let radius = walk.radius.max(f64::MIN_POSITIVE);
    let mut at = walk.start;
    let mut values = Vec::with_capacity(walk.steps);

    for step in 0..walk.steps {
        let offset = PolarPoint::new(rng.gen_range(0.0..radius), rng.gen_range(0.0..TAU));
        at = at + Point::from(offset);
        let mut sus = vec![Su::new("SU0", Tx::new(Element::new(at, walk.height), 0.0))];
        let mut sm = SpectrumManager::new(&mut pus, &mut no_sensors, &mut sus, model, params);
        match sm.compute_su_max_power(false) {
            Ok(max) if max.is_finite() => values.push(max),
            Ok(_) => {}
            Err(e) => debug!(step, error = %e, "spread step skipped"),
        }
    }

    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some(var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::tests::{pu_with_pur, scenario_a_params, scenario_a_pu};
    use crate::pur::InterferenceMethod;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn walk(radius: f64) -> Walk {
        Walk {
            start: Point::new(50.0, 0.0),
            height: 15.0,
            steps: 200,
            radius,
        }
    }

    #[test]
    fn test_spread_grows_with_step_size() {
        let pus = vec![scenario_a_pu()];
        let model = PropagationModel::log_distance(3.0);

        let small = max_power_spread(&pus, &model, scenario_a_params(), walk(0.01), &mut StdRng::seed_from_u64(3))
            .unwrap();
        let large = max_power_spread(&pus, &model, scenario_a_params(), walk(2.0), &mut StdRng::seed_from_u64(3))
            .unwrap();
        assert!(small >= 0.0);
        assert!(small < 0.1, "{small}");
        assert!(large > small);
    }

    #[test]
    fn test_spread_leaves_callers_pus_alone() {
        let mut pu = scenario_a_pu();
        pu.on = false;
        let pus = vec![pu];
        let model = PropagationModel::log_distance(3.0);
        let spread = max_power_spread(&pus, &model, scenario_a_params(), walk(1.0), &mut StdRng::seed_from_u64(1));
        assert!(spread.is_some());
        assert!(!pus[0].on);
        assert_eq!(pus[0].purs()[0].ledger_len(), 0);
    }

    #[test]
    fn test_spread_is_none_when_pus_violate_each_other() {
        let pus = vec![
            pu_with_pur("PU0", Point::ORIGIN, 0.0, PolarPoint::new(1.0, 0.0), InterferenceMethod::Threshold, -200.0),
            pu_with_pur("PU1", Point::new(5.0, 0.0), 0.0, PolarPoint::new(1.0, 0.0), InterferenceMethod::Threshold, -200.0),
        ];
        let model = PropagationModel::log_distance(3.0);
        assert_eq!(
            max_power_spread(&pus, &model, scenario_a_params(), walk(1.0), &mut StdRng::seed_from_u64(2)),
            None
        );
    }
}
