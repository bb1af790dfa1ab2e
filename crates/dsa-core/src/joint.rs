//! Joint power maximization over all SUs.
//!
//! Binary search on a dB vector `p` in `[noise_floor, 100]^k`. Each step
//! tries the widest interval at its midpoint while every other SU sits at
//! its lower bound, and keeps the trial value when no PUR of an ON PU is violated.
//! The returned lower bounds are therefore a feasible assignment whenever
//! the PUs alone leave room.
//!
//! SUs that every PUR sees identically (same path loss to each of them, e.g.
//! colocated SUs) are searched as one block on a finer grid. They end up
//! with equal powers, and raising any single one of them by more than
//! [`TOLERANCE`] is still infeasible.

use crate::manager::{pu_to_pur, OracleParams};
use crate::propagation::{PropagationError, PropagationModel};
use crate::pu::Pu;
use crate::su::Su;
use crate::wireless::to_linear;
use tracing::{debug, warn};

/// Upper end of every search interval (dB).
pub const MAX_SEARCH_POWER: f64 = 100.0;
/// Search stops once every interval is at most this wide (dB).
pub const TOLERANCE: f64 = 0.1;
pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct JointPowers {
    /// Feasible per-SU powers, in SU order.
    pub powers: Vec<f64>,
    /// Smallest power found infeasible per SU (or the search ceiling).
    pub high: Vec<f64>,
    pub iterations: usize,
    /// Every interval closed within [`TOLERANCE`].
    pub converged: bool,
    /// `powers` keeps every PUR unviolated.
    pub feasible: bool,
}

/// PU copies holding PU→PUR ledgers only, plus SU→PUR losses.
struct Feasibility<'a> {
    base: Vec<Pu>,
    sus: &'a [Su],
    /// `losses[s][n]`: SU `s` to the n-th PUR of the ON PUs, in order.
    losses: Vec<Vec<f64>>,
}

impl<'a> Feasibility<'a> {
    fn new(
        pus: &[Pu],
        sus: &'a [Su],
        model: &PropagationModel,
        cell_size: f64,
    ) -> Result<Self, PropagationError> {
        let mut base = pus.to_vec();
        for pu in &mut base {
            pu.reset_purs();
        }
        pu_to_pur(&mut base, model, cell_size)?;

        let mut targets = Vec::new();
        for pu in base.iter().filter(|p| p.on) {
            for k in 0..pu.purs().len() {
                targets.push(pu.pur_element(k).scaled(cell_size));
            }
        }
        let losses = sus
            .iter()
            .map(|su| {
                let source = su.tx.element.scaled(cell_size);
                targets
                    .iter()
                    .map(|t| model.path_loss(&source, t))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { base, sus, losses })
    }

    fn feasible(&self, powers: &[f64]) -> bool {
        let mut pus = self.base.clone();
        for (s, su) in self.sus.iter().enumerate() {
            let mut n = 0;
            for pu in pus.iter_mut().filter(|p| p.on) {
                for pur in pu.purs_mut() {
                    pur.add_interference(su.id(), powers[s] - self.losses[s][n]);
                    n += 1;
                }
            }
        }
        !pus.iter().any(|p| p.on && p.any_pur_violated())
    }

    /// SU indices grouped by identical loss rows.
    fn groups(&self) -> Vec<Vec<usize>> {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for s in 0..self.losses.len() {
            match groups.iter_mut().find(|g| self.losses[g[0]] == self.losses[s]) {
                Some(g) => g.push(s),
                None => groups.push(vec![s]),
            }
        }
        groups
    }
}

fn expand(groups: &[Vec<usize>], values: &[f64], k: usize) -> Vec<f64> {
    let mut out = vec![0.0; k];
    for (g, members) in groups.iter().enumerate() {
        for &s in members {
            out[s] = values[g];
        }
    }
    out
}

pub(crate) fn maximize(
    pus: &[Pu],
    sus: &[Su],
    model: &PropagationModel,
    params: OracleParams,
    max_iterations: usize,
) -> Result<JointPowers, PropagationError> {
    let k = sus.len();
    let check = Feasibility::new(pus, sus, model, params.cell_size)?;
    let groups = check.groups();
    let tolerance: Vec<f64> = groups
        .iter()
        .map(|g| {
            if g.len() == 1 {
                TOLERANCE
            } else {
                TOLERANCE / (4.0 * g.len() as f64)
            }
        })
        .collect();

    let mut low = vec![params.noise_floor; groups.len()];
    let mut high = vec![MAX_SEARCH_POWER; groups.len()];
    let mut iterations = 0;
    let mut converged = false;
    while iterations < max_iterations {
        let mut target = None;
        let mut widest = 0.0;
        for g in 0..groups.len() {
            let gap = high[g] - low[g];
            if gap > tolerance[g] && gap > widest {
                widest = gap;
                target = Some(g);
            }
        }
        let Some(t) = target else {
            converged = true;
            break;
        };

        let mid = low[t] + (high[t] - low[t]) / 2.0;
        let mut candidate = low.clone();
        candidate[t] = mid;
        if check.feasible(&expand(&groups, &candidate, k)) {
            low[t] = mid;
        } else {
            high[t] = mid;
        }
        iterations += 1;
    }
    if groups.is_empty() {
        converged = true;
    }

    let powers = expand(&groups, &low, k);
    let feasible = check.feasible(&powers);
    if !converged {
        warn!(iterations, "joint power search hit the iteration bound");
    }
    debug!(iterations, feasible, groups = groups.len(), "joint power search finished");
    Ok(JointPowers {
        powers,
        high: expand(&groups, &high, k),
        iterations,
        converged,
        feasible,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, PolarPoint};
    use crate::manager::tests::{pu_with_pur, su_at};
    use crate::manager::SpectrumManager;
    use crate::pur::InterferenceMethod;
    use crate::sensor::SpectrumSensor;

    fn setup() -> (Vec<Pu>, PropagationModel, OracleParams) {
        let pus = vec![pu_with_pur(
            "PU0",
            Point::new(0.0, 0.0),
            0.0,
            PolarPoint::new(2.0, 0.0),
            InterferenceMethod::Threshold,
            -60.0,
        )];
        let params = OracleParams {
            cell_size: 10.0,
            noise_floor: -90.0,
        };
        (pus, PropagationModel::log_distance(3.0), params)
    }

    fn run(pus: &mut [Pu], sus: &mut [Su], model: &PropagationModel, params: OracleParams) -> JointPowers {
        let mut no_sensors: Vec<SpectrumSensor> = Vec::new();
        let sm = SpectrumManager::new(pus, &mut no_sensors, sus, model, params);
        sm.compute_sus_total_max_power(DEFAULT_MAX_ITERATIONS).unwrap()
    }

    fn feasible_with(pus: &[Pu], sus: &[Su], powers: &[f64], model: &PropagationModel, params: OracleParams) -> bool {
        Feasibility::new(pus, sus, model, params.cell_size).unwrap().feasible(powers)
    }

    fn assert_tight(pus: &[Pu], sus: &[Su], result: &JointPowers, model: &PropagationModel, params: OracleParams) {
        for i in 0..sus.len() {
            assert!(result.high[i] - result.powers[i] <= TOLERANCE);
            let mut raised = result.powers.clone();
            raised[i] += TOLERANCE + 1e-6;
            assert!(
                !feasible_with(pus, sus, &raised, model, params),
                "coordinate {i} could be raised"
            );
        }
    }

    #[test]
    fn test_output_is_feasible_and_tight() {
        let (mut pus, model, params) = setup();
        let mut sus = vec![
            su_at("SU0", Point::new(30.0, 0.0), 0.0),
            su_at("SU1", Point::new(0.0, 40.0), 0.0),
            su_at("SU2", Point::new(-25.0, -25.0), 0.0),
        ];
        let result = run(&mut pus, &mut sus, &model, params);
        assert!(result.converged);
        assert!(result.feasible);
        assert!(feasible_with(&pus, &sus, &result.powers, &model, params));
        assert_tight(&pus, &sus, &result, &model, params);
    }

    #[test]
    fn test_colocated_sus_share_evenly() {
        let (mut pus, model, params) = setup();
        let mut sus: Vec<Su> = (0..3)
            .map(|i| su_at(&format!("SU{i}"), Point::new(60.0, 0.0), 0.0))
            .collect();
        let result = run(&mut pus, &mut sus, &model, params);
        assert!(result.converged);
        assert!(result.feasible);
        assert_eq!(result.powers[0], result.powers[1]);
        assert_eq!(result.powers[1], result.powers[2]);
        assert_tight(&pus, &sus, &result, &model, params);

        // three equal shares of the single-SU budget
        let loss = 30.0 * 580f64.log10();
        let share = -60.0 + loss - 10.0 * 3f64.log10();
        assert!((result.powers[0] - share).abs() <= TOLERANCE);
    }

    #[test]
    fn test_partially_colocated() {
        let (mut pus, model, params) = setup();
        let mut sus = vec![
            su_at("SU0", Point::new(30.0, 0.0), 0.0),
            su_at("SU1", Point::new(30.0, 0.0), 0.0),
            su_at("SU2", Point::new(-25.0, -25.0), 0.0),
        ];
        let result = run(&mut pus, &mut sus, &model, params);
        assert!(result.feasible);
        assert_eq!(result.powers[0], result.powers[1]);
        assert_tight(&pus, &sus, &result, &model, params);
    }

    #[test]
    fn test_no_sus() {
        let (mut pus, model, params) = setup();
        let mut sus: Vec<Su> = Vec::new();
        let result = run(&mut pus, &mut sus, &model, params);
        assert!(result.powers.is_empty());
        assert!(result.converged);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_iteration_bound() {
        let (mut pus, model, params) = setup();
        let mut sus = vec![su_at("SU0", Point::new(30.0, 0.0), 0.0)];
        let mut no_sensors: Vec<SpectrumSensor> = Vec::new();
        let sm = SpectrumManager::new(&mut pus, &mut no_sensors, &mut sus, &model, params);
        let result = sm.compute_sus_total_max_power(3).unwrap();
        assert_eq!(result.iterations, 3);
        assert!(!result.converged);
        assert!(result.feasible);
    }

    #[test]
    fn test_caller_ledgers_untouched() {
        let (mut pus, model, params) = setup();
        pus[0].purs_mut()[0].add_interference("marker", -100.0);
        let mut sus = vec![su_at("SU0", Point::new(30.0, 0.0), 0.0)];
        run(&mut pus, &mut sus, &model, params);
        assert_eq!(pus[0].purs()[0].ledger_len(), 1);
        assert_eq!(pus[0].purs()[0].interference_from("marker"), -100.0);
    }
}
