//! Ground-truth spectrum manager.
//!
//! Knows where every transmitter is and queries the propagation model
//! directly. Per sample it fills the PUR ledgers and sensor readings, grants
//! incumbent SUs their maximum power, and answers how much power the
//! requesting SU (the last one) may use.
//!
//! Order of work inside one computation is fixed:
//!
//! ```text
//! reset → PU→PUR → violation check → incumbent SUs → sensors → requesting SU
//! ```

use crate::geometry::{Element, Tx};
use crate::joint::{self, JointPowers};
use crate::propagation::{PropagationError, PropagationModel};
use crate::pu::Pu;
use crate::sensor::SpectrumSensor;
use crate::su::Su;
use crate::wireless::{shannon_rate, to_db, to_linear};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Scalars shared by every oracle computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OracleParams {
    /// Meters per cell.
    pub cell_size: f64,
    /// Ambient power (dB); PUR capacities are never taken below it.
    pub noise_floor: f64,
}

impl Default for OracleParams {
    fn default() -> Self {
        Self {
            cell_size: 10.0,
            noise_floor: -90.0,
        }
    }
}

/// Result of the max-power rule over the ON PUs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxPower {
    /// dB, `+inf` when no PU is ON.
    pub power: f64,
    /// Index into the PU slice of the PU owning the binding PUR.
    pub most_restrictive_pu: Option<usize>,
}

/// Oracle spectrum manager borrowing one sample's entities.
pub struct SpectrumManager<'a> {
    pus: &'a mut [Pu],
    sss: &'a mut [SpectrumSensor],
    sus: &'a mut [Su],
    model: &'a PropagationModel,
    params: OracleParams,
    su_max_power: f64,
    is_allowed: bool,
    pur_violated: bool,
    most_restrictive_pu: Option<usize>,
}

impl<'a> SpectrumManager<'a> {
    pub fn new(
        pus: &'a mut [Pu],
        sss: &'a mut [SpectrumSensor],
        sus: &'a mut [Su],
        model: &'a PropagationModel,
        params: OracleParams,
    ) -> Self {
        Self {
            pus,
            sss,
            sus,
            model,
            params,
            su_max_power: f64::NEG_INFINITY,
            is_allowed: false,
            pur_violated: false,
            most_restrictive_pu: None,
        }
    }

    /// Compute the requesting SU's maximum power.
    ///
    /// With `skip_existing` the PUR ledgers and sensor readings from a
    /// previous computation are reused and only the requesting SU is
    /// evaluated. That is only sound when PUs, sensors and incumbents are
    /// unchanged since then.
    pub fn compute_su_max_power(&mut self, skip_existing: bool) -> Result<f64, PropagationError> {
        let cell = self.params.cell_size;
        if skip_existing {
            // Incumbent grants may exhaust a PUR exactly; only PU
            // interference decides violation, as in a fresh computation.
            let on_ids: Vec<&str> = self.pus.iter().filter(|p| p.on).map(|p| p.id()).collect();
            self.pur_violated = self
                .pus
                .iter()
                .any(|p| p.on && p.any_pur_violated_by(|key| on_ids.contains(&key)));
        } else {
            self.pur_violated = false;
            for pu in self.pus.iter_mut() {
                pu.reset_purs();
            }
            for ss in self.sss.iter_mut() {
                ss.rx.reset();
            }

            pu_to_pur(self.pus, self.model, cell)?;
            if self.pus.iter().any(|p| p.on && p.any_pur_violated()) {
                debug!("PURs violated by primary users alone");
                self.pur_violated = true;
            } else {
                self.grant_incumbents()?;
                self.compute_sensor_powers()?;
            }
        }

        self.most_restrictive_pu = None;
        self.su_max_power = match self.sus.last() {
            Some(requesting) if !self.pur_violated => {
                let max = max_power(self.pus, &requesting.tx.element, self.model, self.params)?;
                self.most_restrictive_pu = max.most_restrictive_pu;
                max.power
            }
            _ => f64::NEG_INFINITY,
        };
        self.is_allowed = self
            .sus
            .last()
            .map_or(false, |su| su.tx.power <= self.su_max_power);
        Ok(self.su_max_power)
    }

    fn grant_incumbents(&mut self) -> Result<(), PropagationError> {
        let cell = self.params.cell_size;
        let incumbents = self.sus.len().saturating_sub(1);
        for j in 0..incumbents {
            let granted = max_power(self.pus, &self.sus[j].tx.element, self.model, self.params)?.power;
            self.sus[j].tx.power = granted;
            if !granted.is_finite() {
                continue;
            }
            let su_id = self.sus[j].id().to_string();
            let su_tx = self.sus[j].tx;
            add_tx_to_purs(self.pus, &su_id, &su_tx, self.model, cell)?;
        }
        Ok(())
    }

    fn compute_sensor_powers(&mut self) -> Result<(), PropagationError> {
        let cell = self.params.cell_size;
        let incumbents = self.sus.len().saturating_sub(1);
        let transmitters: Vec<Tx> = self
            .pus
            .iter()
            .filter(|p| p.on)
            .map(|p| p.tx)
            .chain(self.sus[..incumbents].iter().map(|s| s.tx))
            .filter(|tx| tx.power.is_finite())
            .collect();
        for ss in self.sss.iter_mut() {
            let at = ss.rx.element.scaled(cell);
            for tx in &transmitters {
                let loss = self.model.path_loss(&tx.element.scaled(cell), &at)?;
                ss.rx.accumulate(tx.power - loss);
            }
        }
        Ok(())
    }

    /// Search the largest per-SU power vector that keeps every PUR
    /// unviolated when all SUs transmit together.
    pub fn compute_sus_total_max_power(
        &self,
        max_iterations: usize,
    ) -> Result<JointPowers, PropagationError> {
        joint::maximize(self.pus, self.sus, self.model, self.params, max_iterations)
    }

    /// Shannon rate (bit/s) of every SU towards its receiver under the
    /// current powers. SUs without a receiver or power get 0. Updates each
    /// SU's `sinr`.
    pub fn sus_data_rate(&mut self, bandwidth_hz: f64) -> Result<Vec<f64>, PropagationError> {
        let cell = self.params.cell_size;
        let mut rates = Vec::with_capacity(self.sus.len());
        for i in 0..self.sus.len() {
            let su = &self.sus[i];
            let Some(rx) = su.rx else {
                rates.push(0.0);
                continue;
            };
            if !su.tx.power.is_finite() {
                self.sus[i].sinr = f64::NEG_INFINITY;
                rates.push(0.0);
                continue;
            }
            let rx = rx.scaled(cell);
            let signal = su.tx.power - self.model.path_loss(&su.tx.element.scaled(cell), &rx)?;

            let mut noise = to_linear(self.params.noise_floor);
            for pu in self.pus.iter().filter(|p| p.on) {
                noise += to_linear(pu.tx.power - self.model.path_loss(&pu.tx.element.scaled(cell), &rx)?);
            }
            for (j, other) in self.sus.iter().enumerate() {
                if j == i || !other.tx.power.is_finite() {
                    continue;
                }
                noise += to_linear(other.tx.power - self.model.path_loss(&other.tx.element.scaled(cell), &rx)?);
            }

            let sinr = signal - to_db(noise);
            self.sus[i].sinr = sinr;
            rates.push(shannon_rate(bandwidth_hz, sinr));
        }
        Ok(rates)
    }

    pub fn su_max_power(&self) -> f64 {
        self.su_max_power
    }

    pub fn is_allowed(&self) -> bool {
        self.is_allowed
    }

    pub fn pur_violated(&self) -> bool {
        self.pur_violated
    }

    pub fn most_restrictive_pu(&self) -> Option<usize> {
        self.most_restrictive_pu
    }

    pub fn pus(&self) -> &[Pu] {
        self.pus
    }

    pub fn sss(&self) -> &[SpectrumSensor] {
        self.sss
    }

    pub fn sus(&self) -> &[Su] {
        self.sus
    }

    pub fn params(&self) -> OracleParams {
        self.params
    }
}

/// Fill every ON PU's PURs: received power from their own PU and one
/// ledger entry per other ON PU. Ledgers are expected to be reset.
pub(crate) fn pu_to_pur(
    pus: &mut [Pu],
    model: &PropagationModel,
    cell_size: f64,
) -> Result<(), PropagationError> {
    for i in 0..pus.len() {
        if !pus[i].on {
            continue;
        }
        for k in 0..pus[i].purs().len() {
            let target = pus[i].pur_element(k).scaled(cell_size);
            let mut own = f64::NEG_INFINITY;
            let mut others = Vec::new();
            for (j, p) in pus.iter().enumerate() {
                if !p.on {
                    continue;
                }
                let received = p.tx.power - model.path_loss(&p.tx.element.scaled(cell_size), &target)?;
                if j == i {
                    own = received;
                } else {
                    others.push((p.id().to_string(), received));
                }
            }
            let pur = &mut pus[i].purs_mut()[k];
            pur.rx.received_power = own;
            for (key, value) in others {
                pur.add_interference(&key, value);
            }
        }
    }
    Ok(())
}

/// Record `tx`'s interference in every ON PU's PURs under `key`.
pub(crate) fn add_tx_to_purs(
    pus: &mut [Pu],
    key: &str,
    tx: &Tx,
    model: &PropagationModel,
    cell_size: f64,
) -> Result<(), PropagationError> {
    let source = tx.element.scaled(cell_size);
    for pu in pus.iter_mut().filter(|p| p.on) {
        for k in 0..pu.purs().len() {
            let target = pu.pur_element(k).scaled(cell_size);
            let loss = model.path_loss(&source, &target)?;
            pu.purs_mut()[k].add_interference(key, tx.power - loss);
        }
    }
    Ok(())
}

/// Largest power an SU at `su` may use given the current PUR ledgers.
pub fn max_power(
    pus: &[Pu],
    su: &Element,
    model: &PropagationModel,
    params: OracleParams,
) -> Result<MaxPower, PropagationError> {
    let source = su.scaled(params.cell_size);
    let mut best = MaxPower {
        power: f64::INFINITY,
        most_restrictive_pu: None,
    };
    for (i, pu) in pus.iter().enumerate().filter(|(_, p)| p.on) {
        for (k, pur) in pu.purs().iter().enumerate() {
            let cap = pur.interference_capacity().max(params.noise_floor);
            let loss = model.path_loss(&source, &pu.pur_element(k).scaled(params.cell_size))?;
            if cap + loss < best.power {
                best.power = cap + loss;
                best.most_restrictive_pu = Some(i);
            }
        }
    }
    Ok(best)
}
