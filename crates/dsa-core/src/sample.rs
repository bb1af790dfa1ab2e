//! Text sample lines.
//!
//! All powers and coordinates are printed with three decimals:
//!
//! ```text
//! PU sample:   #ON, x,y,p, ..., #SUs, x,y,p, ..., 1|0
//! SS sample:   #SSs, p1, p2, ..., #SUs, x,y,p, ..., 1|0
//! max power:   x,y,max
//! ```

use crate::joint::JointPowers;
use crate::pu::Pu;
use crate::sensor::SpectrumSensor;
use crate::su::Su;

fn flag(is_allowed: bool) -> &'static str {
    if is_allowed {
        "1"
    } else {
        "0"
    }
}

/// `#SUs, x,y,p, ...`
pub fn sus_information(sus: &[Su]) -> String {
    let mut parts = Vec::with_capacity(sus.len() + 1);
    parts.push(sus.len().to_string());
    parts.extend(sus.iter().map(Su::to_string));
    parts.join(",")
}

/// Append the SU block and the accept flag to a list of leading fields.
fn with_sus(mut parts: Vec<String>, sus: &[Su], is_allowed: bool) -> String {
    parts.push(sus_information(sus));
    parts.push(flag(is_allowed).to_string());
    parts.join(",")
}

/// Location and power of every ON PU, followed by the SUs.
pub fn pus_sample(pus: &[Pu], sus: &[Su], is_allowed: bool) -> String {
    pu_block_sample(pus.iter().filter(|p| p.on), sus, is_allowed)
}

/// Same layout as [`pus_sample`] for an arbitrary PU selection.
pub fn pu_block_sample<'a>(
    pus: impl IntoIterator<Item = &'a Pu>,
    sus: &[Su],
    is_allowed: bool,
) -> String {
    let on: Vec<String> = pus.into_iter().map(Pu::to_string).collect();
    let mut parts = Vec::with_capacity(on.len() + 3);
    parts.push(on.len().to_string());
    parts.extend(on);
    with_sus(parts, sus, is_allowed)
}

/// Reading of every sensor, followed by the SUs.
pub fn sss_sample(sss: &[SpectrumSensor], sus: &[Su], is_allowed: bool) -> String {
    let mut parts = Vec::with_capacity(sss.len() + 3);
    parts.push(sss.len().to_string());
    parts.extend(sss.iter().map(|ss| format!("{:.3}", ss.received_power())));
    with_sus(parts, sus, is_allowed)
}

/// Requesting SU location and its maximum power.
pub fn max_power_sample(requesting: &Su, max_power: f64) -> String {
    format!("{},{:.3}", requesting.location(), max_power)
}

/// Jointly granted powers, one per SU.
pub fn joint_sample(joint: &JointPowers) -> String {
    joint
        .powers
        .iter()
        .map(|p| format!("{p:.3}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Element, Point, Tx};

    fn pu(id: &str, x: f64, y: f64, p: f64, on: bool) -> Pu {
        let mut pu = Pu::new(id, Tx::new(Element::new(Point::new(x, y), 30.0), p), Vec::new());
        pu.on = on;
        pu
    }

    fn su(id: &str, x: f64, y: f64, p: f64) -> Su {
        Su::new(id, Tx::new(Element::new(Point::new(x, y), 15.0), p))
    }

    #[test]
    fn test_pus_sample_skips_off_pus() {
        let pus = vec![pu("PU0", 1.0, 2.0, 10.0, true), pu("PU1", 5.0, 5.0, 3.0, false), pu("PU2", 7.5, 0.0, -2.25, true)];
        let sus = vec![su("SU0", 3.0, 4.0, -5.5)];
        assert_eq!(
            pus_sample(&pus, &sus, true),
            "2,1.000,2.000,10.000,7.500,0.000,-2.250,1,3.000,4.000,-5.500,1"
        );
    }

    #[test]
    fn test_sss_sample_has_sensor_count() {
        let mut a = SpectrumSensor::new(Element::new(Point::new(0.0, 0.0), 15.0), 1.0, 1.0);
        let mut b = a.clone();
        a.rx.received_power = -61.23456;
        b.rx.received_power = -70.0;
        let sus = vec![su("SU0", 1.0, 1.0, f64::NEG_INFINITY), su("SU1", 2.0, 2.0, 0.0)];
        assert_eq!(
            sss_sample(&[a, b], &sus, false),
            "2,-61.235,-70.000,2,1.000,1.000,-inf,2.000,2.000,0.000,0"
        );
    }

    #[test]
    fn test_no_pus_no_sus() {
        assert_eq!(pus_sample(&[], &[], false), "0,0,0");
    }

    #[test]
    fn test_max_power_and_joint_lines() {
        let s = su("SU0", 10.0, 20.0, 0.0);
        assert_eq!(max_power_sample(&s, 12.3456), "10.000,20.000,12.346");
        let joint = JointPowers {
            powers: vec![1.0, -2.5],
            high: vec![1.05, -2.45],
            iterations: 10,
            converged: true,
            feasible: true,
        };
        assert_eq!(joint_sample(&joint), "1.000,-2.500");
    }
}
