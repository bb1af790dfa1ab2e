//! Parsing of recorded samples for offline crowd-sourced evaluation.
//!
//! A PU line is `#PUs, x,y,p, ..., #SUs, x,y,p, ...` with anything after the
//! last SU ignored, so PU sample files written by the generator replay as
//! is. Fields are comma separated; a line without commas is split on
//! whitespace. Every replayed PU gets a single THRESHOLD PUR at its own
//! location.

use crate::error::{DsaError, DsaResult};
use crate::geometry::{Element, Point, Tx};
use crate::pu::Pu;
use crate::pur::{InterferenceMethod, Pur};
use crate::sensor::SpectrumSensor;
use crate::su::Su;

/// PUR threshold (dB) used for replayed PUs unless configured otherwise.
pub const DEFAULT_PUR_THRESHOLD: f64 = 1.0;

fn columns(line: &str) -> Vec<&str> {
    let by_comma: Vec<&str> = line.split(',').map(str::trim).collect();
    if by_comma.len() >= 2 {
        by_comma
    } else {
        line.split_whitespace().collect()
    }
}

struct Cursor<'a> {
    cols: Vec<&'a str>,
    pos: usize,
    line_no: usize,
}

impl<'a> Cursor<'a> {
    fn new(line: &'a str, line_no: usize) -> Self {
        Self {
            cols: columns(line),
            pos: 0,
            line_no,
        }
    }

    fn float(&mut self, what: &str) -> DsaResult<f64> {
        let raw = self
            .cols
            .get(self.pos)
            .ok_or_else(|| DsaError::parse(self.line_no, format!("missing {what}")))?;
        self.pos += 1;
        raw.parse::<f64>()
            .map_err(|e| DsaError::parse(self.line_no, format!("{what} '{raw}': {e}")))
    }

    fn count(&mut self, what: &str) -> DsaResult<usize> {
        let v = self.float(what)?;
        if v < 0.0 || v.fract() != 0.0 || !v.is_finite() {
            return Err(DsaError::parse(self.line_no, format!("{what} must be a non-negative integer, got {v}")));
        }
        Ok(v as usize)
    }

    fn tx(&mut self, what: &str) -> DsaResult<Tx> {
        let x = self.float(what)?;
        let y = self.float(what)?;
        let power = self.float(what)?;
        Ok(Tx::new(Element::new(Point::new(x, y), 0.0), power))
    }
}

/// Parse one PU line into PUs and SUs.
pub fn parse_pu_line(line: &str, line_no: usize, pur_threshold: f64) -> DsaResult<(Vec<Pu>, Vec<Su>)> {
    let mut cur = Cursor::new(line, line_no);

    let n_pus = cur.count("PU count")?;
    let mut pus = Vec::with_capacity(n_pus);
    for i in 0..n_pus {
        let id = format!("PU{i}");
        let pur = Pur::new(
            format!("{id}_PUR0"),
            Element::new(Point::ORIGIN, 0.0),
            InterferenceMethod::Threshold,
            pur_threshold,
        )?;
        let tx = cur.tx("PU field")?;
        pus.push(Pu::new(id, tx, vec![pur]));
    }

    let n_sus = cur.count("SU count")?;
    let mut sus = Vec::with_capacity(n_sus);
    for i in 0..n_sus {
        sus.push(Su::new(format!("SU{i}"), cur.tx("SU field")?));
    }
    Ok((pus, sus))
}

/// Load one line of sensor readings into `sensors`.
///
/// With `counted` the line starts with the sensor count, as SS sample lines
/// do; it must match `sensors.len()`. Extra trailing fields are ignored.
pub fn parse_sensor_line(
    line: &str,
    line_no: usize,
    sensors: &mut [SpectrumSensor],
    counted: bool,
) -> DsaResult<()> {
    let mut cur = Cursor::new(line, line_no);
    if counted {
        let n = cur.count("sensor count")?;
        if n != sensors.len() {
            return Err(DsaError::parse(
                line_no,
                format!("line has {n} sensors, {} loaded", sensors.len()),
            ));
        }
    }
    for ss in sensors.iter_mut() {
        ss.rx.received_power = cur.float("sensor reading")?;
    }
    Ok(())
}
