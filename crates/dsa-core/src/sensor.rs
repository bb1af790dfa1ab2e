//! Spectrum sensors and the sensor file format.
//!
//! One sensor per line: `(x, y), height, std, cost`. Coordinates are cells;
//! blank lines are ignored.

use crate::error::{DsaError, DsaResult};
use crate::geometry::{Element, Point, Rx};
use crate::shape::Shape;
use rand::Rng;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Ambient power meter.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumSensor {
    pub rx: Rx,
    pub std: f64,
    pub cost: f64,
}

impl SpectrumSensor {
    pub fn new(element: Element, std: f64, cost: f64) -> Self {
        Self {
            rx: Rx::new(element),
            std,
            cost,
        }
    }

    pub fn location(&self) -> Point {
        self.rx.element.location
    }

    pub fn received_power(&self) -> f64 {
        self.rx.received_power
    }

    /// Place `n` sensors uniformly at random inside `shape`.
    pub fn scatter<R: Rng + ?Sized>(
        shape: &Shape,
        n: usize,
        height: f64,
        std: f64,
        cost: f64,
        rng: &mut R,
    ) -> Vec<SpectrumSensor> {
        shape
            .points(n, rng)
            .into_iter()
            .map(|p| SpectrumSensor::new(Element::new(p, height), std, cost))
            .collect()
    }

    /// Parse a single `(x, y), height, std, cost` line.
    pub fn parse_line(line: &str, line_no: usize) -> DsaResult<Self> {
        let line = line.trim();
        let open = line
            .find('(')
            .ok_or_else(|| DsaError::parse(line_no, "missing '('"))?;
        let close = line
            .find(')')
            .ok_or_else(|| DsaError::parse(line_no, "missing ')'"))?;
        if close < open {
            return Err(DsaError::parse(line_no, "')' before '('"));
        }

        let coords = parse_floats(&line[open + 1..close], line_no)?;
        let rest = parse_floats(line[close + 1..].trim_start_matches(|c: char| c == ',' || c.is_whitespace()), line_no)?;
        match (coords.as_slice(), rest.as_slice()) {
            ([x, y], [height, std, cost]) => Ok(SpectrumSensor::new(
                Element::new(Point::new(*x, *y), *height),
                *std,
                *cost,
            )),
            _ => Err(DsaError::parse(
                line_no,
                "expected '(x, y), height, std, cost'",
            )),
        }
    }

    pub fn to_line(&self) -> String {
        let p = self.location();
        format!(
            "({}, {}), {}, {}, {}",
            p.x, p.y, self.rx.element.height, self.std, self.cost
        )
    }
}

fn parse_floats(s: &str, line_no: usize) -> DsaResult<Vec<f64>> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<f64>()
                .map_err(|e| DsaError::parse(line_no, format!("'{t}': {e}")))
        })
        .collect()
}

/// Read sensors from any buffered reader.
pub fn read_sensors_from<R: BufRead>(reader: R) -> DsaResult<Vec<SpectrumSensor>> {
    let mut sensors = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| DsaError::parse(i + 1, e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        sensors.push(SpectrumSensor::parse_line(&line, i + 1)?);
    }
    Ok(sensors)
}

/// Read a sensor file.
pub fn read_sensors(path: &Path) -> DsaResult<Vec<SpectrumSensor>> {
    let file = File::open(path).map_err(|e| DsaError::io(path, e))?;
    let sensors = read_sensors_from(BufReader::new(file))?;
    tracing::debug!(path = %path.display(), count = sensors.len(), "loaded sensors");
    Ok(sensors)
}

/// Write sensors in the same format [`read_sensors`] accepts.
pub fn write_sensors(path: &Path, sensors: &[SpectrumSensor]) -> DsaResult<()> {
    let mut file = File::create(path).map_err(|e| DsaError::io(path, e))?;
    for sensor in sensors {
        writeln!(file, "{}", sensor.to_line()).map_err(|e| DsaError::io(path, e))?;
    }
    Ok(())
}
