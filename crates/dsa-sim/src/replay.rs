//! Offline crowd-sourced evaluation from recorded samples.
//!
//! Reads a PU file and a sensor-reading file line by line in lockstep and
//! compares each crowd-sourced estimate with the requesting SU's recorded
//! power, which is taken as the true maximum.

use crate::error::{SimError, SimResult};
use crate::stats::WorkerStats;
use dsa_core::replay::{parse_pu_line, parse_sensor_line, DEFAULT_PUR_THRESHOLD};
use dsa_core::sensor::read_sensors;
use dsa_core::{CsParams, CsSpectrumManager, DsaError, SpectrumSensor};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// How recorded lines are read and evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySettings {
    /// Reading lines start with the sensor count
    pub counted: bool,
    pub pur_threshold: f64,
    pub params: CsParams,
    /// Indices into the sensor file; only these sensors are used, in file
    /// order. `None` uses all of them.
    pub selected: Option<Vec<usize>>,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            counted: false,
            pur_threshold: DEFAULT_PUR_THRESHOLD,
            params: CsParams::default(),
            selected: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub pus: PathBuf,
    pub readings: PathBuf,
    pub sensors: PathBuf,
    pub settings: ReplaySettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub valid: usize,
    pub invalid: usize,
    pub average_diff: Option<f64>,
    pub average_fp_diff: Option<f64>,
}

fn open(path: &Path) -> SimResult<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| SimError::io(path, e))
}

pub fn replay(opts: &ReplayOptions) -> SimResult<ReplayReport> {
    let sensors = read_sensors(&opts.sensors)?;
    let report = replay_from(open(&opts.pus)?, open(&opts.readings)?, sensors, &opts.settings)?;
    info!(
        valid = report.valid,
        invalid = report.invalid,
        average_diff = ?report.average_diff,
        average_fp_diff = ?report.average_fp_diff,
        "replay finished"
    );
    Ok(report)
}

fn check_selection(selected: &[usize], sensors: usize) -> SimResult<()> {
    match selected.iter().find(|&&i| i >= sensors) {
        Some(i) => Err(DsaError::InvalidInput(format!("sensor index {i} out of range, {sensors} sensors")).into()),
        None if selected.is_empty() => Err(DsaError::InvalidInput("empty sensor selection".to_string()).into()),
        None => Ok(()),
    }
}

/// Evaluate paired lines until either input ends. Blank line pairs are
/// skipped.
pub fn replay_from<P: BufRead, S: BufRead>(
    pu_lines: P,
    reading_lines: S,
    mut sensors: Vec<SpectrumSensor>,
    settings: &ReplaySettings,
) -> SimResult<ReplayReport> {
    if let Some(selected) = &settings.selected {
        check_selection(selected, sensors.len())?;
    }

    let mut acc = WorkerStats::default();
    let mut subset = Vec::new();
    for (i, (pu_line, reading_line)) in pu_lines.lines().zip(reading_lines.lines()).enumerate() {
        let line_no = i + 1;
        let pu_line = pu_line.map_err(|e| SimError::Io { path: "PU input".to_string(), source: e })?;
        let reading_line =
            reading_line.map_err(|e| SimError::Io { path: "reading input".to_string(), source: e })?;
        if pu_line.trim().is_empty() || reading_line.trim().is_empty() {
            continue;
        }

        let (pus, sus) = parse_pu_line(&pu_line, line_no, settings.pur_threshold)?;
        parse_sensor_line(&reading_line, line_no, &mut sensors, settings.counted)?;
        let Some(requesting) = sus.last() else {
            debug!(line = line_no, "no SU on line, skipped");
            continue;
        };
        let active: &[SpectrumSensor] = match &settings.selected {
            Some(selected) => {
                subset.clear();
                subset.extend(
                    sensors
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| selected.contains(i))
                        .map(|(_, ss)| ss.clone()),
                );
                &subset
            }
            None => &sensors,
        };
        let cs = CsSpectrumManager::new(&pus, active, &sus, settings.params);
        acc.record_cs(requesting.tx.power, cs.su_max_power());
    }

    let valid = acc.cs_valid;
    Ok(ReplayReport {
        valid,
        invalid: acc.cs_invalid,
        average_diff: (valid > 0).then(|| acc.cs_diff_sum / valid as f64),
        average_fp_diff: (valid > 0).then(|| acc.cs_fp_diff_sum / valid as f64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsa_core::sensor::write_sensors;
    use dsa_core::{Element, Interpolation, Point};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn sensors() -> Vec<SpectrumSensor> {
        [(0.0, 1.0), (3.0, 1.0), (6.0, 1.0), (9.0, 1.0)]
            .iter()
            .map(|&(x, y)| SpectrumSensor::new(Element::new(Point::new(x, y), 0.0), 1.0, 1.0))
            .collect()
    }

    fn settings() -> ReplaySettings {
        ReplaySettings {
            params: CsParams {
                k_pu: 2,
                k_ss: 2,
                interpolation: Interpolation::Ildw,
                alpha: 3.0,
                cell_size: 10.0,
                detrended: false,
            },
            ..Default::default()
        }
    }

    const PUS: &str = "2,2,3,5,8,6,0,1,5,5,-10\n\n1,4,4,0,0,1\n";
    const READINGS: &str = "-40,-45,-50,-55\n-30,-30,-30,-30\n-41,-42,-43,-44\n";

    #[test]
    fn test_replay_counts() {
        let report = replay_from(Cursor::new(PUS), Cursor::new(READINGS), sensors(), &settings()).unwrap();
        // the blank PU line is skipped, the line without SUs is not scored
        assert_eq!(report.valid + report.invalid, 1);
    }

    #[test]
    fn test_replay_is_repeatable() {
        let run = || {
            replay_from(Cursor::new(PUS), Cursor::new(READINGS), sensors(), &settings()).unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_replay_files() {
        let dir = TempDir::new().unwrap();
        let opts = ReplayOptions {
            pus: dir.path().join("pu.txt"),
            readings: dir.path().join("ss.txt"),
            sensors: dir.path().join("sensors.txt"),
            settings: ReplaySettings {
                counted: true,
                ..settings()
            },
        };
        std::fs::write(&opts.pus, "1,2,3,5,1,5,5,-10,1\n").unwrap();
        std::fs::write(&opts.readings, "4,-40,-45,-50,-55,1,5.000,5.000,-10.000,1\n").unwrap();
        write_sensors(&opts.sensors, &sensors()).unwrap();

        let report = replay(&opts).unwrap();
        assert_eq!(report.valid, 1);
        assert!(report.average_diff.unwrap() >= report.average_fp_diff.unwrap());
    }

    #[test]
    fn test_replay_parse_error_stops() {
        let err = replay_from(
            Cursor::new("1,2,x,5,1,5,5,-10\n"),
            Cursor::new("-40,-45,-50,-55\n"),
            sensors(),
            &settings(),
        )
        .unwrap_err();
        assert!(matches!(err, SimError::Core(dsa_core::DsaError::Parse { line: 1, .. })));
    }

    #[test]
    fn test_sensor_selection_changes_estimate() {
        let pus = "1,2,3,5,1,5,5,-10\n";
        let readings = "-40,-45,-50,-55\n";
        let all = replay_from(Cursor::new(pus), Cursor::new(readings), sensors(), &settings()).unwrap();
        let first_only = ReplaySettings {
            selected: Some(vec![0]),
            ..settings()
        };
        let picked = replay_from(Cursor::new(pus), Cursor::new(readings), sensors(), &first_only).unwrap();

        assert_eq!(all.valid, 1);
        assert_eq!(picked.valid, 1);
        assert_ne!(all.average_diff, picked.average_diff);
    }

    #[test]
    fn test_sensor_selection_out_of_range() {
        let out_of_range = ReplaySettings {
            selected: Some(vec![1, 4]),
            ..settings()
        };
        let err = replay_from(Cursor::new(""), Cursor::new(""), sensors(), &out_of_range).unwrap_err();
        assert!(matches!(err, SimError::Core(dsa_core::DsaError::InvalidInput(_))));
    }
}
