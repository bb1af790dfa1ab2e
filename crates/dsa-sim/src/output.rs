//! Sample files.
//!
//! Each worker writes its own `<kind>_<tag>_<worker>.txt` files. After all
//! workers finish, the parts of each kind are concatenated in worker order
//! into one file named after the run parameters and then removed.

use crate::config::{PropagationConfig, PuMode, SimConfig};
use crate::error::{SimError, SimResult};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Kinds of sample files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SampleKind {
    Pu,
    Sensor,
    Max,
    SuMaxTotal,
    SyntheticPu,
}

impl SampleKind {
    /// Per-worker file prefix.
    pub fn prefix(&self) -> &'static str {
        match self {
            SampleKind::Pu => "pu",
            SampleKind::Sensor => "sensor",
            SampleKind::Max => "max",
            SampleKind::SuMaxTotal => "suMaxTotal",
            SampleKind::SyntheticPu => "syntheticPu",
        }
    }

    fn merged_stem(&self, sensors: usize) -> String {
        match self {
            SampleKind::Pu => "using_pus".to_string(),
            SampleKind::Sensor => format!("{sensors}sensor"),
            SampleKind::Max => "max_power".to_string(),
            SampleKind::SuMaxTotal => "maximum_total_sus".to_string(),
            SampleKind::SyntheticPu => "synthetic".to_string(),
        }
    }

    /// Kinds a run with `config` produces.
    pub fn enabled(config: &SimConfig) -> Vec<SampleKind> {
        let mut kinds = vec![SampleKind::Pu, SampleKind::Sensor, SampleKind::Max];
        if config.extras.joint {
            kinds.push(SampleKind::SuMaxTotal);
        }
        if config.extras.synthetic {
            kinds.push(SampleKind::SyntheticPu);
        }
        kinds
    }
}

pub fn part_path(dir: &Path, kind: SampleKind, tag: &str, worker: usize) -> PathBuf {
    dir.join(format!("{}_{}_{}.txt", kind.prefix(), tag, worker))
}

/// One worker's open sample files.
pub struct SampleWriters {
    files: BTreeMap<SampleKind, (PathBuf, BufWriter<File>)>,
}

impl SampleWriters {
    pub fn create(dir: &Path, tag: &str, worker: usize, kinds: &[SampleKind]) -> SimResult<Self> {
        fs::create_dir_all(dir).map_err(|e| SimError::io(dir, e))?;
        let mut files = BTreeMap::new();
        for &kind in kinds {
            let path = part_path(dir, kind, tag, worker);
            let file = File::create(&path).map_err(|e| SimError::io(&path, e))?;
            files.insert(kind, (path, BufWriter::new(file)));
        }
        Ok(Self { files })
    }

    /// Append a line. Kinds that were not opened are ignored.
    pub fn write_line(&mut self, kind: SampleKind, line: &str) -> SimResult<()> {
        if let Some((path, w)) = self.files.get_mut(&kind) {
            writeln!(w, "{line}").map_err(|e| SimError::io(path, e))?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> SimResult<()> {
        for (path, w) in self.files.values_mut() {
            w.flush().map_err(|e| SimError::io(path, e))?;
        }
        Ok(())
    }
}

/// Run description used in merged file names, e.g.
/// `1000_min5_max10PUs_1SUs_square100grid_log3.0`.
pub fn run_label(config: &SimConfig) -> String {
    fn range(lo: usize, hi: usize) -> String {
        if lo == hi {
            hi.to_string()
        } else {
            format!("min{lo}_max{hi}")
        }
    }
    let pus = match config.pus.mode {
        PuMode::Static => config.pus.count.to_string(),
        PuMode::Dynamic => range(config.pus.min_on, config.pus.max_on),
    };
    let model = match &config.propagation {
        PropagationConfig::LogDistance { alpha, std } if *std > 0.0 => format!("log{alpha:.1}_noisy_std{std}"),
        PropagationConfig::LogDistance { alpha, .. } => format!("log{alpha:.1}"),
        PropagationConfig::PathLossMap { .. } => "plmap".to_string(),
    };
    format!(
        "{}_{}PUs_{}SUs_{}grid_{}",
        config.run.samples,
        pus,
        range(config.sus.min_count, config.sus.max_count),
        config.field.shape,
        model
    )
}

/// Concatenate the worker parts of `kind` into
/// `<mode>_pus_<stem>_<label>.txt` and delete the parts. Missing parts are
/// skipped.
pub fn merge(config: &SimConfig, kind: SampleKind, workers: usize, sensors: usize) -> SimResult<PathBuf> {
    let dir = &config.run.output_dir;
    let mode = match config.pus.mode {
        PuMode::Static => "static",
        PuMode::Dynamic => "dynamic",
    };
    let target = dir.join(format!(
        "{mode}_pus_{}_{}.txt",
        kind.merged_stem(sensors),
        run_label(config)
    ));
    let parts: Vec<PathBuf> = (0..workers)
        .map(|w| part_path(dir, kind, &config.run.tag, w))
        .collect();
    let lines = concat(&parts, &target)?;
    for part in &parts {
        if part.exists() {
            fs::remove_file(part).map_err(|e| SimError::io(part, e))?;
        }
    }
    info!(file = %target.display(), lines, "merged {} samples", kind.prefix());
    Ok(target)
}

/// Append every existing file of `parts` to `target`. Returns the line
/// count.
pub fn concat(parts: &[PathBuf], target: &Path) -> SimResult<usize> {
    let out = File::create(target).map_err(|e| SimError::io(target, e))?;
    let mut out = BufWriter::new(out);
    let mut lines = 0;
    for part in parts {
        let file = match File::open(part) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(part = %part.display(), "no part to merge");
                continue;
            }
            Err(e) => return Err(SimError::io(part, e)),
        };
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| SimError::io(part, e))?;
            writeln!(out, "{line}").map_err(|e| SimError::io(target, e))?;
            lines += 1;
        }
    }
    out.flush().map_err(|e| SimError::io(target, e))?;
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writers_and_merge() {
        let dir = TempDir::new().unwrap();
        let mut config = SimConfig::default();
        config.run.output_dir = dir.path().to_path_buf();
        config.run.tag = "t".to_string();

        let kinds = SampleKind::enabled(&config);
        for w in 0..2 {
            let mut writers = SampleWriters::create(dir.path(), "t", w, &kinds).unwrap();
            writers.write_line(SampleKind::Pu, &format!("pu line {w}")).unwrap();
            writers.write_line(SampleKind::Max, &format!("max line {w}")).unwrap();
            // not enabled by default
            writers.write_line(SampleKind::SuMaxTotal, "ignored").unwrap();
            writers.finish().unwrap();
        }
        assert!(part_path(dir.path(), SampleKind::Pu, "t", 1).exists());

        let merged = merge(&config, SampleKind::Pu, 2, 100).unwrap();
        assert_eq!(fs::read_to_string(&merged).unwrap(), "pu line 0\npu line 1\n");
        assert!(!part_path(dir.path(), SampleKind::Pu, "t", 0).exists());
        assert!(merged
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("dynamic_pus_using_pus_1000_min5_max10PUs_1SUs_square100grid_log3.0"));

        let merged = merge(&config, SampleKind::Sensor, 2, 100).unwrap();
        assert_eq!(fs::read_to_string(merged).unwrap(), "");
    }

    #[test]
    fn test_concat_skips_missing_parts() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        fs::write(&a, "1\n2\n").unwrap();
        let target = dir.path().join("out.txt");
        let n = concat(&[a, dir.path().join("missing.txt")], &target).unwrap();
        assert_eq!(n, 2);
    }

    #[test]
    fn test_run_label() {
        let mut config = SimConfig::default();
        config.pus.mode = PuMode::Static;
        config.sus.max_count = 3;
        config.propagation = PropagationConfig::LogDistance { alpha: 3.5, std: 1.0 };
        assert_eq!(
            run_label(&config),
            "1000_20PUs_min1_max3SUs_square100grid_log3.5_noisy_std1"
        );
    }
}
