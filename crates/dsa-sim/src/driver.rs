//! Sample generation.
//!
//! A run builds one PU population, one sensor deployment and one
//! propagation model, then splits the samples over workers running on
//! rayon. Every worker owns deep copies of the PUs and sensors, its own
//! model instance and an RNG seeded with `seed + worker`, so a run is
//! reproducible for a fixed configuration.
//!
//! Per sample:
//!
//! ```text
//! PUs (dynamic) → SUs → oracle ─ −∞ → skip
//!                          │
//!                          ├─ joint / data rate / synthetic (optional)
//!                          ├─ crowd-sourced estimate (optional)
//!                          └─ sample lines
//! ```

use crate::config::{PropagationConfig, PuMode, SimConfig};
use crate::error::{SimError, SimResult};
use crate::output::{self, SampleKind, SampleWriters};
use crate::stats::{RunSummary, StatsRegistry, WorkerStats};
use dsa_core::sample::{joint_sample, max_power_sample, pus_sample, sss_sample};
use dsa_core::sensor::read_sensors;
use dsa_core::spread::{max_power_spread, Walk};
use dsa_core::{
    CsSpectrumManager, Element, IdAllocator, LogDistance, PathLossMap, PolarPoint, Point,
    PropagationError, PropagationModel, Pu, SpectrumManager, SpectrumSensor, Su, SyntheticPus,
    Tx, WeightTable,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::f64::consts::TAU;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    /// Merged sample files and the JSON summary
    pub files: Vec<PathBuf>,
}

/// Build the propagation model described by `config`.
pub fn build_model(config: &SimConfig) -> SimResult<PropagationModel> {
    Ok(match &config.propagation {
        PropagationConfig::LogDistance { alpha, std } => {
            PropagationModel::LogDistance(LogDistance::with_shadowing(*alpha, *std, config.run.seed))
        }
        PropagationConfig::PathLossMap { path } => PropagationModel::PathLossMap(PathLossMap::load(path)?),
    })
}

/// Place `pus.count` PUs with their PUR rings. All start ON.
pub fn build_pus<R: Rng + ?Sized>(
    config: &SimConfig,
    weights: Option<&WeightTable>,
    rng: &mut R,
) -> SimResult<Vec<Pu>> {
    let pc = &config.pus;
    let ids = IdAllocator::for_pus();
    let points = locations(config, weights, pc.count, rng)?;
    points
        .into_iter()
        .map(|p| -> SimResult<Pu> {
            let power = rng.gen_range(pc.min_power..=pc.max_power);
            let tx = Tx::new(Element::new(p, pc.height), power);
            Ok(Pu::with_layout(ids.next_id(), tx, &pc.purs, rng)?)
        })
        .collect()
}

/// Load the sensor file, or scatter sensors uniformly.
pub fn build_sensors<R: Rng + ?Sized>(config: &SimConfig, rng: &mut R) -> SimResult<Vec<SpectrumSensor>> {
    let sc = &config.sensors;
    match &sc.path {
        Some(path) => Ok(read_sensors(path)?),
        None => Ok(SpectrumSensor::scatter(
            &config.field.shape,
            sc.count,
            sc.height,
            sc.std,
            sc.cost,
            rng,
        )),
    }
}

fn locations<R: Rng + ?Sized>(
    config: &SimConfig,
    weights: Option<&WeightTable>,
    n: usize,
    rng: &mut R,
) -> SimResult<Vec<Point>> {
    let shape = &config.field.shape;
    Ok(match weights {
        Some(table) => shape.probability_points(table, n, rng)?,
        None => shape.points(n, rng),
    })
}

/// Generate every sample of a run and merge the worker files.
pub fn run(config: &SimConfig) -> SimResult<RunReport> {
    config.validate()?;
    let started = Instant::now();
    let mut rng = StdRng::seed_from_u64(config.run.seed);

    let weights = match &config.field.pu_weights {
        Some(path) => Some(WeightTable::load(path, &config.field.shape)?),
        None => None,
    };
    let model = build_model(config)?;
    let pus = build_pus(config, weights.as_ref(), &mut rng)?;
    let sss = build_sensors(config, &mut rng)?;
    info!(
        samples = config.run.samples,
        workers = config.run.workers,
        pus = pus.len(),
        sensors = sss.len(),
        "starting generation"
    );

    let registry = StatsRegistry::new();
    let workers = config.run.workers;
    let per_worker = config.run.samples / workers;
    let remainder = config.run.samples % workers;

    (0..workers)
        .into_par_iter()
        .map(|id| {
            let samples = per_worker + if id == 0 { remainder } else { 0 };
            let worker = Worker {
                id,
                samples,
                config,
                weights: weights.as_ref(),
                pus: pus.clone(),
                sss: sss.clone(),
                model: model.clone_for_worker(),
                rng: StdRng::seed_from_u64(config.run.seed.wrapping_add(id as u64)),
                su_ids: IdAllocator::for_sus(),
                computed_once: false,
            };
            let stats = worker.run().map_err(|e| e.in_worker(id))?;
            registry.record(stats);
            Ok(())
        })
        .collect::<SimResult<Vec<()>>>()?;

    let mut files = Vec::new();
    for kind in SampleKind::enabled(config) {
        files.push(output::merge(config, kind, workers, sss.len())?);
    }

    let mut summary = registry.summary();
    if config.extras.spread {
        let walk = Walk {
            start: config.field.shape.center(),
            height: config.sus.height,
            steps: config.extras.spread_steps,
            radius: config.extras.spread_radius,
        };
        summary.max_power_std = max_power_spread(&pus, &model, config.run.oracle_params(), walk, &mut rng);
        info!(std_db = ?summary.max_power_std, "max power spread");
    }
    let summary_path = config
        .run
        .output_dir
        .join(format!("summary_{}.json", output::run_label(config)));
    std::fs::write(&summary_path, summary.to_json()?).map_err(|e| SimError::io(&summary_path, e))?;
    files.push(summary_path);

    info!(
        recorded = summary.recorded,
        accepted = summary.accepted,
        discarded = summary.discarded,
        elapsed_secs = started.elapsed().as_secs_f64(),
        "generation finished"
    );
    Ok(RunReport { summary, files })
}

/// One worker's share of a run.
pub struct Worker<'a> {
    pub id: usize,
    pub samples: usize,
    pub config: &'a SimConfig,
    pub weights: Option<&'a WeightTable>,
    pub pus: Vec<Pu>,
    pub sss: Vec<SpectrumSensor>,
    pub model: PropagationModel,
    pub rng: StdRng,
    pub su_ids: IdAllocator,
    computed_once: bool,
}

impl<'a> Worker<'a> {
    pub fn new(
        id: usize,
        samples: usize,
        config: &'a SimConfig,
        pus: Vec<Pu>,
        sss: Vec<SpectrumSensor>,
        model: PropagationModel,
    ) -> Self {
        Self {
            id,
            samples,
            config,
            weights: None,
            pus,
            sss,
            model,
            rng: StdRng::seed_from_u64(config.run.seed.wrapping_add(id as u64)),
            su_ids: IdAllocator::for_sus(),
            computed_once: false,
        }
    }

    /// Generate this worker's samples into its own files.
    pub fn run(mut self) -> SimResult<WorkerStats> {
        let kinds = SampleKind::enabled(self.config);
        let mut writers = SampleWriters::create(&self.config.run.output_dir, &self.config.run.tag, self.id, &kinds)?;
        let mut stats = WorkerStats::new(self.id);
        let step = (self.samples / 10).max(1);

        for sample in 1..=self.samples {
            let begin = Instant::now();
            self.sample(&mut stats, &mut writers)?;
            stats.add_elapsed(begin.elapsed());
            if sample % step == 0 || sample == self.samples {
                info!(
                    worker = self.id,
                    percent = sample * 100 / self.samples,
                    recorded = stats.recorded,
                    "progress"
                );
            }
        }

        writers.finish()?;
        stats.fetches = self.model.fetch_count();
        Ok(stats)
    }

    /// Randomize the ON subset, locations and powers.
    fn activate_pus(&mut self) -> SimResult<()> {
        let pc = &self.config.pus;
        let n = self.rng.gen_range(pc.min_on..=pc.max_on);
        let points = locations(self.config, self.weights, n, &mut self.rng)?;

        let mut order: Vec<usize> = (0..self.pus.len()).collect();
        for pu in self.pus.iter_mut() {
            pu.on = false;
        }
        order.shuffle(&mut self.rng);
        for (&i, p) in order.iter().zip(points) {
            let pu = &mut self.pus[i];
            pu.on = true;
            pu.tx.element.location = p;
            pu.tx.power = self.rng.gen_range(pc.min_power..=pc.max_power);
        }
        Ok(())
    }

    /// Incumbents at −∞ followed by the requesting SU, each with a receiver
    /// nearby.
    fn create_sus(&mut self) -> Vec<Su> {
        let sc = &self.config.sus;
        let n = self.rng.gen_range(sc.min_count..=sc.max_count);
        let points = self.config.field.shape.points(n, &mut self.rng);
        points
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                let power = if i + 1 == n {
                    self.rng.gen_range(sc.min_power..=sc.max_power)
                } else {
                    f64::NEG_INFINITY
                };
                let offset = PolarPoint::new(
                    self.rng.gen_range(0.0..sc.rx_radius.max(f64::MIN_POSITIVE)),
                    self.rng.gen_range(0.0..TAU),
                );
                Su::new(self.su_ids.next_id(), Tx::new(Element::new(p, sc.height), power))
                    .with_rx(Element::new(p + Point::from(offset), sc.height))
            })
            .collect()
    }

    fn sample(&mut self, stats: &mut WorkerStats, writers: &mut SampleWriters) -> SimResult<()> {
        stats.samples += 1;
        let mut sus = self.create_sus();
        let single_request = self.config.sus.min_count == 1 && self.config.sus.max_count == 1;
        let skip = self.config.pus.mode == PuMode::Static && single_request && self.computed_once;
        if self.config.pus.mode == PuMode::Dynamic {
            self.activate_pus()?;
        }

        let lines = match self.evaluate(&mut sus, skip, stats) {
            Ok(lines) => lines,
            Err(e) => {
                warn!(worker = self.id, error = %e, "propagation failed, sample discarded");
                stats.discarded += 1;
                return Ok(());
            }
        };
        self.computed_once = true;

        if let Some(lines) = lines {
            stats.recorded += 1;
            for (kind, line) in lines {
                writers.write_line(kind, &line)?;
            }
        }
        Ok(())
    }

    /// Run the managers on one sample. `None` when the sample is skipped.
    fn evaluate(
        &mut self,
        sus: &mut [Su],
        skip: bool,
        stats: &mut WorkerStats,
    ) -> Result<Option<Vec<(SampleKind, String)>>, PropagationError> {
        let config = self.config;
        let params = config.run.oracle_params();
        let mut sm = SpectrumManager::new(&mut self.pus, &mut self.sss, sus, &self.model, params);
        let max = sm.compute_su_max_power(skip)?;
        if max == f64::NEG_INFINITY {
            if sm.pur_violated() {
                stats.pur_violated += 1;
            }
            debug!(worker = self.id, "no power for the request, sample skipped");
            return Ok(None);
        }

        let mut lines = Vec::with_capacity(5);
        if config.extras.joint {
            let joint = sm.compute_sus_total_max_power(config.extras.joint_max_iterations)?;
            if !joint.converged {
                stats.joint_unconverged += 1;
            }
            lines.push((SampleKind::SuMaxTotal, joint_sample(&joint)));
        }
        if config.extras.data_rate {
            let rates = sm.sus_data_rate(config.extras.bandwidth_hz)?;
            stats.data_rate_sum += rates.iter().sum::<f64>();
            stats.data_rate_count += rates.len();
        }

        if sm.is_allowed() {
            stats.accepted += 1;
        }
        if config.cs.enabled {
            let cs = CsSpectrumManager::new(sm.pus(), sm.sss(), sm.sus(), config.cs.params(params.cell_size));
            stats.record_cs(max, cs.su_max_power());
        }

        let allowed = sm.is_allowed();
        if config.extras.synthetic {
            if let Some(idx) = sm.most_restrictive_pu() {
                let synthetic = SyntheticPus::new(
                    sm.pus(),
                    idx,
                    config.extras.max_trans_radius,
                    config.pus.min_power,
                    params.cell_size,
                    &mut self.rng,
                );
                if synthetic.is_valid() {
                    stats.synthetic_written += 1;
                    lines.push((SampleKind::SyntheticPu, synthetic.sample(sm.sus(), allowed)));
                }
            }
        }

        lines.push((SampleKind::Pu, pus_sample(sm.pus(), sm.sus(), allowed)));
        lines.push((SampleKind::Sensor, sss_sample(sm.sss(), sm.sus(), allowed)));
        if let Some(requesting) = sm.sus().last() {
            lines.push((SampleKind::Max, max_power_sample(requesting, max)));
        }
        Ok(Some(lines))
    }
}
