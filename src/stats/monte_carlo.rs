//! Monte Carlo equity-curve simulation.
//!
//! A column of per-trade percent returns is fitted with one of three step
//! distributions, then many equity paths are compounded from an initial value:
//! `v[k + 1] = v[k] * (1 + x[k] / 100)`.
//!
//! Only per-step aggregates (mean, min, max) and the first
//! [`SAMPLE_PATHS`] paths are kept, so memory does not grow with the number of
//! simulations. Paths are simulated in parallel in fixed-size chunks; path `i`
//! draws from its own RNG seeded from `(seed, i)`, which makes a seeded run
//! reproducible regardless of the thread count.

use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, StudentT};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, StudentsT};
use statrs::statistics::{Data, Median, Statistics};
use thiserror::Error;

/// Paths kept for drawing.
pub const SAMPLE_PATHS: usize = 100;

pub const STEPS_RANGE: RangeInclusive<usize> = 10..=1000;
pub const INITIAL_VALUE_RANGE: RangeInclusive<f64> = 0.1..=100.0;
pub const SIMULATIONS_RANGE: RangeInclusive<usize> = 100..=100_000;

const CHUNK_SIZE: usize = 256;

#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error("the selected column has no numeric values")]
    EmptySample,
    #[error("cannot fit a {0} distribution to a sample with zero variance")]
    ZeroVariance(&'static str),
    #[error("{0} fit did not converge")]
    FitFailed(&'static str),
    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

// ---------------------------------------------------------------------------
// Step distributions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StepDistribution {
    #[default]
    Gaussian,
    StudentT,
    RawData,
}

impl StepDistribution {
    pub const ALL: [StepDistribution; 3] = [
        StepDistribution::Gaussian,
        StepDistribution::StudentT,
        StepDistribution::RawData,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StepDistribution::Gaussian => "Gaussian Normal",
            StepDistribution::StudentT => "Student T",
            StepDistribution::RawData => "Raw Data",
        }
    }
}

/// A step distribution with its parameters estimated from a sample.
#[derive(Debug, Clone, PartialEq)]
pub enum FittedDistribution {
    Gaussian { mu: f64, sigma: f64 },
    StudentT { dof: f64, loc: f64, scale: f64 },
    /// Bootstrap: draw from the sample with replacement.
    RawData(Vec<f64>),
}

impl FittedDistribution {
    /// Maximum-likelihood fit of `kind` to the finite values of `sample`.
    pub fn fit(kind: StepDistribution, sample: &[f64]) -> Result<Self, SimulationError> {
        let sample: Vec<f64> = sample.iter().copied().filter(|v| v.is_finite()).collect();
        if sample.is_empty() {
            return Err(SimulationError::EmptySample);
        }

        let fitted = match kind {
            StepDistribution::Gaussian => {
                let mu = sample.iter().mean();
                let sigma = if sample.len() > 1 {
                    sample.iter().population_std_dev()
                } else {
                    0.0
                };
                if sigma <= 0.0 {
                    return Err(SimulationError::ZeroVariance("Gaussian"));
                }
                FittedDistribution::Gaussian { mu, sigma }
            }
            StepDistribution::StudentT => {
                let (dof, loc, scale) = fit_student_t(&sample)?;
                FittedDistribution::StudentT { dof, loc, scale }
            }
            StepDistribution::RawData => FittedDistribution::RawData(sample),
        };
        log::debug!("fitted step distribution: {}", fitted.describe());
        Ok(fitted)
    }

    pub fn describe(&self) -> String {
        match self {
            FittedDistribution::Gaussian { mu, sigma } => {
                format!("Gaussian(mu = {mu:.4}, sigma = {sigma:.4})")
            }
            FittedDistribution::StudentT { dof, loc, scale } => {
                format!("Student T(df = {dof:.3}, loc = {loc:.4}, scale = {scale:.4})")
            }
            FittedDistribution::RawData(sample) => format!("Raw Data ({} values)", sample.len()),
        }
    }

    fn sampler(&self) -> Result<Sampler<'_>, SimulationError> {
        match self {
            FittedDistribution::Gaussian { mu, sigma } => Normal::new(*mu, *sigma)
                .map(Sampler::Normal)
                .map_err(|_| SimulationError::FitFailed("Gaussian")),
            FittedDistribution::StudentT { dof, loc, scale } => StudentT::new(*dof)
                .map(|t| Sampler::StudentT {
                    t,
                    loc: *loc,
                    scale: *scale,
                })
                .map_err(|_| SimulationError::FitFailed("Student T")),
            FittedDistribution::RawData(sample) if sample.is_empty() => {
                Err(SimulationError::EmptySample)
            }
            FittedDistribution::RawData(sample) => Ok(Sampler::Raw(sample)),
        }
    }
}

enum Sampler<'a> {
    Normal(Normal<f64>),
    StudentT {
        t: StudentT<f64>,
        loc: f64,
        scale: f64,
    },
    Raw(&'a [f64]),
}

impl Sampler<'_> {
    fn draw<R: Rng>(&self, rng: &mut R) -> f64 {
        match self {
            Sampler::Normal(n) => n.sample(rng),
            Sampler::StudentT { t, loc, scale } => loc + scale * t.sample(rng),
            Sampler::Raw(sample) => sample.choose(rng).copied().unwrap_or(0.0),
        }
    }
}

// -- Student's t maximum likelihood --

const DOF_BOUNDS: (f64, f64) = (0.1, 1000.0);

/// Fit `(dof, loc, scale)`.
///
/// For a given `dof`, location and scale come from the EM iteration for the
/// t location-scale family; `dof` is chosen by golden-section search on
/// `ln(dof)` maximising the profile log-likelihood.
fn fit_student_t(sample: &[f64]) -> Result<(f64, f64, f64), SimulationError> {
    if sample.len() < 2 || sample.iter().population_variance() <= 0.0 {
        return Err(SimulationError::ZeroVariance("Student T"));
    }

    let profile = |log_dof: f64| {
        let dof = log_dof.exp();
        let (loc, scale) = em_location_scale(sample, dof);
        (log_likelihood(sample, dof, loc, scale), loc, scale)
    };

    let inv_phi = (5f64.sqrt() - 1.0) / 2.0;
    let (mut a, mut b) = (DOF_BOUNDS.0.ln(), DOF_BOUNDS.1.ln());
    let mut c = b - inv_phi * (b - a);
    let mut d = a + inv_phi * (b - a);
    let mut fc = profile(c).0;
    let mut fd = profile(d).0;
    for _ in 0..60 {
        if fc > fd {
            b = d;
            d = c;
            fd = fc;
            c = b - inv_phi * (b - a);
            fc = profile(c).0;
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + inv_phi * (b - a);
            fd = profile(d).0;
        }
    }

    let log_dof = (a + b) / 2.0;
    let (ll, loc, scale) = profile(log_dof);
    if !ll.is_finite() || !loc.is_finite() || !(scale > 0.0) {
        return Err(SimulationError::FitFailed("Student T"));
    }
    Ok((log_dof.exp(), loc, scale))
}

fn em_location_scale(sample: &[f64], dof: f64) -> (f64, f64) {
    let n = sample.len() as f64;
    let mut loc = Data::new(sample.to_vec()).median();
    let mut scale = sample.iter().population_std_dev();

    for _ in 0..500 {
        let weights: Vec<f64> = sample
            .iter()
            .map(|x| {
                let z = (x - loc) / scale;
                (dof + 1.0) / (dof + z * z)
            })
            .collect();
        let w_sum: f64 = weights.iter().sum();
        let new_loc = sample.iter().zip(&weights).map(|(x, w)| w * x).sum::<f64>() / w_sum;
        let new_scale = (sample
            .iter()
            .zip(&weights)
            .map(|(x, w)| w * (x - new_loc).powi(2))
            .sum::<f64>()
            / n)
            .sqrt();

        let converged = (new_loc - loc).abs() <= 1e-10 * (1.0 + loc.abs())
            && (new_scale - scale).abs() <= 1e-10 * (1.0 + scale);
        loc = new_loc;
        scale = new_scale;
        if converged || !(scale > 0.0) {
            break;
        }
    }
    (loc, scale)
}

fn log_likelihood(sample: &[f64], dof: f64, loc: f64, scale: f64) -> f64 {
    match StudentsT::new(loc, scale, dof) {
        Ok(dist) => sample.iter().map(|&x| dist.ln_pdf(x)).sum(),
        Err(_) => f64::NEG_INFINITY,
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    /// Trades per path.
    pub steps: usize,
    pub initial_value: f64,
    /// Number of paths.
    pub simulations: usize,
    /// `None` draws a fresh seed for every run.
    pub seed: Option<u64>,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            steps: 100,
            initial_value: 1.0,
            simulations: 10_000,
            seed: None,
        }
    }
}

impl SimulationParams {
    pub fn validate(&self) -> Result<(), SimulationError> {
        fn check(
            name: &'static str,
            value: f64,
            range: RangeInclusive<f64>,
        ) -> Result<(), SimulationError> {
            if range.contains(&value) {
                Ok(())
            } else {
                Err(SimulationError::OutOfRange {
                    name,
                    value,
                    min: *range.start(),
                    max: *range.end(),
                })
            }
        }
        let as_f64 = |r: &RangeInclusive<usize>| *r.start() as f64..=*r.end() as f64;
        check("Number of steps", self.steps as f64, as_f64(&STEPS_RANGE))?;
        check("Initial value", self.initial_value, INITIAL_VALUE_RANGE)?;
        check(
            "Number of simulations",
            self.simulations as f64,
            as_f64(&SIMULATIONS_RANGE),
        )
    }
}

/// Per-step aggregates over every simulated path (each of length `steps + 1`).
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub mean: Vec<f64>,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    /// The first [`SAMPLE_PATHS`] paths, in path order.
    pub sample_paths: Vec<Vec<f64>>,
    pub simulations: usize,
    pub seed: u64,
}

/// Headline numbers shown above the chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationSummary {
    /// Lowest equity reached by any path.
    pub max_drawdown: f64,
    /// Median of the mean trajectory.
    pub median_value: f64,
    /// Mean of the mean trajectory.
    pub mean_value: f64,
}

impl SimulationResult {
    pub fn summary(&self) -> SimulationSummary {
        SimulationSummary {
            max_drawdown: self.min.iter().copied().fold(f64::INFINITY, f64::min),
            median_value: Data::new(self.mean.clone()).median(),
            mean_value: self.mean.iter().mean(),
        }
    }
}

#[derive(Debug, Clone)]
struct Accumulator {
    sum: Vec<f64>,
    min: Vec<f64>,
    max: Vec<f64>,
    samples: Vec<Vec<f64>>,
}

impl Accumulator {
    fn new(width: usize) -> Self {
        Self {
            sum: vec![0.0; width],
            min: vec![f64::INFINITY; width],
            max: vec![f64::NEG_INFINITY; width],
            samples: Vec::new(),
        }
    }

    fn add(&mut self, path: &[f64]) {
        for (k, &v) in path.iter().enumerate() {
            self.sum[k] += v;
            self.min[k] = self.min[k].min(v);
            self.max[k] = self.max[k].max(v);
        }
    }

    fn merge(mut self, other: Accumulator) -> Self {
        for k in 0..self.sum.len() {
            self.sum[k] += other.sum[k];
            self.min[k] = self.min[k].min(other.min[k]);
            self.max[k] = self.max[k].max(other.max[k]);
        }
        self.samples.extend(other.samples);
        self
    }
}

fn path_rng(seed: u64, path: usize) -> StdRng {
    StdRng::seed_from_u64(seed ^ (path as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

fn simulate_path(sampler: &Sampler<'_>, params: &SimulationParams, rng: &mut StdRng) -> Vec<f64> {
    let mut path = Vec::with_capacity(params.steps + 1);
    let mut value = params.initial_value;
    path.push(value);
    for _ in 0..params.steps {
        value *= 1.0 + sampler.draw(rng) / 100.0;
        path.push(value);
    }
    path
}

/// Simulate `params.simulations` equity paths with steps drawn from `dist`.
pub fn simulate(
    dist: &FittedDistribution,
    params: &SimulationParams,
) -> Result<SimulationResult, SimulationError> {
    params.validate()?;
    let sampler = dist.sampler()?;
    let seed = params.seed.unwrap_or_else(rand::random);
    let width = params.steps + 1;
    let n_chunks = params.simulations.div_ceil(CHUNK_SIZE);

    log::info!(
        "simulating {} paths x {} steps with {} (seed {seed})",
        params.simulations,
        params.steps,
        dist.describe()
    );

    // Chunks are merged in order so floating-point sums do not depend on scheduling.
    let partials: Vec<Accumulator> = (0..n_chunks)
        .into_par_iter()
        .map(|chunk| {
            let mut acc = Accumulator::new(width);
            let start = chunk * CHUNK_SIZE;
            let end = (start + CHUNK_SIZE).min(params.simulations);
            for i in start..end {
                let path = simulate_path(&sampler, params, &mut path_rng(seed, i));
                acc.add(&path);
                if i < SAMPLE_PATHS {
                    acc.samples.push(path);
                }
            }
            acc
        })
        .collect();

    let total = partials
        .into_iter()
        .fold(Accumulator::new(width), Accumulator::merge);

    let n = params.simulations as f64;
    Ok(SimulationResult {
        mean: total.sum.iter().map(|s| s / n).collect(),
        min: total.min,
        max: total.max,
        sample_paths: total.samples,
        simulations: params.simulations,
        seed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(seed: u64) -> SimulationParams {
        SimulationParams {
            steps: 50,
            initial_value: 1.0,
            simulations: 1000,
            seed: Some(seed),
        }
    }

    fn returns() -> Vec<f64> {
        vec![2.0, -1.0, 1.5, -0.5, 3.0, -2.0, 0.5, 1.0, -1.5, 2.5]
    }

    #[test]
    fn gaussian_fit_is_mean_and_population_std() {
        let fitted = FittedDistribution::fit(StepDistribution::Gaussian, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        match fitted {
            FittedDistribution::Gaussian { mu, sigma } => {
                assert!((mu - 2.5).abs() < 1e-12);
                assert!((sigma - 1.25f64.sqrt()).abs() < 1e-12);
            }
            other => panic!("unexpected fit {other:?}"),
        }
    }

    #[test]
    fn student_t_fit_recovers_location_and_scale() {
        let mut rng = StdRng::seed_from_u64(7);
        let t = StudentT::new(4.0).unwrap();
        let sample: Vec<f64> = (0..4000).map(|_| 1.0 + 2.0 * t.sample(&mut rng)).collect();

        let FittedDistribution::StudentT { dof, loc, scale } =
            FittedDistribution::fit(StepDistribution::StudentT, &sample).unwrap()
        else {
            panic!("expected a Student T fit");
        };
        assert!((loc - 1.0).abs() < 0.15, "loc = {loc}");
        assert!((scale - 2.0).abs() < 0.25, "scale = {scale}");
        assert!(dof > 2.5 && dof < 7.0, "dof = {dof}");
    }

    #[test]
    fn fitting_rejects_empty_and_constant_samples() {
        assert_eq!(
            FittedDistribution::fit(StepDistribution::RawData, &[]),
            Err(SimulationError::EmptySample)
        );
        assert_eq!(
            FittedDistribution::fit(StepDistribution::Gaussian, &[1.0, 1.0]),
            Err(SimulationError::ZeroVariance("Gaussian"))
        );
        assert_eq!(
            FittedDistribution::fit(StepDistribution::StudentT, &[f64::NAN, 3.0]),
            Err(SimulationError::ZeroVariance("Student T"))
        );
    }

    #[test]
    fn paths_have_expected_shape_and_bounds() {
        let dist = FittedDistribution::fit(StepDistribution::RawData, &returns()).unwrap();
        let result = simulate(&dist, &params(1)).unwrap();

        assert_eq!(result.mean.len(), 51);
        assert_eq!(result.sample_paths.len(), SAMPLE_PATHS);
        assert!(result.sample_paths.iter().all(|p| p.len() == 51));
        assert_eq!(result.mean[0], 1.0);
        assert_eq!(result.min[0], 1.0);
        assert_eq!(result.max[0], 1.0);
        for k in 0..result.mean.len() {
            assert!(result.min[k] <= result.mean[k] && result.mean[k] <= result.max[k]);
        }
    }

    #[test]
    fn bootstrap_steps_come_from_the_sample() {
        let sample = returns();
        let dist = FittedDistribution::RawData(sample.clone());
        let result = simulate(&dist, &params(3)).unwrap();
        for path in &result.sample_paths {
            for pair in path.windows(2) {
                let step = (pair[1] / pair[0] - 1.0) * 100.0;
                assert!(sample.iter().any(|s| (s - step).abs() < 1e-9), "step {step}");
            }
        }
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let dist = FittedDistribution::fit(StepDistribution::Gaussian, &returns()).unwrap();
        let a = simulate(&dist, &params(42)).unwrap();
        let b = simulate(&dist, &params(42)).unwrap();
        let c = simulate(&dist, &params(43)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.sample_paths, c.sample_paths);
    }

    #[test]
    fn seeded_runs_do_not_depend_on_thread_count() {
        let dist = FittedDistribution::fit(StepDistribution::StudentT, &returns()).unwrap();
        let parallel = simulate(&dist, &params(7)).unwrap();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let single = pool.install(|| simulate(&dist, &params(7))).unwrap();
        assert_eq!(single, parallel);
    }

    #[test]
    fn summary_reads_the_aggregate_trajectories() {
        let result = SimulationResult {
            mean: vec![1.0, 1.2, 0.9, 1.5],
            min: vec![1.0, 0.8, 0.6, 0.7],
            max: vec![1.0, 1.6, 1.3, 2.2],
            sample_paths: Vec::new(),
            simulations: 2,
            seed: 0,
        };
        let s = result.summary();
        assert_eq!(s.max_drawdown, 0.6);
        assert!((s.median_value - 1.1).abs() < 1e-12);
        assert!((s.mean_value - 1.15).abs() < 1e-12);
    }

    #[test]
    fn params_outside_their_ranges_are_rejected() {
        let mut p = SimulationParams::default();
        assert!(p.validate().is_ok());
        p.steps = 5;
        assert!(matches!(
            p.validate(),
            Err(SimulationError::OutOfRange { name: "Number of steps", .. })
        ));
        p = SimulationParams {
            initial_value: 0.0,
            ..SimulationParams::default()
        };
        assert!(p.validate().is_err());
        p = SimulationParams {
            simulations: 200_000,
            ..SimulationParams::default()
        };
        assert!(p.validate().is_err());
    }
}
