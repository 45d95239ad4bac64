//! Variogram computation and model fitting
//!
//! Computes the experimental variogram of a point set and fits one of the
//! closed set of theoretical models to it. Prerequisite for kriging.
//!
//! The semivariance γ(h) measures spatial dissimilarity as a function of
//! separation distance h:
//! ```text
//! γ(h) = (1/2N(h)) Σ [z(xᵢ) - z(xⱼ)]²   for all pairs with |xᵢ-xⱼ| in bin h
//! ```
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.

use rand::Rng;
use serde::{Deserialize, Serialize};
use terrasurf_core::{Error, Result, SurveyPoint};

/// Points drawn to estimate the maximum pairwise distance
const MAX_LAG_SAMPLE: usize = 100;

/// Points whose pairs are binned; larger sets are subsampled
const MAX_BIN_POINTS: usize = 2000;

/// Sill assigned when every semivariance is zero
const FLAT_SILL: f64 = 1e-6;

const NUGGET_STEPS: [f64; 5] = [0.0, 0.5, 1.0, 1.5, 2.0];
const SILL_STEPS: [f64; 7] = [0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 5.0];
const RANGE_STEPS: [f64; 8] = [0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 5.0];

/// Theoretical variogram model type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariogramModel {
    /// γ(h) = c₀ + c·[1.5(h/a) - 0.5(h/a)³] for h < a; c₀+c beyond
    Spherical,
    /// γ(h) = c₀ + c·[1 - exp(-3h/a)]
    Exponential,
    /// γ(h) = c₀ + c·[1 - exp(-3h²/a²)]
    Gaussian,
    /// γ(h) = c₀ + c·h/a for h < a; c₀+c beyond
    Linear,
}

impl VariogramModel {
    /// Models tried by [`fit_best_variogram`]
    pub const FITTED: [VariogramModel; 3] = [
        VariogramModel::Spherical,
        VariogramModel::Exponential,
        VariogramModel::Gaussian,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            VariogramModel::Spherical => "spherical",
            VariogramModel::Exponential => "exponential",
            VariogramModel::Gaussian => "gaussian",
            VariogramModel::Linear => "linear",
        }
    }
}

/// Variogram model parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariogramParams {
    pub model: VariogramModel,
    /// Nugget (c₀): discontinuity at the origin, ≥ 0
    pub nugget: f64,
    /// Sill (c₀ + c): plateau value, ≥ nugget
    pub sill: f64,
    /// Range (a): distance at which the plateau is (practically) reached, > 0
    pub range: f64,
}

impl VariogramParams {
    pub fn new(model: VariogramModel, nugget: f64, sill: f64, range: f64) -> Self {
        Self {
            model,
            nugget,
            sill,
            range,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.nugget.is_finite() && self.nugget >= 0.0) {
            return Err(Error::invalid_parameter("nugget", self.nugget, "must be finite and >= 0"));
        }
        if !(self.sill.is_finite() && self.sill >= self.nugget) {
            return Err(Error::invalid_parameter("sill", self.sill, "must be finite and >= nugget"));
        }
        if !(self.range.is_finite() && self.range > 0.0) {
            return Err(Error::invalid_parameter("range", self.range, "must be finite and > 0"));
        }
        Ok(())
    }

    /// Partial sill c = sill - nugget
    pub fn partial_sill(&self) -> f64 {
        self.sill - self.nugget
    }

    /// Semivariance at separation `h`. γ(0) = 0 for every model.
    pub fn evaluate(&self, h: f64) -> f64 {
        if h <= 0.0 {
            return 0.0;
        }

        let c0 = self.nugget;
        let c = self.partial_sill();
        let a = self.range;

        match self.model {
            VariogramModel::Spherical => {
                if h >= a {
                    self.sill
                } else {
                    let r = h / a;
                    c0 + c * (1.5 * r - 0.5 * r * r * r)
                }
            }
            VariogramModel::Exponential => c0 + c * (1.0 - (-3.0 * h / a).exp()),
            VariogramModel::Gaussian => c0 + c * (1.0 - (-3.0 * h * h / (a * a)).exp()),
            VariogramModel::Linear => {
                if h >= a {
                    self.sill
                } else {
                    c0 + c * h / a
                }
            }
        }
    }

    /// Covariance C(h) = sill - γ(h)
    pub fn covariance(&self, h: f64) -> f64 {
        self.sill - self.evaluate(h)
    }
}

/// Experimental variogram: non-empty lag bins in increasing lag order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentalVariogram {
    /// Mean pair distance in each bin
    pub lags: Vec<f64>,
    /// γ at each lag
    pub semivariance: Vec<f64>,
    /// Number of point pairs in each bin
    pub pair_counts: Vec<usize>,
    /// Upper bound of the binned distances
    pub max_lag: f64,
}

impl ExperimentalVariogram {
    pub fn len(&self) -> usize {
        self.lags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lags.is_empty()
    }

    fn max_semivariance(&self) -> f64 {
        self.semivariance.iter().copied().fold(0.0, f64::max)
    }
}

/// Result of fitting one model
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VariogramFit {
    pub params: VariogramParams,
    /// Σ N(h)·(γ̂(h) - γ(h))²
    pub loss: f64,
}

/// Compute the experimental variogram of `points`.
///
/// The maximum lag is half the largest pairwise distance within a random
/// sample of at most 100 points. Every pair closer than that is binned into
/// `lag_count` equal-width bins; sets larger than 2000 points bin the pairs
/// of a random 2000-point subset instead. Empty bins are dropped.
pub fn experimental_variogram<R: Rng + ?Sized>(
    points: &[SurveyPoint],
    lag_count: usize,
    rng: &mut R,
) -> Result<ExperimentalVariogram> {
    let n = points.len();
    if n < 2 {
        return Err(Error::InsufficientPoints {
            required: 2,
            found: n,
        });
    }
    if lag_count == 0 {
        return Err(Error::invalid_parameter("lag_count", lag_count, "must be >= 1"));
    }

    let sample: Vec<usize> = if n <= MAX_LAG_SAMPLE {
        (0..n).collect()
    } else {
        rand::seq::index::sample(rng, n, MAX_LAG_SAMPLE).into_vec()
    };

    let mut max_dist = 0.0_f64;
    for (k, &i) in sample.iter().enumerate() {
        for &j in &sample[k + 1..] {
            max_dist = max_dist.max(points[i].planar_distance(&points[j]));
        }
    }
    let max_lag = max_dist / 2.0;
    if !(max_lag > 0.0) {
        return Err(Error::DegenerateGeometry(
            "all variogram sample points share one location".into(),
        ));
    }

    let width = max_lag / lag_count as f64;
    let mut sums = vec![0.0_f64; lag_count];
    let mut dists = vec![0.0_f64; lag_count];
    let mut counts = vec![0_usize; lag_count];

    let binned: Vec<usize> = if n <= MAX_BIN_POINTS {
        (0..n).collect()
    } else {
        rand::seq::index::sample(rng, n, MAX_BIN_POINTS).into_vec()
    };

    for (k, &i) in binned.iter().enumerate() {
        let a = &points[i];
        for &j in &binned[k + 1..] {
            let b = &points[j];
            let d = a.planar_distance(b);
            if d <= 0.0 || d >= max_lag {
                continue;
            }
            let bin = ((d / width) as usize).min(lag_count - 1);
            let dz = a.z - b.z;
            sums[bin] += dz * dz;
            dists[bin] += d;
            counts[bin] += 1;
        }
    }

    let mut ev = ExperimentalVariogram {
        lags: Vec::with_capacity(lag_count),
        semivariance: Vec::with_capacity(lag_count),
        pair_counts: Vec::with_capacity(lag_count),
        max_lag,
    };
    for bin in 0..lag_count {
        let count = counts[bin];
        if count == 0 {
            continue;
        }
        ev.lags.push(dists[bin] / count as f64);
        ev.semivariance.push(sums[bin] / (2.0 * count as f64));
        ev.pair_counts.push(count);
    }

    Ok(ev)
}

/// Initial (nugget, sill, range) guesses the grid search scales.
fn initial_guess(ev: &ExperimentalVariogram) -> (f64, f64, f64) {
    let sill = ev.max_semivariance();

    let g0 = ev.semivariance[0];
    let nugget = if ev.len() >= 2 && ev.lags[1] > ev.lags[0] {
        let slope = (ev.semivariance[1] - g0) / (ev.lags[1] - ev.lags[0]);
        (g0 - slope * ev.lags[0]).clamp(0.0, g0)
    } else {
        0.0
    };

    let range = ev
        .lags
        .iter()
        .zip(&ev.semivariance)
        .find(|&(_, &g)| g >= 0.95 * sill)
        .map(|(&lag, _)| lag)
        .unwrap_or_else(|| ev.lags[ev.len() - 1]);

    (nugget, sill, range)
}

fn weighted_loss(ev: &ExperimentalVariogram, params: &VariogramParams) -> f64 {
    ev.lags
        .iter()
        .zip(&ev.semivariance)
        .zip(&ev.pair_counts)
        .map(|((&lag, &gamma), &count)| {
            let residual = params.evaluate(lag) - gamma;
            count as f64 * residual * residual
        })
        .sum()
}

/// Model used when the data carry no spatial variation to fit
fn flat_fit(ev: &ExperimentalVariogram) -> VariogramFit {
    let range = ev.lags.last().copied().unwrap_or(ev.max_lag).max(f64::MIN_POSITIVE);
    VariogramFit {
        params: VariogramParams::new(VariogramModel::Linear, 0.0, FLAT_SILL, range),
        loss: 0.0,
    }
}

/// Fit `model` to `ev` by grid search around the initial guess.
///
/// The loss weights each bin by its pair count. An experimental variogram
/// that is empty or identically zero yields a linear model with a tiny sill.
pub fn fit_variogram(ev: &ExperimentalVariogram, model: VariogramModel) -> VariogramFit {
    if ev.is_empty() || ev.max_semivariance() <= f64::EPSILON {
        return flat_fit(ev);
    }

    let (nugget0, sill0, range0) = initial_guess(ev);
    let mut best: Option<VariogramFit> = None;

    for nm in NUGGET_STEPS {
        let nugget = nugget0 * nm;
        for sm in SILL_STEPS {
            let sill = sill0 * sm;
            if sill < nugget {
                continue;
            }
            for rm in RANGE_STEPS {
                let range = range0 * rm;
                if !(range > 0.0) {
                    continue;
                }
                let params = VariogramParams::new(model, nugget, sill, range);
                let loss = weighted_loss(ev, &params);
                if best.is_none_or(|b| loss < b.loss) {
                    best = Some(VariogramFit { params, loss });
                }
            }
        }
    }

    best.unwrap_or_else(|| flat_fit(ev))
}

/// Fit spherical, exponential and gaussian models and keep the lowest loss.
pub fn fit_best_variogram(ev: &ExperimentalVariogram) -> VariogramFit {
    if ev.is_empty() || ev.max_semivariance() <= f64::EPSILON {
        return flat_fit(ev);
    }

    let mut best = fit_variogram(ev, VariogramModel::FITTED[0]);
    for &model in &VariogramModel::FITTED[1..] {
        let fit = fit_variogram(ev, model);
        if fit.loss < best.loss {
            best = fit;
        }
    }
    best
}
