//! Particle filter
//!
//! The posterior is represented by N state samples stored column-wise in a D x N matrix together
//! with N index-aligned weights. One call to [`ParticleFilter::update`] performs a complete
//! Bayesian cycle (propagate, weight, normalize, estimate, resample).
//!
//! The covariance reported by the filter deliberately excludes the final state dimension
//! (conventionally a velocity or rate term): its row and column are always zero.
use crate::config::{FilterConfig, ParticleFilterConfig};
use crate::error::{FilterError, Result};
use crate::measurements::ObservationModel;
use crate::{CommandModel, MotionModel};

use log::{debug, trace, warn};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, StandardNormal};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::sync::Arc;

/// How source particles are selected once resampling is triggered
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleResamplingStrategy {
    /// Evenly spaced positions, each jittered within its own 1/N slot, scanned with one cursor
    #[default]
    Systematic,
    /// Deterministic copies of `floor(N * w)` plus systematic selection on the remainders
    Residual,
    /// N independent draws from the weight distribution
    Multinomial,
}
impl ParticleResamplingStrategy {
    /// Draw N source indices (N = `weights.len()`) from normalized weights
    pub fn resample_indices<R: Rng + ?Sized>(&self, weights: &[f64], rng: &mut R) -> Vec<usize> {
        match self {
            ParticleResamplingStrategy::Systematic => systematic_resample(weights, rng),
            ParticleResamplingStrategy::Residual => residual_resample(weights, rng),
            ParticleResamplingStrategy::Multinomial => multinomial_resample(weights, rng),
        }
    }
}

/// Running sum of the weights
pub fn cumulative_weights(weights: &[f64]) -> Vec<f64> {
    weights
        .iter()
        .scan(0.0, |acc, &w| {
            *acc += w;
            Some(*acc)
        })
        .collect()
}

/// Systematic resampling.
///
/// Position `i` is `i/N + U_i/N` with an independent `U_i ~ U[0, 1)`. The positions are already
/// increasing, so a single cursor into the cumulative weights is carried forward across all of
/// them and never reset. The cursor is clamped to the last particle so round-off in the
/// cumulative sum cannot run it off the end.
pub fn systematic_resample<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Vec<usize> {
    let n = weights.len();
    let mut indices = Vec::with_capacity(n);
    if n == 0 {
        return indices;
    }
    let wcum = cumulative_weights(weights);
    let step = 1.0 / n as f64;
    let mut cursor = 0;
    for i in 0..n {
        let position = i as f64 * step + rng.random::<f64>() * step;
        while position > wcum[cursor] && cursor + 1 < n {
            cursor += 1;
        }
        indices.push(cursor);
    }
    indices
}

/// Residual resampling
pub fn residual_resample<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Vec<usize> {
    let n = weights.len();
    let mut indices = Vec::with_capacity(n);
    let mut residual: Vec<f64> = vec![0.0; n];
    // Integer part
    for (i, &w) in weights.iter().enumerate() {
        let copies = (w * n as f64).floor() as usize;
        residual[i] = w * n as f64 - copies as f64;
        for _ in 0..copies.min(n - indices.len()) {
            indices.push(i);
        }
    }
    // Residual part
    let residual_particles = n - indices.len();
    if residual_particles > 0 {
        let sum_residual: f64 = residual.iter().sum();
        let step = sum_residual / residual_particles as f64;
        let mut u = rng.random::<f64>() * step;
        let mut i = 0;
        let mut cumsum = residual[0];
        for _ in 0..residual_particles {
            while u > cumsum && i + 1 < n {
                i += 1;
                cumsum += residual[i];
            }
            indices.push(i);
            u += step;
        }
    }
    indices
}

/// Multinomial resampling
pub fn multinomial_resample<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Vec<usize> {
    let n = weights.len();
    let wcum = cumulative_weights(weights);
    let total = wcum.last().copied().unwrap_or(0.0);
    (0..n)
        .map(|_| {
            let u = rng.random::<f64>() * total;
            wcum.partition_point(|&c| c < u).min(n - 1)
        })
        .collect()
}

/// Weighted sample covariance `sum_i w_i (x_i - mean)(x_i - mean)^T`.
///
/// The last row and column are zeroed: the final state dimension is excluded from the reported
/// uncertainty.
pub fn weighted_covariance(
    states: &DMatrix<f64>,
    weights: &DVector<f64>,
    mean: &DVector<f64>,
) -> DMatrix<f64> {
    let state_size = states.nrows();
    let mut cov = DMatrix::<f64>::zeros(state_size, state_size);
    for (particle, &weight) in states.column_iter().zip(weights.iter()) {
        let diff = particle.clone_owned() - mean;
        cov += weight * &diff * &diff.transpose();
    }
    if state_size > 0 {
        cov.row_mut(state_size - 1).fill(0.0);
        cov.column_mut(state_size - 1).fill(0.0);
    }
    cov
}

/// Effective sample size `1 / sum_i w_i^2`; zero when all weights are zero
pub fn effective_sample_size(weights: &DVector<f64>) -> f64 {
    let sum_of_squares = weights.dot(weights);
    if sum_of_squares > 0.0 {
        1.0 / sum_of_squares
    } else {
        0.0
    }
}

/// Zero-mean Gaussian with standard deviation `std_dev`.
///
/// `Normal::new` only rejects a non-finite deviation, so negative values are caught here.
pub(crate) fn zero_mean_normal(context: &str, std_dev: f64) -> Result<Normal<f64>> {
    if !(std_dev.is_finite() && std_dev >= 0.0) {
        return Err(FilterError::InvalidConfig(format!(
            "{} standard deviation must be finite and non-negative, got {}",
            context, std_dev
        )));
    }
    Normal::new(0.0, std_dev)
        .map_err(|e| FilterError::InvalidConfig(format!("{} {}: {}", context, std_dev, e)))
}

/// Build a filter from a configuration and its three model dependencies.
///
/// # Errors
/// [`FilterError::InvalidConfig`] if the particle parameters are inconsistent (for example
/// `p_resample > p_num`) or the motion model reports a zero-dimensional state. Unknown filter
/// types are rejected when the configuration itself is parsed, see
/// [`FilterConfig::from_str_as`].
pub fn create<C, M, O>(
    config: &FilterConfig,
    command_model: Arc<C>,
    motion_model: Arc<M>,
    observation_model: Arc<O>,
) -> Result<ParticleFilter<C, M, O>>
where
    C: CommandModel + ?Sized,
    M: MotionModel + ?Sized,
    O: ObservationModel + ?Sized,
{
    match config {
        FilterConfig::Particle(pf_config) => ParticleFilter::new(
            pf_config.clone(),
            command_model,
            motion_model,
            observation_model,
        ),
    }
}

/// Sequential Monte Carlo filter over a D-dimensional state
pub struct ParticleFilter<C: ?Sized, M: ?Sized, O: ?Sized> {
    config: ParticleFilterConfig,
    command_model: Arc<C>,
    motion_model: Arc<M>,
    observation_model: Arc<O>,
    /// One particle per column (D x N)
    states: DMatrix<f64>,
    weights: DVector<f64>,
    estimate: DVector<f64>,
    rng: StdRng,
}
impl<C: ?Sized, M: ?Sized, O: ?Sized> Debug for ParticleFilter<C, M, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let min_weight = self.weights.iter().copied().fold(f64::INFINITY, f64::min);
        let max_weight = self.weights.iter().copied().fold(0.0, f64::max);
        f.debug_struct("ParticleFilter")
            .field("num_particles", &self.weights.len())
            .field("state_size", &self.states.nrows())
            .field("effective_particles", &effective_sample_size(&self.weights))
            .field(
                "weight_range",
                &format_args!("[{:.4e}, {:.4e}]", min_weight, max_weight),
            )
            .field("estimate", &self.estimate.as_slice())
            .finish()
    }
}
impl<C, M, O> ParticleFilter<C, M, O>
where
    C: CommandModel + ?Sized,
    M: MotionModel + ?Sized,
    O: ObservationModel + ?Sized,
{
    /// Create a filter with every particle at the origin and uniform weights `1/N`.
    ///
    /// The state dimension is taken from the motion model.
    pub fn new(
        config: ParticleFilterConfig,
        command_model: Arc<C>,
        motion_model: Arc<M>,
        observation_model: Arc<O>,
    ) -> Result<Self> {
        config.validate()?;
        let state_size = motion_model.state_dimension();
        if state_size == 0 {
            return Err(FilterError::InvalidConfig(
                "motion model reports a zero-dimensional state".to_string(),
            ));
        }
        let n = config.p_num;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        debug!(
            "Initialized particle filter with {} particles of dimension {}",
            n, state_size
        );
        Ok(ParticleFilter {
            config,
            command_model,
            motion_model,
            observation_model,
            states: DMatrix::zeros(state_size, n),
            weights: DVector::from_element(n, 1.0 / n as f64),
            estimate: DVector::zeros(state_size),
            rng,
        })
    }
    /// Replace the origin initialization with a prior centred on `mean`.
    ///
    /// With `spread` each particle is scattered by independent Gaussian noise with the given
    /// per-dimension standard deviations. Weights stay uniform.
    pub fn with_prior(mut self, mean: &DVector<f64>, spread: Option<&DVector<f64>>) -> Result<Self> {
        let state_size = self.state_dimension();
        check_dimension("prior mean", state_size, mean.len())?;
        for mut particle in self.states.column_iter_mut() {
            particle.copy_from(mean);
        }
        if let Some(spread) = spread {
            check_dimension("prior spread", state_size, spread.len())?;
            for (row, &std_dev) in spread.iter().enumerate() {
                let normal = zero_mean_normal("prior spread", std_dev)?;
                for col in 0..self.states.ncols() {
                    self.states[(row, col)] += normal.sample(&mut self.rng);
                }
            }
        }
        self.estimate = &self.states * &self.weights;
        Ok(self)
    }
    /// Run one Bayesian cycle and return the new estimate and covariance.
    ///
    /// For every particle the control is perturbed with command noise, the particle is
    /// propagated through the motion model, and its weight is multiplied by the likelihood of
    /// each real observation against the observation predicted from the particle at the same
    /// index. Real observations without a predicted counterpart are skipped. The weights are then
    /// normalized, the weighted mean and covariance are computed, and the particle set is
    /// resampled if the effective sample size fell below the threshold.
    ///
    /// # Errors
    /// * [`FilterError::DimensionMismatch`] if the control or a propagated state has the wrong size.
    /// * [`FilterError::DegenerateWeights`] if the weight total is zero or not finite.
    ///
    /// The particle set, weights and estimate are only modified when the cycle succeeds.
    pub fn update(
        &mut self,
        control: &DVector<f64>,
        observation: &[O::Observation],
    ) -> Result<(DVector<f64>, DMatrix<f64>)> {
        let cov = self.command_model.covariance();
        let control_size = cov.ncols();
        check_dimension("command covariance rows", control_size, cov.nrows())?;
        check_dimension("control", control_size, control.len())?;
        let state_size = self.states.nrows();
        let n = self.states.ncols();

        let mut next_states = DMatrix::<f64>::zeros(state_size, n);
        let mut next_weights = self.weights.clone();
        for ip in 0..n {
            let noise = DVector::<f64>::from_fn(control_size, |_, _| {
                self.rng.sample::<f64, _>(StandardNormal)
            });
            let noisy_control = control + cov * &noise;
            let state = self.states.column(ip).clone_owned();
            let propagated = self.motion_model.calc_next_motion(&state, &noisy_control);
            check_dimension("motion model output", state_size, propagated.len())?;

            let predicted = self.observation_model.observe_at(&propagated);
            if predicted.len() < observation.len() {
                trace!(
                    "Particle {} predicts {} of {} observations, skipping the rest",
                    ip,
                    predicted.len(),
                    observation.len()
                );
            }
            let mut weight = next_weights[ip];
            for (pred, real) in predicted.iter().zip(observation.iter()) {
                weight *= self.observation_model.gauss_likelihood(pred, real);
            }
            next_states.set_column(ip, &propagated);
            next_weights[ip] = weight;
        }

        let total = next_weights.sum();
        if !(total.is_finite() && total > 0.0) {
            warn!(
                "Particle weights collapsed (total {}), keeping the previous particle set",
                total
            );
            return Err(FilterError::DegenerateWeights(total));
        }
        next_weights /= total;

        let estimate = &next_states * &next_weights;
        let covariance = weighted_covariance(&next_states, &next_weights, &estimate);
        self.states = next_states;
        self.weights = next_weights;
        self.estimate = estimate.clone();
        debug!(
            "Updated {} particles, weight total {:.4e}, effective sample size {:.2}",
            n,
            total,
            self.effective_sample_size()
        );
        self.resample();
        Ok((estimate, covariance))
    }
    /// Resample when the particle set is degenerate.
    ///
    /// If `n_eff >= resample_threshold` nothing changes. Otherwise N source indices are drawn
    /// with the configured strategy, the states are gathered (with replacement), and all
    /// weights are reset to `1/N`. Returns whether resampling took place.
    pub fn resample(&mut self) -> bool {
        let n_eff = self.effective_sample_size();
        if n_eff >= self.config.resample_threshold {
            return false;
        }
        let n = self.weights.len();
        let indices = self
            .config
            .resampling
            .resample_indices(self.weights.as_slice(), &mut self.rng);
        self.states = self.states.select_columns(indices.iter());
        self.weights = DVector::from_element(n, 1.0 / n as f64);
        debug!(
            "Resampled {} particles ({:?}), effective sample size was {:.2} < {}",
            n, self.config.resampling, n_eff, self.config.resample_threshold
        );
        true
    }
    /// Overwrite the weights. They are normalized to sum to one.
    pub fn set_weights(&mut self, weights: &[f64]) -> Result<()> {
        check_dimension("weights", self.weights.len(), weights.len())?;
        let total: f64 = weights.iter().sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(FilterError::DegenerateWeights(total));
        }
        self.weights = DVector::from_iterator(weights.len(), weights.iter().map(|w| w / total));
        Ok(())
    }
    /// Current particle states (D x N, one column per particle) and weights (length N)
    pub fn particles(&self) -> (&DMatrix<f64>, &DVector<f64>) {
        (&self.states, &self.weights)
    }
    /// Weighted mean computed by the last successful cycle
    pub fn estimate(&self) -> &DVector<f64> {
        &self.estimate
    }
    pub fn effective_sample_size(&self) -> f64 {
        effective_sample_size(&self.weights)
    }
    pub fn state_dimension(&self) -> usize {
        self.states.nrows()
    }
    pub fn num_particles(&self) -> usize {
        self.states.ncols()
    }
    pub fn config(&self) -> &ParticleFilterConfig {
        &self.config
    }
}

fn check_dimension(context: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(FilterError::DimensionMismatch {
            context,
            expected,
            got,
        })
    }
}

/// Tests
#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    struct FixedCommandNoise {
        covariance: DMatrix<f64>,
    }
    impl CommandModel for FixedCommandNoise {
        fn covariance(&self) -> &DMatrix<f64> {
            &self.covariance
        }
    }
    /// Adds the control directly to the state
    struct IdentityMotion {
        dimension: usize,
    }
    impl MotionModel for IdentityMotion {
        fn state_dimension(&self) -> usize {
            self.dimension
        }
        fn calc_next_motion(&self, state: &DVector<f64>, control: &DVector<f64>) -> DVector<f64> {
            state + control
        }
    }
    /// Observes the state itself, optionally followed by extra copies
    struct StateObservation {
        copies: usize,
    }
    impl ObservationModel for StateObservation {
        type Observation = DVector<f64>;
        fn observe_at(&self, state: &DVector<f64>) -> Vec<DVector<f64>> {
            vec![state.clone(); self.copies]
        }
        fn gauss_likelihood(&self, predicted: &DVector<f64>, real: &DVector<f64>) -> f64 {
            (-(predicted - real).norm_squared()).exp()
        }
    }

    fn build(
        p_num: usize,
        threshold: f64,
        noise_std: f64,
        copies: usize,
    ) -> ParticleFilter<FixedCommandNoise, IdentityMotion, StateObservation> {
        let config = ParticleFilterConfig::new(p_num, p_num, threshold).with_seed(42);
        ParticleFilter::new(
            config,
            Arc::new(FixedCommandNoise {
                covariance: DMatrix::identity(2, 2) * noise_std,
            }),
            Arc::new(IdentityMotion { dimension: 2 }),
            Arc::new(StateObservation { copies }),
        )
        .unwrap()
    }
    fn vec2(x: f64, y: f64) -> DVector<f64> {
        DVector::from_vec(vec![x, y])
    }

    #[test]
    fn test_construction() {
        let pf = build(10, 5.0, 0.0, 1);
        let (states, weights) = pf.particles();
        assert_eq!(states.nrows(), 2);
        assert_eq!(states.ncols(), 10);
        assert_eq!(weights.len(), 10);
        assert!(states.iter().all(|&x| x == 0.0));
        assert!(weights.iter().all(|&w| w == 0.1));
        assert_approx_eq!(pf.effective_sample_size(), 10.0, 1e-9);
        assert!(format!("{:?}", pf).contains("num_particles"));
    }
    #[test]
    fn test_create_validation() {
        let command = Arc::new(FixedCommandNoise {
            covariance: DMatrix::zeros(2, 2),
        });
        let motion = Arc::new(IdentityMotion { dimension: 2 });
        let obs = Arc::new(StateObservation { copies: 1 });
        let bad: FilterConfig = ParticleFilterConfig::new(4, 5, 2.0).into();
        assert!(matches!(
            create(&bad, command.clone(), motion.clone(), obs.clone()),
            Err(FilterError::InvalidConfig(_))
        ));
        let equal: FilterConfig = ParticleFilterConfig::new(4, 4, 2.0).into();
        assert!(create(&equal, command, motion, obs).is_ok());

        let zero_dim = ParticleFilter::new(
            ParticleFilterConfig::new(4, 4, 2.0),
            Arc::new(FixedCommandNoise {
                covariance: DMatrix::zeros(2, 2),
            }),
            Arc::new(IdentityMotion { dimension: 0 }),
            Arc::new(StateObservation { copies: 1 }),
        );
        assert!(matches!(zero_dim, Err(FilterError::InvalidConfig(_))));
    }
    #[test]
    fn test_identity_scenario() {
        let mut pf = build(4, 2.0, 0.0, 1);
        let (estimate, covariance) = pf.update(&vec2(1.0, 0.0), &[vec2(1.0, 0.0)]).unwrap();
        assert_approx_eq!(estimate[0], 1.0, 1e-12);
        assert_approx_eq!(estimate[1], 0.0, 1e-12);
        let (states, weights) = pf.particles();
        for w in weights.iter() {
            assert_approx_eq!(*w, 0.25, 1e-12);
        }
        for particle in states.column_iter() {
            assert_approx_eq!(particle[0], 1.0, 1e-12);
            assert_approx_eq!(particle[1], 0.0, 1e-12);
        }
        assert!(covariance.iter().all(|c| c.abs() < 1e-12));
        assert_approx_eq!(pf.effective_sample_size(), 4.0, 1e-9);
        assert_eq!(pf.estimate(), &estimate);
    }
    #[test]
    fn test_weights_normalized_and_covariance_shape() {
        let mut pf = build(200, 1e-6, 0.5, 1);
        let (_, covariance) = pf.update(&vec2(1.0, 0.5), &[vec2(1.0, 0.5)]).unwrap();
        let (_, weights) = pf.particles();
        assert_approx_eq!(weights.sum(), 1.0, 1e-9);
        assert_eq!(covariance.shape(), (2, 2));
        assert_approx_eq!(covariance[(0, 1)], covariance[(1, 0)], 1e-12);
        assert_eq!(covariance[(1, 0)], 0.0);
        assert_eq!(covariance[(0, 1)], 0.0);
        assert_eq!(covariance[(1, 1)], 0.0);
        assert!(covariance[(0, 0)] > 0.0);
    }
    #[test]
    fn test_resampling_preserves_count() {
        let mut pf = build(50, 1e9, 0.5, 1);
        pf.update(&vec2(1.0, 0.0), &[vec2(1.0, 0.0)]).unwrap();
        let (states, weights) = pf.particles();
        assert_eq!(states.ncols(), 50);
        assert_eq!(weights.len(), 50);
        assert!(weights.iter().all(|&w| w == 1.0 / 50.0));
    }
    #[test]
    fn test_no_resampling_path() {
        let mut pf = build(50, 1e-9, 0.5, 1);
        pf.update(&vec2(1.0, 0.0), &[vec2(1.0, 0.0)]).unwrap();
        let (states, weights) = pf.particles();
        let (states, weights) = (states.clone(), weights.clone());
        // noisy propagation produces non-uniform weights that survive the cycle
        assert!(weights.iter().any(|&w| (w - 1.0 / 50.0).abs() > 1e-12));
        assert!(!pf.resample());
        assert_eq!(pf.particles().0, &states);
        assert_eq!(pf.particles().1, &weights);
    }
    #[test]
    fn test_missing_predicted_observations_are_skipped() {
        // only the first real observation has a predicted counterpart; the far away extras
        // would drive every weight to zero if they were scored
        let mut pf = build(4, 2.0, 0.0, 1);
        let observation = vec![vec2(1.0, 0.0), vec2(1e3, 1e3), vec2(-1e3, 1e3)];
        let (estimate, _) = pf.update(&vec2(1.0, 0.0), &observation).unwrap();
        assert_approx_eq!(estimate[0], 1.0, 1e-12);
        assert_approx_eq!(pf.particles().1.sum(), 1.0, 1e-12);
    }
    #[test]
    fn test_degenerate_weights_leave_filter_unchanged() {
        let mut pf = build(4, 2.0, 0.0, 1);
        let before = pf.particles().0.clone();
        match pf.update(&vec2(1.0, 0.0), &[vec2(1e3, 1e3)]) {
            Err(FilterError::DegenerateWeights(total)) => assert_eq!(total, 0.0),
            other => panic!("expected degenerate weights, got {:?}", other),
        }
        assert_eq!(pf.particles().0, &before);
        assert!(pf.particles().1.iter().all(|&w| w == 0.25));
        assert_eq!(pf.estimate(), &DVector::zeros(2));
    }
    #[test]
    fn test_dimension_mismatch() {
        let mut pf = build(4, 2.0, 0.0, 1);
        let control = DVector::from_vec(vec![1.0, 0.0, 0.0]);
        assert!(matches!(
            pf.update(&control, &[vec2(1.0, 0.0)]),
            Err(FilterError::DimensionMismatch {
                context: "control",
                expected: 2,
                got: 3
            })
        ));
        assert!(matches!(
            pf.set_weights(&[1.0, 2.0]),
            Err(FilterError::DimensionMismatch { .. })
        ));
    }
    #[test]
    fn test_seeded_filters_are_reproducible() {
        let mut a = build(100, 50.0, 0.3, 1);
        let mut b = build(100, 50.0, 0.3, 1);
        for step in 1..5 {
            let truth = vec2(step as f64, 0.0);
            let (ea, ca) = a.update(&vec2(1.0, 0.0), &[truth.clone()]).unwrap();
            let (eb, cb) = b.update(&vec2(1.0, 0.0), &[truth]).unwrap();
            assert_eq!(ea, eb);
            assert_eq!(ca, cb);
        }
        assert_eq!(a.particles().0, b.particles().0);
    }
    #[test]
    fn test_tracks_moving_target() {
        let mut pf = build(500, 250.0, 0.3, 1);
        let mut truth = vec2(0.0, 0.0);
        for _ in 0..20 {
            truth += vec2(1.0, 0.5);
            let (estimate, _) = pf.update(&vec2(1.0, 0.5), &[truth.clone()]).unwrap();
            assert_approx_eq!(pf.particles().1.sum(), 1.0, 1e-9);
            assert!((estimate - &truth).norm() < 1.0);
        }
    }
    #[test]
    fn test_with_prior() {
        let pf = build(100, 50.0, 0.0, 1)
            .with_prior(&vec2(3.0, -1.0), None)
            .unwrap();
        assert!(pf.particles().0.column_iter().all(|p| p[0] == 3.0 && p[1] == -1.0));
        assert_approx_eq!(pf.estimate()[0], 3.0, 1e-12);

        let pf = build(1000, 50.0, 0.0, 1)
            .with_prior(&vec2(3.0, -1.0), Some(&vec2(0.5, 0.0)))
            .unwrap();
        let states = pf.particles().0;
        assert!(states.row(1).iter().all(|&y| y == -1.0));
        assert!(states.row(0).iter().any(|&x| x != 3.0));
        assert_approx_eq!(pf.estimate()[0], 3.0, 0.1);

        assert!(matches!(
            build(4, 2.0, 0.0, 1).with_prior(&DVector::zeros(3), None),
            Err(FilterError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            build(4, 2.0, 0.0, 1).with_prior(&vec2(0.0, 0.0), Some(&vec2(-1.0, 0.0))),
            Err(FilterError::InvalidConfig(_))
        ));
    }
    #[test]
    fn test_zero_mean_normal_rejects_bad_deviation() {
        assert!(zero_mean_normal("noise", 0.0).is_ok());
        assert!(zero_mean_normal("noise", 2.5).is_ok());
        for bad in [-1.0, -1e-12, f64::NAN, f64::INFINITY] {
            match zero_mean_normal("noise", bad) {
                Err(FilterError::InvalidConfig(msg)) => assert!(msg.starts_with("noise")),
                other => panic!("expected invalid config for {}, got {:?}", bad, other),
            }
        }
    }
    #[test]
    fn test_set_weights_normalizes() {
        let mut pf = build(4, 2.0, 0.0, 1);
        pf.set_weights(&[1.0, 1.0, 2.0, 4.0]).unwrap();
        let weights = pf.particles().1;
        assert_approx_eq!(weights[3], 0.5, 1e-12);
        assert_approx_eq!(weights.sum(), 1.0, 1e-12);
        assert!(matches!(
            pf.set_weights(&[0.0; 4]),
            Err(FilterError::DegenerateWeights(_))
        ));
    }
    #[test]
    fn test_resample_concentrates_on_heavy_particle() {
        let mut pf = build(4, 3.0, 0.0, 1);
        // tag each particle by its x coordinate
        for i in 0..4 {
            pf.states[(0, i)] = i as f64;
        }
        pf.set_weights(&[0.0, 0.0, 1.0, 0.0]).unwrap();
        assert!(pf.resample());
        assert!(pf.particles().0.row(0).iter().all(|&x| x == 2.0));
        assert!(pf.particles().1.iter().all(|&w| w == 0.25));
    }
    #[test]
    fn test_trait_objects() {
        let command: Arc<dyn CommandModel> = Arc::new(FixedCommandNoise {
            covariance: DMatrix::zeros(2, 2),
        });
        let motion: Arc<dyn MotionModel> = Arc::new(IdentityMotion { dimension: 2 });
        let config: FilterConfig = ParticleFilterConfig::new(4, 2, 2.0).into();
        let mut pf = create(&config, command, motion, Arc::new(StateObservation { copies: 1 }))
            .unwrap();
        let (estimate, _) = pf.update(&vec2(0.5, 0.5), &[vec2(0.5, 0.5)]).unwrap();
        assert_approx_eq!(estimate[1], 0.5, 1e-12);
    }
    #[test]
    fn test_weighted_covariance() {
        let states = DMatrix::from_column_slice(3, 2, &[1.0, 2.0, 5.0, 3.0, 0.0, -5.0]);
        let weights = DVector::from_vec(vec![0.5, 0.5]);
        let mean = &states * &weights;
        let cov = weighted_covariance(&states, &weights, &mean);
        assert_approx_eq!(cov[(0, 0)], 1.0, 1e-12);
        assert_approx_eq!(cov[(1, 1)], 1.0, 1e-12);
        assert_approx_eq!(cov[(0, 1)], -1.0, 1e-12);
        assert_approx_eq!(cov[(1, 0)], -1.0, 1e-12);
        for k in 0..3 {
            assert_eq!(cov[(2, k)], 0.0);
            assert_eq!(cov[(k, 2)], 0.0);
        }
    }
    #[test]
    fn test_effective_sample_size() {
        assert_approx_eq!(
            effective_sample_size(&DVector::from_element(8, 0.125)),
            8.0,
            1e-9
        );
        assert_approx_eq!(
            effective_sample_size(&DVector::from_vec(vec![1.0, 0.0, 0.0])),
            1.0,
            1e-12
        );
        assert_eq!(effective_sample_size(&DVector::zeros(3)), 0.0);
    }
    #[test]
    fn test_cumulative_weights() {
        let wcum = cumulative_weights(&[0.1, 0.2, 0.3, 0.4]);
        assert_approx_eq!(wcum[0], 0.1, 1e-12);
        assert_approx_eq!(wcum[2], 0.6, 1e-12);
        assert_approx_eq!(wcum[3], 1.0, 1e-12);
    }
    #[test]
    fn test_resampling_strategies() {
        let weights = [0.5, 0.0, 0.5, 0.0];
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(systematic_resample(&weights, &mut rng), vec![0, 0, 2, 2]);
        assert_eq!(residual_resample(&weights, &mut rng), vec![0, 0, 2, 2]);
        let indices = multinomial_resample(&weights, &mut rng);
        assert_eq!(indices.len(), 4);
        assert!(indices.iter().all(|&i| i == 0 || i == 2));

        for strategy in [
            ParticleResamplingStrategy::Systematic,
            ParticleResamplingStrategy::Residual,
            ParticleResamplingStrategy::Multinomial,
        ] {
            let indices = strategy.resample_indices(&[0.0, 0.0, 0.0, 1.0], &mut rng);
            assert_eq!(indices, vec![3, 3, 3, 3]);
        }
    }
    #[test]
    fn test_systematic_resample_is_monotone_and_proportional() {
        let mut rng = StdRng::seed_from_u64(11);
        let n = 1000;
        let weights: Vec<f64> = (0..n).map(|i| if i < n / 4 { 3.0 } else { 1.0 }).collect();
        let total: f64 = weights.iter().sum();
        let weights: Vec<f64> = weights.iter().map(|w| w / total).collect();
        let indices = systematic_resample(&weights, &mut rng);
        assert_eq!(indices.len(), n);
        assert!(indices.windows(2).all(|w| w[0] <= w[1]));
        // the first quarter carries half of the mass
        let heavy = indices.iter().filter(|&&i| i < n / 4).count();
        assert!((heavy as i64 - 500).abs() <= 2);
    }
    #[test]
    fn test_residual_resample_round_off() {
        // weights that do not sum exactly to one must still yield N in-range indices
        let mut rng = StdRng::seed_from_u64(5);
        let weights = [1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0 - 1e-9];
        let indices = residual_resample(&weights, &mut rng);
        assert_eq!(indices.len(), 3);
        assert!(indices.iter().all(|&i| i < 3));
    }
}
