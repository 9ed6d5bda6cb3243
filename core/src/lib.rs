//! Non-parametric (sequential Monte Carlo) state estimation
//!
//! This crate provides a particle filter that estimates the state of a dynamic process, such as a
//! moving robot, from noisy control inputs and noisy observations. The posterior is represented by
//! a weighted set of state samples. Each call to [`particle::ParticleFilter::update`] runs one full
//! Bayesian cycle:
//!
//! 1. perturb the nominal control with noise shaped by the [`CommandModel`],
//! 2. propagate every particle through the [`MotionModel`],
//! 3. predict the observations visible from each particle with the
//!    [`measurements::ObservationModel`] and multiply the particle weight by the likelihood of the
//!    real observation,
//! 4. normalize the weights and compute the weighted mean and covariance,
//! 5. resample when the effective sample size drops below a threshold.
//!
//! The dynamics and sensor equations are not part of the filter. They are supplied through the
//! three model traits so alternative vehicles or sensors can be substituted without touching the
//! filter itself. Simple reference implementations live in [`models`].
//!
//! This crate is built off of a short list of dependencies:
//! - [`nalgebra`](https://crates.io/crates/nalgebra): Provides the linear algebra tools for the filters.
//! - [`rand`](https://crates.io/crates/rand) and [`rand_distr`](https://crates.io/crates/rand_distr): Provides the seedable random source and the noise distributions.
//! - [`serde`](https://crates.io/crates/serde): Provides (de)serialization of configurations and simulation records.
//!
//! ## Crate overview
//!
//! - [config]: Filter configuration types and JSON/YAML/TOML loading.
//! - [error]: The crate error type.
//! - [measurements]: The observation model trait.
//! - [models]: Reference command, motion, and observation models.
//! - [particle]: The particle filter, its covariance estimate and resampling strategies.
//! - [sim]: Simulation utilities for running and testing the filter.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use nalgebra::{DVector, Vector2};
//! use npfilter::config::{FilterConfig, ParticleFilterConfig};
//! use npfilter::models::{GaussianCommandNoise, LandmarkRangeModel, VelocityMotionModel};
//! use npfilter::particle::create;
//! use npfilter::measurements::ObservationModel;
//!
//! let sensor = Arc::new(LandmarkRangeModel::new(
//!     vec![Vector2::new(10.0, 0.0), Vector2::new(0.0, 10.0)],
//!     20.0,
//!     0.2,
//! ));
//! let config: FilterConfig = ParticleFilterConfig::new(100, 50, 50.0).with_seed(1).into();
//! let mut pf = create(
//!     &config,
//!     Arc::new(GaussianCommandNoise::from_std_devs(&[0.1, 0.05])),
//!     Arc::new(VelocityMotionModel::new(0.1)),
//!     sensor.clone(),
//! )
//! .unwrap();
//!
//! let control = DVector::from_vec(vec![1.0, 0.1]);
//! let observation = sensor.observe_at(&DVector::from_vec(vec![0.1, 0.0, 0.01, 1.0]));
//! let (estimate, covariance) = pf.update(&control, &observation).unwrap();
//! assert_eq!(estimate.len(), 4);
//! assert_eq!(covariance.nrows(), 4);
//! ```
pub mod config;
pub mod error;
pub mod measurements;
pub mod models;
pub mod particle;
pub mod sim;

use nalgebra::{DMatrix, DVector};

pub use config::{FilterConfig, ParticleFilterConfig};
pub use error::{FilterError, Result};
pub use measurements::ObservationModel;
pub use particle::{ParticleFilter, ParticleResamplingStrategy, create};

/// Generic command (control input) noise model
///
/// The command model describes how uncertain the nominal control input is. The filter draws a
/// standard-normal vector with the control's dimension for every particle, maps it through
/// [`CommandModel::covariance`], and adds the result to the nominal control. Each particle is
/// therefore propagated with its own plausible realization of the command.
///
/// Note that despite its name the matrix is applied as a linear map to unit-variance noise, so a
/// diagonal matrix holds standard deviations, not variances.
pub trait CommandModel {
    /// Linear map (D_u x D_u) shaping standard-normal noise into control-space perturbations
    fn covariance(&self) -> &DMatrix<f64>;
    /// Dimension of the control vector
    fn control_dimension(&self) -> usize {
        self.covariance().ncols()
    }
}

/// Generic motion (state transition) model
///
/// The filter only requires that the transition accepts a state vector and a control vector and
/// returns a state vector of the same dimension. The dimension reported by
/// [`MotionModel::state_dimension`] sizes the particle set at construction.
pub trait MotionModel {
    /// Dimension of the state vector (D)
    fn state_dimension(&self) -> usize;
    /// Propagate `state` one step under `control`
    fn calc_next_motion(&self, state: &DVector<f64>, control: &DVector<f64>) -> DVector<f64>;
}
