//! Observation-related code for the particle filter.
//!
//! The filter scores every particle against a real observation set. To do so it needs an
//! observation model that can predict which observations would be seen from a hypothetical state
//! and how well a predicted observation explains a real one.

use nalgebra::DVector;

/// Generic observation model trait
///
/// Observation sets are index-aligned sequences: entry `i` of a predicted set is compared with
/// entry `i` of the real set. A predicted set may be shorter than the real one when the model
/// decides some features are out of range or not visible from the particle's state. The filter
/// treats such missing entries as carrying no evidence and skips them.
pub trait ObservationModel {
    /// A single observation (e.g. a range to one landmark)
    type Observation;
    /// Predict the observations visible from `state`
    fn observe_at(&self, state: &DVector<f64>) -> Vec<Self::Observation>;
    /// Likelihood (>= 0) of the real observation given the predicted one. Models whose sets
    /// can be misaligned should score a pair describing different features as 1.
    fn gauss_likelihood(&self, predicted: &Self::Observation, real: &Self::Observation) -> f64;
}

/// Gaussian probability density of `innovation` with standard deviation `std_dev`
pub fn gaussian_pdf(innovation: f64, std_dev: f64) -> f64 {
    let normalized_innovation = innovation / std_dev;
    (-0.5 * normalized_innovation.powi(2)).exp() / (std_dev * (2.0 * std::f64::consts::PI).sqrt())
}
