//! Reference models
//!
//! Small implementations of the three model traits used by the simulator and the tests: a
//! diagonal command noise, a planar velocity (unicycle) motion model, and a range-only landmark
//! sensor. They follow the classic planar localization setup where the state is
//! `[x, y, yaw, v]` and the control is `[v, yaw_rate]`.
use crate::measurements::{ObservationModel, gaussian_pdf};
use crate::{CommandModel, MotionModel};

use nalgebra::{DMatrix, DVector, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Command noise with a fixed linear map
#[derive(Clone, Debug, PartialEq)]
pub struct GaussianCommandNoise {
    pub covariance: DMatrix<f64>,
}
impl GaussianCommandNoise {
    pub fn new(covariance: DMatrix<f64>) -> Self {
        GaussianCommandNoise { covariance }
    }
    /// Independent noise per control channel with the given standard deviations
    pub fn from_std_devs(std_devs: &[f64]) -> Self {
        GaussianCommandNoise {
            covariance: DMatrix::from_diagonal(&DVector::from_column_slice(std_devs)),
        }
    }
}
impl CommandModel for GaussianCommandNoise {
    fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }
}

/// Planar velocity motion model
///
/// State `[x, y, yaw, v]`, control `[v, yaw_rate]`:
///
/// $$
/// x(+) = x + v \cos(\psi) t, \quad y(+) = y + v \sin(\psi) t, \quad \psi(+) = \psi + \omega t, \quad v(+) = v_{cmd}
/// $$
///
/// The velocity is overwritten by the command every step rather than integrated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VelocityMotionModel {
    /// Time step (s)
    pub dt: f64,
}
impl VelocityMotionModel {
    pub const STATE_DIM: usize = 4;
    pub fn new(dt: f64) -> Self {
        VelocityMotionModel { dt }
    }
}
impl MotionModel for VelocityMotionModel {
    fn state_dimension(&self) -> usize {
        Self::STATE_DIM
    }
    fn calc_next_motion(&self, state: &DVector<f64>, control: &DVector<f64>) -> DVector<f64> {
        let yaw = state[2];
        let velocity = control[0];
        DVector::from_vec(vec![
            state[0] + velocity * yaw.cos() * self.dt,
            state[1] + velocity * yaw.sin() * self.dt,
            yaw + control[1] * self.dt,
            velocity,
        ])
    }
}

/// Range to one landmark
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeObservation {
    /// Index of the landmark in the model's landmark list
    pub landmark_id: usize,
    /// Distance (m)
    pub range: f64,
}
impl Display for RangeObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RangeObservation(landmark: {}, range: {:.3})",
            self.landmark_id, self.range
        )
    }
}

/// Range-only sensor observing fixed landmarks within `max_range`
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkRangeModel {
    pub landmarks: Vec<Vector2<f64>>,
    pub max_range: f64,
    /// Range noise standard deviation (m)
    pub range_std: f64,
}
impl LandmarkRangeModel {
    pub fn new(landmarks: Vec<Vector2<f64>>, max_range: f64, range_std: f64) -> Self {
        LandmarkRangeModel {
            landmarks,
            max_range,
            range_std,
        }
    }
    /// Distance from the planar position held in the first two state entries to a landmark
    pub fn range_to(&self, state: &DVector<f64>, landmark: &Vector2<f64>) -> f64 {
        (landmark - Vector2::new(state[0], state[1])).norm()
    }
}
impl ObservationModel for LandmarkRangeModel {
    type Observation = RangeObservation;
    /// Ranges to every landmark within `max_range`, in landmark order. Landmarks out of range
    /// are omitted, so the returned set may be shorter than the landmark list.
    fn observe_at(&self, state: &DVector<f64>) -> Vec<RangeObservation> {
        self.landmarks
            .iter()
            .enumerate()
            .map(|(landmark_id, landmark)| RangeObservation {
                landmark_id,
                range: self.range_to(state, landmark),
            })
            .filter(|obs| obs.range <= self.max_range)
            .collect()
    }
    /// Gaussian likelihood of the range difference. A pair naming different landmarks (the
    /// particle and the sensor see different subsets) carries no evidence and scores 1.
    fn gauss_likelihood(&self, predicted: &RangeObservation, real: &RangeObservation) -> f64 {
        if predicted.landmark_id != real.landmark_id {
            return 1.0;
        }
        gaussian_pdf(predicted.range - real.range, self.range_std)
    }
}
