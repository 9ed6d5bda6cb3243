//! Simulation utilities for exercising the particle filter.
//!
//! This module provides:
//! - A `Scenario` that generates a ground-truth planar trajectory under the
//!   [`VelocityMotionModel`], the noisy dead-reckoning controls a filter would receive, and the
//!   noisy range observations of every visible landmark
//! - `run_scenario`, which drives a filter through the generated steps
//! - `EstimateRecord` for writing and reading the per-step results as CSV
use crate::error::{FilterError, Result};
use crate::measurements::ObservationModel;
use crate::models::{LandmarkRangeModel, RangeObservation, VelocityMotionModel};
use crate::particle::{ParticleFilter, zero_mean_normal};
use crate::{CommandModel, MotionModel};

use log::{info, warn};
use nalgebra::{DVector, Vector2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Distribution;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters of a simulated planar run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Time step (s)
    pub dt: f64,
    /// Number of filter cycles
    pub steps: usize,
    /// Commanded forward velocity (m/s)
    pub velocity: f64,
    /// Commanded yaw rate (rad/s)
    pub yaw_rate: f64,
    /// Standard deviations of the noise corrupting the controls handed to the filter
    /// ([velocity, yaw rate])
    pub control_noise_std: [f64; 2],
    /// Standard deviation of the range noise (m)
    pub range_noise_std: f64,
    /// Landmark positions `[x, y]` (m)
    pub landmarks: Vec<[f64; 2]>,
    /// Sensor range (m)
    pub max_range: f64,
    /// Seed for the truth and noise generator
    pub seed: u64,
}
impl Default for Scenario {
    fn default() -> Self {
        Scenario {
            dt: 0.1,
            steps: 500,
            velocity: 1.0,
            yaw_rate: 0.1,
            control_noise_std: [0.1, 2.0_f64.to_radians()],
            range_noise_std: 0.2,
            landmarks: vec![[10.0, 0.0], [10.0, 10.0], [0.0, 15.0], [-5.0, 20.0]],
            max_range: 20.0,
            seed: 42,
        }
    }
}

/// One generated step: the hidden truth and what the filter gets to see
#[derive(Clone, Debug)]
pub struct ScenarioStep {
    pub time: f64,
    pub truth: DVector<f64>,
    pub control: DVector<f64>,
    pub observation: Vec<RangeObservation>,
}

impl Scenario {
    pub fn motion_model(&self) -> VelocityMotionModel {
        VelocityMotionModel::new(self.dt)
    }
    /// Range sensor over the scenario's landmarks. `range_std` is the noise level the filter
    /// assumes, which need not match the simulated `range_noise_std`.
    pub fn sensor(&self, range_std: f64) -> LandmarkRangeModel {
        LandmarkRangeModel::new(
            self.landmarks
                .iter()
                .map(|l| Vector2::new(l[0], l[1]))
                .collect(),
            self.max_range,
            range_std,
        )
    }
    /// Generate the ground truth, noisy controls and noisy observations.
    ///
    /// # Errors
    /// [`FilterError::InvalidConfig`] if a noise standard deviation is negative or not finite.
    pub fn generate(&self) -> Result<Vec<ScenarioStep>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let velocity_noise = zero_mean_normal("velocity noise", self.control_noise_std[0])?;
        let yaw_rate_noise = zero_mean_normal("yaw rate noise", self.control_noise_std[1])?;
        let range_noise = zero_mean_normal("range noise", self.range_noise_std)?;

        let motion = self.motion_model();
        let sensor = self.sensor(self.range_noise_std);
        let command = DVector::from_vec(vec![self.velocity, self.yaw_rate]);
        let mut truth = DVector::<f64>::zeros(motion.state_dimension());
        let mut steps = Vec::with_capacity(self.steps);
        for i in 0..self.steps {
            truth = motion.calc_next_motion(&truth, &command);
            let control = DVector::from_vec(vec![
                self.velocity + velocity_noise.sample(&mut rng),
                self.yaw_rate + yaw_rate_noise.sample(&mut rng),
            ]);
            let observation = sensor
                .observe_at(&truth)
                .into_iter()
                .map(|obs| RangeObservation {
                    range: obs.range + range_noise.sample(&mut rng),
                    ..obs
                })
                .collect();
            steps.push(ScenarioStep {
                time: (i + 1) as f64 * self.dt,
                truth: truth.clone(),
                control,
                observation,
            });
        }
        Ok(steps)
    }
}

/// Filter output for one simulation step
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimateRecord {
    pub step: usize,
    pub time: f64,
    pub true_x: f64,
    pub true_y: f64,
    pub true_yaw: f64,
    pub est_x: f64,
    pub est_y: f64,
    pub est_yaw: f64,
    pub est_v: f64,
    /// Planar distance between estimate and truth (m)
    pub position_error: f64,
    pub cov_xx: f64,
    pub cov_yy: f64,
    pub effective_sample_size: f64,
}
impl EstimateRecord {
    /// Reads a CSV file and returns a vector of `EstimateRecord` structs.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Self>> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for result in rdr.deserialize() {
            let record: Self = result?;
            records.push(record);
        }
        Ok(records)
    }
    /// Writes a slice of `EstimateRecord` structs to a CSV file with a header row.
    pub fn to_csv<P: AsRef<Path>>(records: &[Self], path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Root mean square of the recorded position errors; zero for no records
pub fn rms_position_error(records: &[EstimateRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let sum: f64 = records.iter().map(|r| r.position_error.powi(2)).sum();
    (sum / records.len() as f64).sqrt()
}

/// Drive the filter through the generated steps, one cycle per step.
///
/// Steps whose observations collapse every particle weight are logged and skipped; the filter
/// keeps its previous particle set and continues with the next step. Any other error aborts the
/// run.
///
/// # Errors
/// [`FilterError::DimensionMismatch`] if the filter state is smaller than the
/// `[x, y, yaw, v]` layout the records are read from.
pub fn run_scenario<C, M, O>(
    filter: &mut ParticleFilter<C, M, O>,
    steps: &[ScenarioStep],
) -> Result<Vec<EstimateRecord>>
where
    C: CommandModel + ?Sized,
    M: MotionModel + ?Sized,
    O: ObservationModel<Observation = RangeObservation> + ?Sized,
{
    if filter.state_dimension() < VelocityMotionModel::STATE_DIM {
        return Err(FilterError::DimensionMismatch {
            context: "scenario state",
            expected: VelocityMotionModel::STATE_DIM,
            got: filter.state_dimension(),
        });
    }
    let mut records = Vec::with_capacity(steps.len());
    let mut skipped = 0;
    for (i, step) in steps.iter().enumerate() {
        let (estimate, covariance) = match filter.update(&step.control, &step.observation) {
            Ok(result) => result,
            Err(FilterError::DegenerateWeights(total)) => {
                warn!(
                    "Step {}: particle weights collapsed (total {}), skipping",
                    i, total
                );
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        let position_error = ((estimate[0] - step.truth[0]).powi(2)
            + (estimate[1] - step.truth[1]).powi(2))
        .sqrt();
        records.push(EstimateRecord {
            step: i,
            time: step.time,
            true_x: step.truth[0],
            true_y: step.truth[1],
            true_yaw: step.truth[2],
            est_x: estimate[0],
            est_y: estimate[1],
            est_yaw: estimate[2],
            est_v: estimate[3],
            position_error,
            cov_xx: covariance[(0, 0)],
            cov_yy: covariance[(1, 1)],
            effective_sample_size: filter.effective_sample_size(),
        });
    }
    info!(
        "Processed {} steps ({} skipped), RMS position error {:.3} m",
        steps.len(),
        skipped,
        rms_position_error(&records)
    );
    Ok(records)
}
