//! Radial-basis weight solver for the matrix-distance mapper.
//!
//! Calibrated poses are local-frame transforms; distance between two poses
//! is the Frobenius norm of the difference of their matrices. The kernel
//! matrix over the calibrated poses is inverted once so that evaluating
//! exactly at pose i returns weight 1 for i and 0 for the rest, and blends
//! smoothly in between. The solve is cached per node and rebuilt when the
//! pose set or the solver policy changes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use nalgebra::{DMatrix, DVector, Matrix4, Quaternion, UnitQuaternion, Vector3};
use quadrig_api_core::Transform;
use serde::{Deserialize, Serialize};

use crate::error::CorrectiveError;

/// Interpolation kernel applied to pose distances.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    #[default]
    Gaussian,
    Multiquadric,
    InverseMultiquadric,
    Linear,
    ThinPlate,
}

impl Kernel {
    fn response(self, r: f32, width: f32) -> f32 {
        let w = width.max(f32::EPSILON);
        match self {
            Kernel::Gaussian => (-(r / w) * (r / w)).exp(),
            Kernel::Multiquadric => (r * r + w * w).sqrt(),
            Kernel::InverseMultiquadric => 1.0 / (r * r + w * w).sqrt(),
            Kernel::Linear => r,
            Kernel::ThinPlate => {
                if r <= f32::EPSILON {
                    0.0
                } else {
                    r * r * r.ln()
                }
            }
        }
    }
}

/// Kernel/solver policy for one matrix-distance mapper.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct SolverConfig {
    #[serde(default)]
    pub kernel: Kernel,
    /// Allow extrapolated weights below zero (overshoot corrections).
    #[serde(default)]
    pub allow_negative_weights: bool,
    /// Rescale weight sums above one back to a partition of unity.
    #[serde(default = "default_true")]
    pub normalize: bool,
    /// Kernel width override; derived from the mean pose spacing when unset.
    #[serde(default)]
    pub width: Option<f32>,
}

fn default_true() -> bool {
    true
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            kernel: Kernel::Gaussian,
            allow_negative_weights: false,
            normalize: true,
            width: None,
        }
    }
}

/// Compose a TRS transform into a homogeneous matrix.
pub fn transform_matrix(t: &Transform) -> Matrix4<f32> {
    let rot = UnitQuaternion::from_quaternion(Quaternion::new(
        t.rot[3], t.rot[0], t.rot[1], t.rot[2],
    ));
    let mut m = rot.to_homogeneous();
    m *= Matrix4::new_nonuniform_scaling(&Vector3::new(t.scale[0], t.scale[1], t.scale[2]));
    m[(0, 3)] = t.pos[0];
    m[(1, 3)] = t.pos[1];
    m[(2, 3)] = t.pos[2];
    m
}

/// Frobenius distance between two pose transforms.
pub fn pose_distance(a: &Transform, b: &Transform) -> f32 {
    (transform_matrix(a) - transform_matrix(b)).norm()
}

/// Stable key for a solved pose set + policy, used to invalidate caches.
pub fn state_key(poses: &[Transform], config: &SolverConfig) -> u64 {
    let mut hasher = DefaultHasher::new();
    config.kernel.hash(&mut hasher);
    config.allow_negative_weights.hash(&mut hasher);
    config.normalize.hash(&mut hasher);
    config.width.map(f32::to_bits).hash(&mut hasher);
    for pose in poses {
        for c in pose
            .pos
            .iter()
            .chain(pose.rot.iter())
            .chain(pose.scale.iter())
        {
            c.to_bits().hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// Solved interpolation state for one pose set.
#[derive(Clone, Debug)]
pub struct RbfState {
    pub hash: u64,
    poses: Vec<Transform>,
    width: f32,
    /// Inverse kernel matrix; `None` means the Shepard fallback is active.
    inverse: Option<DMatrix<f32>>,
}

impl RbfState {
    /// Solve the kernel matrix for `poses`. A singular matrix (duplicate
    /// poses, degenerate kernels) falls back to normalized kernel responses
    /// rather than failing evaluation.
    pub fn solve(
        hash: u64,
        poses: &[Transform],
        config: &SolverConfig,
    ) -> Result<Self, CorrectiveError> {
        if poses.is_empty() {
            return Err(CorrectiveError::Solver("no calibrated poses".into()));
        }
        let n = poses.len();
        let width = config.width.unwrap_or_else(|| mean_spacing(poses));

        let mut phi = DMatrix::<f32>::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                phi[(i, j)] = config
                    .kernel
                    .response(pose_distance(&poses[i], &poses[j]), width);
            }
        }

        let inverse = phi.try_inverse();
        if inverse.is_none() {
            log::warn!(
                "rbf kernel matrix is singular for {} pose(s); using normalized kernel responses",
                n
            );
        }

        Ok(Self {
            hash,
            poses: poses.to_vec(),
            width,
            inverse,
        })
    }

    pub fn pose_count(&self) -> usize {
        self.poses.len()
    }

    /// One weight per calibrated pose for the current driver transform.
    pub fn weights(&self, current: &Transform, config: &SolverConfig) -> Vec<f32> {
        let n = self.poses.len();
        let distances: Vec<f32> = self
            .poses
            .iter()
            .map(|p| pose_distance(p, current))
            .collect();

        let mut weights = match &self.inverse {
            Some(inverse) => {
                let responses = DVector::from_iterator(
                    n,
                    distances
                        .iter()
                        .map(|r| config.kernel.response(*r, self.width)),
                );
                (inverse * responses).iter().copied().collect::<Vec<f32>>()
            }
            None => shepard_weights(&distances, config.kernel, self.width),
        };

        if !config.allow_negative_weights {
            for w in &mut weights {
                *w = w.max(0.0);
            }
        }
        if config.normalize {
            let sum: f32 = weights.iter().sum();
            if sum > 1.0 {
                for w in &mut weights {
                    *w /= sum;
                }
            }
        }
        weights
    }
}

/// Inverse-distance fallback: exact at samples, normalized in between.
fn shepard_weights(distances: &[f32], kernel: Kernel, width: f32) -> Vec<f32> {
    if let Some(hit) = distances.iter().position(|d| *d <= f32::EPSILON) {
        let mut w = vec![0.0; distances.len()];
        w[hit] = 1.0;
        return w;
    }
    let responses: Vec<f32> = distances
        .iter()
        .map(|r| kernel.response(*r, width).abs())
        .collect();
    let sum: f32 = responses.iter().sum();
    if sum <= f32::EPSILON {
        return vec![0.0; distances.len()];
    }
    responses.iter().map(|r| r / sum).collect()
}

/// Mean pairwise distance between poses; 1.0 for a lone pose.
fn mean_spacing(poses: &[Transform]) -> f32 {
    let n = poses.len();
    if n < 2 {
        return 1.0;
    }
    let mut total = 0.0;
    let mut count = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            total += pose_distance(&poses[i], &poses[j]);
            count += 1;
        }
    }
    let mean = total / count as f32;
    if mean <= f32::EPSILON {
        1.0
    } else {
        mean
    }
}
