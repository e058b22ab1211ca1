//! Turning a volume request into per-transfer volumes, and splitting those to fit the tip.

use crate::error::ValidationError;
use crate::options::GradientFunction;
use serde::{Deserialize, Serialize};

/// How much liquid each transfer should move.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum VolumeSpec {
    /// The same volume for every transfer.
    Uniform(f64),
    /// One volume per transfer; the length must match the transfer count.
    PerTransfer(Vec<f64>),
    /// Volumes spread from `min` (first transfer) to `max` (last transfer).
    Gradient { min: f64, max: f64 },
}

impl From<f64> for VolumeSpec {
    fn from(volume: f64) -> Self {
        VolumeSpec::Uniform(volume)
    }
}

impl From<Vec<f64>> for VolumeSpec {
    fn from(volumes: Vec<f64>) -> Self {
        VolumeSpec::PerTransfer(volumes)
    }
}

impl From<&[f64]> for VolumeSpec {
    fn from(volumes: &[f64]) -> Self {
        VolumeSpec::PerTransfer(volumes.to_vec())
    }
}

impl From<(f64, f64)> for VolumeSpec {
    fn from((min, max): (f64, f64)) -> Self {
        VolumeSpec::Gradient { min, max }
    }
}

impl VolumeSpec {
    /// Expands this spec into exactly `total` per-transfer volumes.
    ///
    /// Fails if an explicit list has the wrong length or any volume is negative
    /// or non-finite.
    pub fn to_volume_list(
        &self,
        total: usize,
        gradient: &GradientFunction,
    ) -> Result<Vec<f64>, ValidationError> {
        let volumes = match self {
            VolumeSpec::Uniform(volume) => vec![*volume; total],
            VolumeSpec::PerTransfer(volumes) => {
                if volumes.len() != total {
                    return Err(ValidationError::VolumeListLength {
                        expected: total,
                        actual: volumes.len(),
                    });
                }
                volumes.clone()
            }
            VolumeSpec::Gradient { min, max } => volume_gradient(*min, *max, total, gradient),
        };
        for &volume in &volumes {
            crate::options::non_negative("volume", volume)?;
        }
        Ok(volumes)
    }
}

/// Maps `total` transfers onto the gradient between `min` and `max`.
///
/// Transfer `i` sits at `i / (total - 1)` on the curve; a single transfer sits at 0.
/// The endpoints land exactly on `min` and `max` under the linear curve.
pub fn volume_gradient(min: f64, max: f64, total: usize, gradient: &GradientFunction) -> Vec<f64> {
    (0..total)
        .map(|i| {
            let rel_x = if total > 1 {
                i as f64 / (total - 1) as f64
            } else {
                0.0
            };
            let rel_y = gradient.apply(rel_x);
            min * (1.0 - rel_y) + max * rel_y
        })
        .collect()
}

/// Splits one volume so no piece exceeds `max_volume`.
///
/// Whole multiples are peeled off first; a remainder between one and two times
/// the ceiling is halved rather than leaving a tiny final piece. Volumes already
/// within the ceiling come back unchanged.
pub fn split_volume(volume: f64, max_volume: f64) -> Vec<f64> {
    if max_volume <= 0.0 {
        return vec![volume];
    }
    let mut pieces = Vec::new();
    let mut remaining = volume;
    while remaining > max_volume * 2.0 {
        pieces.push(max_volume);
        remaining -= max_volume;
    }
    if remaining > max_volume {
        remaining /= 2.0;
        pieces.push(remaining);
    }
    pieces.push(remaining);
    pieces
}

/// Splits a sequence of proposed `(volume, target)` transfers to fit under `max_volume`.
///
/// Volumes and targets are paired positionally; extra items on either side are ignored.
pub fn expand_for_volume_constraints<T: Clone>(
    volumes: impl IntoIterator<Item = f64>,
    targets: impl IntoIterator<Item = T>,
    max_volume: f64,
) -> Vec<(f64, T)> {
    volumes
        .into_iter()
        .zip(targets)
        .flat_map(|(volume, target)| {
            split_volume(volume, max_volume)
                .into_iter()
                .map(move |piece| (piece, target.clone()))
        })
        .collect()
}
