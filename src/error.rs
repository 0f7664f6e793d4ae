//! Errors which abort a fitting request before any voxel is touched.
//!
//! Per-voxel convergence problems are *not* errors: they are reported as
//! [`FitStatus`](crate::fit::FitStatus) values and stored in the `Badfit` map.

use thiserror::Error;

use crate::types::Shape3;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{model} needs at least {needed} time points, but the volume has {got}")]
    TooFewTimePoints { model: &'static str, needed: usize, got: usize },

    #[error("mask shape {got:?} does not match result map shape {expected:?}")]
    MaskShape { expected: Shape3, got: Shape3 },

    #[error("masks are not all the same shape: {first:?} vs {other:?}")]
    MaskShapesDiffer { first: Shape3, other: Shape3 },

    #[error("model variant expects {expected} parameters, got {got}")]
    ParameterCount { expected: usize, got: usize },

    #[error("unknown time course model `{0}`")]
    UnknownModel(String),

    #[error("unknown weighting function `{0}`")]
    UnknownWeighting(String),

    #[error("bounds for `{param}` must satisfy min <= start <= max, got {min} / {start} / {max}")]
    InvertedBounds { param: &'static str, min: f64, start: f64, max: f64 },

    #[error("invalid setting `{name}`: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    #[error("time axis: {0}")]
    TimeAxis(String),

    #[error("volume: {0}")]
    Volume(String),

    #[error("voxel ({x}, {y}, {z}) lies outside shape {shape:?}")]
    VoxelOutOfRange { x: usize, y: usize, z: usize, shape: Shape3 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Toml(#[from] toml::de::Error),
}
