//! Voxel-wise fitting of wash-in / wash-out time courses in 4-D image volumes

pub mod error;
pub use error::{Error, Result};

pub mod types;
pub mod model;
pub mod weights;
pub mod bounds;
pub mod objective;
pub mod fit;
pub mod maps;
pub mod volume;
pub mod chain;
pub mod timeseries;
pub mod simulate;
pub mod config;
pub mod io;
pub mod utils;

pub use chain::{CancelToken, Chain, Entry, LastFit, RunReport};
pub use config::fit::Config;
pub use fit::{FitStatus, VoxelFit};
pub use maps::{MapName, ResultMaps};
pub use model::{Baseline, TimeCourseModel, Variant};
pub use timeseries::Timeseries;
pub use types::Voxel;
pub use volume::Volume;
pub use weights::WeightFunction;
