//! Voxel iteration: fit a sequence of voxels and record the results
//!
//! Every voxel is handled atomically: extract its time course, derive start
//! values and bounds, fit, write the result maps. A run that stops part way
//! (cancelled, or aborted by a configuration error) leaves the voxels already
//! written in place.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{Error, Result};
use crate::bounds::initial_values;
use crate::config::fit::{Bounds, Config, Solver};
use crate::fit::{fit_voxel, FitStatus};
use crate::maps::{MapName, ResultMaps};
use crate::model::{Baseline, TimeCourseModel, Variant};
use crate::types::{Intensity, Time, Voxel};
use crate::volume::Volume;
use crate::weights::weights;

/// Granularity of a fitting request. All of them go through the same
/// per-voxel pipeline; the distinction only shows up in the logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entry { One, Slice, All }

/// Shared flag which stops a run between two voxels
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self { Self::default() }
    pub fn cancel(&self) { self.0.store(true, Ordering::Relaxed) }
    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Relaxed) }
}

/// Everything needed to redraw one voxel's fit without repeating it
#[derive(Clone, Debug, PartialEq)]
pub struct LastFit {
    pub voxel:    Voxel,
    pub time:     Vec<Time>,
    pub observed: Vec<Intensity>,
    pub fit:      Vec<Intensity>,
    pub params:   Vec<f64>,
    pub chis:     f64,
    pub status:   FitStatus,
}

impl LastFit {
    pub fn residual(&self) -> Vec<Intensity> {
        self.observed.iter().zip(&self.fit).map(|(y, f)| y - f).collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    /// Number of voxels fitted and written
    pub fitted: usize,
    pub cancelled: bool,
    /// The final voxel fitted in this run
    pub last: Option<LastFit>,
}

/// Fitting settings which are the same for every voxel of one volume
#[derive(Clone, Debug)]
pub struct Chain {
    variant: Variant,
    weights: Vec<f64>,
    bounds:  Bounds,
    solver:  Solver,
}

impl Chain {

    pub fn new(config: &Config, variant: Variant, n_times: usize) -> Self {
        Self {
            variant,
            weights: weights(config.weighting.function, config.weighting.scale, n_times),
            bounds: config.bounds,
            solver: config.solver,
        }
    }

    pub fn variant(&self) -> &Variant { &self.variant }
    pub fn weights(&self) -> &[f64] { &self.weights }

    /// Fit one voxel without recording anything
    pub fn fit_one(&self, volume: &Volume, voxel: Voxel) -> Result<LastFit> {
        let observed = volume.series(voxel)?;
        let initial = initial_values(&self.variant, &observed, &self.bounds)?;
        let result = fit_voxel(
            &self.variant, volume.time(), &self.weights, &observed,
            &initial.start, &initial.pairs(), &self.solver,
        );
        debug!("Voxel ({}, {}, {}): status {} chis {:.4e} after {} evaluations",
               voxel.x, voxel.y, voxel.z, result.status.code(), result.chis, result.evaluations);
        Ok(LastFit {
            voxel,
            time: volume.time().to_vec(),
            observed,
            fit: result.curve,
            params: result.params,
            chis: result.chis,
            status: result.status,
        })
    }

    /// Fit `voxels` in the given order, writing each result into `maps`.
    ///
    /// `status` is told `"Fitting Slice z"` whenever the run moves to a new
    /// slice, unless the run has been cancelled by then. Problems with the request itself are reported before any voxel
    /// is touched.
    pub fn run(
        &self,
        volume    : &Volume,
        maps      : &mut ResultMaps,
        voxels    : &[Voxel],
        entry     : Entry,
        mut status: impl FnMut(&str),
        cancel    : &CancelToken,
    ) -> Result<RunReport> {
        self.check_request(volume, maps, voxels)?;
        info!("Fitting {} voxel(s) ({entry:?}) with {}", voxels.len(), self.variant.model);
        let mut report = RunReport { fitted: 0, cancelled: false, last: None };
        let mut z_last = None;
        for &voxel in voxels {
            if !cancel.is_cancelled() && z_last != Some(voxel.z) {
                self.enter_slice(voxel.z, &mut status);
                z_last = Some(voxel.z);
            }
            // The status callback itself may cancel
            if cancel.is_cancelled() {
                warn!("Fit cancelled after {} of {} voxels", report.fitted, voxels.len());
                report.cancelled = true;
                break;
            }
            let fit = self.fit_one(volume, voxel)?;
            self.record(maps, volume, &fit)?;
            report.fitted += 1;
            report.last = Some(fit);
        }
        info!("Fitted {} voxel(s)", report.fitted);
        Ok(report)
    }

    /// As [`run`](Self::run), but the voxels of each run of equal `z` are
    /// fitted concurrently. Results are written in the order of `voxels`.
    pub fn run_parallel(
        &self,
        volume    : &Volume,
        maps      : &mut ResultMaps,
        voxels    : &[Voxel],
        entry     : Entry,
        mut status: impl FnMut(&str),
        cancel    : &CancelToken,
    ) -> Result<RunReport> {
        self.check_request(volume, maps, voxels)?;
        info!("Fitting {} voxel(s) ({entry:?}) with {} in parallel", voxels.len(), self.variant.model);
        let mut report = RunReport { fitted: 0, cancelled: false, last: None };
        let slices = voxels.iter().copied().group_by(|v| v.z);
        for (z, slice) in &slices {
            if cancel.is_cancelled() { break }
            self.enter_slice(z, &mut status);
            let slice = slice.collect_vec();
            let fits: Vec<Option<Result<LastFit>>> = slice
                .par_iter()
                .map(|&voxel| (!cancel.is_cancelled()).then(|| self.fit_one(volume, voxel)))
                .collect();
            for fit in fits.into_iter().flatten() {
                let fit = fit?;
                self.record(maps, volume, &fit)?;
                report.fitted += 1;
                report.last = Some(fit);
            }
        }
        if cancel.is_cancelled() && report.fitted < voxels.len() {
            warn!("Fit cancelled after {} of {} voxels", report.fitted, voxels.len());
            report.cancelled = true;
        }
        info!("Fitted {} voxel(s)", report.fitted);
        Ok(report)
    }

    fn enter_slice(&self, z: usize, status: &mut impl FnMut(&str)) {
        info!("Fitting slice {z}");
        status(&format!("Fitting Slice {z}"));
    }

    fn check_request(&self, volume: &Volume, maps: &ResultMaps, voxels: &[Voxel]) -> Result<()> {
        let shape = volume.shape();
        if maps.shape() != shape {
            return Err(Error::Volume(format!("result maps {:?} do not match volume {:?}", maps.shape(), shape)));
        }
        let needed = self.variant.n_params() + 1;
        if volume.n_times() < needed {
            return Err(Error::TooFewTimePoints { model: self.variant.model.name(), needed, got: volume.n_times() });
        }
        if self.weights.len() != volume.n_times() {
            return Err(Error::Volume(format!("{} weights for {} time points", self.weights.len(), volume.n_times())));
        }
        if let Some(v) = voxels.iter().find(|v| !v.is_inside(shape)) {
            return Err(Error::VoxelOutOfRange { x: v.x, y: v.y, z: v.z, shape });
        }
        Ok(())
    }

    /// Write one voxel's fit into the maps of its model
    fn record(&self, maps: &mut ResultMaps, volume: &Volume, fit: &LastFit) -> Result<()> {
        use MapName::*;
        let a = &fit.params;
        let base = |i: usize| match self.variant.baseline {
            Baseline::Fitted       => a[i],
            Baseline::Fixed(noise) => noise,
        };
        let values = match self.variant.model {
            TimeCourseModel::ExponentialRateDecay =>
                [(Peak, a[0]), (R1, a[1]), (R2, a[2]), (Delay1, a[3]), (Delay2, a[4]), (Base, base(5))],
            TimeCourseModel::ExponentialWashinOnly => {
                let t_max = volume.time().iter().copied().fold(f64::NEG_INFINITY, f64::max);
                [(Peak, a[0]), (R1, a[1]), (R2, 1.0), (Delay1, a[2]), (Delay2, t_max), (Base, base(3))]
            },
        };
        for (name, value) in values {
            maps.set_voxel(name, fit.voxel, value)?;
        }
        maps.set_voxel(Chis, fit.voxel, fit.chis)?;
        maps.set_voxel(Badfit, fit.voxel, f64::from(fit.status.code()))?;
        Ok(())
    }
}
