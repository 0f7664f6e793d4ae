//! Synthetic wash-in / wash-out volumes
//!
//! Each slice carries one parameter set of the full model inside a block of
//! voxels, surrounded by a noise-only border. Every voxel of a slice gets
//! uniform noise in `[0, peak / snr)`, and the result is rounded to whole
//! numbers like scanner output.

use ndarray::{s, Array3, Array4};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::info;

use crate::Result;
use crate::config::simulation::{Simulation, Swept};
use crate::model::{Baseline, TimeCourseModel, Variant};
use crate::volume::Volume;

pub struct Simulated {
    pub volume: Volume,
    /// 1 over the signal block of every slice
    pub mask: Array3<i32>,
    /// Full model parameters `[peak, r1, r2, d1, d2, base]` of each slice
    pub params: Vec<[f64; 6]>,
    /// Noise amplitude `peak / snr` of each slice
    pub amplitudes: Vec<f64>,
    /// Standard deviation of the border rows above the signal in the first slice
    pub noise: f64,
}

pub fn simulate(sim: &Simulation) -> Result<Simulated> {
    sim.validate()?;
    let time: Vec<f64> = (0..sim.time_points).map(|i| sim.time_start + sim.time_step * i as f64).collect();
    let fixed = [sim.peak, sim.rate1, sim.rate2, sim.delay1, sim.delay2, sim.base];

    let slices: Vec<([f64; 6], f64)> = if sim.sweeps.is_empty() {
        vec![(fixed, sim.peak / sim.snr)]
    } else {
        sim.sweeps.iter()
            .flat_map(|sweep| sweep.values().map(move |v| {
                let mut p = fixed;
                let mut snr = sim.snr;
                match sweep.parameter {
                    Swept::Snr    => snr  = v,
                    Swept::Rate1  => p[1] = v,
                    Swept::Rate2  => p[2] = v,
                    Swept::Delay1 => p[3] = v,
                    Swept::Delay2 => p[4] = v,
                    Swept::Base   => p[5] = v,
                }
                (p, sim.peak / snr)
            }))
            .collect()
    };

    let model = Variant::new(TimeCourseModel::ExponentialRateDecay, Baseline::Fitted);
    let signals = slices.iter()
        .map(|(p, _)| model.evaluate(p, &time))
        .collect::<Result<Vec<_>>>()?;

    let (n, nz, nt) = (sim.size, slices.len(), sim.time_points);
    let rows = sim.margin..sim.margin + sim.block_rows();
    let cols = sim.margin..n - sim.margin;
    let mut rng = StdRng::seed_from_u64(sim.seed);
    let mut data = Array4::zeros((n, n, nz, nt));
    let mut mask = Array3::zeros((n, n, nz));
    for (z, ((_, amplitude), signal)) in slices.iter().zip(&signals).enumerate() {
        for (y, x) in itertools::iproduct!(0..n, 0..n) {
            let inside = rows.contains(&y) && cols.contains(&x);
            if inside { mask[[y, x, z]] = 1 }
            for t in 0..nt {
                let clean = if inside { signal[t] } else { 0.0 };
                data[[y, x, z, t]] = (clean + rng.gen::<f64>() * amplitude).round();
            }
        }
    }

    let noise = if sim.margin == 0 { 0.0 }
                else { data.slice(s![0..sim.margin, .., 0, ..]).std(0.0) };
    info!("Simulated {nz} slice(s) of {n} x {n} voxels, {nt} time points");
    Ok(Simulated {
        volume: Volume::new(data, time)?,
        mask,
        params: slices.iter().map(|(p, _)| *p).collect(),
        amplitudes: slices.iter().map(|(_, a)| *a).collect(),
        noise,
    })
}
