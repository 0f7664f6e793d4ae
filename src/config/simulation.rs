//! Configuration file parser for the wash-in / wash-out simulator

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Parameter that varies from slice to slice of a simulated volume
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Swept { Snr, Rate1, Rate2, Delay1, Delay2, Base }

/// `steps` slices, the first at `start`, each one `size` further
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Sweep {
    pub parameter: Swept,
    pub steps: usize,
    pub start: f64,
    pub size: f64,
}

impl Sweep {
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.steps).map(|i| self.start + self.size * i as f64)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct Simulation {

    /// Width and height of every slice, in voxels
    pub size: usize,

    /// Noise-only border around the signal block
    pub margin: usize,

    /// Signal block height, in units of 10 rows
    pub repetitions: usize,

    pub time_points: usize,
    pub time_start: f64,
    pub time_step: f64,

    pub peak: f64,
    pub snr: f64,
    pub rate1: f64,
    pub rate2: f64,
    pub delay1: f64,
    pub delay2: f64,
    pub base: f64,

    /// Slice sweeps, stacked in order. No sweeps: one slice of fixed values.
    #[serde(rename = "sweep")]
    pub sweeps: Vec<Sweep>,

    pub seed: u64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            size: 128, margin: 14, repetitions: 10,
            time_points: 8, time_start: 0.0, time_step: 50.0,
            peak: 1000.0, snr: 40.0,
            rate1: 25.0, rate2: 25.0, delay1: -40.0, delay2: 200.0, base: 10.0,
            sweeps: vec![],
            seed: 0,
        }
    }
}

impl Simulation {
    /// Rows occupied by the signal block
    pub fn block_rows(&self) -> usize { 10 * self.repetitions }

    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &'static str, reason: &str| -> Result<()> { Err(Error::InvalidSetting { name, reason: reason.into() }) };
        if self.size < 2 * self.margin + 1 {
            return invalid("size", "no room for signal inside the margins");
        }
        if self.margin + self.block_rows() > self.size {
            return invalid("repetitions", "signal block taller than the image");
        }
        if self.time_points == 0 { return invalid("time_points", "must be positive") }
        if !(self.time_step > 0.0) { return invalid("time_step", "must be positive") }
        let snrs = std::iter::once(self.snr)
            .chain(self.sweeps.iter().filter(|s| s.parameter == Swept::Snr).flat_map(|s| s.values()));
        for snr in snrs {
            if !(snr > 0.0) { return invalid("snr", "signal to noise ratios must be positive") }
        }
        Ok(())
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let simulation: Self = toml::from_str(text)?;
        simulation.validate()?;
        Ok(simulation)
    }
}

pub fn read_simulation_file(path: &Path) -> Result<Simulation> {
    Simulation::from_toml(&fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweeps_from_toml() {
        let sim = Simulation::from_toml(r#"
            time_points = 10
            seed = 7

            [[sweep]]
            parameter = "rate1"
            steps = 3
            start = 10.0
            size = 5.0

            [[sweep]]
            parameter = "snr"
            steps = 2
            start = 5.0
            size = 5.0
        "#).unwrap();
        assert_eq!(sim.time_points, 10);
        assert_eq!(sim.peak, 1000.0);
        assert_eq!(sim.sweeps.len(), 2);
        assert_eq!(sim.sweeps[0].values().collect::<Vec<_>>(), vec![10.0, 15.0, 20.0]);
        assert_eq!(sim.sweeps[1].parameter, Swept::Snr);
    }

    #[test]
    fn impossible_geometry_is_rejected() {
        assert!(Simulation::from_toml("size = 20\nmargin = 14").is_err());
        assert!(Simulation::from_toml("size = 40\nmargin = 4\nrepetitions = 4").is_err());
        assert!(Simulation::from_toml("snr = 0.0").is_err());
        assert!(Simulation::from_toml("colour = 3").is_err());
    }
}
