//! Configuration file parser for voxel fitting

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};
use crate::model::TimeCourseModel;
use crate::weights::WeightFunction;

/// Smallest rate (seconds) ever handed to the model: rates appear as `1/r`.
pub const RATE_FLOOR: f64 = 1e-3;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct Config {

    /// Time course model to fit in every voxel
    pub model: TimeCourseModel,

    pub weighting: Weighting,

    pub bounds: Bounds,

    pub solver: Solver,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: TimeCourseModel::default(),
            weighting: Weighting::default(),
            bounds: Bounds::default(),
            solver: Solver::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct Weighting {
    pub function: WeightFunction,
    pub scale: f64,
}

impl Default for Weighting {
    fn default() -> Self { Self { function: WeightFunction::default(), scale: 3.0 } }
}

/// Lower limit, starting value and upper limit of one parameter
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Limits {
    pub min: f64,
    pub start: f64,
    pub max: f64,
}

impl Limits {
    pub const fn new(min: f64, start: f64, max: f64) -> Self { Self { min, start, max } }

    fn check(&self, param: &'static str) -> Result<()> {
        let Limits { min, start, max } = *self;
        let finite = min.is_finite() && start.is_finite() && max.is_finite();
        if finite && min <= start && start <= max { Ok(()) }
        else { Err(Error::InvertedBounds { param, min, start, max }) }
    }

    /// Sort the three values so that `min <= start <= max`
    pub fn sorted(self) -> Self {
        let mut v = [self.min, self.start, self.max];
        v.sort_by(f64::total_cmp);
        Self::new(v[0], v[1], v[2])
    }
}

/// Parameter limits. `peak` and `base` are percentages of the largest sample
/// in the voxel; rates and delays are in seconds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct Bounds {
    pub peak:   Limits,
    pub rate1:  Limits,
    pub rate2:  Limits,
    pub delay1: Limits,
    pub delay2: Limits,
    pub base:   Limits,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            peak:   Limits::new( 10.0,  20.0, 500.0),
            rate1:  Limits::new(  5.0,  25.0, 320.0),
            rate2:  Limits::new(  5.0,  25.0, 330.0),
            delay1: Limits::new(-45.0, -40.0,   5.0),
            delay2: Limits::new(150.0, 200.0, 346.0),
            base:   Limits::new(  1.0,  10.0,  20.0),
        }
    }
}

impl Bounds {
    pub fn validate(&self) -> Result<()> {
        self.peak  .check("peak"  )?;
        self.rate1 .check("rate1" )?;
        self.rate2 .check("rate2" )?;
        self.delay1.check("delay1")?;
        self.delay2.check("delay2")?;
        self.base  .check("base"  )?;
        for (name, limits) in [("rate1", self.rate1), ("rate2", self.rate2)] {
            if limits.min < RATE_FLOOR {
                return Err(Error::InvalidSetting {
                    name,
                    reason: format!("minimum rate must be at least {RATE_FLOOR} s, got {}", limits.min),
                });
            }
        }
        Ok(())
    }

    /// Clamp-style repair of user input: every triple sorted, rates kept
    /// clear of zero.
    pub fn sorted(self) -> Self {
        let floor = |l: Limits| {
            let l = l.sorted();
            Limits::new(l.min.max(RATE_FLOOR), l.start.max(RATE_FLOOR), l.max.max(RATE_FLOOR))
        };
        Self {
            peak:   self.peak  .sorted(),
            rate1:  floor(self.rate1),
            rate2:  floor(self.rate2),
            delay1: self.delay1.sorted(),
            delay2: self.delay2.sorted(),
            base:   self.base  .sorted(),
        }
    }
}

/// Stopping criteria of the bounded least-squares solver
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct Solver {
    /// Function evaluations allowed per parameter before giving up
    pub patience: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
}

impl Default for Solver {
    fn default() -> Self { Self { patience: 200, ftol: 1e-10, xtol: 1e-10, gtol: 0.0 } }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.bounds.validate()?;
        let scale = self.weighting.scale;
        if !(scale.is_finite() && scale >= 0.0) {
            return Err(Error::InvalidSetting { name: "weighting.scale", reason: format!("must be finite and non-negative, got {scale}") });
        }
        if self.solver.patience == 0 {
            return Err(Error::InvalidSetting { name: "solver.patience", reason: "must be positive".into() });
        }
        Ok(())
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

/// Read and validate a configuration file. With `repair`, inverted limit
/// triples are sorted and rate limits lifted off zero before validation.
pub fn read_config_file(path: &Path, repair: bool) -> Result<Config> {
    let text = fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&text)?;
    if repair {
        config.bounds = config.bounds.sorted();
    }
    config.validate()?;
    Ok(config)
}

/// The defaults, spelled out as a TOML file
pub const DEFAULT_CONFIG_TOML: &str = r#"model = "Exponential Rate Decay"

[weighting]
function = "Asymmetric Half-Sine"
scale = 3.0

# peak and base: percent of the largest sample in the voxel
# rates and delays: seconds
[bounds]
peak   = { min =  10.0, start =  20.0, max = 500.0 }
rate1  = { min =   5.0, start =  25.0, max = 320.0 }
rate2  = { min =   5.0, start =  25.0, max = 330.0 }
delay1 = { min = -45.0, start = -40.0, max =   5.0 }
delay2 = { min = 150.0, start = 200.0, max = 346.0 }
base   = { min =   1.0, start =  10.0, max =  20.0 }

[solver]
patience = 200
ftol = 1e-10
xtol = 1e-10
gtol = 0.0
"#;
