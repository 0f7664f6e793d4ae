//! Per-time-point weights for the least-squares objective

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};
use crate::types::Weight;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightFunction {
    #[serde(rename = "Even")]
    Even,
    #[serde(rename = "Asymmetric Half-Sine")]
    AsymmetricHalfSine,
}

impl WeightFunction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Even               => "Even",
            Self::AsymmetricHalfSine => "Asymmetric Half-Sine",
        }
    }
}

impl Default for WeightFunction {
    fn default() -> Self { Self::AsymmetricHalfSine }
}

impl fmt::Display for WeightFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for WeightFunction {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Even"                 => Ok(Self::Even),
            "Asymmetric Half-Sine" => Ok(Self::AsymmetricHalfSine),
            other                  => Err(Error::UnknownWeighting(other.into())),
        }
    }
}

/// Weight vector of length `n`.
///
/// The half-sine samples the falling half of a sine arch: the window is shifted
/// by a third of the series so that early wash-in points get less weight than
/// the plateau. `scale` must be non-negative for the weights to stay positive.
pub fn weights(function: WeightFunction, scale: f64, n: usize) -> Vec<Weight> {
    match function {
        WeightFunction::Even => vec![1.0; n],
        WeightFunction::AsymmetricHalfSine => {
            let offset = n / 3;
            let denominator = (n + offset).saturating_sub(1);
            (0..n)
                .map(|i| {
                    let arch = if denominator == 0 { 0.0 }
                               else { (std::f64::consts::PI * (i + offset) as f64 / denominator as f64).sin() };
                    scale * arch + 0.5
                })
                .collect()
        }
    }
}
