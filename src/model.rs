//! Parametrized wash-in / wash-out time-course models
//!
//! Full model, with `a = [peak, rate_in, rate_out, delay_in, delay_out, base]`:
//!
//! ```text
//! s(t) = peak * { [1 - exp(-(t - d1)/r1)] - H(t - d2) [1 - exp(-(t - d2)/r2)] } + base
//! ```
//!
//! where `H` is 1 for non-negative arguments and 0 otherwise. The wash-in-only
//! model drops the wash-out term, `a = [peak, rate_in, delay_in, base]`.
//!
//! When the series is one sample too short to fit the baseline as well, the
//! baseline is fixed at the measured noise level and removed from `a`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};
use crate::types::{Intensity, Time};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeCourseModel {
    #[serde(rename = "Exponential Rate Decay")]
    ExponentialRateDecay,
    #[serde(rename = "Exponential Washin Only")]
    ExponentialWashinOnly,
}

impl TimeCourseModel {
    pub fn name(self) -> &'static str {
        match self {
            Self::ExponentialRateDecay  => "Exponential Rate Decay",
            Self::ExponentialWashinOnly => "Exponential Washin Only",
        }
    }

    /// Number of parameters when the baseline is fitted
    fn n_params_with_base(self) -> usize {
        match self {
            Self::ExponentialRateDecay  => 6,
            Self::ExponentialWashinOnly => 4,
        }
    }

    /// Fewest time points for which any variant of this model can be fitted
    pub fn min_time_points(self) -> usize {
        // Baseline fixed, plus one degree of freedom
        self.n_params_with_base()
    }
}

impl Default for TimeCourseModel {
    fn default() -> Self { Self::ExponentialRateDecay }
}

impl fmt::Display for TimeCourseModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

impl FromStr for TimeCourseModel {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Exponential Rate Decay"  => Ok(Self::ExponentialRateDecay),
            "Exponential Washin Only" => Ok(Self::ExponentialWashinOnly),
            other                     => Err(Error::UnknownModel(other.into())),
        }
    }
}

/// Whether the baseline `base` is a fit parameter or a fixed noise level
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Baseline {
    Fitted,
    Fixed(Intensity),
}

/// A model together with its baseline treatment: this fixes the length and
/// order of the parameter vector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Variant {
    pub model: TimeCourseModel,
    pub baseline: Baseline,
}

const FULL_NAMES:   [&str; 6] = ["Peak", "R1", "R2", "Delay1", "Delay2", "Base"];
const WASHIN_NAMES: [&str; 4] = ["Peak", "R1", "Delay1", "Base"];

impl Variant {

    pub fn new(model: TimeCourseModel, baseline: Baseline) -> Self { Self { model, baseline } }

    /// Pick the richest variant of `model` that `n_times` samples can support,
    /// leaving at least one degree of freedom.
    pub fn select(model: TimeCourseModel, n_times: usize, noise: Intensity) -> Result<Self> {
        let with_base = model.n_params_with_base();
        if n_times > with_base {
            Ok(Self::new(model, Baseline::Fitted))
        } else if n_times >= model.min_time_points() {
            Ok(Self::new(model, Baseline::Fixed(noise)))
        } else {
            Err(Error::TooFewTimePoints { model: model.name(), needed: model.min_time_points(), got: n_times })
        }
    }

    pub fn n_params(&self) -> usize {
        match self.baseline {
            Baseline::Fitted   => self.model.n_params_with_base(),
            Baseline::Fixed(_) => self.model.n_params_with_base() - 1,
        }
    }

    pub fn param_names(&self) -> &'static [&'static str] {
        let all: &'static [&'static str] = match self.model {
            TimeCourseModel::ExponentialRateDecay  => &FULL_NAMES,
            TimeCourseModel::ExponentialWashinOnly => &WASHIN_NAMES,
        };
        &all[..self.n_params()]
    }

    pub fn check_params(&self, a: &[f64]) -> Result<()> {
        if a.len() == self.n_params() { Ok(()) }
        else { Err(Error::ParameterCount { expected: self.n_params(), got: a.len() }) }
    }

    /// Predicted signal at every point of `time`
    pub fn evaluate(&self, a: &[f64], time: &[Time]) -> Result<Vec<Intensity>> {
        self.check_params(a)?;
        let mut out = vec![0.0; time.len()];
        self.evaluate_into(a, time, &mut out);
        Ok(out)
    }

    /// As `evaluate`, into a caller-owned buffer. `a` must have `n_params` elements.
    pub(crate) fn evaluate_into(&self, a: &[f64], time: &[Time], out: &mut [Intensity]) {
        debug_assert_eq!(a.len(), self.n_params());
        let Terms { peak, base, .. } = self.terms(a);
        for (y, &t) in out.iter_mut().zip(time) {
            *y = peak * self.shape_at(a, t) + base;
        }
    }

    /// Partial derivatives of the prediction at time `t` with respect to each
    /// parameter, written into `row` (length `n_params`).
    pub(crate) fn gradient_at(&self, a: &[f64], t: Time, row: &mut [f64]) {
        let Terms { peak, r1, d1, wash_out, .. } = self.terms(a);
        let e1 = (-(t - d1) / r1).exp();
        row[0] = self.shape_at(a, t);
        row[1] = -peak * e1 * (t - d1) / (r1 * r1);
        match self.model {
            TimeCourseModel::ExponentialRateDecay => {
                let (r2, d2) = wash_out.unwrap_or((1.0, f64::INFINITY));
                let (dr2, dd2) = if t - d2 >= 0.0 {
                    let e2 = (-(t - d2) / r2).exp();
                    (peak * e2 * (t - d2) / (r2 * r2), peak * e2 / r2)
                } else {
                    (0.0, 0.0)
                };
                row[2] = dr2;
                row[3] = -peak * e1 / r1;
                row[4] = dd2;
                if let Baseline::Fitted = self.baseline { row[5] = 1.0 }
            },
            TimeCourseModel::ExponentialWashinOnly => {
                row[2] = -peak * e1 / r1;
                if let Baseline::Fitted = self.baseline { row[3] = 1.0 }
            },
        }
    }

    /// Bracketed term of the model, before scaling by `peak` and adding `base`
    fn shape_at(&self, a: &[f64], t: Time) -> f64 {
        let Terms { r1, d1, wash_out, .. } = self.terms(a);
        let mut val = 1.0 - (-(1.0 / r1) * (t - d1)).exp();
        if let Some((r2, d2)) = wash_out {
            if t - d2 >= 0.0 {
                val -= 1.0 - (-(1.0 / r2) * (t - d2)).exp();
            }
        }
        val
    }

    fn terms(&self, a: &[f64]) -> Terms {
        let fitted_base = |i: usize| match self.baseline {
            Baseline::Fitted       => a[i],
            Baseline::Fixed(noise) => noise,
        };
        match self.model {
            TimeCourseModel::ExponentialRateDecay => Terms {
                peak: a[0], r1: a[1], d1: a[3], wash_out: Some((a[2], a[4])), base: fitted_base(5),
            },
            TimeCourseModel::ExponentialWashinOnly => Terms {
                peak: a[0], r1: a[1], d1: a[2], wash_out: None, base: fitted_base(3),
            },
        }
    }
}

struct Terms {
    peak: f64,
    r1: f64,
    d1: f64,
    wash_out: Option<(f64, f64)>,
    base: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use float_eq::assert_float_eq;

    const FULL:   TimeCourseModel = TimeCourseModel::ExponentialRateDecay;
    const WASHIN: TimeCourseModel = TimeCourseModel::ExponentialWashinOnly;

    #[rstest(/**/ model , n_times, expected,
             case(FULL  ,   8    , Some(Baseline::Fitted)),
             case(FULL  ,   7    , Some(Baseline::Fitted)),
             case(FULL  ,   6    , Some(Baseline::Fixed(3.0))),
             case(FULL  ,   5    , None),
             case(WASHIN,   5    , Some(Baseline::Fitted)),
             case(WASHIN,   4    , Some(Baseline::Fixed(3.0))),
             case(WASHIN,   3    , None),
    )]
    fn variant_selection(model: TimeCourseModel, n_times: usize, expected: Option<Baseline>) {
        let selected = Variant::select(model, n_times, 3.0).ok().map(|v| v.baseline);
        assert_eq!(selected, expected);
    }

    #[test]
    fn too_few_points_names_minimum() {
        match Variant::select(FULL, 4, 0.0) {
            Err(Error::TooFewTimePoints { needed: 6, got: 4, .. }) => {},
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parameter_names_follow_variant() {
        let v = Variant::new(FULL, Baseline::Fixed(1.0));
        assert_eq!(v.param_names(), &["Peak", "R1", "R2", "Delay1", "Delay2"]);
        let v = Variant::new(WASHIN, Baseline::Fitted);
        assert_eq!(v.param_names(), &["Peak", "R1", "Delay1", "Base"]);
    }

    #[test]
    fn model_names_roundtrip_through_strings() {
        for m in [FULL, WASHIN] {
            assert_eq!(m.name().parse::<TimeCourseModel>().unwrap(), m);
        }
        assert!("Gaussian".parse::<TimeCourseModel>().is_err());
    }

    #[test]
    fn fixed_baseline_uses_noise() {
        let time = [0.0, 100.0, 1e6];
        let v = Variant::new(WASHIN, Baseline::Fixed(7.0));
        let s = v.evaluate(&[100.0, 10.0, 0.0], &time).unwrap();
        assert_float_eq!(s[0],   7.0, abs <= 1e-12);
        assert_float_eq!(s[2], 107.0, abs <= 1e-9);
    }

    #[test]
    fn wash_out_starts_at_delay2() {
        // Before delay2 the full model coincides with wash-in only
        let time: Vec<f64> = (0..8).map(|i| i as f64 * 50.0).collect();
        let full   = Variant::new(FULL  , Baseline::Fitted).evaluate(&[1000.0, 25.0, 25.0, -40.0, 200.0, 10.0], &time).unwrap();
        let washin = Variant::new(WASHIN, Baseline::Fitted).evaluate(&[1000.0, 25.0,       -40.0,        10.0], &time).unwrap();
        for i in 0..=4 { assert_float_eq!(full[i], washin[i], ulps <= 2) }
        for i in 5..8  { assert!(full[i] < washin[i]) }
    }

    #[test]
    fn wrong_parameter_count_is_rejected() {
        let v = Variant::new(FULL, Baseline::Fitted);
        assert!(matches!(v.evaluate(&[1.0; 5], &[0.0]), Err(Error::ParameterCount { expected: 6, got: 5 })));
    }

    // Compare analytic gradient with central differences, away from the wash-out kink
    #[rstest(/**/ model , baseline          , a,
             case(FULL  , Baseline::Fitted   , vec![900.0, 30.0, 20.0, -35.0, 180.0, 12.0]),
             case(FULL  , Baseline::Fixed(4.0), vec![900.0, 30.0, 20.0, -35.0, 180.0]),
             case(WASHIN, Baseline::Fitted   , vec![500.0, 30.0, -20.0, 5.0]),
             case(WASHIN, Baseline::Fixed(4.0), vec![500.0, 30.0, -20.0]),
    )]
    fn gradient_matches_finite_differences(model: TimeCourseModel, baseline: Baseline, a: Vec<f64>) {
        let v = Variant::new(model, baseline);
        for t in [0.0, 45.0, 170.0, 230.0, 333.0] {
            let mut analytic = vec![0.0; a.len()];
            v.gradient_at(&a, t, &mut analytic);
            for j in 0..a.len() {
                let h = 1e-5 * a[j].abs().max(1.0);
                let (mut up, mut down) = (a.clone(), a.clone());
                up[j] += h; down[j] -= h;
                let f = |p: &[f64]| v.evaluate(p, &[t]).unwrap()[0];
                let numeric = (f(&up) - f(&down)) / (2.0 * h);
                assert_float_eq!(analytic[j], numeric, abs <= 1e-4 * numeric.abs().max(1.0));
            }
        }
    }
}
