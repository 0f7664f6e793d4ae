//! Starting values and box bounds for one voxel's fit
//!
//! Peak and baseline limits are percentages of the largest sample in the
//! voxel. Rate and delay limits are absolute seconds taken straight from the
//! configuration; the upper rate limit is raised to at least twice the
//! starting rate so that the start never sits on the boundary.

use crate::{Error, Result};
use crate::config::fit::{Bounds, Limits, RATE_FLOOR};
use crate::model::{Baseline, TimeCourseModel, Variant};
use crate::types::Intensity;

/// Starting vector and per-parameter limits, in the variant's parameter order
#[derive(Clone, Debug, PartialEq)]
pub struct InitialValues {
    pub start: Vec<f64>,
    pub min:   Vec<f64>,
    pub max:   Vec<f64>,
}

impl InitialValues {
    /// `(min, max)` for each parameter, as consumed by the optimizer
    pub fn pairs(&self) -> Vec<(f64, f64)> {
        self.min.iter().copied().zip(self.max.iter().copied()).collect()
    }

    /// Lower and upper limits as two parallel slices
    pub fn parallel(&self) -> (&[f64], &[f64]) { (&self.min, &self.max) }

    pub fn len(&self) -> usize { self.start.len() }

    pub fn is_empty(&self) -> bool { self.start.is_empty() }

    pub fn contains(&self, a: &[f64]) -> bool {
        a.len() == self.len() &&
            a.iter().zip(self.pairs()).all(|(&x, (lo, hi))| lo <= x && x <= hi)
    }
}

pub fn initial_values(variant: &Variant, data: &[Intensity], bounds: &Bounds) -> Result<InitialValues> {
    let needed = variant.n_params() + 1;
    if data.len() < needed {
        return Err(Error::TooFewTimePoints { model: variant.model.name(), needed, got: data.len() });
    }
    let scale = data.iter().copied().filter(|x| x.is_finite()).fold(f64::NEG_INFINITY, f64::max);
    let scale = if scale.is_finite() { scale } else { 0.0 };

    let percent = |l: Limits| scaled(l, scale / 100.0);
    let rate = |l: Limits| {
        let min = l.min.max(RATE_FLOOR);
        let max = l.max.max(2.0 * l.start).max(min);
        entry(min, l.start, max)
    };
    let seconds = |l: Limits| entry(l.min, l.start, l.max);

    let mut entries = vec![percent(bounds.peak), rate(bounds.rate1)];
    match variant.model {
        TimeCourseModel::ExponentialRateDecay => {
            entries.push(rate(bounds.rate2));
            entries.push(seconds(bounds.delay1));
            entries.push(seconds(bounds.delay2));
        },
        TimeCourseModel::ExponentialWashinOnly => {
            entries.push(seconds(bounds.delay1));
        },
    }
    if let Baseline::Fitted = variant.baseline {
        entries.push(percent(bounds.base));
    }

    let (start, (min, max)): (Vec<f64>, (Vec<f64>, Vec<f64>)) = entries.into_iter()
        .map(|(lo, s, hi)| (s, (lo, hi)))
        .unzip();
    Ok(InitialValues { start, min, max })
}

fn scaled(l: Limits, by: f64) -> (f64, f64, f64) {
    entry(l.min * by, l.start * by, l.max * by)
}

/// Order the limits (a negative voxel maximum flips them) and pull the start inside
fn entry(a: f64, start: f64, b: f64) -> (f64, f64, f64) {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    (lo, start.clamp(lo, hi), hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use proptest::prelude::*;

    fn full() -> Variant { Variant::new(TimeCourseModel::ExponentialRateDecay, Baseline::Fitted) }

    #[test]
    fn defaults_for_full_model() {
        let data = [0.0, 100.0, 2000.0, 500.0, 10.0, 10.0, 10.0, 10.0];
        let iv = initial_values(&full(), &data, &Bounds::default()).unwrap();
        assert_float_eq!(iv.start, vec![ 400.0, 25.0, 25.0, -40.0, 200.0,  200.0], abs_all <= 1e-9);
        assert_float_eq!(iv.min  , vec![ 200.0,  5.0,  5.0, -45.0, 150.0,   20.0], abs_all <= 1e-9);
        assert_float_eq!(iv.max  , vec![10000.0, 320.0, 330.0, 5.0, 346.0, 400.0], abs_all <= 1e-9);
        assert_eq!(iv.pairs()[1], (5.0, 320.0));
        let (lo, hi) = iv.parallel();
        assert_eq!((lo[3], hi[3]), (-45.0, 5.0));
    }

    #[test]
    fn washin_without_baseline() {
        let v = Variant::new(TimeCourseModel::ExponentialWashinOnly, Baseline::Fixed(2.0));
        let iv = initial_values(&v, &[1.0, 5.0, 10.0, 10.0], &Bounds::default()).unwrap();
        assert_eq!(iv.len(), 3);
        assert_float_eq!(iv.start, vec![2.0, 25.0, -40.0], abs_all <= 1e-12);
    }

    #[test]
    fn rate_maximum_is_at_least_twice_the_start() {
        let mut bounds = Bounds::default();
        bounds.rate1 = Limits::new(5.0, 100.0, 120.0);
        let iv = initial_values(&full(), &[1.0; 8], &bounds).unwrap();
        assert_eq!(iv.max[1], 200.0);
    }

    #[test]
    fn too_few_samples() {
        let result = initial_values(&full(), &[1.0; 6], &Bounds::default());
        assert!(matches!(result, Err(Error::TooFewTimePoints { needed: 7, got: 6, .. })));
    }

    #[test]
    fn negative_data_keeps_limits_ordered() {
        let iv = initial_values(&full(), &[-10.0; 8], &Bounds::default()).unwrap();
        assert!(iv.min.iter().zip(&iv.max).all(|(lo, hi)| lo <= hi));
        assert!(iv.contains(&iv.start));
    }

    proptest! {
        #[test]
        fn start_lies_within_bounds(
            data   in proptest::collection::vec(-1e4..1e5_f64, 7..40),
            washin in any::<bool>(),
            fitted in any::<bool>(),
            limits in proptest::array::uniform6((-100.0..100.0_f64, -100.0..100.0_f64, -100.0..400.0_f64)),
        ) {
            let model = if washin { TimeCourseModel::ExponentialWashinOnly } else { TimeCourseModel::ExponentialRateDecay };
            let baseline = if fitted { Baseline::Fitted } else { Baseline::Fixed(1.0) };
            let l = |(a, b, c): (f64, f64, f64)| Limits::new(a, b, c).sorted();
            let bounds = Bounds {
                peak: l(limits[0]), rate1: l(limits[1]), rate2: l(limits[2]),
                delay1: l(limits[3]), delay2: l(limits[4]), base: l(limits[5]),
            }.sorted();
            let iv = initial_values(&Variant::new(model, baseline), &data, &bounds).unwrap();
            prop_assert!(iv.contains(&iv.start));
            // Rates stay clear of zero
            prop_assert!(iv.min[1] >= RATE_FLOOR);
        }
    }
}
