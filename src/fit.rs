//! Bounded non-linear least-squares fit of one voxel's time course
//!
//! The solver is unconstrained Levenberg-Marquardt. Box bounds are imposed by
//! fitting an internal parameter `p` for each model parameter `x`:
//!
//! ```text
//! x = lo + (hi - lo) * (sin(p) + 1) / 2
//! ```
//!
//! so every trial point, and hence the result, lies inside `[lo, hi]`.
//! Residuals are `sqrt(w) * (observed - predicted)`, which makes the solver
//! minimize the weighted chi-square of [`objective`](crate::objective).

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use nalgebra::{DMatrix, DVector, Dyn, Owned};

use crate::config::fit::Solver;
use crate::model::Variant;
use crate::objective::reduced_chi_square;
use crate::types::{Intensity, Time, Weight};

/// Outcome of the solver. Anything other than `Converged` means the fit did
/// not converge cleanly; the numeric codes end up in the `Badfit` map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitStatus {
    Converged,
    /// Inputs of inconsistent length, or fewer samples than parameters
    DimensionMismatch,
    /// Singular or otherwise numerically degenerate sub-problem
    SingularSubproblem,
    /// No step reduces the objective any further
    NoDescent,
    IterationLimit,
    /// The model produced NaN or infinity
    NonFinite,
}

impl FitStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::Converged          =>  0,
            Self::DimensionMismatch  =>  2,
            Self::SingularSubproblem =>  5,
            Self::NoDescent          =>  8,
            Self::IterationLimit     =>  9,
            Self::NonFinite          => 10,
        }
    }

    pub fn is_ok(self) -> bool { self == Self::Converged }

    fn from_termination(reason: &TerminationReason) -> Self {
        if reason.was_successful() { return Self::Converged }
        match reason {
            TerminationReason::LostPatience             => Self::IterationLimit,
            TerminationReason::WrongDimensions(_)       => Self::DimensionMismatch,
            TerminationReason::NoImprovementPossible(_) => Self::NoDescent,
            TerminationReason::User(_)                  => Self::NonFinite,
            TerminationReason::Numerical(_)             => Self::SingularSubproblem,
            _                                           => Self::SingularSubproblem,
        }
    }
}

/// Everything the solver reports for one voxel
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelFit {
    /// Fitted parameters, in the variant's order
    pub params: Vec<f64>,
    /// Model evaluated at `params` on the time axis
    pub curve: Vec<Intensity>,
    /// Signal-vs-noise estimate; not computed, always 0
    pub sig: f64,
    /// Reduced weighted chi-square at `params`
    pub chis: f64,
    pub status: FitStatus,
    /// Number of model evaluations used
    pub evaluations: usize,
}

/// Fit `variant` to `observed`, starting from `start` and keeping every
/// parameter within the matching `(min, max)` pair of `limits`.
///
/// Never fails: problems are reported through [`VoxelFit::status`].
pub fn fit_voxel(
    variant : &Variant,
    time    : &[Time],
    weights : &[Weight],
    observed: &[Intensity],
    start   : &[f64],
    limits  : &[(f64, f64)],
    solver  : &Solver,
) -> VoxelFit {
    let n = variant.n_params();
    let consistent =
        time.len() == observed.len() && weights.len() == observed.len() &&
        start.len() == n && limits.len() == n && observed.len() > n;
    if !consistent {
        return failed(start, time.len(), FitStatus::DimensionMismatch);
    }

    let problem = BoundedProblem::new(*variant, time, observed, weights, start, limits);
    let (problem, report) = LevenbergMarquardt::new()
        .with_patience(solver.patience)
        .with_ftol(solver.ftol)
        .with_xtol(solver.xtol)
        .with_gtol(solver.gtol)
        .minimize(problem);

    let mut status = FitStatus::from_termination(&report.termination);
    let params = problem.external.clone();
    let mut curve = vec![0.0; time.len()];
    variant.evaluate_into(&params, time, &mut curve);
    let chis = reduced_chi_square(observed, &curve, weights, n);
    if !chis.is_finite() || params.iter().any(|x| !x.is_finite()) {
        status = FitStatus::NonFinite;
    }
    VoxelFit { params, curve, sig: 0.0, chis, status, evaluations: report.number_of_evaluations }
}

fn failed(start: &[f64], n_times: usize, status: FitStatus) -> VoxelFit {
    VoxelFit {
        params: start.to_vec(),
        curve: vec![0.0; n_times],
        sig: 0.0,
        chis: f64::INFINITY,
        status,
        evaluations: 0,
    }
}

// ----- Box bound transform ------------------------------------------------------------

// Keeps a start value lying on a bound off the flat top of the sine
const EDGE: f64 = 1e-6;

fn to_internal(x: f64, (lo, hi): (f64, f64)) -> f64 {
    if hi <= lo { return 0.0 }
    let u = 2.0 * (x - lo) / (hi - lo) - 1.0;
    u.clamp(-1.0 + EDGE, 1.0 - EDGE).asin()
}

fn to_external(p: f64, (lo, hi): (f64, f64)) -> f64 {
    if hi <= lo { return lo }
    (lo + (hi - lo) * (p.sin() + 1.0) / 2.0).clamp(lo, hi)
}

fn external_per_internal(p: f64, (lo, hi): (f64, f64)) -> f64 {
    if hi <= lo { return 0.0 }
    (hi - lo) / 2.0 * p.cos()
}

// ----- Least squares problem ----------------------------------------------------------

struct BoundedProblem<'a> {
    variant : Variant,
    time    : &'a [Time],
    observed: &'a [Intensity],
    sqrt_w  : Vec<f64>,
    limits  : Vec<(f64, f64)>,
    internal: DVector<f64>,
    external: Vec<f64>,
    curve   : Vec<Intensity>,
}

impl<'a> BoundedProblem<'a> {
    fn new(
        variant : Variant,
        time    : &'a [Time],
        observed: &'a [Intensity],
        weights : &[Weight],
        start   : &[f64],
        limits  : &[(f64, f64)],
    ) -> Self {
        let internal = DVector::from_iterator(start.len(), start.iter().zip(limits).map(|(&x, &l)| to_internal(x, l)));
        let mut problem = Self {
            variant, time, observed,
            sqrt_w: weights.iter().map(|w| w.sqrt()).collect(),
            limits: limits.to_vec(),
            internal: internal.clone(),
            external: vec![0.0; start.len()],
            curve: vec![0.0; time.len()],
        };
        problem.set_params(&internal);
        problem
    }
}

impl<'a> LeastSquaresProblem<f64, Dyn, Dyn> for BoundedProblem<'a> {
    type ParameterStorage = Owned<f64, Dyn>;
    type ResidualStorage  = Owned<f64, Dyn>;
    type JacobianStorage  = Owned<f64, Dyn, Dyn>;

    fn set_params(&mut self, p: &DVector<f64>) {
        self.internal.copy_from(p);
        for ((x, &p), &l) in self.external.iter_mut().zip(p.iter()).zip(&self.limits) {
            *x = to_external(p, l);
        }
        self.variant.evaluate_into(&self.external, self.time, &mut self.curve);
    }

    fn params(&self) -> DVector<f64> { self.internal.clone() }

    fn residuals(&self) -> Option<DVector<f64>> {
        let r = DVector::from_iterator(
            self.observed.len(),
            self.observed.iter().zip(&self.curve).zip(&self.sqrt_w).map(|((y, f), s)| s * (y - f)),
        );
        r.iter().all(|x| x.is_finite()).then_some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let (m, n) = (self.observed.len(), self.external.len());
        let chain: Vec<f64> = self.internal.iter().zip(&self.limits)
            .map(|(&p, &l)| external_per_internal(p, l))
            .collect();
        let mut jacobian = DMatrix::zeros(m, n);
        let mut row = vec![0.0; n];
        for (i, &t) in self.time.iter().enumerate() {
            self.variant.gradient_at(&self.external, t, &mut row);
            for j in 0..n {
                jacobian[(i, j)] = -self.sqrt_w[i] * row[j] * chain[j];
            }
        }
        jacobian.iter().all(|x| x.is_finite()).then_some(jacobian)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use levenberg_marquardt::differentiate_numerically;
    use proptest::prelude::*;

    use crate::model::{Baseline, TimeCourseModel};

    proptest! {
        #[test]
        fn transform_roundtrip_stays_in_bounds(
            lo   in -500.0..500.0_f64,
            span in 1e-3..1e3_f64,
            frac in 0.0..=1.0_f64,
        ) {
            let l = (lo, lo + span);
            let x = lo + frac * span;
            let back = to_external(to_internal(x, l), l);
            prop_assert!(l.0 <= back && back <= l.1);
            prop_assert!((back - x).abs() <= 1e-5 * span);
        }
    }

    #[test]
    fn degenerate_bounds_pin_the_parameter() {
        assert_eq!(to_external(1.234, (7.0, 7.0)), 7.0);
        assert_eq!(external_per_internal(1.234, (7.0, 7.0)), 0.0);
    }

    #[test]
    fn analytic_jacobian_matches_numerical() {
        let variant = Variant::new(TimeCourseModel::ExponentialRateDecay, Baseline::Fitted);
        let time: Vec<f64> = (0..8).map(|i| i as f64 * 50.0 + 10.0).collect();
        let observed = variant.evaluate(&[1000.0, 25.0, 25.0, -40.0, 200.0, 10.0], &time).unwrap();
        let weights = vec![1.5; 8];
        let start = [700.0, 30.0, 20.0, -30.0, 190.0, 20.0];
        let limits = [(100.0, 5000.0), (5.0, 320.0), (5.0, 330.0), (-45.0, 5.0), (150.0, 346.0), (1.0, 200.0)];
        let mut problem = BoundedProblem::new(variant, &time, &observed, &weights, &start, &limits);
        let analytic = problem.jacobian().unwrap();
        let numeric = differentiate_numerically(&mut problem).unwrap();
        for (a, n) in analytic.iter().zip(numeric.iter()) {
            assert_float_eq!(*a, *n, abs <= 1e-4 * n.abs().max(1.0));
        }
    }

    #[test]
    fn inconsistent_lengths_are_reported_not_raised() {
        let variant = Variant::new(TimeCourseModel::ExponentialWashinOnly, Baseline::Fitted);
        let fit = fit_voxel(&variant, &[0.0; 6], &[1.0; 5], &[0.0; 6], &[1.0; 4], &[(0.0, 2.0); 4], &Solver::default());
        assert_eq!(fit.status, FitStatus::DimensionMismatch);
        assert_eq!(fit.status.code(), 2);
    }

    #[test]
    fn status_codes_are_distinct() {
        use FitStatus::*;
        let codes: Vec<i32> = [Converged, DimensionMismatch, SingularSubproblem, NoDescent, IterationLimit, NonFinite]
            .iter().map(|s| s.code()).collect();
        assert_eq!(codes, vec![0, 2, 5, 8, 9, 10]);
        assert!(Converged.is_ok() && !NoDescent.is_ok());
    }
}
