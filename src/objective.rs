use crate::types::{Intensity, Weight};

/// Weighted chi-square per degree of freedom:
/// `sum(w * (observed - predicted)^2) / (n_samples - n_params)`.
///
/// With no degrees of freedom left the sum is returned unnormalized.
pub fn reduced_chi_square(observed: &[Intensity], predicted: &[Intensity], weights: &[Weight], n_params: usize) -> f64 {
    debug_assert_eq!(observed.len(), predicted.len());
    debug_assert_eq!(observed.len(), weights.len());
    let sum: f64 = observed.iter().zip(predicted).zip(weights)
        .map(|((y, f), w)| w * (y - f).powi(2))
        .sum();
    let nfree = observed.len().saturating_sub(n_params).max(1);
    sum / nfree as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;

    #[test]
    fn perfect_prediction_scores_zero() {
        let y = [1.0, 2.0, 3.0];
        assert_eq!(reduced_chi_square(&y, &y, &[1.0; 3], 1), 0.0);
    }

    #[test]
    fn weights_and_degrees_of_freedom() {
        let observed  = [1.0, 2.0, 3.0, 4.0];
        let predicted = [0.0, 2.0, 5.0, 4.0];
        let weights   = [2.0, 1.0, 0.5, 1.0];
        // (2*1 + 0 + 0.5*4 + 0) / (4 - 2)
        assert_float_eq!(reduced_chi_square(&observed, &predicted, &weights, 2), 2.0, ulps <= 1);
    }
}
