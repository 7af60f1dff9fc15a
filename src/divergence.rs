//! Core Jensen-Shannon divergence computation.
//!
//! Operates on batches of categorical distributions: each input is an
//! (N, d) matrix holding N distributions over d categories.
//!
//! ```text
//! JS(P,Q) = 0.5 * D_KL(P || M) + 0.5 * D_KL(Q || M),   M = (P + Q) / 2
//! ```
//!
//! All values are in natural-log units (nats). For valid probability
//! distributions the result is non-negative and bounded by ln 2.

use crate::error::{JsdError, Result};
use nalgebra::{DMatrix, DVector};

/// Probability mass below this threshold is treated as zero (avoids log(0))
pub const EPSILON: f64 = 1e-10;

/// Upper bound of the Jensen-Shannon divergence in nats
pub const MAX_JSD: f64 = std::f64::consts::LN_2;

/// Normalize each row of a batch to sum to 1.0
///
/// Rows with non-positive sums become the uniform distribution, so the
/// output is always a stack of valid probability distributions.
pub fn normalize_rows(batch: &DMatrix<f64>) -> DMatrix<f64> {
    let mut out = batch.clone_owned();
    for mut row in out.row_iter_mut() {
        let sum: f64 = row.iter().sum();
        if sum > 0.0 {
            for x in row.iter_mut() {
                *x /= sum;
            }
        } else {
            let uniform = 1.0 / row.len() as f64;
            for x in row.iter_mut() {
                *x = uniform;
            }
        }
    }
    out
}

/// log((e^a + e^b) / 2) via max-shifted log-sum-exp
#[inline]
fn log_mean_exp(a: f64, b: f64) -> f64 {
    let hi = a.max(b);
    if hi == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    hi + ((a - hi).exp() + (b - hi).exp()).ln() - std::f64::consts::LN_2
}

#[inline]
fn check_same_shape(p: &DMatrix<f64>, q: &DMatrix<f64>) -> Result<()> {
    if p.shape() != q.shape() {
        return Err(JsdError::ShapeMismatch {
            expected: p.shape(),
            got: q.shape(),
        });
    }
    Ok(())
}

/// JS divergence of one row pair, inputs in probability space
#[inline]
fn jsd_prob_row(p: &DMatrix<f64>, q: &DMatrix<f64>, row: usize) -> f64 {
    let mut kl_p = 0.0;
    let mut kl_q = 0.0;
    for col in 0..p.ncols() {
        let pi = p[(row, col)];
        let qi = q[(row, col)];
        let mi = 0.5 * (pi + qi);
        if pi > EPSILON {
            kl_p += pi * (pi / mi).ln();
        }
        if qi > EPSILON {
            kl_q += qi * (qi / mi).ln();
        }
    }
    0.5 * kl_p + 0.5 * kl_q
}

/// JS divergence of one row pair, inputs in log space
#[inline]
fn jsd_log_row(p: &DMatrix<f64>, q: &DMatrix<f64>, row: usize) -> f64 {
    let mut kl_p = 0.0;
    let mut kl_q = 0.0;
    for col in 0..p.ncols() {
        let lp = p[(row, col)];
        let lq = q[(row, col)];
        let lm = log_mean_exp(lp, lq);
        let wp = lp.exp();
        let wq = lq.exp();
        if wp > EPSILON {
            kl_p += wp * (lp - lm);
        }
        if wq > EPSILON {
            kl_q += wq * (lq - lm);
        }
    }
    0.5 * kl_p + 0.5 * kl_q
}

/// Per-sample Jensen-Shannon divergence between two batches.
///
/// `p` and `q` must share the same (N, d) shape. With `log_prob = false`
/// rows are treated as unnormalized non-negative weights and normalized
/// to sum to 1; with `log_prob = true` they are taken as log-probabilities
/// and the mixture is formed with a stable log-sum-exp.
///
/// Returns one divergence value per row, in nats.
///
/// # Properties
///
/// - Symmetric: swapping `p` and `q` gives the same result
/// - Zero iff the row distributions coincide
/// - Bounded by [`MAX_JSD`] for valid probability distributions
pub fn jensen_shannon_batch(
    p: &DMatrix<f64>,
    q: &DMatrix<f64>,
    log_prob: bool,
) -> Result<DVector<f64>> {
    check_same_shape(p, q)?;

    let n = p.nrows();
    let mut values = DVector::zeros(n);

    if log_prob {
        for row in 0..n {
            values[row] = jsd_log_row(p, q, row);
        }
    } else {
        let p = normalize_rows(p);
        let q = normalize_rows(q);
        for row in 0..n {
            values[row] = jsd_prob_row(&p, &q, row);
        }
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    fn example_batches() -> (DMatrix<f64>, DMatrix<f64>) {
        let p = DMatrix::from_row_slice(3, 2, &[0.1, 0.9, 0.2, 0.8, 0.3, 0.7]);
        let q = DMatrix::from_row_slice(3, 2, &[0.3, 0.7, 0.4, 0.6, 0.5, 0.5]);
        (p, q)
    }

    #[test]
    fn test_known_values() {
        let (p, q) = example_batches();
        let values = jensen_shannon_batch(&p, &q, false).unwrap();

        assert_eq!(values.len(), 3);
        assert!(approx_eq(values[0], 0.032429, 1e-6));
        assert!(approx_eq(values[1], 0.024157, 1e-6));
        assert!(approx_eq(values[2], 0.021006, 1e-6));
    }

    #[test]
    fn test_identical_batches_zero() {
        let (p, _) = example_batches();
        let values = jensen_shannon_batch(&p, &p, false).unwrap();
        for v in values.iter() {
            assert!(approx_eq(*v, 0.0, 1e-12));
        }
    }

    #[test]
    fn test_symmetry() {
        let (p, q) = example_batches();
        let pq = jensen_shannon_batch(&p, &q, false).unwrap();
        let qp = jensen_shannon_batch(&q, &p, false).unwrap();
        for (a, b) in pq.iter().zip(qp.iter()) {
            assert!(approx_eq(*a, *b, 1e-12));
        }
    }

    #[test]
    fn test_bounds() {
        // Disjoint support saturates the ln 2 bound
        let p = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);
        let q = DMatrix::from_row_slice(1, 2, &[0.0, 1.0]);
        let values = jensen_shannon_batch(&p, &q, false).unwrap();
        assert!(values[0] >= 0.0);
        assert!(approx_eq(values[0], MAX_JSD, 1e-12));
    }

    #[test]
    fn test_unnormalized_rows_are_scaled() {
        let p = DMatrix::from_row_slice(1, 2, &[2.0, 18.0]);
        let q = DMatrix::from_row_slice(1, 2, &[3.0, 7.0]);
        let raw = jensen_shannon_batch(&p, &q, false).unwrap();

        let pn = DMatrix::from_row_slice(1, 2, &[0.1, 0.9]);
        let qn = DMatrix::from_row_slice(1, 2, &[0.3, 0.7]);
        let scaled = jensen_shannon_batch(&pn, &qn, false).unwrap();

        assert!(approx_eq(raw[0], scaled[0], 1e-12));
    }

    #[test]
    fn test_zero_row_falls_back_to_uniform() {
        let p = DMatrix::from_row_slice(1, 2, &[0.0, 0.0]);
        let q = DMatrix::from_row_slice(1, 2, &[0.5, 0.5]);
        let values = jensen_shannon_batch(&p, &q, false).unwrap();
        // Zero-weight row is normalized to uniform, identical to q
        assert!(approx_eq(values[0], 0.0, 1e-12));
    }

    #[test]
    fn test_log_prob_matches_prob_path() {
        let (p, q) = example_batches();
        let lp = p.map(|x| x.ln());
        let lq = q.map(|x| x.ln());

        let from_prob = jensen_shannon_batch(&p, &q, false).unwrap();
        let from_log = jensen_shannon_batch(&lp, &lq, true).unwrap();

        for (a, b) in from_prob.iter().zip(from_log.iter()) {
            assert!(approx_eq(*a, *b, 1e-9));
        }
    }

    #[test]
    fn test_log_prob_extreme_values_stay_finite() {
        // Nearly a point mass: log-probs around -700 underflow exp()
        let lp = DMatrix::from_row_slice(1, 3, &[-700.0, -700.0, 0.0]);
        let lq = DMatrix::from_row_slice(1, 3, &[-0.693147, -700.0, -0.693147]);
        let values = jensen_shannon_batch(&lp, &lq, true).unwrap();
        assert!(values[0].is_finite());
        assert!(values[0] >= 0.0);
        assert!(values[0] <= MAX_JSD + 1e-12);
    }

    #[test]
    fn test_log_prob_identical_is_zero() {
        let lp = DMatrix::from_row_slice(2, 2, &[-0.105361, -2.302585, -1.203973, -0.356675]);
        let values = jensen_shannon_batch(&lp, &lp, true).unwrap();
        for v in values.iter() {
            assert!(approx_eq(*v, 0.0, 1e-12));
        }
    }

    #[test]
    fn test_shape_mismatch() {
        let p = DMatrix::from_element(3, 2, 0.5);
        let q = DMatrix::from_element(4, 2, 0.5);
        let err = jensen_shannon_batch(&p, &q, false).unwrap_err();
        assert_eq!(
            err,
            JsdError::ShapeMismatch {
                expected: (3, 2),
                got: (4, 2),
            }
        );
    }

    #[test]
    fn test_normalize_rows_sums_to_one() {
        let batch = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 0.0, 0.0, 0.0]);
        let normalized = normalize_rows(&batch);
        for row in normalized.row_iter() {
            let sum: f64 = row.iter().sum();
            assert!(approx_eq(sum, 1.0, 1e-12));
        }
        // Zero row became uniform
        assert!(approx_eq(normalized[(1, 0)], 1.0 / 3.0, 1e-12));
    }

    #[test]
    fn test_log_mean_exp_stable() {
        // Both terms deep in the underflow region for plain exp()
        let lm = log_mean_exp(-1000.0, -1000.0);
        assert!(approx_eq(lm, -1000.0, 1e-9));

        // Mixture of a sure thing and an impossible one
        let lm = log_mean_exp(0.0, f64::NEG_INFINITY);
        assert!(approx_eq(lm, -std::f64::consts::LN_2, 1e-12));

        assert_eq!(
            log_mean_exp(f64::NEG_INFINITY, f64::NEG_INFINITY),
            f64::NEG_INFINITY
        );
    }
}
