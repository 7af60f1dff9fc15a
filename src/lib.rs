//! # jensen-shannon
//!
//! Streaming Jensen-Shannon divergence for batches of categorical
//! distributions.
//!
//! ## Theory
//!
//! The Jensen-Shannon divergence is the symmetrized, bounded relative of
//! the KL divergence, taken against the mixture of the two distributions:
//!
//! ```text
//! JS(P,Q) = 0.5 * D_KL(P || M) + 0.5 * D_KL(Q || M),   M = 0.5 * (P + Q)
//! ```
//!
//! It is non-negative, zero iff P = Q, symmetric in its arguments, and
//! bounded by ln 2 in natural-log units.
//!
//! Inputs are (N, d) batches: N samples, each a distribution over d
//! categories, given either as raw non-negative weights (normalized
//! internally) or as log-probabilities. Per-sample values are folded into
//! running state across update calls and reduced on demand, so a full
//! dataset can be scored one mini-batch at a time.
//!
//! ## Example
//!
//! ```rust
//! use jensen_shannon::JensenShannonDivergence;
//! use nalgebra::DMatrix;
//!
//! let mut metric = JensenShannonDivergence::default();
//!
//! let p = DMatrix::from_row_slice(3, 2, &[0.1, 0.9, 0.2, 0.8, 0.3, 0.7]);
//! let q = DMatrix::from_row_slice(3, 2, &[0.3, 0.7, 0.4, 0.6, 0.5, 0.5]);
//!
//! metric.update(&p, &q).unwrap();
//!
//! let js = metric.compute().as_scalar().unwrap();
//! assert!((js - 0.0259).abs() < 1e-4);
//! ```

pub mod divergence;
pub mod error;
pub mod metric;

// Re-exports
pub use divergence::*;
pub use error::*;
pub use metric::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
