//! Streaming accumulator for the Jensen-Shannon divergence.
//!
//! Mirrors the usual validation-metric lifecycle: call
//! [`JensenShannonDivergence::update`] once per mini-batch, read the
//! running value with [`JensenShannonDivergence::compute`] at any point,
//! and [`JensenShannonDivergence::reset`] between epochs.
//!
//! Worker-local accumulators can be combined with
//! [`JensenShannonDivergence::merge`] before the final compute.

use crate::divergence::jensen_shannon_batch;
use crate::error::{JsdError, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How per-sample divergences are folded across update calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    /// Average over all samples seen
    Mean,
    /// Sum over all samples seen
    Sum,
    /// Keep every per-sample value, unreduced
    None,
}

impl Default for Reduction {
    fn default() -> Self {
        Self::Mean
    }
}

impl Reduction {
    /// Parse an optional reduction name; an absent value means no reduction.
    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value {
            Some(name) => name.parse(),
            None => Ok(Self::None),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Reduction::Mean => "mean",
            Reduction::Sum => "sum",
            Reduction::None => "none",
        }
    }
}

impl FromStr for Reduction {
    type Err = JsdError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(Self::Mean),
            "sum" => Ok(Self::Sum),
            "none" => Ok(Self::None),
            other => Err(JsdError::Config(format!(
                "expected reduction to be one of [\"mean\", \"sum\", \"none\"], got \"{other}\""
            ))),
        }
    }
}

impl std::fmt::Display for Reduction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metric configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsdConfig {
    /// Inputs are log-probabilities; skips row normalization
    #[serde(default)]
    pub log_prob: bool,

    /// Reduction over the sample dimension
    #[serde(default)]
    pub reduction: Reduction,
}

impl JsdConfig {
    /// Deserialize a configuration from JSON.
    ///
    /// Fails with [`JsdError::Config`] on unknown reduction names or
    /// mistyped fields (e.g. a string where `log_prob` expects a bool).
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| JsdError::Config(e.to_string()))
    }

    /// Serialize this configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| JsdError::Serialization(e.to_string()))
    }
}

/// Running state, keyed by the reduction mode at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum State {
    /// Scalar accumulation for mean/sum
    Scalar { measures: f64, total: usize },
    /// One per-sample vector per update call, in call order
    PerSample { measures: Vec<DVector<f64>> },
}

impl State {
    fn empty(reduction: Reduction) -> Self {
        match reduction {
            Reduction::Mean | Reduction::Sum => State::Scalar {
                measures: 0.0,
                total: 0,
            },
            Reduction::None => State::PerSample {
                measures: Vec::new(),
            },
        }
    }
}

/// Result of [`JensenShannonDivergence::compute`]: a scalar for the
/// mean/sum reductions, per-sample values otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JsdOutput {
    Scalar(f64),
    PerSample(DVector<f64>),
}

impl JsdOutput {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            JsdOutput::Scalar(v) => Some(*v),
            JsdOutput::PerSample(_) => None,
        }
    }

    pub fn as_per_sample(&self) -> Option<&DVector<f64>> {
        match self {
            JsdOutput::Scalar(_) => None,
            JsdOutput::PerSample(v) => Some(v),
        }
    }
}

/// Streaming Jensen-Shannon divergence over batches of categorical
/// distributions.
///
/// Each call to [`update`](Self::update) consumes a pair of (N, d)
/// batches and folds the per-sample divergences into the running state
/// according to the configured [`Reduction`]. [`compute`](Self::compute)
/// is a pure read and can be called repeatedly.
///
/// In `none` mode every per-sample vector is retained, so memory grows
/// with each update; call [`reset`](Self::reset) between epochs to bound
/// it.
///
/// # Thread safety
///
/// The accumulator is not internally synchronized; give each worker its
/// own instance and combine them with [`merge`](Self::merge).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JensenShannonDivergence {
    log_prob: bool,
    reduction: Reduction,
    state: State,
}

impl JensenShannonDivergence {
    /// Create an empty accumulator for the given configuration.
    pub fn new(config: JsdConfig) -> Self {
        Self {
            log_prob: config.log_prob,
            reduction: config.reduction,
            state: State::empty(config.reduction),
        }
    }

    /// Whether inputs are treated as log-probabilities.
    #[inline]
    pub fn log_prob(&self) -> bool {
        self.log_prob
    }

    /// The configured reduction mode.
    #[inline]
    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    /// Number of samples folded in so far.
    pub fn num_samples(&self) -> usize {
        match &self.state {
            State::Scalar { total, .. } => *total,
            State::PerSample { measures } => measures.iter().map(|v| v.len()).sum(),
        }
    }

    /// Fold one batch pair into the running state.
    ///
    /// `p` and `q` must share the same (N, d) shape; fails with
    /// [`JsdError::ShapeMismatch`] otherwise.
    pub fn update(&mut self, p: &DMatrix<f64>, q: &DMatrix<f64>) -> Result<()> {
        let values = jensen_shannon_batch(p, q, self.log_prob)?;
        match &mut self.state {
            State::Scalar { measures, total } => {
                *total += values.len();
                *measures += values.sum();
            }
            State::PerSample { measures } => {
                measures.push(values);
            }
        }
        Ok(())
    }

    /// The accumulated divergence.
    ///
    /// - `mean`: average over all samples seen (NaN before any update)
    /// - `sum`: total over all samples seen (0.0 before any update)
    /// - `none`: all per-sample values, concatenated in update order
    pub fn compute(&self) -> JsdOutput {
        match &self.state {
            State::Scalar { measures, total } => {
                let value = match self.reduction {
                    Reduction::Mean => *measures / *total as f64,
                    _ => *measures,
                };
                JsdOutput::Scalar(value)
            }
            State::PerSample { measures } => {
                let total: usize = measures.iter().map(|v| v.len()).sum();
                let mut flat = Vec::with_capacity(total);
                for v in measures {
                    flat.extend(v.iter().copied());
                }
                JsdOutput::PerSample(DVector::from_vec(flat))
            }
        }
    }

    /// Fold another accumulator's state into this one.
    ///
    /// Scalar modes add measures and sample counts; `none` mode appends
    /// the other's per-sample vectors after this one's. Both accumulators
    /// must share the same configuration.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        if self.log_prob != other.log_prob || self.reduction != other.reduction {
            return Err(JsdError::Config(format!(
                "cannot merge accumulators with different configurations: \
                 (log_prob={}, reduction={}) vs (log_prob={}, reduction={})",
                self.log_prob, self.reduction, other.log_prob, other.reduction
            )));
        }
        match (&mut self.state, &other.state) {
            (
                State::Scalar { measures, total },
                State::Scalar {
                    measures: other_measures,
                    total: other_total,
                },
            ) => {
                *measures += other_measures;
                *total += other_total;
            }
            (
                State::PerSample { measures },
                State::PerSample {
                    measures: other_measures,
                },
            ) => {
                measures.extend(other_measures.iter().cloned());
            }
            _ => {
                return Err(JsdError::Config(
                    "accumulator state does not match its reduction mode".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Clear the running state back to its initial empty value.
    pub fn reset(&mut self) {
        self.state = State::empty(self.reduction);
    }

    /// Serialize the full accumulator (config + state) to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| JsdError::Serialization(e.to_string()))
    }

    /// Restore an accumulator from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| JsdError::Serialization(e.to_string()))
    }
}

impl Default for JensenShannonDivergence {
    fn default() -> Self {
        Self::new(JsdConfig::default())
    }
}

/// One-shot Jensen-Shannon divergence of a single batch pair.
///
/// Computes and reduces without constructing an accumulator; equivalent
/// to one `update` followed by `compute` on a fresh metric.
pub fn jensen_shannon(
    p: &DMatrix<f64>,
    q: &DMatrix<f64>,
    log_prob: bool,
    reduction: Reduction,
) -> Result<JsdOutput> {
    let values = jensen_shannon_batch(p, q, log_prob)?;
    Ok(match reduction {
        Reduction::Mean => JsdOutput::Scalar(values.sum() / values.len() as f64),
        Reduction::Sum => JsdOutput::Scalar(values.sum()),
        Reduction::None => JsdOutput::PerSample(values),
    })
}
