//! # Confidence Combiners
//!
//! A combiner turns a peer's measured agreement and a result's self-reported
//! confidence into the confidence contributed by that peer. Named strategies
//! are selectable from configuration; `Custom` takes any pure function.

use super::errors::UnknownStrategy;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// `(measured_agreement, self_reported_confidence) -> score`.
pub type CombineFn = dyn Fn(f64, f64) -> f64 + Send + Sync;

#[derive(Clone, Default)]
pub enum ConfidenceCombiner {
    /// `measured * reported`.
    #[default]
    Product,
    /// The smaller of the two.
    Min,
    /// Arithmetic mean of the two.
    Mean,
    Custom(Arc<CombineFn>),
}

impl ConfidenceCombiner {
    pub fn custom(f: impl Fn(f64, f64) -> f64 + Send + Sync + 'static) -> Self {
        ConfidenceCombiner::Custom(Arc::new(f))
    }

    pub fn combine(&self, measured: f64, reported: f64) -> f64 {
        match self {
            ConfidenceCombiner::Product => measured * reported,
            ConfidenceCombiner::Min => measured.min(reported),
            ConfidenceCombiner::Mean => (measured + reported) / 2.0,
            ConfidenceCombiner::Custom(f) => f(measured, reported),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConfidenceCombiner::Product => "product",
            ConfidenceCombiner::Min => "min",
            ConfidenceCombiner::Mean => "mean",
            ConfidenceCombiner::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for ConfidenceCombiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfidenceCombiner({})", self.name())
    }
}

impl fmt::Display for ConfidenceCombiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfidenceCombiner {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "product" => Ok(ConfidenceCombiner::Product),
            "min" => Ok(ConfidenceCombiner::Min),
            "mean" => Ok(ConfidenceCombiner::Mean),
            other => Err(UnknownStrategy {
                kind: "combiner",
                name: other.to_string(),
            }),
        }
    }
}
