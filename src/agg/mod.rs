pub mod buckets;
pub mod translate;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::engine::event::ScalarValue;

/// An inclusive value range covered by one distribution bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketRange {
    pub min: i64,
    pub max: i64,
}

/// A complete bucket table, shared immutably once built.
pub type BucketTable = Arc<[BucketRange]>;

/// The decoded value of one aggregation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TranslatedValue {
    /// Single-valued actions and unrecognized actions pass their value
    /// through untouched.
    Scalar(i64),
    /// Distribution actions produce `(range, count)` entries in input order.
    Distribution(Vec<(BucketRange, i64)>),
}

/// One translated aggregation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationRecord {
    pub variable_id: u32,
    pub key: Vec<ScalarValue>,
    pub value: TranslatedValue,
}

/// Aggregating actions the translator recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationAction {
    Count,
    Min,
    Max,
    Sum,
    Avg,
    Quantize,
    Lquantize,
    Llquantize,
}

impl AggregationAction {
    /// Parse a wire action name. Engines report the parenthesized spelling
    /// (`"quantize()"`); bare names are accepted too.
    pub fn parse(name: &str) -> Option<Self> {
        let bare = name.strip_suffix("()").unwrap_or(name);
        match bare {
            "count" => Some(Self::Count),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "sum" => Some(Self::Sum),
            "avg" => Some(Self::Avg),
            "quantize" => Some(Self::Quantize),
            "lquantize" => Some(Self::Lquantize),
            "llquantize" => Some(Self::Llquantize),
            _ => None,
        }
    }

    /// The parenthesized wire spelling.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count()",
            Self::Min => "min()",
            Self::Max => "max()",
            Self::Sum => "sum()",
            Self::Avg => "avg()",
            Self::Quantize => "quantize()",
            Self::Lquantize => "lquantize()",
            Self::Llquantize => "llquantize()",
        }
    }
}

impl fmt::Display for AggregationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors turning a raw aggregation tuple into a translated record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// Log-linear tuples carry a (factor, low, high, nsteps) prefix this
    /// decoder does not yet interpret.
    #[error("llquantize: bucket layout decoding is not supported")]
    UnsupportedLogLinear,

    #[error("{action}: expected a single value, found {count}")]
    ScalarShape { action: String, count: usize },

    #[error("{action}: dangling bucket index without a count")]
    DanglingPair { action: &'static str },

    #[error("{action}: missing distribution parameters")]
    MissingParameters { action: &'static str },

    #[error("{action}: bucket index {index} outside a table of {len} buckets")]
    BucketOutOfRange {
        action: &'static str,
        index: i64,
        len: usize,
    },

    #[error("linear bucket parameters out of range: base {base}, step {step}, levels {levels}")]
    InvalidLinearParameters { base: i64, step: i64, levels: i64 },
}
