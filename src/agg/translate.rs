//! Decoding raw aggregation tuples into structured values.

use std::sync::Arc;

use crate::config::EngineConfig;

use super::buckets::{BucketTables, LquantizeParams};
use super::{AggregationAction, BucketRange, TranslateError, TranslatedValue};

/// Turns one raw aggregation tuple into a structured value.
///
/// The translator holds the engine layout constants and a handle on the
/// bucket cache; lquantize cache misses are the only locking on the
/// translation path.
pub struct Translator {
    config: EngineConfig,
    tables: Arc<BucketTables>,
}

impl Translator {
    pub fn new(config: EngineConfig, tables: Arc<BucketTables>) -> Self {
        Self { config, tables }
    }

    /// Decode `data` as `action` dictates.
    ///
    /// Unrecognized actions are treated like the single-valued ones: the
    /// lone value passes through untouched, so engines with additional
    /// scalar actions still translate.
    pub fn translate(&self, action: &str, data: &[i64]) -> Result<TranslatedValue, TranslateError> {
        match AggregationAction::parse(action) {
            Some(AggregationAction::Quantize) => {
                let table = self.tables.quantize(&self.config);
                pair_buckets("quantize()", &table, data)
            }
            Some(AggregationAction::Lquantize) => {
                if data.len() < 3 {
                    return Err(TranslateError::MissingParameters {
                        action: "lquantize()",
                    });
                }
                let (prefix, pairs) = data.split_at(3);
                let params = LquantizeParams::from_raw(prefix[0], prefix[1], prefix[2])?;
                let table = self.tables.lquantize(&self.config, params);
                pair_buckets("lquantize()", &table, pairs)
            }
            Some(AggregationAction::Llquantize) => Err(TranslateError::UnsupportedLogLinear),
            Some(_) | None => scalar(action, data),
        }
    }
}

/// Pair `(bucket index, count)` values against `table`, preserving order.
fn pair_buckets(
    action: &'static str,
    table: &[BucketRange],
    pairs: &[i64],
) -> Result<TranslatedValue, TranslateError> {
    if pairs.len() % 2 != 0 {
        return Err(TranslateError::DanglingPair { action });
    }
    let mut entries = Vec::with_capacity(pairs.len() / 2);
    for pair in pairs.chunks_exact(2) {
        let (index, count) = (pair[0], pair[1]);
        let range = usize::try_from(index)
            .ok()
            .and_then(|i| table.get(i))
            .ok_or(TranslateError::BucketOutOfRange {
                action,
                index,
                len: table.len(),
            })?;
        entries.push((*range, count));
    }
    Ok(TranslatedValue::Distribution(entries))
}

fn scalar(action: &str, data: &[i64]) -> Result<TranslatedValue, TranslateError> {
    match data {
        [value] => Ok(TranslatedValue::Scalar(*value)),
        _ => Err(TranslateError::ScalarShape {
            action: action.to_owned(),
            count: data.len(),
        }),
    }
}
