//! Bucket range tables for distribution aggregations.
//!
//! Quantize tables depend only on the engine's layout constants and are
//! built once per cache. Lquantize tables are memoized per
//! (base, step, levels) triple, so the map grows with the number of distinct
//! parameter triples a session produces.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::config::EngineConfig;

use super::{BucketRange, BucketTable, TranslateError};

/// Parameters of one linear distribution, the lquantize cache key.
///
/// Engines pack these into a 64-bit descriptor (32-bit signed base, 16-bit
/// step, 16-bit level count), so the field types make any wider value
/// unrepresentable and keep the table arithmetic overflow-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LquantizeParams {
    pub base: i32,
    pub step: u16,
    pub levels: u16,
}

impl LquantizeParams {
    /// Validates raw prefix values from an aggregation tuple.
    pub fn from_raw(base: i64, step: i64, levels: i64) -> Result<Self, TranslateError> {
        let invalid = TranslateError::InvalidLinearParameters { base, step, levels };
        let (Ok(base), Ok(step), Ok(levels)) = (
            i32::try_from(base),
            u16::try_from(step),
            u16::try_from(levels),
        ) else {
            return Err(invalid);
        };
        if step == 0 {
            return Err(invalid);
        }
        Ok(Self { base, step, levels })
    }
}

/// Memoized bucket tables, shared by every consumer in the process through
/// [`BucketTables::shared`] or held privately for isolation.
pub struct BucketTables {
    quantize: OnceLock<BucketTable>,
    lquantize: Mutex<HashMap<LquantizeParams, BucketTable>>,
}

impl BucketTables {
    pub fn new() -> Self {
        Self {
            quantize: OnceLock::new(),
            lquantize: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide instance. The first configuration to touch the
    /// quantize table builds it.
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<BucketTables>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(BucketTables::new())))
    }

    /// The power-of-two table, built on first use.
    pub fn quantize(&self, config: &EngineConfig) -> BucketTable {
        Arc::clone(
            self.quantize
                .get_or_init(|| build_quantize_table(config).into()),
        )
    }

    /// The linear table for `params`, built on first use per triple.
    pub fn lquantize(&self, config: &EngineConfig, params: LquantizeParams) -> BucketTable {
        let mut cache = self.lquantize.lock();
        Arc::clone(
            cache
                .entry(params)
                .or_insert_with(|| build_lquantize_table(config, params).into()),
        )
    }
}

impl Default for BucketTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Signed power-of-two boundary for quantize bucket `i`.
fn quantize_bucket_value(i: u32, zero: u32) -> i64 {
    if i < zero {
        -(1i64 << (zero - 1 - i))
    } else if i == zero {
        0
    } else {
        1i64 << (i - zero - 1)
    }
}

fn build_quantize_table(config: &EngineConfig) -> Vec<BucketRange> {
    let n = config.quantize_nbuckets;
    let zero = config.quantize_zerobucket;
    let mut table = Vec::with_capacity(n as usize);
    for i in 0..n {
        let range = if i < zero {
            let min = if i == 0 {
                config.int64_min
            } else {
                quantize_bucket_value(i - 1, zero) + 1
            };
            BucketRange {
                min,
                max: quantize_bucket_value(i, zero),
            }
        } else if i == zero {
            BucketRange { min: 0, max: 0 }
        } else {
            let max = if i == n - 1 {
                config.int64_max
            } else {
                quantize_bucket_value(i + 1, zero) - 1
            };
            BucketRange {
                min: quantize_bucket_value(i, zero),
                max,
            }
        };
        table.push(range);
    }
    table
}

fn build_lquantize_table(config: &EngineConfig, params: LquantizeParams) -> Vec<BucketRange> {
    let base = i64::from(params.base);
    let step = i64::from(params.step);
    let levels = i64::from(params.levels);
    let mut table = Vec::with_capacity(params.levels as usize + 2);
    table.push(BucketRange {
        min: config.int64_min,
        max: base - 1,
    });
    for i in 1..=levels {
        let min = base + (i - 1) * step;
        table.push(BucketRange {
            min,
            max: min + step - 1,
        });
    }
    table.push(BucketRange {
        min: base + levels * step,
        max: config.int64_max,
    });
    table
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_quantize_native_layout() {
        let table = build_quantize_table(&EngineConfig::default());
        assert_eq!(table.len(), 127);
        assert_eq!(
            table[0],
            BucketRange {
                min: i64::MIN,
                max: -(1 << 62)
            }
        );
        assert_eq!(table[62], BucketRange { min: -1, max: -1 });
        assert_eq!(table[63], BucketRange { min: 0, max: 0 });
        assert_eq!(table[64], BucketRange { min: 1, max: 1 });
        assert_eq!(table[65], BucketRange { min: 2, max: 3 });
        assert_eq!(
            table[126],
            BucketRange {
                min: 1 << 62,
                max: i64::MAX
            }
        );
    }

    #[test]
    fn test_quantize_table_memoized() {
        let tables = BucketTables::new();
        let config = EngineConfig::default();
        let first = tables.quantize(&config);
        let second = tables.quantize(&config);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_lquantize_layout_matches_params() {
        let tables = BucketTables::new();
        let params = LquantizeParams {
            base: 100,
            step: 10,
            levels: 3,
        };
        let table = tables.lquantize(&EngineConfig::default(), params);
        assert_eq!(table.len(), 5);
        assert_eq!(
            table[0],
            BucketRange {
                min: i64::MIN,
                max: 99
            }
        );
        assert_eq!(table[1], BucketRange { min: 100, max: 109 });
        assert_eq!(table[2], BucketRange { min: 110, max: 119 });
        assert_eq!(table[3], BucketRange { min: 120, max: 129 });
        assert_eq!(
            table[4],
            BucketRange {
                min: 130,
                max: i64::MAX
            }
        );
    }

    #[test]
    fn test_lquantize_cache_hits_by_params() {
        let tables = BucketTables::new();
        let config = EngineConfig::default();
        let params = LquantizeParams {
            base: 0,
            step: 25,
            levels: 40,
        };
        let first = tables.lquantize(&config, params);
        let second = tables.lquantize(&config, params);
        assert!(Arc::ptr_eq(&first, &second));

        let other = tables.lquantize(
            &config,
            LquantizeParams {
                base: 0,
                step: 25,
                levels: 41,
            },
        );
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn test_lquantize_zero_levels() {
        let params = LquantizeParams {
            base: 0,
            step: 1,
            levels: 0,
        };
        let table = build_lquantize_table(&EngineConfig::default(), params);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table[0],
            BucketRange {
                min: i64::MIN,
                max: -1
            }
        );
        assert_eq!(
            table[1],
            BucketRange {
                min: 0,
                max: i64::MAX
            }
        );
    }

    #[test]
    fn test_params_validation() {
        let params = LquantizeParams::from_raw(100, 10, 3).unwrap();
        assert_eq!(
            params,
            LquantizeParams {
                base: 100,
                step: 10,
                levels: 3
            }
        );

        assert!(LquantizeParams::from_raw(1 << 40, 10, 3).is_err());
        assert!(LquantizeParams::from_raw(100, 0, 3).is_err());
        assert!(LquantizeParams::from_raw(100, 70_000, 3).is_err());
        assert!(LquantizeParams::from_raw(100, 10, -1).is_err());
    }

    #[test]
    fn test_shared_instance_is_singleton() {
        assert!(Arc::ptr_eq(&BucketTables::shared(), &BucketTables::shared()));
    }

    proptest! {
        #[test]
        fn prop_quantize_contiguous_and_covering(zero in 1u32..=63) {
            let config = EngineConfig {
                quantize_nbuckets: 2 * zero + 1,
                quantize_zerobucket: zero,
                int64_min: i64::MIN,
                int64_max: i64::MAX,
            };
            let table = build_quantize_table(&config);
            prop_assert_eq!(table.len(), (2 * zero + 1) as usize);
            prop_assert_eq!(table[0].min, i64::MIN);
            prop_assert_eq!(table[table.len() - 1].max, i64::MAX);
            prop_assert_eq!(table[zero as usize], BucketRange { min: 0, max: 0 });
            for pair in table.windows(2) {
                prop_assert_eq!(pair[1].min, pair[0].max + 1);
            }
        }

        #[test]
        fn prop_lquantize_contiguous_and_covering(
            base in any::<i32>(),
            step in 1u16..=u16::MAX,
            levels in 0u16..=512,
        ) {
            let config = EngineConfig::default();
            let params = LquantizeParams { base, step, levels };
            let table = build_lquantize_table(&config, params);
            prop_assert_eq!(table.len(), levels as usize + 2);
            prop_assert_eq!(table[0].min, i64::MIN);
            prop_assert_eq!(table[0].max, i64::from(base) - 1);
            prop_assert_eq!(table[table.len() - 1].max, i64::MAX);
            for pair in table.windows(2) {
                prop_assert_eq!(pair[1].min, pair[0].max + 1);
            }
            for bucket in table.iter().skip(1).take(levels as usize) {
                prop_assert_eq!(bucket.max - bucket.min + 1, i64::from(step));
            }
        }
    }
}
