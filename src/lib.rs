//! Lifecycle-gated consumer library for script-driven tracing engines.
//!
//! A [`consumer::Consumer`] wraps one [`engine::Engine`] session: operations
//! refuse until the engine's asynchronous init settles, streaming drains
//! translate aggregation buffers into keyed records, and destruction
//! releases the session exactly once.

pub mod agg;
pub mod config;
pub mod consumer;
pub mod engine;

pub use agg::{AggregationRecord, BucketRange, TranslatedValue};
pub use config::{ConsumerConfig, EngineConfig, EngineOption};
pub use consumer::gate::ArgValue;
pub use consumer::lifecycle::LifecycleState;
pub use consumer::{create_consumer, Consumer, ConsumerError};
pub use engine::event::{ProbeDescriptor, ProbeEvent, RawAggregation, ScalarValue};
pub use engine::replay::ReplayEngine;
pub use engine::{Engine, EngineFailure, SessionHandle};
