//! The lifecycle-gated front door to one engine session.
//!
//! A [`Consumer`] owns its engine, the session handle, and the shared
//! lifecycle the engine's init completion drives. Every operation passes
//! the gate table before anything reaches the engine; the streaming drains
//! translate aggregation tuples and count throughput on the way through.

pub mod gate;
pub mod lifecycle;
pub mod stats;

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::agg::buckets::BucketTables;
use crate::agg::translate::Translator;
use crate::agg::{AggregationRecord, TranslateError};
use crate::config::{ConsumerConfig, EngineConfig};
use crate::engine::event::ProbeEvent;
use crate::engine::{Engine, EngineFailure, SessionHandle};

use self::gate::{ArgValue, ArgumentTypeError, OpSpec, ops};
use self::lifecycle::{ErrorFn, Lifecycle, LifecycleError, LifecycleState, ReadyFn};
use self::stats::{ConsumerStats, StatsSnapshot};

/// Errors a consumer operation can produce.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    BadArgument(#[from] ArgumentTypeError),

    #[error("unknown operation \"{0}\"")]
    UnknownOperation(String),

    #[error("operation \"{0}\" streams records and must be invoked through its typed method")]
    StreamingOperation(&'static str),

    #[error(transparent)]
    Engine(#[from] EngineFailure),

    #[error(transparent)]
    Translation(#[from] TranslateError),

    #[error(transparent)]
    Config(#[from] anyhow::Error),
}

/// Build a consumer over `engine` with default runtime settings.
pub fn create_consumer<E: Engine>(engine: E) -> Result<Consumer<E>, ConsumerError> {
    Consumer::with_config(engine, ConsumerConfig::default())
}

/// One engine session behind the lifecycle and operation gates.
pub struct Consumer<E: Engine> {
    engine: E,
    handle: Option<SessionHandle>,
    lifecycle: Arc<Lifecycle>,
    translator: Translator,
    engine_config: EngineConfig,
    config: ConsumerConfig,
    stats: ConsumerStats,
}

impl<E: Engine> fmt::Debug for Consumer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("handle", &self.handle)
            .field("engine_config", &self.engine_config)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<E: Engine> Consumer<E> {
    /// Build a consumer over `engine`.
    ///
    /// Reads and validates the engine's layout constants, opens the
    /// session, and wires the init completion into the lifecycle. The
    /// consumer exists immediately; gated operations refuse until the
    /// completion settles ready.
    pub fn with_config(mut engine: E, config: ConsumerConfig) -> Result<Self, ConsumerError> {
        config.validate()?;
        let engine_config = EngineConfig::from_constants(&engine.constants())?;
        let lifecycle = Arc::new(Lifecycle::new());

        let completion = Arc::clone(&lifecycle);
        let handle = engine.init(Box::new(move |result| completion.complete_init(result)))?;
        debug!(session = handle.id(), "engine session opened");

        Ok(Self {
            engine,
            handle: Some(handle),
            lifecycle,
            translator: Translator::new(engine_config, BucketTables::shared()),
            engine_config,
            config,
            stats: ConsumerStats::new(),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// The engine layout constants this consumer translates with. Readable
    /// in any lifecycle state.
    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine_config
    }

    /// Read and reset the throughput counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Register a single-shot callback for the ready transition.
    pub fn on_ready(&self, notify: ReadyFn) {
        self.lifecycle.on_ready(notify);
    }

    /// Register a single-shot callback for an init failure.
    pub fn on_error(&self, notify: ErrorFn) {
        self.lifecycle.on_error(notify);
    }

    /// Invoke a primitive-argument operation by name.
    ///
    /// Looks the operation up in the gate table, checks its lifecycle
    /// precondition, validates argument types positionally, and forwards
    /// to the engine with the session handle. `version` returns its
    /// string; the others return `None`. The streaming operations take
    /// sinks and are refused here; call [`Consumer::consume`] or
    /// [`Consumer::walk_aggregations`] instead.
    pub async fn invoke(
        &mut self,
        op: &str,
        args: &[ArgValue],
    ) -> Result<Option<String>, ConsumerError> {
        let spec = lookup_spec(op)?;
        if spec.requires_ready {
            self.lifecycle.check_ready()?;
        }
        gate::validate_args(spec, args)?;
        let session = self
            .handle
            .as_ref()
            .ok_or(LifecycleError::AlreadyDestroyed)?;
        debug!(op = spec.name, session = session.id(), "forwarding operation");
        match spec.name {
            ops::COMPILE => {
                let source = gate::str_at(spec, args, 0)?;
                self.engine.compile(session, source).await?;
                Ok(None)
            }
            ops::SET_OPTION => {
                let name = gate::str_at(spec, args, 0)?;
                let value = gate::str_at(spec, args, 1)?;
                self.engine.set_option(session, name, value).await?;
                Ok(None)
            }
            ops::START => {
                self.engine.start(session).await?;
                Ok(None)
            }
            ops::STOP => {
                self.engine.stop(session).await?;
                Ok(None)
            }
            ops::VERSION => Ok(Some(self.engine.version(session))),
            ops::CONSUME | ops::WALK_AGGREGATIONS => {
                Err(ConsumerError::StreamingOperation(spec.name))
            }
            _ => Err(ConsumerError::UnknownOperation(spec.name.to_owned())),
        }
    }

    /// Compile an instrumentation script.
    pub async fn compile_script(&mut self, source: &str) -> Result<(), ConsumerError> {
        self.invoke(ops::COMPILE, &[ArgValue::Str(source.to_owned())])
            .await?;
        Ok(())
    }

    /// Set an engine option.
    pub async fn set_option(&mut self, name: &str, value: &str) -> Result<(), ConsumerError> {
        self.invoke(
            ops::SET_OPTION,
            &[
                ArgValue::Str(name.to_owned()),
                ArgValue::Str(value.to_owned()),
            ],
        )
        .await?;
        Ok(())
    }

    /// Apply the configured engine options, in order.
    pub async fn apply_options(&mut self) -> Result<(), ConsumerError> {
        let options = self.config.options.clone();
        for option in &options {
            self.set_option(&option.name, &option.value).await?;
        }
        Ok(())
    }

    /// Enable tracing for the compiled script.
    pub async fn start(&mut self) -> Result<(), ConsumerError> {
        self.invoke(ops::START, &[]).await?;
        Ok(())
    }

    /// Disable tracing.
    pub async fn stop(&mut self) -> Result<(), ConsumerError> {
        self.invoke(ops::STOP, &[]).await?;
        Ok(())
    }

    /// The engine's version string. No readiness precondition; fails only
    /// once the consumer is destroyed.
    pub fn query_version(&self) -> Result<String, ConsumerError> {
        let session = self
            .handle
            .as_ref()
            .ok_or(LifecycleError::AlreadyDestroyed)?;
        Ok(self.engine.version(session))
    }

    /// Drain buffered probe firings into `sink`, counting each delivery.
    pub async fn consume<F>(&mut self, mut sink: F) -> Result<(), ConsumerError>
    where
        F: FnMut(ProbeEvent) -> ControlFlow<()> + Send,
    {
        self.gate_check(ops::CONSUME)?;
        let session = self
            .handle
            .as_ref()
            .ok_or(LifecycleError::AlreadyDestroyed)?;
        let stats = &self.stats;
        self.engine
            .consume(session, &mut |event| {
                stats.record_probe();
                sink(event)
            })
            .await?;
        Ok(())
    }

    /// Drain aggregation tuples into `sink` as translated records.
    ///
    /// A translation failure aborts the walk; records already delivered
    /// stay delivered and the failure is returned once the engine call
    /// ends.
    pub async fn walk_aggregations<F>(&mut self, mut sink: F) -> Result<(), ConsumerError>
    where
        F: FnMut(AggregationRecord) -> ControlFlow<()> + Send,
    {
        self.gate_check(ops::WALK_AGGREGATIONS)?;
        let session = self
            .handle
            .as_ref()
            .ok_or(LifecycleError::AlreadyDestroyed)?;
        let stats = &self.stats;
        let translator = &self.translator;
        let mut failed: Option<TranslateError> = None;
        self.engine
            .walk_aggregations(session, &mut |tuple| {
                match translator.translate(&tuple.action, &tuple.data) {
                    Ok(value) => {
                        stats.record_aggregation();
                        sink(AggregationRecord {
                            variable_id: tuple.variable_id,
                            key: tuple.keys,
                            value,
                        })
                    }
                    Err(err) => {
                        stats.record_translation_failure();
                        failed = Some(err);
                        ControlFlow::Break(())
                    }
                }
            })
            .await?;
        match failed {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Drive the session: drain probes and aggregations on the configured
    /// interval until `shutdown` fires, then drain once more so records
    /// emitted after the last tick are not lost.
    pub async fn pump<P, A>(
        &mut self,
        shutdown: CancellationToken,
        mut on_probe: P,
        mut on_record: A,
    ) -> Result<(), ConsumerError>
    where
        P: FnMut(ProbeEvent) -> ControlFlow<()> + Send,
        A: FnMut(AggregationRecord) -> ControlFlow<()> + Send,
    {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        let mut ticks: u64 = 0;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.consume(&mut on_probe).await?;
                    self.walk_aggregations(&mut on_record).await?;
                    ticks += 1;
                    if self.config.stats_interval > 0 && ticks % self.config.stats_interval == 0 {
                        let snap = self.stats.snapshot();
                        info!(
                            probe_events = snap.probe_events,
                            aggregation_records = snap.aggregation_records,
                            translation_failures = snap.translation_failures,
                            "consumer throughput"
                        );
                    }
                }
            }
        }
        debug!("pump cancelled, draining");
        self.consume(&mut on_probe).await?;
        self.walk_aggregations(&mut on_record).await?;
        Ok(())
    }

    /// Tear the session down. The lifecycle refuses a second destroy; the
    /// engine gets the handle back and releases everything attached to it.
    pub fn destroy(&mut self) -> Result<(), ConsumerError> {
        self.lifecycle.destroy()?;
        if let Some(session) = self.handle.take() {
            let snap = self.stats.snapshot();
            info!(
                session = session.id(),
                probe_events = snap.probe_events,
                aggregation_records = snap.aggregation_records,
                translation_failures = snap.translation_failures,
                "consumer destroyed"
            );
            self.engine.destroy(session);
        }
        Ok(())
    }

    fn gate_check(&self, op: &'static str) -> Result<(), ConsumerError> {
        let spec = lookup_spec(op)?;
        if spec.requires_ready {
            self.lifecycle.check_ready()?;
        }
        Ok(())
    }
}

impl<E: Engine> Drop for Consumer<E> {
    fn drop(&mut self) {
        if let Some(session) = self.handle.take() {
            self.engine.destroy(session);
        }
    }
}

fn lookup_spec(op: &str) -> Result<&'static OpSpec, ConsumerError> {
    gate::lookup(op).ok_or_else(|| ConsumerError::UnknownOperation(op.to_owned()))
}
