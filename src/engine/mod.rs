pub mod event;
pub mod replay;

use std::collections::HashMap;
use std::ops::ControlFlow;

use thiserror::Error;

use self::event::{ProbeEvent, RawAggregation};

/// Opaque handle to one engine session.
///
/// Deliberately not `Clone`: a session belongs to exactly one consumer, and
/// [`Engine::destroy`] takes the handle back by value.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SessionHandle(u64);

impl SessionHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// An error surfaced by the engine, message carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EngineFailure {
    message: String,
}

impl EngineFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Invoked exactly once when session initialization settles.
pub type InitCompletion = Box<dyn FnOnce(Result<(), EngineFailure>) + Send>;

/// Streaming sink for probe firings; return `Break` to abort the drain.
pub type ProbeSink<'a> = dyn FnMut(ProbeEvent) -> ControlFlow<()> + Send + 'a;

/// Streaming sink for raw aggregation tuples.
pub type AggregationSink<'a> = dyn FnMut(RawAggregation) -> ControlFlow<()> + Send + 'a;

/// Engine manages session setup, script compilation, tracing control, and
/// buffer draining for one tracing backend.
pub trait Engine: Send {
    /// Open a session. The handle is returned synchronously; `done` fires
    /// once setup settles, possibly before this method returns.
    fn init(&mut self, done: InitCompletion) -> Result<SessionHandle, EngineFailure>;

    /// Bucket layout constants for aggregation translation (see the
    /// `config` key constants).
    fn constants(&self) -> HashMap<String, i64>;

    /// Set a runtime option on the session.
    fn set_option(
        &mut self,
        session: &SessionHandle,
        name: &str,
        value: &str,
    ) -> impl std::future::Future<Output = Result<(), EngineFailure>> + Send;

    /// Compile an instrumentation script for the session.
    fn compile(
        &mut self,
        session: &SessionHandle,
        source: &str,
    ) -> impl std::future::Future<Output = Result<(), EngineFailure>> + Send;

    /// Enable tracing for the compiled script.
    fn start(
        &mut self,
        session: &SessionHandle,
    ) -> impl std::future::Future<Output = Result<(), EngineFailure>> + Send;

    /// Disable tracing.
    fn stop(
        &mut self,
        session: &SessionHandle,
    ) -> impl std::future::Future<Output = Result<(), EngineFailure>> + Send;

    /// Drain buffered probe firings into `sink`.
    fn consume(
        &mut self,
        session: &SessionHandle,
        sink: &mut ProbeSink<'_>,
    ) -> impl std::future::Future<Output = Result<(), EngineFailure>> + Send;

    /// Drain aggregation tuples into `sink`. Walked tuples are removed from
    /// the engine's aggregation state.
    fn walk_aggregations(
        &mut self,
        session: &SessionHandle,
        sink: &mut AggregationSink<'_>,
    ) -> impl std::future::Future<Output = Result<(), EngineFailure>> + Send;

    /// The engine's version string. Valid on any open session.
    fn version(&self, session: &SessionHandle) -> String;

    /// Release the session and everything attached to it.
    fn destroy(&mut self, session: SessionHandle);
}
