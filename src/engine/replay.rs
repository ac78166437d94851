//! Script-driven engine for tests, benches, and hosts without a native
//! tracing backend.
//!
//! Implements the [`Engine`] trait over JSON session scripts: `compile`
//! parses the document, `start` stages its probe firings and aggregation
//! tuples, and the drain calls hand them out in order. Walked items are
//! removed, matching the destructive drain of native engines.

use std::collections::{HashMap, VecDeque};

use serde::Deserialize;
use tracing::debug;

use crate::config::{
    EngineConfig, KEY_INT64_MAX, KEY_INT64_MIN, KEY_QUANTIZE_NBUCKETS, KEY_QUANTIZE_ZEROBUCKET,
};

use super::event::{ProbeDescriptor, ProbeEvent, RawAggregation, ScalarValue};
use super::{AggregationSink, Engine, EngineFailure, InitCompletion, ProbeSink, SessionHandle};

/// Buffer sizing applied to every fresh session.
const DEFAULT_OPTIONS: [(&str, &str); 2] = [("bufsize", "4m"), ("aggsize", "4m")];

/// A scripted session document.
#[derive(Debug, Deserialize)]
struct SessionScript {
    #[serde(default)]
    probes: Vec<ScriptProbe>,
    #[serde(default)]
    aggregations: Vec<ScriptAggregation>,
}

/// One probe firing in a session script.
#[derive(Debug, Deserialize)]
struct ScriptProbe {
    provider: String,
    #[serde(default)]
    module: String,
    #[serde(default)]
    func: String,
    name: String,
    #[serde(default)]
    payload: Option<ScalarValue>,
}

/// One aggregation tuple in a session script.
#[derive(Debug, Deserialize)]
struct ScriptAggregation {
    id: u32,
    action: String,
    #[serde(default)]
    keys: Vec<ScalarValue>,
    #[serde(default)]
    data: Vec<i64>,
}

struct Session {
    id: u64,
    options: HashMap<String, String>,
    script: Option<SessionScript>,
    running: bool,
    probes: VecDeque<ProbeEvent>,
    aggregations: VecDeque<RawAggregation>,
}

/// Script-replaying [`Engine`] implementation.
pub struct ReplayEngine {
    version: String,
    init_failure: Option<String>,
    next_id: u64,
    session: Option<Session>,
}

impl ReplayEngine {
    pub fn new() -> Self {
        Self {
            version: "replay 1.0".to_owned(),
            init_failure: None,
            next_id: 1,
            session: None,
        }
    }

    /// An engine whose init completes with the given failure cause.
    pub fn failing(cause: &str) -> Self {
        let mut engine = Self::new();
        engine.init_failure = Some(cause.to_owned());
        engine
    }

    /// Current value of a session option, for inspection.
    pub fn option(&self, name: &str) -> Option<&str> {
        self.session
            .as_ref()
            .and_then(|session| session.options.get(name))
            .map(String::as_str)
    }

    fn session_mut(&mut self, handle: &SessionHandle) -> Result<&mut Session, EngineFailure> {
        match self.session.as_mut() {
            Some(session) if session.id == handle.id() => Ok(session),
            _ => Err(EngineFailure::new(format!(
                "unknown session {}",
                handle.id()
            ))),
        }
    }
}

impl Default for ReplayEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for ReplayEngine {
    fn init(&mut self, done: InitCompletion) -> Result<SessionHandle, EngineFailure> {
        if self.session.is_some() {
            return Err(EngineFailure::new("session already initialized"));
        }
        let id = self.next_id;
        self.next_id += 1;
        let options = DEFAULT_OPTIONS
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        self.session = Some(Session {
            id,
            options,
            script: None,
            running: false,
            probes: VecDeque::new(),
            aggregations: VecDeque::new(),
        });
        match &self.init_failure {
            Some(cause) => done(Err(EngineFailure::new(cause.clone()))),
            None => done(Ok(())),
        }
        Ok(SessionHandle::new(id))
    }

    fn constants(&self) -> HashMap<String, i64> {
        let layout = EngineConfig::default();
        HashMap::from([
            (
                KEY_QUANTIZE_NBUCKETS.to_owned(),
                i64::from(layout.quantize_nbuckets),
            ),
            (
                KEY_QUANTIZE_ZEROBUCKET.to_owned(),
                i64::from(layout.quantize_zerobucket),
            ),
            (KEY_INT64_MIN.to_owned(), layout.int64_min),
            (KEY_INT64_MAX.to_owned(), layout.int64_max),
        ])
    }

    async fn set_option(
        &mut self,
        session: &SessionHandle,
        name: &str,
        value: &str,
    ) -> Result<(), EngineFailure> {
        if name.is_empty() {
            return Err(EngineFailure::new(format!(
                "couldn't set option \"{name}\": invalid option name"
            )));
        }
        let session = self.session_mut(session)?;
        session.options.insert(name.to_owned(), value.to_owned());
        Ok(())
    }

    async fn compile(
        &mut self,
        session: &SessionHandle,
        source: &str,
    ) -> Result<(), EngineFailure> {
        let session = self.session_mut(session)?;
        let script: SessionScript = serde_json::from_str(source)
            .map_err(|e| EngineFailure::new(format!("couldn't compile script: {e}")))?;
        debug!(
            session = session.id,
            probes = script.probes.len(),
            aggregations = script.aggregations.len(),
            "script compiled"
        );
        session.script = Some(script);
        Ok(())
    }

    async fn start(&mut self, session: &SessionHandle) -> Result<(), EngineFailure> {
        let session = self.session_mut(session)?;
        if session.running {
            return Err(EngineFailure::new(
                "couldn't enable tracing: already enabled",
            ));
        }
        let Some(script) = session.script.take() else {
            return Err(EngineFailure::new(
                "couldn't enable tracing: no compiled script",
            ));
        };
        for probe in script.probes {
            session.probes.push_back(ProbeEvent {
                probe: ProbeDescriptor {
                    provider: probe.provider,
                    module: probe.module,
                    func: probe.func,
                    name: probe.name,
                },
                payload: probe.payload,
            });
        }
        for aggregation in script.aggregations {
            session.aggregations.push_back(RawAggregation {
                variable_id: aggregation.id,
                action: aggregation.action,
                keys: aggregation.keys,
                data: aggregation.data,
            });
        }
        session.running = true;
        debug!(
            session = session.id,
            probes = session.probes.len(),
            aggregations = session.aggregations.len(),
            "tracing enabled"
        );
        Ok(())
    }

    async fn stop(&mut self, session: &SessionHandle) -> Result<(), EngineFailure> {
        let session = self.session_mut(session)?;
        if !session.running {
            return Err(EngineFailure::new("couldn't disable tracing: not enabled"));
        }
        session.running = false;
        Ok(())
    }

    async fn consume(
        &mut self,
        session: &SessionHandle,
        sink: &mut ProbeSink<'_>,
    ) -> Result<(), EngineFailure> {
        let session = self.session_mut(session)?;
        while let Some(event) = session.probes.pop_front() {
            if sink(event).is_break() {
                break;
            }
        }
        Ok(())
    }

    async fn walk_aggregations(
        &mut self,
        session: &SessionHandle,
        sink: &mut AggregationSink<'_>,
    ) -> Result<(), EngineFailure> {
        let session = self.session_mut(session)?;
        while let Some(tuple) = session.aggregations.pop_front() {
            if sink(tuple).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn version(&self, _session: &SessionHandle) -> String {
        self.version.clone()
    }

    fn destroy(&mut self, session: SessionHandle) {
        if self
            .session
            .as_ref()
            .is_some_and(|live| live.id == session.id())
        {
            self.session = None;
            debug!(session = session.id(), "session destroyed");
        }
    }
}
