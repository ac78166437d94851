use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies the probe that fired an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProbeDescriptor {
    pub provider: String,
    pub module: String,
    pub func: String,
    pub name: String,
}

impl fmt::Display for ProbeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.provider, self.module, self.func, self.name
        )
    }
}

/// A single traced value.
///
/// Engines decode 1, 2, 4, and 8 byte records to integers and everything
/// else to strings; aggregation keys and probe payloads are either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Int(i64),
    Str(String),
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

/// A probe firing delivered through `Engine::consume`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeEvent {
    /// The probe that fired.
    pub probe: ProbeDescriptor,
    /// The traced record, when the probe emitted one.
    #[serde(default)]
    pub payload: Option<ScalarValue>,
}

/// A flattened aggregation tuple as the engine reports it, before bucket
/// translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAggregation {
    /// Engine-assigned aggregation variable id.
    pub variable_id: u32,
    /// Wire action name, e.g. `"quantize()"`.
    pub action: String,
    /// Aggregation key tuple.
    #[serde(default)]
    pub keys: Vec<ScalarValue>,
    /// Flattened value arguments; layout depends on the action.
    #[serde(default)]
    pub data: Vec<i64>,
}
