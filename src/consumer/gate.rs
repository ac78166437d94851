//! Declarative operation gating.
//!
//! Every engine-facing operation is described once in [`OPERATIONS`]: its
//! name, whether it needs a ready session, and the ordered parameter types
//! it takes. The consumer validates calls against this table before
//! anything reaches the engine.

use thiserror::Error;

/// Operation names, as the dynamic dispatch surface spells them.
pub mod ops {
    pub const COMPILE: &str = "compile";
    pub const SET_OPTION: &str = "set_option";
    pub const START: &str = "start";
    pub const STOP: &str = "stop";
    pub const VERSION: &str = "version";
    pub const CONSUME: &str = "consume";
    pub const WALK_AGGREGATIONS: &str = "walk_aggregations";
}

/// Declared type of one positional parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Str,
    Int,
}

impl ArgType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Int => "integer",
        }
    }
}

/// A caller-supplied argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Str(String),
    Int(i64),
}

impl ArgValue {
    pub fn arg_type(&self) -> ArgType {
        match self {
            Self::Str(_) => ArgType::Str,
            Self::Int(_) => ArgType::Int,
        }
    }
}

/// One gated operation's contract.
#[derive(Debug, Clone, Copy)]
pub struct OpSpec {
    pub name: &'static str,
    pub requires_ready: bool,
    pub params: &'static [ArgType],
}

/// Every operation the consumer forwards to the engine. `version` reads
/// engine metadata and skips the readiness gate.
pub const OPERATIONS: &[OpSpec] = &[
    OpSpec {
        name: ops::COMPILE,
        requires_ready: true,
        params: &[ArgType::Str],
    },
    OpSpec {
        name: ops::SET_OPTION,
        requires_ready: true,
        params: &[ArgType::Str, ArgType::Str],
    },
    OpSpec {
        name: ops::START,
        requires_ready: true,
        params: &[],
    },
    OpSpec {
        name: ops::STOP,
        requires_ready: true,
        params: &[],
    },
    OpSpec {
        name: ops::VERSION,
        requires_ready: false,
        params: &[],
    },
    OpSpec {
        name: ops::CONSUME,
        requires_ready: true,
        params: &[],
    },
    OpSpec {
        name: ops::WALK_AGGREGATIONS,
        requires_ready: true,
        params: &[],
    },
];

/// Find an operation by name.
pub fn lookup(name: &str) -> Option<&'static OpSpec> {
    OPERATIONS.iter().find(|spec| spec.name == name)
}

/// A call that does not match the declared parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{op}: argument {index} must be a {expected} (found {actual})")]
pub struct ArgumentTypeError {
    pub op: &'static str,
    pub index: usize,
    pub expected: &'static str,
    pub actual: &'static str,
}

/// Check `args` against the declared parameter list, stopping at the first
/// mismatch. Arguments beyond the declared list are ignored.
pub fn validate_args(spec: &OpSpec, args: &[ArgValue]) -> Result<(), ArgumentTypeError> {
    for (index, expected) in spec.params.iter().enumerate() {
        match args.get(index) {
            Some(value) if value.arg_type() == *expected => {}
            Some(value) => {
                return Err(ArgumentTypeError {
                    op: spec.name,
                    index,
                    expected: expected.as_str(),
                    actual: value.arg_type().as_str(),
                });
            }
            None => {
                return Err(ArgumentTypeError {
                    op: spec.name,
                    index,
                    expected: expected.as_str(),
                    actual: "nothing",
                });
            }
        }
    }
    Ok(())
}

/// Extract the string argument at `index`.
pub fn str_at<'a>(
    spec: &OpSpec,
    args: &'a [ArgValue],
    index: usize,
) -> Result<&'a str, ArgumentTypeError> {
    match args.get(index) {
        Some(ArgValue::Str(value)) => Ok(value),
        Some(other) => Err(ArgumentTypeError {
            op: spec.name,
            index,
            expected: ArgType::Str.as_str(),
            actual: other.arg_type().as_str(),
        }),
        None => Err(ArgumentTypeError {
            op: spec.name,
            index,
            expected: ArgType::Str.as_str(),
            actual: "nothing",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_operations() {
        assert!(lookup(ops::COMPILE).is_some());
        assert!(lookup("go").is_none());
        assert!(!lookup(ops::VERSION).unwrap().requires_ready);
        assert!(lookup(ops::CONSUME).unwrap().requires_ready);
    }

    #[test]
    fn test_validate_accepts_matching_args() {
        let spec = lookup(ops::SET_OPTION).unwrap();
        validate_args(
            spec,
            &[
                ArgValue::Str("bufsize".to_owned()),
                ArgValue::Str("8m".to_owned()),
            ],
        )
        .unwrap();
    }

    #[test]
    fn test_first_mismatch_reported() {
        let spec = lookup(ops::SET_OPTION).unwrap();
        let err = validate_args(spec, &[ArgValue::Int(4), ArgValue::Int(2)]).unwrap_err();
        assert_eq!(
            err,
            ArgumentTypeError {
                op: "set_option",
                index: 0,
                expected: "string",
                actual: "integer",
            }
        );
    }

    #[test]
    fn test_missing_argument_reported() {
        let spec = lookup(ops::COMPILE).unwrap();
        let err = validate_args(spec, &[]).unwrap_err();
        assert_eq!(err.index, 0);
        assert_eq!(err.actual, "nothing");
    }

    #[test]
    fn test_extra_arguments_ignored() {
        let spec = lookup(ops::START).unwrap();
        validate_args(spec, &[ArgValue::Str("ignored".to_owned())]).unwrap();
    }

    #[test]
    fn test_error_display() {
        let err = ArgumentTypeError {
            op: "compile",
            index: 0,
            expected: "string",
            actual: "integer",
        };
        assert_eq!(
            err.to_string(),
            "compile: argument 0 must be a string (found integer)"
        );
    }

    #[test]
    fn test_str_at_extracts() {
        let spec = lookup(ops::COMPILE).unwrap();
        let args = [ArgValue::Str("tick-1s { }".to_owned())];
        assert_eq!(str_at(spec, &args, 0).unwrap(), "tick-1s { }");
        assert!(str_at(spec, &args, 1).is_err());
        assert!(str_at(spec, &[ArgValue::Int(9)], 0).is_err());
    }
}
