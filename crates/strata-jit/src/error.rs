use strata_types::TypeTag;
use thiserror::Error;

/// A fault the hosted program can cause; surfaced to the caller unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),
    #[error("undefined procedure or host function `{0}`")]
    UndefinedCallee(String),
    #[error("wrong argument count for `{name}`: expected {expected}, got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("type error: {0}")]
    Type(String),
    #[error("host error: {0}")]
    Host(String),
}

/// Result variant returned through the call boundary by tier plans.
///
/// `Deopt` is the recoverable signal a specialized path raises when a runtime assumption is
/// violated; the engine absorbs it, pops the tier, and re-executes. It is a value, not an
/// exception, so the control-flow cost is visible in every evaluator signature.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum EvalError {
    #[error("speculation failed: expected {expected:?}, saw {actual:?}")]
    Deopt { expected: TypeTag, actual: TypeTag },
    #[error(transparent)]
    Fault(#[from] RuntimeError),
}

/// Tier generation failed. Never fatal to the triggering call: the engine logs it, keeps the
/// current tier, and retries at the next threshold crossing.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("plan for `{name}` has {nodes} nodes, over the {limit} limit")]
    PlanTooLarge {
        name: String,
        nodes: usize,
        limit: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum CallError {
    #[error("unknown procedure `{0}`")]
    UnknownProcedure(String),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
