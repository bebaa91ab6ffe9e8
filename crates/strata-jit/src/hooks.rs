use strata_types::Value;

use crate::ast::BinOp;
use crate::error::RuntimeError;

/// The external evaluator contract.
///
/// Full source-language semantics (coercion rules, the object system, the builtin library) live
/// outside this engine. The engine calls back through this trait for anything it does not
/// implement natively: unknown callees and mixed-type binary operators.
pub trait HostHooks {
    fn call_host(&mut self, name: &str, args: &[Value]) -> Result<Value, RuntimeError>;

    fn coerce_binary(&mut self, op: BinOp, lhs: &Value, rhs: &Value)
        -> Result<Value, RuntimeError>;
}

/// Numeric-only defaults: no host functions, no coercion. Anything outside same-type arithmetic
/// faults, which is the honest behavior for an engine whose language semantics are delegated.
#[derive(Debug, Default)]
pub struct DefaultHooks;

impl HostHooks for DefaultHooks {
    fn call_host(&mut self, name: &str, _args: &[Value]) -> Result<Value, RuntimeError> {
        Err(RuntimeError::UndefinedCallee(name.to_string()))
    }

    fn coerce_binary(
        &mut self,
        op: BinOp,
        lhs: &Value,
        rhs: &Value,
    ) -> Result<Value, RuntimeError> {
        Err(RuntimeError::Type(format!(
            "unsupported operands for {op:?}: {:?} and {:?}",
            lhs.type_tag(),
            rhs.type_tag()
        )))
    }
}
