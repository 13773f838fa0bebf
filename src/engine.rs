//! Script runtime interface
//!
//! The dispatcher drives the script runtime through this small stack-shaped
//! operation set; the runtime's own execution engine stays behind it. The
//! codec never touches the runtime directly: values cross the boundary as
//! whole [`ScriptValue`] trees at push and collect time.

use crate::error::ScriptError;
use crate::value::ScriptValue;

/// Operations the dispatcher needs from an embedded script runtime.
///
/// The runtime exposes a value stack. `run` and `call` leave their results
/// on the stack as slots `1..=stack_size()`; the dispatcher collects and
/// pops them.
pub trait ScriptEngine {
    /// Load and run a source chunk, leaving any results on the stack.
    fn run(&mut self, source: &[u8]) -> Result<(), ScriptError>;

    /// Push the value of a global onto the stack. Unknown names push nil;
    /// the failure surfaces when `call` finds the slot not callable.
    fn get_global(&mut self, name: &str);

    /// Push a value onto the stack.
    fn push(&mut self, value: ScriptValue);

    /// Call the function below `argc` arguments on the stack, consuming
    /// function and arguments and leaving every returned value.
    fn call(&mut self, argc: usize) -> Result<(), ScriptError>;

    /// Number of values currently on the stack.
    fn stack_size(&self) -> usize;

    /// Copy of the value in stack slot `slot` (1-based).
    fn value_at(&self, slot: usize) -> ScriptValue;

    /// Remove the top `n` values.
    fn pop(&mut self, n: usize);

    /// Ensure room for `extra` additional stack slots.
    fn check_stack(&mut self, extra: usize) -> bool;
}
