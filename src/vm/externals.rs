use std::collections::HashMap;

use crate::bytecode::Word;
use crate::vm::vm_error::ExecError;

/// A host-supplied native routine.
///
/// Invoked synchronously with the top `k` stack words, `k` being the
/// callee's declared parameter count. The call is opaque and blocking; an
/// error faults the VM.
pub type ExternalFn = Box<dyn Fn(&[Word]) -> Result<(), ExecError>>;

/// Mapping from mangled symbol name to native routine.
///
/// Built by the host before execution starts and read-only afterwards; the
/// VM never mutates it, so one table may back any number of instances.
/// Each VM borrows its table explicitly, so independent instances can
/// carry distinct tables.
#[derive(Default)]
pub struct ExternalTable {
    routines: HashMap<String, ExternalFn>,
}

impl ExternalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native routine under its mangled symbol name. Replaces
    /// any previous registration for the same symbol.
    pub fn register<F>(&mut self, symbol: impl Into<String>, routine: F)
    where
        F: Fn(&[Word]) -> Result<(), ExecError> + 'static,
    {
        self.routines.insert(symbol.into(), Box::new(routine));
    }

    pub fn lookup(&self, symbol: &str) -> Option<&ExternalFn> {
        self.routines.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }
}
