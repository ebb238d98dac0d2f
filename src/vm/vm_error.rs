use crate::bytecode::{LoadError, Word};
use crate::mangle::MangleError;
use crate::vm::State;

#[derive(Debug)]
pub enum ExecError {
    /// The bytecode buffer failed validation.
    Load(LoadError),

    /// The supplied symbol list does not cover the routine table.
    SymbolCountMismatch { symbols: usize, routines: usize },

    /// Allocation failure for the execution stack.
    OutOfMemory,

    /// `run` called on a VM that is not freshly loaded.
    NotRunnable { state: State },

    /// The requested entry routine is external; execution must start in
    /// bytecode.
    ExternalEntry { index: usize },

    /// A `CALL` operand (or entry index) is outside the routine table.
    BadRoutineIndex { index: Word, routines: usize },

    /// An even-positioned code word is neither `PUSH` nor `CALL`.
    IllegalOpcode { word: Word, offset: usize },

    /// The dispatch loop ran off the end of the code section mid-pair.
    TruncatedPair { offset: usize },

    /// A push would exceed the caller-specified stack capacity.
    StackOverflow { capacity: usize },

    /// A call needs more argument words than the current frame holds.
    StackUnderflow { needed: usize, height: usize },

    /// The frame stack emptied while execution was still in progress.
    FrameUnderflow,

    /// An external routine's identifier could not be mangled.
    Mangle(MangleError),

    /// A mangled symbol has no registered native routine.
    UnresolvedExternal { symbol: String },
}

impl std::fmt::Display for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecError::Load(error) => write!(f, "vm error: {}", error),
            ExecError::SymbolCountMismatch { symbols, routines } => {
                write!(
                    f,
                    "vm error: {} symbols supplied for {} routine-table entries",
                    symbols, routines
                )
            }
            ExecError::OutOfMemory => {
                write!(f, "vm error: out of memory allocating the execution stack")
            }
            ExecError::NotRunnable { state } => {
                write!(f, "vm error: cannot run from state {:?}", state)
            }
            ExecError::ExternalEntry { index } => {
                write!(f, "vm error: entry routine {} is external", index)
            }
            ExecError::BadRoutineIndex { index, routines } => {
                write!(
                    f,
                    "vm error: routine index {} out of range for table of {}",
                    index, routines
                )
            }
            ExecError::IllegalOpcode { word, offset } => {
                write!(
                    f,
                    "vm error: illegal opcode {:#x} at code offset {}",
                    word, offset
                )
            }
            ExecError::TruncatedPair { offset } => {
                write!(
                    f,
                    "vm error: code section ends mid-pair at offset {}",
                    offset
                )
            }
            ExecError::StackOverflow { capacity } => {
                write!(
                    f,
                    "vm error: stack overflow, capacity of {} words exhausted",
                    capacity
                )
            }
            ExecError::StackUnderflow { needed, height } => {
                write!(
                    f,
                    "vm error: stack underflow, call needs {} words but frame holds {}",
                    needed, height
                )
            }
            ExecError::FrameUnderflow => {
                write!(f, "vm error: frame stack underflow")
            }
            ExecError::Mangle(error) => write!(f, "vm error: {}", error),
            ExecError::UnresolvedExternal { symbol } => {
                write!(
                    f,
                    "vm error: no native routine registered for `{}`",
                    symbol
                )
            }
        }
    }
}

impl std::error::Error for ExecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecError::Load(error) => Some(error),
            ExecError::Mangle(error) => Some(error),
            _ => None,
        }
    }
}

impl From<LoadError> for ExecError {
    fn from(error: LoadError) -> Self {
        ExecError::Load(error)
    }
}

impl From<MangleError> for ExecError {
    fn from(error: MangleError) -> Self {
        ExecError::Mangle(error)
    }
}
