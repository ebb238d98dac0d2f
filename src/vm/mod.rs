pub mod externals;
pub mod vm_error;

pub use externals::{ExternalFn, ExternalTable};
pub use vm_error::ExecError;

use log::{debug, error};

use crate::ast::Symbol;
use crate::bytecode::{Image, Opcode, RoutineEntry, Word};
use crate::mangle::mangle;

/// Lifecycle of a VM instance. `Running` is only ever observable from
/// within a native routine; a finished instance is `Halted` or `Faulted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Loaded,
    Running,
    Halted,
    Faulted,
}

/// Runtime record for one active routine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Stack index where this invocation's region starts.
    pub base: usize,

    /// Words pushed within this frame so far.
    pub height: usize,

    /// Reserved for future return-value handling; never set today.
    pub reserve: bool,

    /// Argument words the caller pushed for this invocation, dropped when
    /// the frame pops.
    arguments: usize,

    /// Caller position to restore on implicit return.
    resume_ip: usize,
    resume_span: usize,
}

/// The CiONom virtual machine.
///
/// One instance exclusively owns its stack and frame stack; the external
/// table is borrowed read-only from the host, so a single table can back
/// any number of concurrent instances.
pub struct Vm<'host> {
    image: Image,
    symbols: Vec<Symbol>,
    externals: &'host ExternalTable,
    stack: Vec<Word>,
    capacity: usize,
    frames: Vec<Frame>,

    /// Instruction pointer: word offset into the code section.
    ip: usize,

    /// End of the current routine's instruction span; reaching it is the
    /// implicit return.
    span: usize,

    state: State,
}

impl<'host> Vm<'host> {
    /// Parse and validate a bytecode buffer and prepare an instance for
    /// execution.
    ///
    /// `symbols` lists identifier and declared parameter count per routine
    /// in table order (the wire format carries neither); the usual source
    /// is [`crate::ast::Program::symbols`]. The stack is allocated here, to
    /// `stack_capacity` words, and lives for the whole execution.
    pub fn load(
        bytecode: &[u8],
        stack_capacity: usize,
        symbols: Vec<Symbol>,
        externals: &'host ExternalTable,
    ) -> Result<Self, ExecError> {
        let image = Image::load(bytecode)?;
        if symbols.len() != image.routine_count() {
            return Err(ExecError::SymbolCountMismatch {
                symbols: symbols.len(),
                routines: image.routine_count(),
            });
        }

        let mut stack: Vec<Word> = Vec::new();
        stack
            .try_reserve_exact(stack_capacity)
            .map_err(|_| ExecError::OutOfMemory)?;

        Ok(Self {
            image,
            symbols,
            externals,
            stack,
            capacity: stack_capacity,
            frames: Vec::new(),
            ip: 0,
            span: 0,
            state: State::Loaded,
        })
    }

    /// Execute from the given entry routine until the entry frame pops.
    ///
    /// The entry routine is invoked as if by an implicit `CALL` with no
    /// arguments. On success the instance is `Halted` and the data stack
    /// remains available through [`stack`](Self::stack); any fault clears
    /// stack and frames, marks the instance `Faulted`, and surfaces the
    /// typed error.
    pub fn run(&mut self, entry: usize) -> Result<(), ExecError> {
        if self.state != State::Loaded {
            return Err(ExecError::NotRunnable { state: self.state });
        }

        let result = self.enter(entry).and_then(|_| self.dispatch());
        match result {
            Ok(()) => {
                self.state = State::Halted;
                Ok(())
            }
            Err(fault) => {
                error!("execution faulted: {}", fault);
                self.state = State::Faulted;
                self.stack.clear();
                self.frames.clear();
                Err(fault)
            }
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The data stack. After a successful run this holds the final stack
    /// contents; after a fault it is empty.
    pub fn stack(&self) -> &[Word] {
        &self.stack
    }

    /// Active invocation records, innermost last. Empties exactly when
    /// execution halts.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    fn enter(&mut self, entry: usize) -> Result<(), ExecError> {
        let start = match self.image.entry(entry) {
            None => {
                return Err(ExecError::BadRoutineIndex {
                    index: entry,
                    routines: self.image.routine_count(),
                });
            }
            Some(RoutineEntry::External) => {
                return Err(ExecError::ExternalEntry { index: entry });
            }
            Some(RoutineEntry::Offset(offset)) => offset,
        };
        let end = self
            .image
            .span(entry)
            .map(|(_, end)| end)
            .unwrap_or_else(|| self.image.code().len());

        self.state = State::Running;
        self.frames.push(Frame {
            base: 0,
            height: 0,
            reserve: false,
            arguments: 0,
            resume_ip: end,
            resume_span: end,
        });
        self.ip = start;
        self.span = end;
        Ok(())
    }

    fn dispatch(&mut self) -> Result<(), ExecError> {
        loop {
            // Implicit return: the instruction pointer reached the end of
            // the current routine's span.
            if self.ip >= self.span {
                let frame = self.frames.pop().ok_or(ExecError::FrameUnderflow)?;
                if self.frames.is_empty() {
                    // Entry frame popped: halt. The data stack stays live
                    // for inspection by the caller.
                    return Ok(());
                }

                let floor = frame
                    .base
                    .checked_sub(frame.arguments)
                    .ok_or(ExecError::StackUnderflow {
                        needed: frame.arguments,
                        height: frame.base,
                    })?;
                self.stack.truncate(floor);

                let caller = self.frames.last_mut().ok_or(ExecError::FrameUnderflow)?;
                if caller.height < frame.arguments {
                    return Err(ExecError::StackUnderflow {
                        needed: frame.arguments,
                        height: caller.height,
                    });
                }
                caller.height -= frame.arguments;
                self.ip = frame.resume_ip;
                self.span = frame.resume_span;
                continue;
            }

            let pair = self.ip;
            let code = self.image.code();
            let (opcode, operand) = match (code.get(pair), code.get(pair + 1)) {
                (Some(&opcode), Some(&operand)) => (opcode, operand),
                _ => return Err(ExecError::TruncatedPair { offset: pair }),
            };
            self.ip += 2;

            match Opcode::try_from(opcode) {
                Ok(Opcode::Push) => {
                    if self.stack.len() == self.capacity {
                        return Err(ExecError::StackOverflow {
                            capacity: self.capacity,
                        });
                    }
                    self.stack.push(operand);
                    let frame = self.frames.last_mut().ok_or(ExecError::FrameUnderflow)?;
                    frame.height += 1;
                }
                Ok(Opcode::Call) => self.call(operand)?,
                Err(word) => {
                    return Err(ExecError::IllegalOpcode { word, offset: pair });
                }
            }
        }
    }

    /// One level of indirection, preserved from the format: the operand is
    /// a routine-table index, translated to a destination here at call
    /// time.
    fn call(&mut self, index: Word) -> Result<(), ExecError> {
        let entry = self
            .image
            .entry(index)
            .ok_or(ExecError::BadRoutineIndex {
                index,
                routines: self.image.routine_count(),
            })?;

        let arguments = self.symbols[index].parameters;
        let frame = self.frames.last().ok_or(ExecError::FrameUnderflow)?;
        if frame.height < arguments {
            return Err(ExecError::StackUnderflow {
                needed: arguments,
                height: frame.height,
            });
        }

        match entry {
            RoutineEntry::External => {
                let identifier = self.symbols[index].identifier.clone();
                let symbol = mangle(&identifier)?;
                let routine =
                    self.externals
                        .lookup(&symbol)
                        .ok_or_else(|| ExecError::UnresolvedExternal {
                            symbol: symbol.clone(),
                        })?;

                debug!("calling external routine `{}`", symbol);
                let arguments_start = self.stack.len() - arguments;
                routine(&self.stack[arguments_start..])?;

                // The call consumed its arguments.
                self.stack.truncate(arguments_start);
                let frame = self.frames.last_mut().ok_or(ExecError::FrameUnderflow)?;
                frame.height -= arguments;
            }
            RoutineEntry::Offset(offset) => {
                let end = self
                    .image
                    .span(index)
                    .map(|(_, end)| end)
                    .unwrap_or_else(|| self.image.code().len());
                self.frames.push(Frame {
                    base: self.stack.len(),
                    height: 0,
                    reserve: false,
                    arguments,
                    resume_ip: self.ip,
                    resume_span: self.span,
                });
                self.ip = offset;
                self.span = end;
            }
        }
        Ok(())
    }
}

// The external table holds boxed closures, so no derive; report it by size.
impl std::fmt::Debug for Vm<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("state", &self.state)
            .field("ip", &self.ip)
            .field("span", &self.span)
            .field("stack", &self.stack)
            .field("frames", &self.frames)
            .field("externals", &self.externals.len())
            .finish_non_exhaustive()
    }
}
