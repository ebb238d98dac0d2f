pub mod disasm;
pub mod emit;
pub mod emit_error;
pub mod image;
pub mod op;

pub use emit::emit;
pub use emit_error::EmitError;
pub use image::{Image, LoadError, RoutineEntry};
pub use op::{EXTERNAL_ROUTINE, Opcode, WORD_SIZE, Word};
