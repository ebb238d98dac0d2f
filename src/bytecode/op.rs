// =============================================================================
// OP - Bytecode words
// =============================================================================

/// The fixed-width unit used uniformly for header entries, opcodes, and
/// operands: the platform's native addressing width, host byte order.
pub type Word = usize;

/// Serialized width of one [`Word`] in bytes.
pub const WORD_SIZE: usize = size_of::<Word>();

/// Routine-table entry marking an external routine: all bits set. External
/// routines have no code offset and resolve through the external table.
pub const EXTERNAL_ROUTINE: Word = Word::MAX;

/// Code-section opcodes. Every even-positioned code word is an opcode and
/// the following word is its operand.
///
/// The discriminants are part of the interchange format and match the
/// reference tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Opcode {
    /// `(PUSH, imm)` — push the immediate onto the stack.
    Push = 0xAA,

    /// `(CALL, idx)` — invoke the routine at routine-table index `idx`.
    /// The operand is a table index, never a resolved code address.
    Call = 0x55,
}

impl Opcode {
    pub const fn word(self) -> Word {
        self as Word
    }
}

impl TryFrom<Word> for Opcode {
    type Error = Word;

    fn try_from(word: Word) -> Result<Self, Word> {
        match word {
            0xAA => Ok(Opcode::Push),
            0x55 => Ok(Opcode::Call),
            other => Err(other),
        }
    }
}
