use crate::bytecode::op::{EXTERNAL_ROUTINE, WORD_SIZE, Word};

/// One routine-table entry from the bytecode header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineEntry {
    /// Word offset of the routine's first instruction, relative to the
    /// start of the code section.
    Offset(Word),

    /// Sentinel entry: no code offset, resolve through the external table
    /// using this routine's mangled identifier.
    External,
}

/// A loaded bytecode buffer: the routine table plus the code section.
///
/// Loading validates the buffer shape once so the dispatch loop can trust
/// entry offsets and pair alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    entries: Vec<RoutineEntry>,
    code: Vec<Word>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Buffer length is not a whole number of words.
    UnalignedBuffer { length: usize },

    /// Buffer too short to hold the routine count word.
    MissingHeader,

    /// The routine count promises more entries than the buffer holds.
    TruncatedHeader { routines: usize, words: usize },

    /// The code section is not a sequence of opcode/operand pairs.
    UnpairedCode { words: usize },

    /// An internal entry points past the code section or between pairs,
    /// or precedes an earlier routine's offset.
    BadOffset { index: usize, offset: Word },

    /// Allocation failure while copying the buffer.
    OutOfMemory,
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::UnalignedBuffer { length } => {
                write!(
                    f,
                    "load error: buffer of {} bytes is not a whole number of {}-byte words",
                    length, WORD_SIZE
                )
            }
            LoadError::MissingHeader => {
                write!(f, "load error: buffer too short for a program header")
            }
            LoadError::TruncatedHeader { routines, words } => {
                write!(
                    f,
                    "load error: header promises {} routine entries but only {} words follow",
                    routines, words
                )
            }
            LoadError::UnpairedCode { words } => {
                write!(
                    f,
                    "load error: code section of {} words is not opcode/operand pairs",
                    words
                )
            }
            LoadError::BadOffset { index, offset } => {
                write!(
                    f,
                    "load error: routine {} has invalid code offset {}",
                    index, offset
                )
            }
            LoadError::OutOfMemory => {
                write!(f, "load error: out of memory while loading bytecode")
            }
        }
    }
}

impl std::error::Error for LoadError {}

impl Image {
    /// Parse and validate a serialized bytecode buffer.
    pub fn load(bytecode: &[u8]) -> Result<Self, LoadError> {
        if bytecode.len() % WORD_SIZE != 0 {
            return Err(LoadError::UnalignedBuffer {
                length: bytecode.len(),
            });
        }

        let mut words: Vec<Word> = Vec::new();
        words
            .try_reserve_exact(bytecode.len() / WORD_SIZE)
            .map_err(|_| LoadError::OutOfMemory)?;
        for chunk in bytecode.chunks_exact(WORD_SIZE) {
            let mut buffer = [0u8; WORD_SIZE];
            buffer.copy_from_slice(chunk);
            words.push(Word::from_ne_bytes(buffer));
        }

        let Some((&count, rest)) = words.split_first() else {
            return Err(LoadError::MissingHeader);
        };
        if count > rest.len() {
            return Err(LoadError::TruncatedHeader {
                routines: count,
                words: rest.len(),
            });
        }

        let code: Vec<Word> = rest[count..].to_vec();
        if code.len() % 2 != 0 {
            return Err(LoadError::UnpairedCode { words: code.len() });
        }

        let mut entries = Vec::with_capacity(count);
        let mut previous = 0;
        for (index, &word) in rest[..count].iter().enumerate() {
            if word == EXTERNAL_ROUTINE {
                entries.push(RoutineEntry::External);
                continue;
            }
            // Offsets land on pair boundaries and never move backwards;
            // an empty routine at the end of the code section may sit at
            // `code.len()` itself.
            if word > code.len() || word % 2 != 0 || word < previous {
                return Err(LoadError::BadOffset {
                    index,
                    offset: word,
                });
            }
            previous = word;
            entries.push(RoutineEntry::Offset(word));
        }

        Ok(Self { entries, code })
    }

    /// Number of routine-table entries (header word 0).
    pub fn routine_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[RoutineEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<RoutineEntry> {
        self.entries.get(index).copied()
    }

    /// The code section as words.
    pub fn code(&self) -> &[Word] {
        &self.code
    }

    /// Instruction span `(start, end)` of the internal routine at `index`:
    /// its own offset up to the next internal routine's offset, or the end
    /// of the code section for the last one. `None` for external entries
    /// and out-of-range indices.
    pub fn span(&self, index: usize) -> Option<(Word, Word)> {
        let RoutineEntry::Offset(start) = *self.entries.get(index)? else {
            return None;
        };
        let end = self.entries[index + 1..]
            .iter()
            .find_map(|entry| match entry {
                RoutineEntry::Offset(offset) => Some(*offset),
                RoutineEntry::External => None,
            })
            .unwrap_or(self.code.len());
        Some((start, end))
    }
}
