use serde::{Deserialize, Serialize};

use crate::bytecode::Word;

/// Byte offset into the original source text, carried through from the
/// tokenizer for diagnostic location reporting.
pub type SourceOffset = usize;

/// A validated CiONom program, as handed over by the parser.
///
/// The parser is an external collaborator; programs can also cross that
/// boundary as serialized bytes via [`Program::to_bytes`] and
/// [`Program::from_bytes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Routines in declaration order. Declaration order is significant:
    /// call resolution is first-match and the routine table in the emitted
    /// bytecode preserves this order.
    pub routines: Vec<Routine>,
}

/// A named callable unit: either internal (its calls are emitted as code)
/// or external (resolved to a native implementation at run time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    pub identifier: String,

    /// Declared parameter count.
    pub parameters: usize,

    /// Body, as an ordered sequence of calls. Ignored by the emitter when
    /// `external` is set.
    pub calls: Vec<Call>,

    /// External routines get a sentinel routine-table entry instead of a
    /// code offset and are resolved through the external table by mangled
    /// identifier.
    pub external: bool,

    /// Source offset of the declaring token.
    pub offset: SourceOffset,
}

/// An invocation of a routine by identifier with word-sized immediate
/// parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub identifier: String,
    pub parameters: Vec<Word>,

    /// Source offset of the call's identifier token.
    pub offset: SourceOffset,
}

/// Identifier and declared parameter count of one routine, in routine-table
/// order.
///
/// The bytecode format carries no names or arities, so the host hands the
/// VM a symbol list alongside the buffer; [`Program::symbols`] produces it
/// for the usual emit-then-run pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub identifier: String,
    pub parameters: usize,
}

impl Program {
    pub fn new(routines: Vec<Routine>) -> Self {
        Self { routines }
    }

    /// Symbol list for the VM, in routine-table order.
    pub fn symbols(&self) -> Vec<Symbol> {
        self.routines
            .iter()
            .map(|routine| Symbol {
                identifier: routine.identifier.clone(),
                parameters: routine.parameters,
            })
            .collect()
    }

    /// Serialize for the parser boundary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Deserialize a program received from an external parser.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}

impl Routine {
    /// An internal routine with a body of calls.
    pub fn internal(
        identifier: impl Into<String>,
        parameters: usize,
        calls: Vec<Call>,
        offset: SourceOffset,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            parameters,
            calls,
            external: false,
            offset,
        }
    }

    /// An external routine declaration. Has no body.
    pub fn external(
        identifier: impl Into<String>,
        parameters: usize,
        offset: SourceOffset,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            parameters,
            calls: Vec::new(),
            external: true,
            offset,
        }
    }
}

impl Call {
    pub fn new(identifier: impl Into<String>, parameters: Vec<Word>, offset: SourceOffset) -> Self {
        Self {
            identifier: identifier.into(),
            parameters,
            offset,
        }
    }
}
