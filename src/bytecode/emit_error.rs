#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    /// A call names a routine that does not exist in the program. Carries
    /// the source location computed from the call's byte offset.
    UnresolvedCall {
        identifier: String,
        file: String,
        line: usize,
        column: usize,
    },

    /// Allocation failure while building the output buffer.
    OutOfMemory,
}

impl EmitError {
    pub fn unresolved(identifier: &str, file: &str, line: usize, column: usize) -> Self {
        EmitError::UnresolvedCall {
            identifier: identifier.to_string(),
            file: file.to_string(),
            line,
            column,
        }
    }
}

impl std::fmt::Display for EmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmitError::UnresolvedCall {
                identifier,
                file,
                line,
                column,
            } => {
                write!(
                    f,
                    "emit error: unknown routine identifier `{}` in {}:{}:{}",
                    identifier, file, line, column
                )
            }
            EmitError::OutOfMemory => {
                write!(f, "emit error: out of memory while building bytecode")
            }
        }
    }
}

impl std::error::Error for EmitError {}
