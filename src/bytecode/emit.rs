use log::error;

use crate::ast::Program;
use crate::bytecode::emit_error::EmitError;
use crate::bytecode::op::{EXTERNAL_ROUTINE, Opcode, WORD_SIZE, Word};

/// Translate a validated program into the fixed-width bytecode format.
///
/// The buffer is the routine-table header followed immediately by the code
/// section, each word in native width and host byte order, no framing. The
/// source text and file name are only consulted for diagnostic locations;
/// emission is all-or-nothing and returns no buffer on failure.
pub fn emit(program: &Program, source: &str, source_file: &str) -> Result<Vec<u8>, EmitError> {
    let mut header: Vec<Word> = Vec::new();
    header
        .try_reserve_exact(program.routines.len() + 1)
        .map_err(|_| EmitError::OutOfMemory)?;
    header.push(program.routines.len());

    let mut code: Vec<Word> = Vec::new();

    for routine in &program.routines {
        if routine.external {
            header.push(EXTERNAL_ROUTINE);
            continue;
        }
        header.push(code.len());

        // One pair per call plus one pair per parameter.
        let stride = routine.calls.len() * 2
            + routine
                .calls
                .iter()
                .map(|call| call.parameters.len() * 2)
                .sum::<usize>();
        code.try_reserve(stride).map_err(|_| EmitError::OutOfMemory)?;

        for call in &routine.calls {
            for &parameter in &call.parameters {
                code.push(Opcode::Push.word());
                code.push(parameter);
            }

            // First-match resolution against the full routine list, by
            // exact byte-wise identifier equality.
            let index = program
                .routines
                .iter()
                .position(|candidate| candidate.identifier == call.identifier)
                .ok_or_else(|| {
                    let line = line_from_offset(source, call.offset);
                    let column = column_from_offset(source, call.offset);
                    error!(
                        "unknown routine identifier `{}` in {}:{}:{}",
                        call.identifier, source_file, line, column
                    );
                    EmitError::unresolved(&call.identifier, source_file, line, column)
                })?;

            code.push(Opcode::Call.word());
            code.push(index);
        }
    }

    let mut bytecode: Vec<u8> = Vec::new();
    bytecode
        .try_reserve_exact((header.len() + code.len()) * WORD_SIZE)
        .map_err(|_| EmitError::OutOfMemory)?;
    for word in header.into_iter().chain(code) {
        bytecode.extend_from_slice(&word.to_ne_bytes());
    }

    Ok(bytecode)
}

/// 1-based line of a byte offset: one plus the newlines preceding it.
pub fn line_from_offset(source: &str, offset: usize) -> usize {
    let clamped = offset.min(source.len());
    1 + source.as_bytes()[..clamped]
        .iter()
        .filter(|&&byte| byte == b'\n')
        .count()
}

/// 1-based column of a byte offset: the distance to the preceding newline,
/// or `offset + 1` when none precedes it.
pub fn column_from_offset(source: &str, offset: usize) -> usize {
    let clamped = offset.min(source.len());
    match source.as_bytes()[..clamped]
        .iter()
        .rposition(|&byte| byte == b'\n')
    {
        Some(newline) => offset - newline,
        None => offset + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Call, Routine};
    use crate::bytecode::image::{Image, RoutineEntry};

    fn words(bytecode: &[u8]) -> Vec<Word> {
        bytecode
            .chunks_exact(WORD_SIZE)
            .map(|chunk| {
                let mut buffer = [0u8; WORD_SIZE];
                buffer.copy_from_slice(chunk);
                Word::from_ne_bytes(buffer)
            })
            .collect()
    }

    #[test]
    fn test_single_call_emission() {
        // `foo 3, 4, 0` where `foo` is routine index 0.
        let program = Program::new(vec![
            Routine::internal("foo", 3, vec![], 0),
            Routine::internal("main", 0, vec![Call::new("foo", vec![3, 4, 0], 10)], 8),
        ]);

        let bytecode = emit(&program, "foo 3;\nmain\nfoo 3, 4, 0;", "demo.cio").unwrap();
        let words = words(&bytecode);

        // Header: count, foo at offset 0, main at offset 0 (foo is empty).
        assert_eq!(&words[..3], &[2, 0, 0]);
        // Code: three pushes then the call, by table index.
        assert_eq!(
            &words[3..],
            &[
                Opcode::Push.word(),
                3,
                Opcode::Push.word(),
                4,
                Opcode::Push.word(),
                0,
                Opcode::Call.word(),
                0,
            ]
        );
        assert_eq!(bytecode.len(), 11 * WORD_SIZE);
    }

    #[test]
    fn test_header_offsets_are_nondecreasing_and_in_range() {
        let program = Program::new(vec![
            Routine::internal("a", 0, vec![Call::new("b", vec![1], 0)], 0),
            Routine::internal("b", 1, vec![Call::new("a", vec![], 4)], 2),
            Routine::internal("c", 0, vec![Call::new("b", vec![2, 3], 8)], 6),
        ]);

        let bytecode = emit(&program, "a\nb\nc\n", "demo.cio").unwrap();
        let image = Image::load(&bytecode).unwrap();

        let mut previous = 0;
        for entry in image.entries() {
            let RoutineEntry::Offset(offset) = *entry else {
                panic!("no external routines in this program");
            };
            assert!(offset >= previous);
            assert!(offset < image.code().len());
            previous = offset;
        }
    }

    #[test]
    fn test_external_routine_gets_sentinel_entry() {
        let program = Program::new(vec![
            Routine::external("print", 1, 0),
            Routine::internal("main", 0, vec![Call::new("print", vec![7], 10)], 8),
        ]);

        let bytecode = emit(&program, "print 1!\nmain\nprint 7;", "demo.cio").unwrap();
        let words = words(&bytecode);

        assert_eq!(words[0], 2);
        assert_eq!(words[1], EXTERNAL_ROUTINE);
        assert_eq!(words[2], 0);
    }

    #[test]
    fn test_duplicate_identifiers_resolve_to_first_declaration() {
        let program = Program::new(vec![
            Routine::internal("twin", 0, vec![], 0),
            Routine::internal("twin", 0, vec![], 2),
            Routine::internal("main", 0, vec![Call::new("twin", vec![], 6)], 4),
        ]);

        let bytecode = emit(&program, "twin\ntwin\nmain twin;", "demo.cio").unwrap();
        let words = words(&bytecode);

        // Call operand names routine-table index 0, the first `twin`.
        assert_eq!(&words[4..], &[Opcode::Call.word(), 0]);
    }

    #[test]
    fn test_unresolved_call_fails_with_location() {
        let source = "first 0;\nmain\nmissing 1;";
        let offset = source.find("missing").unwrap();
        let program = Program::new(vec![
            Routine::internal("first", 1, vec![], 0),
            Routine::internal("main", 0, vec![Call::new("missing", vec![1], offset)], 9),
        ]);

        let error = emit(&program, source, "demo.cio").unwrap_err();
        assert_eq!(error, EmitError::unresolved("missing", "demo.cio", 3, 1));
    }

    #[test]
    fn test_code_length_matches_per_routine_strides() {
        let program = Program::new(vec![
            Routine::internal("a", 1, vec![Call::new("b", vec![1, 2], 0)], 0),
            Routine::external("x", 0, 4),
            Routine::internal("b", 2, vec![Call::new("a", vec![3], 8), Call::new("a", vec![], 12)], 6),
        ]);

        let bytecode = emit(&program, &" ".repeat(16), "demo.cio").unwrap();
        let code_words = bytecode.len() / WORD_SIZE - (program.routines.len() + 1);

        let strides: usize = program
            .routines
            .iter()
            .filter(|routine| !routine.external)
            .map(|routine| {
                routine.calls.len() * 2
                    + routine
                        .calls
                        .iter()
                        .map(|call| call.parameters.len() * 2)
                        .sum::<usize>()
            })
            .sum();
        assert_eq!(code_words, strides);
    }

    #[test]
    fn test_empty_program_is_a_bare_header() {
        let bytecode = emit(&Program::new(vec![]), "", "empty.cio").unwrap();
        assert_eq!(words(&bytecode), vec![0]);
    }

    #[test]
    fn test_line_and_column_from_offset() {
        let source = "one\ntwo\nthree";

        assert_eq!(line_from_offset(source, 0), 1);
        assert_eq!(column_from_offset(source, 0), 1);

        // Offset of 't' in "two".
        assert_eq!(line_from_offset(source, 4), 2);
        assert_eq!(column_from_offset(source, 4), 1);

        // Offset of 'h' in "three".
        assert_eq!(line_from_offset(source, 9), 3);
        assert_eq!(column_from_offset(source, 9), 2);

        // No preceding newline: column is offset + 1.
        assert_eq!(column_from_offset("abc", 2), 3);
    }
}
