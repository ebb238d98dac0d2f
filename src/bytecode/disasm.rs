use std::fmt::Write;

use crate::bytecode::image::{Image, RoutineEntry};
use crate::bytecode::op::Opcode;

/// Render a loaded image as text: the routine table first, then the code
/// section with one opcode/operand pair per line.
pub fn disassemble(image: &Image) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "routines: {}", image.routine_count());
    for (index, entry) in image.entries().iter().enumerate() {
        match entry {
            RoutineEntry::Offset(offset) => {
                let _ = writeln!(out, "  {:04} @ {}", index, offset);
            }
            RoutineEntry::External => {
                let _ = writeln!(out, "  {:04} external", index);
            }
        }
    }

    let code = image.code();
    let _ = writeln!(out, "code: {} words", code.len());
    for (pair, words) in code.chunks_exact(2).enumerate() {
        let offset = pair * 2;
        match Opcode::try_from(words[0]) {
            Ok(Opcode::Push) => {
                let _ = writeln!(out, "  {:04} push {}", offset, words[1]);
            }
            Ok(Opcode::Call) => {
                let _ = writeln!(out, "  {:04} call {}", offset, words[1]);
            }
            Err(word) => {
                let _ = writeln!(out, "  {:04} ???? {:#x} {}", offset, word, words[1]);
            }
        }
    }

    out
}

/// Print disassembly to stdout.
pub fn print_image(image: &Image) {
    print!("{}", disassemble(image));
}
