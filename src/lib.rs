//! Back end for the CiONom call-oriented language: bytecode emission from a
//! validated AST, identifier mangling for native linkage, and the virtual
//! machine that loads and executes the bytecode.
//!
//! Tokenizing and parsing are external collaborators; this crate starts at
//! the AST (see [`ast`]) and ends at an executed [`vm::Vm`] instance.

pub mod ast;
pub mod bytecode;
pub mod mangle;
pub mod vm;

pub use ast::{Call, Program, Routine, Symbol};
pub use bytecode::{EmitError, Image, LoadError, emit};
pub use mangle::{MangleError, mangle};
pub use vm::{ExecError, ExternalTable, State, Vm};
