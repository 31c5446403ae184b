//! # midori
//!
//! Compiler core for the Midori language (`.mdr`): a small statically
//! typed, ownership-checked systems language. The core accepts a merged
//! source buffer and produces a verified, typed SSA IR with a
//! tagged-union layout table, ready for an SSA-based backend to lower to
//! machine code.
//!
//! Five passes run in a strict line, each consuming the previous pass's
//! output and aborting on the first diagnostic:
//!
//! 1. [`tokenize`]: bytes to spanned tokens
//! 2. [`parse`]: tokens to an arena-allocated AST
//! 3. [`resolve_names`]: top-level symbols, duplicates, entry point
//! 4. [`check_program`]: types, exhaustiveness, monomorphization
//! 5. [`borrow_check`]: move/borrow/alias legality
//! 6. [`lower`]: typed AST to basic-block SSA [`ProgramIR`]
//!
//! [`compile_source`] and [`compile_file`] wrap the whole line and own
//! the supporting arena and interner.
//!
//! # Example
//!
//! ```
//! let compiled = midori::compile_source(
//!     "fn main() -> Int { print(\"hello\"); 0 }",
//!     "hello.mdr",
//! )
//! .expect("compiles");
//! assert!(compiled.ir.function("main").is_some());
//! ```
//!
//! The driver, import stitching, formatter, backend emission, and linking
//! are external collaborators; this crate is the verification and
//! lowering core only.

pub mod arena;
pub mod ast;
pub mod borrow;
pub mod checker;
pub mod compile;
pub mod diagnostic;
pub mod intern;
pub mod lexer;
pub mod lower;
pub mod mir;
pub mod parser;
pub mod resolver;
pub mod span;
pub mod token;
pub mod types;

pub use arena::Arena;
pub use borrow::borrow_check;
pub use checker::{check_program, EnumInfo, TypedFunction, TypedProgram};
pub use compile::{compile_file, compile_source, CompileError, CompiledProgram};
pub use diagnostic::{Diagnostic, Severity};
pub use intern::{Interner, Symbol};
pub use lexer::tokenize;
pub use lower::lower;
pub use mir::{BasicBlock, EnumLayout, FunctionIR, Instr, ProgramIR, Terminator};
pub use parser::{parse, Parser};
pub use resolver::{resolve_names, Resolution};
pub use span::Span;
pub use token::{Token, TokenKind};
pub use types::{Type, TypeName};
