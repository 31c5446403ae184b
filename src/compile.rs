//! End-to-end compilation pipeline.
//!
//! Drives lex → parse → resolve → check → borrow → lower over a single
//! merged source buffer (the import loader concatenates files before the
//! core runs) and owns the arena and interner for the duration. The
//! result is the durable [`ProgramIR`](crate::mir::ProgramIR) plus any
//! checker warnings; failures come back as a [`CompileError`] carrying
//! the rendered diagnostic line.

use std::fmt;
use std::fs;
use std::path::Path;

use crate::arena::Arena;
use crate::borrow::borrow_check;
use crate::checker::check_program;
use crate::intern::Interner;
use crate::lexer::tokenize;
use crate::lower::lower;
use crate::mir::ProgramIR;
use crate::parser::parse;
use crate::resolver::resolve_names;

#[derive(Debug)]
pub struct CompiledProgram {
    pub ir: ProgramIR,
    /// Non-fatal checker warnings, already rendered.
    pub warnings: Vec<String>,
}

#[derive(Debug)]
pub enum CompileError {
    /// A pipeline diagnostic, rendered as
    /// `"{file}:{line}:{col}: error[{code}]: {message}"`.
    Compile(String),
    Io(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Compile(message) => write!(f, "{message}"),
            CompileError::Io(message) => write!(f, "IO error: {message}"),
        }
    }
}

impl std::error::Error for CompileError {}

/// Compiles one source buffer down to IR.
pub fn compile_source(source: &str, file: &str) -> Result<CompiledProgram, CompileError> {
    let mut interner = Interner::new();
    let arena = Arena::new();
    let tokens = tokenize(source, file, &mut interner)
        .map_err(|d| CompileError::Compile(d.render(&interner)))?;
    let program =
        parse(tokens, &arena, &interner).map_err(|d| CompileError::Compile(d.render(&interner)))?;
    let program = arena.alloc(program);
    let resolution = resolve_names(program, &interner)
        .map_err(|d| CompileError::Compile(d.render(&interner)))?;
    let typed = check_program(program, &resolution, &interner)
        .map_err(|d| CompileError::Compile(d.render(&interner)))?;
    borrow_check(&typed, &interner).map_err(|d| CompileError::Compile(d.render(&interner)))?;
    let ir = lower(&typed, &interner).map_err(|d| CompileError::Compile(d.render(&interner)))?;
    Ok(CompiledProgram { ir, warnings: typed.warnings })
}

/// Reads a `.mdr` file and compiles it.
pub fn compile_file(path: &Path) -> Result<CompiledProgram, CompileError> {
    let source = fs::read_to_string(path).map_err(|e| CompileError::Io(e.to_string()))?;
    compile_source(&source, &path.to_string_lossy())
}
