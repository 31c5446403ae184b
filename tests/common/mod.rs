#![allow(dead_code)]

use midori::compile_source;
use midori::mir::ProgramIR;

pub fn compile(source: &str) -> ProgramIR {
    match compile_source(source, "test.mdr") {
        Ok(compiled) => compiled.ir,
        Err(err) => panic!("compile failed: {err}"),
    }
}

pub fn compile_err(source: &str) -> String {
    match compile_source(source, "test.mdr") {
        Ok(_) => panic!("expected a diagnostic, program compiled"),
        Err(err) => err.to_string(),
    }
}

/// Extracts the `MDxxxx` code from a rendered diagnostic line.
pub fn err_code(source: &str) -> String {
    let text = compile_err(source);
    let start = text.find("error[").expect("rendered diagnostic has a code") + "error[".len();
    text[start..start + 6].to_string()
}

/// Every block of every function must carry exactly one terminator.
pub fn assert_all_blocks_terminated(ir: &ProgramIR) {
    for func in &ir.functions {
        for block in &func.blocks {
            assert!(
                block.terminator.is_some(),
                "block {} in {} lacks a terminator",
                block.name,
                func.name
            );
        }
    }
}
