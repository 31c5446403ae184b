//! SSA intermediate representation: the compiler's durable output.
//!
//! Everything here is string-named (`%t0` values, `then_1` blocks,
//! stringified enum keys), so the IR stands alone once the AST and
//! interner are gone. A backend lowers it to machine code; `serde`
//! serialization and a textual `Display` dump are provided for hand-off
//! and golden tests.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::types::Type;

#[derive(Debug, Clone, Serialize)]
pub enum Instr {
    Const {
        target: String,
        value: String,
        ty: Type,
    },
    Alias {
        target: String,
        source: String,
    },
    BinOp {
        target: String,
        op: String,
        left: String,
        right: String,
        ty: Type,
    },
    Call {
        target: Option<String>,
        name: String,
        args: Vec<String>,
        ret_ty: Type,
    },
    /// Builds a tagged-union value: tag `variant_index` plus one encoded
    /// 64-bit slot per field.
    EnumConstruct {
        target: String,
        enum_key: String,
        variant_index: u32,
        fields: Vec<String>,
        field_types: Vec<Type>,
    },
    /// Reads the 32-bit tag of an enum value.
    EnumTag {
        target: String,
        source: String,
        enum_key: String,
    },
    /// Reads payload slot `field_index`, decoded as `field_ty`.
    EnumField {
        target: String,
        source: String,
        enum_key: String,
        field_index: u32,
        field_ty: Type,
    },
    Phi {
        target: String,
        incomings: Vec<(String, String)>,
        ty: Type,
    },
}

#[derive(Debug, Clone, Serialize)]
pub enum Terminator {
    Branch { target: String },
    CondBranch { cond: String, then_bb: String, else_bb: String },
    Return { value: Option<String> },
}

#[derive(Debug, Clone, Serialize)]
pub struct BasicBlock {
    pub name: String,
    pub instructions: Vec<Instr>,
    /// `None` only while the block is under construction; lowering
    /// finalization guarantees every emitted block has exactly one.
    pub terminator: Option<Terminator>,
}

impl BasicBlock {
    pub fn new(name: String) -> Self {
        BasicBlock { name, instructions: Vec::new(), terminator: None }
    }
}

/// Per-variant slice of an [`EnumLayout`].
#[derive(Debug, Clone, Serialize)]
pub struct VariantLayout {
    pub name: String,
    pub index: u32,
    pub field_types: Vec<Type>,
}

/// Tagged-union layout: one 32-bit tag at slot 0 followed by
/// `payload_slots` uniform 64-bit slots (the widest variant's arity).
/// Slot encoding: `Int` as-is, `Bool`/`Char` zero-extended, `Float`
/// bit-cast, `String` pointer cast to integer.
#[derive(Debug, Clone, Serialize)]
pub struct EnumLayout {
    pub key: String,
    pub variants: Vec<VariantLayout>,
    pub payload_slots: usize,
}

impl EnumLayout {
    pub fn variant(&self, name: &str) -> Option<&VariantLayout> {
        self.variants.iter().find(|v| v.name == name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionIR {
    pub name: String,
    pub params: Vec<(String, Type)>,
    /// Declared return type. Backend contract: the function named `main`
    /// is emitted with a 32-bit integer return type regardless, its return
    /// value truncated at the `Return` site.
    pub return_type: Type,
    pub entry: String,
    /// Blocks in creation order; names are unique within the function.
    pub blocks: Vec<BasicBlock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgramIR {
    /// Functions in source order.
    pub functions: Vec<FunctionIR>,
    /// Layouts for every enum key the program uses, sorted by key.
    pub enums: BTreeMap<String, EnumLayout>,
}

impl ProgramIR {
    pub fn function(&self, name: &str) -> Option<&FunctionIR> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Const { target, value, ty } => write!(f, "{target} = const {value} : {ty}"),
            Instr::Alias { target, source } => write!(f, "{target} = {source}"),
            Instr::BinOp { target, op, left, right, ty } => {
                write!(f, "{target} = {op} {left}, {right} : {ty}")
            }
            Instr::Call { target: Some(target), name, args, ret_ty } => {
                write!(f, "{target} = call {name}({}) : {ret_ty}", args.join(", "))
            }
            Instr::Call { target: None, name, args, .. } => {
                write!(f, "call {name}({})", args.join(", "))
            }
            Instr::EnumConstruct { target, enum_key, variant_index, fields, .. } => {
                write!(
                    f,
                    "{target} = enum.construct {enum_key}#{variant_index}({})",
                    fields.join(", ")
                )
            }
            Instr::EnumTag { target, source, enum_key } => {
                write!(f, "{target} = enum.tag {source} : {enum_key}")
            }
            Instr::EnumField { target, source, enum_key, field_index, field_ty } => {
                write!(f, "{target} = enum.field {source}.{field_index} : {enum_key} as {field_ty}")
            }
            Instr::Phi { target, incomings, ty } => {
                write!(f, "{target} = phi ")?;
                for (i, (block, value)) in incomings.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "[{block}: {value}]")?;
                }
                write!(f, " : {ty}")
            }
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Branch { target } => write!(f, "br {target}"),
            Terminator::CondBranch { cond, then_bb, else_bb } => {
                write!(f, "condbr {cond}, {then_bb}, {else_bb}")
            }
            Terminator::Return { value: Some(value) } => write!(f, "ret {value}"),
            Terminator::Return { value: None } => write!(f, "ret void"),
        }
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.name)?;
        for instr in &self.instructions {
            writeln!(f, "  {instr}")?;
        }
        match &self.terminator {
            Some(term) => writeln!(f, "  {term}"),
            None => writeln!(f, "  <unterminated>"),
        }
    }
}

impl fmt::Display for FunctionIR {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}(", self.name)?;
        for (i, (name, ty)) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {ty}")?;
        }
        writeln!(f, ") -> {} {{", self.return_type)?;
        for block in &self.blocks {
            write!(f, "{block}")?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for ProgramIR {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, layout) in &self.enums {
            write!(f, "enum {key} [{} slots]:", layout.payload_slots)?;
            for variant in &layout.variants {
                write!(f, " {}#{}({})", variant.name, variant.index, variant.field_types.len())?;
            }
            writeln!(f)?;
        }
        for func in &self.functions {
            write!(f, "{func}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> BasicBlock {
        BasicBlock {
            name: "entry_0".to_string(),
            instructions: vec![
                Instr::Const { target: "%t0".to_string(), value: "0".to_string(), ty: Type::int() },
            ],
            terminator: Some(Terminator::Return { value: Some("%t0".to_string()) }),
        }
    }

    #[test]
    fn display_dumps_blocks_in_order() {
        let func = FunctionIR {
            name: "main".to_string(),
            params: vec![],
            return_type: Type::int(),
            entry: "entry_0".to_string(),
            blocks: vec![sample_block()],
        };
        let text = func.to_string();
        assert!(text.contains("fn main() -> Int {"));
        assert!(text.contains("entry_0:"));
        assert!(text.contains("%t0 = const 0 : Int"));
        assert!(text.contains("ret %t0"));
    }

    #[test]
    fn layout_lookup_by_variant_name() {
        let layout = EnumLayout {
            key: "Option[Int]".to_string(),
            variants: vec![
                VariantLayout {
                    name: "Some".to_string(),
                    index: 0,
                    field_types: vec![Type::int()],
                },
                VariantLayout { name: "None".to_string(), index: 1, field_types: vec![] },
            ],
            payload_slots: 1,
        };
        assert_eq!(layout.variant("None").map(|v| v.index), Some(1));
        assert!(layout.variant("Ok").is_none());
    }

    #[test]
    fn program_serializes_to_json() {
        let program = ProgramIR {
            functions: vec![FunctionIR {
                name: "main".to_string(),
                params: vec![],
                return_type: Type::int(),
                entry: "entry_0".to_string(),
                blocks: vec![sample_block()],
            }],
            enums: BTreeMap::new(),
        };
        let json = program.to_json().expect("serialize");
        assert!(json.contains("\"entry\": \"entry_0\""));
        assert!(json.contains("\"main\""));
    }
}
