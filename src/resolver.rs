//! Name resolution: one pass over top-level items.
//!
//! Collects functions, enums (with a variant reverse index), and custom
//! error names, rejecting duplicates within each category and requiring a
//! `main` entry point. Inner scopes are not resolved here; the type
//! checker does its own lexical scoping.

use std::collections::{HashMap, HashSet};

use crate::ast::{EnumDecl, FunctionDecl, Item, Program, StructField};
use crate::diagnostic::Diagnostic;
use crate::intern::{Interner, Symbol};

#[derive(Clone, Copy)]
pub struct FunctionSymbol<'a> {
    pub name: Symbol,
    pub decl: &'a FunctionDecl<'a>,
}

#[derive(Clone, Copy)]
pub struct EnumVariantSymbol<'a> {
    pub name: Symbol,
    pub index: u32,
    pub fields: &'a [StructField<'a>],
}

#[derive(Clone)]
pub struct EnumSymbol<'a> {
    pub name: Symbol,
    pub decl: &'a EnumDecl<'a>,
    pub variants: HashMap<Symbol, EnumVariantSymbol<'a>>,
}

pub struct Resolution<'a> {
    pub functions: HashMap<Symbol, FunctionSymbol<'a>>,
    pub enums: HashMap<Symbol, EnumSymbol<'a>>,
    pub errors: HashSet<Symbol>,
    /// Reverse index: variant name to every `(enum, variant)` declaring it.
    /// The checker uses it to resolve bare variant constructors.
    pub variants_by_name: HashMap<Symbol, Vec<(Symbol, EnumVariantSymbol<'a>)>>,
}

pub fn resolve_names<'a>(
    program: &'a Program<'a>,
    interner: &Interner,
) -> Result<Resolution<'a>, Diagnostic> {
    let mut functions = HashMap::new();
    let mut enums: HashMap<Symbol, EnumSymbol<'a>> = HashMap::new();
    let mut errors = HashSet::new();
    let mut variants_by_name: HashMap<Symbol, Vec<(Symbol, EnumVariantSymbol<'a>)>> =
        HashMap::new();

    for item in program.items {
        match item {
            Item::Function(decl) => {
                if functions.contains_key(&decl.name) {
                    return Err(Diagnostic::error(
                        decl.span,
                        "MD3001",
                        format!("duplicate function '{}'", interner.resolve(decl.name)),
                    )
                    .with_hint("rename one declaration"));
                }
                functions.insert(decl.name, FunctionSymbol { name: decl.name, decl });
            }
            Item::Enum(decl) => {
                if enums.contains_key(&decl.name) {
                    return Err(Diagnostic::error(
                        decl.span,
                        "MD3002",
                        format!("duplicate enum '{}'", interner.resolve(decl.name)),
                    )
                    .with_hint("rename one declaration"));
                }
                let mut variants = HashMap::new();
                for (index, variant) in decl.variants.iter().enumerate() {
                    if variants.contains_key(&variant.name) {
                        return Err(Diagnostic::error(
                            variant.span,
                            "MD3003",
                            format!(
                                "duplicate enum variant '{}' in enum '{}'",
                                interner.resolve(variant.name),
                                interner.resolve(decl.name)
                            ),
                        )
                        .with_hint("rename one variant"));
                    }
                    let sym = EnumVariantSymbol {
                        name: variant.name,
                        index: index as u32,
                        fields: variant.fields,
                    };
                    variants.insert(variant.name, sym);
                    variants_by_name.entry(variant.name).or_default().push((decl.name, sym));
                }
                enums.insert(decl.name, EnumSymbol { name: decl.name, decl, variants });
            }
            Item::Error(decl) => {
                if errors.contains(&decl.name) {
                    return Err(Diagnostic::error(
                        decl.span,
                        "MD3005",
                        format!("duplicate custom error '{}'", interner.resolve(decl.name)),
                    )
                    .with_hint("rename one custom error declaration"));
                }
                errors.insert(decl.name);
            }
            // Structs and traits are parse-only in this core; imports are
            // stitched by the driver before the core runs.
            Item::Struct(_) | Item::Trait(_) | Item::ExternFunction(_) | Item::Import(_) => {}
        }
    }

    let has_main = interner.get("main").map_or(false, |sym| functions.contains_key(&sym));
    if !has_main {
        return Err(Diagnostic::error(
            program.span,
            "MD3004",
            "missing entry point function 'main'",
        )
        .with_hint("add `fn main() -> Int { ... }`"));
    }

    Ok(Resolution { functions, enums, errors, variants_by_name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn resolve_source(source: &str) -> Result<(), &'static str> {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let tokens = tokenize(source, "resolve.mdr", &mut interner).map_err(|d| d.code)?;
        let program = parse(tokens, &arena, &interner).map_err(|d| d.code)?;
        let program = arena.alloc(program);
        resolve_names(program, &interner).map(|_| ()).map_err(|d| d.code)
    }

    #[test]
    fn valid_program_resolves() {
        assert_eq!(
            resolve_source("enum T { A, B }\nerror Fail\nfn main() -> Int { 0 }"),
            Ok(())
        );
    }

    #[test]
    fn duplicate_function_is_md3001() {
        assert_eq!(
            resolve_source("fn main() -> Int { 0 }\nfn main() -> Int { 1 }"),
            Err("MD3001")
        );
    }

    #[test]
    fn duplicate_enum_is_md3002() {
        assert_eq!(
            resolve_source("enum T { A }\nenum T { B }\nfn main() -> Int { 0 }"),
            Err("MD3002")
        );
    }

    #[test]
    fn duplicate_variant_is_md3003() {
        assert_eq!(
            resolve_source("enum T { A, A }\nfn main() -> Int { 0 }"),
            Err("MD3003")
        );
    }

    #[test]
    fn missing_main_is_md3004() {
        assert_eq!(resolve_source("fn helper() -> Int { 0 }"), Err("MD3004"));
    }

    #[test]
    fn duplicate_error_is_md3005() {
        assert_eq!(
            resolve_source("error Fail\nerror Fail\nfn main() -> Int { 0 }"),
            Err("MD3005")
        );
    }

    #[test]
    fn variant_reverse_index_spans_enums() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let tokens = tokenize(
            "enum A { V }\nenum B { V }\nfn main() -> Int { 0 }",
            "index.mdr",
            &mut interner,
        )
        .expect("lex");
        let program = parse(tokens, &arena, &interner).expect("parse");
        let program = arena.alloc(program);
        let resolution = resolve_names(program, &interner).expect("resolve");
        let v = interner.get("V").expect("interned");
        assert_eq!(resolution.variants_by_name[&v].len(), 2);
    }
}
