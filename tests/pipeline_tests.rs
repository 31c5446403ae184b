//! End-to-end pipeline scenarios: full programs through all six passes,
//! asserted against the produced IR.

mod common;

use common::{assert_all_blocks_terminated, compile, err_code};
use midori::mir::{Instr, Terminator};

#[test]
fn hello_world_prints_and_exits_zero() {
    let ir = compile("fn main() -> Int { print(\"hello\"); 0 }");
    assert_all_blocks_terminated(&ir);
    let main = ir.function("main").expect("main");
    let entry = &main.blocks[0];
    let has_print = entry.instructions.iter().any(|i| {
        matches!(i, Instr::Call { name, target: None, .. } if name == "print")
    });
    assert!(has_print, "expected a print call in {entry}");
    let has_hello = entry.instructions.iter().any(|i| {
        matches!(i, Instr::Const { value, .. } if value == "\"hello\"")
    });
    assert!(has_hello, "expected the string constant in {entry}");
    match &entry.terminator {
        Some(Terminator::Return { value: Some(_) }) => {}
        other => panic!("expected value return, got {other:?}"),
    }
}

#[test]
fn enum_match_extracts_payload() {
    let ir = compile(
        "enum Token {\n  Int(value: Int)\n  Plus\n}\n\nfn value(t: Token) -> Int {\n  match t {\n    Int(v) => v,\n    Plus => 0,\n  }\n}\n\nfn main() -> Int {\n  print(value(Int(7)))\n  0\n}",
    );
    assert_all_blocks_terminated(&ir);
    let layout = &ir.enums["Token"];
    assert_eq!(layout.payload_slots, 1);
    assert_eq!(layout.variants.len(), 2);

    let value_fn = ir.function("value").expect("value fn");
    let tags = value_fn
        .blocks
        .iter()
        .flat_map(|b| &b.instructions)
        .filter(|i| matches!(i, Instr::EnumTag { enum_key, .. } if enum_key == "Token"))
        .count();
    assert_eq!(tags, 2, "one tag read per tested variant");
    let extracts_payload = value_fn.blocks.iter().flat_map(|b| &b.instructions).any(|i| {
        matches!(i, Instr::EnumField { enum_key, field_index: 0, .. } if enum_key == "Token")
    });
    assert!(extracts_payload);

    let main = ir.function("main").expect("main");
    let constructs = main.blocks.iter().flat_map(|b| &b.instructions).any(|i| {
        matches!(i, Instr::EnumConstruct { enum_key, variant_index: 0, .. } if enum_key == "Token")
    });
    assert!(constructs, "Int(7) lowers to an enum construction");
}

#[test]
fn result_try_lowers_to_explicit_blocks() {
    let ir = compile(
        "fn may(f: Bool) -> Result[Int, String] {\n  if f { Ok(41) } else { Err(\"boom\") }\n}\nfn compute(f: Bool) -> Result[Int, String] {\n  let v := may(f)?\n  Ok(v + 1)\n}\nfn main() -> Int {\n  match compute(true) { Ok(v) => print(v), Err(e) => print(e) }\n  match compute(false) { Ok(v) => print(v), Err(e) => print(e) }\n  0\n}",
    );
    assert_all_blocks_terminated(&ir);
    assert!(ir.enums.contains_key("Result[Int, String]"));

    let compute = ir.function("compute").expect("compute");
    let ok_block = compute.blocks.iter().find(|b| b.name.starts_with("try_ok")).expect("try_ok");
    let err_block = compute.blocks.iter().find(|b| b.name.starts_with("try_err")).expect("try_err");
    // The error path returns the operand unchanged.
    assert!(matches!(&err_block.terminator, Some(Terminator::Return { value: Some(_) })));
    let extracts = ok_block.instructions.iter().any(|i| {
        matches!(i, Instr::EnumField { field_index: 0, enum_key, .. } if enum_key == "Result[Int, String]")
    });
    assert!(extracts, "ok path extracts the payload: {ok_block}");
}

#[test]
fn use_after_move_is_rejected() {
    let code = err_code("fn main() -> Int { let s: String = \"x\"\n let t := s\n print(s)\n 0 }");
    assert_eq!(code, "MD4001");
}

#[test]
fn bool_match_without_both_literals_is_rejected() {
    let code = err_code("fn main() -> Int { match true { true => 1 } }");
    assert_eq!(code, "MD3100");
}

#[test]
fn try_on_int_is_rejected() {
    let code = err_code("fn main() -> Int { let x := 1? \n x }");
    assert_eq!(code, "MD3105");
}

#[test]
fn same_source_compiles_to_identical_ir() {
    let source = "enum Pair { Both(a: Int, b: Bool), One(v: Int), Empty }\nfn score(p: Pair) -> Int {\n  match p {\n    Both(x, y) => if y { x } else { 0 },\n    One(v) => v,\n    Empty => 0,\n  }\n}\nfn main() -> Int {\n  let p := Both(4, true)\n  print(score(p))\n  0\n}";
    let first = compile(source).to_json().expect("json");
    let second = compile(source).to_json().expect("json");
    assert_eq!(first, second);
}

#[test]
fn every_value_expression_is_typed() {
    use midori::ast::{Expr, ExprKind, StmtKind};
    use midori::{check_program, parse, resolve_names, tokenize, Arena, Interner};

    let source = "enum T { A(v: Int), B }\nfn pick(t: T) -> Int {\n  match t {\n    A(v) => v + 1,\n    B => if true { 1 } else { 2 },\n  }\n}\nfn main() -> Int { pick(A(3)) }";
    let arena = Arena::new();
    let mut interner = Interner::new();
    let tokens = tokenize(source, "typed.mdr", &mut interner).expect("lex");
    let program = parse(tokens, &arena, &interner).expect("parse");
    let program = arena.alloc(program);
    let resolution = resolve_names(program, &interner).expect("resolve");
    let typed = check_program(program, &resolution, &interner).expect("check");

    fn collect<'a>(expr: &'a Expr<'a>, out: &mut Vec<&'a Expr<'a>>) {
        // Structural blocks (function bodies, if-branches) are typed via
        // their tails, not as nodes; skip the block node itself.
        if !matches!(expr.kind, ExprKind::Block(_)) {
            out.push(expr);
        }
        match &expr.kind {
            ExprKind::Literal { .. } | ExprKind::Ident(_) => {}
            ExprKind::Unary { operand, .. } => collect(operand, out),
            ExprKind::Binary { left, right, .. } => {
                collect(left, out);
                collect(right, out);
            }
            ExprKind::Assign { value, .. } => collect(value, out),
            ExprKind::Call { args, .. } => {
                for arg in *args {
                    collect(arg, out);
                }
            }
            ExprKind::If { cond, then_block, else_branch } => {
                collect(cond, out);
                collect(then_block, out);
                if let Some(els) = else_branch {
                    collect(els, out);
                }
            }
            ExprKind::Match { scrutinee, arms } => {
                collect(scrutinee, out);
                for arm in *arms {
                    collect(arm.body, out);
                }
            }
            ExprKind::Block(block) => {
                for stmt in block.stmts {
                    match &stmt.kind {
                        StmtKind::Let { value, .. } => collect(value, out),
                        StmtKind::Return(Some(value)) | StmtKind::Break(Some(value)) => {
                            collect(value, out)
                        }
                        StmtKind::Expr(expr) => collect(expr, out),
                        _ => {}
                    }
                }
                if let Some(tail) = block.tail {
                    collect(tail, out);
                }
            }
            ExprKind::Range { start, end, .. } => {
                collect(start, out);
                collect(end, out);
            }
            ExprKind::Try(operand)
            | ExprKind::Unsafe(operand)
            | ExprKind::Spawn(operand)
            | ExprKind::Await(operand) => collect(operand, out),
            ExprKind::Raise { message, .. } => collect(message, out),
            ExprKind::StructInit { fields, .. } => {
                for field in *fields {
                    collect(field.value, out);
                }
            }
        }
    }

    for func in &typed.functions {
        let mut exprs = Vec::new();
        collect(func.decl.body, &mut exprs);
        for expr in exprs {
            assert!(
                func.expr_types.contains_key(&expr.id),
                "untyped expression at {:?}",
                expr.span
            );
        }
    }
}

#[test]
fn option_specializations_get_their_own_layouts() {
    let ir = compile(
        "fn maybe(flag: Bool) -> Option[Int] {\n  if flag { Some(3) } else { None() }\n}\nfn main() -> Int {\n  let v := maybe(true)\n  match v {\n    Some(x) => x,\n    None => 0,\n  }\n}",
    );
    assert_all_blocks_terminated(&ir);
    let layout = &ir.enums["Option[Int]"];
    assert_eq!(layout.payload_slots, 1);
    assert_eq!(layout.variant("Some").map(|v| v.index), Some(0));
    assert_eq!(layout.variant("None").map(|v| v.index), Some(1));
}

#[test]
fn raise_lowers_to_err_construction() {
    let ir = compile(
        "error Overflow\nfn fail() -> Result[Int, String] {\n  raise Overflow(\"too big\")\n}\nfn main() -> Int {\n  match fail() { Ok(v) => print(v), Err(e) => print(e) }\n  0\n}",
    );
    assert_all_blocks_terminated(&ir);
    let fail = ir.function("fail").expect("fail");
    let raises = fail.blocks.iter().flat_map(|b| &b.instructions).any(|i| {
        matches!(
            i,
            Instr::EnumConstruct { enum_key, variant_index: 1, .. }
                if enum_key == "Result[Int, String]"
        )
    });
    assert!(raises, "raise constructs the Err variant");
    let message = fail.blocks.iter().flat_map(|b| &b.instructions).any(|i| {
        matches!(i, Instr::Const { value, .. } if value == "\"Overflow: too big\"")
    });
    assert!(message, "raise message carries the error kind");
    // Raising terminates the path: the entry block returns the Err value.
    assert!(matches!(
        &fail.blocks[0].terminator,
        Some(Terminator::Return { value: Some(_) })
    ));
}
