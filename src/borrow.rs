//! Ownership and borrow analysis over the typed AST.
//!
//! Each variable carries `{moved, imm_borrows, mut_borrow}`; rules are
//! evaluated left to right. Binding or passing a non-copy value moves it;
//! `&x` stacks shared borrows, `&mut x` demands exclusivity, and borrows
//! are released at the end of the block that took them. Branch bodies run
//! against clones of the entry state and merge with the conservative
//! union, so a move on either side of an `if` poisons the variable after
//! the join.
//!
//! Borrow operators only inspect identifier operands; borrowing any other
//! expression is a no-op for the analysis, though its subexpressions are
//! still traversed.

use std::collections::HashMap;

use crate::ast::{Block, Expr, ExprId, ExprKind, Pattern, PatternKind, Stmt, StmtKind, UnOp};
use crate::checker::TypedProgram;
use crate::diagnostic::Diagnostic;
use crate::intern::{Interner, Symbol};
use crate::span::Span;
use crate::types::Type;

pub fn borrow_check(typed: &TypedProgram<'_>, interner: &Interner) -> Result<(), Diagnostic> {
    for func in &typed.functions {
        let mut states = HashMap::new();
        for p in func.decl.params {
            states.insert(p.name, VarState::default());
        }
        let mut checker = BorrowChecker { expr_types: &func.expr_types, interner, states };
        if let ExprKind::Block(body) = &func.decl.body.kind {
            checker.check_block(body)?;
        }
    }
    Ok(())
}

#[derive(Clone, Default)]
struct VarState {
    moved: bool,
    imm_borrows: u32,
    mut_borrow: bool,
}

#[derive(Clone, Copy)]
enum BorrowKind {
    Shared,
    Exclusive,
}

/// Per-block bookkeeping: borrows to release and shadowed bindings to
/// restore when the block ends.
#[derive(Default)]
struct Frame {
    released: Vec<(Symbol, BorrowKind)>,
    declared: Vec<(Symbol, Option<VarState>)>,
}

struct BorrowChecker<'ctx> {
    expr_types: &'ctx HashMap<ExprId, Type>,
    interner: &'ctx Interner,
    states: HashMap<Symbol, VarState>,
}

impl<'ctx> BorrowChecker<'ctx> {
    fn check_block(&mut self, block: &Block<'_>) -> Result<(), Diagnostic> {
        let mut frame = Frame::default();
        let result = self.run_block(block, &mut frame);
        for (name, kind) in frame.released {
            if let Some(state) = self.states.get_mut(&name) {
                match kind {
                    BorrowKind::Shared => state.imm_borrows = state.imm_borrows.saturating_sub(1),
                    BorrowKind::Exclusive => state.mut_borrow = false,
                }
            }
        }
        for (name, prev) in frame.declared.into_iter().rev() {
            match prev {
                Some(state) => {
                    self.states.insert(name, state);
                }
                None => {
                    self.states.remove(&name);
                }
            }
        }
        result
    }

    fn run_block(&mut self, block: &Block<'_>, frame: &mut Frame) -> Result<(), Diagnostic> {
        for stmt in block.stmts {
            self.visit_stmt(stmt, frame)?;
        }
        if let Some(tail) = block.tail {
            self.visit_expr(tail, frame)?;
        }
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &Stmt<'_>, frame: &mut Frame) -> Result<(), Diagnostic> {
        match &stmt.kind {
            StmtKind::Let { name, value, .. } => {
                self.visit_expr(value, frame)?;
                self.move_if_non_copy(value);
                let prev = self.states.insert(*name, VarState::default());
                frame.declared.push((*name, prev));
                Ok(())
            }
            StmtKind::Return(value) | StmtKind::Break(value) => {
                if let Some(value) = value {
                    self.visit_expr(value, frame)?;
                }
                Ok(())
            }
            StmtKind::Continue => Ok(()),
            StmtKind::Expr(expr) => self.visit_expr(expr, frame),
        }
    }

    fn visit_expr(&mut self, expr: &Expr<'_>, frame: &mut Frame) -> Result<(), Diagnostic> {
        match &expr.kind {
            ExprKind::Literal { .. } => Ok(()),
            ExprKind::Ident(name) => self.check_read(*name, expr.span),
            ExprKind::Unary { op, operand } => {
                if matches!(op, UnOp::Ref | UnOp::RefMut) {
                    if let ExprKind::Ident(name) = &operand.kind {
                        return self.borrow(*name, *op == UnOp::RefMut, expr.span, frame);
                    }
                }
                self.visit_expr(operand, frame)
            }
            ExprKind::Binary { left, right, .. } => {
                self.visit_expr(left, frame)?;
                self.visit_expr(right, frame)
            }
            ExprKind::Assign { target, value, .. } => {
                self.visit_expr(target, frame)?;
                self.visit_expr(value, frame)
            }
            ExprKind::Call { callee, args } => {
                self.visit_expr(callee, frame)?;
                for arg in *args {
                    self.visit_expr(arg, frame)?;
                    self.move_if_non_copy(arg);
                }
                Ok(())
            }
            ExprKind::If { cond, then_block, else_branch } => {
                self.visit_expr(cond, frame)?;
                let entry = self.states.clone();
                self.visit_expr(then_block, frame)?;
                let then_states = std::mem::replace(&mut self.states, entry.clone());
                if let Some(els) = else_branch {
                    self.visit_expr(els, frame)?;
                }
                let else_states = std::mem::replace(&mut self.states, entry);
                let mut merged = then_states;
                union_into(&mut merged, &else_states);
                self.states = merged;
                Ok(())
            }
            ExprKind::Match { scrutinee, arms } => {
                self.visit_expr(scrutinee, frame)?;
                let entry = self.states.clone();
                let mut merged: Option<HashMap<Symbol, VarState>> = None;
                for arm in *arms {
                    self.states = entry.clone();
                    let shadowed: Vec<(Symbol, Option<VarState>)> = pattern_bindings(arm.pattern)
                        .into_iter()
                        .map(|name| (name, self.states.insert(name, VarState::default())))
                        .collect();
                    self.visit_expr(arm.body, frame)?;
                    for (name, prev) in shadowed.into_iter().rev() {
                        match prev {
                            Some(state) => {
                                self.states.insert(name, state);
                            }
                            None => {
                                self.states.remove(&name);
                            }
                        }
                    }
                    match &mut merged {
                        None => merged = Some(self.states.clone()),
                        Some(m) => union_into(m, &self.states),
                    }
                }
                self.states = merged.unwrap_or(entry);
                Ok(())
            }
            ExprKind::Block(block) => self.check_block(block),
            ExprKind::Range { start, end, .. } => {
                self.visit_expr(start, frame)?;
                self.visit_expr(end, frame)
            }
            ExprKind::Try(operand)
            | ExprKind::Unsafe(operand)
            | ExprKind::Spawn(operand)
            | ExprKind::Await(operand) => self.visit_expr(operand, frame),
            ExprKind::Raise { message, .. } => self.visit_expr(message, frame),
            ExprKind::StructInit { fields, .. } => {
                for field in *fields {
                    self.visit_expr(field.value, frame)?;
                }
                Ok(())
            }
        }
    }

    fn check_read(&self, name: Symbol, span: Span) -> Result<(), Diagnostic> {
        if let Some(state) = self.states.get(&name) {
            if state.moved {
                return Err(Diagnostic::error(
                    span,
                    "MD4001",
                    format!("use after move of '{}'", self.interner.resolve(name)),
                ));
            }
            if state.mut_borrow {
                return Err(Diagnostic::error(
                    span,
                    "MD4005",
                    format!(
                        "cannot use '{}' while mutably borrowed",
                        self.interner.resolve(name)
                    ),
                ));
            }
        }
        Ok(())
    }

    fn borrow(
        &mut self,
        name: Symbol,
        exclusive: bool,
        span: Span,
        frame: &mut Frame,
    ) -> Result<(), Diagnostic> {
        let state = match self.states.get_mut(&name) {
            Some(state) => state,
            None => return Ok(()),
        };
        if state.moved {
            return Err(Diagnostic::error(
                span,
                "MD4004",
                format!("cannot borrow moved value '{}'", self.interner.resolve(name)),
            ));
        }
        if exclusive {
            if state.mut_borrow || state.imm_borrows > 0 {
                return Err(Diagnostic::error(
                    span,
                    "MD4002",
                    format!(
                        "cannot mutably borrow '{}' while already borrowed",
                        self.interner.resolve(name)
                    ),
                ));
            }
            state.mut_borrow = true;
            frame.released.push((name, BorrowKind::Exclusive));
        } else {
            if state.mut_borrow {
                return Err(Diagnostic::error(
                    span,
                    "MD4003",
                    format!(
                        "cannot immutably borrow '{}' while mutably borrowed",
                        self.interner.resolve(name)
                    ),
                ));
            }
            state.imm_borrows += 1;
            frame.released.push((name, BorrowKind::Shared));
        }
        Ok(())
    }

    fn move_if_non_copy(&mut self, expr: &Expr<'_>) {
        if let ExprKind::Ident(name) = &expr.kind {
            let moves = self.expr_types.get(&expr.id).map_or(false, |ty| !ty.is_copy());
            if moves {
                if let Some(state) = self.states.get_mut(name) {
                    state.moved = true;
                }
            }
        }
    }
}

fn pattern_bindings(pattern: &Pattern<'_>) -> Vec<Symbol> {
    match &pattern.kind {
        PatternKind::Wildcard | PatternKind::Literal { .. } => Vec::new(),
        PatternKind::Name(name) => vec![*name],
        PatternKind::Variant { fields, .. } => fields.to_vec(),
    }
}

fn union_into(base: &mut HashMap<Symbol, VarState>, other: &HashMap<Symbol, VarState>) {
    for (name, state) in other {
        match base.get_mut(name) {
            Some(existing) => {
                existing.moved |= state.moved;
                existing.imm_borrows = existing.imm_borrows.max(state.imm_borrows);
                existing.mut_borrow |= state.mut_borrow;
            }
            None => {
                base.insert(*name, state.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::checker::check_program;
    use crate::lexer::tokenize;
    use crate::parser::parse;
    use crate::resolver::resolve_names;

    fn borrow_source(source: &str) -> Result<(), &'static str> {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let tokens = tokenize(source, "borrow.mdr", &mut interner).map_err(|d| d.code)?;
        let program = parse(tokens, &arena, &interner).map_err(|d| d.code)?;
        let program = arena.alloc(program);
        let resolution = resolve_names(program, &interner).map_err(|d| d.code)?;
        let typed = check_program(program, &resolution, &interner).map_err(|d| d.code)?;
        borrow_check(&typed, &interner).map_err(|d| d.code)
    }

    #[test]
    fn use_after_move_is_md4001() {
        let source = "fn main() -> Int {\n  let s: String = \"x\"\n  let t := s\n  print(s)\n  0\n}";
        assert_eq!(borrow_source(source), Err("MD4001"));
    }

    #[test]
    fn copy_types_do_not_move() {
        let source = "fn main() -> Int {\n  let x := 1\n  let y := x\n  x + y\n}";
        assert_eq!(borrow_source(source), Ok(()));
    }

    #[test]
    fn passing_by_value_moves_non_copy_arguments() {
        let source = "fn main() -> Int {\n  let s: String = \"x\"\n  print(s)\n  print(s)\n  0\n}";
        assert_eq!(borrow_source(source), Err("MD4001"));
    }

    #[test]
    fn shared_borrows_stack() {
        let source =
            "fn main() -> Int {\n  let s: String = \"x\"\n  let a := &s\n  let b := &s\n  0\n}";
        assert_eq!(borrow_source(source), Ok(()));
    }

    #[test]
    fn mut_borrow_after_shared_is_md4002() {
        let source =
            "fn main() -> Int {\n  let s: String = \"x\"\n  let a := &s\n  let b := &mut s\n  0\n}";
        assert_eq!(borrow_source(source), Err("MD4002"));
    }

    #[test]
    fn shared_borrow_after_mut_is_md4003() {
        let source =
            "fn main() -> Int {\n  let s: String = \"x\"\n  let a := &mut s\n  let b := &s\n  0\n}";
        assert_eq!(borrow_source(source), Err("MD4003"));
    }

    #[test]
    fn reading_while_mutably_borrowed_is_md4005() {
        let source =
            "fn main() -> Int {\n  let s: String = \"x\"\n  let a := &mut s\n  print(s)\n  0\n}";
        assert_eq!(borrow_source(source), Err("MD4005"));
    }

    #[test]
    fn borrows_release_at_block_end() {
        let source = "fn main() -> Int {\n  let s: String = \"x\"\n  if true {\n    let a := &s\n    0\n  } else { 0 }\n  let b := &mut s\n  0\n}";
        assert_eq!(borrow_source(source), Ok(()));
    }

    #[test]
    fn move_in_one_branch_poisons_the_join() {
        let source = "fn main() -> Int {\n  let s: String = \"x\"\n  if true {\n    let t := s\n    0\n  } else {\n    0\n  }\n  print(s)\n  0\n}";
        assert_eq!(borrow_source(source), Err("MD4001"));
    }

    #[test]
    fn borrow_of_branch_moved_value_is_md4004() {
        let source = "fn main() -> Int {\n  let s: String = \"x\"\n  if true {\n    let a := s\n    0\n  } else {\n    0\n  }\n  let b := &mut s\n  0\n}";
        assert_eq!(borrow_source(source), Err("MD4004"));
    }

    #[test]
    fn match_arm_bindings_are_scoped_to_the_arm() {
        let source = "enum T { A(v: Int), B }\nfn main() -> Int {\n  let t := A(1)\n  match t {\n    A(v) => v,\n    B => 0,\n  }\n}";
        assert_eq!(borrow_source(source), Ok(()));
    }

    #[test]
    fn moves_in_match_arms_union_conservatively() {
        let source = "enum T { A, B }\nfn main() -> Int {\n  let t := A()\n  let s: String = \"x\"\n  match t {\n    A => { let u := s\n 1 },\n    B => 2,\n  }\n  print(s)\n  0\n}";
        assert_eq!(borrow_source(source), Err("MD4001"));
    }
}
