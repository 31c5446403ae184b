//! Lowering: typed AST to basic-block SSA IR.
//!
//! Layout synthesis runs first: every enum key the program touches (user
//! enums by name, `Option`/`Result` specializations by stringified type)
//! gets a tagged-union layout, and variant constructor names are indexed
//! with ambiguous names dropped. Function bodies are then walked in
//! structured order; the SSA environment is a per-block name map, cloned
//! at every split and restored at the join. That is sufficient because
//! language-level mutation is confined to `var` rebindings of the same
//! lexical name.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::ast::{Block, Expr, ExprId, ExprKind, Stmt, StmtKind, UnOp};
use crate::checker::{EnumVariantInfo, TypedFunction, TypedProgram};
use crate::diagnostic::Diagnostic;
use crate::intern::{Interner, Symbol};
use crate::mir::{BasicBlock, EnumLayout, FunctionIR, Instr, ProgramIR, Terminator, VariantLayout};
use crate::span::Span;
use crate::types::{Type, TypeName};

pub fn lower(typed: &TypedProgram<'_>, interner: &Interner) -> Result<ProgramIR, Diagnostic> {
    let layouts = collect_layouts(typed)?;
    let ctors = constructor_table(&layouts);
    let mut functions = Vec::new();
    for func in &typed.functions {
        functions.push(lower_function(func, typed, &layouts, &ctors, interner)?);
    }
    Ok(ProgramIR { functions, enums: layouts })
}

fn is_enum_type(ty: &Type, typed: &TypedProgram<'_>) -> bool {
    match &ty.name {
        TypeName::Named(name) => typed.enums.contains_key(name),
        TypeName::Option => ty.args.len() == 1,
        TypeName::Result => ty.args.len() == 2,
        _ => false,
    }
}

/// An `Unknown` payload that survived unification is laid out as one
/// 64-bit integer slot.
fn slot_type(ty: &Type) -> Type {
    if ty.is_unknown() {
        Type::int()
    } else {
        ty.clone()
    }
}

/// Scans parameter, return, and recorded expression types of every
/// function and synthesizes one layout per used enum key. A layout is
/// derived once and never rewritten.
fn collect_layouts(typed: &TypedProgram<'_>) -> Result<BTreeMap<String, EnumLayout>, Diagnostic> {
    let mut layouts = BTreeMap::new();
    for func in &typed.functions {
        let blame = func.decl.span;
        for ty in func.signature.params.iter().chain(std::iter::once(&func.signature.ret)) {
            collect_enum_types(ty, typed, &mut layouts, blame)?;
        }
        let mut ids: Vec<ExprId> = func.expr_types.keys().copied().collect();
        ids.sort();
        for id in ids {
            collect_enum_types(&func.expr_types[&id], typed, &mut layouts, blame)?;
        }
    }
    Ok(layouts)
}

fn collect_enum_types(
    ty: &Type,
    typed: &TypedProgram<'_>,
    layouts: &mut BTreeMap<String, EnumLayout>,
    blame: Span,
) -> Result<(), Diagnostic> {
    if is_enum_type(ty, typed) {
        let key = ty.to_string();
        if !layouts.contains_key(&key) {
            let layout = build_layout(ty, key.clone(), typed, blame)?;
            layouts.insert(key, layout);
        }
    }
    for arg in &ty.args {
        collect_enum_types(arg, typed, layouts, blame)?;
    }
    Ok(())
}

fn build_layout(
    ty: &Type,
    key: String,
    typed: &TypedProgram<'_>,
    blame: Span,
) -> Result<EnumLayout, Diagnostic> {
    let (variant_infos, blame): (Vec<EnumVariantInfo>, Span) = match &ty.name {
        TypeName::Named(name) => {
            let info = &typed.enums[name];
            (info.variants.clone(), info.span)
        }
        TypeName::Option => (
            vec![
                EnumVariantInfo {
                    name: "Some".to_string(),
                    index: 0,
                    field_types: vec![ty.args[0].clone()],
                },
                EnumVariantInfo { name: "None".to_string(), index: 1, field_types: vec![] },
            ],
            blame,
        ),
        TypeName::Result => (
            vec![
                EnumVariantInfo {
                    name: "Ok".to_string(),
                    index: 0,
                    field_types: vec![ty.args[0].clone()],
                },
                EnumVariantInfo {
                    name: "Err".to_string(),
                    index: 1,
                    field_types: vec![ty.args[1].clone()],
                },
            ],
            blame,
        ),
        _ => {
            return Err(Diagnostic::error(blame, "MD5000", format!("'{ty}' is not an enum type")));
        }
    };
    let mut variants = Vec::new();
    let mut payload_slots = 0;
    for info in variant_infos {
        let mut field_types = Vec::new();
        for field_ty in &info.field_types {
            if is_enum_type(field_ty, typed) {
                return Err(Diagnostic::error(
                    blame,
                    "MD5000",
                    format!("enum payload of type {field_ty} is not supported"),
                )
                .with_hint("nested enum payloads are not lowered"));
            }
            field_types.push(slot_type(field_ty));
        }
        payload_slots = payload_slots.max(field_types.len());
        variants.push(VariantLayout { name: info.name, index: info.index, field_types });
    }
    Ok(EnumLayout { key, variants, payload_slots })
}

/// Variant name → `(enum key, tag, slot types)`. A name declared by more
/// than one layout is dropped; the checker already forces such call sites
/// to error or disambiguate through context.
fn constructor_table(
    layouts: &BTreeMap<String, EnumLayout>,
) -> HashMap<String, (String, u32, Vec<Type>)> {
    let mut table: HashMap<String, (String, u32, Vec<Type>)> = HashMap::new();
    let mut dropped = HashSet::new();
    for (key, layout) in layouts {
        for variant in &layout.variants {
            if dropped.contains(&variant.name) {
                continue;
            }
            if table.contains_key(&variant.name) {
                table.remove(&variant.name);
                dropped.insert(variant.name.clone());
                continue;
            }
            table.insert(
                variant.name.clone(),
                (key.clone(), variant.index, variant.field_types.clone()),
            );
        }
    }
    table
}

fn lower_function(
    func: &TypedFunction<'_>,
    typed: &TypedProgram<'_>,
    layouts: &BTreeMap<String, EnumLayout>,
    ctors: &HashMap<String, (String, u32, Vec<Type>)>,
    interner: &Interner,
) -> Result<FunctionIR, Diagnostic> {
    let mut builder = Builder {
        interner,
        typed,
        expr_types: &func.expr_types,
        layouts,
        ctors,
        fn_ret: func.signature.ret.clone(),
        blocks: Vec::new(),
        current: 0,
        block_counter: 0,
        temp_counter: 0,
        env: HashMap::new(),
    };
    let entry = builder.new_block("entry");
    builder.current = entry;
    let entry_name = builder.blocks[entry].name.clone();

    for (i, param) in func.decl.params.iter().enumerate() {
        builder.env.insert(param.name, format!("%arg{i}"));
    }

    let body = match &func.decl.body.kind {
        ExprKind::Block(block) => block,
        _ => {
            return Err(Diagnostic::error(
                func.decl.span,
                "MD5000",
                "malformed function body in lowering",
            ));
        }
    };
    let tail = builder.lower_block(body)?;

    if !builder.terminated() {
        if builder.fn_ret.is_void() {
            builder.set_term(Terminator::Return { value: None });
        } else if let Some(value) = tail {
            builder.set_term(Terminator::Return { value: Some(value) });
        } else {
            let ret = builder.fn_ret.clone();
            let zero = builder.emit_zero_value(&ret, func.decl.span)?;
            builder.set_term(Terminator::Return { value: Some(zero) });
        }
    }

    // Unreachable continuation blocks (after `return`, `raise`) still get
    // a typed return so every block carries exactly one terminator.
    for idx in 0..builder.blocks.len() {
        if builder.blocks[idx].terminator.is_none() {
            builder.current = idx;
            if builder.fn_ret.is_void() {
                builder.set_term(Terminator::Return { value: None });
            } else {
                let ret = builder.fn_ret.clone();
                let zero = builder.emit_zero_value(&ret, func.decl.span)?;
                builder.set_term(Terminator::Return { value: Some(zero) });
            }
        }
    }

    Ok(FunctionIR {
        name: interner.resolve(func.decl.name).to_string(),
        params: func
            .decl
            .params
            .iter()
            .zip(&func.signature.params)
            .map(|(p, ty)| (interner.resolve(p.name).to_string(), ty.clone()))
            .collect(),
        return_type: func.signature.ret.clone(),
        entry: entry_name,
        blocks: builder.blocks,
    })
}

struct Builder<'ctx, 'a> {
    interner: &'ctx Interner,
    typed: &'ctx TypedProgram<'a>,
    expr_types: &'ctx HashMap<ExprId, Type>,
    layouts: &'ctx BTreeMap<String, EnumLayout>,
    ctors: &'ctx HashMap<String, (String, u32, Vec<Type>)>,
    fn_ret: Type,
    blocks: Vec<BasicBlock>,
    current: usize,
    block_counter: u32,
    temp_counter: u32,
    env: HashMap<Symbol, String>,
}

impl<'ctx, 'a> Builder<'ctx, 'a> {
    fn new_block(&mut self, prefix: &str) -> usize {
        let name = format!("{prefix}_{}", self.block_counter);
        self.block_counter += 1;
        self.blocks.push(BasicBlock::new(name));
        self.blocks.len() - 1
    }

    fn emit(&mut self, instr: Instr) {
        self.blocks[self.current].instructions.push(instr);
    }

    fn set_term(&mut self, term: Terminator) {
        self.blocks[self.current].terminator = Some(term);
    }

    fn terminated(&self) -> bool {
        self.blocks[self.current].terminator.is_some()
    }

    fn current_name(&self) -> String {
        self.blocks[self.current].name.clone()
    }

    fn tmp(&mut self) -> String {
        let name = format!("%t{}", self.temp_counter);
        self.temp_counter += 1;
        name
    }

    fn expr_ty(&self, expr: &Expr<'a>) -> Result<Type, Diagnostic> {
        self.expr_types.get(&expr.id).cloned().ok_or_else(|| {
            Diagnostic::error(expr.span, "MD5000", "missing type for expression in lowering")
        })
    }

    fn layout(&self, key: &str, span: Span) -> Result<&'ctx EnumLayout, Diagnostic> {
        self.layouts
            .get(key)
            .ok_or_else(|| Diagnostic::error(span, "MD5000", format!("no layout for enum {key}")))
    }

    fn env_lookup(&self, name: Symbol, span: Span) -> Result<String, Diagnostic> {
        self.env.get(&name).cloned().ok_or_else(|| {
            Diagnostic::error(
                span,
                "MD5000",
                format!("unbound name '{}' in lowering", self.interner.resolve(name)),
            )
        })
    }

    fn expect_value(&self, value: Option<String>, span: Span) -> Result<String, Diagnostic> {
        value.ok_or_else(|| {
            Diagnostic::error(span, "MD5000", "expected a value-producing expression")
        })
    }

    fn lower_block(&mut self, block: &'a Block<'a>) -> Result<Option<String>, Diagnostic> {
        for stmt in block.stmts {
            self.lower_stmt(stmt)?;
        }
        match block.tail {
            Some(tail) => self.lower_expr(tail),
            None => Ok(None),
        }
    }

    fn lower_stmt(&mut self, stmt: &'a Stmt<'a>) -> Result<(), Diagnostic> {
        match &stmt.kind {
            StmtKind::Let { name, value, .. } => {
                let val = self.lower_expr(*value)?;
                self.env.insert(*name, val.unwrap_or_default());
                Ok(())
            }
            StmtKind::Return(value) => {
                let val = match value {
                    Some(expr) => self.lower_expr(*expr)?,
                    None => None,
                };
                self.set_term(Terminator::Return { value: val });
                // Later statements lower into a fresh unreachable block so
                // the builder invariants hold.
                let dead = self.new_block("dead");
                self.current = dead;
                Ok(())
            }
            StmtKind::Expr(expr) => {
                self.lower_expr(*expr)?;
                Ok(())
            }
            StmtKind::Break(_) | StmtKind::Continue => Err(Diagnostic::error(
                stmt.span,
                "MD5000",
                "unsupported statement in lowering",
            )),
        }
    }

    fn lower_expr(&mut self, expr: &'a Expr<'a>) -> Result<Option<String>, Diagnostic> {
        match &expr.kind {
            ExprKind::Literal { value, .. } => {
                let ty = self.expr_ty(expr)?;
                let out = self.tmp();
                self.emit(Instr::Const {
                    target: out.clone(),
                    value: self.interner.resolve(*value).to_string(),
                    ty,
                });
                Ok(Some(out))
            }
            ExprKind::Ident(name) => Ok(Some(self.env_lookup(*name, expr.span)?)),
            ExprKind::Unary { op, operand } => match op {
                UnOp::Neg => {
                    let val = self.lower_expr(*operand)?;
                    let val = self.expect_value(val, operand.span)?;
                    let ty = self.expr_ty(expr)?;
                    let zero = self.tmp();
                    self.emit(Instr::Const {
                        target: zero.clone(),
                        value: "0".to_string(),
                        ty: ty.clone(),
                    });
                    let out = self.tmp();
                    self.emit(Instr::BinOp {
                        target: out.clone(),
                        op: "-".to_string(),
                        left: zero,
                        right: val,
                        ty,
                    });
                    Ok(Some(out))
                }
                UnOp::Not => {
                    let val = self.lower_expr(*operand)?;
                    let val = self.expect_value(val, operand.span)?;
                    let one = self.tmp();
                    self.emit(Instr::Const {
                        target: one.clone(),
                        value: "1".to_string(),
                        ty: Type::bool(),
                    });
                    let out = self.tmp();
                    self.emit(Instr::BinOp {
                        target: out.clone(),
                        op: "^".to_string(),
                        left: val,
                        right: one,
                        ty: Type::bool(),
                    });
                    Ok(Some(out))
                }
                // Borrows exist for the borrow checker only; the value
                // flows through unchanged.
                UnOp::Ref | UnOp::RefMut | UnOp::Deref => self.lower_expr(*operand),
            },
            ExprKind::Binary { op, left, right } => {
                let left_val = self.lower_expr(*left)?;
                let left_val = self.expect_value(left_val, left.span)?;
                let right_val = self.lower_expr(*right)?;
                let right_val = self.expect_value(right_val, right.span)?;
                let ty = self.expr_ty(expr)?;
                let out = self.tmp();
                self.emit(Instr::BinOp {
                    target: out.clone(),
                    op: op.as_str().to_string(),
                    left: left_val,
                    right: right_val,
                    ty,
                });
                Ok(Some(out))
            }
            ExprKind::Assign { op, target, value } => {
                let name = match &target.kind {
                    ExprKind::Ident(name) => *name,
                    _ => {
                        return Err(Diagnostic::error(
                            expr.span,
                            "MD5000",
                            "assignment target must be an identifier",
                        ));
                    }
                };
                let rhs = self.lower_expr(*value)?;
                let rhs = self.expect_value(rhs, value.span)?;
                let result = match op.binary() {
                    None => rhs,
                    Some(bin) => {
                        let current = self.env_lookup(name, expr.span)?;
                        let ty = self.expr_ty(expr)?;
                        let out = self.tmp();
                        self.emit(Instr::BinOp {
                            target: out.clone(),
                            op: bin.as_str().to_string(),
                            left: current,
                            right: rhs,
                            ty,
                        });
                        out
                    }
                };
                // Assignment is pure in this lowering: it rebinds the
                // lexical name, no store is emitted.
                self.env.insert(name, result.clone());
                Ok(Some(result))
            }
            ExprKind::Call { callee, args } => self.lower_call(expr, callee, args),
            ExprKind::If { cond, then_block, else_branch } => {
                let cond_val = self.lower_expr(*cond)?;
                let cond_val = self.expect_value(cond_val, cond.span)?;
                let then_idx = self.new_block("then");
                let else_idx = self.new_block("else");
                let join_idx = self.new_block("join");
                let then_name = self.blocks[then_idx].name.clone();
                let else_name = self.blocks[else_idx].name.clone();
                let join_name = self.blocks[join_idx].name.clone();
                self.set_term(Terminator::CondBranch {
                    cond: cond_val,
                    then_bb: then_name,
                    else_bb: else_name,
                });
                let saved_env = self.env.clone();
                let mut incomings: Vec<(String, Option<String>)> = Vec::new();

                self.current = then_idx;
                let then_blk = match &then_block.kind {
                    ExprKind::Block(block) => block,
                    _ => {
                        return Err(Diagnostic::error(
                            then_block.span,
                            "MD5000",
                            "malformed if branch in lowering",
                        ));
                    }
                };
                let then_val = self.lower_block(then_blk)?;
                if !self.terminated() {
                    self.set_term(Terminator::Branch { target: join_name.clone() });
                    incomings.push((self.current_name(), then_val));
                }
                self.env = saved_env.clone();

                self.current = else_idx;
                let else_val = match else_branch {
                    Some(els) => self.lower_expr(*els)?,
                    None => None,
                };
                if !self.terminated() {
                    self.set_term(Terminator::Branch { target: join_name });
                    incomings.push((self.current_name(), else_val));
                }
                self.env = saved_env;

                self.current = join_idx;
                let ty = self.expr_ty(expr)?;
                if ty.is_void() {
                    return Ok(None);
                }
                let live: Vec<(String, String)> = incomings
                    .into_iter()
                    .filter_map(|(block, value)| value.map(|v| (block, v)))
                    .collect();
                match live.len() {
                    0 => Ok(None),
                    1 => Ok(Some(live.into_iter().next().map(|(_, v)| v).unwrap_or_default())),
                    _ => {
                        let out = self.tmp();
                        self.emit(Instr::Phi { target: out.clone(), incomings: live, ty });
                        Ok(Some(out))
                    }
                }
            }
            ExprKind::Match { scrutinee, arms } => self.lower_match(expr, scrutinee, arms),
            ExprKind::Block(block) => self.lower_block(block),
            ExprKind::Try(operand) => {
                let val = self.lower_expr(*operand)?;
                let val = self.expect_value(val, operand.span)?;
                let operand_ty = self.expr_ty(operand)?;
                let key = operand_ty.to_string();
                let payload_ty = self
                    .layout(&key, expr.span)?
                    .variant("Ok")
                    .and_then(|v| v.field_types.first().cloned())
                    .unwrap_or_else(Type::int);
                let tag = self.tmp();
                self.emit(Instr::EnumTag {
                    target: tag.clone(),
                    source: val.clone(),
                    enum_key: key.clone(),
                });
                let zero = self.tmp();
                self.emit(Instr::Const {
                    target: zero.clone(),
                    value: "0".to_string(),
                    ty: Type::int(),
                });
                let cmp = self.tmp();
                self.emit(Instr::BinOp {
                    target: cmp.clone(),
                    op: "==".to_string(),
                    left: tag,
                    right: zero,
                    ty: Type::bool(),
                });
                let ok_idx = self.new_block("try_ok");
                let err_idx = self.new_block("try_err");
                let ok_name = self.blocks[ok_idx].name.clone();
                let err_name = self.blocks[err_idx].name.clone();
                self.set_term(Terminator::CondBranch {
                    cond: cmp,
                    then_bb: ok_name,
                    else_bb: err_name,
                });
                // The error path returns the operand unchanged; its layout
                // matches the enclosing function's return type.
                self.current = err_idx;
                self.set_term(Terminator::Return { value: Some(val.clone()) });
                self.current = ok_idx;
                let out = self.tmp();
                self.emit(Instr::EnumField {
                    target: out.clone(),
                    source: val,
                    enum_key: key,
                    field_index: 0,
                    field_ty: payload_ty,
                });
                Ok(Some(out))
            }
            ExprKind::Raise { kind, message } => {
                let ret = self.fn_ret.clone();
                let key = ret.to_string();
                let (index, field_types) = {
                    let layout = self.layout(&key, expr.span)?;
                    let variant = layout.variant("Err").ok_or_else(|| {
                        Diagnostic::error(expr.span, "MD5000", "raise outside Result function")
                    })?;
                    (variant.index, variant.field_types.clone())
                };
                let lexeme = match &message.kind {
                    ExprKind::Literal { value, .. } => self.interner.resolve(*value),
                    _ => {
                        return Err(Diagnostic::error(
                            message.span,
                            "MD5000",
                            "raise message must be a string literal",
                        ));
                    }
                };
                let inner = lexeme.get(1..lexeme.len().saturating_sub(1)).unwrap_or("");
                let merged = format!("\"{}: {}\"", self.interner.resolve(*kind), inner);
                let msg = self.tmp();
                self.emit(Instr::Const { target: msg.clone(), value: merged, ty: Type::string() });
                let out = self.tmp();
                self.emit(Instr::EnumConstruct {
                    target: out.clone(),
                    enum_key: key,
                    variant_index: index,
                    fields: vec![msg],
                    field_types,
                });
                self.set_term(Terminator::Return { value: Some(out) });
                let dead = self.new_block("dead");
                self.current = dead;
                Ok(None)
            }
            ExprKind::Unsafe(inner) => self.lower_expr(*inner),
            ExprKind::Range { .. }
            | ExprKind::Spawn(_)
            | ExprKind::Await(_)
            | ExprKind::StructInit { .. } => Err(Diagnostic::error(
                expr.span,
                "MD5000",
                "unsupported expression in lowering",
            )),
        }
    }

    fn lower_call(
        &mut self,
        expr: &'a Expr<'a>,
        callee: &'a Expr<'a>,
        args: &'a [&'a Expr<'a>],
    ) -> Result<Option<String>, Diagnostic> {
        let name = match &callee.kind {
            ExprKind::Ident(name) => *name,
            _ => {
                return Err(Diagnostic::error(
                    expr.span,
                    "MD5000",
                    "only direct function calls are supported",
                ));
            }
        };
        let name_text = self.interner.resolve(name).to_string();
        match name_text.as_str() {
            // Built-ins keep their names; the backend maps them onto the
            // runtime.
            "print" | "read_file" => {
                let mut arg_vals = Vec::new();
                for arg in args {
                    let val = self.lower_expr(*arg)?;
                    arg_vals.push(self.expect_value(val, arg.span)?);
                }
                let ret_ty = self.expr_ty(expr)?;
                let target = if ret_ty.is_void() { None } else { Some(self.tmp()) };
                self.emit(Instr::Call {
                    target: target.clone(),
                    name: name_text,
                    args: arg_vals,
                    ret_ty,
                });
                return Ok(target);
            }
            "Some" | "None" | "Ok" | "Err" => {
                let ty = self.expr_ty(expr)?;
                let key = ty.to_string();
                let (index, field_types) = {
                    let layout = self.layout(&key, expr.span)?;
                    let variant = layout.variant(&name_text).ok_or_else(|| {
                        Diagnostic::error(
                            expr.span,
                            "MD5000",
                            format!("no variant '{name_text}' in layout {key}"),
                        )
                    })?;
                    (variant.index, variant.field_types.clone())
                };
                return self.emit_construct(key, index, field_types, args);
            }
            _ => {}
        }
        if let Some((key, index, field_types)) = self.ctors.get(&name_text).cloned() {
            return self.emit_construct(key, index, field_types, args);
        }
        let mut arg_vals = Vec::new();
        for arg in args {
            let val = self.lower_expr(*arg)?;
            arg_vals.push(self.expect_value(val, arg.span)?);
        }
        let ret_ty = self.expr_ty(expr)?;
        let target = if ret_ty.is_void() { None } else { Some(self.tmp()) };
        self.emit(Instr::Call { target: target.clone(), name: name_text, args: arg_vals, ret_ty });
        Ok(target)
    }

    fn emit_construct(
        &mut self,
        enum_key: String,
        variant_index: u32,
        field_types: Vec<Type>,
        args: &'a [&'a Expr<'a>],
    ) -> Result<Option<String>, Diagnostic> {
        let mut fields = Vec::new();
        for arg in args {
            let val = self.lower_expr(*arg)?;
            fields.push(self.expect_value(val, arg.span)?);
        }
        let out = self.tmp();
        self.emit(Instr::EnumConstruct {
            target: out.clone(),
            enum_key,
            variant_index,
            fields,
            field_types,
        });
        Ok(Some(out))
    }

    fn lower_match(
        &mut self,
        expr: &'a Expr<'a>,
        scrutinee: &'a Expr<'a>,
        arms: &'a [crate::ast::MatchArm<'a>],
    ) -> Result<Option<String>, Diagnostic> {
        let scrut_val = self.lower_expr(scrutinee)?;
        let scrut_val = self.expect_value(scrut_val, scrutinee.span)?;
        let scrut_ty = self.expr_ty(scrutinee)?;
        let result_ty = self.expr_ty(expr)?;
        let end_idx = self.new_block("match_end");
        let end_name = self.blocks[end_idx].name.clone();
        let saved_env = self.env.clone();
        let mut incomings: Vec<(String, Option<String>)> = Vec::new();
        let mut exhausted = false;

        for arm in arms {
            match self.classify_arm(&arm.pattern.kind, &scrut_ty, arm.span)? {
                ArmTest::CatchAll { binding } => {
                    let arm_idx = self.new_block("arm");
                    let arm_name = self.blocks[arm_idx].name.clone();
                    self.set_term(Terminator::Branch { target: arm_name });
                    self.current = arm_idx;
                    self.env = saved_env.clone();
                    if let Some(name) = binding {
                        self.env.insert(name, scrut_val.clone());
                    }
                    let val = self.lower_expr(arm.body)?;
                    if !self.terminated() {
                        self.set_term(Terminator::Branch { target: end_name.clone() });
                        incomings.push((self.current_name(), val));
                    }
                    exhausted = true;
                    break;
                }
                ArmTest::Literal { value } => {
                    let arm_idx = self.new_block("arm");
                    let next_idx = self.new_block("match_test");
                    let arm_name = self.blocks[arm_idx].name.clone();
                    let next_name = self.blocks[next_idx].name.clone();
                    let lit = self.tmp();
                    self.emit(Instr::Const {
                        target: lit.clone(),
                        value,
                        ty: scrut_ty.clone(),
                    });
                    let cmp = self.tmp();
                    self.emit(Instr::BinOp {
                        target: cmp.clone(),
                        op: "==".to_string(),
                        left: scrut_val.clone(),
                        right: lit,
                        ty: Type::bool(),
                    });
                    self.set_term(Terminator::CondBranch {
                        cond: cmp,
                        then_bb: arm_name,
                        else_bb: next_name,
                    });
                    self.current = arm_idx;
                    self.env = saved_env.clone();
                    let val = self.lower_expr(arm.body)?;
                    if !self.terminated() {
                        self.set_term(Terminator::Branch { target: end_name.clone() });
                        incomings.push((self.current_name(), val));
                    }
                    self.current = next_idx;
                }
                ArmTest::Variant { index, bindings, field_types, key } => {
                    let arm_idx = self.new_block("arm");
                    let next_idx = self.new_block("match_test");
                    let arm_name = self.blocks[arm_idx].name.clone();
                    let next_name = self.blocks[next_idx].name.clone();
                    let tag = self.tmp();
                    self.emit(Instr::EnumTag {
                        target: tag.clone(),
                        source: scrut_val.clone(),
                        enum_key: key.clone(),
                    });
                    let wanted = self.tmp();
                    self.emit(Instr::Const {
                        target: wanted.clone(),
                        value: index.to_string(),
                        ty: Type::int(),
                    });
                    let cmp = self.tmp();
                    self.emit(Instr::BinOp {
                        target: cmp.clone(),
                        op: "==".to_string(),
                        left: tag,
                        right: wanted,
                        ty: Type::bool(),
                    });
                    self.set_term(Terminator::CondBranch {
                        cond: cmp,
                        then_bb: arm_name,
                        else_bb: next_name,
                    });
                    self.current = arm_idx;
                    self.env = saved_env.clone();
                    for (i, (binding, field_ty)) in
                        bindings.iter().zip(field_types.iter()).enumerate()
                    {
                        let field = self.tmp();
                        self.emit(Instr::EnumField {
                            target: field.clone(),
                            source: scrut_val.clone(),
                            enum_key: key.clone(),
                            field_index: i as u32,
                            field_ty: field_ty.clone(),
                        });
                        self.env.insert(*binding, field);
                    }
                    let val = self.lower_expr(arm.body)?;
                    if !self.terminated() {
                        self.set_term(Terminator::Branch { target: end_name.clone() });
                        incomings.push((self.current_name(), val));
                    }
                    self.current = next_idx;
                }
            }
        }

        if !exhausted {
            // No arm proved exhaustive: the final test block falls back to
            // a zeroed default so no execution path is left hanging.
            if !result_ty.is_void() {
                let default = self.emit_zero_value(&result_ty, expr.span)?;
                incomings.push((self.current_name(), Some(default)));
            }
            self.set_term(Terminator::Branch { target: end_name });
        }

        self.current = end_idx;
        self.env = saved_env;
        if result_ty.is_void() {
            return Ok(None);
        }
        let live: Vec<(String, String)> = incomings
            .into_iter()
            .filter_map(|(block, value)| value.map(|v| (block, v)))
            .collect();
        if live.is_empty() {
            return Ok(None);
        }
        let out = self.tmp();
        self.emit(Instr::Phi { target: out.clone(), incomings: live, ty: result_ty });
        Ok(Some(out))
    }

    fn classify_arm(
        &self,
        pattern: &crate::ast::PatternKind<'a>,
        scrut_ty: &Type,
        span: Span,
    ) -> Result<ArmTest, Diagnostic> {
        use crate::ast::PatternKind;
        match pattern {
            PatternKind::Wildcard => Ok(ArmTest::CatchAll { binding: None }),
            PatternKind::Literal { value, .. } => {
                Ok(ArmTest::Literal { value: self.interner.resolve(*value).to_string() })
            }
            PatternKind::Variant { name, fields } => {
                let key = scrut_ty.to_string();
                let layout = self.layout(&key, span)?;
                let variant_name = self.interner.resolve(*name);
                let variant = layout.variant(variant_name).ok_or_else(|| {
                    Diagnostic::error(
                        span,
                        "MD5000",
                        format!("unknown variant '{variant_name}' in lowering"),
                    )
                })?;
                Ok(ArmTest::Variant {
                    index: variant.index,
                    bindings: fields.to_vec(),
                    field_types: variant.field_types.clone(),
                    key,
                })
            }
            PatternKind::Name(name) => {
                // A bare name is a payload-less variant when the scrutinee
                // enum declares one, otherwise a binding catch-all.
                if is_enum_type(scrut_ty, self.typed) {
                    let key = scrut_ty.to_string();
                    let layout = self.layout(&key, span)?;
                    if let Some(variant) = layout.variant(self.interner.resolve(*name)) {
                        return Ok(ArmTest::Variant {
                            index: variant.index,
                            bindings: Vec::new(),
                            field_types: Vec::new(),
                            key,
                        });
                    }
                }
                Ok(ArmTest::CatchAll { binding: Some(*name) })
            }
        }
    }

    fn emit_zero_value(&mut self, ty: &Type, span: Span) -> Result<String, Diagnostic> {
        if is_enum_type(ty, self.typed) {
            let key = ty.to_string();
            let (index, field_types) = {
                let layout = self.layout(&key, span)?;
                layout
                    .variants
                    .first()
                    .map(|v| (v.index, v.field_types.clone()))
                    .unwrap_or((0, Vec::new()))
            };
            let mut fields = Vec::new();
            for field_ty in &field_types {
                fields.push(self.emit_zero_value(field_ty, span)?);
            }
            let out = self.tmp();
            self.emit(Instr::EnumConstruct {
                target: out.clone(),
                enum_key: key,
                variant_index: index,
                fields,
                field_types,
            });
            return Ok(out);
        }
        let value = match ty.name {
            TypeName::Float => "0.0",
            TypeName::Bool => "false",
            TypeName::Char => "'\\0'",
            TypeName::String => "\"\"",
            _ => "0",
        };
        let out = self.tmp();
        self.emit(Instr::Const { target: out.clone(), value: value.to_string(), ty: ty.clone() });
        Ok(out)
    }
}

enum ArmTest {
    CatchAll { binding: Option<Symbol> },
    Literal { value: String },
    Variant { index: u32, bindings: Vec<Symbol>, field_types: Vec<Type>, key: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_layout(key: &str, variant_names: &[&str]) -> EnumLayout {
        EnumLayout {
            key: key.to_string(),
            variants: variant_names
                .iter()
                .enumerate()
                .map(|(i, name)| VariantLayout {
                    name: name.to_string(),
                    index: i as u32,
                    field_types: Vec::new(),
                })
                .collect(),
            payload_slots: 0,
        }
    }

    #[test]
    fn clashing_constructor_names_are_dropped() {
        let mut layouts = BTreeMap::new();
        layouts.insert("Left".to_string(), unit_layout("Left", &["V", "W"]));
        layouts.insert("Right".to_string(), unit_layout("Right", &["V"]));
        let table = constructor_table(&layouts);
        assert!(!table.contains_key("V"));
        assert_eq!(
            table.get("W").map(|(key, index, _)| (key.as_str(), *index)),
            Some(("Left", 1))
        );
    }

    #[test]
    fn unknown_payload_slots_default_to_int() {
        assert_eq!(slot_type(&Type::unknown()), Type::int());
        assert_eq!(slot_type(&Type::string()), Type::string());
    }
}
