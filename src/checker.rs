//! Type and exhaustiveness checking.
//!
//! Each function is checked by a [`FunctionChecker`] that owns the
//! expression-type table, the lexical scope stack, and the
//! explicit-return flag. Under-determined constructor types (`None()`,
//! `Ok(x)`, `Err(e)`) carry `Unknown` slots which are unified against the
//! surrounding context and rewritten in the recorded types, so lowering
//! only ever sees concrete layouts.
//!
//! Exhaustiveness is shallow: a wildcard or binding arm, both `Bool`
//! literals, or every flat enum variant. Nested patterns are not analysed.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::ast::{
    Block, Expr, ExprId, ExprKind, FunctionDecl, Item, LitKind, Pattern, PatternKind, Program,
    Stmt, StmtKind, TypeRef, UnOp,
};
use crate::diagnostic::Diagnostic;
use crate::intern::{Interner, Symbol};
use crate::resolver::{EnumVariantSymbol, Resolution};
use crate::span::Span;
use crate::types::{Type, TypeName};

#[derive(Debug, Clone)]
pub struct FunctionType {
    pub params: Vec<Type>,
    pub ret: Type,
    pub generic_params: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct EnumVariantInfo {
    pub name: String,
    pub index: u32,
    pub field_types: Vec<Type>,
}

#[derive(Debug, Clone)]
pub struct EnumInfo {
    pub name: String,
    /// Declaration site, blamed by lowering when a payload is rejected.
    pub span: Span,
    pub variants: Vec<EnumVariantInfo>,
}

impl EnumInfo {
    pub fn variant(&self, name: &str) -> Option<&EnumVariantInfo> {
        self.variants.iter().find(|v| v.name == name)
    }
}

pub struct TypedFunction<'a> {
    pub decl: &'a FunctionDecl<'a>,
    pub signature: FunctionType,
    pub expr_types: HashMap<ExprId, Type>,
    pub local_types: HashMap<Symbol, Type>,
}

pub struct TypedProgram<'a> {
    /// Typed functions in source order.
    pub functions: Vec<TypedFunction<'a>>,
    pub enums: BTreeMap<String, EnumInfo>,
    /// Non-fatal, pre-rendered warnings.
    pub warnings: Vec<String>,
}

pub fn check_program<'a>(
    program: &'a Program<'a>,
    resolution: &Resolution<'a>,
    interner: &Interner,
) -> Result<TypedProgram<'a>, Diagnostic> {
    let mut enums = BTreeMap::new();
    for sym in resolution.enums.values() {
        let name = interner.resolve(sym.name).to_string();
        let variants = sym
            .decl
            .variants
            .iter()
            .enumerate()
            .map(|(index, variant)| EnumVariantInfo {
                name: interner.resolve(variant.name).to_string(),
                index: index as u32,
                field_types: variant.fields.iter().map(|f| type_from_ref(f.ty, interner)).collect(),
            })
            .collect();
        enums.insert(name.clone(), EnumInfo { name, span: sym.decl.span, variants });
    }

    // Names that can never stand for a generic parameter: declared enums
    // and structs. Built-ins are excluded structurally by TypeName.
    let mut concrete_names: HashSet<String> = enums.keys().cloned().collect();
    for item in program.items {
        if let Item::Struct(decl) = item {
            concrete_names.insert(interner.resolve(decl.name).to_string());
        }
    }

    let mut fn_types: HashMap<Symbol, FunctionType> = HashMap::new();
    for item in program.items {
        if let Item::Function(decl) = item {
            fn_types.insert(
                decl.name,
                FunctionType {
                    params: decl.params.iter().map(|p| type_from_ref(p.ty, interner)).collect(),
                    ret: opt_type_from_ref(decl.return_type, interner),
                    generic_params: decl
                        .generic_params
                        .iter()
                        .map(|g| interner.resolve(*g).to_string())
                        .collect(),
                },
            );
        }
    }

    let mut warnings = Vec::new();
    let mut functions = Vec::new();
    for item in program.items {
        if let Item::Function(decl) = item {
            if decl.is_task {
                warnings.push(format!(
                    "{}:{}:{}: warning: `task` modifier on '{}' is not compiled",
                    interner.resolve(decl.span.file),
                    decl.span.line,
                    decl.span.col,
                    interner.resolve(decl.name)
                ));
            }
            let checker = FunctionChecker {
                decl,
                fn_types: &fn_types,
                enums: &enums,
                variants_by_name: &resolution.variants_by_name,
                custom_errors: &resolution.errors,
                concrete_names: &concrete_names,
                interner,
                ret: fn_types[&decl.name].ret.clone(),
                vars: HashMap::new(),
                locals: HashMap::new(),
                expr_types: HashMap::new(),
                saw_explicit_return: false,
            };
            functions.push(checker.check()?);
        }
    }
    Ok(TypedProgram { functions, enums, warnings })
}

fn type_from_ref(r: &TypeRef<'_>, interner: &Interner) -> Type {
    let args = r.args.iter().map(|a| type_from_ref(a, interner)).collect();
    let base = Type { name: TypeName::from_text(interner.resolve(r.name)), args };
    if r.is_ref || r.is_mut_ref {
        return Type::reference(base);
    }
    if r.is_ptr || r.is_mut_ptr {
        return Type::pointer(base);
    }
    base
}

fn opt_type_from_ref(r: Option<&TypeRef<'_>>, interner: &Interner) -> Type {
    r.map_or_else(Type::void, |r| type_from_ref(r, interner))
}

#[derive(Clone)]
struct VarState {
    ty: Type,
    mutable: bool,
}

enum PatternShape {
    Wildcard,
    Binding,
    /// `Some(b)` when the literal is the bool `b`.
    Literal(Option<bool>),
    Variant(String),
}

struct FunctionChecker<'a, 'ctx> {
    decl: &'a FunctionDecl<'a>,
    fn_types: &'ctx HashMap<Symbol, FunctionType>,
    enums: &'ctx BTreeMap<String, EnumInfo>,
    variants_by_name: &'ctx HashMap<Symbol, Vec<(Symbol, EnumVariantSymbol<'a>)>>,
    custom_errors: &'ctx HashSet<Symbol>,
    concrete_names: &'ctx HashSet<String>,
    interner: &'ctx Interner,
    ret: Type,
    vars: HashMap<Symbol, VarState>,
    locals: HashMap<Symbol, Type>,
    expr_types: HashMap<ExprId, Type>,
    saw_explicit_return: bool,
}

impl<'a, 'ctx> FunctionChecker<'a, 'ctx> {
    fn check(mut self) -> Result<TypedFunction<'a>, Diagnostic> {
        let signature = self.fn_types[&self.decl.name].clone();
        for (i, p) in self.decl.params.iter().enumerate() {
            self.vars.insert(p.name, VarState { ty: signature.params[i].clone(), mutable: false });
            self.locals.insert(p.name, signature.params[i].clone());
        }
        let body = block_of(self.decl.body)?;
        let body_ty = self.infer_block(body)?;
        ensure_assignable(&self.ret, &body_ty, self.decl.body.span)?;
        if let Some(tail) = body.tail {
            let coerced = coerce_unknown(&self.ret, &body_ty);
            self.expr_types.insert(tail.id, coerced.clone());
            if let ExprKind::Block(inner) = &tail.kind {
                if let Some(inner_tail) = inner.tail {
                    self.expr_types.insert(inner_tail.id, coerced);
                }
            }
        }
        Ok(TypedFunction {
            decl: self.decl,
            signature,
            expr_types: self.expr_types,
            local_types: self.locals,
        })
    }

    fn note(&mut self, expr: &Expr<'a>, ty: Type) -> Type {
        self.expr_types.insert(expr.id, ty.clone());
        ty
    }

    fn infer(&mut self, expr: &'a Expr<'a>) -> Result<Type, Diagnostic> {
        match &expr.kind {
            ExprKind::Literal { kind, .. } => {
                let ty = match kind {
                    LitKind::Int => Type::int(),
                    LitKind::Float => Type::float(),
                    LitKind::Char => Type::char(),
                    LitKind::Bool => Type::bool(),
                    LitKind::Str => Type::string(),
                };
                Ok(self.note(expr, ty))
            }
            ExprKind::Ident(name) => {
                let ty = match self.vars.get(name) {
                    Some(state) => state.ty.clone(),
                    None => {
                        return Err(Diagnostic::error(
                            expr.span,
                            "MD3101",
                            format!("unknown name '{}'", self.interner.resolve(*name)),
                        )
                        .with_hint("declare it first"));
                    }
                };
                Ok(self.note(expr, ty))
            }
            ExprKind::Unary { op, operand } => {
                let inner = self.infer(*operand)?;
                match op {
                    UnOp::Neg => {
                        if !matches!(inner.name, TypeName::Int | TypeName::Float) {
                            return Err(Diagnostic::error(
                                expr.span,
                                "MD3102",
                                format!("type mismatch: expected Int or Float, got {inner}"),
                            ));
                        }
                        Ok(self.note(expr, inner))
                    }
                    UnOp::Not => {
                        ensure_assignable(&Type::bool(), &inner, expr.span)?;
                        Ok(self.note(expr, Type::bool()))
                    }
                    UnOp::Ref | UnOp::RefMut => Ok(self.note(expr, Type::reference(inner))),
                    UnOp::Deref => Err(Diagnostic::error(
                        expr.span,
                        "MD3110",
                        "unsupported unary operator '*'",
                    )),
                }
            }
            ExprKind::Binary { op, left, right } => {
                let left_ty = self.infer(*left)?;
                let right_ty = self.infer(*right)?;
                if left_ty != right_ty {
                    return Err(Diagnostic::error(
                        expr.span,
                        "MD3102",
                        format!("type mismatch: {left_ty} vs {right_ty}"),
                    ));
                }
                let ty = if op.is_arithmetic() { left_ty } else { Type::bool() };
                Ok(self.note(expr, ty))
            }
            ExprKind::Assign { target, value, .. } => {
                let name = match &target.kind {
                    ExprKind::Ident(name) => *name,
                    _ => {
                        return Err(Diagnostic::error(
                            expr.span,
                            "MD3100",
                            "assignment target must be an identifier",
                        ));
                    }
                };
                let state = match self.vars.get(&name) {
                    Some(state) => state.clone(),
                    None => {
                        return Err(Diagnostic::error(
                            expr.span,
                            "MD3101",
                            format!("unknown name '{}'", self.interner.resolve(name)),
                        ));
                    }
                };
                if !state.mutable {
                    return Err(Diagnostic::error(
                        expr.span,
                        "MD3103",
                        format!(
                            "cannot assign to immutable variable '{}'",
                            self.interner.resolve(name)
                        ),
                    )
                    .with_hint("declare it with `var` to allow assignment"));
                }
                let value_ty = self.infer(*value)?;
                ensure_assignable(&state.ty, &value_ty, expr.span)?;
                Ok(self.note(expr, state.ty))
            }
            ExprKind::Call { callee, args } => self.infer_call(expr, callee, args),
            ExprKind::If { cond, then_block, else_branch } => {
                let cond_ty = self.infer(*cond)?;
                ensure_assignable(&Type::bool(), &cond_ty, cond.span)?;
                let then_blk = block_of(then_block)?;
                let then_ty = self.infer_block(then_blk)?;
                let else_ty = match else_branch {
                    Some(els) => self.infer(*els)?,
                    None => Type::void(),
                };
                let merged = merge_branch_types(&then_ty, &else_ty, expr.span)?;
                if let Some(tail) = then_blk.tail {
                    self.expr_types.insert(tail.id, coerce_unknown(&merged, &then_ty));
                }
                if let Some(els) = else_branch {
                    let coerced_else = coerce_unknown(&merged, &else_ty);
                    self.expr_types.insert(els.id, coerced_else.clone());
                    if let ExprKind::Block(block) = &els.kind {
                        if let Some(tail) = block.tail {
                            self.expr_types.insert(tail.id, coerced_else);
                        }
                    }
                }
                Ok(self.note(expr, merged))
            }
            ExprKind::Match { scrutinee, arms } => {
                if arms.is_empty() {
                    return Err(Diagnostic::error(expr.span, "MD3100", "empty match expression"));
                }
                let target_ty = self.infer(*scrutinee)?;
                let mut seen_variants = HashSet::new();
                let mut saw_true = false;
                let mut saw_false = false;
                let mut saw_catch_all = false;
                let mut arm_types = Vec::new();
                for arm in *arms {
                    let saved = self.vars.clone();
                    match self.check_pattern(arm.pattern, &target_ty)? {
                        PatternShape::Wildcard | PatternShape::Binding => saw_catch_all = true,
                        PatternShape::Literal(Some(true)) => saw_true = true,
                        PatternShape::Literal(Some(false)) => saw_false = true,
                        PatternShape::Literal(None) => {}
                        PatternShape::Variant(name) => {
                            seen_variants.insert(name);
                        }
                    }
                    arm_types.push(self.infer(arm.body)?);
                    self.vars = saved;
                }
                let arm_ty = arm_types[0].clone();
                for got in &arm_types[1..] {
                    ensure_assignable(&arm_ty, got, expr.span)?;
                }
                let exhaustive = saw_catch_all
                    || (target_ty == Type::bool() && saw_true && saw_false)
                    || self.variants_for(&target_ty).map_or(false, |variants| {
                        variants.iter().all(|v| seen_variants.contains(&v.name))
                    });
                if !exhaustive {
                    return Err(Diagnostic::error(
                        expr.span,
                        "MD3100",
                        format!("non-exhaustive match over type {target_ty}"),
                    )
                    .with_hint("add missing patterns or a trailing `_ => ...` arm"));
                }
                Ok(self.note(expr, arm_ty))
            }
            ExprKind::Block(block) => {
                let ty = self.infer_block(block)?;
                Ok(self.note(expr, ty))
            }
            ExprKind::Range { .. } => Err(Diagnostic::error(
                expr.span,
                "MD3110",
                "unsupported range expression",
            )
            .with_hint("range lowering is not implemented yet")),
            ExprKind::Try(operand) => {
                let inner = self.infer(*operand)?;
                if inner.name != TypeName::Result || inner.args.len() != 2 {
                    return Err(Diagnostic::error(
                        expr.span,
                        "MD3105",
                        "`?` expects Result[T, E]",
                    ));
                }
                if self.ret.name != TypeName::Result || self.ret.args.len() != 2 {
                    return Err(Diagnostic::error(
                        expr.span,
                        "MD3106",
                        "`?` can only be used in functions returning Result[T, E]",
                    ));
                }
                ensure_assignable(&self.ret.args[1], &inner.args[1], expr.span)?;
                Ok(self.note(expr, inner.args[0].clone()))
            }
            ExprKind::Raise { kind, message } => {
                if !self.custom_errors.contains(kind) {
                    let name = self.interner.resolve(*kind);
                    return Err(Diagnostic::error(
                        expr.span,
                        "MD3111",
                        format!("unknown custom error kind '{name}'"),
                    )
                    .with_hint(format!("declare it first with `error {name}`")));
                }
                if self.ret.name != TypeName::Result || self.ret.args.len() != 2 {
                    return Err(Diagnostic::error(
                        expr.span,
                        "MD3112",
                        "`raise` can only be used in functions returning Result[T, String]",
                    ));
                }
                ensure_assignable(&Type::string(), &self.ret.args[1], expr.span)?;
                let msg_ty = self.infer(*message)?;
                ensure_assignable(&Type::string(), &msg_ty, message.span)?;
                if !matches!(message.kind, ExprKind::Literal { kind: LitKind::Str, .. }) {
                    return Err(Diagnostic::error(
                        message.span,
                        "MD3112",
                        "`raise` message must be a string literal",
                    )
                    .with_hint("example: raise MyError(\"detail\")"));
                }
                Ok(self.note(expr, Type::unknown()))
            }
            ExprKind::Unsafe(inner) => {
                let ty = self.infer_block(block_of(inner)?)?;
                Ok(self.note(expr, ty))
            }
            ExprKind::Spawn(_) => Err(Diagnostic::error(
                expr.span,
                "MD3110",
                "unsupported spawn expression",
            )
            .with_hint("concurrency is not compiled")),
            ExprKind::Await(_) => Err(Diagnostic::error(
                expr.span,
                "MD3110",
                "unsupported await expression",
            )
            .with_hint("concurrency is not compiled")),
            ExprKind::StructInit { .. } => Err(Diagnostic::error(
                expr.span,
                "MD3110",
                "unsupported struct initialization expression",
            )
            .with_hint("struct lowering is not implemented yet")),
        }
    }

    fn infer_call(
        &mut self,
        expr: &'a Expr<'a>,
        callee: &'a Expr<'a>,
        args: &'a [&'a Expr<'a>],
    ) -> Result<Type, Diagnostic> {
        let name = match &callee.kind {
            ExprKind::Ident(name) => *name,
            _ => {
                return Err(Diagnostic::error(
                    expr.span,
                    "MD3100",
                    "only direct function calls are supported",
                ));
            }
        };
        match self.interner.resolve(name) {
            "print" => {
                for arg in args {
                    let arg_ty = self.infer(*arg)?;
                    if !is_printable(&arg_ty) {
                        return Err(Diagnostic::error(
                            arg.span,
                            "MD3110",
                            format!("unsupported print argument type {arg_ty}"),
                        )
                        .with_hint("print supports Int, Float, Bool, Char, and String"));
                    }
                }
                return Ok(self.note(expr, Type::void()));
            }
            "read_file" => {
                if args.len() != 1 {
                    return Err(Diagnostic::error(
                        expr.span,
                        "MD3100",
                        "read_file expects one argument",
                    ));
                }
                let arg_ty = self.infer(args[0])?;
                ensure_assignable(&Type::string(), &arg_ty, args[0].span)?;
                return Ok(self.note(expr, Type::result(Type::string(), Type::string())));
            }
            "Some" => {
                if args.len() != 1 {
                    return Err(Diagnostic::error(expr.span, "MD3100", "Some expects one argument"));
                }
                let inner = self.infer(args[0])?;
                return Ok(self.note(expr, Type::option(inner)));
            }
            "None" => {
                if !args.is_empty() {
                    return Err(Diagnostic::error(expr.span, "MD3100", "None expects no arguments"));
                }
                return Ok(self.note(expr, Type::option(Type::unknown())));
            }
            "Ok" => {
                if args.len() != 1 {
                    return Err(Diagnostic::error(expr.span, "MD3100", "Ok expects one argument"));
                }
                let inner = self.infer(args[0])?;
                return Ok(self.note(expr, Type::result(inner, Type::unknown())));
            }
            "Err" => {
                if args.len() != 1 {
                    return Err(Diagnostic::error(expr.span, "MD3100", "Err expects one argument"));
                }
                let inner = self.infer(args[0])?;
                return Ok(self.note(expr, Type::result(Type::unknown(), inner)));
            }
            _ => {}
        }

        // Bare variant constructor: the name must belong to exactly one
        // enum; match patterns resolve ambiguity via the target type, call
        // sites cannot.
        if let Some(candidates) = self.variants_by_name.get(&name) {
            if candidates.len() > 1 {
                let mut enum_names: Vec<&str> =
                    candidates.iter().map(|(e, _)| self.interner.resolve(*e)).collect();
                enum_names.sort_unstable();
                return Err(Diagnostic::error(
                    expr.span,
                    "MD3109",
                    format!(
                        "ambiguous variant constructor '{}'",
                        self.interner.resolve(name)
                    ),
                )
                .with_hint(format!(
                    "rename variants to avoid ambiguity across enums: {}",
                    enum_names.join(", ")
                )));
            }
            let enum_name = self.interner.resolve(candidates[0].0).to_string();
            let variant_name = self.interner.resolve(name).to_string();
            let field_types = self
                .enums
                .get(&enum_name)
                .and_then(|info| info.variant(&variant_name))
                .map(|v| v.field_types.clone())
                .unwrap_or_default();
            if args.len() != field_types.len() {
                return Err(Diagnostic::error(
                    expr.span,
                    "MD3104",
                    format!(
                        "wrong number of arguments for variant '{}': expected {}, got {}",
                        variant_name,
                        field_types.len(),
                        args.len()
                    ),
                ));
            }
            for (arg, field_ty) in args.iter().zip(&field_types) {
                let arg_ty = self.infer(*arg)?;
                ensure_assignable(field_ty, &arg_ty, arg.span)?;
            }
            return Ok(self.note(expr, Type::named(&enum_name)));
        }

        let sig = match self.fn_types.get(&name) {
            Some(sig) => sig.clone(),
            None => {
                return Err(Diagnostic::error(
                    expr.span,
                    "MD3100",
                    format!("unknown function '{}'", self.interner.resolve(name)),
                ));
            }
        };
        if args.len() != sig.params.len() {
            return Err(Diagnostic::error(
                expr.span,
                "MD3104",
                format!(
                    "wrong number of arguments for '{}': expected {}, got {}",
                    self.interner.resolve(name),
                    sig.params.len(),
                    args.len()
                ),
            ));
        }
        if !sig.generic_params.is_empty() {
            // Call-site monomorphization: bind type variables first-fit
            // against the argument types, then re-check each argument
            // against the substituted signature.
            let mut subst = HashMap::new();
            let mut arg_types = Vec::with_capacity(args.len());
            for (arg, param_ty) in args.iter().zip(&sig.params) {
                let arg_ty = self.infer(*arg)?;
                bind_generic(param_ty, &arg_ty, &mut subst, arg.span, self.concrete_names)?;
                arg_types.push(arg_ty);
            }
            for ((arg, param_ty), arg_ty) in args.iter().zip(&sig.params).zip(&arg_types) {
                let expected = apply_subst(param_ty, &subst);
                ensure_assignable(&expected, arg_ty, arg.span)?;
            }
            return Ok(self.note(expr, apply_subst(&sig.ret, &subst)));
        }
        for (arg, param_ty) in args.iter().zip(&sig.params) {
            let arg_ty = self.infer(*arg)?;
            ensure_assignable(param_ty, &arg_ty, arg.span)?;
        }
        Ok(self.note(expr, sig.ret))
    }

    fn check_pattern(
        &mut self,
        pattern: &'a Pattern<'a>,
        target_ty: &Type,
    ) -> Result<PatternShape, Diagnostic> {
        match &pattern.kind {
            PatternKind::Wildcard => Ok(PatternShape::Wildcard),
            PatternKind::Literal { value, kind } => {
                let lit_ty = match kind {
                    LitKind::Int => Type::int(),
                    LitKind::Float => Type::float(),
                    LitKind::Str => Type::string(),
                    LitKind::Char => Type::char(),
                    LitKind::Bool => Type::bool(),
                };
                ensure_assignable(target_ty, &lit_ty, pattern.span)?;
                let bool_value = match kind {
                    LitKind::Bool => Some(self.interner.text_eq(*value, "true")),
                    _ => None,
                };
                Ok(PatternShape::Literal(bool_value))
            }
            PatternKind::Variant { name, fields } => {
                let variant_name = self.interner.resolve(*name).to_string();
                let variants = match self.variants_for(target_ty) {
                    Some(variants) => variants,
                    None => {
                        return Err(Diagnostic::error(
                            pattern.span,
                            "MD3107",
                            format!(
                                "variant pattern '{variant_name}' requires enum target, got {target_ty}"
                            ),
                        ));
                    }
                };
                let info = match variants.iter().find(|v| v.name == variant_name) {
                    Some(info) => info,
                    None => {
                        return Err(Diagnostic::error(
                            pattern.span,
                            "MD3108",
                            format!(
                                "unknown variant '{variant_name}' for enum '{}'",
                                target_ty.name
                            ),
                        ));
                    }
                };
                if fields.len() != info.field_types.len() {
                    return Err(Diagnostic::error(
                        pattern.span,
                        "MD3100",
                        format!(
                            "variant '{variant_name}' expects {} bindings, got {}",
                            info.field_types.len(),
                            fields.len()
                        ),
                    ));
                }
                for (field, field_ty) in fields.iter().zip(info.field_types.clone()) {
                    self.vars.insert(*field, VarState { ty: field_ty, mutable: false });
                }
                Ok(PatternShape::Variant(variant_name))
            }
            PatternKind::Name(name) => {
                let text = self.interner.resolve(*name).to_string();
                if let Some(variants) = self.variants_for(target_ty) {
                    if let Some(info) = variants.iter().find(|v| v.name == text) {
                        if !info.field_types.is_empty() {
                            return Err(Diagnostic::error(
                                pattern.span,
                                "MD3100",
                                format!(
                                    "variant '{text}' carries payload; use '{text}(...)' pattern"
                                ),
                            ));
                        }
                        return Ok(PatternShape::Variant(text));
                    }
                }
                self.vars.insert(*name, VarState { ty: target_ty.clone(), mutable: false });
                Ok(PatternShape::Binding)
            }
        }
    }

    /// The variant set a match over `ty` may draw from: a declared enum's
    /// variants, or the synthesized `Some`/`None`, `Ok`/`Err` families for
    /// `Option`/`Result` specializations.
    fn variants_for(&self, ty: &Type) -> Option<Vec<EnumVariantInfo>> {
        match &ty.name {
            TypeName::Named(name) => self.enums.get(name).map(|info| info.variants.clone()),
            TypeName::Option if ty.args.len() == 1 => Some(vec![
                EnumVariantInfo {
                    name: "Some".to_string(),
                    index: 0,
                    field_types: vec![ty.args[0].clone()],
                },
                EnumVariantInfo { name: "None".to_string(), index: 1, field_types: vec![] },
            ]),
            TypeName::Result if ty.args.len() == 2 => Some(vec![
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
            ]),
            _ => None,
        }
    }

    fn infer_stmt(&mut self, stmt: &'a Stmt<'a>) -> Result<(), Diagnostic> {
        match &stmt.kind {
            StmtKind::Let { name, ty, value, mutable, inferred } => {
                let value_ty = self.infer(*value)?;
                let out_ty = if *inferred {
                    value_ty.clone()
                } else {
                    opt_type_from_ref(*ty, self.interner)
                };
                ensure_assignable(&out_ty, &value_ty, stmt.span)?;
                self.expr_types.insert(value.id, coerce_unknown(&out_ty, &value_ty));
                self.vars.insert(*name, VarState { ty: out_ty.clone(), mutable: *mutable });
                self.locals.insert(*name, out_ty);
                Ok(())
            }
            StmtKind::Return(value) => {
                self.saw_explicit_return = true;
                let expected = self.ret.clone();
                let actual = match value {
                    Some(value) => self.infer(*value)?,
                    None => Type::void(),
                };
                ensure_assignable(&expected, &actual, stmt.span)?;
                if let Some(value) = value {
                    self.expr_types.insert(value.id, coerce_unknown(&expected, &actual));
                }
                Ok(())
            }
            StmtKind::Expr(expr) => {
                self.infer(*expr)?;
                Ok(())
            }
            StmtKind::Break(_) => Err(Diagnostic::error(
                stmt.span,
                "MD3110",
                "unsupported break statement",
            )
            .with_hint("loop lowering is not implemented yet")),
            StmtKind::Continue => Err(Diagnostic::error(
                stmt.span,
                "MD3110",
                "unsupported continue statement",
            )
            .with_hint("loop lowering is not implemented yet")),
        }
    }

    fn infer_block(&mut self, block: &'a Block<'a>) -> Result<Type, Diagnostic> {
        let saved = self.vars.clone();
        for stmt in block.stmts {
            self.infer_stmt(stmt)?;
        }
        let out = match block.tail {
            Some(tail) => self.infer(tail)?,
            None if self.saw_explicit_return => self.ret.clone(),
            None => Type::void(),
        };
        self.vars = saved;
        Ok(out)
    }
}

fn block_of<'x, 'a>(expr: &'x Expr<'a>) -> Result<&'x Block<'a>, Diagnostic> {
    match &expr.kind {
        ExprKind::Block(block) => Ok(block),
        _ => Err(Diagnostic::error(expr.span, "MD3100", "malformed block expression")),
    }
}

fn is_printable(ty: &Type) -> bool {
    matches!(
        ty.name,
        TypeName::Int | TypeName::Float | TypeName::Bool | TypeName::Char | TypeName::String
    ) && ty.args.is_empty()
}

/// Structural assignability with the `Unknown` escape hatch: equal types
/// match; under equal head and arity, an `Unknown` on either side of any
/// argument position is accepted; a bare `Unknown` unifies with anything.
pub fn assignable(expected: &Type, actual: &Type) -> bool {
    if expected == actual {
        return true;
    }
    if expected.name == actual.name && expected.args.len() == actual.args.len() {
        let all_ok = expected
            .args
            .iter()
            .zip(&actual.args)
            .all(|(e, a)| e.is_unknown() || a.is_unknown() || e == a);
        if all_ok {
            return true;
        }
    }
    expected.is_unknown() || actual.is_unknown()
}

pub fn ensure_assignable(expected: &Type, actual: &Type, span: Span) -> Result<(), Diagnostic> {
    if assignable(expected, actual) {
        return Ok(());
    }
    Err(Diagnostic::error(
        span,
        "MD3102",
        format!("type mismatch: expected {expected}, got {actual}"),
    ))
}

/// Rewrites `Unknown` slots in `actual` using `expected`, so recorded
/// expression types are concrete by the time lowering reads them.
pub fn coerce_unknown(expected: &Type, actual: &Type) -> Type {
    if expected.name == actual.name && expected.args.len() == actual.args.len() {
        let args = expected
            .args
            .iter()
            .zip(&actual.args)
            .map(|(e, a)| {
                if a.is_unknown() {
                    e.clone()
                } else if e.is_unknown() {
                    a.clone()
                } else {
                    coerce_unknown(e, a)
                }
            })
            .collect();
        return Type { name: expected.name.clone(), args };
    }
    if actual.is_unknown() {
        return expected.clone();
    }
    actual.clone()
}

fn merge_branch_types(left: &Type, right: &Type, span: Span) -> Result<Type, Diagnostic> {
    if left == right {
        return Ok(left.clone());
    }
    if assignable(left, right) {
        return Ok(coerce_unknown(left, right));
    }
    if assignable(right, left) {
        return Ok(coerce_unknown(right, left));
    }
    Err(Diagnostic::error(
        span,
        "MD3102",
        format!("if branches type mismatch: {left} vs {right}"),
    ))
}

/// A bare capitalised name that is neither built-in nor a declared
/// enum/struct stands for a generic parameter in signature position.
fn is_type_variable(ty: &Type, concrete_names: &HashSet<String>) -> Option<String> {
    if !ty.args.is_empty() {
        return None;
    }
    match &ty.name {
        TypeName::Named(name)
            if !concrete_names.contains(name)
                && name.chars().next().map_or(false, |c| c.is_ascii_uppercase()) =>
        {
            Some(name.clone())
        }
        _ => None,
    }
}

fn bind_generic(
    expected: &Type,
    actual: &Type,
    subst: &mut HashMap<String, Type>,
    span: Span,
    concrete_names: &HashSet<String>,
) -> Result<(), Diagnostic> {
    if let Some(var) = is_type_variable(expected, concrete_names) {
        return match subst.get(&var) {
            None => {
                subst.insert(var, actual.clone());
                Ok(())
            }
            Some(prev) => ensure_assignable(prev, actual, span),
        };
    }
    if expected.name != actual.name || expected.args.len() != actual.args.len() {
        return Err(Diagnostic::error(
            span,
            "MD3102",
            format!("type mismatch: expected {expected}, got {actual}"),
        ));
    }
    for (e, a) in expected.args.iter().zip(&actual.args) {
        bind_generic(e, a, subst, span, concrete_names)?;
    }
    Ok(())
}

fn apply_subst(ty: &Type, subst: &HashMap<String, Type>) -> Type {
    if ty.args.is_empty() {
        if let TypeName::Named(name) = &ty.name {
            if let Some(bound) = subst.get(name) {
                return bound.clone();
            }
        }
        return ty.clone();
    }
    Type { name: ty.name.clone(), args: ty.args.iter().map(|a| apply_subst(a, subst)).collect() }
}
