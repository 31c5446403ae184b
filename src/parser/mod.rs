//! Recursive-descent parser: tokens to AST.
//!
//! Statements and items are separated by newlines or semicolons (either,
//! both, or several). The first error aborts the parse; there is no
//! recovery. Grammar entry points for expressions and patterns live in the
//! [`expr`] and [`pattern`] submodules.

mod expr;
mod pattern;

pub use expr::ExprParsing;
pub use pattern::PatternParsing;

use crate::arena::Arena;
use crate::ast::{
    BinOp, EnumDecl, EnumVariant, ErrorDecl, Expr, ExprId, ExprKind, ExternFunctionDecl,
    FunctionDecl, FunctionSig, ImportDecl, Item, Param, Program, StructDecl, StructField,
    TraitDecl, TypeRef,
};
use crate::diagnostic::Diagnostic;
use crate::intern::Interner;
use crate::token::{Token, TokenKind};

pub type ParseResult<T> = Result<T, Diagnostic>;

/// Parses a whole token stream into a [`Program`].
pub fn parse<'a>(
    tokens: Vec<Token>,
    arena: &'a Arena,
    interner: &Interner,
) -> ParseResult<Program<'a>> {
    Parser::new(tokens, arena, interner).parse_program()
}

pub struct Parser<'a, 'i> {
    tokens: Vec<Token>,
    pos: usize,
    arena: &'a Arena,
    interner: &'i Interner,
    next_expr_id: u32,
}

impl<'a, 'i> Parser<'a, 'i> {
    pub fn new(tokens: Vec<Token>, arena: &'a Arena, interner: &'i Interner) -> Self {
        Parser { tokens, pos: 0, arena, interner, next_expr_id: 0 }
    }

    pub fn parse_program(mut self) -> ParseResult<Program<'a>> {
        let mut items = Vec::new();
        self.skip_separators();
        while !self.check(TokenKind::Eof) {
            items.push(self.parse_item()?);
            self.skip_separators();
        }
        let span = match (items.first(), items.last()) {
            (Some(first), Some(last)) => first.span().to(last.span()),
            _ => self.peek().span,
        };
        Ok(Program { span, items: self.arena.alloc_slice(items) })
    }

    fn parse_item(&mut self) -> ParseResult<Item<'a>> {
        let is_pub = self.eat(TokenKind::Pub);
        let is_task = self.eat(TokenKind::Task);
        if self.eat(TokenKind::Import) {
            if is_pub || is_task {
                return Err(self.error_here("`import` cannot be prefixed with pub or task"));
            }
            return self.parse_import();
        }
        if self.eat(TokenKind::Fn) {
            return self.parse_fn(is_pub, is_task);
        }
        if self.eat(TokenKind::Extern) {
            return self.parse_extern_fn();
        }
        if self.eat(TokenKind::Struct) {
            return self.parse_struct();
        }
        if self.eat(TokenKind::Enum) {
            return self.parse_enum();
        }
        if self.eat(TokenKind::Trait) {
            return self.parse_trait();
        }
        if self.eat(TokenKind::Error) {
            return self.parse_error_decl();
        }
        Err(self
            .error_here("expected item")
            .with_hint("start with import/fn/struct/enum/trait/extern/error"))
    }

    fn parse_import(&mut self) -> ParseResult<Item<'a>> {
        let path = self.expect(
            TokenKind::Str,
            "expected import path string, e.g. \"./util.mdr\"",
        )?;
        Ok(Item::Import(ImportDecl { span: path.span, path: path.lexeme }))
    }

    fn parse_fn(&mut self, is_pub: bool, is_task: bool) -> ParseResult<Item<'a>> {
        let name = self.expect(TokenKind::Ident, "expected function name")?;
        let generic_params = self.parse_generic_params()?;
        self.expect(TokenKind::LParen, "expected '('")?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen, "expected ')'")?;
        let return_type = self.parse_optional_return()?;
        let body = self.parse_block_expr()?;
        Ok(Item::Function(FunctionDecl {
            span: name.span.to(body.span),
            name: name.lexeme,
            generic_params,
            params,
            return_type,
            body,
            is_task,
            is_pub,
        }))
    }

    fn parse_extern_fn(&mut self) -> ParseResult<Item<'a>> {
        let abi = if self.check(TokenKind::Str) { Some(self.advance().lexeme) } else { None };
        self.expect(TokenKind::Fn, "expected fn in extern declaration")?;
        let name = self.expect(TokenKind::Ident, "expected extern function name")?;
        self.expect(TokenKind::LParen, "expected '('")?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen, "expected ')'")?;
        let return_type = self.parse_optional_return()?;
        Ok(Item::ExternFunction(ExternFunctionDecl {
            span: name.span.to(self.prev().span),
            abi,
            name: name.lexeme,
            params,
            return_type,
        }))
    }

    fn parse_struct(&mut self) -> ParseResult<Item<'a>> {
        let name = self.expect(TokenKind::Ident, "expected struct name")?;
        self.expect(TokenKind::LBrace, "expected '{'")?;
        let mut fields = Vec::new();
        self.skip_separators();
        while !self.check(TokenKind::RBrace) {
            fields.push(self.parse_field()?);
            self.eat(TokenKind::Comma);
            self.skip_separators();
        }
        let end = self.expect(TokenKind::RBrace, "expected '}'")?;
        Ok(Item::Struct(StructDecl {
            span: name.span.to(end.span),
            name: name.lexeme,
            fields: self.arena.alloc_slice(fields),
        }))
    }

    fn parse_enum(&mut self) -> ParseResult<Item<'a>> {
        let name = self.expect(TokenKind::Ident, "expected enum name")?;
        self.expect(TokenKind::LBrace, "expected '{'")?;
        let mut variants = Vec::new();
        self.skip_separators();
        while !self.check(TokenKind::RBrace) {
            let var_name = self.expect(TokenKind::Ident, "expected variant name")?;
            let mut fields = Vec::new();
            if self.eat(TokenKind::LParen) {
                self.skip_separators();
                while !self.check(TokenKind::RParen) {
                    fields.push(self.parse_field()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                    self.skip_separators();
                }
                self.expect(TokenKind::RParen, "expected ')'")?;
            }
            variants.push(EnumVariant {
                span: var_name.span.to(self.prev().span),
                name: var_name.lexeme,
                fields: self.arena.alloc_slice(fields),
            });
            self.eat(TokenKind::Comma);
            self.skip_separators();
        }
        let end = self.expect(TokenKind::RBrace, "expected '}'")?;
        Ok(Item::Enum(EnumDecl {
            span: name.span.to(end.span),
            name: name.lexeme,
            variants: self.arena.alloc_slice(variants),
        }))
    }

    fn parse_trait(&mut self) -> ParseResult<Item<'a>> {
        let name = self.expect(TokenKind::Ident, "expected trait name")?;
        self.expect(TokenKind::LBrace, "expected '{'")?;
        let mut methods = Vec::new();
        self.skip_separators();
        while !self.check(TokenKind::RBrace) {
            self.expect(TokenKind::Fn, "expected fn method declaration")?;
            let m_name = self.expect(TokenKind::Ident, "expected method name")?;
            let generic_params = self.parse_generic_params()?;
            self.expect(TokenKind::LParen, "expected '('")?;
            let params = self.parse_params()?;
            self.expect(TokenKind::RParen, "expected ')'")?;
            let return_type = self.parse_optional_return()?;
            methods.push(FunctionSig {
                span: m_name.span.to(self.prev().span),
                name: m_name.lexeme,
                generic_params,
                params,
                return_type,
            });
            self.skip_separators();
        }
        let end = self.expect(TokenKind::RBrace, "expected '}'")?;
        Ok(Item::Trait(TraitDecl {
            span: name.span.to(end.span),
            name: name.lexeme,
            methods: self.arena.alloc_slice(methods),
        }))
    }

    fn parse_error_decl(&mut self) -> ParseResult<Item<'a>> {
        let name = self.expect(TokenKind::Ident, "expected custom error name")?;
        Ok(Item::Error(ErrorDecl { span: name.span, name: name.lexeme }))
    }

    fn parse_field(&mut self) -> ParseResult<StructField<'a>> {
        let name = self.expect(TokenKind::Ident, "expected field name")?;
        self.expect(TokenKind::Colon, "expected ':'")?;
        let ty = self.parse_type()?;
        Ok(StructField { span: name.span.to(ty.span), name: name.lexeme, ty })
    }

    fn parse_params(&mut self) -> ParseResult<&'a [Param<'a>]> {
        let mut params = Vec::new();
        self.skip_separators();
        while !self.check(TokenKind::RParen) {
            let name = self.expect(TokenKind::Ident, "expected parameter name")?;
            self.expect(TokenKind::Colon, "expected ':'")?;
            let ty = self.parse_type()?;
            params.push(Param { span: name.span.to(ty.span), name: name.lexeme, ty });
            if !self.eat(TokenKind::Comma) {
                break;
            }
            self.skip_separators();
        }
        Ok(self.arena.alloc_slice(params))
    }

    fn parse_optional_return(&mut self) -> ParseResult<Option<&'a TypeRef<'a>>> {
        if self.eat(TokenKind::Arrow) {
            return Ok(Some(self.parse_type()?));
        }
        Ok(None)
    }

    /// `[T, U: Bound]`. Trait bounds are parsed and discarded (reserved).
    fn parse_generic_params(&mut self) -> ParseResult<&'a [crate::intern::Symbol]> {
        let mut params = Vec::new();
        if !self.eat(TokenKind::LBracket) {
            return Ok(self.arena.alloc_slice(params));
        }
        loop {
            params.push(self.expect(TokenKind::Ident, "expected generic parameter name")?.lexeme);
            if self.eat(TokenKind::Colon) {
                self.expect(TokenKind::Ident, "expected trait bound name")?;
            }
            if self.eat(TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RBracket, "expected ']'")?;
            break;
        }
        Ok(self.arena.alloc_slice(params))
    }

    fn parse_type(&mut self) -> ParseResult<&'a TypeRef<'a>> {
        let mut is_ref = false;
        let mut is_mut_ref = false;
        let mut is_ptr = false;
        let mut is_mut_ptr = false;
        if self.eat(TokenKind::Amp) {
            is_ref = true;
            if self.check_ident_text("mut") {
                self.advance();
                is_mut_ref = true;
            }
        }
        if self.eat(TokenKind::Star) {
            is_ptr = true;
            if self.check_ident_text("mut") {
                self.advance();
                is_mut_ptr = true;
            }
        }
        let name = self.expect(TokenKind::Ident, "expected type name")?;
        let mut args = Vec::new();
        if self.eat(TokenKind::LBracket) {
            loop {
                args.push(self.parse_type()?);
                if self.eat(TokenKind::Comma) {
                    continue;
                }
                self.expect(TokenKind::RBracket, "expected ']'")?;
                break;
            }
        }
        Ok(self.arena.alloc(TypeRef {
            span: name.span.to(self.prev().span),
            name: name.lexeme,
            args: self.arena.alloc_slice(args),
            is_ref,
            is_mut_ref,
            is_ptr,
            is_mut_ptr,
        }))
    }

    // ---- cursor helpers -------------------------------------------------

    fn alloc_expr(&mut self, span: crate::span::Span, kind: ExprKind<'a>) -> &'a Expr<'a> {
        let id = ExprId(self.next_expr_id);
        self.next_expr_id += 1;
        self.arena.alloc(Expr { id, span, kind })
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
        if self.check(kind) {
            return Ok(self.advance());
        }
        Err(self.error_here(message))
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            return true;
        }
        false
    }

    fn eat_binop(&mut self, table: &[(TokenKind, BinOp)]) -> Option<BinOp> {
        for (kind, op) in table {
            if self.check(*kind) {
                self.advance();
                return Some(*op);
            }
        }
        None
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn check_any(&self, kinds: &[TokenKind]) -> bool {
        kinds.iter().any(|k| self.check(*k))
    }

    fn check_ident_text(&self, text: &str) -> bool {
        self.check(TokenKind::Ident) && self.interner.text_eq(self.peek().lexeme, text)
    }

    fn ident_starts_uppercase(&self, sym: crate::intern::Symbol) -> bool {
        self.interner
            .resolve(sym)
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_uppercase())
    }

    fn skip_separators(&mut self) {
        while self.check(TokenKind::Newline) || self.check(TokenKind::Semi) {
            self.advance();
        }
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn peek(&self) -> Token {
        self.tokens[self.pos]
    }

    fn prev(&self) -> Token {
        self.tokens[self.pos.saturating_sub(1)]
    }

    /// Error at the current token. `expected ...` messages get the
    /// dedicated parse-error code; anything else is a generic shape
    /// mismatch.
    fn error_here(&self, message: &str) -> Diagnostic {
        let code = if message.starts_with("expected ") { "MD2001" } else { "MD2000" };
        Diagnostic::error(self.peek().span, code, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::StmtKind;
    use crate::lexer::tokenize;

    fn parse_source<'a>(
        source: &str,
        arena: &'a Arena,
        interner: &mut Interner,
    ) -> ParseResult<Program<'a>> {
        let tokens = tokenize(source, "parse.mdr", interner)?;
        parse(tokens, arena, interner)
    }

    #[test]
    fn function_with_if_tail() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let program = parse_source(
            "fn score_label(score: Int) -> String {\n  if score > 90 { \"A\" } else { \"B\" }\n}",
            &arena,
            &mut interner,
        )
        .expect("parse");
        assert_eq!(program.items.len(), 1);
        let decl = match &program.items[0] {
            Item::Function(decl) => decl,
            other => panic!("expected function, got {other:?}"),
        };
        assert!(interner.text_eq(decl.name, "score_label"));
        assert_eq!(decl.params.len(), 1);
        let block = decl.body.block().expect("body block");
        assert!(block.stmts.is_empty());
        let tail = block.tail.expect("if tail");
        assert!(matches!(tail.kind, ExprKind::If { .. }));
    }

    #[test]
    fn enum_and_match_items() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let program = parse_source(
            "enum Token { Int(value: Int), Plus }\nfn main() -> Int {\n  let x := 1\n  match x { 1 => 10, _ => 0 }\n}",
            &arena,
            &mut interner,
        )
        .expect("parse");
        assert_eq!(program.items.len(), 2);
        match &program.items[0] {
            Item::Enum(decl) => {
                assert_eq!(decl.variants.len(), 2);
                assert_eq!(decl.variants[0].fields.len(), 1);
                assert!(decl.variants[1].fields.is_empty());
            }
            other => panic!("expected enum, got {other:?}"),
        }
    }

    #[test]
    fn separators_are_newlines_or_semicolons() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let program = parse_source(
            "fn main() -> Int { let a := 1; let b := 2\n\n;; a + b }",
            &arena,
            &mut interner,
        )
        .expect("parse");
        let decl = match &program.items[0] {
            Item::Function(decl) => decl,
            other => panic!("expected function, got {other:?}"),
        };
        let block = decl.body.block().expect("block");
        assert_eq!(block.stmts.len(), 2);
        assert!(block.tail.is_some());
    }

    #[test]
    fn statement_expression_without_separator_becomes_tail() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let program =
            parse_source("fn main() -> Int { print(1); 0 }", &arena, &mut interner).expect("parse");
        let decl = match &program.items[0] {
            Item::Function(decl) => decl,
            other => panic!("expected function, got {other:?}"),
        };
        let block = decl.body.block().expect("block");
        assert_eq!(block.stmts.len(), 1);
        assert!(matches!(block.stmts[0].kind, StmtKind::Expr(_)));
        assert!(block.tail.is_some());
    }

    #[test]
    fn struct_init_requires_uppercase_head() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let program = parse_source(
            "struct Point { x: Int, y: Int }\nfn main() -> Int { let p := Point { x: 1, y: 2 }\n 0 }",
            &arena,
            &mut interner,
        )
        .expect("parse");
        let decl = match &program.items[1] {
            Item::Function(decl) => decl,
            other => panic!("expected function, got {other:?}"),
        };
        let block = decl.body.block().expect("block");
        match &block.stmts[0].kind {
            StmtKind::Let { value, .. } => {
                assert!(matches!(value.kind, ExprKind::StructInit { .. }));
            }
            other => panic!("expected let, got {other:?}"),
        }
    }

    #[test]
    fn error_report_carries_span_and_code() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let err = parse_source("fn main( { 0 }", &arena, &mut interner).expect_err("parse error");
        assert_eq!(err.code, "MD2001");
        assert!(err.message.starts_with("expected "));
        let rendered = err.render(&interner);
        assert!(rendered.starts_with("parse.mdr:1:"), "got {rendered}");
    }

    #[test]
    fn generic_params_with_bounds_parse() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let program = parse_source(
            "fn identity[T](value: T) -> T { value }\nfn main() -> Int { identity(3) }",
            &arena,
            &mut interner,
        )
        .expect("parse");
        let decl = match &program.items[0] {
            Item::Function(decl) => decl,
            other => panic!("expected function, got {other:?}"),
        };
        assert_eq!(decl.generic_params.len(), 1);
        assert!(interner.text_eq(decl.generic_params[0], "T"));
    }

    #[test]
    fn reference_and_pointer_type_qualifiers() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let program = parse_source(
            "fn peek(s: &String, p: *mut Int) -> Int { 0 }\nfn main() -> Int { 0 }",
            &arena,
            &mut interner,
        )
        .expect("parse");
        let decl = match &program.items[0] {
            Item::Function(decl) => decl,
            other => panic!("expected function, got {other:?}"),
        };
        assert!(decl.params[0].ty.is_ref);
        assert!(!decl.params[0].ty.is_mut_ref);
        assert!(decl.params[1].ty.is_ptr);
        assert!(decl.params[1].ty.is_mut_ptr);
    }
}
