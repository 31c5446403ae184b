//! Statement and expression grammar.
//!
//! Precedence, low to high: assignment (right-associative, compound forms
//! included); range; `||`; `&&`; equality; comparison; additive;
//! multiplicative; unary prefix; postfix (call, `?`). `if`, `match`,
//! `unsafe` blocks, and bare `{...}` are expressions.

use super::pattern::PatternParsing;
use super::{ParseResult, Parser};
use crate::ast::{
    AssignOp, BinOp, Block, Expr, ExprKind, FieldInit, LitKind, MatchArm, Stmt, StmtKind, UnOp,
};
use crate::token::TokenKind;

pub trait ExprParsing<'a> {
    fn parse_block_expr(&mut self) -> ParseResult<&'a Expr<'a>>;
    fn starts_stmt(&self) -> bool;
    fn parse_stmt(&mut self) -> ParseResult<Stmt<'a>>;
    fn parse_let(&mut self, mutable: bool) -> ParseResult<Stmt<'a>>;
    fn parse_expr(&mut self) -> ParseResult<&'a Expr<'a>>;
    fn parse_assignment(&mut self) -> ParseResult<&'a Expr<'a>>;
    fn eat_assign_op(&mut self) -> Option<AssignOp>;
    fn parse_range_expr(&mut self) -> ParseResult<&'a Expr<'a>>;
    fn parse_or(&mut self) -> ParseResult<&'a Expr<'a>>;
    fn parse_and(&mut self) -> ParseResult<&'a Expr<'a>>;
    fn parse_equality(&mut self) -> ParseResult<&'a Expr<'a>>;
    fn parse_comparison(&mut self) -> ParseResult<&'a Expr<'a>>;
    fn parse_term(&mut self) -> ParseResult<&'a Expr<'a>>;
    fn parse_factor(&mut self) -> ParseResult<&'a Expr<'a>>;
    fn parse_unary(&mut self) -> ParseResult<&'a Expr<'a>>;
    fn parse_postfix(&mut self) -> ParseResult<&'a Expr<'a>>;
    fn parse_primary(&mut self) -> ParseResult<&'a Expr<'a>>;
    fn parse_if_expr(&mut self) -> ParseResult<&'a Expr<'a>>;
    fn parse_match_expr(&mut self) -> ParseResult<&'a Expr<'a>>;
}

impl<'a, 'i> ExprParsing<'a> for Parser<'a, 'i> {
    fn parse_block_expr(&mut self) -> ParseResult<&'a Expr<'a>> {
        let start = self.expect(TokenKind::LBrace, "expected '{'")?;
        self.skip_separators();
        let mut stmts: Vec<Stmt<'a>> = Vec::new();
        let mut tail = None;
        while !self.check(TokenKind::RBrace) {
            if self.starts_stmt() {
                stmts.push(self.parse_stmt()?);
                self.skip_separators();
                continue;
            }
            let expr = self.parse_expr()?;
            if self.eat(TokenKind::Semi) {
                stmts.push(Stmt { span: expr.span, kind: StmtKind::Expr(expr) });
                self.skip_separators();
            } else if self.check(TokenKind::Newline) {
                self.advance();
                if self.check(TokenKind::RBrace) {
                    tail = Some(expr);
                    break;
                }
                stmts.push(Stmt { span: expr.span, kind: StmtKind::Expr(expr) });
                self.skip_separators();
            } else {
                tail = Some(expr);
                break;
            }
        }
        let end = self.expect(TokenKind::RBrace, "expected '}'")?;
        let stmts = self.arena.alloc_slice(stmts);
        Ok(self.alloc_expr(start.span.to(end.span), ExprKind::Block(Block { stmts, tail })))
    }

    fn starts_stmt(&self) -> bool {
        self.check_any(&[
            TokenKind::Let,
            TokenKind::Var,
            TokenKind::Return,
            TokenKind::Break,
            TokenKind::Continue,
        ])
    }

    fn parse_stmt(&mut self) -> ParseResult<Stmt<'a>> {
        if self.eat(TokenKind::Let) {
            return self.parse_let(false);
        }
        if self.eat(TokenKind::Var) {
            return self.parse_let(true);
        }
        if self.eat(TokenKind::Return) {
            let kw = self.prev();
            if self.check_any(&[TokenKind::Semi, TokenKind::Newline, TokenKind::RBrace]) {
                return Ok(Stmt { span: kw.span, kind: StmtKind::Return(None) });
            }
            let expr = self.parse_expr()?;
            return Ok(Stmt { span: kw.span.to(expr.span), kind: StmtKind::Return(Some(expr)) });
        }
        if self.eat(TokenKind::Break) {
            let kw = self.prev();
            if self.check_any(&[TokenKind::Semi, TokenKind::Newline, TokenKind::RBrace]) {
                return Ok(Stmt { span: kw.span, kind: StmtKind::Break(None) });
            }
            let expr = self.parse_expr()?;
            return Ok(Stmt { span: kw.span.to(expr.span), kind: StmtKind::Break(Some(expr)) });
        }
        if self.eat(TokenKind::Continue) {
            return Ok(Stmt { span: self.prev().span, kind: StmtKind::Continue });
        }
        Err(self.error_here("expected statement"))
    }

    fn parse_let(&mut self, mutable: bool) -> ParseResult<Stmt<'a>> {
        let name = self.expect(TokenKind::Ident, "expected variable name")?;
        let mut ty = None;
        let mut inferred = false;
        if self.eat(TokenKind::ColonEq) {
            inferred = true;
        } else {
            if self.eat(TokenKind::Colon) {
                ty = Some(self.parse_type()?);
            }
            self.expect(TokenKind::Eq, "expected '=' or ':='")?;
        }
        let value = self.parse_expr()?;
        Ok(Stmt {
            span: name.span.to(value.span),
            kind: StmtKind::Let { name: name.lexeme, ty, value, mutable, inferred },
        })
    }

    fn parse_expr(&mut self) -> ParseResult<&'a Expr<'a>> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> ParseResult<&'a Expr<'a>> {
        let expr = self.parse_range_expr()?;
        if let Some(op) = self.eat_assign_op() {
            let value = self.parse_assignment()?;
            return Ok(self.alloc_expr(
                expr.span.to(value.span),
                ExprKind::Assign { op, target: expr, value },
            ));
        }
        Ok(expr)
    }

    fn eat_assign_op(&mut self) -> Option<AssignOp> {
        let op = match self.peek().kind {
            TokenKind::Eq => AssignOp::Assign,
            TokenKind::PlusEq => AssignOp::Add,
            TokenKind::MinusEq => AssignOp::Sub,
            TokenKind::StarEq => AssignOp::Mul,
            TokenKind::SlashEq => AssignOp::Div,
            TokenKind::PercentEq => AssignOp::Rem,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn parse_range_expr(&mut self) -> ParseResult<&'a Expr<'a>> {
        let expr = self.parse_or()?;
        if self.eat(TokenKind::DotDot) {
            let end = self.parse_or()?;
            return Ok(self.alloc_expr(
                expr.span.to(end.span),
                ExprKind::Range { start: expr, end, inclusive: false },
            ));
        }
        if self.eat(TokenKind::DotDotEq) {
            let end = self.parse_or()?;
            return Ok(self.alloc_expr(
                expr.span.to(end.span),
                ExprKind::Range { start: expr, end, inclusive: true },
            ));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> ParseResult<&'a Expr<'a>> {
        let mut expr = self.parse_and()?;
        while let Some(op) = self.eat_binop(&[(TokenKind::OrOr, BinOp::Or)]) {
            let right = self.parse_and()?;
            expr = self.alloc_expr(
                expr.span.to(right.span),
                ExprKind::Binary { op, left: expr, right },
            );
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> ParseResult<&'a Expr<'a>> {
        let mut expr = self.parse_equality()?;
        while let Some(op) = self.eat_binop(&[(TokenKind::AndAnd, BinOp::And)]) {
            let right = self.parse_equality()?;
            expr = self.alloc_expr(
                expr.span.to(right.span),
                ExprKind::Binary { op, left: expr, right },
            );
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> ParseResult<&'a Expr<'a>> {
        let mut expr = self.parse_comparison()?;
        while let Some(op) =
            self.eat_binop(&[(TokenKind::EqEq, BinOp::Eq), (TokenKind::Ne, BinOp::Ne)])
        {
            let right = self.parse_comparison()?;
            expr = self.alloc_expr(
                expr.span.to(right.span),
                ExprKind::Binary { op, left: expr, right },
            );
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> ParseResult<&'a Expr<'a>> {
        let mut expr = self.parse_term()?;
        while let Some(op) = self.eat_binop(&[
            (TokenKind::Lt, BinOp::Lt),
            (TokenKind::Le, BinOp::Le),
            (TokenKind::Gt, BinOp::Gt),
            (TokenKind::Ge, BinOp::Ge),
        ]) {
            let right = self.parse_term()?;
            expr = self.alloc_expr(
                expr.span.to(right.span),
                ExprKind::Binary { op, left: expr, right },
            );
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> ParseResult<&'a Expr<'a>> {
        let mut expr = self.parse_factor()?;
        while let Some(op) =
            self.eat_binop(&[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Sub)])
        {
            let right = self.parse_factor()?;
            expr = self.alloc_expr(
                expr.span.to(right.span),
                ExprKind::Binary { op, left: expr, right },
            );
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> ParseResult<&'a Expr<'a>> {
        let mut expr = self.parse_unary()?;
        while let Some(op) = self.eat_binop(&[
            (TokenKind::Star, BinOp::Mul),
            (TokenKind::Slash, BinOp::Div),
            (TokenKind::Percent, BinOp::Rem),
        ]) {
            let right = self.parse_unary()?;
            expr = self.alloc_expr(
                expr.span.to(right.span),
                ExprKind::Binary { op, left: expr, right },
            );
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> ParseResult<&'a Expr<'a>> {
        let tok = self.peek();
        let op = match tok.kind {
            TokenKind::Await => {
                self.advance();
                let operand = self.parse_unary()?;
                return Ok(self.alloc_expr(tok.span.to(operand.span), ExprKind::Await(operand)));
            }
            TokenKind::Spawn => {
                self.advance();
                let operand = self.parse_unary()?;
                return Ok(self.alloc_expr(tok.span.to(operand.span), ExprKind::Spawn(operand)));
            }
            TokenKind::Bang => UnOp::Not,
            TokenKind::Minus => UnOp::Neg,
            TokenKind::Star => UnOp::Deref,
            TokenKind::Amp => UnOp::Ref,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let op = if op == UnOp::Ref && self.check_ident_text("mut") {
            self.advance();
            UnOp::RefMut
        } else {
            op
        };
        let operand = self.parse_unary()?;
        Ok(self.alloc_expr(tok.span.to(operand.span), ExprKind::Unary { op, operand }))
    }

    fn parse_postfix(&mut self) -> ParseResult<&'a Expr<'a>> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(TokenKind::LParen) {
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let end = self.expect(TokenKind::RParen, "expected ')'")?;
                let args = self.arena.alloc_slice(args);
                expr = self.alloc_expr(expr.span.to(end.span), ExprKind::Call { callee: expr, args });
                continue;
            }
            if self.eat(TokenKind::Question) {
                expr = self.alloc_expr(expr.span.to(self.prev().span), ExprKind::Try(expr));
                continue;
            }
            break;
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<&'a Expr<'a>> {
        let tok = self.peek();
        let lit_kind = match tok.kind {
            TokenKind::Int => Some(LitKind::Int),
            TokenKind::Float => Some(LitKind::Float),
            TokenKind::Str => Some(LitKind::Str),
            TokenKind::Char => Some(LitKind::Char),
            TokenKind::True | TokenKind::False => Some(LitKind::Bool),
            _ => None,
        };
        if let Some(kind) = lit_kind {
            self.advance();
            return Ok(self.alloc_expr(tok.span, ExprKind::Literal { value: tok.lexeme, kind }));
        }
        if self.eat(TokenKind::Ident) {
            let ident = self.prev();
            // `Name { ... }` is a struct initializer only for capitalized
            // names, so `if cond {` keeps parsing as a block.
            if self.check(TokenKind::LBrace) && self.ident_starts_uppercase(ident.lexeme) {
                self.advance();
                let mut fields = Vec::new();
                while !self.check(TokenKind::RBrace) {
                    let name = self.expect(TokenKind::Ident, "expected field name")?;
                    self.expect(TokenKind::Colon, "expected ':'")?;
                    let value = self.parse_expr()?;
                    fields.push(FieldInit {
                        span: name.span.to(value.span),
                        name: name.lexeme,
                        value,
                    });
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                let end = self.expect(TokenKind::RBrace, "expected '}'")?;
                let fields = self.arena.alloc_slice(fields);
                return Ok(self.alloc_expr(
                    ident.span.to(end.span),
                    ExprKind::StructInit { name: ident.lexeme, fields },
                ));
            }
            return Ok(self.alloc_expr(ident.span, ExprKind::Ident(ident.lexeme)));
        }
        if self.eat(TokenKind::LParen) {
            let expr = self.parse_expr()?;
            self.expect(TokenKind::RParen, "expected ')'")?;
            return Ok(expr);
        }
        if self.check(TokenKind::LBrace) {
            return self.parse_block_expr();
        }
        if self.eat(TokenKind::If) {
            return self.parse_if_expr();
        }
        if self.eat(TokenKind::Match) {
            return self.parse_match_expr();
        }
        if self.eat(TokenKind::Unsafe) {
            let marker = self.prev();
            let block = self.parse_block_expr()?;
            return Ok(self.alloc_expr(marker.span.to(block.span), ExprKind::Unsafe(block)));
        }
        if self.eat(TokenKind::Raise) {
            let marker = self.prev();
            let kind = self.expect(TokenKind::Ident, "expected custom error name after raise")?;
            self.expect(TokenKind::LParen, "expected '(' after custom error name")?;
            let message = self.parse_expr()?;
            let end = self.expect(TokenKind::RParen, "expected ')'")?;
            return Ok(self.alloc_expr(
                marker.span.to(end.span),
                ExprKind::Raise { kind: kind.lexeme, message },
            ));
        }
        Err(self.error_here("expected expression"))
    }

    fn parse_if_expr(&mut self) -> ParseResult<&'a Expr<'a>> {
        let cond = self.parse_expr()?;
        let then_block = self.parse_block_expr()?;
        let mut else_branch = None;
        if self.eat(TokenKind::Else) {
            if self.eat(TokenKind::If) {
                else_branch = Some(self.parse_if_expr()?);
            } else if self.check(TokenKind::LBrace) {
                else_branch = Some(self.parse_block_expr()?);
            } else {
                else_branch = Some(self.parse_expr()?);
            }
        }
        let end_span = else_branch.map_or(then_block.span, |e| e.span);
        Ok(self.alloc_expr(
            cond.span.to(end_span),
            ExprKind::If { cond, then_block, else_branch },
        ))
    }

    fn parse_match_expr(&mut self) -> ParseResult<&'a Expr<'a>> {
        let scrutinee = self.parse_expr()?;
        self.expect(TokenKind::LBrace, "expected '{' after match expression")?;
        let mut arms = Vec::new();
        self.skip_separators();
        while !self.check(TokenKind::RBrace) {
            let pattern = self.parse_pattern()?;
            self.expect(TokenKind::FatArrow, "expected '=>' in match arm")?;
            let body = self.parse_expr()?;
            arms.push(MatchArm { span: pattern.span.to(body.span), pattern, body });
            self.eat(TokenKind::Comma);
            self.skip_separators();
        }
        let end = self.expect(TokenKind::RBrace, "expected '}'")?;
        let arms = self.arena.alloc_slice(arms);
        Ok(self.alloc_expr(scrutinee.span.to(end.span), ExprKind::Match { scrutinee, arms }))
    }
}
