//! Match-pattern grammar: wildcard `_`, name bindings, literals, and
//! positional variant patterns `Name(a, b)`.

use super::{ParseResult, Parser};
use crate::ast::{LitKind, Pattern, PatternKind};
use crate::token::TokenKind;

pub trait PatternParsing<'a> {
    fn parse_pattern(&mut self) -> ParseResult<&'a Pattern<'a>>;
}

impl<'a, 'i> PatternParsing<'a> for Parser<'a, 'i> {
    fn parse_pattern(&mut self) -> ParseResult<&'a Pattern<'a>> {
        if self.eat(TokenKind::Ident) {
            let tok = self.prev();
            if self.interner.text_eq(tok.lexeme, "_") {
                return Ok(self.arena.alloc(Pattern { span: tok.span, kind: PatternKind::Wildcard }));
            }
            if self.eat(TokenKind::LParen) {
                let mut fields = Vec::new();
                while !self.check(TokenKind::RParen) {
                    fields.push(self.expect(TokenKind::Ident, "expected pattern field")?.lexeme);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen, "expected ')'")?;
                let fields = self.arena.alloc_slice(fields);
                return Ok(self.arena.alloc(Pattern {
                    span: tok.span.to(self.prev().span),
                    kind: PatternKind::Variant { name: tok.lexeme, fields },
                }));
            }
            return Ok(self
                .arena
                .alloc(Pattern { span: tok.span, kind: PatternKind::Name(tok.lexeme) }));
        }
        let tok = self.peek();
        let kind = match tok.kind {
            TokenKind::Int => Some(LitKind::Int),
            TokenKind::Float => Some(LitKind::Float),
            TokenKind::Str => Some(LitKind::Str),
            TokenKind::Char => Some(LitKind::Char),
            TokenKind::True | TokenKind::False => Some(LitKind::Bool),
            _ => None,
        };
        if let Some(kind) = kind {
            self.advance();
            return Ok(self.arena.alloc(Pattern {
                span: tok.span,
                kind: PatternKind::Literal { value: tok.lexeme, kind },
            }));
        }
        Err(self.error_here("expected pattern"))
    }
}
