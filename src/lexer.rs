//! Lexical analysis: byte stream to tokens with source spans.
//!
//! Newlines are preserved as their own token kind (they separate
//! statements); spaces, tabs, and carriage returns are skipped. `//`
//! comments run to end of line, `/* ... */` comments are nest-free and may
//! span lines. Multi-character operators are matched greedily: `..=` beats
//! `..` beats `.`.

use crate::diagnostic::Diagnostic;
use crate::intern::{Interner, Symbol};
use crate::span::Span;
use crate::token::{keyword_kind, Token, TokenKind};

/// Tokenizes `source`, ending the stream with an EOF token.
pub fn tokenize(
    source: &str,
    file: &str,
    interner: &mut Interner,
) -> Result<Vec<Token>, Diagnostic> {
    Lexer::new(source, file, interner).run()
}

const TWO_CHAR_OPS: &[(&str, TokenKind)] = &[
    ("==", TokenKind::EqEq),
    ("!=", TokenKind::Ne),
    ("<=", TokenKind::Le),
    (">=", TokenKind::Ge),
    ("&&", TokenKind::AndAnd),
    ("||", TokenKind::OrOr),
    ("+=", TokenKind::PlusEq),
    ("-=", TokenKind::MinusEq),
    ("*=", TokenKind::StarEq),
    ("/=", TokenKind::SlashEq),
    ("%=", TokenKind::PercentEq),
    (":=", TokenKind::ColonEq),
    ("..", TokenKind::DotDot),
    ("->", TokenKind::Arrow),
    ("=>", TokenKind::FatArrow),
];

struct Lexer<'src, 'i> {
    source: &'src str,
    file: Symbol,
    pos: usize,
    line: u32,
    col: u32,
    interner: &'i mut Interner,
}

impl<'src, 'i> Lexer<'src, 'i> {
    fn new(source: &'src str, file: &str, interner: &'i mut Interner) -> Self {
        let file = interner.intern(file);
        Lexer { source, file, pos: 0, line: 1, col: 1, interner }
    }

    fn run(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut out = Vec::new();
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '\n' => {
                    let (start, line, col) = self.mark();
                    self.advance();
                    out.push(self.token(TokenKind::Newline, start, line, col));
                }
                '/' if self.peek_next() == Some('/') => self.skip_line_comment(),
                '/' if self.peek_next() == Some('*') => self.skip_block_comment()?,
                '"' => out.push(self.string()?),
                '\'' => out.push(self.char_literal()?),
                _ if c.is_ascii_alphabetic() || c == '_' => out.push(self.identifier()),
                _ if c.is_ascii_digit() => out.push(self.number()),
                _ => out.push(self.symbol()?),
            }
        }
        let (start, line, col) = self.mark();
        out.push(self.token(TokenKind::Eof, start, line, col));
        Ok(out)
    }

    fn identifier(&mut self) -> Token {
        let (start, line, col) = self.mark();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let kind = keyword_kind(&self.source[start..self.pos]).unwrap_or(TokenKind::Ident);
        self.token(kind, start, line, col)
    }

    fn number(&mut self) -> Token {
        let (start, line, col) = self.mark();
        self.eat_digits();
        let mut kind = TokenKind::Int;
        // A decimal point upgrades to float only when a digit follows,
        // so `1..2` stays an integer range.
        if self.peek() == Some('.') && self.peek_next().map_or(false, |c| c.is_ascii_digit()) {
            kind = TokenKind::Float;
            self.advance();
            self.eat_digits();
        }
        self.token(kind, start, line, col)
    }

    fn eat_digits(&mut self) {
        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn string(&mut self) -> Result<Token, Diagnostic> {
        let (start, line, col) = self.mark();
        self.advance();
        let mut escaped = false;
        while let Some(c) = self.peek() {
            self.advance();
            if escaped {
                escaped = false;
                continue;
            }
            if c == '\\' {
                escaped = true;
                continue;
            }
            if c == '"' {
                return Ok(self.token(TokenKind::Str, start, line, col));
            }
        }
        Err(Diagnostic::error(
            self.span_from(start, line, col),
            "MD1002",
            "unterminated string literal",
        )
        .with_hint("add a closing quote"))
    }

    fn char_literal(&mut self) -> Result<Token, Diagnostic> {
        let (start, line, col) = self.mark();
        self.advance();
        if self.peek().is_none() || self.peek() == Some('\n') {
            return Err(Diagnostic::error(
                self.span_from(start, line, col),
                "MD1003",
                "unterminated char literal",
            )
            .with_hint("char literals must end with a single quote"));
        }
        if self.peek() == Some('\\') {
            self.advance();
            if self.peek().is_some() {
                self.advance();
            }
        } else {
            self.advance();
        }
        if self.peek() != Some('\'') {
            return Err(Diagnostic::error(
                self.span_from(start, line, col),
                "MD1004",
                "invalid char literal",
            )
            .with_hint("char literal must contain exactly one character"));
        }
        self.advance();
        Ok(self.token(TokenKind::Char, start, line, col))
    }

    fn symbol(&mut self) -> Result<Token, Diagnostic> {
        let (start, line, col) = self.mark();
        if self.source[self.pos..].starts_with("..=") {
            self.advance();
            self.advance();
            self.advance();
            return Ok(self.token(TokenKind::DotDotEq, start, line, col));
        }
        for (text, kind) in TWO_CHAR_OPS {
            if self.source[self.pos..].starts_with(text) {
                self.advance();
                self.advance();
                return Ok(self.token(*kind, start, line, col));
            }
        }
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(self.token(TokenKind::Eof, start, line, col)),
        };
        self.advance();
        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' => TokenKind::Eq,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            '!' => TokenKind::Bang,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semi,
            '.' => TokenKind::Dot,
            '?' => TokenKind::Question,
            '&' => TokenKind::Amp,
            _ => {
                return Err(Diagnostic::error(
                    self.span_from(start, line, col),
                    "MD1001",
                    format!("invalid character {:?}", c),
                )
                .with_hint("remove or escape the character"));
            }
        };
        Ok(self.token(kind, start, line, col))
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), Diagnostic> {
        let (start, line, col) = self.mark();
        self.advance();
        self.advance();
        while self.peek().is_some() {
            if self.source[self.pos..].starts_with("*/") {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }
        Err(Diagnostic::error(
            self.span_from(start, line, col),
            "MD1005",
            "unterminated block comment",
        )
        .with_hint("add closing */"))
    }

    fn mark(&self) -> (usize, u32, u32) {
        (self.pos, self.line, self.col)
    }

    fn token(&mut self, kind: TokenKind, start: usize, line: u32, col: u32) -> Token {
        let lexeme = self.interner.intern(&self.source[start..self.pos]);
        Token::new(kind, lexeme, self.span_from(start, line, col))
    }

    fn span_from(&self, start: usize, line: u32, col: u32) -> Span {
        Span::new(self.file, start, self.pos, line, col)
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }
}
