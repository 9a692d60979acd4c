//! The hand-written scanner.
//!
//! One-character lookahead, no backtracking. Whitespace and `//` line
//! comments are skipped between tokens; every successful scan ends with an
//! EOF token so the parser never has to special-case exhaustion.

use crate::errors::CompileError;
use crate::nametable::NameTable;
use crate::token::{Literal, Token, TokenKind, TokenPos};

/// Scans `source` to completion, returning the token stream (terminated by
/// an EOF token) and the name table the identifiers were interned into.
///
/// # Errors
///
/// Returns the first lexical error: an invalid character, a malformed
/// numeric literal, an invalid escape sequence or an unterminated string.
pub fn tokenize(source: &str) -> Result<(Vec<Token<'_>>, NameTable), CompileError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.is_eof();
        tokens.push(token);
        if done {
            break;
        }
    }
    let names = lexer.into_names();
    Ok((tokens, names))
}

/// Incremental scanner over a source buffer.
pub struct Lexer<'src> {
    source: &'src str,
    bytes: &'src [u8],
    pos: usize,
    line: usize,
    column: usize,
    names: NameTable,
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

fn is_valid_escape(c: u8) -> bool {
    matches!(c, b'n' | b't' | b'r' | b'0' | b'"' | b'\\')
}

impl<'src> Lexer<'src> {
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            names: NameTable::new(),
        }
    }

    /// Hands the name table over to the caller once scanning is done.
    #[must_use]
    pub fn into_names(self) -> NameTable {
        self.names
    }

    fn peek(&self) -> u8 {
        self.bytes.get(self.pos).copied().unwrap_or(0)
    }

    fn peek_next(&self) -> u8 {
        self.bytes.get(self.pos + 1).copied().unwrap_or(0)
    }

    fn advance(&mut self) {
        if let Some(&c) = self.bytes.get(self.pos) {
            self.pos += 1;
            if c == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn here(&self) -> TokenPos {
        TokenPos::new(self.line, self.column, self.pos)
    }

    fn skip_trivia(&mut self) {
        loop {
            let c = self.peek();
            if c.is_ascii_whitespace() {
                self.advance();
                continue;
            }
            if c == b'/' && self.peek_next() == b'/' {
                while self.peek() != 0 && self.peek() != b'\n' {
                    self.advance();
                }
                if self.peek() == b'\n' {
                    self.advance();
                }
                continue;
            }
            break;
        }
    }

    /// Scans the next token.
    ///
    /// # Errors
    ///
    /// Returns the first lexical error at its source position.
    pub fn next_token(&mut self) -> Result<Token<'src>, CompileError> {
        self.skip_trivia();

        let start = self.here();
        let c = self.peek();

        if c == 0 {
            return Ok(Token::new(TokenKind::Eof, start, ""));
        }

        if is_ident_start(c) {
            return Ok(self.scan_identifier(start));
        }
        if c.is_ascii_digit() {
            return self.scan_number(start);
        }
        if c == b'"' {
            return self.scan_string(start);
        }

        let next = self.peek_next();
        let two_char = match (c, next) {
            (b'|', b'|') => Some(TokenKind::Or),
            (b'&', b'&') => Some(TokenKind::And),
            (b'=', b'=') => Some(TokenKind::Eq),
            (b'!', b'=') => Some(TokenKind::Neq),
            (b'<', b'=') => Some(TokenKind::Lte),
            (b'>', b'=') => Some(TokenKind::Gte),
            _ => None,
        };
        if let Some(kind) = two_char {
            self.advance();
            self.advance();
            return Ok(Token::new(kind, start, &self.source[start.offset..self.pos]));
        }

        let kind = match c {
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semicolon,
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Mul,
            b'/' => TokenKind::Div,
            b'^' => TokenKind::Pow,
            b'!' => TokenKind::Not,
            b'<' => TokenKind::Lt,
            b'>' => TokenKind::Gt,
            _ => {
                let display = if (32..127).contains(&c) {
                    char::from(c).to_string()
                } else {
                    "?".to_string()
                };
                return Err(CompileError::syntax(
                    start,
                    format!("Invalid character '{display}'"),
                ));
            }
        };

        self.advance();
        Ok(Token::new(kind, start, &self.source[start.offset..self.pos]))
    }

    fn scan_identifier(&mut self, start: TokenPos) -> Token<'src> {
        while is_ident_char(self.peek()) {
            self.advance();
        }

        let lexeme = &self.source[start.offset..self.pos];
        match TokenKind::keyword(lexeme) {
            Some(kw) => Token::new(kw, start, lexeme),
            None => {
                let mut token = Token::new(TokenKind::Identifier, start, lexeme);
                token.name = Some(self.names.insert(lexeme));
                token
            }
        }
    }

    fn scan_number(&mut self, start: TokenPos) -> Result<Token<'src>, CompileError> {
        // Consume the maximal run first, then validate; a stray letter or
        // a second dot poisons the whole literal.
        loop {
            let c = self.peek();
            if c.is_ascii_alphanumeric() || c == b'_' || c == b'.' {
                self.advance();
            } else {
                break;
            }
        }

        let lexeme = &self.source[start.offset..self.pos];
        let bytes = lexeme.as_bytes();

        let mut dots = 0usize;
        let mut ok = !bytes.is_empty() && bytes[0].is_ascii_digit();
        if ok {
            for (i, &ch) in bytes.iter().enumerate().skip(1) {
                if ch.is_ascii_digit() {
                    continue;
                }
                if ch == b'.' {
                    dots += 1;
                    if dots > 1 {
                        ok = false;
                        break;
                    }
                    // the dot must be followed by a digit
                    if !bytes.get(i + 1).copied().unwrap_or(0).is_ascii_digit() {
                        ok = false;
                        break;
                    }
                    continue;
                }
                ok = false;
                break;
            }
        }

        if !ok {
            return Err(CompileError::syntax(
                start,
                format!("Invalid numeric literal \"{lexeme}\""),
            ));
        }

        let literal = if dots == 0 {
            let value: i64 = lexeme.parse().map_err(|_| {
                CompileError::syntax(start, format!("Invalid numeric literal \"{lexeme}\""))
            })?;
            Literal::Int(value)
        } else {
            let value: f64 = lexeme.parse().map_err(|_| {
                CompileError::syntax(start, format!("Invalid numeric literal \"{lexeme}\""))
            })?;
            Literal::Float(value)
        };

        let mut token = Token::new(TokenKind::NumericLiteral, start, lexeme);
        token.literal = Some(literal);
        Ok(token)
    }

    fn scan_string(&mut self, start: TokenPos) -> Result<Token<'src>, CompileError> {
        self.advance(); // opening quote
        let content_start = self.pos;

        loop {
            let c = self.peek();

            if c == 0 {
                return Err(CompileError::syntax(start, "Unterminated string literal"));
            }

            if c == b'\\' {
                let escape_pos = self.here();
                self.advance();
                let e = self.peek();
                if e == 0 {
                    return Err(CompileError::syntax(start, "Unterminated string literal"));
                }
                if !is_valid_escape(e) {
                    let display = if (32..127).contains(&e) {
                        char::from(e).to_string()
                    } else {
                        "?".to_string()
                    };
                    return Err(CompileError::syntax(
                        escape_pos,
                        format!("Invalid escape sequence \"\\{display}\""),
                    ));
                }
                self.advance();
                continue;
            }

            if c == b'"' {
                break;
            }

            self.advance();
        }

        let content_end = self.pos;
        self.advance(); // closing quote

        // Lexeme excludes the delimiting quotes.
        Ok(Token::new(
            TokenKind::StringLiteral,
            start,
            &self.source[content_start..content_end],
        ))
    }
}
