use std::{
    collections::{BTreeMap, VecDeque},
    str::Chars,
};

use itertools::{PeekNth, peek_nth};
use once_cell::sync::Lazy;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use super::SourceFile;

/// Byte range of a token within its source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn to(self, other: Span) -> Span {
        Span::new(self.start, other.end)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /* Words */
    Keyword(Keyword), // define
    Identifier,       // main

    /* Literals */
    BooleanLiteral, // true
    IntegerLiteral, // 42

    /* Delimiters */
    OpenParen,  // (
    CloseParen, // )
    Colon,      // :

    /* Operators */
    Plus,                 // +
    Minus,                // -
    Asterisk,             // *
    Divide,               // /
    Modulus,              // %
    DoubleEquals,         // ==
    NotEquals,            // !=
    LessThan,             // <
    LessThanOrEqualTo,    // <=
    GreaterThan,          // >
    GreaterThanOrEqualTo, // >=

    /* Assignment */
    Equals, // =

    /// Anything the scanner does not understand
    Illegal,

    Eof,
}

impl TokenKind {
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            Self::Plus
                | Self::Minus
                | Self::Asterisk
                | Self::Divide
                | Self::Modulus
                | Self::DoubleEquals
                | Self::NotEquals
                | Self::LessThan
                | Self::LessThanOrEqualTo
                | Self::GreaterThan
                | Self::GreaterThanOrEqualTo
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    Define,
    For,
    Func,
    If,
    Var,
}

static KEYWORDS: Lazy<BTreeMap<String, Keyword>> = Lazy::new(|| {
    Keyword::iter()
        .map(|keyword| (keyword.to_string(), keyword))
        .collect()
});

#[derive(Debug)]
pub struct Lexer<'source> {
    source: &'source SourceFile,
    position: usize,
    chars: PeekNth<Chars<'source>>,
    peek_buffer: VecDeque<Token>,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source SourceFile) -> Self {
        Self {
            source,
            position: 0,
            chars: peek_nth(source.contents.chars()),
            peek_buffer: VecDeque::new(),
        }
    }

    pub fn source(&self) -> &'source SourceFile {
        self.source
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.position += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                // `;` comments run to the end of the line
                Some(';') => {
                    while let Some(c) = self.advance() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    /// Consumes `=` after the current char if present, producing `a`,
    /// otherwise `b`
    fn select_equals(&mut self, a: TokenKind, b: TokenKind) -> TokenKind {
        if self.chars.peek() == Some(&'=') {
            self.advance();
            a
        } else {
            b
        }
    }

    fn scan_word(&mut self) -> TokenKind {
        let start = self.position;

        while let Some(c) = self.chars.peek() {
            if !c.is_alphanumeric() {
                break;
            }
            self.advance();
        }

        let word = &self.source.contents[start..self.position];

        if word == "true" || word == "false" {
            return TokenKind::BooleanLiteral;
        }

        match KEYWORDS.get(word) {
            Some(keyword) => TokenKind::Keyword(*keyword),
            None => TokenKind::Identifier,
        }
    }

    fn scan_number(&mut self) -> TokenKind {
        while let Some(c) = self.chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            self.advance();
        }

        TokenKind::IntegerLiteral
    }

    fn scan_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start = self.position;

        let Some(c) = self.chars.peek().copied() else {
            return Token {
                kind: TokenKind::Eof,
                span: Span::new(start, start),
            };
        };

        let kind = if c.is_alphabetic() {
            self.scan_word()
        } else if c.is_ascii_digit() {
            self.scan_number()
        } else {
            self.advance();

            match c {
                '(' => TokenKind::OpenParen,
                ')' => TokenKind::CloseParen,
                ':' => TokenKind::Colon,
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Asterisk,
                '/' => TokenKind::Divide,
                '%' => TokenKind::Modulus,
                '=' => self.select_equals(TokenKind::DoubleEquals, TokenKind::Equals),
                '<' => self.select_equals(TokenKind::LessThanOrEqualTo, TokenKind::LessThan),
                '>' => self.select_equals(TokenKind::GreaterThanOrEqualTo, TokenKind::GreaterThan),
                '!' => self.select_equals(TokenKind::NotEquals, TokenKind::Illegal),
                _ => TokenKind::Illegal,
            }
        };

        Token {
            kind,
            span: Span::new(start, self.position),
        }
    }

    pub fn next(&mut self) -> Token {
        if let Some(token) = self.peek_buffer.pop_front() {
            return token;
        }

        self.scan_token()
    }

    pub fn peek(&mut self) -> Token {
        if self.peek_buffer.is_empty() {
            let token = self.scan_token();
            self.peek_buffer.push_back(token);
        }

        self.peek_buffer[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_kinds(src: &str) -> Vec<TokenKind> {
        let source = SourceFile::from_string(src);
        let mut lexer = Lexer::new(&source);
        let mut kinds = Vec::new();

        loop {
            let token = lexer.next();
            if token.kind == TokenKind::Eof {
                break;
            }
            kinds.push(token.kind);
        }

        kinds
    }

    #[test]
    fn scans_delimiters_and_operators() {
        assert_eq!(
            scan_kinds("( ) : + - * / % = == != < <= > >="),
            vec![
                TokenKind::OpenParen,
                TokenKind::CloseParen,
                TokenKind::Colon,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Asterisk,
                TokenKind::Divide,
                TokenKind::Modulus,
                TokenKind::Equals,
                TokenKind::DoubleEquals,
                TokenKind::NotEquals,
                TokenKind::LessThan,
                TokenKind::LessThanOrEqualTo,
                TokenKind::GreaterThan,
                TokenKind::GreaterThanOrEqualTo,
            ]
        );
    }

    #[test]
    fn scans_words_and_literals() {
        assert_eq!(
            scan_kinds("define func if for var main true false 42"),
            vec![
                TokenKind::Keyword(Keyword::Define),
                TokenKind::Keyword(Keyword::Func),
                TokenKind::Keyword(Keyword::If),
                TokenKind::Keyword(Keyword::For),
                TokenKind::Keyword(Keyword::Var),
                TokenKind::Identifier,
                TokenKind::BooleanLiteral,
                TokenKind::BooleanLiteral,
                TokenKind::IntegerLiteral,
            ]
        );
    }

    #[test]
    fn skips_comments() {
        assert_eq!(
            scan_kinds("; comment 1\n42 ; comment 2\n7"),
            vec![TokenKind::IntegerLiteral, TokenKind::IntegerLiteral]
        );
    }

    #[test]
    fn tracks_spans() {
        let source = SourceFile::from_string("(add 12)");
        let mut lexer = Lexer::new(&source);

        lexer.next(); // (
        let ident = lexer.next();
        assert_eq!(source.value_of_span(ident.span), "add");
        let number = lexer.next();
        assert_eq!(source.value_of_span(number.span), "12");
    }

    #[test]
    fn lone_bang_is_illegal() {
        assert_eq!(scan_kinds("!"), vec![TokenKind::Illegal]);
    }
}
