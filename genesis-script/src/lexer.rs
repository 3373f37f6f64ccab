//! Tokenizer
//!
//! Identifiers are case-sensitive. Numeric literals with a trailing
//! alphabetic suffix become money (the suffix names the currency and is
//! discarded). String literals keep their `$name$` interpolation markers
//! for runtime resolution. `//` comments run to end of line.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{ScriptError, ScriptResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Money(Decimal),
    Str(String),
    Bool(bool),
    Nil,

    // keywords
    Contract,
    Func,
    Data,
    Conditions,
    Action,
    Settings,
    Var,
    If,
    Elif,
    Else,
    While,
    Break,
    Continue,
    Return,

    // punctuation
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    Question,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Not,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,

    Eof,
}

/// A token with its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub line: u32,
    pub column: u32,
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            src: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenizes the whole source, ending with an Eof lexeme.
    pub fn tokenize(mut self) -> ScriptResult<Vec<Lexeme>> {
        let mut out = Vec::new();
        loop {
            let lexeme = self.next_lexeme()?;
            let eof = lexeme.token == Token::Eof;
            out.push(lexeme);
            if eof {
                return Ok(out);
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::Lex {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.bump();
                }
                Some(b'/') if self.peek2() == Some(b'/') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => return,
            }
        }
    }

    fn next_lexeme(&mut self) -> ScriptResult<Lexeme> {
        self.skip_trivia();
        let (line, column) = (self.line, self.column);
        let token = self.next_token()?;
        Ok(Lexeme {
            token,
            line,
            column,
        })
    }

    fn next_token(&mut self) -> ScriptResult<Token> {
        let b = match self.peek() {
            Some(b) => b,
            None => return Ok(Token::Eof),
        };

        if b.is_ascii_digit() {
            return self.number();
        }
        if b.is_ascii_alphabetic() || b == b'_' || b == b'@' {
            return Ok(self.ident());
        }
        if b == b'"' || b == b'`' {
            return self.string(b);
        }

        self.bump();
        let token = match b {
            b'{' => Token::LBrace,
            b'}' => Token::RBrace,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'[' => Token::LBracket,
            b']' => Token::RBracket,
            b',' => Token::Comma,
            b'.' => Token::Dot,
            b':' => Token::Colon,
            b'?' => Token::Question,
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => Token::Star,
            b'/' => Token::Slash,
            b'%' => Token::Percent,
            b'=' => {
                if self.peek() == Some(b'=') {
                    self.bump();
                    Token::Eq
                } else {
                    Token::Assign
                }
            }
            b'!' => {
                if self.peek() == Some(b'=') {
                    self.bump();
                    Token::NotEq
                } else {
                    Token::Not
                }
            }
            b'<' => {
                if self.peek() == Some(b'=') {
                    self.bump();
                    Token::LtEq
                } else {
                    Token::Lt
                }
            }
            b'>' => {
                if self.peek() == Some(b'=') {
                    self.bump();
                    Token::GtEq
                } else {
                    Token::Gt
                }
            }
            b'&' => {
                if self.peek() == Some(b'&') {
                    self.bump();
                    Token::And
                } else {
                    return Err(self.error("expected '&&'"));
                }
            }
            b'|' => {
                if self.peek() == Some(b'|') {
                    self.bump();
                    Token::Or
                } else {
                    return Err(self.error("expected '||'"));
                }
            }
            other => {
                return Err(self.error(format!("unexpected character {:?}", other as char)));
            }
        };
        Ok(token)
    }

    fn number(&mut self) -> ScriptResult<Token> {
        let start = self.pos;
        let mut is_float = false;
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() {
                self.bump();
            } else if b == b'.' && !is_float && self.peek2().is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.bump();
            } else {
                break;
            }
        }
        let digits = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| self.error("invalid utf-8 in number"))?
            .to_string();

        // a trailing alphabetic suffix marks a money literal
        if self.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
            while self.peek().is_some_and(|b| b.is_ascii_alphanumeric()) {
                self.bump();
            }
            let amount = Decimal::from_str(&digits)
                .map_err(|_| self.error(format!("invalid money literal {}", digits)))?;
            return Ok(Token::Money(amount));
        }

        if is_float {
            let v = digits
                .parse::<f64>()
                .map_err(|_| self.error(format!("invalid float literal {}", digits)))?;
            Ok(Token::Float(v))
        } else {
            let v = digits
                .parse::<i64>()
                .map_err(|_| self.error(format!("invalid int literal {}", digits)))?;
            Ok(Token::Int(v))
        }
    }

    fn ident(&mut self) -> Token {
        let start = self.pos;
        // leading @ permits cross-ecosystem contract references
        if self.peek() == Some(b'@') {
            self.bump();
        }
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.bump();
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).to_string();
        match text.as_str() {
            "contract" => Token::Contract,
            "func" => Token::Func,
            "data" => Token::Data,
            "conditions" => Token::Conditions,
            "action" => Token::Action,
            "settings" => Token::Settings,
            "var" => Token::Var,
            "if" => Token::If,
            "elif" => Token::Elif,
            "else" => Token::Else,
            "while" => Token::While,
            "break" => Token::Break,
            "continue" => Token::Continue,
            "return" => Token::Return,
            "true" => Token::Bool(true),
            "false" => Token::Bool(false),
            "nil" => Token::Nil,
            _ => Token::Ident(text),
        }
    }

    fn string(&mut self, quote: u8) -> ScriptResult<Token> {
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string literal")),
                Some(b) if b == quote => break,
                Some(b'\\') if quote == b'"' => match self.bump() {
                    Some(b'n') => out.push('\n'),
                    Some(b't') => out.push('\t'),
                    Some(b'"') => out.push('"'),
                    Some(b'\\') => out.push('\\'),
                    Some(b'$') => out.push('$'),
                    other => {
                        return Err(self.error(format!(
                            "unknown escape {:?}",
                            other.map(|b| b as char)
                        )))
                    }
                },
                Some(b) => out.push(b as char),
            }
        }
        Ok(Token::Str(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|l| l.token)
            .collect()
    }

    #[test]
    fn keywords_and_idents_are_case_sensitive() {
        let toks = tokens("contract Contract data Data");
        assert_eq!(
            toks,
            vec![
                Token::Contract,
                Token::Ident("Contract".into()),
                Token::Data,
                Token::Ident("Data".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn money_literal_takes_currency_suffix() {
        let toks = tokens("1000egs 2.5 7");
        assert_eq!(
            toks,
            vec![
                Token::Money(Decimal::from(1000)),
                Token::Float(2.5),
                Token::Int(7),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn strings_keep_interpolation_markers() {
        let toks = tokens(r#""Hello $name$, balance $Amount$""#);
        assert_eq!(
            toks[0],
            Token::Str("Hello $name$, balance $Amount$".into())
        );
    }

    #[test]
    fn operators() {
        let toks = tokens("a == b != c <= d >= e && f || !g");
        assert!(toks.contains(&Token::Eq));
        assert!(toks.contains(&Token::NotEq));
        assert!(toks.contains(&Token::LtEq));
        assert!(toks.contains(&Token::GtEq));
        assert!(toks.contains(&Token::And));
        assert!(toks.contains(&Token::Or));
        assert!(toks.contains(&Token::Not));
    }

    #[test]
    fn comments_are_skipped() {
        let toks = tokens("a // trailing words\nb");
        assert_eq!(
            toks,
            vec![Token::Ident("a".into()), Token::Ident("b".into()), Token::Eof]
        );
    }

    #[test]
    fn errors_carry_position() {
        let err = Lexer::new("a\n  ^").tokenize().unwrap_err();
        match err {
            ScriptError::Lex { line, column, .. } => {
                assert_eq!(line, 2);
                assert_eq!(column, 3);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn at_prefixed_contract_reference() {
        let toks = tokens("@1NewEcosystem");
        assert_eq!(toks[0], Token::Ident("@1NewEcosystem".into()));
    }
}
