//! Character stream to token stream.
//!
//! The lexer pulls bytes one at a time from the input and keeps exactly
//! one character of lookahead (initially a space). It exposes the most
//! recently produced token via [`Lexer::current`] and scans the next one
//! with [`Lexer::advance`]. Once end-of-input is reached it stays there:
//! every further advance yields `Token::Eof` again.

use std::io::{ErrorKind, Read};

use super::token::Token;

pub struct Lexer<R> {
    reader: R,
    /// One character of lookahead; `None` once the stream is exhausted.
    last: Option<char>,
    cur: Token,
}

impl<R: Read> Lexer<R> {
    /// The current token is undefined until the first `advance`.
    pub fn new(reader: R) -> Self {
        Lexer {
            reader,
            last: Some(' '),
            cur: Token::Eof,
        }
    }

    /// The token most recently produced by `advance`.
    pub fn current(&self) -> &Token {
        &self.cur
    }

    /// Scan the next token and make it current.
    pub fn advance(&mut self) -> &Token {
        self.cur = self.scan();
        &self.cur
    }

    fn scan(&mut self) -> Token {
        while matches!(self.last, Some(c) if c.is_ascii_whitespace()) {
            self.bump();
        }

        let c = match self.last {
            None => return Token::Eof,
            Some(c) => c,
        };

        if c.is_ascii_alphabetic() {
            // identifier: [A-Za-z][A-Za-z0-9]*
            let mut ident = String::new();
            while let Some(c) = self.last {
                if !c.is_ascii_alphanumeric() {
                    break;
                }
                ident.push(c);
                self.bump();
            }
            return Token::keyword(&ident).unwrap_or(Token::Ident(ident));
        }

        if c.is_ascii_digit() || c == '.' {
            let mut text = String::new();
            while let Some(c) = self.last {
                if !c.is_ascii_digit() && c != '.' {
                    break;
                }
                text.push(c);
                self.bump();
            }
            return Token::Number(parse_number(&text));
        }

        if c == '#' {
            // comment runs to the end of the line
            loop {
                match self.bump() {
                    None => return Token::Eof,
                    Some('\n') | Some('\r') => break,
                    Some(_) => {}
                }
            }
            return self.scan();
        }

        self.bump();
        Token::Char(c)
    }

    /// Consume the lookahead character and refill it.
    fn bump(&mut self) -> Option<char> {
        let c = self.last;
        self.last = self.read_char();
        c
    }

    fn read_char(&mut self) -> Option<char> {
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return None,
                Ok(_) => return Some(buf[0] as char),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => return None,
            }
        }
    }
}

/// Parse a run of digits and dots the way `strtod` would: the longest
/// prefix that parses as a float, `0.0` when nothing does. The scanner is
/// deliberately permissive about multiple dots; `1.2.3` scans as one run
/// valued `1.2`.
fn parse_number(text: &str) -> f64 {
    if let Ok(value) = text.parse::<f64>() {
        return value;
    }
    for end in (1..text.len()).rev() {
        if let Ok(value) = text[..end].parse::<f64>() {
            return value;
        }
    }
    0.0
}
