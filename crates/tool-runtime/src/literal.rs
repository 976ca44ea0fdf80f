//! Literal-only decoder for tool arguments.
//!
//! Models write calls like `load_data('/kaggle/input/train.csv', 100)`. The
//! text between the parentheses is decoded here into positional JSON values.
//! Accepted: quoted strings (single, double, triple, optional `r` prefix),
//! integers, floats, `True`/`False`/`None` (and the JSON spellings), lists,
//! tuples and dicts of those. Names, calls, attribute access and operators
//! are rejected; nothing is ever evaluated.

use serde_json::{Map, Number, Value};

/// Containers nested deeper than this are rejected instead of recursing further.
const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} at offset {offset}")]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

/// Decode a comma-separated argument list. Empty or blank input yields no arguments.
pub fn parse_args(input: &str) -> Result<Vec<Value>, LiteralError> {
    let mut parser = Parser::new(input);
    let values = parser.sequence(None)?;
    parser.skip_ws();
    if let Some(c) = parser.peek() {
        return Err(parser.error(format!("unexpected character '{c}'")));
    }
    Ok(values)
}

/// Decode exactly one literal value.
pub fn parse_value(input: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser::new(input);
    parser.skip_ws();
    let value = parser.value()?;
    parser.skip_ws();
    if let Some(c) = parser.peek() {
        return Err(parser.error(format!("unexpected character '{c}'")));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0, depth: 0 }
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError { offset: self.pos, message: message.into() }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// Comma-separated values up to `close` (or end of input when `None`).
    /// A trailing comma is allowed.
    fn sequence(&mut self, close: Option<char>) -> Result<Vec<Value>, LiteralError> {
        let mut values = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == close {
                return Ok(values);
            }
            values.push(self.value()?);
            self.skip_ws();
            if !self.eat(',') {
                return Ok(values);
            }
        }
    }

    fn expect_close(&mut self, close: char) -> Result<(), LiteralError> {
        self.skip_ws();
        if self.eat(close) {
            Ok(())
        } else {
            Err(match self.peek() {
                Some(c) => self.error(format!("expected '{close}', found '{c}'")),
                None => self.error(format!("expected '{close}', found end of input")),
            })
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        match self.peek() {
            None => Err(self.error("expected a literal, found end of input")),
            Some('\'') | Some('"') => self.string(false).map(Value::String),
            Some('r') | Some('R') if matches!(self.rest()[1..].chars().next(), Some('\'' | '"')) => {
                self.bump();
                self.string(true).map(Value::String)
            }
            Some('[') => self.nested(|p| p.array(']')),
            Some('(') => self.nested(|p| p.array(')')),
            Some('{') => self.nested(Self::dict),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.keyword(),
            Some(c) => Err(self.error(format!("unexpected character '{c}'"))),
        }
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Result<Value, LiteralError>) -> Result<Value, LiteralError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn array(&mut self, close: char) -> Result<Value, LiteralError> {
        self.bump();
        let items = self.sequence(Some(close))?;
        self.expect_close(close)?;
        Ok(Value::Array(items))
    }

    fn keyword(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        let word = &self.src[start..self.pos];
        match word {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            _ => {
                self.pos = start;
                Err(self.error(format!("names are not allowed in arguments: '{word}'")))
            }
        }
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => {}
                '.' => is_float = true,
                'e' | 'E' => {
                    is_float = true;
                    self.bump();
                    if matches!(self.peek(), Some('-' | '+')) {
                        self.bump();
                    }
                    continue;
                }
                _ => break,
            }
            self.bump();
        }
        let text: String = self.src[start..self.pos].chars().filter(|c| *c != '_').collect();
        let invalid = || LiteralError { offset: start, message: format!("invalid number '{text}'") };

        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Value::Number(n.into()));
            }
            if let Ok(n) = text.trim_start_matches('+').parse::<u64>() {
                return Ok(Value::Number(n.into()));
            }
        }
        let f: f64 = text.parse().map_err(|_| invalid())?;
        Number::from_f64(f).map(Value::Number).ok_or_else(invalid)
    }

    fn dict(&mut self) -> Result<Value, LiteralError> {
        self.bump();
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.eat('}') {
                return Ok(Value::Object(map));
            }
            let key = match self.value()? {
                Value::String(s) => s,
                Value::Array(_) | Value::Object(_) => {
                    return Err(self.error("dict keys must be scalar literals"));
                }
                other => other.to_string(),
            };
            self.skip_ws();
            if !self.eat(':') {
                return Err(self.error("expected ':' after dict key"));
            }
            self.skip_ws();
            let value = self.value()?;
            map.insert(key, value);
            self.skip_ws();
            if !self.eat(',') {
                self.expect_close('}')?;
                return Ok(Value::Object(map));
            }
        }
    }

    fn string(&mut self, raw: bool) -> Result<String, LiteralError> {
        let start = self.pos;
        let quote = self.bump().ok_or_else(|| self.error("expected a string"))?;
        let triple: String = std::iter::repeat(quote).take(3).collect();
        let is_triple = self.src[start..].starts_with(&triple);
        if is_triple {
            self.pos = start + triple.len();
        }

        let mut out = String::new();
        loop {
            if is_triple && self.rest().starts_with(&triple) {
                self.pos += triple.len();
                return Ok(out);
            }
            let c = self.bump().ok_or_else(|| LiteralError {
                offset: start,
                message: "unterminated string".to_string(),
            })?;
            match c {
                c if c == quote && !is_triple => return Ok(out),
                '\\' if raw => {
                    out.push('\\');
                    if let Some(next) = self.bump() {
                        out.push(next);
                    }
                }
                '\\' => self.escape(&mut out)?,
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let c = self.bump().ok_or_else(|| self.error("unterminated escape"))?;
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            '/' => out.push('/'),
            '\n' => {}
            'x' => out.push(self.hex_char(2)?),
            'u' => out.push(self.hex_char(4)?),
            'U' => out.push(self.hex_char(8)?),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_char(&mut self, digits: usize) -> Result<char, LiteralError> {
        let rest = self.rest();
        let hex = rest.get(..digits).filter(|h| h.chars().all(|c| c.is_ascii_hexdigit()));
        let code = hex
            .and_then(|h| u32::from_str_radix(h, 16).ok())
            .ok_or_else(|| self.error("invalid hex escape"))?;
        self.pos += digits;
        char::from_u32(code).ok_or_else(|| self.error("invalid code point in escape"))
    }
}
