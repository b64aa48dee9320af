//! The oracle's value tree and its strict JSON parser.
//!
//! This parser is independent of the library under test. It only has to
//! agree with RFC 8259 on what a document means, so that two documents can be
//! compared by value rather than by spelling.

use crate::compare::CompareOptions;
use crate::text::Encoding;
use serde::Deserialize;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Hard ceiling on `max_depth`. The parser recurses once per nesting level,
/// and this keeps the deepest accepted document within an 8 MiB stack.
pub const MAX_DEPTH_LIMIT: usize = 2048;

/// How numeric literals are represented in the value tree.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NumberMode {
  /// Every number is an `f64`, so `1`, `1.0` and `1e0` are the same value.
  #[default]
  Float,
  /// Literals without fraction or exponent stay exact integers and never
  /// equal a float.
  IntegerPreserving,
}

/// What an object with a repeated key means.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeys {
  #[default]
  LastWins,
  FirstWins,
  Reject,
}

/// A JSON string as UTF-16 code units, so lone surrogate escapes survive.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JsonString(Vec<u16>);

impl JsonString {
  pub fn from_units(units: Vec<u16>) -> Self {
    JsonString(units)
  }

  pub fn units(&self) -> &[u16] {
    &self.0
  }
}

impl From<&str> for JsonString {
  fn from(text: &str) -> Self {
    JsonString(text.encode_utf16().collect())
  }
}

impl fmt::Display for JsonString {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for ch in char::decode_utf16(self.0.iter().copied()) {
      match ch {
        Ok(ch) => write!(f, "{ch}")?,
        Err(err) => write!(f, "\\u{:04x}", err.unpaired_surrogate())?,
      }
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Null,
  Bool(bool),
  Number(f64),
  /// Canonical decimal text; only produced by [`NumberMode::IntegerPreserving`].
  Integer(String),
  String(JsonString),
  Array(Vec<Value>),
  Object(BTreeMap<JsonString, Value>),
}

impl Value {
  pub fn kind(&self) -> &'static str {
    match self {
      Value::Null => "null",
      Value::Bool(_) => "boolean",
      Value::Number(_) | Value::Integer(_) => "number",
      Value::String(_) => "string",
      Value::Array(_) => "array",
      Value::Object(_) => "object",
    }
  }

  /// A one-line rendering for mismatch messages; containers are summarized.
  pub fn summary(&self) -> String {
    match self {
      Value::Null => "null".to_string(),
      Value::Bool(value) => value.to_string(),
      Value::Number(value) => format!("{value:?}"),
      Value::Integer(value) => value.clone(),
      Value::String(value) => format!("{:?}", value.to_string()),
      Value::Array(items) => format!("array of {}", items.len()),
      Value::Object(map) => format!("object with {} key(s)", map.len()),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
  #[error("not valid {encoding} text at byte {offset}")]
  InvalidText { encoding: Encoding, offset: usize },
  #[error("{message} at offset {offset}")]
  Syntax { offset: usize, message: String },
  #[error("number {literal} at offset {offset} is not finite")]
  NonFinite { offset: usize, literal: String },
  #[error("duplicate key {key:?} at offset {offset}")]
  DuplicateKey { offset: usize, key: String },
  #[error("nesting deeper than {limit} at offset {offset}")]
  TooDeep { offset: usize, limit: usize },
}

impl DecodeError {
  /// Whether the bytes could not even be read as text, as opposed to being
  /// text that is not a valid document.
  pub fn is_invalid_text(&self) -> bool {
    matches!(self, DecodeError::InvalidText { .. })
  }
}

/// Parses a complete document. Leading and trailing whitespace is allowed;
/// anything else after the value is an error.
pub fn parse(text: &str, options: &CompareOptions) -> Result<Value, DecodeError> {
  let mut parser = Parser {
    src: text,
    bytes: text.as_bytes(),
    pos: 0,
    depth: 0,
    max_depth: options.max_depth.min(MAX_DEPTH_LIMIT),
    options,
  };
  parser.skip_whitespace();
  let value = parser.parse_value()?;
  parser.skip_whitespace();
  if parser.pos != parser.bytes.len() {
    return Err(parser.syntax("trailing data after document"));
  }
  Ok(value)
}

struct Parser<'a> {
  src: &'a str,
  bytes: &'a [u8],
  pos: usize,
  depth: usize,
  max_depth: usize,
  options: &'a CompareOptions,
}

impl<'a> Parser<'a> {
  fn peek(&self) -> Option<u8> {
    self.bytes.get(self.pos).copied()
  }

  fn syntax(&self, message: impl Into<String>) -> DecodeError {
    DecodeError::Syntax {
      offset: self.pos,
      message: message.into(),
    }
  }

  fn unexpected(&self) -> DecodeError {
    match self.src[self.pos..].chars().next() {
      Some(ch) => self.syntax(format!("unexpected character {ch:?}")),
      None => self.syntax("unexpected end of input"),
    }
  }

  fn skip_whitespace(&mut self) {
    while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
      self.pos += 1;
    }
  }

  fn expect(&mut self, byte: u8) -> Result<(), DecodeError> {
    if self.peek() == Some(byte) {
      self.pos += 1;
      Ok(())
    } else {
      Err(self.unexpected())
    }
  }

  fn enter(&mut self) -> Result<(), DecodeError> {
    self.depth += 1;
    if self.depth > self.max_depth {
      return Err(DecodeError::TooDeep {
        offset: self.pos,
        limit: self.max_depth,
      });
    }
    Ok(())
  }

  fn parse_value(&mut self) -> Result<Value, DecodeError> {
    match self.peek() {
      Some(b'{') => self.parse_object(),
      Some(b'[') => self.parse_array(),
      Some(b'"') => self.parse_string().map(Value::String),
      Some(b't') => self.parse_literal("true", Value::Bool(true)),
      Some(b'f') => self.parse_literal("false", Value::Bool(false)),
      Some(b'n') => self.parse_literal("null", Value::Null),
      Some(b'-' | b'0'..=b'9') => self.parse_number(),
      _ => Err(self.unexpected()),
    }
  }

  fn parse_literal(&mut self, word: &str, value: Value) -> Result<Value, DecodeError> {
    if self.src[self.pos..].starts_with(word) {
      self.pos += word.len();
      Ok(value)
    } else {
      Err(self.syntax(format!("expected `{word}`")))
    }
  }

  fn parse_array(&mut self) -> Result<Value, DecodeError> {
    self.enter()?;
    self.pos += 1;
    let mut items = Vec::new();
    self.skip_whitespace();
    if self.peek() == Some(b']') {
      self.pos += 1;
      self.depth -= 1;
      return Ok(Value::Array(items));
    }

    loop {
      self.skip_whitespace();
      items.push(self.parse_value()?);
      self.skip_whitespace();
      match self.peek() {
        Some(b',') => self.pos += 1,
        Some(b']') => {
          self.pos += 1;
          break;
        }
        _ => return Err(self.syntax("expected `,` or `]`")),
      }
    }

    self.depth -= 1;
    Ok(Value::Array(items))
  }

  fn parse_object(&mut self) -> Result<Value, DecodeError> {
    self.enter()?;
    self.pos += 1;
    let mut map = BTreeMap::new();
    self.skip_whitespace();
    if self.peek() == Some(b'}') {
      self.pos += 1;
      self.depth -= 1;
      return Ok(Value::Object(map));
    }

    loop {
      self.skip_whitespace();
      if self.peek() != Some(b'"') {
        return Err(self.syntax("expected string key"));
      }
      let key_offset = self.pos;
      let key = self.parse_string()?;
      self.skip_whitespace();
      self.expect(b':')?;
      self.skip_whitespace();
      let value = self.parse_value()?;

      match self.options.duplicate_keys {
        DuplicateKeys::LastWins => {
          map.insert(key, value);
        }
        DuplicateKeys::FirstWins => {
          map.entry(key).or_insert(value);
        }
        DuplicateKeys::Reject => match map.entry(key) {
          Entry::Occupied(existing) => {
            return Err(DecodeError::DuplicateKey {
              offset: key_offset,
              key: existing.key().to_string(),
            });
          }
          Entry::Vacant(slot) => {
            slot.insert(value);
          }
        },
      }

      self.skip_whitespace();
      match self.peek() {
        Some(b',') => self.pos += 1,
        Some(b'}') => {
          self.pos += 1;
          break;
        }
        _ => return Err(self.syntax("expected `,` or `}`")),
      }
    }

    self.depth -= 1;
    Ok(Value::Object(map))
  }

  fn parse_string(&mut self) -> Result<JsonString, DecodeError> {
    let start = self.pos;
    self.pos += 1;
    let mut units = Vec::new();
    loop {
      let Some(ch) = self.src[self.pos..].chars().next() else {
        return Err(DecodeError::Syntax {
          offset: start,
          message: "unterminated string".to_string(),
        });
      };
      match ch {
        '"' => {
          self.pos += 1;
          return Ok(JsonString(units));
        }
        '\\' => {
          self.pos += 1;
          let unit = self.parse_escape()?;
          units.push(unit);
        }
        ch if (ch as u32) < 0x20 => {
          return Err(self.syntax("unescaped control character in string"));
        }
        ch => {
          let mut buf = [0u16; 2];
          units.extend_from_slice(ch.encode_utf16(&mut buf));
          self.pos += ch.len_utf8();
        }
      }
    }
  }

  fn parse_escape(&mut self) -> Result<u16, DecodeError> {
    let unit = match self.peek() {
      Some(b'"') => 0x22,
      Some(b'\\') => 0x5C,
      Some(b'/') => 0x2F,
      Some(b'b') => 0x08,
      Some(b'f') => 0x0C,
      Some(b'n') => 0x0A,
      Some(b'r') => 0x0D,
      Some(b't') => 0x09,
      Some(b'u') => {
        self.pos += 1;
        return self.parse_hex4();
      }
      _ => return Err(self.syntax("invalid escape")),
    };
    self.pos += 1;
    Ok(unit)
  }

  fn parse_hex4(&mut self) -> Result<u16, DecodeError> {
    let mut unit: u16 = 0;
    for _ in 0..4 {
      let digit = self
        .peek()
        .and_then(|byte| (byte as char).to_digit(16))
        .ok_or_else(|| self.syntax("invalid \\u escape"))?;
      unit = (unit << 4) | digit as u16;
      self.pos += 1;
    }
    Ok(unit)
  }

  fn skip_digits(&mut self) -> usize {
    let start = self.pos;
    while let Some(b'0'..=b'9') = self.peek() {
      self.pos += 1;
    }
    self.pos - start
  }

  fn parse_number(&mut self) -> Result<Value, DecodeError> {
    let start = self.pos;
    if self.peek() == Some(b'-') {
      self.pos += 1;
    }
    match self.peek() {
      Some(b'0') => self.pos += 1,
      Some(b'1'..=b'9') => {
        self.skip_digits();
      }
      _ => return Err(self.syntax("invalid number")),
    }

    let mut integral = true;
    if self.peek() == Some(b'.') {
      integral = false;
      self.pos += 1;
      if self.skip_digits() == 0 {
        return Err(self.syntax("expected digit after decimal point"));
      }
    }
    if let Some(b'e' | b'E') = self.peek() {
      integral = false;
      self.pos += 1;
      if let Some(b'+' | b'-') = self.peek() {
        self.pos += 1;
      }
      if self.skip_digits() == 0 {
        return Err(self.syntax("expected digit in exponent"));
      }
    }

    let literal = &self.src[start..self.pos];
    if integral && self.options.numbers == NumberMode::IntegerPreserving {
      let canonical = if literal == "-0" { "0" } else { literal };
      return Ok(Value::Integer(canonical.to_string()));
    }

    let value: f64 = literal.parse().map_err(|_| DecodeError::Syntax {
      offset: start,
      message: format!("unreadable number {literal}"),
    })?;
    if !value.is_finite() {
      return Err(DecodeError::NonFinite {
        offset: start,
        literal: literal.to_string(),
      });
    }
    Ok(Value::Number(value))
  }
}
