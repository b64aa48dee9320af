//! Byte-to-text decoding for the oracle parser.
//!
//! JSON documents given as raw bytes may be UTF-8 (optionally with a BOM),
//! UTF-16 or UTF-32. Without a BOM the encoding is inferred from where NUL
//! bytes appear in the first four bytes, since the first character of a JSON
//! text is always ASCII.

use crate::value::DecodeError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
  Utf8,
  Utf16Le,
  Utf16Be,
  Utf32Le,
  Utf32Be,
}

impl fmt::Display for Encoding {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Encoding::Utf8 => "UTF-8",
      Encoding::Utf16Le => "UTF-16LE",
      Encoding::Utf16Be => "UTF-16BE",
      Encoding::Utf32Le => "UTF-32LE",
      Encoding::Utf32Be => "UTF-32BE",
    })
  }
}

const BOM_UTF8: &[u8] = &[0xEF, 0xBB, 0xBF];
const BOM_UTF16_LE: &[u8] = &[0xFF, 0xFE];
const BOM_UTF16_BE: &[u8] = &[0xFE, 0xFF];
const BOM_UTF32_LE: &[u8] = &[0xFF, 0xFE, 0x00, 0x00];
const BOM_UTF32_BE: &[u8] = &[0x00, 0x00, 0xFE, 0xFF];

/// Returns the encoding of `bytes` and the length of its byte order mark.
pub fn detect_encoding(bytes: &[u8]) -> (Encoding, usize) {
  // UTF-32LE's BOM starts with UTF-16LE's, so it must be checked first.
  if bytes.starts_with(BOM_UTF32_LE) {
    return (Encoding::Utf32Le, 4);
  }
  if bytes.starts_with(BOM_UTF32_BE) {
    return (Encoding::Utf32Be, 4);
  }
  if bytes.starts_with(BOM_UTF16_LE) {
    return (Encoding::Utf16Le, 2);
  }
  if bytes.starts_with(BOM_UTF16_BE) {
    return (Encoding::Utf16Be, 2);
  }
  if bytes.starts_with(BOM_UTF8) {
    return (Encoding::Utf8, 3);
  }

  let encoding = match bytes {
    [0, 0, _, _, ..] => Encoding::Utf32Be,
    [0, _, _, _, ..] => Encoding::Utf16Be,
    [_, 0, 0, 0, ..] => Encoding::Utf32Le,
    [_, 0, _, _, ..] => Encoding::Utf16Le,
    [0, _] => Encoding::Utf16Be,
    [_, 0] => Encoding::Utf16Le,
    _ => Encoding::Utf8,
  };
  (encoding, 0)
}

/// Decodes a document into text, failing with [`DecodeError::InvalidText`]
/// when the bytes are not valid in the detected encoding.
pub fn decode_text(bytes: &[u8]) -> Result<String, DecodeError> {
  let (encoding, bom) = detect_encoding(bytes);
  let body = &bytes[bom..];
  let invalid = |offset: usize| DecodeError::InvalidText {
    encoding,
    offset: bom + offset,
  };

  match encoding {
    Encoding::Utf8 => std::str::from_utf8(body)
      .map(str::to_owned)
      .map_err(|err| invalid(err.valid_up_to())),
    Encoding::Utf16Le | Encoding::Utf16Be => {
      if body.len() % 2 != 0 {
        return Err(invalid(body.len() - 1));
      }
      let units = body.chunks_exact(2).map(|pair| {
        let pair = [pair[0], pair[1]];
        if encoding == Encoding::Utf16Le {
          u16::from_le_bytes(pair)
        } else {
          u16::from_be_bytes(pair)
        }
      });
      let mut text = String::with_capacity(body.len() / 2);
      let mut consumed = 0;
      for decoded in char::decode_utf16(units) {
        let ch = decoded.map_err(|_| invalid(consumed * 2))?;
        consumed += ch.len_utf16();
        text.push(ch);
      }
      Ok(text)
    }
    Encoding::Utf32Le | Encoding::Utf32Be => {
      if body.len() % 4 != 0 {
        return Err(invalid(body.len() - body.len() % 4));
      }
      let mut text = String::with_capacity(body.len() / 4);
      for (idx, quad) in body.chunks_exact(4).enumerate() {
        let quad = [quad[0], quad[1], quad[2], quad[3]];
        let scalar = if encoding == Encoding::Utf32Le {
          u32::from_le_bytes(quad)
        } else {
          u32::from_be_bytes(quad)
        };
        let ch = char::from_u32(scalar).ok_or_else(|| invalid(idx * 4))?;
        text.push(ch);
      }
      Ok(text)
    }
  }
}
