use crate::text::decode_text;
use crate::value::parse;
use crate::value::DecodeError;
use crate::value::DuplicateKeys;
use crate::value::NumberMode;
use crate::value::Value;
use crate::value::DEFAULT_MAX_DEPTH;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompareOptions {
  pub numbers: NumberMode,
  pub duplicate_keys: DuplicateKeys,
  pub max_depth: usize,
}

impl Default for CompareOptions {
  fn default() -> Self {
    CompareOptions {
      numbers: NumberMode::default(),
      duplicate_keys: DuplicateKeys::default(),
      max_depth: DEFAULT_MAX_DEPTH,
    }
  }
}

/// Which of the two compared documents could not be decoded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Side {
  Original,
  Candidate,
}

impl fmt::Display for Side {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Side::Original => "original",
      Side::Candidate => "round-tripped output",
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{side} could not be decoded: {source}")]
pub struct CompareError {
  pub side: Side,
  #[source]
  pub source: DecodeError,
}

/// The first place where two values differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Difference {
  pub path: String,
  pub detail: String,
}

impl fmt::Display for Difference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "at {}: {}", self.path, self.detail)
  }
}

/// Decides whether two encoded documents hold the same value.
#[derive(Debug, Clone, Copy, Default)]
pub struct Comparator {
  options: CompareOptions,
}

impl Comparator {
  pub fn new(options: CompareOptions) -> Self {
    Self { options }
  }

  pub fn options(&self) -> &CompareOptions {
    &self.options
  }

  pub fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
    let text = decode_text(bytes)?;
    parse(&text, &self.options)
  }

  pub fn equal(&self, original: &[u8], candidate: &[u8]) -> Result<bool, CompareError> {
    let (original, candidate) = self.decode_pair(original, candidate)?;
    Ok(original == candidate)
  }

  /// Like [`Comparator::equal`], but describes the first difference found.
  pub fn compare(
    &self,
    original: &[u8],
    candidate: &[u8],
  ) -> Result<Option<Difference>, CompareError> {
    let (original, candidate) = self.decode_pair(original, candidate)?;
    if original == candidate {
      return Ok(None);
    }
    Ok(Some(first_difference("$", &original, &candidate).unwrap_or(
      Difference {
        path: "$".to_string(),
        detail: "values differ".to_string(),
      },
    )))
  }

  fn decode_pair(&self, original: &[u8], candidate: &[u8]) -> Result<(Value, Value), CompareError> {
    let original = self.decode(original).map_err(|source| CompareError {
      side: Side::Original,
      source,
    })?;
    let candidate = self.decode(candidate).map_err(|source| CompareError {
      side: Side::Candidate,
      source,
    })?;
    Ok((original, candidate))
  }
}

fn first_difference(path: &str, left: &Value, right: &Value) -> Option<Difference> {
  let differ = |detail: String| {
    Some(Difference {
      path: path.to_string(),
      detail,
    })
  };

  match (left, right) {
    (Value::Array(left), Value::Array(right)) => {
      if left.len() != right.len() {
        return differ(format!(
          "array length {} != {}",
          left.len(),
          right.len()
        ));
      }
      left
        .iter()
        .zip(right)
        .enumerate()
        .find_map(|(idx, (l, r))| first_difference(&format!("{path}[{idx}]"), l, r))
    }
    (Value::Object(left), Value::Object(right)) => {
      if let Some(key) = left.keys().find(|key| !right.contains_key(*key)) {
        return differ(format!("key {:?} missing from output", key.to_string()));
      }
      if let Some(key) = right.keys().find(|key| !left.contains_key(*key)) {
        return differ(format!("unexpected key {:?} in output", key.to_string()));
      }
      left.iter().find_map(|(key, l)| {
        let r = right.get(key)?;
        first_difference(&format!("{path}.{}", key), l, r)
      })
    }
    _ if left == right => None,
    _ if left.kind() != right.kind() => differ(format!(
      "{} {} != {} {}",
      left.kind(),
      left.summary(),
      right.kind(),
      right.summary()
    )),
    _ => differ(format!("{} != {}", left.summary(), right.summary())),
  }
}
