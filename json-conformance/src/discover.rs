use crate::HarnessError;
use crate::Result;
use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use walkdir::WalkDir;

/// What the corpus file name says the library must do with the document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
  MustAccept,
  MustReject,
  NoConstraint,
}

impl Expectation {
  /// Derives the expectation from the first character of a file name.
  pub fn from_file_name(name: &str) -> Self {
    match name.chars().next() {
      Some('y') => Expectation::MustAccept,
      Some('n') => Expectation::MustReject,
      _ => Expectation::NoConstraint,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
  pub id: String,
  pub path: PathBuf,
  pub expectation: Expectation,
}

impl TestCase {
  pub fn from_path(root: &Path, path: PathBuf) -> Self {
    let id = normalize_id(root, &path);
    let expectation = path
      .file_name()
      .map(|name| Expectation::from_file_name(&name.to_string_lossy()))
      .unwrap_or(Expectation::NoConstraint);
    TestCase {
      id,
      path,
      expectation,
    }
  }
}

#[derive(Debug, Clone)]
pub enum Filter {
  All,
  Glob(GlobSet),
  Regex(Regex),
}

pub fn build_filter(pattern: Option<&str>) -> Result<Filter> {
  match pattern {
    None => Ok(Filter::All),
    Some(raw) => {
      if let Ok(glob) = Glob::new(raw) {
        let mut builder = GlobSetBuilder::new();
        builder.add(glob);
        let set = builder
          .build()
          .map_err(|err| HarnessError::InvalidFilter(err.to_string()))?;
        return Ok(Filter::Glob(set));
      }

      let regex = Regex::new(raw).map_err(|err| HarnessError::InvalidFilter(err.to_string()))?;
      Ok(Filter::Regex(regex))
    }
  }
}

impl Filter {
  pub fn matches(&self, id: &str) -> bool {
    match self {
      Filter::All => true,
      Filter::Glob(set) => set.is_match(id),
      Filter::Regex(re) => re.is_match(id),
    }
  }
}

/// Lists every regular file under `root` that passes `filter`, sorted by id.
pub fn discover_corpus(root: &Path, filter: &Filter) -> Result<Vec<TestCase>> {
  if !root.is_dir() {
    return Err(HarnessError::Corpus(format!(
      "corpus directory {} does not exist",
      root.display()
    )));
  }

  let mut cases = Vec::new();
  for entry in WalkDir::new(root) {
    let entry = entry.map_err(|err| HarnessError::Corpus(err.to_string()))?;
    if !entry.file_type().is_file() {
      continue;
    }

    let case = TestCase::from_path(root, entry.into_path());
    if !filter.matches(&case.id) {
      continue;
    }
    cases.push(case);
  }

  cases.sort_by(|a, b| a.id.cmp(&b.id));
  Ok(cases)
}

fn normalize_id(root: &Path, path: &Path) -> String {
  let mut id = path
    .strip_prefix(root)
    .unwrap_or(path)
    .to_string_lossy()
    .into_owned();
  if id.contains('\\') {
    id = id.replace('\\', "/");
  }
  id
}
