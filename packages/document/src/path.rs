//! # Paths
//!
//! A [`Path`] addresses a node of the configuration tree. Its canonical text
//! form joins keys with dots and writes array slots in brackets:
//!
//! ```text
//! phases[0].stages[2].id
//! ```
//!
//! Keys that are empty or contain `.`, `[`, `]`, `"` or `\` are written as a
//! quoted bracket step, `meta["a.b"]`, so every path prints back to text that
//! parses to the same steps.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Empty key at offset {0}")]
    EmptyKey(usize),

    #[error("Unclosed '[' at offset {0}")]
    UnclosedBracket(usize),

    #[error("Invalid array index '{index}' at offset {offset}")]
    InvalidIndex { index: String, offset: usize },

    #[error("Unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
}

/// One step of a path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    Key(String),
    Index(usize),
}

/// Ordered sequence of steps from the document root
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    steps: Vec<Step>,
}

impl Path {
    /// The document root
    pub fn root() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn parse(text: &str) -> Result<Self, PathError> {
        text.parse()
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Copy of this path extended by an object key
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut steps = self.steps.clone();
        steps.push(Step::Key(key.into()));
        Self { steps }
    }

    /// Copy of this path extended by an array index
    pub fn index(&self, index: usize) -> Self {
        let mut steps = self.steps.clone();
        steps.push(Step::Index(index));
        Self { steps }
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn parent(&self) -> Option<Path> {
        if self.steps.is_empty() {
            return None;
        }
        Some(Self {
            steps: self.steps[..self.steps.len() - 1].to_vec(),
        })
    }

    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// True when `self` is `other` or lies underneath it
    pub fn starts_with(&self, other: &Path) -> bool {
        self.steps.starts_with(&other.steps)
    }
}

impl From<Vec<Step>> for Path {
    fn from(steps: Vec<Step>) -> Self {
        Self { steps }
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut steps = Vec::new();
        let bytes: Vec<char> = text.chars().collect();
        let mut i = 0;

        // Expect a key at the start and after every '.'
        let mut expect_key = !bytes.is_empty();

        while i < bytes.len() {
            if expect_key {
                let start = i;
                while i < bytes.len() && bytes[i] != '.' && bytes[i] != '[' {
                    if bytes[i] == ']' {
                        return Err(PathError::UnexpectedChar { ch: ']', offset: i });
                    }
                    i += 1;
                }
                if i == start {
                    // `[0]` at the very start addresses a root array
                    if !(start == 0 && i < bytes.len() && bytes[i] == '[') {
                        return Err(PathError::EmptyKey(start));
                    }
                } else {
                    steps.push(Step::Key(bytes[start..i].iter().collect()));
                }
                expect_key = false;
                continue;
            }

            match bytes[i] {
                '.' => {
                    i += 1;
                    if i >= bytes.len() {
                        return Err(PathError::EmptyKey(i));
                    }
                    expect_key = true;
                }
                '[' if bytes.get(i + 1) == Some(&'"') => {
                    let open = i;
                    i += 2;
                    let mut key = String::new();
                    loop {
                        match bytes.get(i) {
                            None => return Err(PathError::UnclosedBracket(open)),
                            Some('"') => break,
                            Some('\\') => {
                                let escaped = bytes
                                    .get(i + 1)
                                    .ok_or(PathError::UnclosedBracket(open))?;
                                key.push(*escaped);
                                i += 2;
                            }
                            Some(ch) => {
                                key.push(*ch);
                                i += 1;
                            }
                        }
                    }
                    i += 1;
                    match bytes.get(i) {
                        Some(']') => i += 1,
                        Some(ch) => return Err(PathError::UnexpectedChar { ch: *ch, offset: i }),
                        None => return Err(PathError::UnclosedBracket(open)),
                    }
                    steps.push(Step::Key(key));
                }
                '[' => {
                    let open = i;
                    i += 1;
                    let start = i;
                    while i < bytes.len() && bytes[i] != ']' {
                        i += 1;
                    }
                    if i >= bytes.len() {
                        return Err(PathError::UnclosedBracket(open));
                    }
                    let raw: String = bytes[start..i].iter().collect();
                    let index = raw.parse::<usize>().map_err(|_| PathError::InvalidIndex {
                        index: raw.clone(),
                        offset: start,
                    })?;
                    steps.push(Step::Index(index));
                    i += 1;
                }
                ch => return Err(PathError::UnexpectedChar { ch, offset: i }),
            }
        }

        Ok(Self { steps })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                Step::Key(key) if needs_quoting(key) => write_quoted(f, key)?,
                Step::Key(key) if i == 0 => write!(f, "{key}")?,
                Step::Key(key) => write!(f, ".{key}")?,
                Step::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

fn needs_quoting(key: &str) -> bool {
    key.is_empty() || key.contains(['.', '[', ']', '"', '\\'])
}

fn write_quoted(f: &mut fmt::Formatter<'_>, key: &str) -> fmt::Result {
    f.write_str("[\"")?;
    for ch in key.chars() {
        if ch == '"' || ch == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{ch}")?;
    }
    f.write_str("\"]")
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Key(key) => f.write_str(key),
            Step::Index(index) => write!(f, "{index}"),
        }
    }
}
