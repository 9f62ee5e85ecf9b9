use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("failed to read label file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed label on line {line_no}: {line:?} (expected \"<index> <name>\")")]
    Malformed { line_no: usize, line: String },
    #[error("label file contains no labels")]
    Empty,
}

/// One line of the label file, e.g. `0 klaaspakend`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabel {
    pub index: usize,
    pub name: String,
    pub line: String,
}

impl ClassLabel {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (index, name) = line.split_once(char::is_whitespace)?;
        let index = index.parse().ok()?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        Some(ClassLabel {
            index,
            name: name.to_string(),
            line: line.to_string(),
        })
    }
}

/// Labels in model output order.
#[derive(Debug, Clone)]
pub struct LabelSet {
    labels: Vec<ClassLabel>,
}

impl LabelSet {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LabelError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, LabelError> {
        let mut labels = Vec::new();

        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let label = ClassLabel::parse(line).ok_or_else(|| LabelError::Malformed {
                line_no: line_no + 1,
                line: line.to_string(),
            })?;
            if label.index != labels.len() {
                tracing::warn!(
                    declared = label.index,
                    position = labels.len(),
                    "label index does not match its position, using position"
                );
            }
            labels.push(label);
        }

        if labels.is_empty() {
            return Err(LabelError::Empty);
        }

        Ok(LabelSet { labels })
    }

    pub fn get(&self, index: usize) -> Option<&ClassLabel> {
        self.labels.get(index)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }
}
