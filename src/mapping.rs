use std::collections::HashMap;
use std::fs;
use std::ops::Index;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ClassifyError, Result};

/// One entry of a model's fixed output vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    /// Stable identifier, e.g. the WordNet id `n01440764`.
    pub class_id: String,
    /// Raw name as shipped with the model, e.g. `golden_retriever`.
    pub name: String,
}

/// Class index to label table, in output order of the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
    labels: Vec<Label>,
}

impl LabelVocabulary {
    pub fn new(labels: Vec<Label>) -> Result<Self> {
        if labels.is_empty() {
            return Err(ClassifyError::Startup("label vocabulary is empty".to_string()));
        }
        Ok(Self { labels })
    }

    /// Loads a vocabulary file, picking the parser from its extension and contents.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| ClassifyError::Startup(format!("{}: {}", path.display(), e)))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_class_index_json(&text)
        } else if looks_like_synsets(&text) {
            Self::from_synset_text(&text)
        } else {
            Self::from_plain_text(&text)
        }
    }

    /// Keras class index: `{"0": ["n01440764", "tench"], ...}`.
    pub fn from_class_index_json(text: &str) -> Result<Self> {
        let index: HashMap<String, (String, String)> = serde_json::from_str(text)
            .map_err(|e| ClassifyError::Startup(format!("malformed class index: {}", e)))?;

        let mut entries = index
            .into_iter()
            .map(|(key, (class_id, name))| {
                key.parse::<usize>()
                    .map(|i| (i, Label { class_id, name }))
                    .map_err(|_| ClassifyError::Startup(format!("class index key {:?} is not a number", key)))
            })
            .collect::<Result<Vec<_>>>()?;
        entries.sort_by_key(|(i, _)| *i);

        if let Some(pos) = entries.iter().enumerate().position(|(pos, (i, _))| pos != *i) {
            return Err(ClassifyError::Startup(format!("class index has no entry for class {}", pos)));
        }
        Self::new(entries.into_iter().map(|(_, label)| label).collect())
    }

    /// Synset listing: `n01440764 tench, Tinca tinca`, one class per line.
    pub fn from_synset_text(text: &str) -> Result<Self> {
        let labels = non_empty_lines(text)
            .map(|line| -> Result<Label> {
                let caps = SYNSET_LINE
                    .captures(line)
                    .ok_or_else(|| ClassifyError::Startup(format!("malformed synset line: {:?}", line)))?;
                let names = &caps[2];
                let name = names.split(',').next().unwrap_or(names).trim();
                Ok(Label {
                    class_id: caps[1].to_string(),
                    name: name.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(labels)
    }

    /// One label per line; the line index is the class id.
    pub fn from_plain_text(text: &str) -> Result<Self> {
        let labels = non_empty_lines(text)
            .enumerate()
            .map(|(id, name)| Label {
                class_id: id.to_string(),
                name: name.to_string(),
            })
            .collect();
        Self::new(labels)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Label> {
        self.labels.get(index)
    }
}

impl Index<usize> for LabelVocabulary {
    type Output = Label;

    fn index(&self, index: usize) -> &Label {
        &self.labels[index]
    }
}

static SYNSET_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(n\d{8})\s+(.+)$").expect("synset pattern is valid"));

fn non_empty_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}

fn looks_like_synsets(text: &str) -> bool {
    let mut lines = non_empty_lines(text).peekable();
    lines.peek().is_some() && lines.all(|line| SYNSET_LINE.is_match(line))
}
