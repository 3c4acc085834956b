use serde::{Deserialize, Serialize};

/// Content-sanity filter on release names.
///
/// A name is rejected when it contains any ignore word, or when require words
/// are configured and it contains none of them. Words match whole tokens of
/// the name, case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordFilter {
    #[serde(default = "default_ignore_words")]
    pub ignore_words: Vec<String>,
    #[serde(default)]
    pub require_words: Vec<String>,
}

fn default_ignore_words() -> Vec<String> {
    [
        "german", "french", "core2hd", "dutch", "swedish", "reenc", "mrlss", "dubbed", "sample",
    ]
    .iter()
    .map(|w| w.to_string())
    .collect()
}

impl Default for WordFilter {
    fn default() -> Self {
        Self {
            ignore_words: default_ignore_words(),
            require_words: Vec::new(),
        }
    }
}

impl WordFilter {
    pub fn passes(&self, name: &str) -> bool {
        let tokens = tokenize(name);
        let contains = |word: &String| {
            let word = tokenize(word);
            !word.is_empty() && tokens.windows(word.len()).any(|w| w == word.as_slice())
        };

        if self.ignore_words.iter().any(contains) {
            return false;
        }
        self.require_words.is_empty() || self.require_words.iter().any(contains)
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}
