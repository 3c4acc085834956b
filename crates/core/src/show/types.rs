//! Show identity types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Two-part owner identifier: metadata namespace (indexer) + id within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShowId {
    pub namespace: u32,
    pub id: u64,
}

impl ShowId {
    pub fn new(namespace: u32, id: u64) -> Self {
        Self { namespace, id }
    }
}

impl fmt::Display for ShowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.id)
    }
}

/// A show known to the local library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Show {
    pub id: ShowId,
    pub name: String,
    /// Anime uses absolute numbering and release-group driven parsing.
    #[serde(default)]
    pub is_anime: bool,
    /// Alternative names used when resolving release titles.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl Show {
    pub fn new(id: ShowId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_anime: false,
            aliases: Vec::new(),
        }
    }

    pub fn anime(mut self) -> Self {
        self.is_anime = true;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// All names this show answers to, primary name first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Errors resolving a show.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    /// More than one show matches the identifier.
    #[error("multiple shows match {0}")]
    Ambiguous(String),
}
