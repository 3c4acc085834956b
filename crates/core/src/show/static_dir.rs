//! In-memory show directory built from configuration.

use std::collections::HashMap;

use super::{name_key, LookupError, Show, ShowDirectory, ShowId};

/// Show directory backed by a fixed list of shows.
#[derive(Debug, Clone, Default)]
pub struct StaticShowDirectory {
    shows: Vec<Show>,
    by_name: HashMap<String, usize>,
}

impl StaticShowDirectory {
    pub fn new(shows: Vec<Show>) -> Self {
        let mut by_name = HashMap::new();
        for (idx, show) in shows.iter().enumerate() {
            for name in show.names() {
                // first registration wins on alias collisions
                by_name.entry(name_key(name)).or_insert(idx);
            }
        }
        Self { shows, by_name }
    }

    pub fn len(&self) -> usize {
        self.shows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shows.is_empty()
    }
}

impl ShowDirectory for StaticShowDirectory {
    fn find_by_id(&self, id: &ShowId) -> Result<Option<Show>, LookupError> {
        let mut matches = self.shows.iter().filter(|s| s.id == *id);
        let first = matches.next();
        if matches.next().is_some() {
            return Err(LookupError::Ambiguous(id.to_string()));
        }
        Ok(first.cloned())
    }

    fn find_by_name(&self, name: &str) -> Option<Show> {
        self.by_name
            .get(&name_key(name))
            .and_then(|idx| self.shows.get(*idx))
            .cloned()
    }
}
