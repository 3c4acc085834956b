//! Show directory: resolves owning shows for cache entries.
//!
//! The library of shows is owned elsewhere; the cache and matcher only need
//! to look shows up by id or by name.

mod static_dir;
mod types;

pub use static_dir::StaticShowDirectory;
pub use types::{LookupError, Show, ShowId};

/// Read-only view of the local show library.
pub trait ShowDirectory: Send + Sync {
    /// Find a show by its owner identifier.
    ///
    /// `Ok(None)` means the show is unknown (e.g. deleted since caching);
    /// `Err(LookupError::Ambiguous)` means the id maps to several shows.
    fn find_by_id(&self, id: &ShowId) -> Result<Option<Show>, LookupError>;

    /// Find a show by name or alias (case-insensitive, separators ignored).
    fn find_by_name(&self, name: &str) -> Option<Show>;
}

/// Normalize a show name for comparisons: lowercase, alphanumerics only.
pub fn name_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_key_ignores_separators_and_case() {
        assert_eq!(name_key("Show.Name"), "showname");
        assert_eq!(name_key("show name"), "showname");
        assert_eq!(name_key("SHOW_NAME!"), "showname");
    }
}
