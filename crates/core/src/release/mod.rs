//! Release name handling.
//!
//! Parsing of release titles into season/episode/quality, proper and repack
//! classification, and the word filter applied to candidate names.

mod filter;
mod parser;
mod quality;

pub use filter::WordFilter;
pub use parser::{NameParser, ParseError, ParseHint, ParseResult, SceneNameParser};
pub use quality::{ProperLevel, Quality};
