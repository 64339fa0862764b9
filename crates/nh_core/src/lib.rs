pub mod derived;
pub mod error;
pub mod feed;
pub mod models;
pub mod screen;
pub mod slug;
pub mod storage;
pub mod types;

pub use derived::Derived;
pub use error::{Error, Result};
pub use feed::SourceFeed;
pub use models::{CompletionRequest, TextGenerator};
pub use screen::{ImageScreen, RejectReason, ScreenVerdict};
pub use storage::{ArticleStore, ImageHashStore};
pub use types::{Article, Candidate, ImageHashRecord, Metadata, Page, Topic};

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
