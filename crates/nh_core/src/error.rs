use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Article {external_id} is already stored")]
    DuplicateArticle { external_id: String },

    #[error("Slug {slug} is already taken in topic {topic}")]
    SlugTaken { topic: String, slug: String },

    #[error("Image hash {0} is already recorded")]
    DuplicateImage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    /// True for the uniqueness violations a store reports instead of writing.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Error::DuplicateArticle { .. } | Error::SlugTaken { .. } | Error::DuplicateImage(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
