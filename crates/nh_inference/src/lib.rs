pub mod metadata;
pub mod models;
pub mod rewriter;

pub use metadata::MetadataGenerator;
pub use models::{create_model, ModelConfig};
pub use rewriter::ContentRewriter;

pub mod prelude {
    pub use super::metadata::MetadataGenerator;
    pub use super::models::{create_model, ModelConfig};
    pub use super::rewriter::ContentRewriter;
    pub use nh_core::{Derived, Error, Metadata, Result, TextGenerator};
}
