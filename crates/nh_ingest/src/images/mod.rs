pub mod rights;
pub mod screener;

pub use rights::find_rights_marker;
pub use screener::{content_hash, ImageScreener, ScreenConfig};
