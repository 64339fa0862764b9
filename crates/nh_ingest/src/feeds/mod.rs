pub mod newsdata;

pub use newsdata::{parse_candidates, FeedConfig, NewsDataClient};
