use std::sync::Arc;

use nh_core::{truncate_chars, CompletionRequest, Derived, Metadata, TextGenerator};
use tracing::{debug, warn};

pub const SUMMARY_MAX_CHARS: usize = 160;
pub const MAX_KEYWORDS: usize = 7;

const SYSTEM_ROLE: &str = "You are an SEO expert.";
const CONTENT_PREVIEW_CHARS: usize = 500;
const MAX_TOKENS: u32 = 200;
const TEMPERATURE: f32 = 0.3;

const LABELS: &[&str] = &["meta description", "description", "summary", "focus keywords", "keywords"];

/// Derives a short summary and keyword list for an article.
pub struct MetadataGenerator {
    model: Arc<dyn TextGenerator>,
}

impl MetadataGenerator {
    pub fn new(model: Arc<dyn TextGenerator>) -> Self {
        Self { model }
    }

    fn request(title: &str, content: &str) -> CompletionRequest {
        CompletionRequest {
            system: SYSTEM_ROLE.to_string(),
            user: format!(
                "Generate SEO metadata for this news article:\n\
                 Title: {}\n\
                 Content: {}...\n\n\
                 Reply with exactly two lines:\n\
                 1. Meta description (max {} characters)\n\
                 2. Focus keywords (5-7 keywords, comma separated)",
                title,
                truncate_chars(content, CONTENT_PREVIEW_CHARS),
                SUMMARY_MAX_CHARS
            ),
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        }
    }

    pub async fn generate(&self, title: &str, content: &str) -> Derived<Metadata> {
        match self.model.complete(&Self::request(title, content)).await {
            Ok(response) => match parse_response(&response) {
                Some(metadata) => {
                    if metadata.keywords.is_empty() {
                        debug!("🏷️ Metadata response had no keyword line");
                    }
                    Derived::Generated(metadata)
                }
                None => {
                    warn!("⚠️ Metadata response had no usable lines, truncating content");
                    Derived::fallback(truncated(content), "malformed response")
                }
            },
            Err(e) => {
                warn!("⚠️ Metadata generation failed, truncating content: {}", e);
                Derived::fallback(truncated(content), e.to_string())
            }
        }
    }
}

fn truncated(content: &str) -> Metadata {
    Metadata {
        summary: truncate_chars(content, SUMMARY_MAX_CHARS).to_string(),
        keywords: Vec::new(),
    }
}

/// Strip `1.` / `2)` numbering and a known `Label:` prefix from a response line.
fn clean_line(line: &str) -> &str {
    let mut line = line.trim();

    // list numbering is one or two digits, `.` or `)`, then whitespace
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if (1..=2).contains(&digits) {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                line = rest.trim_start();
            }
        }
    }

    if let Some((label, rest)) = line.split_once(':') {
        let label = label.trim().trim_matches('*').trim().to_lowercase();
        if LABELS.contains(&label.as_str()) {
            line = rest.trim();
        }
    }

    line.trim_matches('"').trim()
}

/// Line one is the summary, line two the keywords. `None` when nothing usable came back.
pub fn parse_response(response: &str) -> Option<Metadata> {
    let mut lines = response
        .lines()
        .map(clean_line)
        .filter(|line| !line.is_empty());

    let summary = truncate_chars(lines.next()?, SUMMARY_MAX_CHARS).to_string();
    let keywords = lines
        .next()
        .map(|line| {
            line.split(',')
                .map(|k| k.trim().trim_end_matches('.').trim())
                .filter(|k| !k.is_empty())
                .take(MAX_KEYWORDS)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(Metadata { summary, keywords })
}
