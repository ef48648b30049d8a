pub mod article;
pub mod html;

use std::{sync::Arc, thread::sleep, time::Duration};

use crate::config::ScrapeConfig;
use crate::errors::{ExtractionError, FetchError};
use crate::scrape::PageFetcher;
use crate::text::{char_len, clean_text};

pub use article::{Article, ArticleParser, ReadabilityParser};

/// Text must be longer than this for a structured article to count.
pub const ARTICLE_MIN_CHARS: usize = 100;
/// Text must be longer than this for the generic html fallback to count.
pub const FALLBACK_MIN_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    Article,
    Html,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedContent {
    pub title: String,
    pub text: String,
    pub authors: Vec<String>,
    pub publisher: String,
    pub method: ExtractionMethod,
}

/// Result of one extraction tier.
#[derive(Debug)]
pub enum TierOutcome {
    Extracted(ExtractedContent),
    /// The tier ran but produced too little text (character count attached)
    Insufficient(usize),
    Failed(String),
}

/// Anything that turns a url into page content.
pub trait ContentSource {
    fn extract(&self, url: &str) -> Result<ExtractedContent, ExtractionError>;
}

/// Two-tier extractor: structured article parsing, then generic html heuristics.
pub struct ContentExtractor {
    fetcher: Arc<dyn PageFetcher>,
    article_parser: Box<dyn ArticleParser>,
    request_delay: Duration,
}

impl ContentExtractor {
    pub fn new(
        config: &ScrapeConfig,
        fetcher: Arc<dyn PageFetcher>,
        article_parser: Box<dyn ArticleParser>,
    ) -> Self {
        Self {
            fetcher,
            article_parser,
            request_delay: config.request_delay(),
        }
    }

    /// Production wiring: both tiers share one fetcher.
    pub fn with_fetcher(config: &ScrapeConfig, fetcher: Arc<dyn PageFetcher>) -> Self {
        let article_parser = Box::new(ReadabilityParser::new(fetcher.clone()));
        Self::new(config, fetcher, article_parser)
    }

    pub fn article_tier(&self, url: &str) -> TierOutcome {
        let article = match self.article_parser.parse_article(url) {
            Ok(a) => a,
            Err(err) => return TierOutcome::Failed(err.to_string()),
        };

        let text = clean_text(&article.text);
        let len = char_len(&text);
        if len <= ARTICLE_MIN_CHARS {
            return TierOutcome::Insufficient(len);
        }

        TierOutcome::Extracted(ExtractedContent {
            title: article.title.trim().to_string(),
            text,
            authors: article.authors,
            // the article parser doesn't reliably expose one
            publisher: publisher_from_url(url),
            method: ExtractionMethod::Article,
        })
    }

    /// Fetch errors are returned as `Err` since they end the whole extraction.
    /// An empty body is `Failed`.
    pub fn html_tier(&self, url: &str) -> Result<TierOutcome, FetchError> {
        let page = self.fetcher.fetch(url)?;
        log::debug!("{url}: status {}, {} bytes", page.status, page.html.len());
        if page.html.trim().is_empty() {
            return Ok(TierOutcome::Failed(format!("empty response body (status {})", page.status)));
        }
        let page = html::parse_page(&page.html, url);

        let text = clean_text(&page.text);
        let len = char_len(&text);
        if len <= FALLBACK_MIN_CHARS {
            return Ok(TierOutcome::Insufficient(len));
        }

        Ok(TierOutcome::Extracted(ExtractedContent {
            title: page.title,
            text,
            authors: page.author.into_iter().collect(),
            publisher: page.publisher,
            method: ExtractionMethod::Html,
        }))
    }
}

impl ContentSource for ContentExtractor {
    fn extract(&self, url: &str) -> Result<ExtractedContent, ExtractionError> {
        if !self.request_delay.is_zero() {
            sleep(self.request_delay);
        }

        match self.article_tier(url) {
            TierOutcome::Extracted(content) => return Ok(content),
            TierOutcome::Insufficient(len) => {
                log::debug!("article extraction for {url} yielded only {len} chars")
            }
            TierOutcome::Failed(err) => log::debug!("article extraction failed for {url}: {err}"),
        }

        match self.html_tier(url)? {
            TierOutcome::Extracted(content) => Ok(content),
            TierOutcome::Insufficient(len) => {
                log::warn!("Insufficient content extracted from {url} ({len} chars)");
                Err(ExtractionError::NoContent {
                    url: url.to_string(),
                })
            }
            TierOutcome::Failed(err) => {
                log::warn!("html extraction failed for {url}: {err}");
                Err(ExtractionError::NoContent {
                    url: url.to_string(),
                })
            }
        }
    }
}

/// Publisher guess from the domain: `www.nytimes.com` -> `Nytimes`.
pub fn publisher_from_url(url: &str) -> String {
    let host = match url::Url::parse(url.trim()) {
        Ok(u) => match u.host_str() {
            Some(h) => h.to_lowercase(),
            None => return String::new(),
        },
        Err(_) => return String::new(),
    };

    let mut domain = host.as_str();
    for prefix in ["www.", "m."] {
        if let Some(rest) = domain.strip_prefix(prefix) {
            domain = rest;
        }
    }

    match domain.split_once('.') {
        Some((label, _)) if !label.is_empty() => title_case(label),
        _ => String::new(),
    }
}

fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut boundary = true;
    for ch in word.chars() {
        if ch.is_alphabetic() {
            if boundary {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            boundary = false;
        } else {
            out.push(ch);
            boundary = true;
        }
    }
    out
}
