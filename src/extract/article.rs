//! Structured article extraction: downloads a page and pulls out the main
//! article body by scoring paragraph containers, readability style.

use std::{collections::HashMap, sync::Arc};

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::html::element_text;
use crate::scrape::PageFetcher;

const PARAGRAPH_MIN_CHARS: usize = 25;
const CLASS_WEIGHT: f64 = 25.0;

static OG_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).expect("static selector"));
static PLAIN_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("static selector"));
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("static selector"));
static AUTHORS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        r#"meta[name="author"], meta[property="article:author"], [rel="author"], [itemprop="author"]"#,
    )
    .expect("static selector")
});
static PARAGRAPHS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p, pre, blockquote").expect("static selector"));
static LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("static selector"));

static POSITIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)article|body|content|entry|main|page|post|story|text|blog").expect("static regex")
});
static NEGATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)comment|footer|sidebar|sponsor|widget|banner|related|share|promo|ad-|nav|menu")
        .expect("static regex")
});

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Article {
    pub title: String,
    pub text: String,
    pub authors: Vec<String>,
}

/// Download and parse a url into an article.
pub trait ArticleParser {
    fn parse_article(&self, url: &str) -> anyhow::Result<Article>;
}

pub struct ReadabilityParser {
    fetcher: Arc<dyn PageFetcher>,
}

impl ReadabilityParser {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }
}

impl ArticleParser for ReadabilityParser {
    /// A single attempt: the html tier retries the same url anyway.
    fn parse_article(&self, url: &str) -> anyhow::Result<Article> {
        let page = self.fetcher.fetch_once(url)?;
        Ok(parse_article_html(&page.html))
    }
}

pub fn parse_article_html(html: &str) -> Article {
    let document = Html::parse_document(html);

    Article {
        title: article_title(&document),
        text: article_text(&document),
        authors: article_authors(&document),
    }
}

fn article_title(document: &Html) -> String {
    let og = document
        .select(&OG_TITLE)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(title) = og {
        return title.to_string();
    }

    for selector in [&*PLAIN_TITLE, &*H1] {
        if let Some(el) = document.select(selector).next() {
            let title = element_text(&el);
            if !title.is_empty() {
                return title;
            }
        }
    }

    String::new()
}

fn article_authors(document: &Html) -> Vec<String> {
    let mut authors: Vec<String> = Vec::new();

    for el in document.select(&AUTHORS) {
        let value = if el.value().name() == "meta" {
            el.value().attr("content").unwrap_or_default().trim().to_string()
        } else {
            element_text(&el)
        };

        let value = value
            .strip_prefix("By ")
            .or_else(|| value.strip_prefix("by "))
            .unwrap_or(&value)
            .trim()
            .to_string();

        if value.is_empty() || value.starts_with("http") || value.chars().count() > 100 {
            continue;
        }

        if !authors.contains(&value) {
            authors.push(value);
        }
    }

    authors
}

fn class_id_weight(el: &ElementRef) -> f64 {
    let mut weight = 0.0;
    for attr in [el.value().attr("class"), el.value().attr("id")].into_iter().flatten() {
        if NEGATIVE.is_match(attr) {
            weight -= CLASS_WEIGHT;
        }
        if POSITIVE.is_match(attr) {
            weight += CLASS_WEIGHT;
        }
    }
    weight
}

fn link_density(el: &ElementRef) -> f64 {
    let total = element_text(el).chars().count();
    if total == 0 {
        return 0.0;
    }

    let linked: usize = el
        .select(&LINKS)
        .map(|a| element_text(&a).chars().count())
        .sum();

    (linked as f64 / total as f64).min(1.0)
}

fn paragraph_score(text: &str) -> f64 {
    let commas = text.matches(',').count() as f64;
    let length_bonus = (text.chars().count() as f64 / 100.0).floor().min(3.0);
    1.0 + commas + length_bonus
}

fn article_text(document: &Html) -> String {
    // containers in first-seen order, so ties resolve deterministically
    let mut candidates: Vec<(ElementRef, f64)> = Vec::new();
    let mut index = HashMap::new();

    for p in document.select(&PARAGRAPHS) {
        let text = element_text(&p);
        if text.chars().count() < PARAGRAPH_MIN_CHARS {
            continue;
        }

        let score = paragraph_score(&text);
        let parent = p.parent().and_then(ElementRef::wrap);
        let grandparent = parent.and_then(|el| el.parent()).and_then(ElementRef::wrap);

        for (container, share) in [(parent, 1.0), (grandparent, 0.5)] {
            let Some(container) = container else {
                continue;
            };

            let idx = *index.entry(container.id()).or_insert_with(|| {
                candidates.push((container, class_id_weight(&container)));
                candidates.len() - 1
            });
            candidates[idx].1 += score * share;
        }
    }

    let mut best: Option<(ElementRef, f64)> = None;
    for (el, score) in candidates {
        let adjusted = score * (1.0 - link_density(&el));
        if best.map_or(true, |(_, top)| adjusted > top) {
            best = Some((el, adjusted));
        }
    }

    let Some((best, _)) = best else {
        return String::new();
    };

    best.select(&PARAGRAPHS)
        .map(|p| element_text(&p))
        .filter(|t| t.chars().count() >= PARAGRAPH_MIN_CHARS)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAGRAPH: &str = "The committee met on Tuesday, reviewed the findings, and agreed to publish the full report next month.";

    #[test]
    fn picks_the_densest_container() {
        let html = format!(
            r#"<html><head>
            <meta property="og:title" content="Committee Report">
            <title>Committee Report | Example</title>
            <meta name="author" content="Jane Doe">
            </head><body>
            <div class="sidebar"><p>Subscribe to our newsletter for more updates every week.</p></div>
            <div class="post-content">
              <p>{PARAGRAPH}</p>
              <p>{PARAGRAPH}</p>
              <p>{PARAGRAPH}</p>
            </div>
            <div class="comments"><p>Great article, thanks for sharing this with everyone!</p></div>
            </body></html>"#
        );

        let article = parse_article_html(&html);
        assert_eq!(article.title, "Committee Report");
        assert_eq!(article.authors, vec!["Jane Doe".to_string()]);
        assert_eq!(article.text, [PARAGRAPH, PARAGRAPH, PARAGRAPH].join("\n\n"));
    }

    #[test]
    fn falls_back_to_title_tag_and_dedupes_authors() {
        let html = r#"<html><head><title>Plain Title</title>
            <meta name="author" content="Sam Roe">
            <meta property="article:author" content="https://facebook.com/samroe">
            </head><body><a rel="author" href="/sam">By Sam Roe</a></body></html>"#;

        let article = parse_article_html(html);
        assert_eq!(article.title, "Plain Title");
        assert_eq!(article.authors, vec!["Sam Roe".to_string()]);
        assert_eq!(article.text, "");
    }

    #[test]
    fn link_heavy_lists_lose() {
        let links = (0..8)
            .map(|i| format!(r#"<p><a href="/{i}">A very long related link title number {i}</a></p>"#))
            .collect::<String>();
        let html = format!(
            r#"<html><body><div id="links">{links}</div><div><p>{PARAGRAPH}</p></div></body></html>"#
        );

        let article = parse_article_html(&html);
        assert_eq!(article.text, PARAGRAPH);
    }
}
