//! Generic html heuristics used when structured article parsing comes up short.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use super::publisher_from_url;

const AUTHOR_MAX_CHARS: usize = 100;
const PUBLISHER_MAX_CHARS: usize = 100;
/// A content container must carry more text than this to win over `<body>`.
const CONTENT_MIN_CHARS: usize = 200;

fn selectors(list: &[&str]) -> Vec<Selector> {
    list.iter()
        .map(|s| Selector::parse(s).expect("static selector"))
        .collect()
}

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("static selector"));
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("static selector"));
static NOISE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("script, style, nav, header, footer").expect("static selector")
});

static AUTHOR_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    selectors(&[
        r#"[rel="author"]"#,
        ".author",
        ".byline",
        ".author-name",
        ".post-author",
        ".article-author",
        r#"[class*="author"]"#,
        r#"[itemprop="author"]"#,
        r#"meta[name="author"]"#,
    ])
});

static PUBLISHER_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    selectors(&[
        r#"meta[property="og:site_name"]"#,
        r#"meta[name="application-name"]"#,
        r#"meta[name="publisher"]"#,
        ".site-name",
        ".publisher",
        ".source",
        r#"[itemprop="publisher"]"#,
    ])
});

static CONTENT_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    selectors(&[
        "article",
        r#"[role="main"]"#,
        ".content",
        ".post-content",
        ".entry-content",
        ".article-body",
        "main",
    ])
});

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HtmlPage {
    pub title: String,
    pub author: Option<String>,
    pub publisher: String,
    pub text: String,
}

/// Text of an element: stripped text nodes joined by single spaces.
pub fn element_text(el: &ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `content` attribute for `<meta>`, text otherwise.
fn element_value(el: &ElementRef) -> String {
    if el.value().name() == "meta" {
        el.value().attr("content").unwrap_or_default().trim().to_string()
    } else {
        element_text(el)
    }
}

fn strip_by_prefix(author: &str) -> &str {
    author
        .strip_prefix("By ")
        .or_else(|| author.strip_prefix("by "))
        .unwrap_or(author)
        .trim()
}

pub fn extract_author(document: &Html) -> Option<String> {
    for selector in AUTHOR_SELECTORS.iter() {
        let Some(el) = document.select(selector).next() else {
            continue;
        };

        let author = element_value(&el);
        if author.is_empty() || author.chars().count() > AUTHOR_MAX_CHARS {
            continue;
        }

        let author = strip_by_prefix(&author);
        if !author.is_empty() {
            return Some(author.to_string());
        }
    }

    None
}

pub fn extract_publisher(document: &Html, url: &str) -> String {
    for selector in PUBLISHER_SELECTORS.iter() {
        let Some(el) = document.select(selector).next() else {
            continue;
        };

        let publisher = element_value(&el);
        if !publisher.is_empty() && publisher.chars().count() < PUBLISHER_MAX_CHARS {
            return publisher;
        }
    }

    publisher_from_url(url)
}

/// Drop script/style/navigation chrome from the tree.
fn strip_noise(document: &mut Html) {
    let ids = document.select(&NOISE).map(|el| el.id()).collect::<Vec<_>>();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

pub fn extract_main_text(document: &Html) -> String {
    for selector in CONTENT_SELECTORS.iter() {
        if let Some(el) = document.select(selector).next() {
            let text = element_text(&el);
            if text.chars().count() > CONTENT_MIN_CHARS {
                return text;
            }
        }
    }

    if let Some(body) = document.select(&BODY).next() {
        return element_text(&body);
    }

    element_text(&document.root_element())
}

pub fn parse_page(html: &str, url: &str) -> HtmlPage {
    let mut document = Html::parse_document(html);

    let title = document
        .select(&TITLE)
        .next()
        .map(|el| element_text(&el))
        .unwrap_or_default();

    // author and publisher may live in header/footer, read them first
    let author = extract_author(&document);
    let publisher = extract_publisher(&document, url);

    strip_noise(&mut document);
    let text = extract_main_text(&document);

    HtmlPage {
        title,
        author,
        publisher,
        text,
    }
}
