mod pipeline;

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
};

use crate::ai::{backends::MockBackend, CompletionBackend, CompletionRequest};
use crate::errors::{BackendError, ExtractionError};
use crate::extract::{ContentSource, ExtractedContent, ExtractionMethod};

/// Serves canned content per url and records every request.
#[derive(Default)]
pub struct FakeSource {
    pages: HashMap<String, ExtractedContent>,
    pub calls: Rc<RefCell<Vec<String>>>,
}

impl FakeSource {
    pub fn with_page(mut self, url: &str, title: &str, text: &str, publisher: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            ExtractedContent {
                title: title.to_string(),
                text: text.to_string(),
                authors: vec![],
                publisher: publisher.to_string(),
                method: ExtractionMethod::Article,
            },
        );
        self
    }
}

impl ContentSource for FakeSource {
    fn extract(&self, url: &str) -> Result<ExtractedContent, ExtractionError> {
        self.calls.borrow_mut().push(url.to_string());

        if url.contains("panic") {
            panic!("extractor blew up on {url}");
        }

        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ExtractionError::NoContent {
                url: url.to_string(),
            })
    }
}

/// Offline mock that counts how often it is asked.
#[derive(Default)]
pub struct CountingBackend {
    pub calls: Rc<Cell<usize>>,
}

impl CompletionBackend for CountingBackend {
    fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        self.calls.set(self.calls.get() + 1);
        MockBackend.complete(request)
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

pub fn long_text(sentences: usize) -> String {
    (0..sentences)
        .map(|i| format!("Sentence number {i} talks about the topic at some length."))
        .collect::<Vec<_>>()
        .join(" ")
}
