pub mod backends;
pub mod parser;

use crate::config::ProcessingConfig;
use crate::text::truncate_chars;

pub use backends::{CompletionBackend, CompletionRequest};

/// Characters of page text sent to the model.
pub const MAX_CONTENT_CHARS: usize = 2000;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that summarizes web content and extracts relevant tags, with special attention to people mentioned.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentResult {
    pub description: String,
    pub tags: Vec<String>,
    pub author: String,
}

/// What the model gets to see about one page.
#[derive(Debug, Clone, Copy)]
pub struct SummaryInput<'a> {
    pub title: &'a str,
    pub text: &'a str,
    pub authors: &'a [String],
    pub publisher: &'a str,
    pub existing_tags: &'a str,
}

pub struct AiProcessor {
    backend: Box<dyn CompletionBackend>,
    description_length: String,
    extract_people: bool,
    extract_author: bool,
    extract_publisher: bool,
}

impl AiProcessor {
    pub fn new(config: &ProcessingConfig, backend: Box<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            description_length: config.description_length.clone(),
            extract_people: config.extract_people,
            extract_author: config.extract_author,
            extract_publisher: config.extract_publisher,
        }
    }

    pub fn build_prompt(&self, input: &SummaryInput) -> String {
        let content = truncate_chars(input.text, MAX_CONTENT_CHARS);

        let mut context = String::new();
        let existing_tags = input.existing_tags.trim();
        if !existing_tags.is_empty() && existing_tags != "NA" {
            context.push_str(&format!("\nExisting tags: {existing_tags}"));
        }
        if !input.authors.is_empty() {
            context.push_str(&format!("\nDetected authors: {}", input.authors.join(", ")));
        }
        if self.extract_publisher && !input.publisher.is_empty() {
            context.push_str(&format!("\nPublisher: {}", input.publisher));
        }

        let mut asks = format!(
            "1. A concise summary ({})\n2. Relevant tags (1-4 words each, maximum 5 tags)",
            self.description_length
        );
        if self.extract_author {
            asks.push_str("\n3. The author of the content (if identifiable)");
        }

        let mut guidelines = Vec::new();
        if self.extract_people {
            guidelines.push("Pay special attention to people mentioned in the content. Include person names as tags when they are central to the content.");
        }
        guidelines.extend([
            "In the description, focus on the CONTENT and KEY INSIGHTS only",
            "Do NOT mention the author name, title, or publication in the description",
            "Do NOT repeat information that will be captured separately in author/title fields",
            "Focus on what the content discusses, argues, or reveals",
            "Use a NEUTRAL, OBJECTIVE tone - avoid promotional language, superlatives, or subjective opinions",
            "Present information factually without editorial commentary",
        ]);
        let guidelines = guidelines
            .iter()
            .map(|g| format!("- {g}"))
            .collect::<Vec<_>>()
            .join("\n");

        let example_tags = if self.extract_people {
            r#"["tag1", "tag2", "Person Name", "tag4"]"#
        } else {
            r#"["tag1", "tag2", "tag3"]"#
        };

        format!(
            r#"
Please analyze this web content and provide:

{asks}

**Important Guidelines:**
{guidelines}

Title: {title}
Content: {content}{context}

Please respond in this exact JSON format:
{{
    "description": "Your summary here focusing only on content insights and key points",
    "tags": {example_tags},
    "author": "Author Name (or empty string if not identifiable)"
}}
"#,
            title = input.title,
        )
    }

    /// Never fails: a backend error degrades to a minimal result.
    pub fn summarize(&self, input: &SummaryInput) -> EnrichmentResult {
        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: self.build_prompt(input),
            title: input.title.to_string(),
            text: input.text.to_string(),
        };

        let mut result = match self.backend.complete(&request) {
            Ok(raw) => {
                let mut parsed = parser::parse_response(&raw);
                if parsed.author.is_empty() {
                    parsed.author = input.authors.join(", ");
                }
                parsed
            }
            Err(err) => {
                log::error!("AI processing failed ({}): {err}", self.backend.name());
                EnrichmentResult {
                    description: format!("Content from: {}", input.title),
                    tags: Vec::new(),
                    author: input.authors.join(", "),
                }
            }
        };

        if !self.extract_author {
            result.author.clear();
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::backends::MockBackend;
    use super::*;
    use crate::errors::BackendError;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FailingBackend;

    impl CompletionBackend for FailingBackend {
        fn complete(&self, _request: &CompletionRequest) -> Result<String, BackendError> {
            Err(BackendError::Status {
                status: 401,
                body: "bad key".to_string(),
            })
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    /// Records prompts and answers with a canned response.
    struct RecordingBackend {
        prompts: Rc<RefCell<Vec<String>>>,
        response: String,
    }

    impl CompletionBackend for RecordingBackend {
        fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
            self.prompts.borrow_mut().push(request.prompt.clone());
            Ok(self.response.clone())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn input<'a>(authors: &'a [String], text: &'a str) -> SummaryInput<'a> {
        SummaryInput {
            title: "Rust Ownership Explained",
            text,
            authors,
            publisher: "Example",
            existing_tags: "rust",
        }
    }

    #[test]
    fn backend_failure_degrades() {
        let processor = AiProcessor::new(&ProcessingConfig::default(), Box::new(FailingBackend));
        let authors = vec!["Ann".to_string(), "Bob".to_string()];

        let result = processor.summarize(&input(&authors, "some text"));

        assert_eq!(result.description, "Content from: Rust Ownership Explained");
        assert!(result.tags.is_empty());
        assert_eq!(result.author, "Ann, Bob");
    }

    #[test]
    fn mock_backend_gives_a_full_result() {
        let processor = AiProcessor::new(&ProcessingConfig::default(), Box::new(MockBackend));
        let result = processor.summarize(&input(&[], "Ownership is a set of rules. It governs memory. Borrowing follows. More."));

        assert_eq!(
            result.description,
            "Ownership is a set of rules. It governs memory. Borrowing follows"
        );
        assert_eq!(result.tags, vec!["rust", "ownership", "explained"]);
        assert_eq!(result.author, "");
    }

    #[test]
    fn prompt_truncates_content_and_lists_context() {
        let prompts = Rc::new(RefCell::new(Vec::new()));
        let backend = RecordingBackend {
            prompts: prompts.clone(),
            response: r#"{"description": "d", "tags": [], "author": "Z"}"#.to_string(),
        };
        let processor = AiProcessor::new(&ProcessingConfig::default(), Box::new(backend));
        let authors = vec!["Ann".to_string()];
        let text = "x".repeat(MAX_CONTENT_CHARS + 50);

        let result = processor.summarize(&input(&authors, &text));
        assert_eq!(result.author, "Z");

        let prompt = prompts.borrow()[0].clone();
        assert!(prompt.contains(&format!("Content: {}...", "x".repeat(MAX_CONTENT_CHARS))));
        assert!(!prompt.contains(&"x".repeat(MAX_CONTENT_CHARS + 1)));
        assert!(prompt.contains("Existing tags: rust"));
        assert!(prompt.contains("Detected authors: Ann"));
        assert!(prompt.contains("Publisher: Example"));
        assert!(prompt.contains("Include person names as tags"));
        assert!(prompt.contains("(2-3 sentences)"));
    }

    #[test]
    fn disabled_options_shape_the_prompt() {
        let config = ProcessingConfig {
            extract_people: false,
            extract_author: false,
            extract_publisher: false,
            ..Default::default()
        };
        let prompts = Rc::new(RefCell::new(Vec::new()));
        let backend = RecordingBackend {
            prompts: prompts.clone(),
            response: r#"{"description": "d", "tags": ["a"], "author": "Z"}"#.to_string(),
        };
        let processor = AiProcessor::new(&config, Box::new(backend));

        let result = processor.summarize(&input(&[], "text"));
        assert_eq!(result.author, "");

        let prompt = prompts.borrow()[0].clone();
        assert!(!prompt.contains("Publisher:"));
        assert!(!prompt.contains("Person Name"));
        assert!(!prompt.contains("3. The author"));
    }

    #[test]
    fn missing_model_author_falls_back_to_extracted() {
        let processor = AiProcessor::new(&ProcessingConfig::default(), Box::new(MockBackend));
        let authors = vec!["Ann".to_string(), "Bob".to_string()];
        let result = processor.summarize(&input(&authors, "Some text. More text."));
        assert_eq!(result.author, "Ann, Bob");
    }

    #[test]
    fn na_existing_tags_are_ignored() {
        let processor = AiProcessor::new(&ProcessingConfig::default(), Box::new(MockBackend));
        let mut summary = input(&[], "text");
        summary.existing_tags = "NA";
        assert!(!processor.build_prompt(&summary).contains("Existing tags"));
    }
}
