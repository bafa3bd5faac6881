use regex::Regex;

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;

    fn name(&self) -> &str;

    fn clone_box(&self) -> Box<dyn Tokenizer>;
}

impl Clone for Box<dyn Tokenizer> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Splits on Unicode word-character runs and lowercases each run.
#[derive(Clone)]
pub struct WordTokenizer {
    pattern: Regex,
}

impl WordTokenizer {
    pub fn new() -> Self {
        WordTokenizer {
            // Literal pattern, always valid
            pattern: Regex::new(r"\w+").unwrap(),
        }
    }
}

impl Default for WordTokenizer {
    fn default() -> Self {
        WordTokenizer::new()
    }
}

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect()
    }

    fn name(&self) -> &str {
        "word"
    }

    fn clone_box(&self) -> Box<dyn Tokenizer> {
        Box::new(self.clone())
    }
}
