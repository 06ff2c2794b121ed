use std::sync::Arc;
use tiktoken_rs::{cl100k_base, CoreBPE};
use tracing::warn;

/// Token counts recorded on persisted messages
#[derive(Clone)]
pub struct TokenCounter {
    bpe: Option<Arc<CoreBPE>>,
}

impl TokenCounter {
    /// cl100k_base encoder; falls back to a length estimate if it cannot load
    pub fn cl100k() -> Self {
        match cl100k_base() {
            Ok(bpe) => Self {
                bpe: Some(Arc::new(bpe)),
            },
            Err(e) => {
                warn!(error = %e, "Tokenizer unavailable, using length estimate");
                Self::approximate()
            }
        }
    }

    /// Roughly four characters per token
    pub fn approximate() -> Self {
        Self { bpe: None }
    }

    pub fn count(&self, text: &str) -> u32 {
        let count = match &self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => text.chars().count().div_ceil(4),
        };
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::cl100k()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approximate_counts() {
        let counter = TokenCounter::approximate();
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.count("abcd"), 1);
        assert_eq!(counter.count("abcde"), 2);
    }

    #[test]
    fn test_cl100k_counts_words() {
        let counter = TokenCounter::cl100k();
        let count = counter.count("hello world");
        assert!(count >= 2 && count <= 3);
    }
}
