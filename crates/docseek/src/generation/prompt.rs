//! Prompt templates for answer generation

use crate::types::Passage;

/// System prompt sent with every chat request
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Prompt builder for chat queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Passage texts, each followed by a blank line
    pub fn build_context(passages: &[Passage]) -> String {
        let mut context = String::new();
        for passage in passages {
            context.push_str(&passage.text);
            context.push_str("\n\n");
        }
        context
    }

    /// Wrap the context in delimiters and append the query
    pub fn build_chat_prompt(query: &str, context: &str) -> String {
        format!(
            "Given the following context:\n<|context|>\n{context}\n<|endofcontext|>\n\n\n{query}"
        )
    }

    /// Build the full prompt from retrieved passages
    pub fn from_passages(query: &str, passages: &[Passage]) -> String {
        Self::build_chat_prompt(query, &Self::build_context(passages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(text: &str) -> Passage {
        Passage {
            distance: 0.1,
            text: text.to_string(),
            document_name: "doc.txt".to_string(),
        }
    }

    #[test]
    fn test_context_joins_with_blank_lines() {
        let context = PromptBuilder::build_context(&[passage("first"), passage("second")]);
        assert_eq!(context, "first\n\nsecond\n\n");
    }

    #[test]
    fn test_chat_prompt_layout() {
        let prompt = PromptBuilder::from_passages("What is alpha?", &[passage("Alpha is a letter.")]);
        assert_eq!(
            prompt,
            "Given the following context:\n<|context|>\nAlpha is a letter.\n\n\n<|endofcontext|>\n\n\nWhat is alpha?"
        );
    }

    #[test]
    fn test_empty_context() {
        let prompt = PromptBuilder::from_passages("q", &[]);
        assert!(prompt.contains("<|context|>\n\n<|endofcontext|>"));
    }
}
