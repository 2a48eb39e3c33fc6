//! Summary-text reduction applied before the whole-document embedding

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use super::chunker::{estimate_tokens, split_sentences};

const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

const PORTUGUESE_STOPWORDS: &[&str] = &[
    "a", "ao", "aos", "aquela", "aquelas", "aquele", "aqueles", "aquilo", "as", "até", "com",
    "como", "da", "das", "de", "dela", "delas", "dele", "deles", "depois", "do", "dos", "e", "é",
    "ela", "elas", "ele", "eles", "em", "entre", "era", "eram", "essa", "essas", "esse", "esses",
    "esta", "está", "estas", "este", "estes", "eu", "foi", "foram", "há", "isso", "isto", "já",
    "lhe", "lhes", "mais", "mas", "me", "mesmo", "meu", "minha", "muito", "na", "nas", "não",
    "nem", "no", "nos", "nós", "num", "numa", "o", "os", "ou", "para", "pela", "pelas", "pelo",
    "pelos", "por", "qual", "quando", "que", "quem", "se", "sem", "ser", "seu", "seus", "só",
    "sua", "suas", "também", "te", "tem", "têm", "você", "vocês", "um", "uma", "umas", "uns",
];

fn stopwords() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| {
        ENGLISH_STOPWORDS
            .iter()
            .chain(PORTUGUESE_STOPWORDS)
            .copied()
            .collect()
    })
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex"))
}

/// Collapse whitespace, drop repeated sentences, and cap at `max_tokens`
pub fn compress_text(text: &str, max_tokens: usize) -> String {
    let collapsed = whitespace().replace_all(text.trim(), " ");

    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    let mut tokens = 0usize;
    for sentence in split_sentences(&collapsed) {
        if !seen.insert(sentence.to_lowercase()) {
            continue;
        }
        let cost = estimate_tokens(sentence);
        if tokens + cost > max_tokens && !kept.is_empty() {
            break;
        }
        kept.push(sentence);
        tokens += cost;
    }
    kept.join(" ")
}

/// Drop English and Portuguese stopwords, keeping word order
pub fn remove_stopwords(text: &str) -> String {
    let stop = stopwords();
    text.split_whitespace()
        .filter(|word| {
            let bare = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            !bare.is_empty() && !stop.contains(bare.as_str())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Summary representation of a whole document
pub fn summarize_for_embedding(text: &str, max_tokens: usize) -> String {
    remove_stopwords(&compress_text(text, max_tokens))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_collapses_and_dedupes() {
        let text = "Hello   world.\n\nHello world.  Next\tline.";
        assert_eq!(compress_text(text, 100), "Hello world. Next line.");
    }

    #[test]
    fn test_compress_caps_tokens() {
        let text = "One two three. Four five six. Seven eight nine.";
        // each sentence is 4 tokens
        assert_eq!(compress_text(text, 8), "One two three. Four five six.");
        // the first sentence is always kept
        assert_eq!(compress_text(text, 1), "One two three.");
    }

    #[test]
    fn test_remove_stopwords() {
        assert_eq!(
            remove_stopwords("The report of the year, para o cliente"),
            "report year, cliente"
        );
        assert_eq!(remove_stopwords("Alpha Beta Gamma Delta"), "Alpha Beta Gamma Delta");
    }

    #[test]
    fn test_summary() {
        assert_eq!(
            summarize_for_embedding("Alpha  Beta Gamma Delta", 512),
            "Alpha Beta Gamma Delta"
        );
    }
}
