//! BM25 tokenizer shared between index-time and query-time encoding.
//!
//! Lowercases, splits on non-alphanumeric boundaries, drops English
//! stopwords, applies Porter stemming. Index-time and query-time MUST use
//! this exact pipeline — any divergence breaks vocabulary alignment.

use std::collections::HashSet;
use std::sync::LazyLock;

use rust_stemmers::{Algorithm, Stemmer};

// NLTK's `stopwords.words("english")` list, frozen at build time so tokenization
// never depends on a runtime corpus download.
const STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

static STOPWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORDS.iter().copied().collect());

static STEMMER: LazyLock<Stemmer> = LazyLock::new(|| Stemmer::create(Algorithm::English));

/// Tokenize `text` for BM25 indexing or querying.
pub fn tokenize_for_bm25(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let lower = text.to_lowercase();
    split_alphanumeric(&lower)
        .filter(|w| !STOPWORD_SET.contains(w))
        .map(|w| STEMMER.stem(w).into_owned())
        .collect()
}

fn split_alphanumeric(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_stopwords_and_stems() {
        let tokens = tokenize_for_bm25("The Running Men are running through the city");
        assert!(!tokens.contains(&"the".to_string()));
        assert!(tokens.contains(&"run".to_string()));
    }

    #[test]
    fn empty_text_yields_no_tokens() {
        assert!(tokenize_for_bm25("").is_empty());
    }

    #[test]
    fn is_deterministic() {
        let text = "A mind-bending sci-fi thriller with philosophical undertones";
        assert_eq!(tokenize_for_bm25(text), tokenize_for_bm25(text));
    }
}
