//! Builders for training corpora.

#![allow(dead_code)]

use tagserve::{Corpus, TrainingDocument};

const TOPICS: &[&str] = &["economy", "sports", "science", "politics", "culture"];

/// `n` documents whose text names their topics. Document `i` carries the
/// topics `i mod 5` and `(i + 1) mod 5`.
pub fn keyword_corpus(n: usize) -> Corpus {
    Corpus::new(
        (0..n)
            .map(|i| {
                let first = TOPICS[i % TOPICS.len()];
                let second = TOPICS[(i + 1) % TOPICS.len()];
                TrainingDocument::new(
                    format!("doc-{}", i),
                    format!("a story on {} and {} number {}", first, second, i),
                    vec![first.to_string(), second.to_string()],
                )
            })
            .collect(),
    )
}

/// The same corpus as [`keyword_corpus`], in JSON Lines form.
pub fn keyword_corpus_json_lines(n: usize) -> String {
    keyword_corpus(n)
        .documents
        .iter()
        .map(|doc| {
            serde_json::json!({
                "id": doc.id,
                "content": doc.text,
                "topics": doc.topics,
            })
            .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub const VOCABULARY: &str = "@prefix skos: <http://www.w3.org/2004/02/skos/core#> .\n\
<http://example.org/economy> a skos:Concept ; skos:prefLabel \"economy\"@en .\n";
