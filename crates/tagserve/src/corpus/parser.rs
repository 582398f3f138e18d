//! Training corpus parser for JSON Lines input.
//!
//! Each non-blank line is one JSON object:
//!
//! ```json
//! {"id": "doc-17", "content": "Text of the document", "topics": ["Economy", "Trade"]}
//! ```
//!
//! `content` and `topics` are required, `id` defaults to `doc-<line>`.

use std::io::BufRead;

use log::{debug, warn};
use serde_json::Value;

use crate::corpus::{Corpus, TrainingDocument};
use crate::error::CorpusError;

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Count lines with JSON syntax errors as skipped instead of failing.
    pub skip_bad_lines: bool,
}

/// Parses a corpus, skipping documents that lack usable content or topics.
pub fn parse_json_lines<R: BufRead>(
    reader: R,
    options: ParseOptions,
) -> Result<Corpus, CorpusError> {
    let mut corpus = Corpus::default();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let json: Value = match serde_json::from_str(&line) {
            Ok(json) => json,
            Err(e) if options.skip_bad_lines => {
                warn!("Skipping line {}: JSON parse error: {}", line_number, e);
                corpus.skipped += 1;
                continue;
            }
            Err(e) => {
                return Err(CorpusError::Parse {
                    line: line_number,
                    message: e.to_string(),
                })
            }
        };

        match to_training_document(&json, line_number) {
            Ok(doc) => corpus.documents.push(doc),
            Err((id, reason)) => {
                warn!("Skipping document {}: {}", id, reason);
                corpus.skipped += 1;
            }
        }
    }

    if corpus.documents.is_empty() {
        return Err(CorpusError::Empty {
            skipped: corpus.skipped,
        });
    }
    Ok(corpus)
}

fn to_training_document(
    json: &Value,
    line_number: usize,
) -> Result<TrainingDocument, (String, String)> {
    let default_id = format!("doc-{}", line_number);
    let Some(object) = json.as_object() else {
        return Err((default_id, "Not a JSON object".to_string()));
    };

    let id = match object.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => default_id,
    };

    let content = match object.get("content") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => {
            return Err((
                id,
                "Field 'content' missing, empty, or not a string".to_string(),
            ))
        }
    };

    let raw_topics = match object.get("topics") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => {
            return Err((
                id,
                "Field 'topics' missing, empty, or not an array".to_string(),
            ))
        }
    };

    let topics: Vec<String> = raw_topics
        .iter()
        .filter_map(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    let invalid_topics = raw_topics.len() - topics.len();
    if topics.is_empty() {
        return Err((
            id,
            format!("All {} topics were invalid (non-string)", invalid_topics),
        ));
    }

    let words = content.split_whitespace().count();
    if invalid_topics > 0 {
        debug!(
            "Adding training document {}: {} words, {} topics, {} non-string topics skipped",
            id,
            words,
            topics.len(),
            invalid_topics
        );
    } else {
        debug!(
            "Adding training document {}: {} words, {} topics",
            id,
            words,
            topics.len()
        );
    }

    Ok(TrainingDocument::new(id, content, topics))
}
