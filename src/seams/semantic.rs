//! Seam for routing events to subscriptions by meaning rather than topic
//! string (spec §4.G).
//!
//! A real implementation would score against embeddings from a language
//! model; that model is explicitly out of scope (spec Non-goals). The
//! default here scores by lexical token overlap (Jaccard similarity) so the
//! bus is exercisable end to end without an external dependency.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::event::Event;

/// Scores how well an event matches a semantic subscription's free-text
/// pattern, returning a similarity in `[0.0, 1.0]`.
#[async_trait]
pub trait SemanticRouter: Send + Sync {
    async fn score(&self, pattern: &str, event: &Event) -> f32;
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .collect()
}

/// Scores by Jaccard overlap between the pattern's tokens and the event's
/// topic plus its string-valued data fields.
pub struct LexicalOverlapRouter;

#[async_trait]
impl SemanticRouter for LexicalOverlapRouter {
    async fn score(&self, pattern: &str, event: &Event) -> f32 {
        let pattern_tokens = tokenize(pattern);
        if pattern_tokens.is_empty() {
            return 0.0;
        }

        let mut event_text = event.topic.clone();
        for value in event.data.values() {
            if let Some(s) = value.as_str() {
                event_text.push(' ');
                event_text.push_str(s);
            }
        }
        let event_tokens = tokenize(&event_text);
        if event_tokens.is_empty() {
            return 0.0;
        }

        let intersection = pattern_tokens.intersection(&event_tokens).count();
        let union = pattern_tokens.union(&event_tokens).count();
        if union == 0 {
            0.0
        } else {
            intersection as f32 / union as f32
        }
    }
}
