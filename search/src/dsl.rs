use uuid::Uuid;

const DEFAULT_TOP_K: usize = 40;
const DEFAULT_MAX_CHUNK_CHARS: usize = 300;
const DEFAULT_TRIGRAM_WEIGHT: f32 = 0.3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub item_ids: Vec<Uuid>,
    pub kinds: Vec<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty() && self.kinds.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    pub top_k: usize,
    pub max_chunk_chars: usize,
    pub trigram_weight: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            trigram_weight: DEFAULT_TRIGRAM_WEIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShape {
    CodeIdentifier,
    LongNaturalLanguage,
    ShortTechnical,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightProfile {
    pub lexical: f32,
    pub semantic: f32,
    pub trigram: f32,
}

/// Picks a weight profile from the shape of the raw query string, per the three buckets the
/// hybrid search operation distinguishes.
pub fn classify_query_shape(query: &str) -> QueryShape {
    let word_count = query.split_whitespace().count();
    if looks_like_code(query) {
        QueryShape::CodeIdentifier
    } else if word_count >= 6 {
        QueryShape::LongNaturalLanguage
    } else {
        QueryShape::ShortTechnical
    }
}

pub fn weight_profile_for(shape: QueryShape) -> WeightProfile {
    match shape {
        QueryShape::CodeIdentifier => WeightProfile {
            lexical: 0.3,
            semantic: 0.3,
            trigram: 0.4,
        },
        QueryShape::LongNaturalLanguage => WeightProfile {
            lexical: 0.25,
            semantic: 0.7,
            trigram: 0.05,
        },
        QueryShape::ShortTechnical => WeightProfile {
            lexical: 0.5,
            semantic: 0.35,
            trigram: 0.15,
        },
    }
}

fn looks_like_code(query: &str) -> bool {
    let has_brace_or_dot_call = query.contains('{')
        || query.contains('}')
        || query.contains("::")
        || (query.contains('(') && query.contains(')'))
        || query.contains("->")
        || query.contains("=>");
    let has_stack_trace_words = ["traceback", "exception", "panic", "at line", "stack trace"]
        .iter()
        .any(|w| query.to_lowercase().contains(w));
    has_brace_or_dot_call || has_stack_trace_words
}

/// True when the query is long enough and contains at least one identifier-like character,
/// the trigger condition for adding a trigram-similarity term to the lexical score.
pub fn should_apply_trigram(query: &str) -> bool {
    query.len() >= 3
        && query
            .chars()
            .any(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || "_:/.-".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_long_natural_language_query() {
        let shape = classify_query_shape("how does the token refresh flow handle expired sessions");
        assert_eq!(shape, QueryShape::LongNaturalLanguage);
    }

    #[test]
    fn classifies_code_like_query() {
        assert_eq!(classify_query_shape("foo::bar(baz)"), QueryShape::CodeIdentifier);
    }

    #[test]
    fn classifies_short_technical_query() {
        assert_eq!(classify_query_shape("ECONNRESET_42"), QueryShape::ShortTechnical);
    }

    #[test]
    fn trigram_trigger_requires_identifier_shape() {
        assert!(should_apply_trigram("ECONNRESET_42"));
        assert!(!should_apply_trigram("hello there"));
        assert!(!should_apply_trigram("hi"));
    }
}
