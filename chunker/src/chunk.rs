use crate::anchor::section_anchor;
use crate::block::{parse_blocks, Block, BlockKind};

#[derive(Debug, Clone)]
pub struct ChunkConfig {
    pub target_tokens: usize,
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            target_tokens: 400,
            max_tokens: 800,
            overlap_tokens: 60,
        }
    }
}

/// Doc classes for which overlap is never applied (spec §4.2).
pub const CANONICAL_NO_OVERLAP_CLASSES: &[&str] =
    &["app_spec", "feature_spec", "implementation_plan"];

pub fn overlap_disabled_for(doc_class: Option<&str>) -> bool {
    doc_class
        .map(|c| CANONICAL_NO_OVERLAP_CLASSES.contains(&c))
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub chunk_index: i32,
    pub chunk_text: String,
    pub heading_path: Vec<String>,
    pub section_anchor: String,
    pub start_char: i32,
    pub end_char: i32,
}

fn estimate_tokens(chars: usize) -> usize {
    (chars + 3) / 4
}

/// Splits `block` into spans of at most `max_chars` bytes, each cut widened forward to the
/// next UTF-8 char boundary so `build_chunk`'s `text[start..end]` slicing never lands mid-codepoint.
fn split_oversized(text: &str, block: Block, max_chars: usize) -> Vec<Block> {
    let span = block.end_char - block.start_char;
    if span <= max_chars {
        return vec![block];
    }
    let mut out = Vec::new();
    let mut pos = block.start_char;
    while pos < block.end_char {
        let mut end = (pos + max_chars).min(block.end_char);
        while end < block.end_char && !text.is_char_boundary(end) {
            end += 1;
        }
        out.push(Block {
            kind: block.kind,
            start_char: pos,
            end_char: end,
            heading_path: block.heading_path.clone(),
        });
        pos = end;
    }
    out
}

fn expand_oversized(text: &str, blocks: Vec<Block>, max_tokens: usize) -> Vec<Block> {
    let max_chars = 4 * max_tokens;
    blocks
        .into_iter()
        .flat_map(|b| split_oversized(text, b, max_chars))
        .collect()
}

struct Group {
    indices: Vec<usize>,
}

/// Chunks markdown `text` into retrieval units with byte-exact offsets, honoring heading
/// boundaries, target/max token budgets, and heading-path-scoped overlap.
pub fn chunk_markdown(text: &str, config: &ChunkConfig, overlap_disabled: bool) -> Vec<Chunk> {
    if text.is_empty() {
        return Vec::new();
    }

    let blocks = expand_oversized(text, parse_blocks(text), config.max_tokens);
    if blocks.is_empty() {
        return Vec::new();
    }

    let mut groups: Vec<Group> = Vec::new();
    let mut current: Vec<usize> = Vec::new();

    for (i, block) in blocks.iter().enumerate() {
        if matches!(block.kind, BlockKind::Heading(_)) {
            if !current.is_empty() {
                let seed = flush(&mut groups, &current, &blocks, config, overlap_disabled);
                current = seed;
            }
            current.push(i);
            continue;
        }

        if let Some(&last) = current.last() {
            if blocks[last].heading_path != block.heading_path {
                let seed = flush(&mut groups, &current, &blocks, config, overlap_disabled);
                current = seed;
            }
        }

        if let Some(&first) = current.first() {
            let would_be_span = block.end_char.saturating_sub(blocks[first].start_char);
            if estimate_tokens(would_be_span) > config.target_tokens {
                let seed = flush(&mut groups, &current, &blocks, config, overlap_disabled);
                current = seed;
            }
        }

        current.push(i);
    }

    if !current.is_empty() {
        groups.push(Group { indices: current });
    }

    groups
        .into_iter()
        .enumerate()
        .filter_map(|(idx, group)| build_chunk(idx as i32, &group, &blocks, text))
        .collect()
}

fn flush(
    groups: &mut Vec<Group>,
    current: &[usize],
    blocks: &[Block],
    config: &ChunkConfig,
    overlap_disabled: bool,
) -> Vec<usize> {
    groups.push(Group {
        indices: current.to_vec(),
    });

    if overlap_disabled {
        return Vec::new();
    }

    let heading_path = match current.last() {
        Some(&last) => blocks[last].heading_path.clone(),
        None => return Vec::new(),
    };

    let mut seed = Vec::new();
    let mut accumulated_chars = 0usize;
    for &idx in current.iter().rev() {
        if blocks[idx].heading_path != heading_path {
            break;
        }
        if matches!(blocks[idx].kind, BlockKind::Heading(_)) {
            break;
        }
        seed.push(idx);
        accumulated_chars += blocks[idx].end_char - blocks[idx].start_char;
        if estimate_tokens(accumulated_chars) >= config.overlap_tokens {
            break;
        }
    }
    seed.reverse();
    seed
}

fn build_chunk(index: i32, group: &Group, blocks: &[Block], text: &str) -> Option<Chunk> {
    let first = *group.indices.first()?;
    let last = *group.indices.last()?;
    let start_char = blocks[first].start_char;
    let end_char = blocks[last].end_char;
    if start_char >= end_char {
        return None;
    }
    let heading_path = blocks[last].heading_path.clone();
    Some(Chunk {
        chunk_index: index,
        chunk_text: text[start_char..end_char].to_string(),
        section_anchor: section_anchor(&heading_path),
        heading_path,
        start_char: start_char as i32,
        end_char: end_char as i32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_cover_contiguous_source_without_gaps_within_a_heading() {
        let text = "# Title\n\nParagraph one.\n\nParagraph two.\n";
        let chunks = chunk_markdown(text, &ChunkConfig::default(), false);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert_eq!(
                &text[chunk.start_char as usize..chunk.end_char as usize],
                chunk.chunk_text
            );
        }
    }

    #[test]
    fn chunk_index_is_dense_from_zero() {
        let text = "# A\npara a\n\n# B\npara b\n\n# C\npara c\n";
        let chunks = chunk_markdown(text, &ChunkConfig::default(), false);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as i32);
        }
    }

    #[test]
    fn heading_change_forces_a_flush() {
        let text = "# A\ncontent a\n\n# B\ncontent b\n";
        let chunks = chunk_markdown(text, &ChunkConfig::default(), false);
        assert!(chunks.len() >= 2);
        assert_ne!(chunks[0].heading_path, chunks[1].heading_path);
    }

    #[test]
    fn overlap_disabled_for_canonical_classes() {
        assert!(overlap_disabled_for(Some("app_spec")));
        assert!(overlap_disabled_for(Some("feature_spec")));
        assert!(!overlap_disabled_for(Some("note")));
        assert!(!overlap_disabled_for(None));
    }

    #[test]
    fn oversized_block_is_split_into_max_token_spans() {
        let config = ChunkConfig {
            target_tokens: 10,
            max_tokens: 10,
            overlap_tokens: 0,
        };
        let long_paragraph = "word ".repeat(200);
        let chunks = chunk_markdown(&long_paragraph, &config, true);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chunk_text.len() <= 4 * config.max_tokens + 1);
        }
    }

    #[test]
    fn oversized_block_split_respects_multibyte_char_boundaries() {
        let config = ChunkConfig {
            target_tokens: 10,
            max_tokens: 10,
            overlap_tokens: 0,
        };
        let long_paragraph = "\u{1F600}word ".repeat(200);
        let chunks = chunk_markdown(&long_paragraph, &config, true);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chunk_text.chars().all(|c| c != '\u{FFFD}'));
        }
    }

    #[test]
    fn anchors_are_root_without_headings() {
        let text = "just a paragraph with no headings at all\n";
        let chunks = chunk_markdown(text, &ChunkConfig::default(), false);
        assert_eq!(chunks[0].section_anchor, "root");
    }
}
