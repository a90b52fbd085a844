/// The coarse block types a markdown document is parsed into before chunk assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Heading(u8),
    Paragraph,
    List,
    CodeFence,
    Table,
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub start_char: usize,
    pub end_char: usize,
    pub heading_path: Vec<String>,
}

struct Line {
    start: usize,
    end: usize,
}

fn lines_with_offsets(text: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut pos = 0usize;
    for segment in text.split_inclusive('\n') {
        let trimmed_len = segment.len() - if segment.ends_with('\n') { 1 } else { 0 };
        lines.push(Line {
            start: pos,
            end: pos + trimmed_len,
        });
        pos += segment.len();
    }
    if text.is_empty() {
        lines.push(Line { start: 0, end: 0 });
    }
    lines
}

fn heading_level(line: &str) -> Option<(u8, &str)> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &trimmed[hashes..];
    if rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t') {
        Some((hashes as u8, rest.trim()))
    } else {
        None
    }
}

fn is_fence_marker(line: &str) -> Option<&'static str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

fn is_list_item(line: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        return false;
    }
    if let Some(rest) = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
        .or_else(|| trimmed.strip_prefix("+ "))
    {
        return !rest.is_empty() || true;
    }
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    if !digits.is_empty() {
        let rest = &trimmed[digits.len()..];
        return rest.starts_with(". ") || rest.starts_with(") ");
    }
    false
}

fn is_table_separator(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || !trimmed.contains('-') {
        return false;
    }
    trimmed
        .chars()
        .all(|c| matches!(c, '-' | '|' | ':' | ' '))
}

/// Parses markdown text into blocks carrying absolute character offsets and the heading-path
/// stack snapshot at each block's location. Heading stack: on a heading of level `L`, entries
/// at depth >= L are popped before the new heading is pushed.
pub fn parse_blocks(text: &str) -> Vec<Block> {
    let lines = lines_with_offsets(text);
    let mut blocks = Vec::new();
    let mut stack: Vec<(u8, String)> = Vec::new();
    let mut i = 0usize;

    while i < lines.len() {
        let line_text = &text[lines[i].start..lines[i].end];

        if line_text.trim().is_empty() {
            let start = lines[i].start;
            let mut j = i;
            while j < lines.len() && text[lines[j].start..lines[j].end].trim().is_empty() {
                j += 1;
            }
            let end = if j > 0 { lines[j - 1].end } else { start };
            blocks.push(Block {
                kind: BlockKind::Blank,
                start_char: start,
                end_char: end,
                heading_path: path_snapshot(&stack),
            });
            i = j;
            continue;
        }

        if let Some((level, _title)) = heading_level(line_text) {
            stack.retain(|(lv, _)| *lv < level);
            stack.push((level, line_text.trim().to_string()));
            blocks.push(Block {
                kind: BlockKind::Heading(level),
                start_char: lines[i].start,
                end_char: lines[i].end,
                heading_path: path_snapshot(&stack),
            });
            i += 1;
            continue;
        }

        if let Some(marker) = is_fence_marker(line_text) {
            let start = lines[i].start;
            let mut j = i + 1;
            while j < lines.len() {
                let candidate = &text[lines[j].start..lines[j].end];
                if candidate.trim_start().starts_with(marker) {
                    j += 1;
                    break;
                }
                j += 1;
            }
            let end = lines[(j.min(lines.len())).saturating_sub(1)].end;
            blocks.push(Block {
                kind: BlockKind::CodeFence,
                start_char: start,
                end_char: end,
                heading_path: path_snapshot(&stack),
            });
            i = j;
            continue;
        }

        if i + 1 < lines.len()
            && is_table_separator(&text[lines[i + 1].start..lines[i + 1].end])
            && line_text.contains('|')
        {
            let start = lines[i].start;
            let mut j = i + 1;
            while j < lines.len() {
                let candidate = &text[lines[j].start..lines[j].end];
                if candidate.trim().is_empty() || !candidate.contains('|') {
                    break;
                }
                j += 1;
            }
            let end = lines[j - 1].end;
            blocks.push(Block {
                kind: BlockKind::Table,
                start_char: start,
                end_char: end,
                heading_path: path_snapshot(&stack),
            });
            i = j;
            continue;
        }

        if is_list_item(line_text) {
            let start = lines[i].start;
            let mut j = i + 1;
            while j < lines.len() {
                let candidate = &text[lines[j].start..lines[j].end];
                if candidate.trim().is_empty() {
                    break;
                }
                let indented = candidate.starts_with(' ') || candidate.starts_with('\t');
                if is_list_item(candidate) || indented {
                    j += 1;
                } else {
                    break;
                }
            }
            let end = lines[j - 1].end;
            blocks.push(Block {
                kind: BlockKind::List,
                start_char: start,
                end_char: end,
                heading_path: path_snapshot(&stack),
            });
            i = j;
            continue;
        }

        let start = lines[i].start;
        let mut j = i + 1;
        while j < lines.len() {
            let candidate = &text[lines[j].start..lines[j].end];
            if candidate.trim().is_empty()
                || heading_level(candidate).is_some()
                || is_fence_marker(candidate).is_some()
                || is_list_item(candidate)
            {
                break;
            }
            j += 1;
        }
        let end = lines[j - 1].end;
        blocks.push(Block {
            kind: BlockKind::Paragraph,
            start_char: start,
            end_char: end,
            heading_path: path_snapshot(&stack),
        });
        i = j;
    }

    blocks
}

fn path_snapshot(stack: &[(u8, String)]) -> Vec<String> {
    stack.iter().map(|(_, title)| title.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_stack_pops_equal_or_deeper_levels() {
        let text = "# A\ntext\n## B\nmore\n## C\nfinal\n";
        let blocks = parse_blocks(text);
        let headings: Vec<_> = blocks
            .iter()
            .filter(|b| matches!(b.kind, BlockKind::Heading(_)))
            .collect();
        assert_eq!(headings.len(), 3);
        assert_eq!(headings[2].heading_path, vec!["# A".to_string(), "## C".to_string()]);
    }

    #[test]
    fn code_fence_is_not_split_by_internal_rules() {
        let text = "# A\n```\n# not a heading\n- not a list\n```\nafter\n";
        let blocks = parse_blocks(text);
        let fence = blocks
            .iter()
            .find(|b| matches!(b.kind, BlockKind::CodeFence))
            .unwrap();
        assert_eq!(&text[fence.start_char..fence.end_char], "```\n# not a heading\n- not a list\n```");
    }

    #[test]
    fn table_requires_header_and_dash_separator() {
        let text = "| a | b |\n|---|---|\n| 1 | 2 |\n";
        let blocks = parse_blocks(text);
        assert!(blocks.iter().any(|b| matches!(b.kind, BlockKind::Table)));
    }

    #[test]
    fn offsets_slice_back_to_original_source() {
        let text = "# Title\n\nSome paragraph text.\n";
        let blocks = parse_blocks(text);
        for block in &blocks {
            let slice = &text[block.start_char..block.end_char];
            assert!(text.contains(slice));
        }
    }
}
