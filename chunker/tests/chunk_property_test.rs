use memento_chunker::{chunk_markdown, ChunkConfig};
use proptest::prelude::*;

fn arb_markdown_line() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 ]{0,40}".prop_map(|s| s),
        "#{1,3} [a-zA-Z0-9 ]{1,20}".prop_map(|s| s),
        "- [a-zA-Z0-9 ]{1,20}".prop_map(|s| s),
    ]
}

proptest! {
    #[test]
    fn chunks_always_slice_back_to_exact_source(lines in prop::collection::vec(arb_markdown_line(), 0..15)) {
        let text = lines.join("\n");
        let config = ChunkConfig::default();
        let chunks = chunk_markdown(&text, &config, false);
        for chunk in &chunks {
            let slice = &text[chunk.start_char as usize..chunk.end_char as usize];
            prop_assert_eq!(slice, chunk.chunk_text.as_str());
        }
    }

    #[test]
    fn chunking_is_deterministic(lines in prop::collection::vec(arb_markdown_line(), 0..15)) {
        let text = lines.join("\n");
        let config = ChunkConfig::default();
        let a = chunk_markdown(&text, &config, false);
        let b = chunk_markdown(&text, &config, false);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn chunk_indices_are_dense_from_zero(lines in prop::collection::vec(arb_markdown_line(), 0..15)) {
        let text = lines.join("\n");
        let chunks = chunk_markdown(&text, &ChunkConfig::default(), false);
        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.chunk_index, i as i32);
        }
    }
}
