pub mod anchor;
pub mod block;
pub mod chunk;

pub use anchor::section_anchor;
pub use chunk::{chunk_markdown, overlap_disabled_for, Chunk, ChunkConfig};
