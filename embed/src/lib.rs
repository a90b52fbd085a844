pub mod dispatch;
pub mod fake;
pub mod jina;
pub mod openai_compat;
pub mod provider;
pub mod retry;
pub mod voyage;

pub use dispatch::{build_embedder, DispatchError, ProviderConfig, ProviderKind};
pub use provider::{ContextualChunk, EmbedError, EmbedRequest, EmbedResponse, Embedder, InputType};
