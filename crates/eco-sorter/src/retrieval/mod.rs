//! Region-filtered similarity search over the chunk index

mod search;

pub use search::{cosine_similarity, SearchResult, VectorStore};
